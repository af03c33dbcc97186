//! Common test utilities: an in-memory tunnel stub and helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use ssh_relay::{
    Connector, Credential, Endpoint, EndpointRegistry, ForwardManager, ForwardingRule, HostPort,
    RelayError, Result, SessionPool, TunnelSession,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Generous upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

const CHANNEL_BUFFER: usize = 64 * 1024;

/// Get the path to a test fixture file
pub fn fixture_path(relative_path: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(relative_path);
    path
}

/// The far end of a channel the relay opened through the stub.
pub struct OpenedChannel {
    pub session_id: usize,
    pub remote: HostPort,
    pub originator: SocketAddr,
    pub stream: DuplexStream,
}

/// Shared knobs and counters for [`StubConnector`].
#[derive(Debug)]
pub struct StubState {
    pub dials: AtomicUsize,
    pub dialed_groups: Mutex<Vec<String>>,
    pub fail_dial: AtomicBool,
    /// Number of upcoming `open_channel` calls that should fail.
    pub fail_opens: AtomicUsize,
    pub dial_delay: Mutex<Duration>,
    channels: mpsc::UnboundedSender<OpenedChannel>,
}

impl StubState {
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn set_fail_dial(&self, fail: bool) {
        self.fail_dial.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.fail_opens.store(count, Ordering::SeqCst);
    }

    pub fn set_dial_delay(&self, delay: Duration) {
        *self.dial_delay.lock().unwrap() = delay;
    }
}

/// A [`Connector`] whose sessions hand out in-memory duplex channels.
#[derive(Clone)]
pub struct StubConnector {
    pub state: Arc<StubState>,
}

impl StubConnector {
    /// A connector plus the receiver that sees every channel it opens.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<OpenedChannel>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(StubState {
            dials: AtomicUsize::new(0),
            dialed_groups: Mutex::new(Vec::new()),
            fail_dial: AtomicBool::new(false),
            fail_opens: AtomicUsize::new(0),
            dial_delay: Mutex::new(Duration::ZERO),
            channels: tx,
        });
        (Self { state }, rx)
    }
}

#[async_trait]
impl Connector for StubConnector {
    type Session = StubSession;

    async fn dial(&self, endpoint: &Endpoint) -> Result<StubSession> {
        let id = self.state.dials.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .dialed_groups
            .lock()
            .unwrap()
            .push(endpoint.group.clone());

        let delay = *self.state.dial_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_dial.load(Ordering::SeqCst) {
            return Err(RelayError::Dial {
                group: endpoint.group.clone(),
                message: "connection refused".into(),
            });
        }

        Ok(StubSession {
            id,
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        })
    }
}

#[derive(Debug)]
pub struct StubSession {
    pub id: usize,
    state: Arc<StubState>,
    pub closed: AtomicBool,
}

#[async_trait]
impl TunnelSession for StubSession {
    type Stream = DuplexStream;

    async fn open_channel(
        &self,
        remote: &HostPort,
        originator: SocketAddr,
    ) -> Result<DuplexStream> {
        let should_fail = self
            .state
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(RelayError::ChannelOpen {
                group: "stub".into(),
                remote: remote.to_string(),
                message: "administratively prohibited".into(),
            });
        }

        let (relay_end, test_end) = tokio::io::duplex(CHANNEL_BUFFER);
        let _ = self.state.channels.send(OpenedChannel {
            session_id: self.id,
            remote: remote.clone(),
            originator,
            stream: test_end,
        });
        Ok(relay_end)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn endpoint(group: &str) -> Endpoint {
    Endpoint {
        group: group.to_string(),
        address: HostPort::new("127.0.0.1", 2222),
        user: "u".to_string(),
        credential: Credential::Password("secret".to_string()),
    }
}

/// A rule listening on an ephemeral loopback port.
pub fn rule(group: &str, remote: &str) -> ForwardingRule {
    ForwardingRule::new(
        group,
        HostPort::new("127.0.0.1", 0),
        remote.parse().expect("valid remote address"),
    )
}

pub struct Harness {
    pub state: Arc<StubState>,
    pub channels: mpsc::UnboundedReceiver<OpenedChannel>,
    pub manager: ForwardManager<StubConnector>,
}

impl Harness {
    pub async fn start(groups: &[&str], rules: Vec<ForwardingRule>) -> Self {
        let (connector, channels) = StubConnector::pair();
        let state = connector.state.clone();
        let registry =
            EndpointRegistry::new(groups.iter().map(|g| endpoint(g))).expect("valid registry");
        let pool = Arc::new(SessionPool::new(connector, Arc::new(registry)));

        let mut manager = ForwardManager::new(pool);
        manager.start(rules).await;

        Self {
            state,
            channels,
            manager,
        }
    }

    /// Local address of the `index`th started rule.
    pub fn addr(&self, index: usize) -> SocketAddr {
        self.manager.active_rules()[index].local_addr
    }

    pub async fn connect(&self, index: usize) -> TcpStream {
        tokio::time::timeout(WAIT, TcpStream::connect(self.addr(index)))
            .await
            .expect("connect timed out")
            .expect("connect failed")
    }

    pub async fn next_channel(&mut self) -> OpenedChannel {
        tokio::time::timeout(WAIT, self.channels.recv())
            .await
            .expect("no channel opened in time")
            .expect("stub connector dropped")
    }
}

/// Wait until the peer closes `stream`. A reset counts as closed.
pub async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    loop {
        match tokio::time::timeout(WAIT, stream.read(&mut buf))
            .await
            .expect("connection was not closed in time")
        {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}
