use crate::addr::HostPort;
use crate::config::SshSettings;
use crate::endpoint::Endpoint;
use crate::error::{RelayError, Result};
use crate::ssh::auth::AuthMethod;
use crate::ssh::handler::ClientHandler;
use crate::tunnel::{Connector, TunnelSession};
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::ChannelStream;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Dials SSH sessions with a shared russh client configuration.
#[derive(Clone)]
pub struct SshConnector {
    settings: SshSettings,
    client_config: Arc<client::Config>,
}

impl SshConnector {
    pub fn new(settings: SshSettings) -> Self {
        let client_config = Arc::new(client::Config {
            inactivity_timeout: settings.inactivity_timeout(),
            keepalive_interval: settings.keepalive_interval(),
            keepalive_max: settings.keepalive_max,
            ..Default::default()
        });

        Self {
            settings,
            client_config,
        }
    }

    async fn establish(&self, endpoint: &Endpoint, auth: AuthMethod) -> Result<SshSession> {
        let addr = endpoint.address.to_string();
        let handler = ClientHandler::new(&endpoint.group);

        let mut handle = client::connect(self.client_config.clone(), addr.as_str(), handler)
            .await
            .map_err(|e| RelayError::Dial {
                group: endpoint.group.clone(),
                message: format!("{}: {}", addr, e),
            })?;

        debug!(group = %endpoint.group, %addr, "SSH transport established");

        auth.authenticate(&mut handle, &endpoint.group, &endpoint.user)
            .await?;

        info!(
            group = %endpoint.group,
            user = %endpoint.user,
            %addr,
            "SSH session established"
        );

        Ok(SshSession {
            group: endpoint.group.clone(),
            handle,
        })
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn dial(&self, endpoint: &Endpoint) -> Result<SshSession> {
        let auth = AuthMethod::resolve(endpoint)?;
        let timeout = self.settings.connect_timeout();

        match tokio::time::timeout(timeout, self.establish(endpoint, auth)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Dial {
                group: endpoint.group.clone(),
                message: format!(
                    "{}: timed out after {}s",
                    endpoint.address,
                    timeout.as_secs()
                ),
            }),
        }
    }
}

/// An authenticated SSH connection to one upstream group.
pub struct SshSession {
    group: String,
    handle: Handle<ClientHandler>,
}

impl SshSession {
    pub fn group(&self) -> &str {
        &self.group
    }
}

#[async_trait]
impl TunnelSession for SshSession {
    type Stream = ChannelStream<Msg>;

    async fn open_channel(
        &self,
        remote: &HostPort,
        originator: SocketAddr,
    ) -> Result<ChannelStream<Msg>> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(
                remote.host.clone(),
                remote.port as u32,
                originator.ip().to_string(),
                originator.port() as u32,
            )
            .await
            .map_err(|e| RelayError::ChannelOpen {
                group: self.group.clone(),
                remote: remote.to_string(),
                message: e.to_string(),
            })?;

        Ok(channel.into_stream())
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
