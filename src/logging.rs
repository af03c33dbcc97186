use crate::cli::{Cli, LogFormat};
use std::io::Write;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// A writer that wraps stderr and flushes after each write.
/// This ensures log lines are immediately visible when stderr is piped.
struct FlushingStderr;

impl Write for FlushingStderr {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        let n = handle.write(buf)?;
        handle.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()
    }
}

/// Whether SSH transport crates should log at the requested level.
fn wants_verbose_ssh(rust_log: &str, log_level: &str) -> bool {
    rust_log.contains("russh")
        || rust_log.contains("ssh_key")
        || log_level.eq_ignore_ascii_case("trace")
}

/// Initialize the logging system based on CLI configuration.
pub fn init_logging(cli: &Cli) {
    let base_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Every relay touches russh; keep its chatter out unless asked for.
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let filter = if wants_verbose_ssh(&rust_log, &cli.log_level) {
        base_filter
    } else {
        base_filter
            .add_directive("russh=info".parse().unwrap())
            .add_directive("ssh_key=info".parse().unwrap())
    };

    let use_color = cli.color.should_enable();

    match cli.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(true)
                        .with_writer(|| FlushingStderr),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_ansi(use_color)
                        .with_target(false)
                        .with_writer(|| FlushingStderr),
                )
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .pretty()
                        .with_ansi(use_color)
                        .with_target(false)
                        .with_writer(|| FlushingStderr),
                )
                .init();
        }
    }
}
