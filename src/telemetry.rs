//! Logging setup for the binaries.

use tracing_subscriber::EnvFilter;

use crate::RpcError;

/// Directive applied on top of `RUST_LOG` so the services log at `info`
/// out of the box.
pub const DEFAULT_DIRECTIVE: &str = "msa_rpc=info";

/// Installs a `fmt` subscriber filtered by `RUST_LOG` plus `directives`.
pub fn init_tracing(directives: &[&str]) -> Result<(), RpcError> {
    let mut filter = EnvFilter::from_default_env();
    for raw in directives {
        let directive = raw
            .parse()
            .map_err(|e| RpcError::ConfigError(format!("bad log directive `{raw}`: {e}")))?;
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| RpcError::ConfigError(format!("tracing already initialised: {e}")))
}

/// Runs `f` under a thread-local `fmt` subscriber and returns what it logged.
#[cfg(test)]
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directive() {
        assert!(matches!(
            init_tracing(&[DEFAULT_DIRECTIVE, "msa_rpc=notalevel"]),
            Err(RpcError::ConfigError(_))
        ));
    }

    #[test]
    fn capture_logs_records_events_in_order() {
        let logs = capture_logs(|| {
            tracing::info!("first");
            tracing::debug!("hidden");
            tracing::warn!("second");
        });
        let first = logs.find("first").unwrap();
        let second = logs.find("second").unwrap();
        assert!(first < second);
        assert!(!logs.contains("hidden"));
    }
}
