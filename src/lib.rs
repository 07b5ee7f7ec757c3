pub mod config;
pub mod recognizer;
pub mod server;
pub mod upload;

/// Process-level setup shared by the binary and integration tests
pub mod util {
    use tracing_subscriber::EnvFilter;

    /// Install the global tracing subscriber. `RUST_LOG` wins over the
    /// built-in default directive when it is set.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(super::config::RUST_LOG));

        // A second call (e.g. from tests) leaves the first subscriber in place
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
