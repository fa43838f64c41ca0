use tracing::debug;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

/// This object initialises the log tracer of a component, which writes to stderr.
/// The level of detail is taken from the `RUST_LOG` environment variable.
pub struct TracerEngine {
    service_name: String,
}

impl TracerEngine {
    /// Initialises the log tracer for the crate
    /// #Arguments
    /// * `service_name` - The name of the component, reported once at start-up.
    /// * `module_name` - The name of the current module.
    /// #Returns
    /// An instance of TracerEngine
    pub fn new(service_name: &str, module_name: &str) -> Self {
        let log_tracer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        // This filter is applied to the log tracer
        let log_filter = EnvFilter::from_default_env();

        let subscriber =
            tracing_subscriber::Registry::default().with(log_tracer.with_filter(log_filter));

        // A second initialisation (e.g. from a test harness) keeps the first subscriber
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("Global tracing subscriber already set");
        }
        debug!("Tracer initialised for {service_name} ({module_name})");

        Self {
            service_name: service_name.to_owned(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
