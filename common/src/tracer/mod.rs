mod tracer_engine;

pub use tracer_engine::TracerEngine;

/// Should be called at the start of each component.
#[macro_export]
macro_rules! init_tracer {
    () => {{ $crate::tracer::TracerEngine::new(env!("CARGO_BIN_NAME"), module_path!()) }};
}
