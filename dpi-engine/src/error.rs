use dpi_config::ConfigError;
use dpi_core::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Slot pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("A worker thread panicked")]
    WorkerPanicked,
}
