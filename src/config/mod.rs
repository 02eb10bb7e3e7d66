mod settings;

pub use settings::{
    CheckpointConfig, ConfigError, OrchestratorConfig, ProviderSelection, RetryConfig, VadConfig,
};
