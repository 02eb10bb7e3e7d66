//! Typed configuration, loaded by layering defaults, an optional YAML file,
//! and environment variable overrides, following the source project's
//! `CliConfig::apply_env_overrides` pattern (§6 "Environment").

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors loading configuration from a file (§6).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("could not parse config file as YAML: {0}")]
    Parse(String),
}

/// Which concrete provider family to instantiate for a given adapter slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSelection {
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub stt_provider: String,
    pub stt_model: String,
    pub stt_language: String,
    pub tts_provider: String,
    pub tts_model: String,
    pub tts_voice_id: String,
    pub tts_language: String,
}

impl Default for ProviderSelection {
    fn default() -> Self {
        Self {
            llm_model: "gpt-4o".to_string(),
            llm_temperature: 0.3,
            llm_max_tokens: 2048,
            stt_provider: "deepgram".to_string(),
            stt_model: "nova-2".to_string(),
            stt_language: "en".to_string(),
            tts_provider: "cartesia".to_string(),
            tts_model: "sonic-english".to_string(),
            tts_voice_id: "default".to_string(),
            tts_language: "en".to_string(),
        }
    }
}

/// Voice-activity-detection / endpointing thresholds (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VadConfig {
    pub activation_threshold: f32,
    pub min_speech_ms: u32,
    pub min_silence_ms: u32,
    pub padding_ms: u32,
    pub interrupt_min_speech_ms: u32,
    pub interrupt_min_words: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 0.5,
            min_speech_ms: 150,
            min_silence_ms: 700,
            padding_ms: 200,
            interrupt_min_speech_ms: 250,
            interrupt_min_words: 2,
        }
    }
}

/// Exponential-backoff-with-jitter retry policy (§4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
    pub timeout: Duration,
    pub circuit_failure_threshold: u32,
    pub circuit_reset_after: Duration,
}

impl RetryConfig {
    /// Defaults for generic (ASR/TTS/embedding) provider calls.
    pub fn generic() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
            timeout: Duration::from_secs(30),
            circuit_failure_threshold: 5,
            circuit_reset_after: Duration::from_secs(30),
        }
    }

    /// Defaults for LLM calls, which get a longer initial backoff/cap/timeout.
    pub fn llm() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(15),
            multiplier: 2.0,
            jitter_factor: 0.1,
            timeout: Duration::from_secs(60),
            circuit_failure_threshold: 5,
            circuit_reset_after: Duration::from_secs(30),
        }
    }
}

/// Checkpointing cadence (§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    pub periodic_interval: Duration,
    pub ring_capacity: usize,
    pub answer_timeout: Duration,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            periodic_interval: Duration::from_secs(60),
            ring_capacity: 10,
            answer_timeout: Duration::from_secs(90),
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    pub providers: ProviderSelection,
    pub vad: VadConfig,
    #[serde(with = "retry_config_serde")]
    pub retry_generic: RetryConfig,
    #[serde(with = "retry_config_serde")]
    pub retry_llm: RetryConfig,
    #[serde(with = "checkpoint_config_serde")]
    pub checkpoint: CheckpointConfig,
    /// Behind-a-flag mock ingestion branch (§4.7, §9 open question).
    pub mock_ingestion: bool,
    pub max_questions: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            providers: ProviderSelection::default(),
            vad: VadConfig::default(),
            retry_generic: RetryConfig::generic(),
            retry_llm: RetryConfig::llm(),
            checkpoint: CheckpointConfig::default(),
            mock_ingestion: false,
            max_questions: 10,
        }
    }
}

impl OrchestratorConfig {
    /// Apply environment variable overrides (§6 "Environment").
    ///
    /// Priority: env vars > defaults. There is no config file layer for the
    /// core itself — the collaborating HTTP API is responsible for anything
    /// more structured than environment variables.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("LLM_MODEL") {
            if !val.is_empty() {
                self.providers.llm_model = val;
            }
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(t) = val.parse::<f32>() {
                self.providers.llm_temperature = t.clamp(0.0, 2.0);
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_TOKENS") {
            if let Ok(t) = val.parse::<u32>() {
                self.providers.llm_max_tokens = t;
            }
        }
        if let Ok(val) = std::env::var("STT_PROVIDER") {
            if !val.is_empty() {
                self.providers.stt_provider = val;
            }
        }
        if let Ok(val) = std::env::var("STT_MODEL") {
            if !val.is_empty() {
                self.providers.stt_model = val;
            }
        }
        if let Ok(val) = std::env::var("STT_LANGUAGE") {
            if !val.is_empty() {
                self.providers.stt_language = val;
            }
        }
        if let Ok(val) = std::env::var("TTS_PROVIDER") {
            if !val.is_empty() {
                self.providers.tts_provider = val;
            }
        }
        if let Ok(val) = std::env::var("TTS_MODEL") {
            if !val.is_empty() {
                self.providers.tts_model = val;
            }
        }
        if let Ok(val) = std::env::var("TTS_VOICE_ID") {
            if !val.is_empty() {
                self.providers.tts_voice_id = val;
            }
        }
        if let Ok(val) = std::env::var("TTS_LANGUAGE") {
            if !val.is_empty() {
                self.providers.tts_language = val;
            }
        }
        if let Ok(val) = std::env::var("REVIEW_CHECKPOINT_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.checkpoint.periodic_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("REVIEW_ANSWER_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.checkpoint.answer_timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("REVIEW_MOCK_INGESTION") {
            self.mock_ingestion = val.eq_ignore_ascii_case("true") || val == "1";
        }
        self
    }

    /// Load defaults with environment overrides applied, with no config
    /// file layer.
    pub fn load_with_env() -> Self {
        Self::default().apply_env_overrides()
    }

    /// Loads configuration by layering defaults, an optional YAML config
    /// file, and environment variable overrides, in that priority order
    /// (§6 "Environment"). A missing or unreadable file falls back to
    /// defaults rather than failing the whole load, since env overrides
    /// alone are a valid way to configure the process.
    pub fn load(config_path: Option<&Path>) -> Self {
        let base = match config_path {
            Some(path) => Self::from_yaml_file(path).unwrap_or_else(|err| {
                warn!(%err, path = %path.display(), "falling back to defaults: could not load config file");
                Self::default()
            }),
            None => Self::default(),
        };
        base.apply_env_overrides()
    }

    /// Reads and parses a YAML config file without applying env overrides.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// serde helpers for `Duration` fields nested in structs we want to keep
// serializable for checkpoint snapshots without pulling in a Duration-serde
// crate dependency.
mod retry_config_serde {
    use super::RetryConfig;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Shadow {
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        multiplier: f64,
        jitter_factor: f64,
        timeout_ms: u64,
        circuit_failure_threshold: u32,
        circuit_reset_after_ms: u64,
    }

    pub fn serialize<S: Serializer>(value: &RetryConfig, s: S) -> Result<S::Ok, S::Error> {
        Shadow {
            max_attempts: value.max_attempts,
            initial_backoff_ms: value.initial_backoff.as_millis() as u64,
            max_backoff_ms: value.max_backoff.as_millis() as u64,
            multiplier: value.multiplier,
            jitter_factor: value.jitter_factor,
            timeout_ms: value.timeout.as_millis() as u64,
            circuit_failure_threshold: value.circuit_failure_threshold,
            circuit_reset_after_ms: value.circuit_reset_after.as_millis() as u64,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RetryConfig, D::Error> {
        let shadow = Shadow::deserialize(d)?;
        Ok(RetryConfig {
            max_attempts: shadow.max_attempts,
            initial_backoff: Duration::from_millis(shadow.initial_backoff_ms),
            max_backoff: Duration::from_millis(shadow.max_backoff_ms),
            multiplier: shadow.multiplier,
            jitter_factor: shadow.jitter_factor,
            timeout: Duration::from_millis(shadow.timeout_ms),
            circuit_failure_threshold: shadow.circuit_failure_threshold,
            circuit_reset_after: Duration::from_millis(shadow.circuit_reset_after_ms),
        })
    }
}

mod checkpoint_config_serde {
    use super::CheckpointConfig;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Shadow {
        periodic_interval_ms: u64,
        ring_capacity: usize,
        answer_timeout_ms: u64,
    }

    pub fn serialize<S: Serializer>(value: &CheckpointConfig, s: S) -> Result<S::Ok, S::Error> {
        Shadow {
            periodic_interval_ms: value.periodic_interval.as_millis() as u64,
            ring_capacity: value.ring_capacity,
            answer_timeout_ms: value.answer_timeout.as_millis() as u64,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CheckpointConfig, D::Error> {
        let shadow = Shadow::deserialize(d)?;
        Ok(CheckpointConfig {
            periodic_interval: Duration::from_millis(shadow.periodic_interval_ms),
            ring_capacity: shadow.ring_capacity,
            answer_timeout: Duration::from_millis(shadow.answer_timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.max_questions, 10);
        assert!(!cfg.mock_ingestion);
        assert_eq!(cfg.checkpoint.ring_capacity, 10);
    }

    #[test]
    fn env_override_mock_ingestion() {
        std::env::set_var("REVIEW_MOCK_INGESTION", "true");
        let cfg = OrchestratorConfig::default().apply_env_overrides();
        assert!(cfg.mock_ingestion);
        std::env::remove_var("REVIEW_MOCK_INGESTION");
    }

    #[test]
    fn env_override_llm_model() {
        std::env::set_var("LLM_MODEL", "gpt-4o-mini");
        let cfg = OrchestratorConfig::default().apply_env_overrides();
        assert_eq!(cfg.providers.llm_model, "gpt-4o-mini");
        std::env::remove_var("LLM_MODEL");
    }

    #[test]
    fn yaml_file_overrides_defaults_and_env_wins_over_file() {
        let mut cfg = OrchestratorConfig::default();
        cfg.providers.llm_model = "from-file-model".to_string();
        cfg.max_questions = 6;
        let yaml = serde_yaml::to_string(&cfg).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, yaml.as_bytes()).unwrap();

        std::env::set_var("LLM_MODEL", "from-env-model");
        let loaded = OrchestratorConfig::load(Some(file.path()));
        std::env::remove_var("LLM_MODEL");

        assert_eq!(loaded.max_questions, 6);
        assert_eq!(loaded.providers.llm_model, "from-env-model");
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let loaded = OrchestratorConfig::load(Some(Path::new("/nonexistent/review-orchestrator.yaml")));
        assert_eq!(loaded, OrchestratorConfig::default());
    }
}
