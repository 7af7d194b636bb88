//! Configuration knobs for duplex streaming sessions.
//!
//! These types mirror the shape produced by an external configuration
//! loader; they only validate themselves and apply documented defaults.
//! Numeric accessors return the documented default when the configured
//! value is absent, zero, or negative.

use std::time::Duration;

/// Default silence duration that ends a turn, in milliseconds.
pub const DEFAULT_SILENCE_THRESHOLD_MS: i64 = 500;
/// Default minimum speech duration before silence counts, in milliseconds.
pub const DEFAULT_MIN_SPEECH_MS: i64 = 1000;
/// Default forced turn end, in seconds.
pub const DEFAULT_MAX_TURN_DURATION_S: i64 = 60;

/// Default retry attempts for failed turns.
pub const DEFAULT_MAX_RETRIES: i64 = 3;
/// Default delay between retries, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: i64 = 1000;
/// Default delay between turns, in milliseconds.
pub const DEFAULT_INTER_TURN_DELAY_MS: i64 = 500;
/// Default delay after self-played turns, in milliseconds. Longer than the
/// regular inter-turn delay because synthesized audio can be lengthy.
pub const DEFAULT_SELFPLAY_INTER_TURN_DELAY_MS: i64 = 1000;
/// Default minimum completed turns to accept a partially-successful run.
pub const DEFAULT_PARTIAL_SUCCESS_MIN_TURNS: i64 = 1;

/// Configuration validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid duplex timeout {timeout:?}: {reason}")]
    InvalidTimeout { timeout: String, reason: String },

    #[error("{field} must be non-negative, got {value}")]
    NegativeField { field: &'static str, value: i64 },

    #[error("tts provider is required")]
    MissingTtsProvider,

    #[error("tts voice is required")]
    MissingTtsVoice,
}

/// How turn boundaries are detected in a duplex conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnDetectionMode {
    /// Voice activity detection: turn boundaries inferred locally from
    /// silence/speech timing thresholds.
    Vad,
    /// Provider-native (server-side) turn detection signals.
    Asm,
}

/// Turn detection settings for duplex mode.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TurnDetectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TurnDetectionMode>,

    /// Voice activity detection settings, used when `mode` is `Vad`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vad: Option<VadConfig>,
}

impl TurnDetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == Some(TurnDetectionMode::Vad) {
            if let Some(vad) = &self.vad {
                vad.validate()?;
            }
        }
        Ok(())
    }
}

/// Voice activity detection thresholds.
///
/// Fields follow the accessor-with-default convention: a zero value means
/// "use the documented default".
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VadConfig {
    #[serde(default)]
    silence_threshold_ms: i64,
    #[serde(default)]
    min_speech_ms: i64,
    #[serde(default)]
    max_turn_duration_s: i64,
}

impl VadConfig {
    pub fn with_silence_threshold_ms(mut self, ms: i64) -> Self {
        self.silence_threshold_ms = ms;
        self
    }

    pub fn with_min_speech_ms(mut self, ms: i64) -> Self {
        self.min_speech_ms = ms;
        self
    }

    pub fn with_max_turn_duration_s(mut self, s: i64) -> Self {
        self.max_turn_duration_s = s;
        self
    }

    /// Silence duration that ends a turn, in milliseconds (default: 500).
    pub fn silence_threshold_ms(&self) -> i64 {
        if self.silence_threshold_ms <= 0 {
            DEFAULT_SILENCE_THRESHOLD_MS
        } else {
            self.silence_threshold_ms
        }
    }

    /// Minimum speech duration before silence counts, in milliseconds
    /// (default: 1000).
    pub fn min_speech_ms(&self) -> i64 {
        if self.min_speech_ms <= 0 {
            DEFAULT_MIN_SPEECH_MS
        } else {
            self.min_speech_ms
        }
    }

    /// Forced turn end after this duration, in seconds (default: 60).
    pub fn max_turn_duration_s(&self) -> i64 {
        if self.max_turn_duration_s <= 0 {
            DEFAULT_MAX_TURN_DURATION_S
        } else {
            self.max_turn_duration_s
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.silence_threshold_ms < 0 {
            return Err(ConfigError::NegativeField {
                field: "silence_threshold_ms",
                value: self.silence_threshold_ms,
            });
        }
        if self.min_speech_ms < 0 {
            return Err(ConfigError::NegativeField {
                field: "min_speech_ms",
                value: self.min_speech_ms,
            });
        }
        if self.max_turn_duration_s < 0 {
            return Err(ConfigError::NegativeField {
                field: "max_turn_duration_s",
                value: self.max_turn_duration_s,
            });
        }
        Ok(())
    }
}

/// Error handling and retry behavior for duplex streaming.
///
/// Retrying itself is the responsibility of the pipeline/provider layer;
/// sessions only carry this configuration through to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    max_retries: i64,
    #[serde(default)]
    retry_delay_ms: i64,
    #[serde(default)]
    inter_turn_delay_ms: i64,
    #[serde(default)]
    selfplay_inter_turn_delay_ms: i64,
    #[serde(default)]
    partial_success_min_turns: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ignore_last_turn_session_end: Option<bool>,
}

impl ResilienceConfig {
    pub fn with_max_retries(mut self, n: i64) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_retry_delay_ms(mut self, ms: i64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn with_inter_turn_delay_ms(mut self, ms: i64) -> Self {
        self.inter_turn_delay_ms = ms;
        self
    }

    pub fn with_selfplay_inter_turn_delay_ms(mut self, ms: i64) -> Self {
        self.selfplay_inter_turn_delay_ms = ms;
        self
    }

    pub fn with_partial_success_min_turns(mut self, n: i64) -> Self {
        self.partial_success_min_turns = n;
        self
    }

    pub fn with_ignore_last_turn_session_end(mut self, ignore: bool) -> Self {
        self.ignore_last_turn_session_end = Some(ignore);
        self
    }

    /// Retry attempts for failed turns (default: 3).
    pub fn max_retries(&self) -> i64 {
        if self.max_retries <= 0 {
            DEFAULT_MAX_RETRIES
        } else {
            self.max_retries
        }
    }

    /// Delay between retries, in milliseconds (default: 1000).
    pub fn retry_delay_ms(&self) -> i64 {
        if self.retry_delay_ms <= 0 {
            DEFAULT_RETRY_DELAY_MS
        } else {
            self.retry_delay_ms
        }
    }

    /// Delay between turns, in milliseconds (default: 500).
    pub fn inter_turn_delay_ms(&self) -> i64 {
        if self.inter_turn_delay_ms <= 0 {
            DEFAULT_INTER_TURN_DELAY_MS
        } else {
            self.inter_turn_delay_ms
        }
    }

    /// Delay after self-played turns, in milliseconds (default: 1000).
    pub fn selfplay_inter_turn_delay_ms(&self) -> i64 {
        if self.selfplay_inter_turn_delay_ms <= 0 {
            DEFAULT_SELFPLAY_INTER_TURN_DELAY_MS
        } else {
            self.selfplay_inter_turn_delay_ms
        }
    }

    /// Minimum completed turns to accept a partially-successful run
    /// (default: 1).
    pub fn partial_success_min_turns(&self) -> i64 {
        if self.partial_success_min_turns <= 0 {
            DEFAULT_PARTIAL_SUCCESS_MIN_TURNS
        } else {
            self.partial_success_min_turns
        }
    }

    /// Whether a session-end signal on the final turn is treated as success.
    /// Unlike the numeric knobs this has no global default; each call site
    /// supplies its own.
    pub fn ignore_last_turn_session_end(&self, default: bool) -> bool {
        self.ignore_last_turn_session_end.unwrap_or(default)
    }
}

/// Text-to-speech settings for self-played audio turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TtsConfig {
    /// TTS provider identifier (e.g. "openai", "elevenlabs").
    pub provider: String,
    /// Voice identifier to synthesize with.
    pub voice: String,
}

impl TtsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.is_empty() {
            return Err(ConfigError::MissingTtsProvider);
        }
        if self.voice.is_empty() {
            return Err(ConfigError::MissingTtsVoice);
        }
        Ok(())
    }
}

/// Streaming-mode configuration for a duplex session.
///
/// Passing this to a session constructor selects signal-based (ASM) mode;
/// leaving it out selects silence-based (VAD) mode.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DuplexConfig {
    /// Maximum session duration as a human-readable string (e.g. "10m",
    /// "5m 30s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetectionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resilience: Option<ResilienceConfig>,
}

impl DuplexConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = &self.timeout {
            humantime::parse_duration(timeout).map_err(|e| ConfigError::InvalidTimeout {
                timeout: timeout.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(turn_detection) = &self.turn_detection {
            turn_detection.validate()?;
        }
        Ok(())
    }

    /// The configured timeout, or `default` when absent or unparsable.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout
            .as_deref()
            .and_then(|t| humantime::parse_duration(t).ok())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resilience_accessors_default_when_zero() {
        let cfg = ResilienceConfig::default();
        assert_eq!(cfg.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(cfg.retry_delay_ms(), DEFAULT_RETRY_DELAY_MS);
        assert_eq!(cfg.inter_turn_delay_ms(), DEFAULT_INTER_TURN_DELAY_MS);
        assert_eq!(
            cfg.selfplay_inter_turn_delay_ms(),
            DEFAULT_SELFPLAY_INTER_TURN_DELAY_MS
        );
        assert_eq!(
            cfg.partial_success_min_turns(),
            DEFAULT_PARTIAL_SUCCESS_MIN_TURNS
        );
    }

    #[test]
    fn resilience_accessors_default_when_negative() {
        let cfg = ResilienceConfig::default()
            .with_max_retries(-1)
            .with_retry_delay_ms(-5);
        assert_eq!(cfg.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(cfg.retry_delay_ms(), DEFAULT_RETRY_DELAY_MS);
    }

    #[test]
    fn resilience_accessors_keep_configured_values() {
        let cfg = ResilienceConfig::default()
            .with_max_retries(7)
            .with_inter_turn_delay_ms(250);
        assert_eq!(cfg.max_retries(), 7);
        assert_eq!(cfg.inter_turn_delay_ms(), 250);
    }

    #[test]
    fn ignore_last_turn_session_end_defaults_per_call_site() {
        let cfg = ResilienceConfig::default();
        assert!(cfg.ignore_last_turn_session_end(true));
        assert!(!cfg.ignore_last_turn_session_end(false));

        let cfg = cfg.with_ignore_last_turn_session_end(false);
        assert!(!cfg.ignore_last_turn_session_end(true));
    }

    #[test]
    fn vad_validation_rejects_negative_fields() {
        let cfg = VadConfig::default().with_silence_threshold_ms(-1);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NegativeField {
                field: "silence_threshold_ms",
                value: -1,
            })
        );

        let cfg = VadConfig::default().with_min_speech_ms(-10);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn vad_accessors_default_when_zero() {
        let cfg = VadConfig::default();
        assert_eq!(cfg.silence_threshold_ms(), DEFAULT_SILENCE_THRESHOLD_MS);
        assert_eq!(cfg.min_speech_ms(), DEFAULT_MIN_SPEECH_MS);
        assert_eq!(cfg.max_turn_duration_s(), DEFAULT_MAX_TURN_DURATION_S);
    }

    #[test]
    fn tts_requires_provider_and_voice() {
        let cfg = TtsConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingTtsProvider));

        let cfg = TtsConfig {
            provider: "openai".to_string(),
            voice: String::new(),
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MissingTtsVoice));

        let cfg = TtsConfig {
            provider: "openai".to_string(),
            voice: "alloy".to_string(),
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn duplex_timeout_validation() {
        let cfg = DuplexConfig {
            timeout: Some("10m".to_string()),
            ..DuplexConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.timeout_or(Duration::from_secs(1)), Duration::from_secs(600));

        let cfg = DuplexConfig {
            timeout: Some("not-a-duration".to_string()),
            ..DuplexConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.timeout_or(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn turn_detection_mode_serde_names() {
        let vad: TurnDetectionMode = serde_json::from_str("\"vad\"").unwrap();
        assert_eq!(vad, TurnDetectionMode::Vad);
        let asm: TurnDetectionMode = serde_json::from_str("\"asm\"").unwrap();
        assert_eq!(asm, TurnDetectionMode::Asm);
        assert!(serde_json::from_str::<TurnDetectionMode>("\"other\"").is_err());
    }

    #[test]
    fn vad_config_only_validated_in_vad_mode() {
        let cfg = TurnDetectionConfig {
            mode: Some(TurnDetectionMode::Asm),
            vad: Some(VadConfig::default().with_silence_threshold_ms(-1)),
        };
        assert!(cfg.validate().is_ok());

        let cfg = TurnDetectionConfig {
            mode: Some(TurnDetectionMode::Vad),
            ..cfg
        };
        assert!(cfg.validate().is_err());
    }
}
