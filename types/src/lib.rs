pub mod chunk;
pub mod config;
pub mod element;
mod message;

pub use chunk::{
    MediaContent, SessionChunk, FINISH_REASON_ERROR, FINISH_REASON_STOP, MIME_TYPE_AUDIO_WAV,
};
pub use config::{
    ConfigError, DuplexConfig, ResilienceConfig, TtsConfig, TurnDetectionConfig, TurnDetectionMode,
    VadConfig,
};
pub use element::{
    AudioData, AudioFormat, ImageData, PipelineElement, Priority, VideoData, DEFAULT_SAMPLE_RATE,
};
pub use message::{Message, Role};
