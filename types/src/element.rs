use std::collections::HashMap;

/// Default sample rate assumed for incoming speech audio, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Scheduling priority for pipeline elements. Higher priority elements are
/// processed before lower priority ones by stages that implement QoS.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Encoding format of audio samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Pcm16,
    Float32,
    Opus,
    Mp3,
    Aac,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm16 => "pcm16",
            AudioFormat::Float32 => "float32",
            AudioFormat::Opus => "opus",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "aac",
        }
    }
}

/// Audio samples with their format attributes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioData {
    pub samples: Vec<u8>,
    /// Sample rate in Hz (e.g. 16000, 44100).
    pub sample_rate: u32,
    /// 1 = mono, 2 = stereo.
    pub channels: u16,
    pub format: AudioFormat,
}

impl Default for AudioData {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            format: AudioFormat::Pcm16,
        }
    }
}

impl AudioData {
    pub fn pcm16(samples: Vec<u8>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            ..Self::default()
        }
    }
}

/// Encoded image data with streaming attributes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageData {
    pub data: Vec<u8>,
    /// MIME type (e.g. "image/jpeg", "image/png").
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Frame sequence number, for ordering in realtime streams.
    pub frame_num: i64,
    /// Capture timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// Encoded video frame or segment with streaming attributes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoData {
    pub data: Vec<u8>,
    /// MIME type (e.g. "video/mp4", "video/webm").
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Chunk sequence number, for ordering in realtime streams.
    pub frame_num: i64,
    /// Capture timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub is_key_frame: bool,
}

/// The internal unit of data flowing through pipeline stages.
///
/// An element carries at most one typed payload (text, audio, image or
/// video); an element with no payload is a control element. Converting a
/// session chunk to an element and back preserves text and the primary
/// media payload bytes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoData>,

    /// Metadata passed between stages.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub priority: Priority,

    /// No more elements follow this one.
    #[serde(default)]
    pub end_of_stream: bool,
    /// Failure propagated through the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineElement {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn audio(audio: AudioData) -> Self {
        Self {
            audio: Some(audio),
            priority: Priority::High,
            ..Self::default()
        }
    }

    pub fn image(image: ImageData) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }

    pub fn video(video: VideoData) -> Self {
        Self {
            video: Some(video),
            priority: Priority::High,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            priority: Priority::Critical,
            ..Self::default()
        }
    }

    pub fn end_of_stream() -> Self {
        Self {
            end_of_stream: true,
            priority: Priority::Critical,
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True when the element carries a typed payload.
    pub fn has_content(&self) -> bool {
        self.text.is_some() || self.audio.is_some() || self.image.is_some() || self.video.is_some()
    }

    /// True for control elements (error or end-of-stream).
    pub fn is_control(&self) -> bool {
        self.error.is_some() || self.end_of_stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_priorities() {
        assert_eq!(PipelineElement::text("t").priority, Priority::Normal);
        assert_eq!(
            PipelineElement::audio(AudioData::default()).priority,
            Priority::High
        );
        assert_eq!(
            PipelineElement::video(VideoData::default()).priority,
            Priority::High
        );
        assert_eq!(PipelineElement::error("boom").priority, Priority::Critical);
    }

    #[test]
    fn control_and_content_classification() {
        let text = PipelineElement::text("t");
        assert!(text.has_content());
        assert!(!text.is_control());

        let eos = PipelineElement::end_of_stream();
        assert!(!eos.has_content());
        assert!(eos.is_control());

        let failed = PipelineElement::error("boom");
        assert!(!failed.has_content());
        assert!(failed.is_control());
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
