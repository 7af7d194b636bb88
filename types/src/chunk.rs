use std::collections::HashMap;

/// MIME type assigned to audio payloads converted back to the caller-facing
/// representation.
pub const MIME_TYPE_AUDIO_WAV: &str = "audio/wav";

/// Finish reason carried by the terminal chunk of a successful stream.
pub const FINISH_REASON_STOP: &str = "stop";
/// Finish reason carried by a chunk that delivers a failure.
pub const FINISH_REASON_ERROR: &str = "error";

/// Raw media payload with its MIME type.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaContent {
    /// MIME type of the payload (e.g. "audio/wav", "image/jpeg", "video/mp4").
    pub mime_type: String,

    /// Payload bytes. Absent for announcements that carry only a MIME type.
    pub data: Option<Vec<u8>>,
}

impl MediaContent {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Some(data),
        }
    }
}

/// The caller-facing unit of streamed session input and output.
///
/// The same shape is used in both directions: callers feed chunks into a
/// session and read chunks back from its response stream. A chunk used as
/// session *input* must carry at least a media delta or text content,
/// otherwise the session rejects it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionChunk {
    /// Incremental text produced since the previous chunk.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delta: String,

    /// Text content. On output this may hold the accumulated text so far,
    /// duplicated alongside `delta` for consumers that only read one field.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,

    /// Incremental media payload (audio, image or video) with its MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_delta: Option<MediaContent>,

    /// Free-form metadata attached to this chunk.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Failure delivered in-band on the response stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Marks the end of a response ("stop", "error").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl SessionChunk {
    /// Creates a chunk carrying text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Creates a chunk carrying a media delta.
    pub fn media(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_delta: Some(MediaContent::new(mime_type, data)),
            ..Self::default()
        }
    }

    /// Creates an error chunk with the given finish reason.
    pub fn error(message: impl Into<String>, finish_reason: Option<&str>) -> Self {
        Self {
            error: Some(message.into()),
            finish_reason: finish_reason.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True when the chunk satisfies the session-input invariant: it carries
    /// media payload bytes or text in either text field.
    pub fn has_input_content(&self) -> bool {
        let has_media = self
            .media_delta
            .as_ref()
            .and_then(|m| m.data.as_ref())
            .is_some_and(|d| !d.is_empty());
        has_media || !self.content.is_empty() || !self.delta.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_invariant_rejects_empty_chunk() {
        assert!(!SessionChunk::default().has_input_content());
    }

    #[test]
    fn input_invariant_accepts_text_and_media() {
        assert!(SessionChunk::text("hi").has_input_content());
        assert!(SessionChunk::media("audio/wav", vec![1, 2]).has_input_content());

        let delta_only = SessionChunk {
            delta: "d".to_string(),
            ..SessionChunk::default()
        };
        assert!(delta_only.has_input_content());
    }

    #[test]
    fn media_without_payload_bytes_is_not_input() {
        let chunk = SessionChunk {
            media_delta: Some(MediaContent {
                mime_type: "audio/wav".to_string(),
                data: None,
            }),
            ..SessionChunk::default()
        };
        assert!(!chunk.has_input_content());
    }
}
