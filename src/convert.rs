//! Boundary conversion between the caller-facing [`SessionChunk`] and the
//! pipeline-facing [`PipelineElement`].
//!
//! Both directions are pure and deterministic. Media is routed by MIME
//! prefix: `video/*` and `image/*` map to their typed payloads; anything
//! else with a media delta is treated as audio at the default speech
//! sample rate.

use serde_json::Value;

use duplex_runtime_types::{
    AudioData, ImageData, MediaContent, PipelineElement, Priority, SessionChunk, VideoData,
    MIME_TYPE_AUDIO_WAV,
};

/// Converts incoming caller data to the pipeline representation.
pub fn chunk_to_element(chunk: &SessionChunk) -> PipelineElement {
    let mut elem = PipelineElement::default();

    if let Some((mime_type, data)) = chunk.media_delta.as_ref().and_then(media_payload) {
        if mime_type.starts_with("video/") {
            let mut video = VideoData {
                data: data.to_vec(),
                mime_type: mime_type.to_string(),
                ..VideoData::default()
            };
            if let Some(w) = metadata_u32(chunk, "width") {
                video.width = w;
            }
            if let Some(h) = metadata_u32(chunk, "height") {
                video.height = h;
            }
            if let Some(ts) = metadata_i64(chunk, "timestamp_ms") {
                video.timestamp_ms = ts;
            }
            if let Some(kf) = metadata_bool(chunk, "is_key_frame") {
                video.is_key_frame = kf;
            }
            if let Some(fc) = metadata_i64(chunk, "frame_num") {
                video.frame_num = fc;
            }
            elem.video = Some(video);
            elem.priority = Priority::High;
        } else if mime_type.starts_with("image/") {
            let mut image = ImageData {
                data: data.to_vec(),
                mime_type: mime_type.to_string(),
                ..ImageData::default()
            };
            if let Some(w) = metadata_u32(chunk, "width") {
                image.width = w;
            }
            if let Some(h) = metadata_u32(chunk, "height") {
                image.height = h;
            }
            if let Some(ts) = metadata_i64(chunk, "timestamp_ms") {
                image.timestamp_ms = ts;
            }
            if let Some(fc) = metadata_i64(chunk, "frame_num") {
                image.frame_num = fc;
            }
            elem.image = Some(image);
        } else {
            // Anything else rides the audio path, the historical default.
            elem.audio = Some(AudioData::pcm16(
                data.to_vec(),
                duplex_runtime_types::DEFAULT_SAMPLE_RATE,
            ));
            elem.priority = Priority::High;
        }
    }

    // Delta takes precedence over content when both are present.
    if !chunk.delta.is_empty() {
        elem.text = Some(chunk.delta.clone());
    } else if !chunk.content.is_empty() {
        elem.text = Some(chunk.content.clone());
    }

    for (key, value) in &chunk.metadata {
        elem.metadata.insert(key.clone(), value.clone());
    }
    if metadata_bool(chunk, "end_of_stream") == Some(true) {
        elem.end_of_stream = true;
    }

    elem
}

/// Converts pipeline output back to the caller representation. The element
/// is consumed; its metadata moves onto the chunk without copying.
pub fn element_to_chunk(elem: PipelineElement) -> SessionChunk {
    let mut chunk = SessionChunk::default();

    if let Some(audio) = elem.audio {
        if !audio.samples.is_empty() {
            chunk.media_delta = Some(MediaContent::new(MIME_TYPE_AUDIO_WAV, audio.samples));
        }
    }

    if let Some(text) = elem.text {
        if !text.is_empty() {
            // Duplicated into both fields for consumers that only read one.
            chunk.delta = text.clone();
            chunk.content = text;
        }
    }

    if let Some(error) = elem.error {
        chunk.error = Some(error);
    }

    chunk.metadata = elem.metadata;
    chunk
}

fn media_payload(media: &MediaContent) -> Option<(&str, &[u8])> {
    media
        .data
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| (media.mime_type.as_str(), d))
}

fn metadata_u32(chunk: &SessionChunk, key: &str) -> Option<u32> {
    chunk
        .metadata
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

fn metadata_i64(chunk: &SessionChunk, key: &str) -> Option<i64> {
    chunk.metadata.get(key).and_then(Value::as_i64)
}

fn metadata_bool(chunk: &SessionChunk, key: &str) -> Option<bool> {
    chunk.metadata.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_round_trips_exactly() {
        let chunk = SessionChunk::text("hello world");
        let elem = chunk_to_element(&chunk);
        assert_eq!(elem.text.as_deref(), Some("hello world"));

        let back = element_to_chunk(elem);
        assert_eq!(back.content, "hello world");
        assert_eq!(back.delta, "hello world");
    }

    #[test]
    fn delta_takes_precedence_over_content() {
        let chunk = SessionChunk {
            delta: "delta".to_string(),
            content: "content".to_string(),
            ..SessionChunk::default()
        };
        let elem = chunk_to_element(&chunk);
        assert_eq!(elem.text.as_deref(), Some("delta"));
    }

    #[test]
    fn video_mime_classifies_as_video() {
        let chunk = SessionChunk::media("video/mp4", vec![1, 2, 3])
            .with_metadata("width", json!(640))
            .with_metadata("height", json!(480))
            .with_metadata("timestamp_ms", json!(1234))
            .with_metadata("is_key_frame", json!(true))
            .with_metadata("frame_num", json!(7));

        let elem = chunk_to_element(&chunk);
        let video = elem.video.expect("video payload");
        assert!(elem.audio.is_none());
        assert!(elem.image.is_none());
        assert_eq!(video.data, vec![1, 2, 3]);
        assert_eq!(video.width, 640);
        assert_eq!(video.height, 480);
        assert_eq!(video.timestamp_ms, 1234);
        assert!(video.is_key_frame);
        assert_eq!(video.frame_num, 7);
        assert_eq!(elem.priority, Priority::High);
    }

    #[test]
    fn image_mime_classifies_as_image() {
        let chunk = SessionChunk::media("image/jpeg", vec![9])
            .with_metadata("width", json!(320))
            .with_metadata("frame_num", json!(2));

        let elem = chunk_to_element(&chunk);
        let image = elem.image.expect("image payload");
        assert_eq!(image.width, 320);
        assert_eq!(image.frame_num, 2);
        assert!(elem.video.is_none());
        assert!(elem.audio.is_none());
    }

    #[test]
    fn other_mime_defaults_to_audio() {
        let chunk = SessionChunk::media("application/octet-stream", vec![4, 5]);
        let elem = chunk_to_element(&chunk);
        let audio = elem.audio.expect("audio payload");
        assert_eq!(audio.samples, vec![4, 5]);
        assert_eq!(audio.sample_rate, duplex_runtime_types::DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn mistyped_metadata_fields_are_ignored() {
        let chunk = SessionChunk::media("video/webm", vec![1])
            .with_metadata("width", json!("640"))
            .with_metadata("is_key_frame", json!(1));

        let video = chunk_to_element(&chunk).video.expect("video payload");
        assert_eq!(video.width, 0);
        assert!(!video.is_key_frame);
    }

    #[test]
    fn out_of_range_dimensions_are_ignored_not_wrapped() {
        let chunk = SessionChunk::media("image/png", vec![1])
            .with_metadata("width", json!(u64::from(u32::MAX) + 1))
            .with_metadata("height", json!(240));

        let image = chunk_to_element(&chunk).image.expect("image payload");
        assert_eq!(image.width, 0);
        assert_eq!(image.height, 240);
    }

    #[test]
    fn end_of_stream_metadata_sets_flag() {
        let chunk = SessionChunk::text("bye").with_metadata("end_of_stream", json!(true));
        assert!(chunk_to_element(&chunk).end_of_stream);

        let chunk = SessionChunk::text("not yet").with_metadata("end_of_stream", json!(false));
        assert!(!chunk_to_element(&chunk).end_of_stream);
    }

    #[test]
    fn chunk_metadata_is_copied_onto_element() {
        let chunk = SessionChunk::text("t").with_metadata("turn", json!(3));
        let elem = chunk_to_element(&chunk);
        assert_eq!(elem.metadata.get("turn"), Some(&json!(3)));
    }

    #[test]
    fn element_audio_becomes_media_delta() {
        let elem = PipelineElement::audio(AudioData::pcm16(vec![1, 2, 3], 16_000));
        let chunk = element_to_chunk(elem);
        let media = chunk.media_delta.expect("media delta");
        assert_eq!(media.mime_type, MIME_TYPE_AUDIO_WAV);
        assert_eq!(media.data, Some(vec![1, 2, 3]));
    }

    #[test]
    fn element_error_becomes_chunk_error() {
        let elem = PipelineElement::error("stage exploded");
        let chunk = element_to_chunk(elem);
        assert_eq!(chunk.error.as_deref(), Some("stage exploded"));
    }

    #[test]
    fn media_round_trip_preserves_payload_bytes() {
        let chunk = SessionChunk::media("audio/wav", vec![7, 8, 9]);
        let elem = chunk_to_element(&chunk);
        let back = element_to_chunk(elem);
        assert_eq!(back.media_delta.and_then(|m| m.data), Some(vec![7, 8, 9]));
    }
}
