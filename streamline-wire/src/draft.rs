use std::collections::HashMap;
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use crate::error::WireError;
use crate::payload::{AudioPayload, BytesPayload, ImagePayload, ObjectPayload, VideoPayload};

/// A payload type that can be built incrementally through a [`Draft`].
///
/// `FIELDS` is the closed set of names a draft targeting this type will accept;
/// anything else is rejected with [`WireError::UnknownDraftField`].
pub trait DraftTarget: Sized {
    /// The payload type's name, for diagnostics.
    const TYPE_NAME: &'static str;
    /// The field names this type accepts from a draft.
    const FIELDS: &'static [&'static str];

    /// Build the final, immutable payload from the fields a draft collected.
    fn from_draft(values: HashMap<String, Value>) -> Result<Self, WireError>;
}

/// A mutable builder for a payload, restricted to the target type's declared
/// fields. Compiling a draft produces an immutable payload; a draft with an
/// unknown field name, or missing a required one, never compiles.
#[derive(Debug, Clone)]
pub struct Draft<T> {
    fields: HashMap<String, Value>,
    _target: PhantomData<T>,
}

impl<T: DraftTarget> Default for Draft<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DraftTarget> Draft<T> {
    /// Start an empty draft.
    pub fn new() -> Self {
        Draft {
            fields: HashMap::new(),
            _target: PhantomData,
        }
    }

    /// Set a field on this draft, rejecting names the target type doesn't declare.
    pub fn set<V: Serialize>(&mut self, field: &str, value: V) -> Result<&mut Self, WireError> {
        if !T::FIELDS.contains(&field) {
            return Err(WireError::UnknownDraftField {
                payload_type: T::TYPE_NAME,
                field: field.to_string(),
            });
        }

        let value = serde_json::to_value(value)?;
        self.fields.insert(field.to_string(), value);
        Ok(self)
    }

    /// Compile this draft into its target payload, failing if a required field
    /// was never set.
    pub fn compile(self) -> Result<T, WireError> {
        T::from_draft(self.fields)
    }
}

fn take_field<T: serde::de::DeserializeOwned>(
    values: &mut HashMap<String, Value>,
    type_name: &'static str,
    field: &'static str,
) -> Result<T, WireError> {
    let value = values
        .remove(field)
        .ok_or(WireError::IncompleteDraft { payload_type: type_name, field })?;
    Ok(serde_json::from_value(value)?)
}

impl DraftTarget for AudioPayload {
    const TYPE_NAME: &'static str = "AudioPayload";
    const FIELDS: &'static [&'static str] =
        &["samples", "sampling_rate", "channels", "audio_format", "start", "end"];

    fn from_draft(mut values: HashMap<String, Value>) -> Result<Self, WireError> {
        let samples: Vec<u8> = take_field(&mut values, Self::TYPE_NAME, "samples")?;
        let size_bytes = samples.len() as u64;
        Ok(AudioPayload {
            samples,
            sampling_rate: take_field(&mut values, Self::TYPE_NAME, "sampling_rate")?,
            channels: take_field(&mut values, Self::TYPE_NAME, "channels")?,
            audio_format: take_field(&mut values, Self::TYPE_NAME, "audio_format")?,
            start: take_field(&mut values, Self::TYPE_NAME, "start")?,
            end: take_field(&mut values, Self::TYPE_NAME, "end")?,
            size_bytes,
        })
    }
}

impl DraftTarget for ImagePayload {
    const TYPE_NAME: &'static str = "ImagePayload";
    const FIELDS: &'static [&'static str] =
        &["pixels", "width", "height", "depth", "pixel_format", "timestamp"];

    fn from_draft(mut values: HashMap<String, Value>) -> Result<Self, WireError> {
        let pixels: Vec<u8> = take_field(&mut values, Self::TYPE_NAME, "pixels")?;
        let size_bytes = pixels.len() as u64;
        Ok(ImagePayload {
            pixels,
            width: take_field(&mut values, Self::TYPE_NAME, "width")?,
            height: take_field(&mut values, Self::TYPE_NAME, "height")?,
            depth: take_field(&mut values, Self::TYPE_NAME, "depth")?,
            pixel_format: take_field(&mut values, Self::TYPE_NAME, "pixel_format")?,
            timestamp: take_field(&mut values, Self::TYPE_NAME, "timestamp")?,
            size_bytes,
        })
    }
}

impl DraftTarget for VideoPayload {
    const TYPE_NAME: &'static str = "VideoPayload";
    const FIELDS: &'static [&'static str] = &["frames", "fps", "start", "end"];

    fn from_draft(mut values: HashMap<String, Value>) -> Result<Self, WireError> {
        let frames: Vec<ImagePayload> = take_field(&mut values, Self::TYPE_NAME, "frames")?;
        let size_bytes = frames.iter().map(|f| f.size_bytes).sum();
        Ok(VideoPayload {
            frames,
            fps: take_field(&mut values, Self::TYPE_NAME, "fps")?,
            start: take_field(&mut values, Self::TYPE_NAME, "start")?,
            end: take_field(&mut values, Self::TYPE_NAME, "end")?,
            size_bytes,
        })
    }
}

impl DraftTarget for BytesPayload {
    const TYPE_NAME: &'static str = "BytesPayload";
    const FIELDS: &'static [&'static str] = &["content"];

    fn from_draft(mut values: HashMap<String, Value>) -> Result<Self, WireError> {
        let content: Vec<u8> = take_field(&mut values, Self::TYPE_NAME, "content")?;
        let size_bytes = content.len() as u64;
        Ok(BytesPayload { content, size_bytes })
    }
}

impl DraftTarget for ObjectPayload {
    const TYPE_NAME: &'static str = "ObjectPayload";
    const FIELDS: &'static [&'static str] = &[];

    fn from_draft(values: HashMap<String, Value>) -> Result<Self, WireError> {
        Ok(ObjectPayload::from_entries(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_field() {
        let mut draft: Draft<BytesPayload> = Draft::new();
        let err = draft.set("not_a_field", 1).unwrap_err();
        assert!(matches!(err, WireError::UnknownDraftField { .. }));
    }

    #[test]
    fn rejects_incomplete_compile() {
        let draft: Draft<BytesPayload> = Draft::new();
        let err = draft.compile().unwrap_err();
        assert!(matches!(err, WireError::IncompleteDraft { .. }));
    }

    #[test]
    fn compiles_when_complete() {
        let mut draft: Draft<BytesPayload> = Draft::new();
        draft.set("content", vec![1u8, 2, 3]).unwrap();
        let payload = draft.compile().unwrap();
        assert_eq!(payload.content, vec![1, 2, 3]);
        assert_eq!(payload.size_bytes, 3);
    }
}
