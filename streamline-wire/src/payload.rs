use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::ControlSignal;
use crate::error::WireError;
use crate::message::Message;

/// A tagged union of everything a [`Message`] can carry.
///
/// Each variant is immutable once constructed; building one up incrementally goes
/// through a [`crate::Draft`] instead. Every variant knows its own size in bytes
/// (for telemetry) and how to render itself as a JSON value.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Raw audio samples.
    Audio(AudioPayload),
    /// A single decoded image.
    Image(ImagePayload),
    /// An ordered sequence of frames.
    Video(VideoPayload),
    /// Opaque byte content.
    Bytes(BytesPayload),
    /// A read-only string-keyed mapping.
    Object(ObjectPayload),
    /// Several messages delivered together as one work unit.
    Batch(Batch),
    /// An out-of-band control instruction.
    Control(ControlPayload),
}

/// A payload type that can be wrapped directly into a [`Payload`] variant, once
/// compiled from its [`crate::Draft`].
pub trait IntoPayload: Sized {
    /// Wrap `self` into the matching [`Payload`] variant.
    fn into_payload(self) -> Payload;
}

impl IntoPayload for AudioPayload {
    fn into_payload(self) -> Payload {
        Payload::Audio(self)
    }
}

impl IntoPayload for ImagePayload {
    fn into_payload(self) -> Payload {
        Payload::Image(self)
    }
}

impl IntoPayload for VideoPayload {
    fn into_payload(self) -> Payload {
        Payload::Video(self)
    }
}

impl IntoPayload for BytesPayload {
    fn into_payload(self) -> Payload {
        Payload::Bytes(self)
    }
}

impl IntoPayload for ObjectPayload {
    fn into_payload(self) -> Payload {
        Payload::Object(self)
    }
}

impl Payload {
    /// Size of this payload's content in bytes, as reported for telemetry.
    pub fn size_bytes(&self) -> u64 {
        match self {
            Payload::Audio(p) => p.size_bytes,
            Payload::Image(p) => p.size_bytes,
            Payload::Video(p) => p.size_bytes,
            Payload::Bytes(p) => p.size_bytes,
            Payload::Object(p) => p.size_bytes(),
            Payload::Batch(p) => p.size_bytes,
            Payload::Control(_) => 0,
        }
    }

    /// Render this payload as a JSON-compatible value.
    pub fn serialize(&self) -> Result<Value, WireError> {
        match self {
            Payload::Audio(p) => p.serialize(),
            Payload::Image(p) => p.serialize(),
            Payload::Video(p) => p.serialize(),
            Payload::Bytes(p) => p.serialize(),
            Payload::Object(p) => p.serialize(),
            Payload::Batch(p) => p.serialize(),
            Payload::Control(p) => p.serialize(),
        }
    }

    /// `true` if this payload is a stop-family control signal.
    pub fn is_stop_control(&self) -> bool {
        matches!(self, Payload::Control(c) if c.signal.is_stop())
    }

    /// The control signal carried by this payload, if any.
    pub fn control_signal(&self) -> Option<ControlSignal> {
        match self {
            Payload::Control(c) => Some(c.signal),
            _ => None,
        }
    }
}

/// Raw audio content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioPayload {
    /// Interleaved or planar sample data, in `audio_format`'s native encoding.
    pub samples: Vec<u8>,
    /// Samples per second.
    pub sampling_rate: i64,
    /// Channel count.
    pub channels: i64,
    /// Human-readable sample encoding, e.g. `"pcm_s16le"`.
    pub audio_format: String,
    /// Start timestamp of this chunk, in seconds.
    pub start: f64,
    /// End timestamp of this chunk, in seconds.
    pub end: f64,
    /// Size of `samples`, cached for telemetry.
    pub size_bytes: u64,
}

impl AudioPayload {
    fn serialize(&self) -> Result<Value, WireError> {
        Ok(serde_json::json!({
            "samples_len": self.samples.len(),
            "sampling_rate": self.sampling_rate,
            "channels": self.channels,
            "audio_format": self.audio_format,
            "start": self.start,
            "end": self.end,
            "size_bytes": self.size_bytes,
        }))
    }
}

/// A single decoded image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Raw pixel data.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: i64,
    /// Height in pixels.
    pub height: i64,
    /// Bit depth per channel.
    pub depth: i64,
    /// Pixel layout, e.g. `"rgb24"`.
    pub pixel_format: String,
    /// Capture timestamp, in seconds.
    pub timestamp: f64,
    /// Size of `pixels`, cached for telemetry.
    pub size_bytes: u64,
}

impl ImagePayload {
    fn serialize(&self) -> Result<Value, WireError> {
        Ok(serde_json::json!({
            "pixels_len": self.pixels.len(),
            "width": self.width,
            "height": self.height,
            "depth": self.depth,
            "pixel_format": self.pixel_format,
            "timestamp": self.timestamp,
            "size_bytes": self.size_bytes,
        }))
    }
}

/// An ordered sequence of frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoPayload {
    /// Frames, in playback order.
    pub frames: Vec<ImagePayload>,
    /// Frames per second.
    pub fps: f64,
    /// Start timestamp, in seconds.
    pub start: f64,
    /// End timestamp, in seconds.
    pub end: f64,
    /// Size of all frames combined, cached for telemetry.
    pub size_bytes: u64,
}

impl VideoPayload {
    fn serialize(&self) -> Result<Value, WireError> {
        let frames = self
            .frames
            .iter()
            .map(ImagePayload::serialize)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(serde_json::json!({
            "frames": frames,
            "fps": self.fps,
            "start": self.start,
            "end": self.end,
            "size_bytes": self.size_bytes,
        }))
    }
}

/// Opaque byte content, e.g. a file or network payload not otherwise typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BytesPayload {
    /// The raw content.
    pub content: Vec<u8>,
    /// Size of `content`, cached for telemetry.
    pub size_bytes: u64,
}

impl BytesPayload {
    fn serialize(&self) -> Result<Value, WireError> {
        Ok(serde_json::json!({
            "content_len": self.content.len(),
            "size_bytes": self.size_bytes,
        }))
    }
}

/// A read-only string-keyed mapping, populated only at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectPayload {
    entries: BTreeMap<String, Value>,
}

impl ObjectPayload {
    /// Build an `ObjectPayload` from an iterator of key-value pairs. There is no
    /// way to add or remove entries after construction.
    pub fn from_entries<I: IntoIterator<Item = (String, Value)>>(entries: I) -> Self {
        ObjectPayload {
            entries: entries.into_iter().collect(),
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn size_bytes(&self) -> u64 {
        serde_json::to_vec(&self.entries).map(|v| v.len() as u64).unwrap_or(0)
    }

    fn serialize(&self) -> Result<Value, WireError> {
        Ok(Value::Object(self.entries.clone().into_iter().collect()))
    }
}

/// Several messages delivered together as one work unit, in selection order.
///
/// Messages are held by [`Arc`] rather than by value: once frozen, a message is
/// shared with every destination it fans out to, batch included, without ever
/// being copied.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// The constituent messages, in the order the synchroniser selected them.
    pub messages: Vec<Arc<Message>>,
    /// Combined size of every message's payload, cached for telemetry.
    pub size_bytes: u64,
}

impl Batch {
    /// Build a batch from messages, computing its combined size.
    pub fn new(messages: Vec<Arc<Message>>) -> Self {
        let size_bytes = messages
            .iter()
            .filter_map(|m| m.payload())
            .map(Payload::size_bytes)
            .sum();
        Batch { messages, size_bytes }
    }

    fn serialize(&self) -> Result<Value, WireError> {
        let messages = self
            .messages
            .iter()
            .map(|m| m.to_dict())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Value::Array(messages))
    }
}

/// An out-of-band control instruction.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct ControlPayload {
    /// The instruction being carried.
    pub signal: ControlSignal,
}

impl ControlPayload {
    /// Wrap a control signal into a payload.
    pub fn new(signal: ControlSignal) -> Self {
        ControlPayload { signal }
    }

    fn serialize(&self) -> Result<Value, WireError> {
        Ok(serde_json::json!({ "signal": self.signal.code() }))
    }
}
