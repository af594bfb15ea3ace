use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::draft::{Draft, DraftTarget};
use crate::error::WireError;
use crate::payload::{IntoPayload, Payload};

trait PendingDraft: fmt::Debug + Send + Sync {
    fn compile(self: Box<Self>) -> Result<Payload, WireError>;
}

impl<T> PendingDraft for Draft<T>
where
    T: DraftTarget + IntoPayload + fmt::Debug + Send + Sync + 'static,
{
    fn compile(self: Box<Self>) -> Result<Payload, WireError> {
        Ok((*self).compile()?.into_payload())
    }
}

#[derive(Debug)]
enum PayloadSlot {
    Pending(Box<dyn PendingDraft>),
    Ready(Payload),
}

/// The envelope every node receives and transmits.
///
/// A message is mutable while in flight through the node that created it: its
/// metadata and timers can be amended, and its payload can still be a
/// [`crate::Draft`] awaiting compilation. [`Message::freeze`] closes all of
/// that off at once, compiling any pending draft and making every further
/// mutation fail with [`WireError::FrozenViolation`] instead of silently
/// succeeding.
#[derive(Debug)]
pub struct Message {
    /// Wall-clock time the message was created, in seconds since the epoch.
    pub created_at: f64,
    /// Name of the node that created this message.
    pub creator: String,
    /// Monotonically increasing version number for messages from the same
    /// creator. Defaults to −1 for a message that predates any versioning.
    pub version: i64,
    /// Identifier assigned by the producing node.
    pub id: i64,
    /// Id of the upstream work unit that caused this message, propagating
    /// lineage. Stamped by [`Message::stamp_data_source_id`] on transmit.
    pub data_source_id: Option<i64>,
    meta: HashMap<String, Value>,
    timers: HashMap<String, f64>,
    payload: PayloadSlot,
    frozen: bool,
}

impl Message {
    /// Create a message with an already-compiled payload.
    pub fn new(created_at: f64, creator: impl Into<String>, id: i64, payload: Payload) -> Self {
        Message {
            created_at,
            creator: creator.into(),
            version: -1,
            id,
            data_source_id: None,
            meta: HashMap::new(),
            timers: HashMap::new(),
            payload: PayloadSlot::Ready(payload),
            frozen: false,
        }
    }

    /// Create a message whose payload is still a [`crate::Draft`]; it is
    /// compiled the first time the message is frozen.
    pub fn from_draft<T>(created_at: f64, creator: impl Into<String>, id: i64, draft: Draft<T>) -> Self
    where
        T: DraftTarget + IntoPayload + fmt::Debug + Send + Sync + 'static,
    {
        Message {
            created_at,
            creator: creator.into(),
            version: -1,
            id,
            data_source_id: None,
            meta: HashMap::new(),
            timers: HashMap::new(),
            payload: PayloadSlot::Pending(Box::new(draft)),
            frozen: false,
        }
    }

    /// Clone another message's timers into this one, for lineage-preserving
    /// propagation across a transform.
    pub fn with_timers_from(mut self, other: &Message) -> Self {
        self.timers = other.timers.clone();
        self
    }

    /// Build an owned copy of this message for re-transmission, e.g. passing
    /// an already-received message back through [`crate::Message`]'s usual
    /// transmit contract unprocessed. `None` if the payload is still an
    /// uncompiled draft — a message reaching this point should already be
    /// frozen, so that case is not expected in practice.
    pub fn duplicate(&self) -> Option<Message> {
        let payload = self.payload()?.clone();
        Some(Message {
            created_at: self.created_at,
            creator: self.creator.clone(),
            version: self.version,
            id: self.id,
            data_source_id: self.data_source_id,
            meta: self.meta.clone(),
            timers: self.timers.clone(),
            payload: PayloadSlot::Ready(payload),
            frozen: false,
        })
    }

    /// Set this message's version, overriding the −1 default.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Whether this message has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// The message's payload, if it has already been compiled (either built
    /// directly or because the message has been frozen).
    pub fn payload(&self) -> Option<&Payload> {
        match &self.payload {
            PayloadSlot::Ready(p) => Some(p),
            PayloadSlot::Pending(_) => None,
        }
    }

    /// Read a metadata value.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Set a metadata value. Fails once the message is frozen.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), WireError> {
        self.guard_mutation("set metadata")?;
        self.meta.insert(key.into(), value.into());
        Ok(())
    }

    /// Read an elapsed timer value, if that timer has been closed.
    pub fn timer(&self, name: &str) -> Option<f64> {
        self.timers.get(name).copied()
    }

    /// Record an elapsed timer value directly. Fails once the message is frozen.
    pub fn set_timer(&mut self, name: impl Into<String>, elapsed_seconds: f64) -> Result<(), WireError> {
        self.guard_mutation("set timer")?;
        self.timers.insert(name.into(), elapsed_seconds);
        Ok(())
    }

    /// Open a named timed region; the returned guard records the elapsed time
    /// into this message's timers when dropped.
    ///
    /// The guard borrows `now` at open and close time rather than the system
    /// clock directly, so a caller drives timing with whatever clock source it
    /// already has (wall clock, monotonic clock, or a fake one in tests).
    pub fn timeit<'a>(&'a mut self, name: impl Into<String>, now: f64) -> Result<TimerGuard<'a>, WireError> {
        self.guard_mutation("open timer")?;
        let name = name.into();
        if self.timers.contains_key(&name) {
            return Err(WireError::TimerAlreadyOpen { name });
        }
        Ok(TimerGuard { message: self, name, started_at: now })
    }

    /// Stamp the lineage identifier this message descends from. Idempotent
    /// with respect to freezing: this is the one mutation transmit performs
    /// even on an otherwise-frozen message, mirroring how a node stamps
    /// lineage right before handing a message to its destinations.
    pub fn stamp_data_source_id(&mut self, data_source_id: i64) {
        self.data_source_id = Some(data_source_id);
    }

    /// Compile any pending draft and make metadata and timers read-only.
    /// Calling this more than once is a no-op.
    pub fn freeze(&mut self) -> Result<(), WireError> {
        if self.frozen {
            return Ok(());
        }

        if let PayloadSlot::Pending(_) = &self.payload {
            let pending = match std::mem::replace(&mut self.payload, PayloadSlot::Ready(placeholder())) {
                PayloadSlot::Pending(p) => p,
                PayloadSlot::Ready(_) => unreachable!(),
            };
            self.payload = PayloadSlot::Ready(pending.compile()?);
        }

        self.frozen = true;
        Ok(())
    }

    /// Render this message as a JSON-compatible value. The message need not be
    /// frozen, but its payload must already be compiled.
    pub fn to_dict(&self) -> Result<Value, WireError> {
        let payload = self.payload().ok_or(WireError::Unserializable { payload_type: "Draft" })?;

        Ok(serde_json::json!({
            "created_at": self.created_at,
            "creator": self.creator,
            "version": self.version,
            "id": self.id,
            "data_source_id": self.data_source_id,
            "meta": self.meta,
            "timers": self.timers,
            "payload": payload.serialize()?,
        }))
    }

    /// Render this message as a JSON string, optionally pretty-printed.
    pub fn to_json(&self, pretty: bool) -> Result<String, WireError> {
        let value = self.to_dict()?;
        if pretty {
            Ok(serde_json::to_string_pretty(&value)?)
        } else {
            Ok(serde_json::to_string(&value)?)
        }
    }

    fn guard_mutation(&self, operation: &'static str) -> Result<(), WireError> {
        if self.frozen {
            Err(WireError::FrozenViolation { operation })
        } else {
            Ok(())
        }
    }
}

fn placeholder() -> Payload {
    Payload::Bytes(crate::payload::BytesPayload::default())
}

/// An open timed region on a [`Message`]. Dropping it records the elapsed
/// time under the name it was opened with.
pub struct TimerGuard<'a> {
    message: &'a mut Message,
    name: String,
    started_at: f64,
}

impl<'a> TimerGuard<'a> {
    /// Close the region, recording the elapsed time against `now`.
    pub fn close(mut self, now: f64) {
        let elapsed = now - self.started_at;
        self.message.timers.insert(std::mem::take(&mut self.name), elapsed);
    }
}

// Dropping without an explicit `close` still records the region, using the
// elapsed time as of when the guard was created; callers that need a precise
// end time should call `close` themselves.
impl<'a> Drop for TimerGuard<'a> {
    fn drop(&mut self) {
        if self.name.is_empty() {
            return;
        }
        self.message
            .timers
            .entry(std::mem::take(&mut self.name))
            .or_insert(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::BytesPayload;

    fn sample_message() -> Message {
        Message::new(
            0.0,
            "node-a",
            1,
            Payload::Bytes(BytesPayload { content: vec![1, 2, 3], size_bytes: 3 }),
        )
    }

    #[test]
    fn freeze_is_idempotent() {
        let mut msg = sample_message();
        msg.freeze().unwrap();
        assert!(msg.is_frozen());
        msg.freeze().unwrap();
        assert!(msg.is_frozen());
    }

    #[test]
    fn mutation_after_freeze_fails() {
        let mut msg = sample_message();
        msg.freeze().unwrap();
        let err = msg.set_meta("k", "v").unwrap_err();
        assert!(matches!(err, WireError::FrozenViolation { .. }));
    }

    #[test]
    fn draft_payload_compiles_on_freeze() {
        let mut draft: Draft<BytesPayload> = Draft::new();
        draft.set("content", vec![9u8, 9]).unwrap();
        let mut msg = Message::from_draft(0.0, "node-a", 2, draft);
        assert!(msg.payload().is_none());
        msg.freeze().unwrap();
        let payload = msg.payload().unwrap();
        assert_eq!(payload.size_bytes(), 2);
    }

    #[test]
    fn stamp_data_source_id_bypasses_freeze() {
        let mut msg = sample_message();
        msg.freeze().unwrap();
        msg.stamp_data_source_id(7);
        assert_eq!(msg.data_source_id, Some(7));
    }
}
