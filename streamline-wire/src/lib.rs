//! The message and payload data model shared by every node in a streamline pipeline.
//!
//! This crate is deliberately free of any notion of threads, queues, or graphs: it
//! defines the envelope ([`Message`]) that carries data across an edge, the tagged
//! union of payload kinds ([`Payload`]) a message can carry, and the draft/freeze
//! discipline that makes a transmitted message safe to share without copying.
//!
//! **Payload**: the [`payload`] module defines the payload variants as a sum type,
//! each exposing a `size_bytes` accessor and a `serialize` method, per the tagged-union
//! design in the specification this crate implements.
//!
//! **Draft**: the [`draft`] module defines a mutable builder that compiles into an
//! immutable payload.
//!
//! **Message**: the [`message`] module ties payload and draft together with the
//! freeze contract: a message is mutable until frozen, after which every mutating
//! operation fails rather than silently succeeding.

mod control;
mod draft;
mod error;
mod message;
mod payload;

pub use control::ControlSignal;
pub use draft::{Draft, DraftTarget};
pub use error::WireError;
pub use message::{Message, TimerGuard};
pub use payload::{
    AudioPayload, Batch, BytesPayload, ControlPayload, ImagePayload, IntoPayload, ObjectPayload,
    Payload, VideoPayload,
};
