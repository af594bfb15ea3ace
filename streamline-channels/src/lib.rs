//! Blocking, bounded hand-off queues between node threads.
//!
//! Every edge in a running pipeline is one of these channels: a fixed-capacity
//! queue where a full send blocks the sender until a receiver drains it. That
//! blocking is the backpressure mechanism the rest of the runtime relies on —
//! there is no separate flow-control signal, a slow destination simply makes
//! its sources wait.
//!
//! The [`Push`] and [`Pull`] traits name the two ends generically, independent
//! of the concrete channel; [`bounded`] builds the one implementation this
//! crate ships.

mod channel;
mod error;

pub use channel::{bounded, Inbox, Outbox};
pub use error::ChannelError;

/// The sending half of a channel: hands an item to whatever is on the other
/// end, blocking if the channel is full.
pub trait Push<T> {
    /// Send `item`, blocking until there is room for it.
    fn push(&self, item: T) -> Result<(), ChannelError>;

    /// Signal that no more items are coming.
    fn close(&self);
}

/// The receiving half of a channel.
pub trait Pull<T> {
    /// Block for the next item. `Ok(None)` means the channel was closed and
    /// drained; no more items will ever arrive.
    fn pull(&self) -> Result<Option<T>, ChannelError>;

    /// Take an item if one is already waiting, without blocking. `Ok(None)`
    /// means the channel is empty right now — it may or may not still have
    /// items coming.
    fn try_pull(&self) -> Result<Option<T>, ChannelError>;
}
