use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use streamline_channels::{bounded, ChannelError, Inbox, Outbox, Pull, Push};
use streamline_wire::{Batch, Message, Payload};

use crate::synchroniser::{Sources, Synchroniser};

/// A node's inbound staging area: one pending list per upstream creator, a
/// synchroniser deciding when those pending messages add up to a unit of
/// work, and a bounded output channel the node's update worker drains.
///
/// The output channel is the buffer's backpressure surface: `put` blocks once
/// it is full, which in turn blocks whatever upstream transmit is feeding
/// this node.
pub struct Buffer {
    pending: Mutex<HashMap<String, Vec<Arc<Message>>>>,
    synchroniser: Arc<dyn Synchroniser>,
    next_batch_id: AtomicI64,
    outbox: Outbox<Arc<Message>>,
    inbox: Mutex<Inbox<Arc<Message>>>,
}

impl Buffer {
    /// Build a buffer with the given output-channel capacity and synchroniser.
    pub fn new(capacity: usize, synchroniser: Arc<dyn Synchroniser>) -> Self {
        let (outbox, inbox) = bounded(capacity);
        Buffer {
            pending: Mutex::new(HashMap::new()),
            synchroniser,
            next_batch_id: AtomicI64::new(0),
            outbox,
            inbox: Mutex::new(inbox),
        }
    }

    /// Stage a message under its creator, then ask the synchroniser whether
    /// that staging produces a work unit. Blocks if the output channel is
    /// full.
    pub fn put(&self, message: Arc<Message>) -> Result<(), ChannelError> {
        let work_unit = {
            let mut pending = self.pending.lock().unwrap();
            pending.entry(message.creator.clone()).or_default().push(message);
            self.consume(&mut pending)
        };

        if let Some(unit) = work_unit {
            self.outbox.push(unit)?;
        }
        Ok(())
    }

    /// Close the buffer: no more work units will be produced. Wakes a
    /// blocked `get`.
    pub fn close(&self) {
        self.outbox.close();
    }

    /// Block for the next work unit. `None` means the buffer has been closed
    /// and fully drained.
    pub fn get(&self) -> Result<Option<Arc<Message>>, ChannelError> {
        self.inbox.lock().unwrap().pull()
    }

    /// Discard every pending message and every work unit already queued for
    /// the update worker but not yet pulled.
    pub fn flush(&self) {
        self.pending.lock().unwrap().clear();
        let inbox = self.inbox.lock().unwrap();
        while inbox.try_pull().unwrap_or(None).is_some() {}
    }

    fn consume(&self, pending: &mut HashMap<String, Vec<Arc<Message>>>) -> Option<Arc<Message>> {
        let sources: Sources<'_> = pending.iter().map(|(k, v)| (k.clone(), v.as_slice())).collect();
        let marks = self.synchroniser.next_batch(&sources);

        let mut creators: Vec<&String> = marks.keys().collect();
        creators.sort();

        let mut selected = Vec::new();
        for creator in creators {
            let Some(indices) = marks.get(creator) else { continue };
            let Some(list) = pending.get_mut(creator) else { continue };

            let mut sorted_indices = indices.clone();
            sorted_indices.sort_unstable();
            for &idx in &sorted_indices {
                if idx < list.len() {
                    selected.push(list[idx].clone());
                }
            }
            for &idx in sorted_indices.iter().rev() {
                if idx < list.len() {
                    list.remove(idx);
                }
            }
        }

        match selected.len() {
            0 => None,
            1 => selected.into_iter().next(),
            _ => {
                let created_at = selected.first().map(|m| m.created_at).unwrap_or(0.0);
                let id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
                let batch = Batch::new(selected);
                Some(Arc::new(Message::new(created_at, "buffer", id, Payload::Batch(batch))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchroniser::Passthrough;
    use streamline_wire::BytesPayload;

    fn msg(creator: &str, id: i64) -> Arc<Message> {
        Arc::new(Message::new(0.0, creator, id, Payload::Bytes(BytesPayload::default())))
    }

    #[test]
    fn single_message_passes_through_unwrapped() {
        let buffer = Buffer::new(8, Arc::new(Passthrough));
        buffer.put(msg("src", 1)).unwrap();
        let unit = buffer.get().unwrap().unwrap();
        assert_eq!(unit.id, 1);
        assert!(matches!(unit.payload(), Some(Payload::Bytes(_))));
    }

    #[test]
    fn multiple_pending_creators_wrap_in_batch() {
        let buffer = Buffer::new(8, Arc::new(Passthrough));
        {
            let mut pending = buffer.pending.lock().unwrap();
            pending.entry("a".to_string()).or_default().push(msg("a", 1));
            pending.entry("b".to_string()).or_default().push(msg("b", 2));
        }
        let unit = {
            let mut pending = buffer.pending.lock().unwrap();
            buffer.consume(&mut pending)
        }
        .unwrap();
        match unit.payload() {
            Some(Payload::Batch(batch)) => assert_eq!(batch.messages.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn close_then_get_returns_none() {
        let buffer = Buffer::new(8, Arc::new(Passthrough));
        buffer.close();
        assert!(buffer.get().unwrap().is_none());
    }

    #[test]
    fn flush_discards_pending_and_queued_work_units() {
        let buffer = Buffer::new(8, Arc::new(Passthrough));
        buffer.put(msg("src", 1)).unwrap();
        buffer.put(msg("src", 2)).unwrap();
        {
            let mut pending = buffer.pending.lock().unwrap();
            pending.entry("other".to_string()).or_default().push(msg("other", 3));
        }

        buffer.flush();

        assert!(buffer.pending.lock().unwrap().is_empty());
        buffer.put(msg("src", 4)).unwrap();
        let unit = buffer.get().unwrap().unwrap();
        assert_eq!(unit.id, 4);
    }
}
