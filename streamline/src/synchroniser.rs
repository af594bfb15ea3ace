use std::collections::HashMap;
use std::sync::Arc;

use streamline_wire::Message;

/// The pending messages waiting on each upstream creator, as a synchroniser
/// sees them: read-only, in arrival order.
pub type Sources<'a> = HashMap<String, &'a [Arc<Message>]>;

/// For each creator, the indices into its pending list that should be
/// consumed to form the next work unit.
pub type Marks = HashMap<String, Vec<usize>>;

/// A pure function selecting which pending messages, across however many
/// upstream creators a node has, form its next unit of work.
///
/// A synchroniser must not mutate its input; the buffer applies the returned
/// marks by removing those indices from each creator's pending list, in order.
pub trait Synchroniser: Send + Sync + std::fmt::Debug {
    /// Compute marks for the current pending state.
    fn next_batch(&self, sources: &Sources<'_>) -> Marks;
}

/// The default synchroniser: every pending message from every creator is
/// immediately ready. Each `put` therefore yields exactly one work unit, in
/// the order puts were made — the identity synchroniser.
#[derive(Debug, Default)]
pub struct Passthrough;

impl Synchroniser for Passthrough {
    fn next_batch(&self, sources: &Sources<'_>) -> Marks {
        sources
            .iter()
            .map(|(creator, pending)| (creator.clone(), (0..pending.len()).collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamline_wire::{BytesPayload, Payload};

    fn msg(id: i64) -> Arc<Message> {
        Arc::new(Message::new(0.0, "a", id, Payload::Bytes(BytesPayload::default())))
    }

    #[test]
    fn passthrough_marks_everything() {
        let pending = vec![msg(1), msg(2)];
        let mut sources = Sources::new();
        sources.insert("a".to_string(), &pending);

        let marks = Passthrough.next_batch(&sources);
        assert_eq!(marks.get("a"), Some(&vec![0, 1]));
    }
}
