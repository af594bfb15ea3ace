use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};

use crate::error::ChannelError;
use crate::{Pull, Push};

enum Signal<T> {
    Item(T),
    Close,
}

/// The sending half of a [`bounded`] channel.
pub struct Outbox<T> {
    tx: SyncSender<Signal<T>>,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Outbox { tx: self.tx.clone() }
    }
}

/// The receiving half of a [`bounded`] channel.
pub struct Inbox<T> {
    rx: Receiver<Signal<T>>,
}

/// Build a bounded channel with room for `capacity` items in flight. A
/// `capacity` of zero still works: the sender then blocks until a receiver is
/// ready to take the item directly.
pub fn bounded<T>(capacity: usize) -> (Outbox<T>, Inbox<T>) {
    let (tx, rx) = sync_channel(capacity);
    (Outbox { tx }, Inbox { rx })
}

impl<T> Push<T> for Outbox<T> {
    fn push(&self, item: T) -> Result<(), ChannelError> {
        self.tx.send(Signal::Item(item)).map_err(|_| ChannelError::Disconnected)
    }

    fn close(&self) {
        if self.tx.send(Signal::Close).is_err() {
            tracing::trace!("close signal dropped: receiver already gone");
        }
    }
}

impl<T> Pull<T> for Inbox<T> {
    fn pull(&self) -> Result<Option<T>, ChannelError> {
        match self.rx.recv() {
            Ok(Signal::Item(item)) => Ok(Some(item)),
            Ok(Signal::Close) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    fn try_pull(&self) -> Result<Option<T>, ChannelError> {
        match self.rx.try_recv() {
            Ok(Signal::Item(item)) => Ok(Some(item)),
            Ok(Signal::Close) => Ok(None),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_items_in_order() {
        let (tx, rx) = bounded::<u32>(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        assert_eq!(rx.pull().unwrap(), Some(1));
        assert_eq!(rx.pull().unwrap(), Some(2));
    }

    #[test]
    fn close_drains_to_none() {
        let (tx, rx) = bounded::<u32>(4);
        tx.push(1).unwrap();
        tx.close();
        assert_eq!(rx.pull().unwrap(), Some(1));
        assert_eq!(rx.pull().unwrap(), None);
    }

    #[test]
    fn dropped_sender_reads_as_closed() {
        let (tx, rx) = bounded::<u32>(4);
        drop(tx);
        assert_eq!(rx.pull().unwrap(), None);
    }

    #[test]
    fn try_pull_does_not_block_on_empty() {
        let (_tx, rx) = bounded::<u32>(4);
        assert_eq!(rx.try_pull().unwrap(), None);
    }

    #[test]
    fn try_pull_drains_whatever_is_already_queued() {
        let (tx, rx) = bounded::<u32>(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        assert_eq!(rx.try_pull().unwrap(), Some(1));
        assert_eq!(rx.try_pull().unwrap(), Some(2));
        assert_eq!(rx.try_pull().unwrap(), None);
    }

    #[test]
    fn push_blocks_until_capacity_frees() {
        let (tx, rx) = bounded::<u32>(1);
        tx.push(1).unwrap();
        let tx2 = tx.clone();
        let handle = std::thread::spawn(move || tx2.push(2).unwrap());
        assert_eq!(rx.pull().unwrap(), Some(1));
        handle.join().unwrap();
        assert_eq!(rx.pull().unwrap(), Some(2));
    }
}
