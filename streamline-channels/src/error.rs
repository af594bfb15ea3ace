use thiserror::Error;

/// Failures that can occur sending or receiving on a node-to-node channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The other end of the channel has been dropped.
    #[error("channel is disconnected: the other end has been dropped")]
    Disconnected,
}
