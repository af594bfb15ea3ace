use thiserror::Error;

use streamline_channels::ChannelError;
use streamline_telemetry::TelemetryError;
use streamline_wire::WireError;

/// Every way a dataflow operation can fail.
///
/// Variant names mirror the semantic error taxonomy nodes, buffers, and
/// pipelines report to their callers: unknown identifiers, lifecycle
/// preconditions, graph shape, and propagated failures from the message and
/// channel layers underneath.
#[derive(Debug, Error)]
pub enum DataflowError {
    /// The graph is malformed: an edge names an unknown node, a node name is
    /// reused, the graph has a cycle, or a non-source node has no inbound edge.
    #[error("invalid graph: {reason}")]
    InvalidGraph {
        /// What specifically is wrong with the graph.
        reason: String,
    },

    /// A lifecycle method was called while its precondition status didn't hold.
    #[error("invalid lifecycle: cannot {operation} while status is {actual} (expected {expected})")]
    InvalidLifecycle {
        /// The operation that was attempted, e.g. `"warmup"`.
        operation: &'static str,
        /// The status the operation required.
        expected: &'static str,
        /// The status it actually found.
        actual: String,
    },

    /// An operation referenced a pipeline id the manager doesn't know about.
    #[error("unknown pipeline id: {pipeline_id}")]
    InvalidId {
        /// The id that was not found.
        pipeline_id: String,
    },

    /// A lifecycle transition was attempted twice (e.g. warming up an
    /// already-warmed-up pipeline).
    #[error("duplicate state: {reason}")]
    DuplicateState {
        /// What was already true.
        reason: String,
    },

    /// The component builder could not resolve a plugin mark to a node type.
    #[error("could not load plugin for mark '{mark}'")]
    PluginLoad {
        /// The plugin mark that failed to resolve.
        mark: String,
    },

    /// A resource broker could not satisfy a request.
    #[error("resource unavailable: {resource}")]
    ResourceUnavailable {
        /// The resource name that was requested.
        resource: String,
    },

    /// Failure constructing, mutating, or serialising a message or payload.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Failure sending or receiving on a node-to-node channel.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Failure recording or persisting telemetry.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A filesystem operation (working directory creation, config write) failed.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// `serde_json` failed to parse or render a pipeline configuration.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}
