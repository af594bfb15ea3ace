//! `streamline` is a thread-per-node dataflow pipeline runtime: a small
//! number of processes, each running an independent pipeline of worker
//! threads connected by bounded queues, with backpressure as the only flow
//! control.
//!
//! The code is organized so each concern depends on as little else as
//! possible. [`streamline_wire`] defines the message envelope and its
//! payload types, with no notion of threads or queues. [`streamline_channels`]
//! provides the bounded, blocking queues node workers hand messages through.
//! [`streamline_telemetry`] records what crossed those queues. This crate
//! ties the three together into [`Node`], [`Pipeline`], and
//! [`PipelineManager`].
//!
//! # Layout
//!
//! - [`dag`] — the directed graph of node names a pipeline wires together,
//!   and the invariants it must satisfy.
//! - [`synchroniser`] — the pure function deciding when a node's pending
//!   inputs add up to a unit of work.
//! - [`buffer`] — the per-node staging area that applies a synchroniser's
//!   decisions and exposes the result as a bounded, blocking queue.
//! - [`node`] — the concurrency unit: an ingest worker, an update worker
//!   running user-defined behaviour, and an optional source worker, wired
//!   together around a [`buffer::Buffer`].
//! - [`pipeline`] — a constructed, wired set of nodes and its lifecycle.
//! - [`manager`] — the process-wide registry of live pipelines.
//! - [`config`] — the JSON shape a pipeline is declared in.
//! - [`node_factory`] — the name-to-constructor registry standing in for
//!   dynamic node construction.
//! - [`resource_broker`] — host-resource arbitration (currently: TCP ports)
//!   for nodes that need one at wiring time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamline::{BuiltNode, ManagerOptions, NodeBehavior, NodeFactory, PipelineManager, Transmitter};
//! use streamline_wire::Message;
//!
//! struct Echo;
//! impl NodeBehavior for Echo {
//!     fn update(&mut self, work: Arc<Message>, tx: &Transmitter<'_>) -> Result<(), streamline::DataflowError> {
//!         tx.transmit(Message::new(work.created_at, "echo", tx.next_id(), work.payload().unwrap().clone()))
//!     }
//! }
//!
//! let mut factory = NodeFactory::new();
//! factory.register("echo", Arc::new(|_cfg| Ok(BuiltNode::processor(Echo))));
//! let manager = PipelineManager::new(factory, ManagerOptions::default());
//! ```

mod buffer;
mod config;
mod dag;
mod error;
mod manager;
mod node;
mod node_factory;
mod pipeline;
mod resource_broker;
mod synchroniser;

pub use buffer::Buffer;
pub use config::{LinkSpec, NodeSpec, PipelineConfig, PipelineSection};
pub use dag::Dag;
pub use error::DataflowError;
pub use manager::{ManagerOptions, PipelineManager, ServiceStatus};
pub use node::{
    ComponentStatus, Node, NodeBehavior, NodeConfiguration, NodeLimits, SourceBehavior, SourceMode, Transmitter,
    DEFAULT_JOIN_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_TELEMETRY_BATCH_SIZE,
};
pub use node_factory::{BuiltNode, NodeConstructor, NodeFactory};
pub use pipeline::{NodeStatusReport, Pipeline, PipelineStatus, PipelineStatusReport};
pub use resource_broker::{ResourceBroker, TcpPortBroker};
pub use synchroniser::{Marks, Passthrough, Sources, Synchroniser};

pub use streamline_wire as wire;
