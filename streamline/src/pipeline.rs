use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use streamline_channels::{Outbox, Push};
use streamline_telemetry::TelemetryManager;
use streamline_wire::{ControlPayload, ControlSignal, Message, Payload};

use crate::config::PipelineSection;
use crate::dag::Dag;
use crate::error::DataflowError;
use crate::node::{ComponentStatus, Node, NodeLimits};
use crate::node_factory::NodeFactory;

/// A pipeline's own lifecycle state, distinct from any one node's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Declared but not yet warmed up.
    New,
    /// Nodes built, wired, and warmed up; not yet running.
    Ready,
    /// Nodes are running.
    Running,
}

/// A snapshot of one node's reported state within a pipeline status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusReport {
    /// The node's name.
    pub name: String,
    /// The node's lifecycle status.
    pub status: ComponentStatus,
}

/// A full pipeline status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatusReport {
    /// The pipeline's own lifecycle status.
    pub status: PipelineStatus,
    /// Per-node status, in insertion order.
    pub nodes: Vec<NodeStatusReport>,
}

/// A constructed, wired set of nodes built from a [`PipelineSection`], plus
/// the lifecycle operations that start, stop, and tear it down.
///
/// Nodes are started in reverse topological-layer order — sinks before their
/// sources — so a node is always running before anything can transmit to it.
/// They are stopped and destroyed in the opposite direction: insertion order
/// for stop, reverse insertion order for destroy.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    id: String,
    folder: PathBuf,
    dag: Dag,
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
    status: PipelineStatus,
}

impl Pipeline {
    /// Build and wire a pipeline from its configuration section, without
    /// starting it. Validates the declared graph and fails with
    /// [`DataflowError::InvalidGraph`] if it is malformed.
    pub fn warmup(
        section: &PipelineSection,
        id: impl Into<String>,
        folder: PathBuf,
        factory: &NodeFactory,
        limits: NodeLimits,
        telemetry: Option<Arc<dyn TelemetryManager>>,
    ) -> Result<Self, DataflowError> {
        std::fs::create_dir_all(&folder)?;
        let config_path = folder.join("config.json");
        std::fs::write(&config_path, serde_json::to_string_pretty(section)?)?;

        let mut dag = Dag::new();
        let mut seen = std::collections::HashSet::new();
        for spec in &section.nodes {
            if !seen.insert(spec.name.clone()) {
                return Err(DataflowError::InvalidGraph { reason: format!("duplicate node name '{}'", spec.name) });
            }
            dag.add_node(spec.name.clone());
        }

        for link in &section.links {
            dag.add_edge(&link.from, &link.to)?;
        }

        if dag.has_cycle() {
            return Err(DataflowError::InvalidGraph { reason: "graph contains a cycle".to_string() });
        }

        for spec in &section.nodes {
            if spec.kind != "source" && dag.in_degree(&spec.name) == 0 {
                return Err(DataflowError::InvalidGraph {
                    reason: format!("non-source node '{}' has no inbound edge", spec.name),
                });
            }
        }

        let mut nodes = Vec::with_capacity(section.nodes.len());
        let mut by_name = HashMap::new();

        for spec in &section.nodes {
            let built = factory.build(&spec.mark, &serde_json::Value::Object(
                spec.configuration.clone().into_iter().collect(),
            ))?;

            let sync_name = spec.sync.as_deref().unwrap_or("passthrough");
            let synchroniser = factory.synchroniser(sync_name)?;
            let node = Node::new(
                spec.name.clone(),
                built.behavior,
                built.source,
                synchroniser,
                limits,
                telemetry.clone(),
            );
            by_name.insert(spec.name.clone(), nodes.len());
            nodes.push(node);
        }

        for link in &section.links {
            let from_idx = *by_name.get(&link.from).expect("validated by dag.add_edge above");
            let to_idx = *by_name.get(&link.to).expect("validated by dag.add_edge above");
            nodes[from_idx].add_destination(link.to.clone(), &nodes[to_idx]);
            nodes[to_idx].add_origin(link.from.clone());
        }

        for node in &nodes {
            node.warmup()?;
        }

        Ok(Pipeline {
            name: section.name.clone(),
            id: id.into(),
            folder,
            dag,
            nodes,
            by_name,
            status: PipelineStatus::Ready,
        })
    }

    /// The pipeline's manager-assigned id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The pipeline's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pipeline's working directory.
    pub fn folder(&self) -> &PathBuf {
        &self.folder
    }

    /// Current pipeline-level lifecycle status.
    pub fn status_enum(&self) -> PipelineStatus {
        self.status
    }

    /// Start every node, sinks first: nodes are started layer by layer in
    /// reverse topological order, so a node never transmits to a destination
    /// that isn't running yet. Fails with [`DataflowError::InvalidLifecycle`]
    /// unless the pipeline is [`PipelineStatus::Ready`].
    pub fn start(&mut self) -> Result<(), DataflowError> {
        if self.status != PipelineStatus::Ready {
            return Err(DataflowError::InvalidLifecycle {
                operation: "start",
                expected: "ready",
                actual: format!("{:?}", self.status),
            });
        }

        for layer in self.dag.layers().iter().rev() {
            for name in layer {
                if let Some(&idx) = self.by_name.get(name) {
                    self.nodes[idx].start();
                }
            }
        }

        self.status = PipelineStatus::Running;
        Ok(())
    }

    /// Stop every node, in insertion order. Fails with
    /// [`DataflowError::InvalidLifecycle`] unless the pipeline is
    /// [`PipelineStatus::Running`].
    pub fn stop(&mut self) -> Result<(), DataflowError> {
        if self.status != PipelineStatus::Running {
            return Err(DataflowError::InvalidLifecycle {
                operation: "stop",
                expected: "running",
                actual: format!("{:?}", self.status),
            });
        }

        for node in &self.nodes {
            node.stop();
        }

        self.status = PipelineStatus::Ready;
        Ok(())
    }

    /// Suspend one node by name: its inbound messages bypass the buffer.
    /// No-op if the name is unknown.
    pub fn suspend_node(&self, name: &str) {
        self.deliver_control(name, ControlSignal::Suspend);
    }

    /// Resume a previously suspended node. No-op if the name is unknown.
    pub fn resume_node(&self, name: &str) {
        self.deliver_control(name, ControlSignal::Resume);
    }

    /// The channel end external callers push onto to deliver a message
    /// directly to a named node, bypassing every other node in the pipeline.
    /// `None` if the name is unknown.
    pub fn node_inbound(&self, name: &str) -> Option<Outbox<Arc<Message>>> {
        self.by_name.get(name).map(|&idx| self.nodes[idx].inbound())
    }

    /// Apply a single runtime configuration change to a node's behaviour.
    /// No-op if the name is unknown.
    pub fn update_node(&self, name: &str, property: &str, value: serde_json::Value) {
        if let Some(&idx) = self.by_name.get(name) {
            self.nodes[idx].set_on_config(property, value);
        }
    }

    fn deliver_control(&self, name: &str, signal: ControlSignal) {
        let Some(&idx) = self.by_name.get(name) else { return };
        let message = Message::new(0.0, "pipeline", 0, Payload::Control(ControlPayload::new(signal)));
        let _ = self.nodes[idx].inbound().push(Arc::new(message));
    }

    /// Stop if running, then in reverse insertion order: clear each node's
    /// source and destinations, destroy it, and drop it. Leaves the working
    /// directory on disk.
    pub fn destroy(&mut self) {
        if self.status == PipelineStatus::Running {
            let _ = self.stop();
        }

        while let Some(node) = self.nodes.pop() {
            node.clear_source();
            node.clear_destinations();
            node.destroy();
        }
        self.by_name.clear();
    }

    /// A snapshot of pipeline and per-node status.
    pub fn status(&self) -> PipelineStatusReport {
        PipelineStatusReport {
            status: self.status,
            nodes: self.nodes.iter().map(|n| NodeStatusReport { name: n.name().to_string(), status: n.status() }).collect(),
        }
    }
}
