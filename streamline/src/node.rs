use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamline_channels::{bounded, Inbox, Outbox, Pull, Push};
use streamline_telemetry::{TelemetryManager, TelemetryRecord};
use streamline_wire::{ControlSignal, Message, Payload};

use crate::buffer::Buffer;
use crate::error::DataflowError;
use crate::synchroniser::Synchroniser;

/// Default cap on a node's inbound queue and on its buffer's output channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
/// Default number of records a node accumulates before handing a batch to
/// its telemetry manager.
pub const DEFAULT_TELEMETRY_BATCH_SIZE: usize = 16;
/// Default per-worker join timeout when stopping a node.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A node's lifecycle state. Monotonic within one start/stop cycle: a
/// `Stopped` node may be destroyed but never restarted within the same
/// pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Just constructed; not yet wired or warmed up.
    New,
    /// Warmed up and wired into a pipeline, not yet running.
    Configured,
    /// Workers are running.
    Running,
    /// Workers have exited.
    Stopped,
}

/// Whether a source worker sleeps before or after calling its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Sleep for the configured interval, then call the source.
    Pre,
    /// Call the source, then sleep for the configured interval.
    Post,
}

/// The user-defined behaviour a node runs on its update worker.
pub trait NodeBehavior: Send {
    /// Process one work unit. May call [`Transmitter::transmit`] zero or more
    /// times via `tx`.
    fn update(&mut self, work: Arc<Message>, tx: &Transmitter<'_>) -> Result<(), DataflowError>;

    /// Pre-start preparation: load models, open connections.
    fn warmup(&mut self) -> Result<(), DataflowError> {
        Ok(())
    }

    /// Release external resources. Called by the pipeline after stop.
    fn destroy(&mut self) {}

    /// Post-construction configuration hook invoked by the component builder.
    fn configure(&mut self, _configuration: &serde_json::Value) -> Result<(), DataflowError> {
        Ok(())
    }

    /// Apply a single configuration property change at runtime.
    fn set_on_config(&mut self, _property: &str, _value: serde_json::Value) {}
}

/// The user-defined behaviour a source node runs on its source worker.
pub trait SourceBehavior: Send {
    /// Produce the next message, or `None` to end the source loop.
    fn next(&mut self) -> Option<Arc<Message>>;

    /// How long to sleep between calls.
    fn interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Whether the sleep happens before or after the call.
    fn mode(&self) -> SourceMode {
        SourceMode::Pre
    }
}

/// A handle an update worker uses to emit results. Borrowed for the duration
/// of a single `update` call; stamps lineage, freezes, and fans out to every
/// destination, recording telemetry and blocking on a full destination queue.
pub struct Transmitter<'a> {
    shared: &'a NodeShared,
}

impl<'a> Transmitter<'a> {
    /// Allocate the next message id this node will assign.
    pub fn next_id(&self) -> i64 {
        self.shared.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Stamp lineage, freeze, and send `message` to every destination in
    /// insertion order. Blocks if a destination's inbound queue is full.
    pub fn transmit(&self, mut message: Message) -> Result<(), DataflowError> {
        message.stamp_data_source_id(self.shared.last_data_source_id.load(Ordering::Acquire));
        let is_control = matches!(message.payload(), Some(Payload::Control(_)));
        message.freeze()?;

        let message = Arc::new(message);
        for (_, dest) in self.shared.destinations.lock().unwrap().iter() {
            dest.push(message.clone())?;
        }

        if !is_control {
            self.shared.record_telemetry("tx", &message);
        }
        self.shared.maybe_dump(&message);
        Ok(())
    }
}

struct NodeShared {
    name: String,
    destinations: Mutex<Vec<(String, Outbox<Arc<Message>>)>>,
    origins: Mutex<HashSet<String>>,
    suspended: AtomicBool,
    last_data_source_id: AtomicI64,
    next_message_id: AtomicI64,
    telemetry: Option<Arc<dyn TelemetryManager>>,
    telemetry_buffer: Mutex<Vec<TelemetryRecord>>,
    telemetry_batch_size: usize,
    auto_dump_dir: Mutex<Option<PathBuf>>,
}

impl NodeShared {
    fn record_telemetry(&self, event: &'static str, message: &Arc<Message>) {
        let Some(telemetry) = &self.telemetry else { return };

        let record = TelemetryRecord {
            ts: now_secs(),
            event: event.to_string(),
            node: self.name.clone(),
            origin: message.creator.clone(),
            message_id: message.id,
            data_source_id: message.data_source_id,
            size_bytes: message.payload().map(Payload::size_bytes).unwrap_or(0),
        };

        let batch = {
            let mut buffer = self.telemetry_buffer.lock().unwrap();
            buffer.push(record);
            if buffer.len() >= self.telemetry_batch_size {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            if let Err(err) = telemetry.record(batch) {
                tracing::warn!(node = %self.name, error = %err, "telemetry record failed");
            }
        }
    }

    fn flush_telemetry(&self) {
        let Some(telemetry) = &self.telemetry else { return };
        let batch = std::mem::take(&mut *self.telemetry_buffer.lock().unwrap());
        if !batch.is_empty() {
            if let Err(err) = telemetry.record(batch) {
                tracing::warn!(node = %self.name, error = %err, "telemetry flush failed");
            }
        }
    }

    fn maybe_dump(&self, message: &Arc<Message>) {
        let dir = self.auto_dump_dir.lock().unwrap();
        let Some(dir) = dir.as_ref() else { return };

        let path = dir.join(format!("{}.json", message.id));
        match message.to_json(true) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&path, json) {
                    tracing::warn!(node = %self.name, error = %err, "message dump failed");
                }
            }
            Err(err) => tracing::warn!(node = %self.name, error = %err, "message dump serialization failed"),
        }
    }
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Default)]
struct NodeThreads {
    ingest: Option<JoinHandle<()>>,
    update: Option<JoinHandle<()>>,
    source: Option<JoinHandle<()>>,
    stop_source: Arc<AtomicBool>,
}

/// A lifecycle-managed worker in a pipeline: owns an inbound queue, a buffer,
/// a destination set, and up to three cooperating worker threads (ingest,
/// update, and — for source nodes — source).
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("name", &self.inner.shared.name).finish()
    }
}

struct NodeInner {
    shared: NodeShared,
    inbound_tx: Outbox<Arc<Message>>,
    inbound_rx: Mutex<Option<Inbox<Arc<Message>>>>,
    buffer: Arc<Buffer>,
    behavior: Arc<Mutex<Box<dyn NodeBehavior>>>,
    source: Mutex<Option<Arc<Mutex<Box<dyn SourceBehavior>>>>>,
    status: Mutex<ComponentStatus>,
    threads: Mutex<NodeThreads>,
}

impl Node {
    /// Build a node. `limits` bounds the inbound queue, the buffer's output
    /// channel, and how many telemetry records accumulate before a flush.
    pub fn new(
        name: impl Into<String>,
        behavior: Box<dyn NodeBehavior>,
        source: Option<Box<dyn SourceBehavior>>,
        synchroniser: Arc<dyn Synchroniser>,
        limits: NodeLimits,
        telemetry: Option<Arc<dyn TelemetryManager>>,
    ) -> Self {
        let (inbound_tx, inbound_rx) = bounded(limits.queue_capacity);
        let shared = NodeShared {
            name: name.into(),
            destinations: Mutex::new(Vec::new()),
            origins: Mutex::new(HashSet::new()),
            suspended: AtomicBool::new(false),
            last_data_source_id: AtomicI64::new(-1),
            next_message_id: AtomicI64::new(0),
            telemetry,
            telemetry_buffer: Mutex::new(Vec::new()),
            telemetry_batch_size: limits.telemetry_batch_size,
            auto_dump_dir: Mutex::new(None),
        };

        Node {
            inner: Arc::new(NodeInner {
                shared,
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                buffer: Arc::new(Buffer::new(limits.queue_capacity, synchroniser)),
                behavior: Arc::new(Mutex::new(behavior)),
                source: Mutex::new(source.map(|s| Arc::new(Mutex::new(s)))),
                status: Mutex::new(ComponentStatus::New),
                threads: Mutex::new(NodeThreads::default()),
            }),
        }
    }

    /// The node's name.
    pub fn name(&self) -> &str {
        &self.inner.shared.name
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ComponentStatus {
        *self.inner.status.lock().unwrap()
    }

    /// Enable dumping every transmitted message to `dir` as pretty JSON.
    pub fn set_auto_dump(&self, dir: PathBuf) {
        *self.inner.shared.auto_dump_dir.lock().unwrap() = Some(dir);
    }

    /// Register `destination` as a recipient of this node's transmits.
    pub fn add_destination(&self, name: impl Into<String>, destination: &Node) {
        self.inner
            .shared
            .destinations
            .lock()
            .unwrap()
            .push((name.into(), destination.inner.inbound_tx.clone()));
    }

    /// The channel end upstream nodes push onto to deliver a message here.
    pub fn inbound(&self) -> Outbox<Arc<Message>> {
        self.inner.inbound_tx.clone()
    }

    /// Record `name` as an upstream node feeding this one. Populated by a
    /// pipeline at wiring time, one call per declared inbound link.
    pub fn add_origin(&self, name: impl Into<String>) {
        self.inner.shared.origins.lock().unwrap().insert(name.into());
    }

    /// Names of the upstream nodes feeding this one.
    pub fn origins(&self) -> Vec<String> {
        self.inner.shared.origins.lock().unwrap().iter().cloned().collect()
    }

    /// Run the node's user-defined pre-start preparation.
    pub fn warmup(&self) -> Result<(), DataflowError> {
        self.inner.behavior.lock().unwrap().warmup()?;
        *self.inner.status.lock().unwrap() = ComponentStatus::Configured;
        Ok(())
    }

    /// Spawn the ingest and update workers, and the source worker if this is
    /// a source node. Idempotent: a no-op if already running.
    pub fn start(&self) {
        if *self.inner.status.lock().unwrap() == ComponentStatus::Running {
            return;
        }

        let mut threads = self.inner.threads.lock().unwrap();
        let stop_source = Arc::new(AtomicBool::new(false));
        threads.stop_source = stop_source.clone();

        let inbound_rx = self.inner.inbound_rx.lock().unwrap().take();
        if let Some(inbound_rx) = inbound_rx {
            let node = self.clone();
            threads.ingest = Some(thread::spawn(move || node.run_ingest(inbound_rx)));
        }

        {
            let node = self.clone();
            threads.update = Some(thread::spawn(move || node.run_update()));
        }

        if let Some(source) = self.inner.source.lock().unwrap().clone() {
            let node = self.clone();
            threads.source = Some(thread::spawn(move || node.run_source(source, stop_source)));
        }

        *self.inner.status.lock().unwrap() = ComponentStatus::Running;
    }

    /// Signal all workers to stop, wait for them (bounded by
    /// [`DEFAULT_JOIN_TIMEOUT`] each), and flush any remaining telemetry.
    /// Idempotent.
    pub fn stop(&self) {
        if *self.inner.status.lock().unwrap() != ComponentStatus::Running {
            return;
        }

        self.inner.threads.lock().unwrap().stop_source.store(true, Ordering::Release);
        self.inner.inbound_tx.close();

        let mut threads = self.inner.threads.lock().unwrap();
        if let Some(handle) = threads.ingest.take() {
            join_with_timeout(handle, DEFAULT_JOIN_TIMEOUT, "ingest");
        }
        if let Some(handle) = threads.update.take() {
            join_with_timeout(handle, DEFAULT_JOIN_TIMEOUT, "update");
        }
        if let Some(handle) = threads.source.take() {
            join_with_timeout(handle, DEFAULT_JOIN_TIMEOUT, "source");
        }

        self.inner.shared.flush_telemetry();
        *self.inner.status.lock().unwrap() = ComponentStatus::Stopped;
    }

    /// Drop the node's source behaviour, if it has one. A pipeline calls
    /// this before `destroy` so nothing can still pull from it afterward.
    pub fn clear_source(&self) {
        *self.inner.source.lock().unwrap() = None;
    }

    /// Drop every registered destination.
    pub fn clear_destinations(&self) {
        self.inner.shared.destinations.lock().unwrap().clear();
    }

    /// Release external resources via the node's user-defined behaviour.
    pub fn destroy(&self) {
        self.inner.behavior.lock().unwrap().destroy();
    }

    /// Apply a runtime configuration change via the node's user-defined
    /// behaviour.
    pub fn set_on_config(&self, property: &str, value: serde_json::Value) {
        self.inner.behavior.lock().unwrap().set_on_config(property, value);
    }

    /// Mark this node suspended: inbound messages bypass the buffer and are
    /// forwarded straight to destinations.
    pub fn suspend(&self) {
        self.inner.shared.suspended.store(true, Ordering::Release);
    }

    /// Clear suspension, restoring buffered processing.
    pub fn resume(&self) {
        self.inner.shared.suspended.store(false, Ordering::Release);
    }

    fn transmitter(&self) -> Transmitter<'_> {
        Transmitter { shared: &self.inner.shared }
    }

    fn run_ingest(&self, inbound_rx: Inbox<Arc<Message>>) {
        loop {
            let message = match inbound_rx.pull() {
                Ok(Some(message)) => message,
                Ok(None) | Err(_) => {
                    self.inner.buffer.close();
                    break;
                }
            };

            if let Some(Payload::Control(control)) = message.payload() {
                self.spawn_control_handler(control.signal, message.clone());
                if control.signal.is_stop() {
                    self.inner.buffer.close();
                    break;
                }
                continue;
            }

            if self.inner.shared.suspended.load(Ordering::Acquire) {
                match message.duplicate() {
                    Some(copy) => {
                        if let Err(err) = self.transmitter().transmit(copy) {
                            tracing::warn!(node = %self.name(), error = %err, "suspended transmit failed");
                        }
                    }
                    None => tracing::warn!(node = %self.name(), "suspended transmit dropped: payload not yet compiled"),
                }
                continue;
            }

            self.inner.shared.record_telemetry("rx", &message);
            if self.inner.buffer.put(message).is_err() {
                break;
            }
        }
    }

    fn run_update(&self) {
        loop {
            let work = match self.inner.buffer.get() {
                Ok(Some(work)) => work,
                Ok(None) | Err(_) => break,
            };

            self.inner.shared.last_data_source_id.store(work.id, Ordering::Release);
            let tx = self.transmitter();
            let mut behavior = self.inner.behavior.lock().unwrap();
            if let Err(err) = behavior.update(work, &tx) {
                tracing::warn!(node = %self.name(), error = %err, "update failed");
            }
        }
    }

    fn run_source(&self, source: Arc<Mutex<Box<dyn SourceBehavior>>>, stop_source: Arc<AtomicBool>) {
        loop {
            if stop_source.load(Ordering::Acquire) {
                break;
            }

            let (interval, mode) = {
                let source = source.lock().unwrap();
                (source.interval(), source.mode())
            };

            if mode == SourceMode::Pre && !interval.is_zero() {
                thread::sleep(interval);
            }

            let message = source.lock().unwrap().next();
            let Some(message) = message else { break };

            if stop_source.load(Ordering::Acquire) {
                break;
            }

            if mode == SourceMode::Post && !interval.is_zero() {
                thread::sleep(interval);
            }

            let is_stop = matches!(message.payload(), Some(Payload::Control(c)) if c.signal.is_stop());
            if self.inner.inbound_tx.push(message).is_err() || is_stop {
                break;
            }
        }
    }

    fn spawn_control_handler(&self, signal: ControlSignal, message: Arc<Message>) {
        let node = self.clone();
        thread::spawn(move || match signal {
            ControlSignal::StopPropagate => {
                match message.duplicate() {
                    Some(copy) => {
                        if let Err(err) = node.transmitter().transmit(copy) {
                            tracing::warn!(node = %node.name(), error = %err, "stop propagation failed");
                        }
                    }
                    None => tracing::warn!(node = %node.name(), "stop propagation dropped: payload not yet compiled"),
                }
                node.stop();
            }
            ControlSignal::Stop => node.stop(),
            ControlSignal::Start => node.start(),
            ControlSignal::Suspend => node.suspend(),
            ControlSignal::Resume => node.resume(),
            ControlSignal::Warmup | ControlSignal::StartPropagate => {}
        });
    }
}

fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, label: &'static str) {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = handle.join();
        let _ = tx.send(());
    });

    if rx.recv_timeout(timeout).is_err() {
        tracing::warn!(worker = label, "worker did not exit within timeout; abandoning");
    }
}

/// Per-node configuration not captured by wiring: queue capacity and
/// telemetry batching. Exposed so a component builder can size a node
/// differently from the process-wide default.
#[derive(Debug, Clone, Copy)]
pub struct NodeLimits {
    /// Inbound queue and buffer output channel capacity.
    pub queue_capacity: usize,
    /// Records accumulated before a telemetry batch is flushed.
    pub telemetry_batch_size: usize,
}

impl Default for NodeLimits {
    fn default() -> Self {
        NodeLimits {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            telemetry_batch_size: DEFAULT_TELEMETRY_BATCH_SIZE,
        }
    }
}

impl NodeLimits {
    /// Defaults with the queue capacity overridden.
    pub fn with_capacity(queue_capacity: usize) -> Self {
        NodeLimits { queue_capacity, ..NodeLimits::default() }
    }
}

/// Convenience alias used by component builders assembling a node's static
/// configuration before construction.
pub type NodeConfiguration = HashMap<String, serde_json::Value>;
