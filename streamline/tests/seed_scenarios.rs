//! End-to-end scenarios exercising node wiring, lineage propagation,
//! multi-input synchronisation, backpressure, and suspend/resume, run with
//! plain threads and channels rather than any async runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use streamline::{
    BuiltNode, ComponentStatus, DataflowError, LinkSpec, Marks, Node, NodeBehavior, NodeFactory, NodeLimits,
    NodeSpec, Passthrough, Pipeline, PipelineSection, SourceBehavior, Sources, Synchroniser, Transmitter,
};
use streamline_wire::{BytesPayload, Message, Payload};

fn settle() {
    thread::sleep(Duration::from_millis(150));
}

fn bytes_message(creator: &str, id: i64, version: i64, content: Vec<u8>) -> Message {
    let size = content.len() as u64;
    Message::new(0.0, creator, id, Payload::Bytes(BytesPayload { content, size_bytes: size }))
        .with_version(version)
}

/// A behaviour that forwards every work unit unchanged, carrying its version
/// along, used to stand in for a transparent relay stage.
struct Forward {
    as_name: String,
}
impl Forward {
    fn new(as_name: &str) -> Self {
        Forward { as_name: as_name.to_string() }
    }
}
impl NodeBehavior for Forward {
    fn update(&mut self, work: Arc<Message>, tx: &Transmitter<'_>) -> Result<(), DataflowError> {
        let payload = work.payload().expect("work unit payload must already be compiled").clone();
        let out = Message::new(work.created_at, self.as_name.clone(), tx.next_id(), payload).with_version(work.version);
        tx.transmit(out)
    }
}

/// A behaviour that splits every input into two output messages, for
/// lineage propagation testing.
struct Split;
impl NodeBehavior for Split {
    fn update(&mut self, work: Arc<Message>, tx: &Transmitter<'_>) -> Result<(), DataflowError> {
        for _ in 0..2 {
            let payload = work.payload().expect("compiled payload").clone();
            tx.transmit(Message::new(work.created_at, "proc", tx.next_id(), payload))?;
        }
        Ok(())
    }
}

/// A sink that records every work unit it receives, in arrival order.
struct Collect {
    sink: Arc<Mutex<Vec<Arc<Message>>>>,
}
impl NodeBehavior for Collect {
    fn update(&mut self, work: Arc<Message>, _tx: &Transmitter<'_>) -> Result<(), DataflowError> {
        self.sink.lock().unwrap().push(work);
        Ok(())
    }
}

/// A sink that sleeps before recording, to create backpressure.
struct SlowCollect {
    sink: Arc<Mutex<Vec<Arc<Message>>>>,
    delay: Duration,
}
impl NodeBehavior for SlowCollect {
    fn update(&mut self, work: Arc<Message>, _tx: &Transmitter<'_>) -> Result<(), DataflowError> {
        thread::sleep(self.delay);
        self.sink.lock().unwrap().push(work);
        Ok(())
    }
}

/// A finite source emitting `count` messages with no inter-message delay.
struct FiniteSource {
    remaining: i64,
    next_id: i64,
}
impl SourceBehavior for FiniteSource {
    fn next(&mut self) -> Option<Arc<Message>> {
        if self.remaining <= 0 {
            return None;
        }
        let version = self.next_id;
        let msg = bytes_message("src", self.next_id, version, vec![self.next_id as u8; 4]);
        self.next_id += 1;
        self.remaining -= 1;
        Some(Arc::new(msg))
    }
}

fn chain(a: &Node, b: &Node) {
    a.add_destination(b.name().to_string(), b);
    b.add_origin(a.name().to_string());
}

#[test]
fn identity_passthrough() {
    let sink_store = Arc::new(Mutex::new(Vec::new()));
    let src = Node::new(
        "src",
        Box::new(Forward::new("src")),
        Some(Box::new(FiniteSource { remaining: 4, next_id: 0 })),
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );
    let proc = Node::new(
        "proc",
        Box::new(Forward::new("proc")),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );
    let sink = Node::new(
        "sink",
        Box::new(Collect { sink: sink_store.clone() }),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );

    chain(&src, &proc);
    chain(&proc, &sink);

    src.warmup().unwrap();
    proc.warmup().unwrap();
    sink.warmup().unwrap();
    sink.start();
    proc.start();
    src.start();

    settle();
    src.stop();
    proc.stop();
    sink.stop();

    let received = sink_store.lock().unwrap();
    assert_eq!(received.len(), 4);
    let versions: Vec<i64> = received.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![0, 1, 2, 3]);
    for (i, msg) in received.iter().enumerate() {
        match msg.payload() {
            Some(Payload::Bytes(b)) => assert_eq!(b.content, vec![i as u8; 4]),
            other => panic!("expected bytes payload, got {other:?}"),
        }
    }
}

#[test]
fn lineage_propagates_through_a_split() {
    let sink_store = Arc::new(Mutex::new(Vec::new()));
    let src = Node::new(
        "src",
        Box::new(Forward::new("src")),
        Some(Box::new(FiniteSource { remaining: 2, next_id: 0 })),
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );
    let proc = Node::new("proc", Box::new(Split), None, Arc::new(Passthrough), NodeLimits::with_capacity(16), None);
    let sink = Node::new(
        "sink",
        Box::new(Collect { sink: sink_store.clone() }),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );

    chain(&src, &proc);
    chain(&proc, &sink);

    src.warmup().unwrap();
    proc.warmup().unwrap();
    sink.warmup().unwrap();
    sink.start();
    proc.start();
    src.start();

    settle();
    src.stop();
    proc.stop();
    sink.stop();

    let received = sink_store.lock().unwrap();
    assert_eq!(received.len(), 4);
    // Each pair of outputs shares the data_source_id of the input that produced it,
    // and those ids appear in source-monotonic order.
    let lineage: Vec<i64> = received.iter().map(|m| m.data_source_id.unwrap()).collect();
    assert_eq!(lineage, vec![0, 0, 1, 1]);
}

/// Requires one pending message from each of two named creators before
/// emitting, taking the earliest pending index from each.
#[derive(Debug)]
struct BothReady;
impl Synchroniser for BothReady {
    fn next_batch(&self, sources: &Sources<'_>) -> Marks {
        let ready = sources.get("A").map(|v| !v.is_empty()).unwrap_or(false)
            && sources.get("B").map(|v| !v.is_empty()).unwrap_or(false);
        let mut marks = Marks::new();
        if ready {
            marks.insert("A".to_string(), vec![0]);
            marks.insert("B".to_string(), vec![0]);
        }
        marks
    }
}

#[test]
fn multi_input_synchroniser_pairs_by_creator() {
    let sink_store = Arc::new(Mutex::new(Vec::new()));
    let join = Node::new("join", Box::new(Forward::new("join")), None, Arc::new(BothReady), NodeLimits::with_capacity(16), None);
    let sink = Node::new(
        "sink",
        Box::new(Collect { sink: sink_store.clone() }),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );
    chain(&join, &sink);

    join.warmup().unwrap();
    sink.warmup().unwrap();
    sink.start();
    join.start();

    use streamline_channels::Push;
    let inbound = join.inbound();
    inbound.push(Arc::new(bytes_message("A", 1, 0, vec![1]))).unwrap();
    inbound.push(Arc::new(bytes_message("A", 2, 0, vec![2]))).unwrap();
    inbound.push(Arc::new(bytes_message("B", 1, 0, vec![3]))).unwrap();
    settle();

    {
        let received = sink_store.lock().unwrap();
        assert_eq!(received.len(), 1);
        match received[0].payload() {
            Some(Payload::Batch(batch)) => assert_eq!(batch.messages.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    inbound.push(Arc::new(bytes_message("B", 2, 0, vec![4]))).unwrap();
    settle();

    let received = sink_store.lock().unwrap();
    assert_eq!(received.len(), 2);

    join.stop();
    sink.stop();
}

/// The same pairing-by-creator synchroniser as `multi_input_synchroniser_pairs_by_creator`,
/// but reached through a config-declared `sync` name rather than a hand-wired `Node`, to
/// prove a pipeline built from configuration can select a custom synchroniser per node.
#[test]
fn pipeline_config_selects_custom_synchroniser_by_name() {
    use streamline_channels::Push;

    let sink_store = Arc::new(Mutex::new(Vec::new()));
    let sink_store_for_factory = sink_store.clone();

    let mut factory = NodeFactory::new();
    factory.register_synchroniser("both_ready", Arc::new(BothReady));
    factory.register("relay", Arc::new(|_cfg| Ok(BuiltNode::processor(Forward::new("join")))));
    factory.register("collect", Arc::new(move |_cfg| {
        Ok(BuiltNode::processor(Collect { sink: sink_store_for_factory.clone() }))
    }));

    let section = PipelineSection {
        name: "joined".to_string(),
        id: String::new(),
        folder: String::new(),
        nodes: vec![
            NodeSpec {
                name: "join".to_string(),
                kind: "proc".to_string(),
                mark: "relay".to_string(),
                sync: Some("both_ready".to_string()),
                configuration: Default::default(),
            },
            NodeSpec {
                name: "sink".to_string(),
                kind: "sink".to_string(),
                mark: "collect".to_string(),
                sync: None,
                configuration: Default::default(),
            },
        ],
        links: vec![LinkSpec { from: "join".to_string(), to: "sink".to_string() }],
    };

    let dir = std::env::temp_dir().join(format!("streamline-custom-sync-{}", std::process::id()));
    let mut pipeline =
        Pipeline::warmup(&section, "test-id", dir.clone(), &factory, NodeLimits::with_capacity(16), None).unwrap();
    pipeline.start().unwrap();

    let join = pipeline.node_inbound("join").expect("join node exists");
    join.push(Arc::new(bytes_message("A", 1, 0, vec![1]))).unwrap();
    join.push(Arc::new(bytes_message("A", 2, 0, vec![2]))).unwrap();
    join.push(Arc::new(bytes_message("B", 1, 0, vec![3]))).unwrap();
    settle();

    {
        let received = sink_store.lock().unwrap();
        assert_eq!(received.len(), 1);
        match received[0].payload() {
            Some(Payload::Batch(batch)) => assert_eq!(batch.messages.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    join.push(Arc::new(bytes_message("B", 2, 0, vec![4]))).unwrap();
    settle();
    assert_eq!(sink_store.lock().unwrap().len(), 2);

    pipeline.stop().unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn backpressure_blocks_without_dropping() {
    let sink_store = Arc::new(Mutex::new(Vec::new()));
    let src = Node::new(
        "src",
        Box::new(Forward::new("src")),
        Some(Box::new(FiniteSource { remaining: 10, next_id: 0 })),
        Arc::new(Passthrough),
        NodeLimits::with_capacity(2),
        None,
    );
    let sink = Node::new(
        "sink",
        Box::new(SlowCollect { sink: sink_store.clone(), delay: Duration::from_millis(20) }),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(2),
        None,
    );
    chain(&src, &sink);

    src.warmup().unwrap();
    sink.warmup().unwrap();
    sink.start();
    src.start();

    // Long enough for a slow, bounded-queue sink to drain everything even
    // though the source produced far faster than the sink can consume.
    thread::sleep(Duration::from_millis(500));
    src.stop();
    sink.stop();

    assert_eq!(sink_store.lock().unwrap().len(), 10);
}

#[test]
fn suspend_bypasses_processing_resume_restores_it() {
    let sink_store = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = seen.clone();

    struct Counting {
        seen: Arc<AtomicUsize>,
    }
    impl NodeBehavior for Counting {
        fn update(&mut self, work: Arc<Message>, tx: &Transmitter<'_>) -> Result<(), DataflowError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            let payload = work.payload().expect("compiled payload").clone();
            tx.transmit(Message::new(work.created_at, "proc", tx.next_id(), payload))
        }
    }

    let proc = Node::new(
        "proc",
        Box::new(Counting { seen: seen_clone }),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );
    let sink = Node::new(
        "sink",
        Box::new(Collect { sink: sink_store.clone() }),
        None,
        Arc::new(Passthrough),
        NodeLimits::with_capacity(16),
        None,
    );
    chain(&proc, &sink);

    proc.warmup().unwrap();
    sink.warmup().unwrap();
    sink.start();
    proc.start();

    use streamline_channels::Push;
    let inbound = proc.inbound();

    proc.suspend();
    for i in 0..3 {
        inbound.push(Arc::new(bytes_message("src", i, i, vec![i as u8]))).unwrap();
    }
    settle();

    proc.resume();
    for i in 3..5 {
        inbound.push(Arc::new(bytes_message("src", i, i, vec![i as u8]))).unwrap();
    }
    settle();

    proc.stop();
    sink.stop();

    let received = sink_store.lock().unwrap();
    assert_eq!(received.len(), 5);
    // Only the two messages sent after resume went through `update`.
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn invalid_graph_rejects_unknown_edge_target() {
    let mut factory = NodeFactory::new();
    factory.register("noop", Arc::new(|_cfg| Ok(BuiltNode::processor(Forward::new("noop")))));

    let section = PipelineSection {
        name: "broken".to_string(),
        id: String::new(),
        folder: String::new(),
        nodes: vec![NodeSpec {
            name: "only".to_string(),
            kind: "proc".to_string(),
            mark: "noop".to_string(),
            sync: None,
            configuration: Default::default(),
        }],
        links: vec![LinkSpec { from: "only".to_string(), to: "nowhere".to_string() }],
    };

    let dir = std::env::temp_dir().join(format!("streamline-invalid-graph-{}", std::process::id()));
    let err = Pipeline::warmup(&section, "test-id", dir.clone(), &factory, NodeLimits::default(), None).unwrap_err();
    assert!(matches!(err, DataflowError::InvalidGraph { .. }));

    // config.json is written before graph validation; no further artefacts
    // should exist beyond it.
    let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn component_status_is_new_until_warmed_up() {
    let node = Node::new("n", Box::new(Forward::new("n")), None, Arc::new(Passthrough), NodeLimits::with_capacity(4), None);
    assert_eq!(node.status(), ComponentStatus::New);
    node.warmup().unwrap();
    assert_eq!(node.status(), ComponentStatus::Configured);
}

