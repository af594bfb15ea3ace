use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DataflowError;
use crate::node::{NodeBehavior, SourceBehavior};
use crate::synchroniser::{Passthrough, Synchroniser};

/// A node's user-defined behaviour plus, for a source node, its source
/// callback, as handed back by a [`NodeFactory`] constructor.
pub struct BuiltNode {
    /// The node's update-worker behaviour.
    pub behavior: Box<dyn NodeBehavior>,
    /// The node's source-worker callback, if it produces its own work.
    pub source: Option<Box<dyn SourceBehavior>>,
}

impl std::fmt::Debug for BuiltNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltNode").field("source", &self.source.is_some()).finish()
    }
}

impl BuiltNode {
    /// Wrap ordinary processing behaviour with no source callback.
    pub fn processor(behavior: impl NodeBehavior + 'static) -> Self {
        BuiltNode { behavior: Box::new(behavior), source: None }
    }

    /// Wrap a source node: behaviour plus its source callback.
    pub fn source(behavior: impl NodeBehavior + 'static, source: impl SourceBehavior + 'static) -> Self {
        BuiltNode { behavior: Box::new(behavior), source: Some(Box::new(source)) }
    }
}

/// A plugin constructor: given a node's free-form configuration, build its
/// behaviour.
pub type NodeConstructor = Arc<dyn Fn(&serde_json::Value) -> Result<BuiltNode, DataflowError> + Send + Sync>;

/// A name-to-constructor map replacing dynamic, keyword-style node
/// construction: every node type a pipeline can reference must be registered
/// here under its mark before the pipeline is built. Also resolves a node's
/// declared `sync` name to a [`Synchroniser`] the same way, so a config can
/// select a custom synchroniser per node instead of always getting
/// [`Passthrough`].
#[derive(Clone)]
pub struct NodeFactory {
    constructors: HashMap<String, NodeConstructor>,
    synchronisers: HashMap<String, Arc<dyn Synchroniser>>,
}

impl Default for NodeFactory {
    fn default() -> Self {
        let mut synchronisers: HashMap<String, Arc<dyn Synchroniser>> = HashMap::new();
        synchronisers.insert("passthrough".to_string(), Arc::new(Passthrough));
        NodeFactory { constructors: HashMap::new(), synchronisers }
    }
}

impl NodeFactory {
    /// A registry with only the built-in `"passthrough"` synchroniser
    /// registered.
    pub fn new() -> Self {
        NodeFactory::default()
    }

    /// Register a constructor under `mark`. Replaces any prior registration
    /// under the same name.
    pub fn register(&mut self, mark: impl Into<String>, constructor: NodeConstructor) {
        self.constructors.insert(mark.into(), constructor);
    }

    /// Register a synchroniser under `name`, selectable from a node's `sync`
    /// declaration. Replaces any prior registration under the same name,
    /// including `"passthrough"`.
    pub fn register_synchroniser(&mut self, name: impl Into<String>, synchroniser: Arc<dyn Synchroniser>) {
        self.synchronisers.insert(name.into(), synchroniser);
    }

    /// Build a node's behaviour by looking up `mark` and invoking its
    /// constructor with `configuration`.
    pub fn build(&self, mark: &str, configuration: &serde_json::Value) -> Result<BuiltNode, DataflowError> {
        let constructor = self
            .constructors
            .get(mark)
            .ok_or_else(|| DataflowError::PluginLoad { mark: mark.to_string() })?;
        constructor(configuration)
    }

    /// Resolve a `sync` name to its registered synchroniser.
    pub fn synchroniser(&self, name: &str) -> Result<Arc<dyn Synchroniser>, DataflowError> {
        self.synchronisers
            .get(name)
            .cloned()
            .ok_or_else(|| DataflowError::PluginLoad { mark: name.to_string() })
    }

    /// Whether a constructor is registered under `mark`.
    pub fn contains(&self, mark: &str) -> bool {
        self.constructors.contains_key(mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Transmitter;
    use std::sync::Arc as StdArc;
    use streamline_wire::Message;

    struct NoOp;
    impl NodeBehavior for NoOp {
        fn update(&mut self, _work: StdArc<Message>, _tx: &Transmitter<'_>) -> Result<(), DataflowError> {
            Ok(())
        }
    }

    #[test]
    fn unregistered_mark_fails_plugin_load() {
        let factory = NodeFactory::new();
        let err = factory.build("missing", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, DataflowError::PluginLoad { .. }));
    }

    #[test]
    fn registered_mark_builds() {
        let mut factory = NodeFactory::new();
        factory.register("noop", Arc::new(|_cfg| Ok(BuiltNode::processor(NoOp))));
        assert!(factory.contains("noop"));
        let built = factory.build("noop", &serde_json::json!({})).unwrap();
        assert!(built.source.is_none());
    }

    #[test]
    fn passthrough_synchroniser_is_registered_by_default() {
        let factory = NodeFactory::new();
        assert!(factory.synchroniser("passthrough").is_ok());
    }

    #[test]
    fn unregistered_synchroniser_name_fails_plugin_load() {
        let factory = NodeFactory::new();
        let err = factory.synchroniser("custom").unwrap_err();
        assert!(matches!(err, DataflowError::PluginLoad { .. }));
    }

    #[test]
    fn custom_synchroniser_resolves_by_registered_name() {
        use crate::synchroniser::{Marks, Sources};

        #[derive(Debug)]
        struct AlwaysEmpty;
        impl Synchroniser for AlwaysEmpty {
            fn next_batch(&self, _sources: &Sources<'_>) -> Marks {
                Marks::new()
            }
        }

        let mut factory = NodeFactory::new();
        factory.register_synchroniser("custom", Arc::new(AlwaysEmpty));
        assert!(factory.synchroniser("custom").is_ok());
    }
}
