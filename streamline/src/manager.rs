use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use streamline_telemetry::TelemetryManager;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::node::NodeLimits;
use crate::node_factory::NodeFactory;
use crate::pipeline::{Pipeline, PipelineStatusReport};

/// Outcome of a manager operation: either it succeeded, or it failed for a
/// reason worth reporting back to a caller without raising — an unknown id,
/// or a redundant lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    /// The operation succeeded.
    Ok,
    /// The operation could not be completed.
    Ko {
        /// Machine-readable reason code, e.g. `"INVALID_ID"`, `"ALREADY_RUNNING"`.
        reason: String,
    },
}

impl ServiceStatus {
    fn ko(reason: impl Into<String>) -> Self {
        ServiceStatus::Ko { reason: reason.into() }
    }
}

/// Where a manager creates new pipelines' working directories, absent an
/// explicit folder in their configuration.
#[derive(Clone)]
pub struct ManagerOptions {
    /// Base directory pipelines are created under.
    pub base_folder: PathBuf,
    /// Queue capacity and telemetry batching applied to every node this
    /// manager builds. Process-wide, per the runtime's single flow-control
    /// knob — individual pipelines and nodes do not override it.
    pub node_limits: NodeLimits,
    /// Telemetry manager shared by every pipeline this manager creates.
    pub telemetry: Option<Arc<dyn TelemetryManager>>,
}

impl std::fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("base_folder", &self.base_folder)
            .field("node_limits", &self.node_limits)
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            base_folder: PathBuf::from("./pipelines"),
            node_limits: NodeLimits::default(),
            telemetry: None,
        }
    }
}

/// The process-wide registry of live pipelines: creation, lifecycle
/// transitions, and status, all guarded by a single mutex so the map itself
/// is never torn, while individual pipelines run independently once built.
pub struct PipelineManager {
    factory: NodeFactory,
    options: ManagerOptions,
    pipelines: Mutex<HashMap<String, Entry>>,
}

impl PipelineManager {
    /// Build a manager around a node factory and creation options.
    pub fn new(factory: NodeFactory, options: ManagerOptions) -> Self {
        PipelineManager { factory, options, pipelines: Mutex::new(HashMap::new()) }
    }

    /// Register a pipeline from its configuration. Assigns a fresh id and a
    /// working folder under the manager's base folder, but does not build or
    /// wire any nodes yet — call [`PipelineManager::warmup`] for that.
    pub fn create(&self, config: PipelineConfig) -> String {
        let id = Uuid::new_v4().to_string();
        let folder = self.options.base_folder.join(&id);

        let mut section = config.pipeline;
        section.id = id.clone();
        section.folder = folder.to_string_lossy().into_owned();

        self.pipelines.lock().unwrap().insert(id.clone(), Entry::Pending { section, folder });
        id
    }

    /// Build and wire a pipeline's nodes, transitioning it to `Ready`.
    pub fn warmup(&self, id: &str) -> ServiceStatus {
        self.with_pending(id, |section, folder| {
            Pipeline::warmup(section, id, folder, &self.factory, self.options.node_limits, self.options.telemetry.clone())
        })
    }

    /// Start a `Ready` pipeline's nodes.
    pub fn start(&self, id: &str) -> ServiceStatus {
        self.with_built(id, |pipeline| pipeline.start())
    }

    /// Stop a `Running` pipeline's nodes.
    pub fn stop(&self, id: &str) -> ServiceStatus {
        self.with_built(id, |pipeline| pipeline.stop())
    }

    /// Destroy a pipeline's nodes and remove it from the registry.
    /// `wipe_folder` additionally removes its working directory from disk.
    pub fn delete(&self, id: &str, wipe_folder: bool) -> ServiceStatus {
        let mut pipelines = self.pipelines.lock().unwrap();
        let Some(entry) = pipelines.remove(id) else {
            return ServiceStatus::ko("INVALID_ID");
        };

        if let Entry::Built(mut pipeline) = entry {
            pipeline.destroy();
            if wipe_folder {
                let _ = std::fs::remove_dir_all(pipeline.folder());
            }
        } else if wipe_folder {
            if let Entry::Pending { folder, .. } = &entry {
                let _ = std::fs::remove_dir_all(folder);
            }
        }

        ServiceStatus::Ok
    }

    /// Report a single pipeline's status.
    pub fn status(&self, id: &str) -> Result<PipelineStatusReport, ServiceStatus> {
        let pipelines = self.pipelines.lock().unwrap();
        match pipelines.get(id) {
            Some(Entry::Built(pipeline)) => Ok(pipeline.status()),
            Some(Entry::Pending { .. }) => Err(ServiceStatus::ko("NOT_WARMED_UP")),
            None => Err(ServiceStatus::ko("INVALID_ID")),
        }
    }

    /// List every known pipeline id.
    pub fn list(&self) -> Vec<String> {
        self.pipelines.lock().unwrap().keys().cloned().collect()
    }

    fn with_pending(
        &self,
        id: &str,
        f: impl FnOnce(&crate::config::PipelineSection, PathBuf) -> Result<Pipeline, crate::error::DataflowError>,
    ) -> ServiceStatus {
        let mut pipelines = self.pipelines.lock().unwrap();
        match pipelines.get(id) {
            Some(Entry::Built(_)) => return ServiceStatus::ko("ALREADY_WARMED_UP"),
            Some(Entry::Pending { .. }) => {}
            None => return ServiceStatus::ko("INVALID_ID"),
        }

        let Some(Entry::Pending { section, folder }) = pipelines.remove(id) else { unreachable!() };
        match f(&section, folder.clone()) {
            Ok(pipeline) => {
                pipelines.insert(id.to_string(), Entry::Built(pipeline));
                ServiceStatus::Ok
            }
            Err(err) => {
                pipelines.insert(id.to_string(), Entry::Pending { section, folder });
                ServiceStatus::ko(err.to_string())
            }
        }
    }

    fn with_built(&self, id: &str, f: impl FnOnce(&mut Pipeline) -> Result<(), crate::error::DataflowError>) -> ServiceStatus {
        let mut pipelines = self.pipelines.lock().unwrap();
        match pipelines.get_mut(id) {
            Some(Entry::Built(pipeline)) => match f(pipeline) {
                Ok(()) => ServiceStatus::Ok,
                Err(err) => ServiceStatus::ko(err.to_string()),
            },
            Some(Entry::Pending { .. }) => ServiceStatus::ko("NOT_WARMED_UP"),
            None => ServiceStatus::ko("INVALID_ID"),
        }
    }
}

enum Entry {
    Pending { section: crate::config::PipelineSection, folder: PathBuf },
    Built(Pipeline),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkSpec, NodeSpec, PipelineSection};
    use crate::node::Transmitter;
    use crate::node_factory::BuiltNode;
    use crate::node::NodeBehavior;
    use std::sync::Arc as StdArc;
    use streamline_wire::Message;

    struct NoOp;
    impl NodeBehavior for NoOp {
        fn update(&mut self, _work: StdArc<Message>, _tx: &Transmitter<'_>) -> Result<(), crate::error::DataflowError> {
            Ok(())
        }
    }

    fn manager(dir: &std::path::Path) -> PipelineManager {
        let mut factory = NodeFactory::new();
        factory.register("noop", StdArc::new(|_cfg| Ok(BuiltNode::processor(NoOp))));
        PipelineManager::new(
            factory,
            ManagerOptions { base_folder: dir.to_path_buf(), ..ManagerOptions::default() },
        )
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            version: "1".to_string(),
            plugins: vec![],
            pipeline: PipelineSection {
                name: "demo".to_string(),
                id: String::new(),
                folder: String::new(),
                nodes: vec![
                    NodeSpec {
                        name: "src".to_string(),
                        kind: "source".to_string(),
                        mark: "noop".to_string(),
                        sync: None,
                        configuration: Default::default(),
                    },
                    NodeSpec {
                        name: "sink".to_string(),
                        kind: "sink".to_string(),
                        mark: "noop".to_string(),
                        sync: None,
                        configuration: Default::default(),
                    },
                ],
                links: vec![LinkSpec { from: "src".to_string(), to: "sink".to_string() }],
            },
        }
    }

    #[test]
    fn unknown_id_reports_invalid() {
        let dir = std::env::temp_dir().join("streamline-manager-test-unknown");
        let manager = manager(&dir);
        assert_eq!(manager.warmup("nope"), ServiceStatus::ko("INVALID_ID"));
    }

    #[test]
    fn create_warmup_start_stop_roundtrip() {
        let dir = std::env::temp_dir().join(format!("streamline-manager-test-{}", std::process::id()));
        let manager = manager(&dir);
        let id = manager.create(config());

        assert_eq!(manager.warmup(&id), ServiceStatus::Ok);
        assert_eq!(manager.warmup(&id), ServiceStatus::ko("ALREADY_WARMED_UP"));
        assert_eq!(manager.start(&id), ServiceStatus::Ok);
        assert_eq!(manager.stop(&id), ServiceStatus::Ok);
        assert_eq!(manager.delete(&id, true), ServiceStatus::Ok);
    }
}
