use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The persisted and accepted shape of a pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Free-form config-format version string.
    pub version: String,
    /// Directories the component builder searches for plugins.
    #[serde(default)]
    pub plugins: Vec<String>,
    /// The pipeline itself.
    pub pipeline: PipelineSection,
}

impl PipelineConfig {
    /// Parse a pipeline configuration from its JSON text representation.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Render this configuration back to its JSON text representation.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// The pipeline body: identity, node declarations, and the edges between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// The pipeline's human-assigned name.
    pub name: String,
    /// The manager-assigned id, once created. Empty before creation.
    #[serde(default)]
    pub id: String,
    /// The manager-assigned working directory, once created.
    #[serde(default)]
    pub folder: String,
    /// Node declarations.
    pub nodes: Vec<NodeSpec>,
    /// Edge declarations.
    pub links: Vec<LinkSpec>,
}

/// One node's declaration within a pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// The node's name, unique within the pipeline.
    pub name: String,
    /// The node's role, purely documentary: `"source"`, `"proc"`, or `"sink"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The plugin key a [`crate::NodeFactory`] registers under.
    pub mark: String,
    /// The synchroniser to use, e.g. `"passthrough"`, or a custom name the
    /// component builder resolves.
    #[serde(default)]
    pub sync: Option<String>,
    /// Free-form per-node configuration, passed to the constructed node's
    /// `configure` hook.
    #[serde(default)]
    pub configuration: HashMap<String, serde_json::Value>,
}

/// One directed edge declaration within a pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    /// The source node's name.
    pub from: String,
    /// The destination node's name.
    pub to: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let json = r#"{
            "version": "1",
            "plugins": [],
            "pipeline": {
                "name": "demo",
                "nodes": [
                    { "name": "src", "type": "source", "mark": "clock" },
                    { "name": "sink", "type": "sink", "mark": "collector" }
                ],
                "links": [ { "from": "src", "to": "sink" } ]
            }
        }"#;

        let config = PipelineConfig::from_json(json).unwrap();
        assert_eq!(config.pipeline.nodes.len(), 2);
        assert_eq!(config.pipeline.links[0].from, "src");
    }
}
