//! Explorer configuration, loaded from YAML

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::graph::options::GraphOptions;

/// Above this many unrendered edges an expansion needs confirmation
pub const DEFAULT_HEAVILY_CONNECTED: usize = 10;

/// Record properties rendered as links when they reference other records
pub const DEFAULT_LINK_PROPERTIES: [&str; 4] = ["conditions", "evidence", "relevance", "subject"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorerConfig {
    pub heavily_connected: usize,
    pub link_properties: Vec<String>,
    pub graph: GraphOptions,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            heavily_connected: DEFAULT_HEAVILY_CONNECTED,
            link_properties: DEFAULT_LINK_PROPERTIES.iter().map(|p| p.to_string()).collect(),
            graph: GraphOptions::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&content)?;
        info!(path = %path.display(), "loaded explorer config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ExplorerConfig::from_yaml_str("heavilyConnected: 3\n").unwrap();
        assert_eq!(config.heavily_connected, 3);
        assert_eq!(config.link_properties, ExplorerConfig::default().link_properties);
        assert_eq!(config.graph, GraphOptions::default());
    }

    #[test]
    fn from_path_reads_nested_graph_options() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "linkProperties: [subject]\ngraph:\n  nodeColorProp: source.name\n  simulation:\n    linkDistance: 120"
        )
        .unwrap();
        let config = ExplorerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.link_properties, vec!["subject".to_string()]);
        assert_eq!(config.graph.node_color_prop.as_deref(), Some("source.name"));
        assert_eq!(config.graph.simulation.link_distance, 120.0);
        assert_eq!(config.heavily_connected, DEFAULT_HEAVILY_CONNECTED);
    }

    #[test]
    fn reports_unreadable_and_invalid_files() {
        assert!(matches!(
            ExplorerConfig::from_path("/nonexistent/explorer.yaml"),
            Err(ConfigError::Io { .. })
        ));
        assert!(matches!(
            ExplorerConfig::from_yaml_str("heavilyConnected: lots"),
            Err(ConfigError::Parse(_))
        ));
    }
}
