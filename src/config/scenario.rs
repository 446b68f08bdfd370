use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::network::topology::Topology;
use crate::protocol::types::{Cost, NodeId};

/// A network scenario: named nodes, the links they start with, and the
/// link changes to apply once the initial topology has settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub nodes: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub events: Vec<LinkEventConfig>,
}

/// An initial undirected link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
    pub cost: Cost,
}

/// A link-cost change applied as its own phase; `"inf"` takes the link
/// down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEventConfig {
    pub a: String,
    pub b: String,
    pub cost: Cost,
}

impl ScenarioConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let config: ScenarioConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("writing scenario {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("scenario {:?} declares no nodes", self.name);
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.as_str()) {
                bail!("duplicate node name {:?} in scenario {:?}", node, self.name);
            }
        }
        for link in &self.links {
            self.check_pair(&link.a, &link.b)?;
        }
        for event in &self.events {
            self.check_pair(&event.a, &event.b)?;
        }
        Ok(())
    }

    fn check_pair(&self, a: &str, b: &str) -> Result<()> {
        self.node_id(a)?;
        self.node_id(b)?;
        if a == b {
            bail!("node {:?} cannot link to itself", a);
        }
        Ok(())
    }

    /// Id of a declared node; ids follow declaration order.
    pub fn node_id(&self, name: &str) -> Result<NodeId> {
        self.nodes
            .iter()
            .position(|node| node == name)
            .map(|index| NodeId(index as u32))
            .with_context(|| format!("unknown node {:?} in scenario {:?}", name, self.name))
    }

    /// Build the initial topology described by `nodes` and `links`.
    pub fn topology(&self) -> Result<Topology> {
        let mut topology = Topology::new();
        for node in &self.nodes {
            topology.add_node(node.clone());
        }
        for link in &self.links {
            topology.set_link(self.node_id(&link.a)?, self.node_id(&link.b)?, link.cost);
        }
        Ok(topology)
    }
}
