//! Node DTOs

use serde::{Deserialize, Serialize};

use crate::domain::node::Node;

/// `computer/api/json` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerSet {
    #[serde(default)]
    pub computer: Vec<ComputerInfo>,
}

/// One entry of the computer set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerInfo {
    pub display_name: String,
    #[serde(default)]
    pub offline: bool,
    #[serde(rename = "_class", default)]
    pub class: String,
}

impl ComputerInfo {
    /// The built-in controller executor is reported alongside agents
    pub fn is_controller(&self) -> bool {
        self.class.ends_with("MasterComputer") || self.class.ends_with("BuiltInComputer")
    }
}

impl ComputerSet {
    /// Agent nodes, excluding the controller's own executor
    pub fn into_nodes(self) -> Vec<Node> {
        self.computer
            .into_iter()
            .filter(|c| !c.is_controller())
            .map(|c| Node {
                display_name: c.display_name,
                offline: c.offline,
            })
            .collect()
    }
}
