//! Execution node domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used for the controller's own scripting context
pub const CONTROLLER_LABEL: &str = "System";

/// An agent node registered with the build server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub display_name: String,
    pub offline: bool,
}

/// Destination of a script execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanoutTarget {
    /// The server's global scripting context
    Controller,
    /// A specific agent node, by name
    Node(String),
}

impl FanoutTarget {
    /// Display label; the controller is labelled `System`
    pub fn label(&self) -> &str {
        match self {
            FanoutTarget::Controller => CONTROLLER_LABEL,
            FanoutTarget::Node(name) => name,
        }
    }

    /// Node name to execute against, `None` for the controller
    pub fn node_name(&self) -> Option<&str> {
        match self {
            FanoutTarget::Controller => None,
            FanoutTarget::Node(name) => Some(name),
        }
    }
}

impl From<&Node> for FanoutTarget {
    fn from(node: &Node) -> Self {
        FanoutTarget::Node(node.display_name.clone())
    }
}

impl fmt::Display for FanoutTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of one target in a fan-out batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutResult {
    pub target: FanoutTarget,
    /// Script output, or the error text if the request failed
    pub output: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_labels() {
        assert_eq!(FanoutTarget::Controller.label(), "System");
        assert_eq!(FanoutTarget::Controller.node_name(), None);

        let node = FanoutTarget::Node("agent-1".to_string());
        assert_eq!(node.label(), "agent-1");
        assert_eq!(node.node_name(), Some("agent-1"));
    }
}
