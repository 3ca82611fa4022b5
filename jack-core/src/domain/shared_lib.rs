//! Shared library documentation types

use serde::{Deserialize, Serialize};

/// A global variable or step documented by the server's pipeline syntax page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedLibVar {
    pub name: String,
    /// Plain-text description
    pub description: String,
    /// HTML description, titled with the variable name
    pub description_html: String,
}
