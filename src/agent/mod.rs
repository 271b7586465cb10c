//! Agent personas.
//!
//! Every invocation runs the agent CLI under one of six fixed personas. The
//! persona only changes the system prompt passed on the command line.

mod prompts;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use prompts::*;

/// The persona an invocation runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    #[default]
    Developer,
    ProductOwner,
    Tester,
    Security,
    Devops,
    Documentation,
}

impl AgentType {
    /// All agent types, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Developer,
        Self::ProductOwner,
        Self::Tester,
        Self::Security,
        Self::Devops,
        Self::Documentation,
    ];

    /// The system prompt for this persona.
    #[must_use]
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Developer => DEVELOPER_PROMPT,
            Self::ProductOwner => PRODUCT_OWNER_PROMPT,
            Self::Tester => TESTER_PROMPT,
            Self::Security => SECURITY_PROMPT,
            Self::Devops => DEVOPS_PROMPT,
            Self::Documentation => DOCUMENTATION_PROMPT,
        }
    }

    /// Wire name of this persona (`product-owner`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::ProductOwner => "product-owner",
            Self::Tester => "tester",
            Self::Security => "security",
            Self::Devops => "devops",
            Self::Documentation => "documentation",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown agent type.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown agent type: {0}")]
pub struct UnknownAgentType(pub String);

impl FromStr for AgentType {
    type Err = UnknownAgentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|agent| agent.as_str() == s)
            .ok_or_else(|| UnknownAgentType(s.to_string()))
    }
}
