//! Execution environments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Where a scenario runs. Hosted environments scrape status markers from
/// the output stream instead of rendering the terminal UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    #[default]
    Local,
    Ci,
    GithubActions,
    /// One-click deployment
    Ocd,
    /// Cloud portal
    Azure,
}

impl Environment {
    pub const ALL: [Self; 5] = [Self::Local, Self::Ci, Self::GithubActions, Self::Ocd, Self::Azure];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ci => "ci",
            Self::GithubActions => "github-actions",
            Self::Ocd => "ocd",
            Self::Azure => "azure",
        }
    }

    pub fn is_hosted(self) -> bool {
        matches!(self, Self::Ocd | Self::Azure)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| EngineError::InvalidEnvironment(s.to_string()))
    }
}
