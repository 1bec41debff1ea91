// enforcement.rs — What to do when policy denies a request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InterceptorError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Refuse the request before it is sent.
    Block,
    /// Print a warning to stderr, then send.
    Warn,
    /// Record the violation silently, then send.
    #[default]
    Log,
}

impl EnforcementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementMode::Block => "block",
            EnforcementMode::Warn => "warn",
            EnforcementMode::Log => "log",
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnforcementMode {
    type Err = InterceptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(EnforcementMode::Block),
            "warn" => Ok(EnforcementMode::Warn),
            "log" => Ok(EnforcementMode::Log),
            _ => Err(InterceptorError::InvalidEnforcement(s.to_string())),
        }
    }
}
