use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::shared::error::CensorError;

/// Which detected faces get censored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CensorMode {
    /// Every detected face.
    #[default]
    All,
    /// Only faces matching a reference face.
    One,
    /// Every face except those matching a reference face.
    AllExcept,
}

impl CensorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CensorMode::All => "all",
            CensorMode::One => "one",
            CensorMode::AllExcept => "allexcept",
        }
    }

    /// Whether the mode needs reference faces (and per-face encodings).
    pub fn needs_references(&self) -> bool {
        !matches!(self, CensorMode::All)
    }
}

impl fmt::Display for CensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CensorMode {
    type Err = CensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(CensorMode::All),
            "one" => Ok(CensorMode::One),
            "allexcept" => Ok(CensorMode::AllExcept),
            other => Err(CensorError::invalid(format!(
                "mode must be 'all', 'one' or 'allexcept', got '{other}'"
            ))),
        }
    }
}
