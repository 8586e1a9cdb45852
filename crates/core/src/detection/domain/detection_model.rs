use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::shared::error::CensorError;

/// Accuracy/speed trade-off requested from the face detector.
///
/// `Hog` favours speed, `Cnn` favours recall.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionModel {
    #[default]
    Hog,
    Cnn,
}

impl DetectionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionModel::Hog => "hog",
            DetectionModel::Cnn => "cnn",
        }
    }
}

impl fmt::Display for DetectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionModel {
    type Err = CensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hog" => Ok(DetectionModel::Hog),
            "cnn" => Ok(DetectionModel::Cnn),
            other => Err(CensorError::invalid(format!(
                "model must be 'hog' or 'cnn', got '{other}'"
            ))),
        }
    }
}
