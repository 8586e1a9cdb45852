use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::shared::error::CensorError;

/// Visual transform applied to a censored face region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CensorType {
    #[default]
    GaussianBlur,
    Pixelation,
    FaceMasking,
}

impl CensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CensorType::GaussianBlur => "gaussianblur",
            CensorType::Pixelation => "pixelation",
            CensorType::FaceMasking => "facemasking",
        }
    }
}

impl fmt::Display for CensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CensorType {
    type Err = CensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gaussianblur" => Ok(CensorType::GaussianBlur),
            "pixelation" => Ok(CensorType::Pixelation),
            "facemasking" => Ok(CensorType::FaceMasking),
            other => Err(CensorError::invalid(format!(
                "unknown censor type '{other}' (expected gaussianblur, pixelation or facemasking)"
            ))),
        }
    }
}
