use std::path::PathBuf;

use crate::censoring::domain::censor_type::CensorType;
use crate::pipeline::censor_video_use_case::CensorSettings;
use crate::shared::error::CensorError;

/// Everything needed to run one censoring job.
#[derive(Clone, Debug, PartialEq)]
pub struct JobRequest {
    pub input: PathBuf,
    pub censor_type: CensorType,
    pub settings: CensorSettings,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>, censor_type: CensorType, settings: CensorSettings) -> Self {
        Self {
            input: input.into(),
            censor_type,
            settings,
        }
    }

    /// Builds a request from the raw values a boundary layer receives
    /// (form fields, CLI flags), rejecting unknown enum values and invalid
    /// mode/reference combinations.
    pub fn parse(
        input: impl Into<PathBuf>,
        mode: &str,
        model: &str,
        censor_type: &str,
        upsample: u32,
        references: Vec<PathBuf>,
    ) -> Result<Self, CensorError> {
        let request = Self::new(
            input,
            censor_type.parse()?,
            CensorSettings {
                mode: mode.parse()?,
                model: model.parse()?,
                upsample,
                references,
            },
        );
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), CensorError> {
        if self.input.as_os_str().is_empty() {
            return Err(CensorError::invalid("input video path is empty"));
        }
        self.settings.validate()
    }

    /// Files the job consumes: the input video then every reference image.
    pub fn input_files(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.input).chain(self.settings.references.iter())
    }
}
