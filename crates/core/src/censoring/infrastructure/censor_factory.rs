use crate::censoring::domain::censor_type::CensorType;
use crate::censoring::domain::frame_censor::FrameCensor;

use super::gaussian_censor::GaussianCensor;
use super::mask_censor::MaskCensor;
use super::pixelation_censor::PixelationCensor;

/// Creates the censor for the requested strategy.
pub fn create_censor(censor_type: CensorType) -> Box<dyn FrameCensor> {
    log::info!("Using {censor_type} censor");
    match censor_type {
        CensorType::GaussianBlur => Box::new(GaussianCensor::new()),
        CensorType::Pixelation => Box::new(PixelationCensor::default()),
        CensorType::FaceMasking => Box::new(MaskCensor::default()),
    }
}
