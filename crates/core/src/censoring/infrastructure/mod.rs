pub mod censor_factory;
mod gaussian;
pub mod gaussian_censor;
pub mod mask_censor;
pub mod pixelation_censor;
