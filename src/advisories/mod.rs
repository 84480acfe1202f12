// One module per advisory page. Each declares its form, its wire shapes and how a reply is shown.

pub mod crop;
pub mod disease;
pub mod fertilizer;
pub mod irrigation;
pub mod rotation;
pub mod yield_prediction;

pub use crop::CropAdvisory;
pub use disease::DiseaseAdvisory;
pub use fertilizer::FertilizerAdvisory;
pub use irrigation::IrrigationAdvisory;
pub use rotation::RotationAdvisory;
pub use yield_prediction::YieldAdvisory;
