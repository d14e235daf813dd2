//! ML model inference components

pub mod classifier;
pub mod comparison;
pub mod inference;
pub mod loader;

pub use classifier::Classifier;
pub use comparison::ModelComparison;
pub use inference::StrokePredictor;
pub use loader::ModelLoader;
