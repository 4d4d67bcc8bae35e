pub mod interpolation;
pub mod store;
pub mod transformer;
