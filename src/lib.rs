pub mod core;
pub mod slam;
pub mod trajectory;

pub mod prelude;
