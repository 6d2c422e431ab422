mod handler;
pub(crate) mod model;

pub use handler::{create_pin, list_pins};
