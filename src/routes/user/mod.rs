mod handler;
pub(crate) mod model;

pub use handler::{get_user, update_user, upsert_user};
