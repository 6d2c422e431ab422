mod handler;
pub(crate) mod model;

pub use handler::{get_session, login, logout, send_otp, verify_otp};
