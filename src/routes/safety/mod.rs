mod handler;
pub(crate) mod model;

pub use handler::{add_contact, create_alert, delete_contact, list_contacts, sos};
