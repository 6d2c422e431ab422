mod handler;
pub(crate) mod model;

pub use handler::{chats_for_user, create_direct_chat, get_messages, send_message};
