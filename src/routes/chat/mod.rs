mod handler;
pub(crate) mod model;

pub use handler::{chat_details, chats_for_user, get_chat_for_event, get_messages, send_message};
