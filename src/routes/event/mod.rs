mod handler;
pub(crate) mod model;

pub use handler::{
    accept_request, close_event, create_event, delete_event, join_event, leave_event, list_events,
    list_requests, reject_request,
};
