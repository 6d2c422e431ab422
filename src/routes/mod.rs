pub mod auth;
pub mod chat;
pub mod direct;
pub mod event;
pub mod pin;
pub mod quest;
pub mod safety;
pub mod user;
