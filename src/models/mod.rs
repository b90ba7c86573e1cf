pub mod api;
pub mod chat;
pub mod profile;
pub mod websocket;
