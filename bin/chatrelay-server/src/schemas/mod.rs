//! Wire DTOs for the HTTP API.

pub mod account;
pub mod chat;
pub mod history;
