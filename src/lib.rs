// Public API for integration tests and the player client

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod countdown;
pub mod error;
pub mod protocol;
pub mod scenarios;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
