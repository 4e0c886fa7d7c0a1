pub mod adapters;
pub mod config;
pub mod conversation;
pub mod error;
pub mod message;
pub mod providers;
pub mod registry;
pub mod render;
pub mod routing;
pub mod sse;
pub mod store;
