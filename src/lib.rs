//! Supercharge is a terminal chat client that streams replies from several
//! LLM vendors through one interface.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the model family catalog, provider configs, routing,
//!   the per-vendor stream adapters, the render scheduler and chat storage.
//! - [`api`] defines the request and response payloads for each wire format.
//! - [`cli`] parses arguments and drives conversations from the terminal.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
