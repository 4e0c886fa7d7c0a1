//! Request bodies and stream frames for each vendor wire format.
//!
//! Frame types only declare the fields text extraction needs; everything
//! else a vendor sends is ignored during deserialization.

pub mod anthropic;
pub mod cohere;
pub mod gemini;
pub mod openai;

use serde::Serialize;

/// A `{role, content}` turn, the shape shared by the OpenAI-compatible,
/// Anthropic and Cohere request bodies.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RoleContent {
    pub role: String,
    pub content: String,
}
