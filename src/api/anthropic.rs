use serde::{Deserialize, Serialize};

use super::RoleContent;

pub const API_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 4096;

#[derive(Serialize, Debug)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub stream: bool,
    pub messages: Vec<RoleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct TextDelta {
    pub text: Option<String>,
}

/// Only `content_block_delta` carries text; `message_start`, `ping`,
/// `content_block_stop` and friends collapse into `Other`.
#[derive(Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        #[serde(default)]
        delta: TextDelta,
    },
    #[serde(other)]
    Other,
}
