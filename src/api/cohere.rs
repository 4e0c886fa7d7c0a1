use serde::{Deserialize, Serialize};

use super::RoleContent;

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<RoleContent>,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct DeltaText {
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct DeltaMessage {
    pub content: Option<DeltaText>,
}

#[derive(Deserialize)]
pub struct Delta {
    pub message: Option<DeltaMessage>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "content-delta")]
    ContentDelta { delta: Delta },
    #[serde(other)]
    Other,
}
