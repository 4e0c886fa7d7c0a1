use crate::api::anthropic::{MessagesRequest, StreamEvent, API_VERSION, MAX_TOKENS};
use crate::api::RoleContent;
use crate::core::error::ChatError;
use crate::core::message::split_system;
use crate::core::sse::Frame;
use crate::utils::url::construct_api_url;

use super::{skip_malformed, PreparedRequest, StreamRequest};

pub(super) fn prepare(request: &StreamRequest) -> Result<PreparedRequest, ChatError> {
    let (system, turns) = split_system(&request.messages);
    let body = MessagesRequest {
        model: request.route.model_id.clone(),
        max_tokens: MAX_TOKENS,
        stream: true,
        messages: turns
            .into_iter()
            .map(|m| RoleContent {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect(),
        system: system.map(str::to_owned),
    };

    let url = construct_api_url(&request.route.endpoint, "v1/messages");
    Ok(PreparedRequest::new(url, &body)?
        .header("x-api-key", request.api_key.as_str())
        .header("anthropic-version", API_VERSION))
}

pub(super) fn extract(payload: &str) -> Frame {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(StreamEvent::ContentBlockDelta { delta }) => {
            delta.text.map(Frame::Text).unwrap_or(Frame::Skip)
        }
        Ok(StreamEvent::Other) => Frame::Skip,
        Err(err) => skip_malformed("anthropic", payload, err),
    }
}
