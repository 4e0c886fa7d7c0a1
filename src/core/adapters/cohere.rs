use crate::api::cohere::{ChatRequest, StreamEvent};
use crate::api::RoleContent;
use crate::core::error::ChatError;
use crate::core::sse::Frame;
use crate::utils::url::construct_api_url;

use super::{skip_malformed, PreparedRequest, StreamRequest};

pub(super) fn prepare(request: &StreamRequest) -> Result<PreparedRequest, ChatError> {
    let body = ChatRequest {
        model: request.route.model_id.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| RoleContent {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect(),
        stream: true,
    };

    let url = construct_api_url(&request.route.endpoint, "v2/chat");
    Ok(PreparedRequest::new(url, &body)?
        .header("Authorization", format!("Bearer {}", request.api_key)))
}

pub(super) fn extract(payload: &str) -> Frame {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(StreamEvent::ContentDelta { delta }) => delta
            .message
            .and_then(|message| message.content)
            .and_then(|content| content.text)
            .map(Frame::Text)
            .unwrap_or(Frame::Skip),
        Ok(StreamEvent::Other) => Frame::Skip,
        Err(err) => skip_malformed("cohere", payload, err),
    }
}
