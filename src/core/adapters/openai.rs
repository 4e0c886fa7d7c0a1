use crate::api::openai::{ChatRequest, ChatResponse};
use crate::api::RoleContent;
use crate::core::error::ChatError;
use crate::core::sse::Frame;
use crate::utils::url::construct_api_url;

use super::{skip_malformed, Attribution, PreparedRequest, StreamRequest};

const DONE_SENTINEL: &str = "[DONE]";

pub(super) fn prepare(
    request: &StreamRequest,
    attribution: &Attribution,
) -> Result<PreparedRequest, ChatError> {
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

    let url = construct_api_url(&request.route.endpoint, "v1/chat/completions");
    let mut prepared = PreparedRequest::new(url, &body)?
        .header("Authorization", format!("Bearer {}", request.api_key));

    if request.route.source.is_aggregator() {
        prepared = prepared
            .header("HTTP-Referer", attribution.referer.as_str())
            .header("X-Title", attribution.title.as_str());
    }
    Ok(prepared)
}

pub(super) fn extract(payload: &str) -> Frame {
    if payload == DONE_SENTINEL {
        return Frame::Done;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map(Frame::Text)
            .unwrap_or(Frame::Skip),
        Err(err) => skip_malformed("openai", payload, err),
    }
}
