use crate::api::gemini::{
    Content, GenerateContentRequest, GenerateContentResponse, Part, SystemInstruction,
};
use crate::core::error::ChatError;
use crate::core::message::{split_system, Role};
use crate::core::sse::Frame;
use crate::utils::url::construct_api_url;

use super::{skip_malformed, PreparedRequest, StreamRequest};

/// Gemini only knows `user` and `model` turns.
fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        _ => "user",
    }
}

pub(super) fn prepare(request: &StreamRequest) -> Result<PreparedRequest, ChatError> {
    let (system, turns) = split_system(&request.messages);
    let body = GenerateContentRequest {
        contents: turns
            .into_iter()
            .map(|m| Content {
                role: gemini_role(m.role),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect(),
        system_instruction: system.map(|text| SystemInstruction {
            parts: vec![Part {
                text: text.to_string(),
            }],
        }),
    };

    let path = format!(
        "v1beta/models/{}:streamGenerateContent",
        request.route.model_id
    );
    let url = construct_api_url(&request.route.endpoint, &path);
    Ok(PreparedRequest::new(url, &body)?
        .query("alt", "sse")
        .query("key", request.api_key.as_str()))
}

pub(super) fn extract(payload: &str) -> Frame {
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(response) => response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .map(Frame::Text)
            .unwrap_or(Frame::Skip),
        Err(err) => skip_malformed("gemini", payload, err),
    }
}
