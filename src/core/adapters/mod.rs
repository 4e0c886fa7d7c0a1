//! Vendor protocol adapters.
//!
//! Each wire format gets a small module that knows two things: how to turn
//! the conversation into that vendor's streaming request, and how to pull
//! the text out of one `data:` payload. [`StreamAdapter`] dispatches between
//! them; the HTTP round trip and SSE decoding are shared.

mod anthropic;
mod cohere;
mod gemini;
mod openai;

use async_stream::try_stream;
use futures_util::Stream;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::core::config::data::{DEFAULT_OPENROUTER_REFERER, DEFAULT_OPENROUTER_TITLE};
use crate::core::config::{Config, OpenRouterSettings};
use crate::core::error::ChatError;
use crate::core::message::ChatMessage;
use crate::core::registry::WireFormat;
use crate::core::routing::Route;
use crate::core::sse::{decode_stream, Frame};

/// How the app identifies itself to aggregators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub referer: String,
    pub title: String,
}

impl Default for Attribution {
    fn default() -> Self {
        Self {
            referer: DEFAULT_OPENROUTER_REFERER.to_string(),
            title: DEFAULT_OPENROUTER_TITLE.to_string(),
        }
    }
}

impl From<&OpenRouterSettings> for Attribution {
    fn from(settings: &OpenRouterSettings) -> Self {
        Self {
            referer: settings.referer().to_string(),
            title: settings.title().to_string(),
        }
    }
}

/// Shared HTTP client plus the per-app settings every request needs.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    attribution: Attribution,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, attribution: Attribution) -> Self {
        Self { http, attribution }
    }

    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self::new(builder.build()?, Attribution::from(&config.openrouter)))
    }

    pub fn attribution(&self) -> &Attribution {
        &self.attribution
    }
}

/// Everything one streaming call needs.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub route: Route,
    pub api_key: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAdapter {
    OpenAiCompat,
    Anthropic,
    Gemini,
    Cohere,
}

/// A fully built request; kept separate from sending so tests can inspect it.
#[derive(Debug)]
pub(crate) struct PreparedRequest {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl PreparedRequest {
    fn new(url: String, body: &impl serde::Serialize) -> Result<Self, ChatError> {
        Ok(Self {
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: serde_json::to_vec(body)?,
        })
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn query(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    async fn send(self, http: &reqwest::Client) -> Result<reqwest::Response, ChatError> {
        debug!(url = %self.url, bytes = self.body.len(), "opening stream");

        let mut builder = http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(self.body);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            debug!(%status, "stream request rejected");
            return Err(ChatError::Http { status, body });
        }
        Ok(response)
    }
}

impl From<WireFormat> for StreamAdapter {
    fn from(format: WireFormat) -> Self {
        match format {
            WireFormat::OpenAi => StreamAdapter::OpenAiCompat,
            WireFormat::Anthropic => StreamAdapter::Anthropic,
            WireFormat::Gemini => StreamAdapter::Gemini,
            WireFormat::Cohere => StreamAdapter::Cohere,
        }
    }
}

impl StreamAdapter {
    pub fn for_route(route: &Route) -> Self {
        route.wire_format.into()
    }

    pub(crate) fn prepare(
        self,
        request: &StreamRequest,
        attribution: &Attribution,
    ) -> Result<PreparedRequest, ChatError> {
        match self {
            StreamAdapter::OpenAiCompat => openai::prepare(request, attribution),
            StreamAdapter::Anthropic => anthropic::prepare(request),
            StreamAdapter::Gemini => gemini::prepare(request),
            StreamAdapter::Cohere => cohere::prepare(request),
        }
    }

    pub fn extract(self, payload: &str) -> Frame {
        match self {
            StreamAdapter::OpenAiCompat => openai::extract(payload),
            StreamAdapter::Anthropic => anthropic::extract(payload),
            StreamAdapter::Gemini => gemini::extract(payload),
            StreamAdapter::Cohere => cohere::extract(payload),
        }
    }

    /// Issues one streaming request and yields its text fragments in order.
    ///
    /// The stream is finite and not restartable. It fails with
    /// [`ChatError::Http`] before yielding anything when the vendor rejects
    /// the request, and with [`ChatError::Transport`] if the body breaks off.
    /// Dropping it closes the connection.
    pub fn stream(
        self,
        client: &ChatClient,
        request: StreamRequest,
    ) -> impl Stream<Item = Result<String, ChatError>> {
        let http = client.http.clone();
        let prepared = self.prepare(&request, &client.attribution);

        try_stream! {
            let response = prepared?.send(&http).await?;
            let fragments = decode_stream(response.bytes_stream(), move |payload| self.extract(payload));
            for await fragment in fragments {
                yield fragment?;
            }
        }
    }
}

/// Logs a frame that could not be understood and contributes nothing.
fn skip_malformed(adapter: &str, payload: &str, err: impl std::fmt::Display) -> Frame {
    debug!("skipping malformed {adapter} frame ({err}): {payload}");
    Frame::Skip
}
