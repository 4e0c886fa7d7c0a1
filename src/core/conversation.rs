//! One chat thread and the send loop that drives it.
//!
//! A send appends the user turn and an empty assistant placeholder, opens
//! the adapter stream, then multiplexes three things on a single task:
//! cancellation, the next fragment, and the reveal tick. When the loop ends
//! the placeholder is finalized with everything received (not just what was
//! revealed) or removed if nothing arrived, and the new turns are persisted.

use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::adapters::{ChatClient, StreamAdapter, StreamRequest};
use crate::core::config::RenderSettings;
use crate::core::error::ChatError;
use crate::core::message::{ChatMessage, Role};
use crate::core::providers::ProviderConfig;
use crate::core::render::{RenderScheduler, RenderSink};
use crate::core::routing::{resolve, Route};
use crate::core::store::ChatStore;

const TITLE_MAX_CHARS: usize = 48;
const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug)]
pub enum TurnOutcome {
    Completed,
    /// Stopped by the user; whatever arrived was kept.
    Cancelled,
    /// The request or stream failed; partial text, if any, was kept.
    Failed(ChatError),
}

impl TurnOutcome {
    pub fn error(&self) -> Option<&ChatError> {
        match self {
            TurnOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

enum StreamEnd {
    Settled,
    Cancelled,
    Failed(ChatError),
}

/// Derives a chat title from the opening message.
pub fn chat_title(first_message: &str) -> String {
    let line = first_message.trim().lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    line.chars().take(TITLE_MAX_CHARS).collect()
}

pub struct Conversation {
    provider: ProviderConfig,
    route: Route,
    client: ChatClient,
    messages: Vec<ChatMessage>,
    tick_interval: Duration,
    wait_for_reveal: bool,
    store: Option<Arc<dyn ChatStore>>,
    chat_id: Option<String>,
    /// Messages before this index are already in the store.
    persisted: usize,
}

impl Conversation {
    /// Starts an empty conversation with a snapshot of `provider`.
    pub fn new(provider: ProviderConfig, client: ChatClient) -> Result<Self, ChatError> {
        let route = resolve(&provider)?;
        let render = RenderSettings::default();
        Ok(Self {
            provider,
            route,
            client,
            messages: Vec::new(),
            tick_interval: render.tick_interval(),
            wait_for_reveal: render.wait_for_reveal(),
            store: None,
            chat_id: None,
            persisted: 0,
        })
    }

    /// Reopens a stored chat so new turns are appended to it.
    pub async fn resume(
        provider: ProviderConfig,
        client: ChatClient,
        store: Arc<dyn ChatStore>,
        chat_id: &str,
    ) -> Result<Self, ChatError> {
        let session = store.get_chat(chat_id).await?;
        let messages = store.list_messages(&session.id).await?;
        let mut conversation = Self::new(provider, client)?.with_store(store);
        conversation.persisted = messages.len();
        conversation.messages = messages;
        conversation.chat_id = Some(session.id);
        Ok(conversation)
    }

    /// Points later sends at `provider`. History and the stored chat carry over.
    pub fn set_provider(&mut self, provider: ProviderConfig) -> Result<(), ChatError> {
        self.route = resolve(&provider)?;
        debug!(
            family = %self.route.family_id,
            source = %self.route.source,
            model = %self.route.model_id,
            "switched provider"
        );
        self.provider = provider;
        Ok(())
    }

    pub fn with_store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_render_settings(mut self, render: &RenderSettings) -> Self {
        self.tick_interval = render.tick_interval();
        self.wait_for_reveal = render.wait_for_reveal();
        self
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Sends `user_text` and streams the reply into `sink`.
    ///
    /// Cancelling `cancel` stops the turn at the next await point; the reply
    /// keeps every character received so far.
    pub async fn send<S>(
        &mut self,
        user_text: &str,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> TurnOutcome
    where
        S: RenderSink + ?Sized,
    {
        self.messages.push(ChatMessage::user(user_text));
        let request = StreamRequest {
            route: self.route.clone(),
            api_key: self.provider.api_key.clone(),
            messages: self.messages.clone(),
        };
        self.messages.push(ChatMessage::assistant(""));

        debug!(
            family = %self.route.family_id,
            source = %self.route.source,
            model = %self.route.model_id,
            turns = request.messages.len(),
            "sending turn"
        );

        let adapter = StreamAdapter::for_route(&self.route);
        let fragments = adapter.stream(&self.client, request);
        let mut scheduler = RenderScheduler::new(self.tick_interval);

        sink.thinking(true);
        let end = pump(fragments, &mut scheduler, sink, &cancel, self.wait_for_reveal).await;
        if scheduler.state().is_thinking() {
            sink.thinking(false);
        }

        let kept = self.finalize(scheduler.into_text());
        let outcome = match end {
            StreamEnd::Settled => TurnOutcome::Completed,
            StreamEnd::Cancelled => {
                info!("turn cancelled");
                TurnOutcome::Cancelled
            }
            StreamEnd::Failed(err) => {
                warn!("turn failed: {err}");
                TurnOutcome::Failed(err)
            }
        };

        if kept {
            self.persist_pending().await;
        }
        outcome
    }

    /// Replaces the tail placeholder with `text`, or drops it when empty.
    /// Returns whether an assistant message was kept.
    fn finalize(&mut self, text: String) -> bool {
        let is_placeholder = self
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty());
        if !is_placeholder {
            return false;
        }

        if text.is_empty() {
            self.messages.pop();
            false
        } else if let Some(last) = self.messages.last_mut() {
            last.content = text;
            true
        } else {
            false
        }
    }

    async fn persist_pending(&mut self) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let chat_id = match &self.chat_id {
            Some(id) => id.clone(),
            None => {
                let first_user = self
                    .messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                match store.create_chat(&chat_title(first_user)).await {
                    Ok(session) => {
                        self.chat_id = Some(session.id.clone());
                        session.id
                    }
                    Err(err) => {
                        warn!("chat not saved: {err}");
                        return;
                    }
                }
            }
        };

        while self.persisted < self.messages.len() {
            let message = &self.messages[self.persisted];
            if let Err(err) = store.append_message(&chat_id, message).await {
                warn!("message not saved: {err}");
                return;
            }
            self.persisted += 1;
        }
    }
}

async fn pump<St, S>(
    fragments: St,
    scheduler: &mut RenderScheduler,
    sink: &mut S,
    cancel: &CancellationToken,
    wait_for_reveal: bool,
) -> StreamEnd
where
    St: Stream<Item = Result<String, ChatError>>,
    S: RenderSink + ?Sized,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut ticker = tokio::time::interval(scheduler.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if !scheduler.state().is_finished() {
                    return StreamEnd::Cancelled;
                }
                // Everything already arrived; stopping only skips the pacing.
                if let Some(rest) = scheduler.flush() {
                    sink.reveal(rest);
                }
                return StreamEnd::Settled;
            }

            next = fragments.next(), if !scheduler.state().is_finished() => match next {
                Some(Ok(fragment)) => {
                    let was_thinking = scheduler.state().is_thinking();
                    scheduler.push(&fragment);
                    if was_thinking && !scheduler.state().is_thinking() {
                        sink.thinking(false);
                    }
                }
                Some(Err(err)) => {
                    scheduler.finish();
                    if let Some(rest) = scheduler.flush() {
                        sink.reveal(rest);
                    }
                    return StreamEnd::Failed(err);
                }
                None => scheduler.finish(),
            },

            _ = ticker.tick() => {
                if let Some(slice) = scheduler.tick() {
                    sink.reveal(slice);
                }
            }
        }

        if scheduler.state().is_finished() && !wait_for_reveal {
            if let Some(rest) = scheduler.flush() {
                sink.reveal(rest);
            }
        }
        if scheduler.is_settled() {
            return StreamEnd::Settled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::SourceKind;
    use crate::core::store::{MemoryChatStore, StoreError};
    use crate::utils::test_utils::{test_client, MockResponse, MockServer};

    #[derive(Default)]
    struct RecordingSink {
        revealed: String,
        reveals: usize,
        thinking: Vec<bool>,
        cancel_on_first_reveal: Option<CancellationToken>,
    }

    impl RenderSink for RecordingSink {
        fn reveal(&mut self, text: &str) {
            self.revealed.push_str(text);
            self.reveals += 1;
            if let Some(token) = &self.cancel_on_first_reveal {
                token.cancel();
            }
        }

        fn thinking(&mut self, active: bool) {
            self.thinking.push(active);
        }
    }

    fn provider() -> ProviderConfig {
        ProviderConfig {
            id: "p1".into(),
            family: "openai".into(),
            source: SourceKind::Official,
            label: "Test".into(),
            api_key: "sk-test".into(),
            model: "gpt-4o-mini".into(),
        }
    }

    fn conversation_against(server: &MockServer) -> Conversation {
        let mut conversation = Conversation::new(provider(), test_client())
            .expect("catalog route")
            .with_render_settings(&RenderSettings {
                tick_ms: Some(1),
                wait_for_reveal: Some(true),
            });
        conversation.route.endpoint = server.base_url().to_string();
        conversation
    }

    fn openai_frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    #[tokio::test]
    async fn completed_turn_reveals_everything_and_persists() {
        let server = MockServer::start(MockResponse::sse(&[
            openai_frame("Hi"),
            openai_frame(" there"),
            "data: [DONE]\n\n".to_string(),
        ]))
        .await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&server).with_store(store.clone());
        let mut sink = RecordingSink::default();

        let outcome = conversation
            .send("  Say hello\nplease ", &mut sink, CancellationToken::new())
            .await;

        assert!(matches!(outcome, TurnOutcome::Completed), "{outcome:?}");
        assert_eq!(sink.revealed, "Hi there");
        assert_eq!(sink.thinking, vec![true, false]);
        assert_eq!(
            conversation.messages(),
            &[
                ChatMessage::user("  Say hello\nplease "),
                ChatMessage::assistant("Hi there")
            ]
        );

        let chats = store.list_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].title, "Say hello");
        assert_eq!(conversation.chat_id(), Some(chats[0].id.as_str()));
        assert_eq!(
            store.list_messages(&chats[0].id).await.unwrap(),
            conversation.messages()
        );

        let sent = server.requests().await;
        assert_eq!(sent[0].json()["model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn second_turn_sends_history_and_reuses_the_chat() {
        let server = MockServer::start(MockResponse::sse(&[openai_frame("ok")])).await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&server).with_store(store.clone());
        let mut sink = RecordingSink::default();

        conversation.send("one", &mut sink, CancellationToken::new()).await;
        conversation.send("two", &mut sink, CancellationToken::new()).await;

        let requests = server.requests().await;
        assert_eq!(requests.len(), 2);
        let roles: Vec<String> = requests[1].json()["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);

        let chats = store.list_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(store.list_messages(&chats[0].id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn cancel_keeps_accumulated_not_revealed_text() {
        let server = MockServer::start(
            MockResponse::sse(&[format!(
                "{}{}{}",
                openai_frame("A"),
                openai_frame("B"),
                openai_frame("C")
            )])
            .hold_open(),
        )
        .await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&server)
            .with_store(store.clone())
            .with_render_settings(&RenderSettings {
                tick_ms: Some(200),
                wait_for_reveal: Some(true),
            });

        let cancel = CancellationToken::new();
        let mut sink = RecordingSink {
            cancel_on_first_reveal: Some(cancel.clone()),
            ..Default::default()
        };

        let outcome = conversation.send("go", &mut sink, cancel).await;

        assert!(matches!(outcome, TurnOutcome::Cancelled), "{outcome:?}");
        assert_eq!(sink.revealed, "A");
        assert_eq!(sink.reveals, 1);
        assert_eq!(conversation.messages().last(), Some(&ChatMessage::assistant("ABC")));

        let chats = store.list_chats().await.unwrap();
        let saved = store.list_messages(&chats[0].id).await.unwrap();
        assert_eq!(saved, vec![ChatMessage::user("go"), ChatMessage::assistant("ABC")]);
    }

    #[tokio::test]
    async fn cancel_after_the_stream_ended_completes_the_reveal() {
        let long = "y".repeat(300);
        let server = MockServer::start(MockResponse::sse(&[
            openai_frame(&long),
            "data: [DONE]\n\n".to_string(),
        ]))
        .await;
        let mut conversation = conversation_against(&server).with_render_settings(&RenderSettings {
            tick_ms: Some(200),
            wait_for_reveal: Some(true),
        });
        let cancel = CancellationToken::new();
        let mut sink = RecordingSink {
            cancel_on_first_reveal: Some(cancel.clone()),
            ..Default::default()
        };

        let outcome = conversation.send("long", &mut sink, cancel).await;

        assert!(matches!(outcome, TurnOutcome::Completed), "{outcome:?}");
        assert_eq!(sink.revealed, long);
        assert_eq!(sink.reveals, 2);
        assert_eq!(conversation.messages().last(), Some(&ChatMessage::assistant(long)));
    }

    #[tokio::test]
    async fn switching_provider_keeps_history_and_chat() {
        let first = MockServer::start(MockResponse::sse(&[openai_frame("one back")])).await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&first).with_store(store.clone());
        conversation
            .send("one", &mut RecordingSink::default(), CancellationToken::new())
            .await;
        let chat_id = conversation.chat_id().map(str::to_owned);

        let second = MockServer::start(MockResponse::sse(&[openai_frame("two back")])).await;
        let switched = ProviderConfig {
            id: "p2".into(),
            model: "gpt-4o".into(),
            api_key: "sk-other".into(),
            ..provider()
        };
        conversation.set_provider(switched).unwrap();
        assert_eq!(conversation.provider().id, "p2");
        assert_eq!(conversation.route().model_id, "gpt-4o");
        conversation.route.endpoint = second.base_url().to_string();

        let outcome = conversation
            .send("two", &mut RecordingSink::default(), CancellationToken::new())
            .await;
        assert!(matches!(outcome, TurnOutcome::Completed), "{outcome:?}");

        assert_eq!(first.requests().await.len(), 1);
        let sent = second.requests().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("authorization"), Some("Bearer sk-other"));
        let body = sent[0].json();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][1]["content"], "one back");

        assert_eq!(conversation.chat_id().map(str::to_owned), chat_id);
        let chats = store.list_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(store.list_messages(&chats[0].id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn cancel_before_any_text_removes_placeholder() {
        let server = MockServer::start(MockResponse::sse::<&str>(&[]).hold_open()).await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&server).with_store(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = conversation
            .send("hello?", &mut RecordingSink::default(), cancel)
            .await;

        assert!(matches!(outcome, TurnOutcome::Cancelled));
        assert_eq!(conversation.messages(), &[ChatMessage::user("hello?")]);
        assert!(store.list_chats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_error_fails_without_assistant_message() {
        let server = MockServer::start(MockResponse::error(
            500,
            r#"{"error":{"message":"upstream exploded"}}"#,
        ))
        .await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&server).with_store(store.clone());
        let mut sink = RecordingSink::default();

        let outcome = conversation
            .send("hi", &mut sink, CancellationToken::new())
            .await;

        let err = outcome.error().expect("turn should fail");
        assert!(err.to_string().contains("500"), "{err}");
        assert!(err.to_string().contains("upstream exploded"), "{err}");
        assert_eq!(conversation.messages(), &[ChatMessage::user("hi")]);
        assert!(sink.revealed.is_empty());
        assert_eq!(sink.thinking, vec![true, false]);
        assert!(store.list_chats().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn broken_body_keeps_partial_text() {
        let server =
            MockServer::start(MockResponse::sse(&[openai_frame("partial")]).truncated()).await;
        let mut conversation = conversation_against(&server);
        let mut sink = RecordingSink::default();

        let outcome = conversation
            .send("hi", &mut sink, CancellationToken::new())
            .await;

        assert!(matches!(outcome, TurnOutcome::Failed(ChatError::Transport(_))), "{outcome:?}");
        assert_eq!(sink.revealed, "partial");
        assert_eq!(
            conversation.messages().last(),
            Some(&ChatMessage::assistant("partial"))
        );
    }

    #[tokio::test]
    async fn without_wait_for_reveal_the_rest_is_flushed_at_once() {
        let long = "x".repeat(500);
        let server = MockServer::start(MockResponse::sse(&[openai_frame(&long)])).await;
        let mut conversation = conversation_against(&server).with_render_settings(&RenderSettings {
            tick_ms: Some(10_000),
            wait_for_reveal: Some(false),
        });
        let mut sink = RecordingSink::default();

        let outcome = conversation
            .send("long please", &mut sink, CancellationToken::new())
            .await;

        assert!(matches!(outcome, TurnOutcome::Completed));
        assert_eq!(sink.revealed, long);
    }

    #[tokio::test]
    async fn failed_turn_is_saved_with_the_next_reply() {
        let server = MockServer::start(MockResponse::error(503, "busy")).await;
        let store = Arc::new(MemoryChatStore::new());
        let mut conversation = conversation_against(&server).with_store(store.clone());

        conversation
            .send("first", &mut RecordingSink::default(), CancellationToken::new())
            .await;
        drop(server);

        let server = MockServer::start(MockResponse::sse(&[openai_frame("ok")])).await;
        conversation.route.endpoint = server.base_url().to_string();
        conversation
            .send("second", &mut RecordingSink::default(), CancellationToken::new())
            .await;

        let chats = store.list_chats().await.unwrap();
        assert_eq!(chats[0].title, "first");
        assert_eq!(
            store.list_messages(&chats[0].id).await.unwrap(),
            vec![
                ChatMessage::user("first"),
                ChatMessage::user("second"),
                ChatMessage::assistant("ok")
            ]
        );
    }

    #[tokio::test]
    async fn resume_continues_a_stored_chat() {
        let store: Arc<MemoryChatStore> = Arc::new(MemoryChatStore::new());
        let chat = store.create_chat("Earlier").await.unwrap();
        store
            .append_message(&chat.id, &ChatMessage::user("remember 7"))
            .await
            .unwrap();
        store
            .append_message(&chat.id, &ChatMessage::assistant("noted"))
            .await
            .unwrap();

        let server = MockServer::start(MockResponse::sse(&[openai_frame("7")])).await;
        let mut conversation =
            Conversation::resume(provider(), test_client(), store.clone(), &chat.id)
                .await
                .unwrap();
        conversation.route.endpoint = server.base_url().to_string();
        assert_eq!(conversation.messages().len(), 2);

        conversation
            .send("what was it?", &mut RecordingSink::default(), CancellationToken::new())
            .await;

        assert_eq!(store.list_chats().await.unwrap().len(), 1);
        assert_eq!(store.list_messages(&chat.id).await.unwrap().len(), 4);
        let sent = server.requests().await;
        assert_eq!(sent[0].json()["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn resume_of_unknown_chat_fails() {
        let store = Arc::new(MemoryChatStore::new());
        let result = Conversation::resume(provider(), test_client(), store, "missing").await;
        assert!(matches!(
            result,
            Err(ChatError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn titles_use_first_line_trimmed_and_capped() {
        assert_eq!(chat_title("  hello world  "), "hello world");
        assert_eq!(chat_title("line one\nline two"), "line one");
        assert_eq!(chat_title(&"é".repeat(60)).chars().count(), 48);
        assert_eq!(chat_title("   \n  "), "New Chat");
    }
}
