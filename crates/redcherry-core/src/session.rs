//! One chat turn at a time against an injected inference client.
//!
//! A turn is split into three phases so event-loop front ends never hold the
//! session across the network call:
//!
//! 1. [`ChatSession::begin_send`] checks the guards, appends the user message,
//!    raises the loading flag and captures the outbound request.
//! 2. [`PendingTurn::dispatch`] performs the call and yields a [`SettledTurn`].
//! 3. [`ChatSession::complete`] appends the reply (or a fallback) and lowers
//!    the loading flag.
//!
//! [`ChatSession::send`] chains all three for callers that can simply await.
//!
//! Every turn carries a [`TurnId`]. `complete` only accepts the settled turn
//! the session is waiting for, and [`ChatSession::cancel_in_flight`] closes a
//! turn whose dispatch was dropped or died, so the loading flag always comes
//! back down and each accepted send adds exactly two messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::{
    ChatCompletionRequest, ChatCompletionResponse, InferenceClient, InferenceError, WireMessage,
    WireRole,
};
use crate::format::trim_text;
use crate::message::Message;
use crate::provider::ProviderConfig;
use crate::store::{ConversationStore, StoreEvent};

pub const EMPTY_REPLY_FALLBACK: &str = "I apologize, but I'm having trouble processing your request right now. Please try again later.";

pub const RATE_LIMITED_FALLBACK: &str = "I apologize, but our AI service is currently experiencing high demand. Please try again in a few moments or contact our team directly for immediate assistance.";

pub const UNAUTHORIZED_FALLBACK: &str = "I apologize, but there seems to be an authentication issue with our AI service. Our team has been notified and will resolve this shortly.";

pub const CONNECTION_FALLBACK: &str = "I apologize, but I'm having trouble connecting right now. Please try again later or contact our team directly.";

/// How a failed call is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Unauthorized,
    Unknown,
}

impl FailureKind {
    pub fn classify(err: &InferenceError) -> Self {
        match err.status() {
            Some(429) => FailureKind::RateLimited,
            Some(401) => FailureKind::Unauthorized,
            _ => FailureKind::Unknown,
        }
    }

    pub fn fallback_text(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => RATE_LIMITED_FALLBACK,
            FailureKind::Unauthorized => UNAUTHORIZED_FALLBACK,
            FailureKind::Unknown => CONNECTION_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input or a turn already in flight; nothing changed.
    Rejected,
    Replied,
    Failed(FailureKind),
}

const ABANDONED_REASON: &str = "turn abandoned before a reply arrived";

// Process-wide so a settled turn can never match another session's turn.
static NEXT_TURN: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(u64);

impl TurnId {
    fn next() -> Self {
        TurnId(NEXT_TURN.fetch_add(1, Ordering::Relaxed))
    }
}

/// A turn whose request has been built but not yet sent.
///
/// Dropping it leaves the session loading until
/// [`ChatSession::cancel_in_flight`] is called.
#[derive(Debug)]
#[must_use = "the session stays loading until the turn is completed or cancelled"]
pub struct PendingTurn {
    id: TurnId,
    request: ChatCompletionRequest,
}

impl PendingTurn {
    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn request(&self) -> &ChatCompletionRequest {
        &self.request
    }

    pub async fn dispatch(self, client: Arc<dyn InferenceClient>) -> SettledTurn {
        SettledTurn {
            id: self.id,
            result: client.chat_completion(self.request).await,
        }
    }
}

/// The outcome of a dispatched turn, ready to be folded back into the log.
#[derive(Debug)]
pub struct SettledTurn {
    id: TurnId,
    result: Result<ChatCompletionResponse, InferenceError>,
}

impl SettledTurn {
    pub fn id(&self) -> TurnId {
        self.id
    }
}

/// Holds the session for the duration of `send`; if the future is dropped
/// mid-call the turn is cancelled instead of leaving the session loading.
struct InFlight<'a> {
    session: &'a mut ChatSession,
}

impl InFlight<'_> {
    fn finish(self, settled: SettledTurn) -> SendOutcome {
        self.session.complete(settled)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.cancel_in_flight();
    }
}

pub struct ChatSession {
    store: ConversationStore,
    client: Arc<dyn InferenceClient>,
    config: ProviderConfig,
    in_flight: Option<TurnId>,
}

impl ChatSession {
    pub fn new(client: Arc<dyn InferenceClient>, config: ProviderConfig) -> Self {
        info!(
            provider = config.provider.as_str(),
            model = %config.model,
            "chat session started"
        );
        Self {
            store: ConversationStore::new(),
            client,
            config,
            in_flight: None,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<dyn InferenceClient> {
        Arc::clone(&self.client)
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.store.subscribe(listener);
    }

    /// Run a whole turn. Failures are absorbed into a fallback message.
    pub async fn send(&mut self, raw_input: &str) -> SendOutcome {
        let Some(turn) = self.begin_send(raw_input) else {
            return SendOutcome::Rejected;
        };
        let client = self.client();
        let guard = InFlight { session: self };
        let settled = turn.dispatch(client).await;
        guard.finish(settled)
    }

    /// Returns `None` without touching any state when the input is blank or
    /// a turn is already in flight.
    pub fn begin_send(&mut self, raw_input: &str) -> Option<PendingTurn> {
        if trim_text(raw_input).is_empty() || self.in_flight.is_some() || self.store.is_loading()
        {
            return None;
        }

        self.store.append(Message::user(raw_input));
        self.store.set_loading(true);

        let id = TurnId::next();
        self.in_flight = Some(id);
        Some(PendingTurn {
            id,
            request: self.build_request(),
        })
    }

    /// System prompt followed by the log as it stands.
    ///
    /// The log is the only source for history: once `begin_send` has appended
    /// the new user message it is already the final entry, so nothing is
    /// pushed on top.
    pub fn build_request(&self) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(self.store.len() + 1);
        messages.push(WireMessage::new(
            WireRole::System,
            self.config.system_prompt.as_str(),
        ));
        messages.extend(
            self.store
                .messages()
                .iter()
                .map(|msg| WireMessage::new(msg.role.into(), msg.text.as_str())),
        );

        ChatCompletionRequest {
            provider: self.config.hint.clone(),
            model: self.config.model.clone(),
            messages,
        }
    }

    /// Fold a settled turn into the log.
    ///
    /// Turns this session is not waiting for (already cancelled, or begun on
    /// another session) are dropped and `Rejected` is returned.
    pub fn complete(&mut self, settled: SettledTurn) -> SendOutcome {
        if self.in_flight != Some(settled.id) {
            warn!(turn = ?settled.id, "ignoring settled turn that is not in flight");
            return SendOutcome::Rejected;
        }
        self.in_flight = None;
        self.settle(settled.result)
    }

    /// Close the in-flight turn without a reply, for dispatches that were
    /// dropped or whose task died. The user sees the connection fallback.
    pub fn cancel_in_flight(&mut self) -> SendOutcome {
        match self.in_flight.take() {
            Some(id) => {
                warn!(turn = ?id, "cancelling in-flight turn");
                self.settle(Err(InferenceError::Interrupted(ABANDONED_REASON.to_string())))
            }
            None => SendOutcome::Rejected,
        }
    }

    fn settle(&mut self, result: Result<ChatCompletionResponse, InferenceError>) -> SendOutcome {
        let result = result.and_then(|response| {
            if response.choices.is_empty() {
                Err(InferenceError::Decode("response carried no choices".to_string()))
            } else {
                Ok(response)
            }
        });
        let (text, outcome) = match result {
            Ok(response) => {
                let text = response.reply_text().unwrap_or(EMPTY_REPLY_FALLBACK);
                (text.to_string(), SendOutcome::Replied)
            }
            Err(err) => {
                let kind = FailureKind::classify(&err);
                warn!(error = %err, ?kind, "inference call failed");
                (kind.fallback_text().to_string(), SendOutcome::Failed(kind))
            }
        };

        self.store.append(Message::assistant(text));
        self.store.set_loading(false);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Role, GREETING};
    use crate::provider::Provider;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<ChatCompletionResponse, InferenceError>>>,
        requests: Mutex<Vec<ChatCompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<ChatCompletionResponse, InferenceError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        async fn chat_completion(
            &self,
            request: ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, InferenceError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(InferenceError::Decode("script exhausted".into())))
        }
    }

    struct StalledClient;

    #[async_trait]
    impl InferenceClient for StalledClient {
        async fn chat_completion(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, InferenceError> {
            std::future::pending().await
        }
    }

    fn reply(text: &str) -> Result<ChatCompletionResponse, InferenceError> {
        Ok(ChatCompletionResponse::with_content(Some(text)))
    }

    fn status(code: u16) -> Result<ChatCompletionResponse, InferenceError> {
        Err(InferenceError::Status {
            status: code,
            body: String::new(),
        })
    }

    fn session(client: Arc<ScriptedClient>) -> ChatSession {
        ChatSession::new(client, ProviderConfig::for_provider(Provider::HuggingFace, None))
    }

    #[tokio::test]
    async fn test_send_appends_user_and_reply() {
        let client = ScriptedClient::new(vec![reply("- Sure thing")]);
        let mut chat = session(client);

        assert_eq!(chat.send("Do you do kitchens?").await, SendOutcome::Replied);

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text, "Do you do kitchens?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].text, "- Sure thing");
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_blank_input_is_silent_noop() {
        let client = ScriptedClient::new(vec![]);
        let mut chat = session(client.clone());

        assert_eq!(chat.send("   \n\t").await, SendOutcome::Rejected);
        assert_eq!(chat.send("").await, SendOutcome::Rejected);

        assert_eq!(chat.messages().len(), 1);
        assert!(!chat.is_loading());
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_raw_input_stored_untrimmed() {
        let client = ScriptedClient::new(vec![reply("ok")]);
        let mut chat = session(client.clone());

        chat.send("  hello  ").await;

        assert_eq!(chat.messages()[1].text, "  hello  ");
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].messages.last().unwrap().content, "  hello  ");
    }

    #[test]
    fn test_begin_send_rejects_while_in_flight() {
        let client = ScriptedClient::new(vec![]);
        let mut chat = session(client);

        let first = chat.begin_send("first");
        assert!(first.is_some());
        assert!(chat.is_loading());
        assert_eq!(chat.messages().len(), 2);

        assert!(chat.begin_send("second").is_none());
        assert_eq!(chat.messages().len(), 2);
        assert!(chat.is_loading());
    }

    #[test]
    fn test_request_contains_new_message_once() {
        let client = ScriptedClient::new(vec![]);
        let mut chat = session(client);

        let turn = chat.begin_send("How much is a 2BHK?").unwrap();
        let request = turn.request();

        assert_eq!(request.model, "deepseek-ai/DeepSeek-V3-0324");
        assert_eq!(request.provider, "novita");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].role, WireRole::System);
        assert_eq!(request.messages[1].role, WireRole::Assistant);
        assert_eq!(request.messages[1].content, GREETING);
        assert_eq!(request.messages[2].role, WireRole::User);
        let occurrences = request
            .messages
            .iter()
            .filter(|m| m.content == "How much is a 2BHK?")
            .count();
        assert_eq!(occurrences, 1);
    }

    #[tokio::test]
    async fn test_empty_or_null_reply_uses_fallback() {
        let client = ScriptedClient::new(vec![
            Ok(ChatCompletionResponse::with_content(None)),
            reply(""),
        ]);
        let mut chat = session(client);

        assert_eq!(chat.send("one").await, SendOutcome::Replied);
        assert_eq!(chat.send("two").await, SendOutcome::Replied);

        assert_eq!(chat.messages()[2].text, EMPTY_REPLY_FALLBACK);
        assert_eq!(chat.messages()[4].text, EMPTY_REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn test_failures_map_to_fixed_fallbacks() {
        let client = ScriptedClient::new(vec![
            status(429),
            status(401),
            status(500),
            Err(InferenceError::Decode("garbage".into())),
        ]);
        let mut chat = session(client);

        assert_eq!(
            chat.send("a").await,
            SendOutcome::Failed(FailureKind::RateLimited)
        );
        assert_eq!(
            chat.send("b").await,
            SendOutcome::Failed(FailureKind::Unauthorized)
        );
        assert_eq!(chat.send("c").await, SendOutcome::Failed(FailureKind::Unknown));
        assert_eq!(chat.send("d").await, SendOutcome::Failed(FailureKind::Unknown));

        let texts: Vec<&str> = chat
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .skip(1)
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![
                RATE_LIMITED_FALLBACK,
                UNAUTHORIZED_FALLBACK,
                CONNECTION_FALLBACK,
                CONNECTION_FALLBACK,
            ]
        );
        assert!(!chat.is_loading());
    }

    #[test]
    fn test_cancelled_turn_still_releases_loading() {
        let client = ScriptedClient::new(vec![]);
        let mut chat = session(client);

        let turn = chat.begin_send("hello").unwrap();
        drop(turn);
        assert!(chat.is_loading());

        let outcome = chat.cancel_in_flight();

        assert_eq!(outcome, SendOutcome::Failed(FailureKind::Unknown));
        assert!(!chat.is_loading());
        assert_eq!(chat.messages().len(), 3);
        assert_eq!(chat.messages().last().unwrap().text, CONNECTION_FALLBACK);
        assert!(chat.begin_send("again").is_some());
    }

    #[test]
    fn test_cancel_without_turn_is_noop() {
        let client = ScriptedClient::new(vec![]);
        let mut chat = session(client);

        assert_eq!(chat.cancel_in_flight(), SendOutcome::Rejected);
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_send_future_releases_loading() {
        let mut chat = ChatSession::new(
            Arc::new(StalledClient),
            ProviderConfig::for_provider(Provider::OpenAI, None),
        );

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), chat.send("anyone there?")).await;
        assert!(timed_out.is_err());

        assert!(!chat.is_loading());
        assert_eq!(chat.messages().len(), 3);
        assert_eq!(chat.messages()[1].text, "anyone there?");
        assert_eq!(chat.messages()[2].text, CONNECTION_FALLBACK);
        assert!(chat.begin_send("again").is_some());
    }

    #[tokio::test]
    async fn test_turn_from_another_session_is_rejected() {
        let client = ScriptedClient::new(vec![reply("for the other session")]);
        let mut busy = session(client.clone());
        let mut idle = session(client.clone());

        let turn = busy.begin_send("hello").unwrap();
        let settled = turn.dispatch(client).await;

        assert_eq!(idle.complete(settled), SendOutcome::Rejected);
        assert_eq!(idle.messages().len(), 1);
        assert!(!idle.is_loading());
        assert!(busy.is_loading());
    }

    #[tokio::test]
    async fn test_stale_turn_after_cancel_is_rejected() {
        let client = ScriptedClient::new(vec![reply("late"), reply("fresh")]);
        let mut chat = session(client.clone());

        let stale = chat.begin_send("first").unwrap();
        chat.cancel_in_flight();
        let retry = chat.begin_send("second").unwrap();

        let late = stale.dispatch(client.clone()).await;
        assert_eq!(chat.complete(late), SendOutcome::Rejected);
        assert!(chat.is_loading());
        assert_eq!(chat.messages().len(), 4);

        let fresh = retry.dispatch(client).await;
        assert_eq!(chat.complete(fresh), SendOutcome::Replied);
        assert_eq!(chat.messages().len(), 5);
        assert_eq!(chat.messages()[4].text, "fresh");
    }

    #[tokio::test]
    async fn test_reply_without_choices_is_unknown_failure() {
        let client = ScriptedClient::new(vec![Ok(ChatCompletionResponse { choices: Vec::new() })]);
        let mut chat = session(client);

        assert_eq!(
            chat.send("hello").await,
            SendOutcome::Failed(FailureKind::Unknown)
        );
        assert_eq!(chat.messages().last().unwrap().text, CONNECTION_FALLBACK);
    }

    #[tokio::test]
    async fn test_byte_order_mark_only_input_is_blank() {
        let client = ScriptedClient::new(vec![]);
        let mut chat = session(client.clone());

        assert_eq!(chat.send("\u{feff} ").await, SendOutcome::Rejected);
        assert_eq!(chat.messages().len(), 1);
        assert!(client.requests.lock().unwrap().is_empty());
    }
}
