//! Session controller for driving a conversation.
//!
//! Every state mutation happens synchronously on `&mut self`. The only
//! suspension point is the dialogue exchange, which is split out as
//! [`SessionController::dispatch`] so a host event loop can keep delivering
//! UI events while a request is pending:
//!
//! ```ignore
//! if let Some(request) = controller.begin_activation(position) {
//!     let fut = controller.dispatch(&request);
//!     tokio::spawn(async move { tx.send(fut.await) });
//! }
//! // later, on the event loop:
//! controller.complete(completion);
//! ```

use std::{collections::HashMap, sync::Arc};

use chat_widget_core::{
    Binding, BotReply, CheckpointId, ClickGuard, DialogueClient, EventBus, Greeting,
    HistoryStack, InFlightPolicy, Message, OptionRegistry, ReplyError, Sender, SessionToken,
    Snapshot, StartError, TokenStore, Transcript, WidgetConfig, WidgetEvent,
};
use futures::{FutureExt, future::BoxFuture};
use uuid::Uuid;

/// Request identifier.
pub type RequestId = Uuid;

/// Startup error.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Startup exchange failed: {0}")]
    Exchange(#[from] StartError),
}

/// Progress of the startup exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupStatus {
    /// `start` has not been called yet.
    NotStarted,
    /// Transcript has been seeded.
    Ready,
    /// The last startup attempt failed.
    Failed(String),
}

/// A request that has been admitted but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    id: RequestId,
    query: String,
    session_token: Option<String>,
    is_suggestion: bool,
}

impl PendingRequest {
    /// Request identifier.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Query sent to the service.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Session token sent with the query, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Whether this replays a suggestion rather than free text.
    #[must_use]
    pub const fn is_suggestion(&self) -> bool {
        self.is_suggestion
    }
}

/// Result of a dispatched request, ready to be applied.
#[derive(Debug, Clone)]
pub struct Completion {
    pub request: PendingRequest,
    pub outcome: Result<BotReply, ReplyError>,
}

struct InFlight {
    /// Latest checkpoint issued when the request was admitted.
    epoch: Option<CheckpointId>,
    /// Set when back-navigation discarded the branch this request belongs to.
    stale: bool,
}

/// Session controller orchestrating transcript, options, guard and history.
pub struct SessionController<C, S>
where
    C: DialogueClient + 'static,
    S: TokenStore,
{
    client: Arc<C>,
    store: S,
    config: WidgetConfig,
    token: SessionToken,
    transcript: Transcript,
    options: OptionRegistry,
    guard: ClickGuard,
    history: HistoryStack,
    input: String,
    startup: StartupStatus,
    in_flight: HashMap<RequestId, InFlight>,
    events: Arc<EventBus>,
}

impl<C, S> SessionController<C, S>
where
    C: DialogueClient + 'static,
    S: TokenStore,
{
    /// Create a new controller.
    ///
    /// Reads the persisted session token once when `resume_session` is enabled.
    #[must_use]
    pub fn new(client: Arc<C>, store: S, config: WidgetConfig) -> Self {
        let mut token = SessionToken::new();
        if config.resume_session {
            match store.load(&config.token_key) {
                Ok(Some(saved)) => {
                    if token.adopt(saved) {
                        tracing::info!("Resuming persisted session");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to read persisted session token: {e}"),
            }
        }

        let history = config
            .history_limit
            .map_or_else(HistoryStack::new, HistoryStack::with_limit);

        Self {
            client,
            store,
            config,
            token,
            transcript: Transcript::new(),
            options: OptionRegistry::new(),
            guard: ClickGuard::new(),
            history,
            input: String::new(),
            startup: StartupStatus::NotStarted,
            in_flight: HashMap::new(),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Run the startup exchange and seed the transcript.
    ///
    /// Does nothing once startup has succeeded. After a failure the
    /// transcript is left untouched and the call may be repeated.
    ///
    /// # Errors
    /// Returns error if the service could not be reached or answered badly.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if self.startup == StartupStatus::Ready {
            tracing::debug!("Startup already complete");
            return Ok(());
        }

        match self.client.start().await {
            Ok(greeting) => {
                self.seed(greeting);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Startup exchange failed: {e}");
                let reason = e.to_string();
                self.startup = StartupStatus::Failed(reason.clone());
                self.events.push(WidgetEvent::StartupFailed { reason });
                Err(e.into())
            }
        }
    }

    fn seed(&mut self, greeting: Greeting) {
        self.transcript.push(Message::bot(greeting.reply));
        for query in greeting.default_queries {
            self.transcript.push(Message::suggestion(Sender::User, query));
        }
        self.startup = StartupStatus::Ready;
        tracing::info!(entries = self.transcript.len(), "Conversation started");

        self.events.push(WidgetEvent::TranscriptChanged {
            len: self.transcript.len(),
        });
        self.events.push(WidgetEvent::ScrollToBottom);
    }

    /// Admit a query: validate, checkpoint and echo free text, resolve the token.
    ///
    /// Returns `None` for whitespace-only text, or when the in-flight policy
    /// rejects a new request.
    pub fn begin_query(&mut self, text: &str, is_suggestion: bool) -> Option<PendingRequest> {
        if text.trim().is_empty() || !self.admits_request() {
            return None;
        }

        if !is_suggestion {
            self.checkpoint();
            self.transcript.push(Message::user(text));
            self.events.push(WidgetEvent::TranscriptChanged {
                len: self.transcript.len(),
            });
        }

        Some(self.issue(text.to_string(), is_suggestion))
    }

    /// Admit the activation of the selectable message at `position`.
    ///
    /// The guard check, checkpoint and guard mark happen together; any later
    /// activation of the same key is a no-op. The registry's mapped query is
    /// sent when the label is bound, the label itself otherwise.
    pub fn begin_activation(&mut self, position: usize) -> Option<PendingRequest> {
        let Some(key) = self.transcript.activation_key(position) else {
            tracing::debug!(position, "Ignoring activation of non-selectable entry");
            return None;
        };
        if self.guard.contains(&key) {
            tracing::debug!(position, label = %key.label, "Ignoring repeated activation");
            return None;
        }

        let query = self.options.resolve(&key.label).to_string();
        if query.trim().is_empty() || !self.admits_request() {
            return None;
        }

        self.checkpoint();
        let marked = self.guard.try_mark(key);
        debug_assert!(marked, "guard checked before checkpoint");

        Some(self.issue(query, true))
    }

    /// Perform the dialogue exchange for an admitted request.
    ///
    /// The returned future owns everything it needs, so it can be spawned
    /// while the controller keeps handling events.
    #[must_use]
    pub fn dispatch(&self, request: &PendingRequest) -> BoxFuture<'static, Completion> {
        let client = Arc::clone(&self.client);
        let request = request.clone();
        async move {
            let outcome = client
                .reply(&request.query, request.session_token.as_deref())
                .await;
            Completion { request, outcome }
        }
        .boxed()
    }

    /// Apply a completed exchange to the conversation.
    ///
    /// Failures become bot messages; nothing is propagated. A completion for
    /// a branch discarded by back-navigation only adopts the session token.
    pub fn complete(&mut self, completion: Completion) {
        let Completion { request, outcome } = completion;

        let Some(entry) = self.in_flight.remove(&request.id) else {
            tracing::warn!(request_id = %request.id, "Ignoring completion for unknown request");
            return;
        };

        if let Ok(reply) = &outcome {
            self.adopt_token(&reply.session_token);
        }

        if entry.stale {
            tracing::warn!(request_id = %request.id, "Discarding completion for rewound branch");
            return;
        }

        match outcome {
            Ok(reply) => self.apply_reply(reply),
            Err(ReplyError::Service { message }) => {
                tracing::debug!(request_id = %request.id, "Service reported failure");
                let text = message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| self.config.service_error_text.clone());
                self.transcript.push(Message::bot(text));
            }
            Err(ReplyError::Transport(reason)) => {
                tracing::warn!(request_id = %request.id, "Transport failure: {reason}");
                self.transcript
                    .push(Message::bot(self.config.network_error_text.clone()));
            }
        }

        self.events.push(WidgetEvent::TranscriptChanged {
            len: self.transcript.len(),
        });
        if !request.is_suggestion {
            self.input.clear();
            self.events.push(WidgetEvent::InputCleared);
        }
        self.events.push(WidgetEvent::ScrollToBottom);
    }

    fn apply_reply(&mut self, reply: BotReply) {
        self.transcript.push(Message::bot(reply.reply));

        for option in reply.options {
            let label = option.label.clone();
            if let Binding::Rebound { previous } = self.options.bind(option) {
                tracing::warn!(
                    label = %label,
                    previous = %previous,
                    "Option label rebound to a different query"
                );
            }
            self.transcript.push(Message::suggestion(Sender::Bot, label));
        }
    }

    /// Send a query and apply the reply.
    pub async fn send_query(&mut self, text: &str, is_suggestion: bool) {
        if let Some(request) = self.begin_query(text, is_suggestion) {
            let completion = self.dispatch(&request).await;
            self.complete(completion);
        }
    }

    /// Send the free-text input buffer.
    pub async fn submit_input(&mut self) {
        let text = self.input.clone();
        self.send_query(&text, false).await;
    }

    /// Activate the selectable message at `position` and apply the reply.
    pub async fn activate(&mut self, position: usize) {
        if let Some(request) = self.begin_activation(position) {
            let completion = self.dispatch(&request).await;
            self.complete(completion);
        }
    }

    /// Restore the state captured before the most recent advancing action.
    ///
    /// Returns `false` (and changes nothing) when there is no history.
    pub fn go_back(&mut self) -> bool {
        let Some((checkpoint, snapshot)) = self.history.pop() else {
            return false;
        };

        let Snapshot {
            transcript,
            options,
            guard,
        } = snapshot;
        self.transcript = transcript;
        self.options = options;
        self.guard = guard;

        for entry in self.in_flight.values_mut() {
            if entry.epoch.is_some_and(|epoch| epoch >= checkpoint) {
                entry.stale = true;
            }
        }

        let depth = self.history.len();
        tracing::debug!(depth, "Rewound conversation");
        self.events.push(WidgetEvent::Rewound { depth });
        self.events.push(WidgetEvent::TranscriptChanged {
            len: self.transcript.len(),
        });
        true
    }

    fn checkpoint(&mut self) -> CheckpointId {
        self.history.push(self.state())
    }

    fn issue(&mut self, query: String, is_suggestion: bool) -> PendingRequest {
        let request = PendingRequest {
            id: Uuid::new_v4(),
            query,
            session_token: self.token.get().map(ToOwned::to_owned),
            is_suggestion,
        };
        self.in_flight.insert(
            request.id,
            InFlight {
                epoch: self.history.last_checkpoint(),
                stale: false,
            },
        );
        tracing::debug!(request_id = %request.id, query = %request.query, "Admitted query");
        request
    }

    fn admits_request(&self) -> bool {
        match self.config.in_flight {
            InFlightPolicy::Concurrent => true,
            InFlightPolicy::SingleFlight => {
                let busy = self.in_flight.values().any(|e| !e.stale);
                if busy {
                    tracing::debug!("Rejecting request while another is in flight");
                }
                !busy
            }
        }
    }

    fn adopt_token(&mut self, token: &str) {
        if !self.token.adopt(token) {
            return;
        }
        tracing::info!("Adopted session token");
        if self.config.resume_session {
            if let Err(e) = self.store.save(&self.config.token_key, token) {
                tracing::warn!("Failed to persist session token: {e}");
            }
        }
        self.events.push(WidgetEvent::SessionAdopted {
            token: token.to_string(),
        });
    }

    /// Current state as a value snapshot.
    #[must_use]
    pub fn state(&self) -> Snapshot {
        Snapshot {
            transcript: self.transcript.clone(),
            options: self.options.clone(),
            guard: self.guard.clone(),
        }
    }

    /// The visible conversation.
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Option registry of the current branch.
    #[must_use]
    pub const fn options(&self) -> &OptionRegistry {
        &self.options
    }

    /// Click guard of the current branch.
    #[must_use]
    pub const fn guard(&self) -> &ClickGuard {
        &self.guard
    }

    /// Session token, if one has been adopted.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.token.get()
    }

    /// Number of snapshots available for back-navigation.
    #[must_use]
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    /// Whether back-navigation is enabled.
    #[must_use]
    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Number of admitted requests not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether the activation key at `position` has already fired.
    #[must_use]
    pub fn is_activated(&self, position: usize) -> bool {
        self.transcript
            .activation_key(position)
            .is_some_and(|key| self.guard.contains(&key))
    }

    /// Startup progress.
    #[must_use]
    pub const fn startup_status(&self) -> &StartupStatus {
        &self.startup
    }

    /// Event bus for renderer side effects.
    #[must_use]
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Free-text input buffer.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the input buffer.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Append a character to the input buffer.
    pub fn push_input(&mut self, c: char) {
        self.input.push(c);
    }

    /// Remove the last character of the input buffer.
    pub fn pop_input(&mut self) -> Option<char> {
        self.input.pop()
    }
}

#[cfg(test)]
mod tests {
    use chat_widget_core::ActivationKey;

    use super::*;
    use crate::{storage::MemoryTokenStore, testing::ScriptedClient};

    type Controller = SessionController<ScriptedClient, MemoryTokenStore>;

    fn controller(client: ScriptedClient) -> (Arc<ScriptedClient>, Controller) {
        controller_with(client, MemoryTokenStore::new(), WidgetConfig::default())
    }

    fn controller_with(
        client: ScriptedClient,
        store: MemoryTokenStore,
        config: WidgetConfig,
    ) -> (Arc<ScriptedClient>, Controller) {
        let client = Arc::new(client);
        let controller = SessionController::new(Arc::clone(&client), store, config);
        (client, controller)
    }

    async fn cold_started() -> (Arc<ScriptedClient>, Controller) {
        let (client, mut controller) = controller(
            ScriptedClient::new().with_greeting("Hi, how can I help?", &["How do I apply?"]),
        );
        controller.start().await.unwrap();
        (client, controller)
    }

    fn texts(controller: &Controller) -> Vec<(Sender, String, bool)> {
        controller
            .transcript()
            .iter()
            .map(|m| (m.sender, m.text.clone(), m.is_selectable))
            .collect()
    }

    #[tokio::test]
    async fn test_cold_start() {
        let (client, controller) = cold_started().await;

        assert_eq!(
            texts(&controller),
            vec![
                (Sender::Bot, "Hi, how can I help?".to_string(), false),
                (Sender::User, "How do I apply?".to_string(), true),
            ]
        );
        assert!(controller.options().is_empty());
        assert_eq!(controller.startup_status(), &StartupStatus::Ready);
        assert_eq!(client.start_calls(), 1);
        assert_eq!(client.reply_calls(), 0);
        assert!(!controller.can_go_back());
    }

    #[tokio::test]
    async fn test_start_failure_leaves_transcript_empty() {
        let client = ScriptedClient::new();
        client.queue_start(Err(StartError::Malformed("missing result".to_string())));
        let (client, mut controller) = controller(client);

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, StartupError::Exchange(StartError::Malformed(_))));
        assert!(controller.transcript().is_empty());
        assert!(matches!(controller.startup_status(), StartupStatus::Failed(_)));
        assert!(
            controller
                .events()
                .history()
                .iter()
                .any(|e| matches!(e, WidgetEvent::StartupFailed { .. }))
        );

        // Host retries; no automatic retry happened.
        assert_eq!(client.start_calls(), 1);
        client.queue_start(Ok(Greeting {
            reply: "Hi".to_string(),
            default_queries: vec![],
        }));
        controller.start().await.unwrap();
        assert_eq!(controller.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_once_ready() {
        let (client, mut controller) = cold_started().await;
        controller.start().await.unwrap();
        assert_eq!(client.start_calls(), 1);
        assert_eq!(controller.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_option_expansion() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[("Need help?", "help")]);

        controller.activate(1).await;

        assert_eq!(
            client.requests()[0].query, "How do I apply?",
            "default query is sent verbatim"
        );
        assert_eq!(client.requests()[0].session_token, None);
        assert_eq!(
            texts(&controller)[2..],
            [
                (Sender::Bot, "Fill form X".to_string(), false),
                (Sender::Bot, "Need help?".to_string(), true),
            ]
        );
        assert_eq!(controller.options().get("Need help?"), Some("help"));
        assert_eq!(controller.session_token(), Some("s1"));
        assert!(controller.is_activated(1));
    }

    #[tokio::test]
    async fn test_mapped_option_sends_query_not_label() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[("Need help?", "help")]);
        client.queue_reply("s1", "Call us", &[]);

        controller.activate(1).await;
        controller.activate(3).await;

        let requests = client.requests();
        assert_eq!(requests[1].query, "help");
        assert_eq!(requests[1].session_token.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_back_navigation_restores_cold_start() {
        let (client, mut controller) = cold_started().await;
        let before = controller.state();
        client.queue_reply("s1", "Fill form X", &[("Need help?", "help")]);

        controller.activate(1).await;
        assert!(controller.go_back());

        assert_eq!(controller.state(), before);
        assert_eq!(controller.transcript().len(), 2);
        assert!(!controller.options().contains("Need help?"));
        assert!(!controller.is_activated(1));
        // The session outlives the branch.
        assert_eq!(controller.session_token(), Some("s1"));
        assert_eq!(client.reply_calls(), 1);
    }

    #[tokio::test]
    async fn test_go_back_on_empty_history_is_noop() {
        let (_client, mut controller) = cold_started().await;
        let before = controller.state();
        assert!(!controller.go_back());
        assert_eq!(controller.state(), before);
    }

    #[tokio::test]
    async fn test_service_failure_with_message() {
        let (client, mut controller) = cold_started().await;
        client.queue_error(ReplyError::Service {
            message: Some("rate limited".to_string()),
        });

        controller.activate(1).await;

        assert_eq!(controller.transcript().len(), 3);
        assert_eq!(
            controller.transcript().last(),
            Some(&Message::bot("rate limited"))
        );
        assert!(controller.options().is_empty());
        assert_eq!(controller.session_token(), None);
    }

    #[tokio::test]
    async fn test_service_failure_without_message_uses_fallback() {
        let (client, mut controller) = cold_started().await;
        client.queue_error(ReplyError::Service { message: None });
        client.queue_error(ReplyError::Service {
            message: Some(String::new()),
        });

        controller.send_query("hello", false).await;
        controller.send_query("again", false).await;

        let tail: Vec<_> = controller.transcript().iter().rev().take(3).collect();
        assert_eq!(tail[0], &Message::bot("Unknown error"));
        assert_eq!(tail[1], &Message::user("again"));
        assert_eq!(tail[2], &Message::bot("Unknown error"));
    }

    #[tokio::test]
    async fn test_transport_failure_clears_free_text_input() {
        let (client, mut controller) = cold_started().await;
        client.queue_error(ReplyError::Transport("connection refused".to_string()));

        controller.set_input("What are the fees?");
        controller.submit_input().await;

        assert_eq!(
            texts(&controller)[2..],
            [
                (Sender::User, "What are the fees?".to_string(), false),
                (Sender::Bot, "Network error.".to_string(), false),
            ]
        );
        assert_eq!(controller.input(), "");
        assert_eq!(client.reply_calls(), 1);
    }

    #[tokio::test]
    async fn test_suggestion_replay_keeps_input() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[]);

        controller.set_input("half typed");
        controller.activate(1).await;

        assert_eq!(controller.input(), "half typed");
    }

    #[tokio::test]
    async fn test_whitespace_input_is_noop() {
        let (client, mut controller) = cold_started().await;
        let before = controller.state();

        controller.set_input("   \t ");
        controller.submit_input().await;
        controller.send_query("", true).await;

        assert_eq!(controller.state(), before);
        assert_eq!(client.reply_calls(), 0);
        assert_eq!(controller.history_depth(), 0);
        assert_eq!(controller.input(), "   \t ");
    }

    #[tokio::test]
    async fn test_free_text_checkpoint_precedes_echo() {
        let (client, mut controller) = cold_started().await;
        let before = controller.state();
        client.queue_reply("s1", "Sure", &[]);

        controller.send_query("Tell me more", false).await;
        assert_eq!(controller.transcript().get(2), Some(&Message::user("Tell me more")));

        assert!(controller.go_back());
        assert_eq!(controller.state(), before);
    }

    #[tokio::test]
    async fn test_direct_suggestion_query_does_not_echo_or_checkpoint() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[]);

        controller.send_query("How do I apply?", true).await;

        assert_eq!(controller.history_depth(), 0);
        assert_eq!(controller.transcript().get(2), Some(&Message::bot("Fill form X")));
    }

    #[tokio::test]
    async fn test_repeated_activation_dispatches_once() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[]);

        let first = controller.begin_activation(1);
        let second = controller.begin_activation(1);
        assert!(first.is_some());
        assert!(second.is_none());

        let completion = controller.dispatch(&first.unwrap()).await;
        controller.complete(completion);
        controller.activate(1).await;

        assert_eq!(client.reply_calls(), 1);
        assert_eq!(controller.history_depth(), 1);
    }

    #[tokio::test]
    async fn test_activation_of_plain_message_is_noop() {
        let (client, mut controller) = cold_started().await;
        assert!(controller.begin_activation(0).is_none());
        assert!(controller.begin_activation(42).is_none());
        assert_eq!(client.reply_calls(), 0);
        assert!(controller.guard().is_empty());
    }

    #[tokio::test]
    async fn test_guard_snapshot_taken_before_mark() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[]);

        controller.activate(1).await;
        assert!(controller.guard().contains(&ActivationKey::new(1, "How do I apply?")));

        controller.go_back();
        assert!(controller.guard().is_empty());

        // Re-activation is allowed on the restored branch.
        client.queue_reply("s1", "Fill form X", &[]);
        controller.activate(1).await;
        assert_eq!(client.reply_calls(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_completions_interleave() {
        let (client, mut controller) = controller(
            ScriptedClient::new().with_greeting("Hi", &["Fees?", "Deadlines?"]),
        );
        controller.start().await.unwrap();
        client.queue_reply("s1", "Fees are 10", &[]);
        client.queue_reply("s1", "Deadline is May", &[]);

        let fees = controller.begin_activation(1).unwrap();
        let deadlines = controller.begin_activation(2).unwrap();
        assert_eq!(controller.in_flight(), 2);

        let fees_done = controller.dispatch(&fees).await;
        let deadlines_done = controller.dispatch(&deadlines).await;

        // Completions arrive out of order.
        controller.complete(deadlines_done);
        controller.complete(fees_done);

        assert_eq!(
            controller.transcript().as_slice()[3..],
            [Message::bot("Deadline is May"), Message::bot("Fees are 10")]
        );
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_back_mid_request_discards_completion() {
        let (client, mut controller) = cold_started().await;
        let before = controller.state();
        client.queue_reply("s1", "Fill form X", &[("Need help?", "help")]);

        controller.set_input("draft");
        let request = controller.begin_query("draft", false).unwrap();
        assert!(controller.go_back());

        let completion = controller.dispatch(&request).await;
        controller.complete(completion);

        assert_eq!(controller.state(), before);
        assert_eq!(controller.session_token(), Some("s1"));
        assert_eq!(controller.input(), "draft");
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_back_keeps_older_request_alive() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Fill form X", &[]);
        client.queue_reply("s1", "Sure", &[]);

        let older = controller.begin_activation(1).unwrap();
        let newer = controller.begin_query("and then?", false).unwrap();
        controller.go_back();

        let older_done = controller.dispatch(&older).await;
        let newer_done = controller.dispatch(&newer).await;
        controller.complete(older_done);
        controller.complete(newer_done);

        assert_eq!(controller.transcript().len(), 3);
        assert_eq!(controller.transcript().last(), Some(&Message::bot("Fill form X")));
    }

    #[tokio::test]
    async fn test_single_flight_rejects_while_pending() {
        let config = WidgetConfig {
            in_flight: InFlightPolicy::SingleFlight,
            ..WidgetConfig::default()
        };
        let (client, mut controller) = controller_with(
            ScriptedClient::new().with_greeting("Hi", &["Fees?", "Deadlines?"]),
            MemoryTokenStore::new(),
            config,
        );
        controller.start().await.unwrap();
        client.queue_reply("s1", "Fees are 10", &[]);

        let first = controller.begin_activation(1).unwrap();
        assert!(controller.begin_activation(2).is_none());
        assert!(controller.begin_query("hello", false).is_none());
        // The rejected activation left no trace.
        assert!(!controller.is_activated(2));
        assert_eq!(controller.history_depth(), 1);

        let done = controller.dispatch(&first).await;
        controller.complete(done);
        assert!(controller.begin_activation(2).is_some());
    }

    #[tokio::test]
    async fn test_token_is_set_once_and_carried() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "one", &[]);
        client.queue_reply("s2", "two", &[]);
        client.queue_reply("s3", "three", &[]);

        controller.send_query("a", false).await;
        controller.send_query("b", false).await;
        controller.send_query("c", false).await;

        let tokens: Vec<_> = client
            .requests()
            .into_iter()
            .map(|r| r.session_token)
            .collect();
        assert_eq!(tokens, vec![None, Some("s1".to_string()), Some("s1".to_string())]);
        assert_eq!(controller.session_token(), Some("s1"));
    }

    #[tokio::test]
    async fn test_resume_reads_and_persists_token() {
        let config = WidgetConfig {
            resume_session: true,
            ..WidgetConfig::default()
        };
        let store = MemoryTokenStore::with_token("chatbot_session", "saved");
        let (client, mut controller) = controller_with(
            ScriptedClient::new().with_greeting("Hi", &[]),
            store,
            config,
        );
        controller.start().await.unwrap();
        client.queue_reply("fresh", "Welcome back", &[]);

        controller.send_query("hello", false).await;

        assert_eq!(client.requests()[0].session_token.as_deref(), Some("saved"));
        assert_eq!(controller.session_token(), Some("saved"));
    }

    #[tokio::test]
    async fn test_adopted_token_persisted_only_when_resuming() {
        for resume_session in [true, false] {
            let config = WidgetConfig {
                resume_session,
                ..WidgetConfig::default()
            };
            let (client, mut controller) = controller_with(
                ScriptedClient::new().with_greeting("Hi", &[]),
                MemoryTokenStore::new(),
                config,
            );
            controller.start().await.unwrap();
            client.queue_reply("s1", "ok", &[]);
            controller.send_query("hello", false).await;

            let stored = controller.store.load("chatbot_session").unwrap();
            assert_eq!(stored.is_some(), resume_session);
        }
    }

    #[tokio::test]
    async fn test_rebound_label_uses_latest_query() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "first", &[("More", "more-a")]);
        client.queue_reply("s1", "second", &[("More", "more-b")]);

        controller.send_query("a", false).await;
        controller.send_query("b", false).await;
        assert_eq!(controller.options().get("More"), Some("more-b"));

        // Rewinding restores the earlier binding.
        controller.go_back();
        assert_eq!(controller.options().get("More"), Some("more-a"));
    }

    #[tokio::test]
    async fn test_events_after_completion() {
        let (client, mut controller) = cold_started().await;
        client.queue_reply("s1", "Sure", &[]);
        let mut rx = controller.events().subscribe();

        controller.send_query("hello", false).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                WidgetEvent::TranscriptChanged { len: 3 },
                WidgetEvent::SessionAdopted {
                    token: "s1".to_string()
                },
                WidgetEvent::TranscriptChanged { len: 4 },
                WidgetEvent::InputCleared,
                WidgetEvent::ScrollToBottom,
            ]
        );
    }

    #[tokio::test]
    async fn test_events_after_failures() {
        let (client, mut controller) = cold_started().await;
        client.queue_error(ReplyError::Service { message: None });
        client.queue_error(ReplyError::Transport("connection refused".to_string()));
        let mut rx = controller.events().subscribe();

        controller.send_query("hello", false).await;
        controller.activate(1).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                // Free text: echo, failure message, then input cleared.
                WidgetEvent::TranscriptChanged { len: 3 },
                WidgetEvent::TranscriptChanged { len: 4 },
                WidgetEvent::InputCleared,
                WidgetEvent::ScrollToBottom,
                // Suggestion replay: no echo and the input is left alone.
                WidgetEvent::TranscriptChanged { len: 5 },
                WidgetEvent::ScrollToBottom,
            ]
        );
        assert_eq!(controller.transcript().last(), Some(&Message::bot("Network error.")));
    }

    #[tokio::test]
    async fn test_history_limit_bounds_depth() {
        let config = WidgetConfig {
            history_limit: Some(2),
            ..WidgetConfig::default()
        };
        let (client, mut controller) = controller_with(
            ScriptedClient::new().with_greeting("Hi", &[]),
            MemoryTokenStore::new(),
            config,
        );
        controller.start().await.unwrap();
        for i in 0..4 {
            client.queue_reply("s1", &format!("reply {i}"), &[]);
            controller.send_query(&format!("query {i}"), false).await;
        }

        assert_eq!(controller.history_depth(), 2);
        assert!(controller.go_back());
        assert!(controller.go_back());
        assert!(!controller.go_back());
        // Oldest reachable state is the one before "query 2".
        assert_eq!(controller.transcript().len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_completion_ignored() {
        let (_client, mut controller) = cold_started().await;
        let before = controller.state();
        let request = controller.begin_query("x", true).unwrap();
        let completion = Completion {
            request: request.clone(),
            outcome: Err(ReplyError::Transport("boom".to_string())),
        };
        controller.complete(completion.clone());
        controller.complete(completion);

        assert_eq!(controller.transcript().len(), before.transcript.len() + 1);
    }
}
