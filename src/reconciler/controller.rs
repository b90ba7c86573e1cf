use super::state::{ Fold, Phase, Reconciler };
use super::transcript::{ Transcript, TurnId };
use crate::client::{ ChatApi, EventResult, Subscription };
use crate::config::SessionSettings;
use crate::error::ChatError;
use crate::models::api::ChatResponse;
use crate::models::chat::ChatSession;
use crate::models::profile::BirthProfile;
use crate::models::websocket::StreamEvent;
use crate::profile::ProfileRepository;
use log::{ debug, info, warn };
use std::sync::Arc;
use tokio::task::{ JoinError, JoinHandle };

/// Something that happened on the open send: a stream item or the outcome
/// of the follow-up request.
#[derive(Debug)]
pub enum Activity {
    Stream(Option<EventResult>),
    Continued(Result<ChatResponse, ChatError>),
}

/// What the shell needs to redraw after [`ChatController::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Reply {
        turn: TurnId,
        content: String,
    },
    Completed {
        turn: TurnId,
        content: Option<String>,
    },
    Continued,
    Ignored,
}

type ContinueTask = JoinHandle<Result<ChatResponse, ChatError>>;

/// Owns the visible conversation and at most one open subscription.
pub struct ChatController {
    api: Arc<dyn ChatApi>,
    profiles: ProfileRepository,
    settings: SessionSettings,
    reconciler: Reconciler,
    current: Option<ChatSession>,
    sessions: Vec<ChatSession>,
    subscription: Option<Subscription>,
    pending_continue: Option<ContinueTask>,
}

fn join_result(joined: Result<Result<ChatResponse, ChatError>, JoinError>) -> Result<ChatResponse, ChatError> {
    joined.unwrap_or_else(|e| Err(ChatError::request_failed("Continue chat", e)))
}

impl ChatController {
    pub fn new(api: Arc<dyn ChatApi>, profiles: ProfileRepository, settings: SessionSettings) -> Self {
        Self {
            api,
            profiles,
            settings,
            reconciler: Reconciler::new(),
            current: None,
            sessions: Vec::new(),
            subscription: None,
            pending_continue: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        self.reconciler.transcript()
    }

    pub fn phase(&self) -> &Phase {
        self.reconciler.phase()
    }

    pub fn is_sending(&self) -> bool {
        self.reconciler.is_sending()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn current(&self) -> Option<&ChatSession> {
        self.current.as_ref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn profile(&self) -> Result<Option<BirthProfile>, ChatError> {
        Ok(self.profiles.load()?)
    }

    pub fn save_profile(&self, profile: &BirthProfile) -> Result<(), ChatError> {
        profile.validate()?;
        self.profiles.save(profile)?;
        info!("Saved birth profile under '{}'", self.profiles.key());
        Ok(())
    }

    /// Starts a send. Blank input or input during a send returns `Ok(None)`
    /// without touching anything. On success the user message is already
    /// in the transcript and the stream is open; feed
    /// [`next_activity`](Self::next_activity) into [`handle`](Self::handle)
    /// until the send finishes.
    pub async fn submit(&mut self, input: &str) -> Result<Option<TurnId>, ChatError> {
        let text = input.trim();
        if text.is_empty() || self.reconciler.is_sending() {
            return Ok(None);
        }
        let profile = self.profiles
            .load()?
            .ok_or_else(|| ChatError::validation("Birth details not found"))?;

        let Some(turn) = self.reconciler.begin_send(text) else {
            return Ok(None);
        };
        debug!("Sending turn {:?}: {}", turn, text);

        if let Err(e) = self.open_turn(&profile, text).await {
            warn!("Send failed before streaming: {}", e);
            self.teardown();
            self.reconciler.fail(e.to_string());
            return Err(e);
        }
        Ok(Some(turn))
    }

    async fn open_turn(&mut self, profile: &BirthProfile, text: &str) -> Result<(), ChatError> {
        let (session_id, created) = match &self.current {
            Some(session) => (session.id, false),
            None => {
                let resp = self.api.create_session(&self.settings.user_id, profile, text).await?;
                info!("Started chat {}", resp.chat_id);
                self.current = Some(ChatSession { id: resp.chat_id, ..Default::default() });
                (resp.chat_id, true)
            }
        };

        self.teardown();
        let subscription = self.api.open_stream(session_id).await?;
        self.subscription = Some(subscription);
        self.reconciler.start_streaming();

        // A new chat already carries the first message.
        if !created {
            let api = Arc::clone(&self.api);
            let message = text.to_string();
            let chart_type = self.settings.chart_type;
            let context_window = self.settings.context_window;
            self.pending_continue = Some(
                tokio::spawn(async move {
                    api.continue_session(session_id, &message, chart_type, context_window).await
                })
            );
        }
        Ok(())
    }

    pub fn has_activity(&self) -> bool {
        self.subscription.is_some() || self.pending_continue.is_some()
    }

    /// Waits for the next stream item or follow-up outcome. Returns `None`
    /// straight away when nothing is open.
    pub async fn next_activity(&mut self) -> Option<Activity> {
        let activity = match (self.subscription.as_mut(), self.pending_continue.as_mut()) {
            (None, None) => {
                return None;
            }
            (Some(sub), None) => Activity::Stream(sub.next_event().await),
            (None, Some(handle)) => Activity::Continued(join_result(handle.await)),
            (Some(sub), Some(handle)) =>
                tokio::select! {
                    biased;
                    event = sub.next_event() => Activity::Stream(event),
                    joined = handle => Activity::Continued(join_result(joined)),
                },
        };
        if matches!(activity, Activity::Continued(_)) {
            self.pending_continue = None;
        }
        Some(activity)
    }

    pub async fn handle(&mut self, activity: Activity) -> Result<Update, ChatError> {
        match activity {
            Activity::Stream(Some(Ok(event))) => self.fold(event).await,
            Activity::Continued(Ok(resp)) => {
                debug!("Chat {} accepted the follow-up ({} bytes inline)", resp.chat_id, resp.message.len());
                Ok(Update::Continued)
            }
            _ if !self.reconciler.is_sending() => Ok(Update::Ignored),
            Activity::Stream(Some(Err(e))) | Activity::Continued(Err(e)) => Err(self.abort_turn(e)),
            Activity::Stream(None) =>
                Err(
                    self.abort_turn(
                        ChatError::ConnectionFailed("stream closed before the reply completed".into())
                    )
                ),
        }
    }

    async fn fold(&mut self, event: StreamEvent) -> Result<Update, ChatError> {
        match self.reconciler.apply(event) {
            Fold::Reply { turn, content } => Ok(Update::Reply { turn, content }),
            Fold::Completed { turn, content } => {
                self.close_stream();
                // Let the follow-up request finish on its own.
                self.pending_continue = None;
                if let Err(e) = self.refresh_sessions().await {
                    warn!("Failed to refresh chat list after reply: {}", e);
                }
                Ok(Update::Completed { turn, content })
            }
            Fold::Failed { reason, .. } => {
                warn!("Stream reported an error: {}", reason);
                self.teardown();
                Err(ChatError::StreamError(reason))
            }
            Fold::Ignored => Ok(Update::Ignored),
        }
    }

    fn abort_turn(&mut self, error: ChatError) -> ChatError {
        warn!("Send failed: {}", error);
        self.teardown();
        self.reconciler.fail(error.to_string());
        error
    }

    fn close_stream(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }

    fn teardown(&mut self) {
        self.close_stream();
        if let Some(handle) = self.pending_continue.take() {
            handle.abort();
        }
    }

    pub async fn refresh_sessions(&mut self) -> Result<&[ChatSession], ChatError> {
        let sessions = self.api.list_sessions(&self.settings.user_id).await?;
        if let Some(current) = self.current.as_mut() {
            if let Some(fresh) = sessions.iter().find(|s| s.id == current.id) {
                current.title = fresh.title.clone();
                current.created_at = fresh.created_at.clone();
                current.updated_at = fresh.updated_at.clone();
            }
        }
        self.sessions = sessions;
        Ok(&self.sessions)
    }

    /// Drops any open send and clears the conversation.
    pub fn new_chat(&mut self) {
        self.teardown();
        self.reconciler.reset(Vec::new());
        self.current = None;
    }

    /// Drops any open send and loads another conversation.
    pub async fn select_session(&mut self, session_id: i64) -> Result<&ChatSession, ChatError> {
        self.teardown();
        self.reconciler.abandon();
        let session = self.api.fetch_session(session_id).await?;
        self.reconciler.reset(session.messages.clone());
        let current = self.current.insert(session);
        Ok(&*current)
    }

    /// Closes anything still open, e.g. when the user leaves.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.reconciler.abandon();
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeApi;
    use crate::client::EventFeed;
    use crate::models::chat::Role;
    use crate::profile::MemoryStore;
    use std::sync::atomic::Ordering;

    fn controller(api: &Arc<FakeApi>, with_profile: bool) -> ChatController {
        let profiles = ProfileRepository::new(Arc::new(MemoryStore::default()));
        if with_profile {
            profiles.save(&BirthProfile::new("1992-08-14", "04:20", 12.97, 77.59)).unwrap();
        }
        ChatController::new(api.clone(), profiles, SessionSettings::default())
    }

    async fn push(feed: &EventFeed, events: &[StreamEvent]) {
        for event in events {
            assert!(feed.send(Ok(event.clone())).await);
        }
    }

    async fn drain(ctl: &mut ChatController) -> Vec<Result<Update, ChatError>> {
        let mut out = Vec::new();
        while ctl.is_sending() {
            let Some(activity) = ctl.next_activity().await else {
                break;
            };
            out.push(ctl.handle(activity).await);
        }
        out
    }

    fn replies(ctl: &ChatController) -> Vec<String> {
        ctl.transcript()
            .messages()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn first_message_creates_chat_and_streams_reply() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);

        let turn = ctl.submit("  What about my career?  ").await.unwrap().unwrap();
        assert_eq!(ctl.phase(), &Phase::Streaming);
        assert_eq!(ctl.transcript().len(), 1);

        push(&api.feed(0), &[
            StreamEvent::Chunk("Hel".into()),
            StreamEvent::Chunk("lo".into()),
            StreamEvent::Complete,
        ]).await;
        let results = drain(&mut ctl).await;

        assert!(matches!(
            results.last(),
            Some(Ok(Update::Completed { turn: t, content: Some(c) })) if *t == turn && c == "Hello"
        ));
        assert_eq!(replies(&ctl), vec!["Hello"]);
        assert!(!ctl.is_sending());
        assert!(api.feed(0).is_closed());
        assert_eq!(api.calls(), vec![
            "create:user-123:1992-08-14:What about my career?".to_string(),
            "open:7:previous_closed=true".to_string(),
            "list:user-123".to_string(),
        ]);
        assert_eq!(ctl.current().map(|s| s.title.as_str()), Some("Moon sign"));
        assert_eq!(ctl.sessions().len(), 1);
    }

    #[tokio::test]
    async fn follow_up_opens_stream_then_continues() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);
        ctl.select_session(7).await.unwrap();

        ctl.submit("And health?").await.unwrap().unwrap();
        tokio::task::yield_now().await;
        push(&api.feed(0), &[StreamEvent::Chunk("Strong".into()), StreamEvent::Complete]).await;
        drain(&mut ctl).await;

        let calls = api.calls();
        assert_eq!(calls[1], "open:7:previous_closed=true");
        assert!(calls.contains(&"continue:7:And health?:Vedic:10".to_string()), "{:?}", calls);
        assert_eq!(replies(&ctl), vec!["After 2026.", "Strong"]);
    }

    #[tokio::test]
    async fn error_before_any_chunk_leaves_no_assistant_message() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);
        ctl.submit("q").await.unwrap();

        push(&api.feed(0), &[StreamEvent::Error("chart engine unavailable".into())]).await;
        let results = drain(&mut ctl).await;

        match results.last() {
            Some(Err(ChatError::StreamError(reason))) => assert_eq!(reason, "chart engine unavailable"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(replies(&ctl).is_empty());
        assert_eq!(ctl.transcript().len(), 1);
        assert!(!ctl.is_sending());
        assert!(api.feed(0).is_closed());
    }

    #[tokio::test]
    async fn failed_follow_up_closes_stream_and_rolls_back() {
        let api = Arc::new(FakeApi::default());
        api.fail_continue.store(true, Ordering::SeqCst);
        let mut ctl = controller(&api, true);
        ctl.select_session(7).await.unwrap();

        ctl.submit("q").await.unwrap();
        let results = drain(&mut ctl).await;

        assert!(matches!(results.last(), Some(Err(ChatError::RequestFailed { .. }))));
        assert!(api.feed(0).is_closed());
        assert_eq!(replies(&ctl), vec!["After 2026."]);
        assert!(matches!(ctl.phase(), Phase::Failed(_)));
        assert!(!ctl.has_activity());
    }

    #[tokio::test]
    async fn new_chat_closes_open_stream_before_next_one() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);
        ctl.submit("first").await.unwrap();
        push(&api.feed(0), &[StreamEvent::Chunk("partial".into())]).await;
        let activity = ctl.next_activity().await.unwrap();
        ctl.handle(activity).await.unwrap();
        assert_eq!(replies(&ctl), vec!["partial"]);

        ctl.new_chat();
        assert!(api.feed(0).is_closed());
        assert!(ctl.transcript().is_empty());
        assert!(ctl.current().is_none());

        ctl.submit("second").await.unwrap().unwrap();
        assert_eq!(api.calls().last().map(String::as_str), Some("open:7:previous_closed=true"));
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);
        assert_eq!(ctl.submit(" \t\n").await.unwrap(), None);
        assert!(ctl.transcript().is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_profile_fails_validation() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, false);
        let err = ctl.submit("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::ValidationFailed(_)));
        assert!(ctl.transcript().is_empty());
        assert!(api.calls().is_empty());
        assert_eq!(ctl.phase(), &Phase::Idle);
    }

    #[tokio::test]
    async fn hang_up_without_complete_is_a_connection_failure() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);
        ctl.submit("q").await.unwrap();
        push(&api.feed(0), &[StreamEvent::Chunk("so far".into())]).await;
        api.hang_up();

        let results = drain(&mut ctl).await;
        assert!(matches!(results.last(), Some(Err(ChatError::ConnectionFailed(_)))));
        assert!(replies(&ctl).is_empty());
        assert!(!ctl.is_sending());
    }

    #[tokio::test]
    async fn unknown_session_surfaces_not_found() {
        let api = Arc::new(FakeApi::default());
        let mut ctl = controller(&api, true);
        let err = ctl.select_session(404).await.unwrap_err();
        assert!(matches!(err, ChatError::NotFound(404)));
    }

    #[tokio::test]
    async fn invalid_profile_is_not_saved() {
        let api = Arc::new(FakeApi::default());
        let ctl = controller(&api, false);
        let err = ctl.save_profile(&BirthProfile::new("1992-08-14", "04:20", 120.0, 0.0)).unwrap_err();
        assert!(matches!(err, ChatError::ValidationFailed(_)));
        assert_eq!(ctl.profile().unwrap(), None);
    }
}
