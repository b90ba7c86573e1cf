use super::{ ChatApi, EventFeed, Subscription };
use crate::error::ChatError;
use crate::models::api::{ ChartType, ChatResponse };
use crate::models::chat::{ ChatMessage, ChatSession };
use crate::models::profile::BirthProfile;
use crate::models::websocket::StreamEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::{ Arc, Mutex };

/// In-process stand-in for the remote service. New chats get id 7, session
/// 404 does not exist, and streams are fed by the test through
/// [`feed`](Self::feed) or pre-filled from [`script`](Self::script).
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<String>>,
    feeds: Mutex<Vec<Arc<EventFeed>>>,
    script: Mutex<VecDeque<Vec<StreamEvent>>>,
    pub fail_continue: AtomicBool,
}

impl FakeApi {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn feed(&self, index: usize) -> Arc<EventFeed> {
        Arc::clone(&self.feeds.lock().unwrap()[index])
    }

    /// Queues events delivered as soon as the next stream opens.
    pub fn script(&self, events: Vec<StreamEvent>) {
        self.script.lock().unwrap().push_back(events);
    }

    /// Drops every producer, as if the server went away.
    pub fn hang_up(&self) {
        self.feeds.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn create_session(
        &self,
        user_id: &str,
        profile: &BirthProfile,
        first_message: &str
    ) -> Result<ChatResponse, ChatError> {
        self.record(format!("create:{}:{}:{}", user_id, profile.date, first_message));
        Ok(ChatResponse { chat_id: 7, message: String::new() })
    }

    async fn continue_session(
        &self,
        session_id: i64,
        message: &str,
        chart_type: ChartType,
        context_window: u32
    ) -> Result<ChatResponse, ChatError> {
        self.record(format!("continue:{}:{}:{:?}:{}", session_id, message, chart_type, context_window));
        if self.fail_continue.load(Ordering::SeqCst) {
            return Err(ChatError::request_failed("Continue chat", "HTTP 502 Bad Gateway"));
        }
        Ok(ChatResponse { chat_id: session_id, message: "inline".into() })
    }

    async fn fetch_session(&self, session_id: i64) -> Result<ChatSession, ChatError> {
        self.record(format!("fetch:{}", session_id));
        if session_id == 404 {
            return Err(ChatError::NotFound(session_id));
        }
        Ok(ChatSession {
            id: session_id,
            title: "Marriage timing".into(),
            messages: vec![ChatMessage::user("When?"), ChatMessage::assistant("After 2026.")],
            ..Default::default()
        })
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ChatError> {
        self.record(format!("list:{}", user_id));
        Ok(vec![ChatSession { id: 7, title: "Moon sign".into(), ..Default::default() }])
    }

    async fn open_stream(&self, session_id: i64) -> Result<Subscription, ChatError> {
        let previous_closed = self.feeds
            .lock()
            .unwrap()
            .iter()
            .all(|f| f.is_closed());
        self.record(format!("open:{}:previous_closed={}", session_id, previous_closed));

        let (subscription, feed) = Subscription::channel(session_id);
        let scripted = self.script.lock().unwrap().pop_front();
        for event in scripted.unwrap_or_default() {
            feed.send(Ok(event)).await;
        }
        self.feeds.lock().unwrap().push(Arc::new(feed));
        Ok(subscription)
    }
}
