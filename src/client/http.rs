use super::{ stream, ChatApi, Subscription };
use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::models::api::{ ChartType, ChatResponse, ContinueChatRequest, CreateChatRequest };
use crate::models::chat::{ ChatListResponse, ChatSession };
use crate::models::profile::BirthProfile;
use async_trait::async_trait;
use log::{ debug, error };
use reqwest::{ Client as HttpClient, RequestBuilder, StatusCode };
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub struct AstrologyClient {
    http: HttpClient,
    base_url: String,
    ws_url: String,
    in_flight: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

impl AstrologyClient {
    pub fn new(
        base_url: impl Into<String>,
        ws_url: impl Into<String>,
        timeout: Option<Duration>
    ) -> Result<Self, ChatError> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ChatError::request_failed("Build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            in_flight: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ChatError> {
        Self::new(config.base_url.as_str(), config.ws_url.as_str(), config.request_timeout)
    }

    /// True while at least one request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    pub fn stream_url(&self, session_id: i64) -> String {
        format!("{}/ws/chat/{}", self.ws_url, session_id)
    }

    /// `GET /api/chats/{user}` with the user id percent-encoded as one
    /// path segment.
    fn list_url(&self, user_id: &str) -> Result<Url, ChatError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ChatError::request_failed("List chats", e))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::request_failed("List chats", "base URL cannot take a path"))?
            .pop_if_empty()
            .extend(["api", "chats", user_id]);
        Ok(url)
    }

    async fn track<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ChatError>
        where F: Future<Output = Result<T, ChatError>>
    {
        let result = {
            let _in_flight = InFlight::enter(&self.in_flight);
            fut.await
        };

        let mut last_error = self.last_error.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &result {
            Ok(_) => {
                *last_error = None;
            }
            Err(e) => {
                error!("{} request failed: {}", operation, e);
                *last_error = Some(e.to_string());
            }
        }
        result
    }
}

/// Counts one outstanding request until dropped, including when the request
/// future is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn send_json<T: DeserializeOwned>(
    operation: &'static str,
    req: RequestBuilder
) -> Result<T, ChatError> {
    let resp = req.send().await.map_err(|e| ChatError::request_failed(operation, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ChatError::request_failed(operation, format!("HTTP {}", status)));
    }
    resp.json::<T>().await.map_err(|e|
        ChatError::request_failed(operation, format!("invalid response body: {}", e))
    )
}

#[async_trait]
impl ChatApi for AstrologyClient {
    async fn create_session(
        &self,
        user_id: &str,
        profile: &BirthProfile,
        first_message: &str
    ) -> Result<ChatResponse, ChatError> {
        let body = CreateChatRequest {
            user_id: user_id.to_string(),
            birth_date: profile.date.clone(),
            birth_time: profile.time.clone(),
            latitude: profile.latitude,
            longitude: profile.longitude,
            message: first_message.to_string(),
        };
        let req = self.http.post(self.url("/api/chat/new")).json(&body);
        let resp: ChatResponse = self.track("Create chat", send_json("Create chat", req)).await?;
        debug!("Created chat {} for user {}", resp.chat_id, user_id);
        Ok(resp)
    }

    async fn continue_session(
        &self,
        session_id: i64,
        message: &str,
        chart_type: ChartType,
        context_window: u32
    ) -> Result<ChatResponse, ChatError> {
        let body = ContinueChatRequest {
            message: message.to_string(),
            chart_type,
            context_window,
        };
        let req = self.http.post(self.url(&format!("/api/chat/{}/continue", session_id))).json(&body);
        self.track("Continue chat", send_json("Continue chat", req)).await
    }

    async fn fetch_session(&self, session_id: i64) -> Result<ChatSession, ChatError> {
        let url = self.url(&format!("/api/chat/{}", session_id));
        let fut = async {
            let resp = self.http
                .get(&url)
                .send().await
                .map_err(|e| ChatError::request_failed("Fetch chat", e))?;
            if resp.status() == StatusCode::NOT_FOUND {
                return Err(ChatError::NotFound(session_id));
            }
            if !resp.status().is_success() {
                return Err(ChatError::request_failed("Fetch chat", format!("HTTP {}", resp.status())));
            }
            resp.json::<ChatSession>().await.map_err(|e|
                ChatError::request_failed("Fetch chat", format!("invalid response body: {}", e))
            )
        };
        self.track("Fetch chat", fut).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ChatError> {
        let req = self.http.get(self.list_url(user_id)?);
        let list: ChatListResponse = self.track("List chats", send_json("List chats", req)).await?;
        Ok(list.chats)
    }

    async fn open_stream(&self, session_id: i64) -> Result<Subscription, ChatError> {
        stream::connect(&self.stream_url(session_id), session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slashes() {
        let client = AstrologyClient::new("http://astro.local/", "ws://astro.local/", None).unwrap();
        assert_eq!(client.url("/api/chat/new"), "http://astro.local/api/chat/new");
        assert_eq!(client.stream_url(9), "ws://astro.local/ws/chat/9");
        assert!(!client.is_loading());
        assert_eq!(client.last_error(), None);
    }

    #[test]
    fn list_url_encodes_the_user_id_as_one_segment() {
        let client = AstrologyClient::new("http://astro.local/", "ws://astro.local", None).unwrap();
        assert_eq!(client.list_url("user-123").unwrap().as_str(), "http://astro.local/api/chats/user-123");
        assert_eq!(client.list_url("a/b?c#d").unwrap().as_str(), "http://astro.local/api/chats/a%2Fb%3Fc%23d");

        let prefixed = AstrologyClient::new("https://astro.local/v2", "wss://astro.local", None).unwrap();
        assert_eq!(prefixed.list_url("u").unwrap().as_str(), "https://astro.local/v2/api/chats/u");
    }

    #[test]
    fn in_flight_guard_releases_on_drop() {
        let counter = AtomicUsize::new(0);
        let guard = InFlight::enter(&counter);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(guard);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
