mod http;
mod stream;
#[cfg(test)]
pub mod testing;

pub use http::AstrologyClient;
pub use stream::{ connect, EventFeed, EventResult, Subscription };

use crate::error::ChatError;
use crate::models::api::{ ChartType, ChatResponse };
use crate::models::chat::ChatSession;
use crate::models::profile::BirthProfile;
use async_trait::async_trait;

/// Remote consultation service. Request operations resolve once; the stream
/// operation returns a live [`Subscription`].
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn create_session(
        &self,
        user_id: &str,
        profile: &BirthProfile,
        first_message: &str
    ) -> Result<ChatResponse, ChatError>;

    async fn continue_session(
        &self,
        session_id: i64,
        message: &str,
        chart_type: ChartType,
        context_window: u32
    ) -> Result<ChatResponse, ChatError>;

    async fn fetch_session(&self, session_id: i64) -> Result<ChatSession, ChatError>;

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, ChatError>;

    async fn open_stream(&self, session_id: i64) -> Result<Subscription, ChatError>;
}
