use chrono::{ DateTime, NaiveDate, NaiveDateTime, Utc };
use serde::{ Serialize, Deserialize };

pub const DEFAULT_TITLE: &str = "New Consultation";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A conversation thread as cached from the server. Timestamps stay as the
/// server sent them; see [`relative_day_label`] for display.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ChatSession {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() { DEFAULT_TITLE } else { &self.title }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatListResponse {
    pub chats: Vec<ChatSession>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Renders a server timestamp relative to `now` in whole days, the way the
/// session sidebar shows it. Unparsable input is returned unchanged.
pub fn relative_day_label(raw: &str, now: DateTime<Utc>) -> String {
    let Some(date) = parse_timestamp(raw) else {
        return raw.to_string();
    };
    let days = (date - now.date_naive()).num_days();
    match days {
        0 => "today".to_string(),
        -1 => "yesterday".to_string(),
        1 => "tomorrow".to_string(),
        d if d < 0 => format!("{} days ago", -d),
        d => format!("in {} days", d),
    }
}
