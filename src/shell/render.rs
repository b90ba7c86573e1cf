use crate::models::chat::{ relative_day_label, ChatMessage, ChatSession, Role };
use crate::models::profile::BirthProfile;
use chrono::{ DateTime, Utc };

pub const ASSISTANT_LABEL: &str = "Astrologer: ";
pub const USER_LABEL: &str = "You: ";

pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "What does my birth chart say about my career?",
    "When is a favourable time for marriage?",
    "Which planets are strongest in my chart?",
    "What does my moon sign say about my temperament?",
    "Is this a good year to change jobs or relocate?",
    "Which remedies would ease my current Saturn period?",
];

pub const HELP: &str = "\
Commands:
  /new          start a new consultation
  /list         show your previous consultations
  /open <id>    continue a previous consultation
  /profile      re-enter your birth details
  /suggest [n]  list suggested questions, or ask number n
  /help         show this help
  /quit         leave
Anything else is sent to the astrologer.";

pub fn message_line(message: &ChatMessage) -> String {
    let label = match message.role {
        Role::User => USER_LABEL,
        Role::Assistant => ASSISTANT_LABEL,
    };
    format!("{}{}", label, message.content)
}

pub fn session_line(session: &ChatSession, current: Option<i64>, now: DateTime<Utc>) -> String {
    let marker = if current == Some(session.id) { '*' } else { ' ' };
    let label = relative_day_label(&session.updated_at, now);
    if label.is_empty() {
        format!("{} [{}] {}", marker, session.id, session.display_title())
    } else {
        format!("{} [{}] {} ({})", marker, session.id, session.display_title(), label)
    }
}

pub fn profile_line(profile: &BirthProfile) -> String {
    format!(
        "Born {} at {}, latitude {}, longitude {}",
        profile.date,
        profile.time,
        profile.latitude,
        profile.longitude
    )
}

pub fn suggestion_lines() -> impl Iterator<Item = String> {
    SUGGESTED_QUESTIONS.iter()
        .enumerate()
        .map(|(i, q)| format!("  {}. {}", i + 1, q))
}

/// How the terminal should change to show the latest reply content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Start(String),
    Extend(String),
    Rewrite(String),
    Unchanged,
}

/// Tracks what has already been printed of the in-flight reply so only the
/// new tail is written.
#[derive(Debug, Default)]
pub struct ReplyView {
    shown: Option<String>,
}

impl ReplyView {
    pub fn is_active(&self) -> bool {
        self.shown.is_some()
    }

    pub fn update(&mut self, content: &str) -> Delta {
        let delta = match self.shown.as_deref() {
            None if content.is_empty() => {
                return Delta::Unchanged;
            }
            None => Delta::Start(content.to_string()),
            Some(prev) if prev == content => {
                return Delta::Unchanged;
            }
            Some(prev) if content.starts_with(prev) => Delta::Extend(content[prev.len()..].to_string()),
            Some(_) => Delta::Rewrite(content.to_string()),
        };
        self.shown = Some(content.to_string());
        delta
    }

    /// Forgets the current reply. Returns whether anything had been printed.
    pub fn finish(&mut self) -> bool {
        self.shown.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_view_appends_extensions_and_rewrites_otherwise() {
        let mut view = ReplyView::default();
        assert_eq!(view.update(""), Delta::Unchanged);
        assert!(!view.is_active());
        assert_eq!(view.update("Mars"), Delta::Start("Mars".into()));
        assert_eq!(view.update("Mars is"), Delta::Extend(" is".into()));
        assert_eq!(view.update("Mars is"), Delta::Unchanged);
        assert_eq!(view.update("Venus"), Delta::Rewrite("Venus".into()));
        assert!(view.finish());
        assert!(!view.finish());
    }

    #[test]
    fn session_line_marks_current_and_falls_back_to_default_title() {
        let session = ChatSession { id: 3, ..Default::default() };
        let line = session_line(&session, Some(3), Utc::now());
        assert_eq!(line, "* [3] New Consultation");

        let dated = ChatSession {
            id: 4,
            title: "Moon sign".into(),
            updated_at: Utc::now().to_rfc3339(),
            ..Default::default()
        };
        assert_eq!(session_line(&dated, Some(3), Utc::now()), "  [4] Moon sign (today)");
    }

    #[test]
    fn messages_are_labelled_by_role() {
        assert_eq!(message_line(&ChatMessage::user("Hi")), "You: Hi");
        assert_eq!(message_line(&ChatMessage::assistant("Namaste")), "Astrologer: Namaste");
    }
}
