use crate::models::chat::{ ChatMessage, Role };
use std::sync::Arc;

/// Identifies one user message and the assistant reply it produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub turn: TurnId,
    pub message: ChatMessage,
}

/// Ordered message list. Readers take cheap [`snapshot`](Self::snapshot)s
/// that are never mutated afterwards; writers copy on write.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Arc<Vec<Entry>>,
    next_turn: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds turns from a server history: every user message opens a
    /// turn, assistant messages attach to the latest one.
    pub fn from_history(messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut transcript = Self::new();
        let mut current: Option<TurnId> = None;
        let mut entries = Vec::new();
        for message in messages {
            let turn = match (message.role, current) {
                (Role::Assistant, Some(turn)) => turn,
                _ => {
                    let turn = transcript.allocate();
                    current = Some(turn);
                    turn
                }
            };
            entries.push(Entry { turn, message });
        }
        transcript.entries = Arc::new(entries);
        transcript
    }

    fn allocate(&mut self) -> TurnId {
        let turn = TurnId(self.next_turn);
        self.next_turn += 1;
        turn
    }

    pub fn snapshot(&self) -> Arc<Vec<Entry>> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn begin_turn(&mut self, user_text: &str) -> TurnId {
        let turn = self.allocate();
        Arc::make_mut(&mut self.entries).push(Entry {
            turn,
            message: ChatMessage::user(user_text),
        });
        turn
    }

    fn reply_index(&self, turn: TurnId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.turn == turn && e.message.role == Role::Assistant)
    }

    pub fn reply(&self, turn: TurnId) -> Option<&str> {
        self.reply_index(turn).map(|i| self.entries[i].message.content.as_str())
    }

    /// Creates the turn's assistant message or replaces its content.
    pub fn set_reply(&mut self, turn: TurnId, content: &str) {
        match self.reply_index(turn) {
            Some(i) => {
                let entries = Arc::make_mut(&mut self.entries);
                entries[i].message.content = content.to_string();
            }
            None => {
                let entries = Arc::make_mut(&mut self.entries);
                let insert_at = entries
                    .iter()
                    .rposition(|e| e.turn == turn)
                    .map(|i| i + 1)
                    .unwrap_or(entries.len());
                entries.insert(insert_at, Entry {
                    turn,
                    message: ChatMessage::assistant(content),
                });
            }
        }
    }

    pub fn remove_reply(&mut self, turn: TurnId) -> bool {
        match self.reply_index(turn) {
            Some(i) => {
                Arc::make_mut(&mut self.entries).remove(i);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_are_keyed_by_turn_not_position() {
        let mut t = Transcript::new();
        let first = t.begin_turn("first");
        let second = t.begin_turn("second");
        t.set_reply(first, "late answer");
        let roles: Vec<_> = t.messages().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(roles, vec![
            (Role::User, "first"),
            (Role::Assistant, "late answer"),
            (Role::User, "second"),
        ]);
        assert_eq!(t.reply(second), None);
    }

    #[test]
    fn snapshots_are_immutable() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("q");
        t.set_reply(turn, "a");
        let before = t.snapshot();
        t.set_reply(turn, "ab");
        assert_eq!(before[1].message.content, "a");
        assert_eq!(t.reply(turn), Some("ab"));
    }

    #[test]
    fn history_groups_messages_into_turns() {
        let t = Transcript::from_history(vec![
            ChatMessage::assistant("Welcome"),
            ChatMessage::user("q1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("q2"),
        ]);
        let snap = t.snapshot();
        assert_ne!(snap[0].turn, snap[1].turn);
        assert_eq!(snap[1].turn, snap[2].turn);
        assert_ne!(snap[2].turn, snap[3].turn);

        let mut t = t;
        let next = t.begin_turn("q3");
        assert!(snap.iter().all(|e| e.turn != next));
    }

    #[test]
    fn remove_reply_only_touches_assistant_entry() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("q");
        assert!(!t.remove_reply(turn));
        t.set_reply(turn, "");
        assert!(t.remove_reply(turn));
        assert_eq!(t.len(), 1);
    }
}
