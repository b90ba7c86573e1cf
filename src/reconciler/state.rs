use super::transcript::{ Transcript, TurnId };
use crate::models::chat::ChatMessage;
use crate::models::websocket::StreamEvent;
use crate::sanitize::{ sanitize, settled_prefix };
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed(String),
}

impl Phase {
    pub fn is_sending(&self) -> bool {
        matches!(self, Phase::Sending | Phase::Streaming)
    }
}

/// Raw text received so far for the in-flight turn.
#[derive(Debug, Clone)]
pub struct TurnAccumulator {
    turn: TurnId,
    raw: String,
    chunks: usize,
}

impl TurnAccumulator {
    pub fn new(turn: TurnId) -> Self {
        Self { turn, raw: String::new(), chunks: 0 }
    }

    pub fn turn(&self) -> TurnId {
        self.turn
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn push(&mut self, text: &str) {
        self.raw.push_str(text);
        self.chunks += 1;
    }

    /// What to show while more text may still arrive.
    pub fn preview(&self) -> String {
        sanitize(settled_prefix(&self.raw))
    }

    pub fn finish(&self) -> String {
        sanitize(&self.raw)
    }
}

/// Result of folding one stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum Fold {
    Reply {
        turn: TurnId,
        content: String,
    },
    Completed {
        turn: TurnId,
        content: Option<String>,
    },
    Failed {
        turn: TurnId,
        reason: String,
    },
    Ignored,
}

/// Send-flow state machine over a [`Transcript`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    transcript: Transcript,
    phase: Phase,
    turn: Option<TurnAccumulator>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::with_history(Vec::new())
    }

    pub fn with_history(messages: Vec<ChatMessage>) -> Self {
        Self {
            transcript: Transcript::from_history(messages),
            phase: Phase::Idle,
            turn: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_sending(&self) -> bool {
        self.phase.is_sending()
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        self.turn.as_ref().map(|t| t.turn())
    }

    /// Appends the user's message and enters `Sending`. Blank input, or
    /// input while a send is in flight, changes nothing.
    pub fn begin_send(&mut self, input: &str) -> Option<TurnId> {
        let text = input.trim();
        if text.is_empty() || self.is_sending() {
            return None;
        }
        let turn = self.transcript.begin_turn(text);
        self.turn = Some(TurnAccumulator::new(turn));
        self.phase = Phase::Sending;
        Some(turn)
    }

    pub fn start_streaming(&mut self) {
        if self.phase == Phase::Sending {
            self.phase = Phase::Streaming;
        }
    }

    pub fn apply(&mut self, event: StreamEvent) -> Fold {
        if !self.is_sending() {
            debug!("Ignoring {:?} outside of a send", event);
            return Fold::Ignored;
        }
        let Some(acc) = self.turn.as_mut() else {
            return Fold::Ignored;
        };
        let turn = acc.turn();

        match event {
            StreamEvent::Chunk(text) => {
                acc.push(&text);
                let content = acc.preview();
                self.transcript.set_reply(turn, &content);
                self.phase = Phase::Streaming;
                Fold::Reply { turn, content }
            }
            StreamEvent::Complete => {
                let content = if acc.chunks() > 0 {
                    Some(acc.finish()).filter(|c| !c.is_empty())
                } else {
                    None
                };
                match &content {
                    Some(text) => self.transcript.set_reply(turn, text),
                    None => {
                        self.transcript.remove_reply(turn);
                    }
                }
                self.turn = None;
                self.phase = Phase::Completed;
                Fold::Completed { turn, content }
            }
            StreamEvent::Error(reason) => {
                self.fail(reason.clone());
                Fold::Failed { turn, reason }
            }
        }
    }

    /// Ends the send with an error. The turn's assistant output is
    /// discarded; the user's message stays.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if let Some(acc) = self.turn.take() {
            self.transcript.remove_reply(acc.turn());
        }
        self.phase = Phase::Failed(reason.into());
    }

    /// Drops any in-flight turn output without reporting a failure.
    pub fn abandon(&mut self) {
        if let Some(acc) = self.turn.take() {
            self.transcript.remove_reply(acc.turn());
        }
        self.phase = Phase::Idle;
    }

    pub fn reset(&mut self, history: Vec<ChatMessage>) {
        *self = Self::with_history(history);
    }
}
