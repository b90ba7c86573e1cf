//! Folding of streamed assistant output into the visible conversation.
//!
//! [`Reconciler`] is the synchronous state machine (no IO); the
//! [`ChatController`] drives it from the API client and stream events.

mod controller;
mod state;
mod transcript;

pub use controller::{ Activity, ChatController, Update };
pub use state::{ Fold, Phase, Reconciler, TurnAccumulator };
pub use transcript::{ Entry, Transcript, TurnId };
