use log::{ debug, warn };
use serde::{ Serialize, Deserialize };

pub const GENERIC_STREAM_ERROR: &str = "The consultation stream reported an error";

/// Frame as it arrives on `/ws/chat/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum StreamFrame {
    #[serde(rename = "chunk")] Chunk {
        #[serde(default)]
        content: String,
    },
    /// Older servers send text under this tag.
    #[serde(rename = "message")] Message {
        #[serde(default)]
        content: String,
    },
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "error")] Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Complete,
    Error(String),
}

impl StreamEvent {
    /// Normalises a frame to an event. `chunk` is the canonical text tag;
    /// the older `message` tag decodes to the same event. Unknown tags yield
    /// `None`.
    pub fn from_frame(frame: StreamFrame) -> Option<Self> {
        match frame {
            StreamFrame::Chunk { content } => Some(StreamEvent::Chunk(content)),
            StreamFrame::Message { content } => {
                debug!("Normalising legacy 'message' frame to chunk");
                Some(StreamEvent::Chunk(content))
            }
            StreamFrame::Complete => Some(StreamEvent::Complete),
            StreamFrame::Error { content } => {
                let reason = content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_STREAM_ERROR.to_string());
                Some(StreamEvent::Error(reason))
            }
            StreamFrame::Unknown => {
                warn!("Ignoring stream frame with unknown type");
                None
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk(_))
    }
}
