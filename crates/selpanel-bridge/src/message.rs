//! JSON messages exchanged with consumers over the WebSocket.

use selpanel_frame::MediaId;
use serde::{Deserialize, Serialize};

/// Server-to-consumer broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Broadcast {
    /// Stop whatever is playing.
    Stop,
    /// Start playback of one media id.
    Play {
        #[serde(serialize_with = "serialize_media_id")]
        id: MediaId,
    },
}

impl Broadcast {
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn serialize_media_id<S: serde::Serializer>(id: &MediaId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(id.get())
}

/// Consumer-to-server message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConsumerMessage {
    /// Playback of `id` finished on the consumer.
    Ended { id: i64 },
    /// Keepalive; no reply is sent.
    Ping,
}

impl ConsumerMessage {
    /// Parse one text frame. Unknown types and malformed JSON are errors;
    /// callers log and ignore them.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
