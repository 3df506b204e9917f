//! Signaling message schema
//!
//! The rendezvous service carries JSON text messages discriminated by a
//! `type` field. Anything that does not decode into one of the variants
//! below (missing `type`, unknown `type`, an `answer` without `sdp`,
//! malformed JSON) is dropped by the consumer: the channel may carry
//! unrelated traffic and a bad message is never fatal.

use serde::{Deserialize, Serialize};

/// Messages exchanged over the signaling channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    /// Local offer addressed to the remote peer
    Offer {
        /// Target peer id
        id: String,
        /// Finalized local session description
        sdp: String,
    },

    /// Remote answer completing the handshake
    Answer {
        /// Remote session description
        sdp: String,
    },

    /// Remote peer asks for (re)negotiation
    Request,

    /// Remote peer signals it is ready to receive an offer
    Ready,
}

impl SignalMessage {
    /// Encode for the wire
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode from the wire; errors mean "drop the message"
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
