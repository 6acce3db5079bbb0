use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::MessageElement;

#[derive(Debug, thiserror::Error)]
#[error("unknown {what}: {value:?}")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

// -- Conversations --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Dm,
    Group,
    Room,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
            Self::Room => "room",
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dm" => Ok(Self::Dm),
            "group" => Ok(Self::Group),
            "room" => Ok(Self::Room),
            other => Err(UnknownVariant {
                what: "conversation type",
                value: other.to_string(),
            }),
        }
    }
}

/// Denormalized summary of a conversation.
/// `last_seq` never regresses; `last_message` is the preview of that message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub conversation_type: ConversationType,
    pub participants: Vec<String>,
    pub last_seq: i64,
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
}

// -- Messages --

/// Message type tag that carries character attribution.
pub const CHARACTER_MESSAGE_TYPE: &str = "character";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub character_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub conversation_id: String,
    pub conversation_type: ConversationType,
    pub seq: i64,
    pub sender_user_id: String,
    pub message_type: String,
    pub element: MessageElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_info: Option<CharacterInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// -- Relations --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownVariant {
                what: "request status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondAction {
    Accept,
    Reject,
}

impl RespondAction {
    /// Terminal status a pending request moves to.
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Self::Accept => RequestStatus::Accepted,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub requester_id: String,
    pub recipient_id: String,
    pub greeting: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendEdge {
    pub user_a: String,
    pub user_b: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEdge {
    pub user_id: String,
    pub blocked_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Two user ids in a fixed orientation: the lexicographically smaller id is
/// always `low`. Undirected relations are stored and looked up through this
/// so either side of the pair resolves to the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPair {
    low: String,
    high: String,
}

impl CanonicalPair {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn is_self_pair(&self) -> bool {
        self.low == self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_is_orientation_free() {
        let ab = CanonicalPair::new("alice", "bob");
        let ba = CanonicalPair::new("bob", "alice");
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), "alice");
        assert_eq!(ab.high(), "bob");
        assert!(!ab.is_self_pair());
        assert!(CanonicalPair::new("u1", "u1").is_self_pair());
    }

    #[test]
    fn canonical_pair_uses_byte_order() {
        // Uppercase sorts before lowercase.
        let pair = CanonicalPair::new("b", "B");
        assert_eq!(pair.low(), "B");
    }

    #[test]
    fn conversation_type_round_trips_through_str() {
        for t in [ConversationType::Dm, ConversationType::Group, ConversationType::Room] {
            assert_eq!(t.as_str().parse::<ConversationType>().unwrap(), t);
        }
        assert!("channel".parse::<ConversationType>().is_err());
    }

    #[test]
    fn respond_action_targets_terminal_status() {
        assert_eq!(RespondAction::Accept.target_status(), RequestStatus::Accepted);
        assert_eq!(RespondAction::Reject.target_status(), RequestStatus::Rejected);
    }
}
