use serde::{Deserialize, Serialize};

use crate::element::MessageElement;
use crate::models::{BlockEdge, Conversation, ConversationType, FriendRequest, Message, RespondAction};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id every `/api` route acts as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Envelope --

/// Uniform success body: `{ code, message, data }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data,
        }
    }
}

// -- Messages --

fn default_message_type() -> String {
    "normal".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_type: ConversationType,
    pub conversation_id: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub element: MessageElement,
    #[serde(default)]
    pub character_id: Option<String>,
}

/// Body of `POST /api/room/{room_id}/message`. The room id comes from the path;
/// any conversation fields in the body are ignored.
#[derive(Debug, Deserialize)]
pub struct RoomMessageRequest {
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub element: MessageElement,
    #[serde(default)]
    pub character_id: Option<String>,
}

impl RoomMessageRequest {
    pub fn into_send(self, room_id: String) -> SendMessageRequest {
        SendMessageRequest {
            conversation_type: ConversationType::Room,
            conversation_id: room_id,
            message_type: self.message_type,
            element: self.element,
            character_id: self.character_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub seq: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub conversation_type: ConversationType,
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
}

// -- Relations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFriendRequestBody {
    pub user_id: String,
    #[serde(default)]
    pub greeting: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondFriendRequestBody {
    pub request_id: String,
    pub action: RespondAction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestCreated {
    pub request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestList {
    pub list: Vec<FriendRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendList {
    pub friends: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockList {
    pub list: Vec<BlockEdge>,
}
