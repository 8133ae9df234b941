use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{PostId, RoomId};

/// Events broadcast on a room topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealtimeEvent {
    #[serde(rename_all = "camelCase")]
    VideoStarted {
        room_id: RoomId,
        post_id: PostId,
        #[serde(default)]
        post_title: String,
        #[serde(default)]
        video_url: String,
        #[serde(default)]
        started_by: String,
        #[serde(default)]
        timestamp: Option<NaiveDateTime>,
    },
    #[serde(rename_all = "camelCase")]
    UserJoined {
        room_id: RoomId,
        username: String,
        #[serde(default)]
        member_count: Option<u32>,
        #[serde(default)]
        timestamp: Option<NaiveDateTime>,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft {
        room_id: RoomId,
        username: String,
        #[serde(default)]
        timestamp: Option<NaiveDateTime>,
    },
    #[serde(rename_all = "camelCase")]
    RoomClosed {
        room_id: RoomId,
        #[serde(default)]
        closed_by: String,
        #[serde(default)]
        timestamp: Option<NaiveDateTime>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        room_id: RoomId,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        timestamp: Option<NaiveDateTime>,
    },
}

impl RealtimeEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            RealtimeEvent::VideoStarted { room_id, .. }
            | RealtimeEvent::UserJoined { room_id, .. }
            | RealtimeEvent::UserLeft { room_id, .. }
            | RealtimeEvent::RoomClosed { room_id, .. }
            | RealtimeEvent::Error { room_id, .. } => *room_id,
        }
    }

    /// Decode a MESSAGE body received on `topic_room`'s topic. Server error
    /// events carry no room id, so the topic's id is filled in.
    pub fn decode(body: &str, topic_room: RoomId) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(body)?;
        if let Some(object) = value.as_object_mut() {
            if object.get("roomId").map_or(true, |v| v.is_null()) {
                object.insert("roomId".to_string(), topic_room.get().into());
            }
        }
        serde_json::from_value(value)
    }
}

/// Client-to-server room actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCommand {
    StartVideo { post_id: PostId },
    Join,
    Leave,
    Close,
}

impl RoomCommand {
    pub fn action(&self) -> &'static str {
        match self {
            RoomCommand::StartVideo { .. } => "start-video",
            RoomCommand::Join => "join",
            RoomCommand::Leave => "leave",
            RoomCommand::Close => "close",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            RoomCommand::StartVideo { post_id } => serde_json::json!({ "postId": post_id }),
            _ => serde_json::json!({}),
        }
    }
}

pub fn room_topic(room_id: RoomId) -> String {
    format!("/topic/watch-party/{}", room_id)
}

pub fn command_destination(room_id: RoomId, command: &RoomCommand) -> String {
    format!("/app/watch-party/{}/{}", room_id, command.action())
}
