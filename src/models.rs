// Wire types shared by the REST clients and controllers
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(UserId);
id_type!(PostId);
id_type!(CommentId);
id_type!(
    /// Identifier of a watch-party room.
    RoomId
);

/// The logged in user as returned by `/auth/login` and `/auth/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub activated: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBasic {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub user: UserBasic,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub username: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// One page of comments, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub content: Vec<Comment>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub number: u32,
    pub size: u32,
    pub first: bool,
    pub last: bool,
    #[serde(default)]
    pub number_of_elements: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCreator {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPost {
    pub id: PostId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Snapshot of a watch-party room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub creator: RoomCreator,
    #[serde(default)]
    pub current_post: Option<RoomPost>,
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub member_count: Option<u32>,
}

impl Room {
    /// The stored user key may hold either a username or an email, so both
    /// creator fields are compared.
    pub fn is_creator(&self, user_key: &str) -> bool {
        self.creator.username == user_key || self.creator.email == user_key
    }

    /// The creator is always a member, listed or not.
    pub fn is_member(&self, user_key: &str) -> bool {
        if self.is_creator(user_key) {
            return true;
        }
        self.members
            .iter()
            .any(|member| member == user_key || member.eq_ignore_ascii_case(user_key))
    }

    pub fn has_current_video(&self) -> bool {
        self.current_post.is_some()
    }

    /// Server supplied count when present, otherwise the listed members.
    pub fn member_count(&self) -> u32 {
        self.member_count
            .unwrap_or_else(|| u32::try_from(self.members.len()).unwrap_or(u32::MAX))
    }
}

// --- Requests ---

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type", default = "bearer")]
    pub token_type: String,
    pub user: Identity,
}

fn bearer() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub liked: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub post_id: PostId,
    pub is_liked: bool,
}

/// Fields of a video upload; files are attached by the posts client.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub location: Option<GeoLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
}
