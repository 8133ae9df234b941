use reqwest::Method;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{CreateRoomRequest, Room, RoomId};

const ROOMS: &str = "watch-party";

impl ApiClient {
    pub async fn create_room(&self, name: &str) -> ClientResult<Room> {
        let url = self.endpoint(&["api", ROOMS, "create"])?;
        let body = CreateRoomRequest {
            name: name.to_string(),
        };
        self.send_json(self.request(Method::POST, url).json(&body))
            .await
    }

    pub async fn active_rooms(&self) -> ClientResult<Vec<Room>> {
        let url = self.endpoint(&["api", ROOMS, "active"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Rooms created by the current user.
    pub async fn my_rooms(&self) -> ClientResult<Vec<Room>> {
        let url = self.endpoint(&["api", ROOMS, "my-rooms"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Rooms the current user is a member of.
    pub async fn joined_rooms(&self) -> ClientResult<Vec<Room>> {
        let url = self.endpoint(&["api", ROOMS, "joined"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn room(&self, id: RoomId) -> ClientResult<Room> {
        let url = self.endpoint(&["api", ROOMS, &id.to_string()])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn join_room(&self, id: RoomId) -> ClientResult<Room> {
        let url = self.endpoint(&["api", ROOMS, &id.to_string(), "join"])?;
        self.send_json(self.request(Method::POST, url).json(&serde_json::json!({})))
            .await
    }

    pub async fn leave_room(&self, id: RoomId) -> ClientResult<Room> {
        let url = self.endpoint(&["api", ROOMS, &id.to_string(), "leave"])?;
        self.send_json(self.request(Method::POST, url).json(&serde_json::json!({})))
            .await
    }

    /// Only the creator may close a room.
    pub async fn close_room(&self, id: RoomId) -> ClientResult<Room> {
        let url = self.endpoint(&["api", ROOMS, &id.to_string(), "close"])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }
}
