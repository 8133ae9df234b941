use std::str::FromStr;

use super::{is_room_creator, is_room_member, Effects, Route};
use crate::api::ApiClient;
use crate::models::{Room, RoomId};

pub const MAX_ROOM_NAME_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoomTab {
    #[default]
    All,
    Mine,
    Joined,
}

impl FromStr for RoomTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(RoomTab::All),
            "my" | "mine" => Ok(RoomTab::Mine),
            "joined" => Ok(RoomTab::Joined),
            other => Err(format!("unknown tab {:?}, expected all, my or joined", other)),
        }
    }
}

/// Trimmed room name, or the reason it is unusable.
pub fn validate_room_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Room name cannot be empty!".into());
    }
    if name.chars().count() > MAX_ROOM_NAME_CHARS {
        return Err(format!(
            "Room name can be at most {} characters!",
            MAX_ROOM_NAME_CHARS
        ));
    }
    Ok(name.to_string())
}

pub struct RoomListController {
    api: ApiClient,
    pub rooms: Vec<Room>,
    pub tab: RoomTab,
    pub loading: bool,
    pub error: Option<String>,
    pub show_create: bool,
    pub new_room_name: String,
    pub creating: bool,
    pub effects: Effects,
}

impl RoomListController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            rooms: Vec::new(),
            tab: RoomTab::All,
            loading: false,
            error: None,
            show_create: false,
            new_room_name: String::new(),
            creating: false,
            effects: Effects::default(),
        }
    }

    pub async fn activate(&mut self) {
        self.switch_tab(RoomTab::All).await;
    }

    pub async fn switch_tab(&mut self, tab: RoomTab) {
        self.tab = tab;
        self.loading = true;
        self.error = None;

        let result = match tab {
            RoomTab::All => self.api.active_rooms().await,
            RoomTab::Mine => self.api.my_rooms().await,
            RoomTab::Joined => self.api.joined_rooms().await,
        };
        match result {
            Ok(rooms) => self.rooms = rooms,
            Err(e) => {
                tracing::warn!("Loading {:?} rooms failed: {}", tab, e);
                self.error = Some(match tab {
                    RoomTab::All => "Could not load rooms. Please try again.".into(),
                    _ => "Could not load rooms.".into(),
                });
            }
        }
        self.loading = false;
    }

    pub fn open_create(&mut self) {
        self.show_create = true;
        self.new_room_name.clear();
        self.error = None;
    }

    pub fn close_create(&mut self) {
        self.show_create = false;
        self.new_room_name.clear();
        self.error = None;
    }

    /// Create a room and enter it.
    pub async fn create_room(&mut self) -> Option<Room> {
        let name = match validate_room_name(&self.new_room_name) {
            Ok(name) => name,
            Err(message) => {
                self.error = Some(message);
                return None;
            }
        };

        self.creating = true;
        self.error = None;
        let result = self.api.create_room(&name).await;
        self.creating = false;

        match result {
            Ok(room) => {
                tracing::info!("Created room {} ({})", room.id, room.name);
                self.close_create();
                self.effects.navigate(Route::Room(room.id));
                Some(room)
            }
            Err(e) => {
                tracing::warn!("Creating room failed: {}", e);
                self.error = Some(e.message_or("Could not create the room. Please try again."));
                None
            }
        }
    }

    pub async fn join_room(&mut self, id: RoomId) -> bool {
        match self.api.join_room(id).await {
            Ok(_) => {
                self.effects.navigate(Route::Room(id));
                true
            }
            Err(e) => {
                tracing::warn!("Joining room {} failed: {}", id, e);
                self.effects.alert(format!(
                    "Could not join the room: {}",
                    e.message_or("Unknown error")
                ));
                false
            }
        }
    }

    pub fn is_creator(&self, room: &Room) -> bool {
        is_room_creator(self.api.session(), room)
    }

    pub fn is_member(&self, room: &Room) -> bool {
        is_room_member(self.api.session(), room)
    }

    pub fn has_current_video(&self, room: &Room) -> bool {
        room.has_current_video()
    }
}
