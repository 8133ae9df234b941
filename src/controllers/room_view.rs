use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::{is_room_creator, Effects, Route};
use crate::api::ApiClient;
use crate::models::{PostId, Room, RoomId};
use crate::realtime::{RealtimeClient, RealtimeEvent, RoomCommand};

/// Entry in the start-video picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoChoice {
    pub id: PostId,
    pub title: String,
}

/// Inside a watch-party room: membership, the video picker and live events.
pub struct RoomViewController {
    api: ApiClient,
    realtime: RealtimeClient,
    events: Option<broadcast::Receiver<RealtimeEvent>>,
    pub room_id: RoomId,
    pub room: Option<Room>,
    pub loading: bool,
    pub error: Option<String>,
    pub available_videos: Vec<VideoChoice>,
    pub selected_video: Option<PostId>,
    pub connected: bool,
    pub effects: Effects,
}

impl RoomViewController {
    pub fn new(api: ApiClient, realtime: RealtimeClient, room_id: RoomId) -> Self {
        Self {
            api,
            realtime,
            events: None,
            room_id,
            room: None,
            loading: false,
            error: None,
            available_videos: Vec::new(),
            selected_video: None,
            connected: false,
            effects: Effects::default(),
        }
    }

    /// Connect, announce ourselves, then load the room and the video picker.
    pub async fn activate(&mut self) {
        self.connect().await;
        self.load_room().await;
        self.load_available_videos().await;
    }

    /// Connect and, once ready, subscribe and announce the join.
    pub async fn connect(&mut self) {
        let mut ready = false;
        if let Err(e) = self.realtime.connect(|| ready = true).await {
            tracing::error!("Watch party connection failed: {}", e);
            self.effects
                .alert(format!("Could not connect to the watch party: {}", e));
            return;
        }
        if ready {
            self.on_connected().await;
        }
    }

    async fn on_connected(&mut self) {
        self.connected = true;
        // Receiver first so our own join echo is observed.
        self.events = Some(self.realtime.events());

        if let Err(e) = self.realtime.subscribe_to_room(self.room_id).await {
            tracing::error!("Subscribing to room {} failed: {}", self.room_id, e);
            self.effects
                .alert(format!("Could not subscribe to the room: {}", e));
            return;
        }
        if let Err(e) = self.realtime.publish(self.room_id, RoomCommand::Join).await {
            tracing::warn!("Announcing join failed: {}", e);
        }
    }

    pub async fn load_room(&mut self) {
        self.loading = true;
        match self.api.room(self.room_id).await {
            Ok(room) => {
                self.room = Some(room);
                self.error = None;
            }
            Err(e) => {
                tracing::warn!("Loading room {} failed: {}", self.room_id, e);
                self.error = Some("Room not found.".into());
            }
        }
        self.loading = false;
    }

    pub async fn load_available_videos(&mut self) {
        match self.api.posts().await {
            Ok(posts) => {
                self.available_videos = posts
                    .into_iter()
                    .map(|post| VideoChoice {
                        id: post.id,
                        title: post.title,
                    })
                    .collect();
            }
            Err(e) => {
                tracing::warn!("Loading videos failed: {}", e);
                self.available_videos.clear();
                self.effects.alert("Could not load videos. Please try again.");
            }
        }
    }

    /// Wait for the next event; `None` once the page stopped listening.
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        let events = self.events.as_mut()?;
        loop {
            match events.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} room events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Handle every event already queued. Returns how many were handled.
    pub async fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(events) = self.events.as_mut() else {
                return handled;
            };
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} room events", skipped);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return handled,
            };
            self.handle_event(event).await;
            handled += 1;
        }
    }

    pub async fn handle_event(&mut self, event: RealtimeEvent) {
        if event.room_id() != self.room_id {
            tracing::debug!("Ignoring event for room {}", event.room_id());
            return;
        }

        match event {
            RealtimeEvent::VideoStarted {
                post_id,
                post_title,
                started_by,
                ..
            } => {
                tracing::info!("{} started post {}", started_by, post_id);
                self.effects
                    .notify(format!("{} started the video: {}", started_by, post_title));
                self.effects.navigate(Route::Video(post_id));
            }
            RealtimeEvent::UserJoined { username, .. } => {
                self.effects.notify(format!("{} joined the room!", username));
                self.load_room().await;
            }
            RealtimeEvent::UserLeft { username, .. } => {
                self.effects.notify(format!("{} left the room.", username));
                self.load_room().await;
            }
            RealtimeEvent::RoomClosed { closed_by, .. } => {
                self.effects
                    .alert(format!("The room was closed by {}.", closed_by));
                self.effects.navigate(Route::Home);
            }
            RealtimeEvent::Error { message, .. } => {
                self.effects.alert(format!(
                    "Error: {}",
                    message.as_deref().unwrap_or("unknown error")
                ));
            }
        }
    }

    pub fn select_video(&mut self, id: PostId) {
        self.selected_video = Some(id);
    }

    pub async fn start_video(&mut self) -> bool {
        let Some(post_id) = self.selected_video else {
            self.effects.alert("Select a video first!");
            return false;
        };
        match self
            .realtime
            .publish(self.room_id, RoomCommand::StartVideo { post_id })
            .await
        {
            Ok(()) => {
                tracing::info!("Requested start of post {} in room {}", post_id, self.room_id);
                true
            }
            Err(e) => {
                self.effects.alert(format!("Could not start the video: {}", e));
                false
            }
        }
    }

    /// Tell the room, leave over REST, go back to the list either way.
    pub async fn leave_room(&mut self) {
        if self.connected {
            if let Err(e) = self.realtime.publish(self.room_id, RoomCommand::Leave).await {
                tracing::warn!("Announcing leave failed: {}", e);
            }
        }
        if let Err(e) = self.api.leave_room(self.room_id).await {
            tracing::warn!("Leaving room {} failed: {}", self.room_id, e);
        }
        self.effects.navigate(Route::RoomList);
    }

    /// Creator only. Members are evicted by the close broadcast.
    pub async fn close_room(&mut self) -> bool {
        if let Err(e) = self.api.close_room(self.room_id).await {
            tracing::warn!("Closing room {} failed: {}", self.room_id, e);
            self.effects.alert(e.message_or("Could not close the room."));
            return false;
        }
        if self.connected {
            if let Err(e) = self.realtime.publish(self.room_id, RoomCommand::Close).await {
                tracing::warn!("Broadcasting close failed: {}", e);
            }
        }
        self.effects.navigate(Route::RoomList);
        true
    }

    pub fn is_creator(&self) -> bool {
        self.room
            .as_ref()
            .is_some_and(|room| is_room_creator(self.api.session(), room))
    }

    /// Leaving the page: say goodbye, stop listening, drop the connection.
    pub async fn deactivate(&mut self) {
        if self.connected && self.realtime.is_connected() {
            if let Err(e) = self.realtime.publish(self.room_id, RoomCommand::Leave).await {
                tracing::warn!("Announcing leave failed: {}", e);
            }
        }
        self.events = None;
        if let Err(e) = self.realtime.unsubscribe().await {
            tracing::debug!("Unsubscribe failed: {}", e);
        }
        self.realtime.disconnect().await;
        self.connected = false;
    }
}
