//! A local stand-in for the platform backend: the REST endpoints the client
//! calls plus a STOMP broker on `/ws/websocket`, all served by axum on an
//! ephemeral port.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use watchparty::api::ApiClient;
use watchparty::config::{ApiConfig, RealtimeConfig};
use watchparty::models::{
    Comment, CommentId, CommentPage, Identity, Post, PostId, Room, RoomCreator, RoomId, RoomPost,
    UserBasic, UserId,
};
use watchparty::realtime::{room_topic, Frame, FrameCommand, RealtimeClient};
use watchparty::session::Session;

pub const COMMENT_PAGE_SIZE: usize = 2;

#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub activated: bool,
}

impl MockUser {
    fn identity(&self) -> Identity {
        Identity {
            id: UserId(self.id),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: None,
            last_name: None,
            address: None,
            activated: Some(self.activated),
            created_at: None,
        }
    }

    fn token(&self) -> String {
        format!("token-{}", self.username)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadRecord {
    pub fields: HashMap<String, String>,
    /// (field, file name, content type, size)
    pub files: Vec<(String, String, String, usize)>,
}

struct Peer {
    id: u64,
    outbox: mpsc::UnboundedSender<String>,
    user: String,
    subscriptions: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MockState {
    pub users: Vec<MockUser>,
    pub posts: Vec<Post>,
    /// Newest first, keyed by post.
    pub comments: HashMap<i64, Vec<Comment>>,
    pub likes: HashSet<(String, i64)>,
    pub rooms: Vec<Room>,
    pub uploads: Vec<UploadRecord>,
    /// `Authorization` header of every REST request, in order.
    pub authorization: Vec<Option<String>>,
    /// Every STOMP frame received from clients.
    pub frames: Vec<Frame>,
    peers: Vec<Peer>,
    next_id: i64,
    next_peer: u64,
    next_message: u64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_by_token(&self, headers: &HeaderMap) -> Option<MockUser> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        self.users.iter().find(|u| u.token() == token).cloned()
    }

    pub fn add_user(&mut self, username: &str, email: &str, password: &str) -> MockUser {
        let user = MockUser {
            id: self.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            activated: true,
        };
        self.users.push(user.clone());
        user
    }

    pub fn add_post(&mut self, author: &str, title: &str) -> PostId {
        let user_id = self
            .users
            .iter()
            .find(|u| u.username == author)
            .map_or(0, |u| u.id);
        let id = self.next_id();
        self.posts.push(Post {
            id: PostId(id),
            user: UserBasic {
                id: UserId(user_id),
                username: author.to_string(),
            },
            title: title.to_string(),
            description: None,
            video_url: format!("/api/videos/{}.mp4", id),
            thumbnail_url: format!("/api/thumbnails/{}.jpg", id),
            tags: BTreeSet::new(),
            latitude: None,
            longitude: None,
            location_name: None,
            likes_count: 0,
            comments_count: 0,
            views_count: 0,
            created_at: None,
        });
        PostId(id)
    }

    pub fn add_comment(&mut self, post_id: PostId, author: &str, text: &str) -> CommentId {
        let id = self.next_id();
        self.comments.entry(post_id.get()).or_default().insert(
            0,
            Comment {
                id: CommentId(id),
                text: text.to_string(),
                username: author.to_string(),
                created_at: None,
            },
        );
        if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
            post.comments_count += 1;
        }
        CommentId(id)
    }

    pub fn add_room(&mut self, creator: &str, name: &str) -> RoomId {
        let user = self.users.iter().find(|u| u.username == creator).cloned();
        let id = self.next_id();
        self.rooms.push(Room {
            id: RoomId(id),
            name: name.to_string(),
            creator: RoomCreator {
                id: UserId(user.as_ref().map_or(0, |u| u.id)),
                username: creator.to_string(),
                email: user.map(|u| u.email).unwrap_or_default(),
            },
            current_post: None,
            active: true,
            created_at: None,
            members: vec![creator.to_string()],
            member_count: None,
        });
        RoomId(id)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn frames(&self, command: FrameCommand) -> Vec<Frame> {
        self.frames
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    pub fn subscriptions(&self, destination: &str) -> usize {
        self.peers
            .iter()
            .flat_map(|p| p.subscriptions.iter())
            .filter(|(_, d)| d == destination)
            .count()
    }

    fn deliver(&mut self, destination: &str, body: &str) {
        for peer in &self.peers {
            for (id, dest) in &peer.subscriptions {
                if dest != destination {
                    continue;
                }
                self.next_message += 1;
                let frame = Frame::new(FrameCommand::Message)
                    .header("destination", destination)
                    .header("subscription", id.as_str())
                    .header("message-id", self.next_message.to_string())
                    .header("content-type", "application/json")
                    .with_body(body);
                let _ = peer.outbox.send(frame.encode());
            }
        }
    }
}

pub type Shared = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub origin: String,
    pub ws_url: String,
    state: Shared,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            origin: format!("http://{}", addr),
            ws_url: format!("ws://{}/ws/websocket", addr),
            state,
            task,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            origin: self.origin.clone(),
            timeout_secs: 5,
        }
    }

    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            url: self.ws_url.clone(),
            heartbeat_outgoing_ms: 0,
            heartbeat_incoming_ms: 0,
            handshake_timeout_ms: 2000,
            ..RealtimeConfig::default()
        }
    }

    /// A client with its own in-memory session.
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.api_config(), Session::in_memory()).unwrap()
    }

    pub fn realtime(&self, api: &ApiClient) -> RealtimeClient {
        RealtimeClient::websocket(self.realtime_config(), api.session().clone())
    }

    /// Register a user on the server and log a fresh client in as them.
    pub async fn logged_in(&self, username: &str) -> ApiClient {
        let email = format!("{}@example.com", username);
        self.state().add_user(username, &email, "password123");
        let api = self.client();
        api.login(&watchparty::models::LoginRequest {
            email,
            password: "password123".into(),
        })
        .await
        .unwrap();
        api
    }

    /// Poll the state until `check` holds; panics after two seconds.
    pub async fn wait_until(&self, check: impl Fn(&MockState) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if check(&self.state()) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "mock server never reached the expected state"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/activate", get(activate))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/user/{username}", get(user_posts))
        .route("/api/posts/{id}", get(get_post))
        .route("/api/posts/{id}/refresh", get(refresh_post))
        .route("/api/posts/{id}/like", post(like).delete(unlike))
        .route("/api/posts/{id}/like/status", get(like_status))
        .route(
            "/api/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/api/comments/{id}", delete(delete_comment))
        .route("/api/users/{username}", get(get_user))
        .route("/api/watch-party/create", post(create_room))
        .route("/api/watch-party/active", get(active_rooms))
        .route("/api/watch-party/my-rooms", get(my_rooms))
        .route("/api/watch-party/joined", get(joined_rooms))
        .route("/api/watch-party/{id}", get(get_room))
        .route("/api/watch-party/{id}/join", post(join_room))
        .route("/api/watch-party/{id}/leave", post(leave_room))
        .route("/api/watch-party/{id}/close", delete(close_room))
        .route("/ws/websocket", get(websocket))
        .with_state(state)
}

type Reply = Result<Response, (StatusCode, String)>;

fn unauthorized() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{} not found", what))
}

/// Record the Authorization header and resolve the caller.
fn caller(state: &mut MockState, headers: &HeaderMap) -> Option<MockUser> {
    state.authorization.push(
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
    state.user_by_token(headers)
}

// --- Auth ---

async fn login(State(state): State<Shared>, Json(body): Json<serde_json::Value>) -> Reply {
    let state = state.lock().unwrap();
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if email.starts_with("throttled") {
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too many login attempts".into()));
    }
    let user = state
        .users
        .iter()
        .find(|u| u.email == email && u.password == password)
        .ok_or((StatusCode::UNAUTHORIZED, "Bad credentials".to_string()))?;
    if !user.activated {
        return Err((StatusCode::FORBIDDEN, "Account is not activated".into()));
    }
    Ok(Json(json!({
        "token": user.token(),
        "type": "Bearer",
        "user": user.identity(),
    }))
    .into_response())
}

async fn register(State(state): State<Shared>, Json(body): Json<serde_json::Value>) -> Reply {
    let mut state = state.lock().unwrap();
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if state.users.iter().any(|u| u.username == username) {
        return Err((StatusCode::BAD_REQUEST, "Username already exists".into()));
    }
    let user = state.add_user(
        &username,
        &email,
        body["password"].as_str().unwrap_or_default(),
    );
    // New accounts wait for the activation link.
    let stored = state
        .users
        .iter_mut()
        .find(|u| u.id == user.id)
        .ok_or_else(|| not_found("User"))?;
    stored.activated = false;
    Ok(Json(stored.identity()).into_response())
}

#[derive(Deserialize)]
struct TokenQuery {
    token: String,
}

async fn activate(State(state): State<Shared>, Query(query): Query<TokenQuery>) -> Reply {
    let mut state = state.lock().unwrap();
    let Some(username) = query.token.strip_prefix("activate-") else {
        return Err((StatusCode::BAD_REQUEST, "Invalid activation token".into()));
    };
    let user = state
        .users
        .iter_mut()
        .find(|u| u.username == username)
        .ok_or((StatusCode::BAD_REQUEST, "Invalid activation token".to_string()))?;
    user.activated = true;
    Ok("Account activated successfully".into_response())
}

// --- Posts ---

async fn list_posts(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().unwrap();
    caller(&mut state, &headers);
    Ok(Json(state.posts.clone()).into_response())
}

async fn user_posts(State(state): State<Shared>, Path(username): Path<String>) -> Reply {
    let state = state.lock().unwrap();
    let posts: Vec<Post> = state
        .posts
        .iter()
        .filter(|p| p.user.username == username)
        .cloned()
        .collect();
    Ok(Json(posts).into_response())
}

async fn get_post(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    let mut state = state.lock().unwrap();
    let post = state
        .posts
        .iter_mut()
        .find(|p| p.id.get() == id)
        .ok_or_else(|| not_found("Post"))?;
    post.views_count += 1;
    Ok(Json(post.clone()).into_response())
}

async fn refresh_post(State(state): State<Shared>, Path(id): Path<i64>) -> Reply {
    let state = state.lock().unwrap();
    let post = state
        .posts
        .iter()
        .find(|p| p.id.get() == id)
        .ok_or_else(|| not_found("Post"))?;
    Ok(Json(post.clone()).into_response())
}

async fn create_post(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Reply {
    let user = {
        let mut state = state.lock().unwrap();
        caller(&mut state, &headers).ok_or_else(unauthorized)?
    };

    let mut record = UploadRecord::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        match file_name {
            Some(file_name) => record.files.push((name, file_name, content_type, bytes.len())),
            None => {
                record
                    .fields
                    .insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
        }
    }

    let mut state = state.lock().unwrap();
    let title = record.fields.get("title").cloned().unwrap_or_default();
    let id = state.add_post(&user.username, &title);
    let post = state
        .posts
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| not_found("Post"))?;
    post.description = record.fields.get("description").cloned();
    post.tags = record
        .fields
        .get("tags")
        .map(|t| t.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    post.latitude = record.fields.get("latitude").and_then(|v| v.parse().ok());
    post.longitude = record.fields.get("longitude").and_then(|v| v.parse().ok());
    post.location_name = record.fields.get("locationName").cloned();
    let post = post.clone();
    state.uploads.push(record);
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

async fn like(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    if !state.likes.insert((user.username, id)) {
        return Err((StatusCode::BAD_REQUEST, "Already liked".into()));
    }
    if let Some(post) = state.posts.iter_mut().find(|p| p.id.get() == id) {
        post.likes_count += 1;
    }
    Ok(Json(json!({"message": "Post liked", "liked": true})).into_response())
}

async fn unlike(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    if state.likes.remove(&(user.username, id)) {
        if let Some(post) = state.posts.iter_mut().find(|p| p.id.get() == id) {
            post.likes_count -= 1;
        }
    }
    Ok(Json(json!({"message": "Post unliked", "liked": false})).into_response())
}

async fn like_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let liked = state.likes.contains(&(user.username, id));
    Ok(Json(json!({"postId": id, "isLiked": liked})).into_response())
}

// --- Comments ---

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: usize,
}

async fn list_comments(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Reply {
    let state = state.lock().unwrap();
    let all = state.comments.get(&id).cloned().unwrap_or_default();
    let total = all.len();
    let total_pages = total.div_ceil(COMMENT_PAGE_SIZE).max(1);
    let content: Vec<Comment> = all
        .into_iter()
        .skip(query.page * COMMENT_PAGE_SIZE)
        .take(COMMENT_PAGE_SIZE)
        .collect();
    let page = CommentPage {
        number_of_elements: content.len() as u32,
        content,
        total_elements: total as i64,
        total_pages: total_pages as i64,
        number: query.page as u32,
        size: COMMENT_PAGE_SIZE as u32,
        first: query.page == 0,
        last: query.page + 1 >= total_pages,
    };
    Ok(Json(page).into_response())
}

async fn create_comment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<serde_json::Value>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let text = body["text"].as_str().unwrap_or_default().trim().to_string();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Comment text is required".into()));
    }
    if text.contains("spam") {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            "You are commenting too fast. Wait a minute.".into(),
        ));
    }
    let comment_id = state.add_comment(PostId(id), &user.username, &text);
    let comment = state.comments[&id]
        .iter()
        .find(|c| c.id == comment_id)
        .cloned()
        .ok_or_else(|| not_found("Comment"))?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

async fn delete_comment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let mut removed_from = None;
    for (post_id, comments) in state.comments.iter_mut() {
        if let Some(index) = comments.iter().position(|c| c.id.get() == id) {
            if comments[index].username != user.username {
                return Err((
                    StatusCode::FORBIDDEN,
                    "You can only delete your own comments".into(),
                ));
            }
            comments.remove(index);
            removed_from = Some(*post_id);
            break;
        }
    }
    let post_id = removed_from.ok_or_else(|| not_found("Comment"))?;
    if let Some(post) = state.posts.iter_mut().find(|p| p.id.get() == post_id) {
        post.comments_count -= 1;
    }
    Ok("Comment deleted successfully".into_response())
}

async fn get_user(State(state): State<Shared>, Path(username): Path<String>) -> Reply {
    let state = state.lock().unwrap();
    let user = state
        .users
        .iter()
        .find(|u| u.username == username)
        .ok_or_else(|| not_found("User"))?;
    Ok(Json(user.identity()).into_response())
}

// --- Rooms ---

async fn create_room(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let id = state.add_room(&user.username, &name);
    let room = state.room(id).cloned().ok_or_else(|| not_found("Room"))?;
    Ok(Json(room).into_response())
}

async fn active_rooms(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().unwrap();
    caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let rooms: Vec<Room> = state.rooms.iter().filter(|r| r.active).cloned().collect();
    Ok(Json(rooms).into_response())
}

async fn my_rooms(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let rooms: Vec<Room> = state
        .rooms
        .iter()
        .filter(|r| r.creator.username == user.username)
        .cloned()
        .collect();
    Ok(Json(rooms).into_response())
}

async fn joined_rooms(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let rooms: Vec<Room> = state
        .rooms
        .iter()
        .filter(|r| r.members.contains(&user.username))
        .cloned()
        .collect();
    Ok(Json(rooms).into_response())
}

async fn get_room(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let mut state = state.lock().unwrap();
    caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let room = state
        .room(RoomId(id))
        .cloned()
        .ok_or_else(|| not_found("Room"))?;
    Ok(Json(room).into_response())
}

async fn join_room(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let room = state
        .rooms
        .iter_mut()
        .find(|r| r.id.get() == id)
        .ok_or_else(|| not_found("Room"))?;
    if !room.active {
        return Err((StatusCode::BAD_REQUEST, "Room is closed".into()));
    }
    if !room.members.contains(&user.username) {
        room.members.push(user.username);
    }
    Ok(Json(room.clone()).into_response())
}

async fn leave_room(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let room = state
        .rooms
        .iter_mut()
        .find(|r| r.id.get() == id)
        .ok_or_else(|| not_found("Room"))?;
    room.members.retain(|m| *m != user.username);
    Ok(Json(room.clone()).into_response())
}

async fn close_room(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = caller(&mut state, &headers).ok_or_else(unauthorized)?;
    let room = state
        .rooms
        .iter_mut()
        .find(|r| r.id.get() == id)
        .ok_or_else(|| not_found("Room"))?;
    if room.creator.username != user.username {
        return Err((
            StatusCode::FORBIDDEN,
            "Only the creator can close the room".into(),
        ));
    }
    room.active = false;
    Ok(Json(room.clone()).into_response())
}

// --- STOMP broker ---

async fn websocket(State(state): State<Shared>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| serve_stomp(state, socket))
}

async fn serve_stomp(state: Shared, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();

    let peer_id = {
        let mut state = state.lock().unwrap();
        state.next_peer += 1;
        let id = state.next_peer;
        state.peers.push(Peer {
            id,
            outbox,
            user: String::new(),
            subscriptions: Vec::new(),
        });
        id
    };

    let writer = tokio::spawn(async move {
        while let Some(text) = inbox.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Close(_) => break,
            _ => continue,
        };
        let frame = match Frame::decode(&text) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(_) => break,
        };
        let done = handle_frame(&mut state.lock().unwrap(), peer_id, frame);
        if done {
            break;
        }
    }

    state.lock().unwrap().peers.retain(|p| p.id != peer_id);
    let _ = writer.await;
}

/// Returns true when the connection should end.
fn handle_frame(state: &mut MockState, peer_id: u64, frame: Frame) -> bool {
    state.frames.push(frame.clone());
    let Some(index) = state.peers.iter().position(|p| p.id == peer_id) else {
        return true;
    };

    match frame.command {
        FrameCommand::Connect => {
            let token = frame
                .get("Authorization")
                .and_then(|v| v.strip_prefix("Bearer "))
                .unwrap_or_default();
            let user = state.users.iter().find(|u| u.token() == token).cloned();
            let peer = &mut state.peers[index];
            match user {
                Some(user) => {
                    peer.user = user.username;
                    let reply = Frame::new(FrameCommand::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", "0,0");
                    let _ = peer.outbox.send(reply.encode());
                    false
                }
                None => {
                    let reply =
                        Frame::new(FrameCommand::Error).header("message", "Invalid token");
                    let _ = peer.outbox.send(reply.encode());
                    true
                }
            }
        }
        FrameCommand::Subscribe => {
            let id = frame.get("id").unwrap_or_default().to_string();
            let destination = frame.get("destination").unwrap_or_default().to_string();
            state.peers[index].subscriptions.push((id, destination));
            false
        }
        FrameCommand::Unsubscribe => {
            let id = frame.get("id").unwrap_or_default();
            state.peers[index].subscriptions.retain(|(sub, _)| sub != id);
            false
        }
        FrameCommand::Send => {
            room_command(state, index, &frame);
            false
        }
        FrameCommand::Disconnect => true,
        _ => false,
    }
}

fn room_command(state: &mut MockState, peer: usize, frame: &Frame) {
    let destination = frame.get("destination").unwrap_or_default();
    let Some((room, action)) = destination
        .strip_prefix("/app/watch-party/")
        .and_then(|rest| rest.split_once('/'))
    else {
        return;
    };
    let Ok(room_id) = room.parse::<i64>() else {
        return;
    };
    let room_id = RoomId(room_id);
    let user = state.peers[peer].user.clone();
    let payload: serde_json::Value =
        serde_json::from_str(&frame.body).unwrap_or(serde_json::Value::Null);
    let timestamp = "2026-01-01T20:00:00";

    let event = match action {
        "start-video" => {
            let post_id = payload["postId"].as_i64().unwrap_or_default();
            let Some(post) = state.posts.iter().find(|p| p.id.get() == post_id).cloned() else {
                // Server errors carry no room id.
                let error = json!({"type": "ERROR", "message": "Video not found"});
                state.deliver(&room_topic(room_id), &error.to_string());
                return;
            };
            if let Some(room) = state.rooms.iter_mut().find(|r| r.id == room_id) {
                room.current_post = Some(RoomPost {
                    id: post.id,
                    title: post.title.clone(),
                    description: post.description.clone(),
                    video_url: post.video_url.clone(),
                    thumbnail_url: Some(post.thumbnail_url.clone()),
                });
            }
            json!({
                "type": "VIDEO_STARTED",
                "roomId": room_id,
                "postId": post.id,
                "postTitle": post.title,
                "videoUrl": post.video_url,
                "startedBy": user,
                "timestamp": timestamp,
            })
        }
        "join" => {
            let members = state.room(room_id).map_or(0, |r| r.members.len());
            json!({
                "type": "USER_JOINED",
                "roomId": room_id,
                "username": user,
                "memberCount": members,
                "timestamp": timestamp,
            })
        }
        "leave" => json!({
            "type": "USER_LEFT",
            "roomId": room_id,
            "username": user,
            "timestamp": timestamp,
        }),
        "close" => json!({
            "type": "ROOM_CLOSED",
            "roomId": room_id,
            "closedBy": user,
            "timestamp": timestamp,
        }),
        _ => return,
    };
    state.deliver(&room_topic(room_id), &event.to_string());
}
