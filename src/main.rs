use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use watchparty::api::ApiClient;
use watchparty::config::{Cli, Command, Config};
use watchparty::controllers::{
    CommentsController, Effects, HomeController, LoginController, PlayerController,
    ProfileController, RegisterController, RoomListController, RoomTab, RoomViewController,
    UploadController, VideoSource,
};
use watchparty::models::{CommentId, PostId, RegisterRequest, RoomId};
use watchparty::realtime::{RealtimeClient, RealtimeEvent};
use watchparty::session::{FileStorage, Session};

/// How long `start-video` waits for the room to echo the start.
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

struct App {
    config: Config,
    session: Session,
    api: ApiClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    let session = Session::new(FileStorage::new(config.session_path()));
    let api = ApiClient::new(&config.api, session.clone())?;
    let app = App {
        config,
        session,
        api,
    };

    match cli.command {
        Command::Login { email, password } => login(&app, email, password).await,
        Command::Logout => {
            let mut home = HomeController::new(app.api.clone());
            home.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Register {
            username,
            email,
            password,
            first_name,
            last_name,
            address,
        } => {
            let form = RegisterRequest {
                username,
                email,
                confirm_password: password.clone(),
                password,
                first_name,
                last_name,
                address,
            };
            register(&app, form).await
        }
        Command::Activate { token } => activate(&app, &token).await,
        Command::Whoami => {
            match app.session.current_identity() {
                Some(identity) => println!("{} <{}>", identity.username, identity.email),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Command::Feed => feed(&app).await,
        Command::Profile { username } => profile(&app, &username).await,
        Command::Video { id } => video(&app, PostId(id)).await,
        Command::Like { id } => like(&app, PostId(id)).await,
        Command::Comments { post_id, pages } => comments(&app, PostId(post_id), pages).await,
        Command::Comment { post_id, text } => comment(&app, PostId(post_id), text).await,
        Command::DeleteComment {
            post_id,
            comment_id,
        } => delete_comment(&app, PostId(post_id), CommentId(comment_id)).await,
        Command::Upload {
            title,
            video,
            thumbnail,
            description,
            tags,
            latitude,
            longitude,
            location,
        } => {
            let upload = UploadArgs {
                title,
                video,
                thumbnail,
                description,
                tags,
                coordinates: latitude.zip(longitude),
                location,
            };
            upload_video(&app, upload).await
        }
        Command::Rooms { tab } => {
            let tab: RoomTab = tab.parse().map_err(anyhow::Error::msg)?;
            rooms(&app, tab).await
        }
        Command::CreateRoom { name } => create_room(&app, name).await,
        Command::Join { room_id } => join(&app, RoomId(room_id)).await,
        Command::Watch { room_id } => watch(&app, RoomId(room_id)).await,
        Command::StartVideo { room_id, post_id } => {
            start_video(&app, RoomId(room_id), PostId(post_id)).await
        }
        Command::CloseRoom { room_id } => close_room(&app, RoomId(room_id)).await,
    }
}

/// Print what a UI would have shown.
fn report(effects: Effects) {
    for alert in effects.alerts {
        eprintln!("! {}", alert);
    }
    for note in effects.notifications {
        println!("* {}", note);
    }
    if let Some(route) = effects.redirect {
        println!("-> {}", route);
    }
}

fn fail_on(error: Option<String>) -> anyhow::Result<()> {
    match error {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn realtime(app: &App) -> RealtimeClient {
    RealtimeClient::websocket(app.config.realtime.clone(), app.session.clone())
}

// --- Accounts ---

async fn login(app: &App, email: String, password: String) -> anyhow::Result<()> {
    let mut page = LoginController::new(app.api.clone(), None);
    page.email = email;
    page.password = password;
    page.submit().await;
    fail_on(page.error.take())?;
    if let Some(identity) = app.session.current_identity() {
        println!("Logged in as {}", identity.username);
    }
    report(page.effects.take());
    Ok(())
}

async fn register(app: &App, form: RegisterRequest) -> anyhow::Result<()> {
    let mut page = RegisterController::new(app.api.clone());
    page.form = form;
    page.submit().await;
    fail_on(page.error.take())?;
    if let Some(message) = page.success.take() {
        println!("{}", message);
    }
    report(page.effects.take());
    Ok(())
}

async fn activate(app: &App, token: &str) -> anyhow::Result<()> {
    let mut page = RegisterController::new(app.api.clone());
    page.activate(token).await;
    fail_on(page.error.take())?;
    if let Some(message) = page.success.take() {
        println!("{}", message);
    }
    Ok(())
}

// --- Videos ---

async fn feed(app: &App) -> anyhow::Result<()> {
    let mut home = HomeController::new(app.api.clone());
    home.activate().await;
    fail_on(home.error.take())?;

    for post in &home.posts {
        println!(
            "#{:<5} {:<40} by {:<16} {} views, {} likes, {} comments",
            post.id,
            post.title,
            post.user.username,
            post.views_count,
            post.likes_count,
            post.comments_count
        );
    }
    if home.posts.is_empty() {
        println!("No videos yet");
    }
    Ok(())
}

async fn profile(app: &App, username: &str) -> anyhow::Result<()> {
    let mut page = ProfileController::new(app.api.clone());
    page.load(username).await;
    fail_on(page.error.take())?;

    if let Some(user) = &page.user {
        let name = [user.first_name.as_deref(), user.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        println!("{} {}", user.username, name);
    }
    println!(
        "{} videos, {} views, {} likes",
        page.total_posts, page.total_views, page.total_likes
    );
    for post in &page.posts {
        println!("#{:<5} {}  [{}]", post.id, post.title, page.thumbnail_url(post));
    }
    Ok(())
}

async fn video(app: &App, id: PostId) -> anyhow::Result<()> {
    let mut player = PlayerController::new(app.api.clone());
    player.load(id).await;
    fail_on(player.error.take())?;
    let Some(post) = &player.post else {
        bail!("Post not found");
    };

    println!("{} (by {})", post.title, post.user.username);
    if let Some(description) = &post.description {
        println!("{}", description);
    }
    match &player.source {
        Some(VideoSource::YouTube { embed_url }) => println!("YouTube: {}", embed_url),
        Some(VideoSource::File { url }) => println!("Video: {}", url),
        None => {}
    }
    if !post.tags.is_empty() {
        let tags: Vec<&str> = post.tags.iter().map(String::as_str).collect();
        println!("Tags: {}", tags.join(", "));
    }
    if let Some(name) = &post.location_name {
        println!("Location: {}", name);
    }
    println!(
        "{} views, {} likes{}, {} comments",
        post.views_count,
        post.likes_count,
        if player.liked { " (you like this)" } else { "" },
        post.comments_count
    );
    Ok(())
}

async fn like(app: &App, id: PostId) -> anyhow::Result<()> {
    let mut player = PlayerController::new(app.api.clone());
    player.load(id).await;
    fail_on(player.error.take())?;
    player.toggle_like().await;

    let effects = player.effects.take();
    let failed = !effects.alerts.is_empty();
    report(effects);
    if failed {
        bail!("Like was not saved");
    }
    if let Some(post) = &player.post {
        println!(
            "{} post {} ({} likes)",
            if player.liked { "Liked" } else { "Unliked" },
            post.id,
            post.likes_count
        );
    }
    Ok(())
}

// --- Comments ---

async fn load_comments(app: &App, post_id: PostId, pages: u32) -> anyhow::Result<CommentsController> {
    let mut panel = CommentsController::new(app.api.clone(), post_id);
    panel.load().await;
    fail_on(panel.error.take())?;
    for _ in 1..pages {
        if !panel.load_more().await {
            break;
        }
    }
    Ok(panel)
}

async fn comments(app: &App, post_id: PostId, pages: u32) -> anyhow::Result<()> {
    let panel = load_comments(app, post_id, pages.max(1)).await?;
    println!(
        "{} of {} comments",
        panel.comments.len(),
        panel.total_comments
    );
    for comment in &panel.comments {
        let when = comment
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let owner = if panel.is_owner(comment) { " (you)" } else { "" };
        println!("[{}] {}{} {}: {}", comment.id, comment.username, owner, when, comment.text);
    }
    if panel.has_more {
        println!("More available, use --pages {}", panel.current_page + 2);
    }
    Ok(())
}

async fn comment(app: &App, post_id: PostId, text: String) -> anyhow::Result<()> {
    let mut panel = CommentsController::new(app.api.clone(), post_id);
    panel.new_comment_text = text;
    let posted = panel.submit().await;
    report(panel.effects.take());
    if !posted {
        bail!("Comment was not posted");
    }
    Ok(())
}

async fn delete_comment(app: &App, post_id: PostId, id: CommentId) -> anyhow::Result<()> {
    let mut panel = load_comments(app, post_id, 1).await?;
    while !panel.comments.iter().any(|c| c.id == id) {
        if !panel.load_more().await {
            bail!("Comment {} not found on post {}", id, post_id);
        }
    }
    let deleted = panel.delete(id).await;
    report(panel.effects.take());
    if !deleted {
        bail!("Comment was not deleted");
    }
    Ok(())
}

// --- Upload ---

struct UploadArgs {
    title: String,
    video: PathBuf,
    thumbnail: PathBuf,
    description: Option<String>,
    tags: Option<String>,
    coordinates: Option<(f64, f64)>,
    location: Option<String>,
}

async fn upload_video(app: &App, args: UploadArgs) -> anyhow::Result<()> {
    let mut page = UploadController::new(app.api.clone());
    if !page.activate() {
        report(page.effects.take());
        bail!("Log in first");
    }

    if !page.select_video(&args.video).await {
        fail_on(page.video_error.take())?;
    }
    if !page.select_thumbnail(&args.thumbnail).await {
        fail_on(page.thumbnail_error.take())?;
    }
    page.title = args.title;
    page.description = args.description.unwrap_or_default();
    page.tags_input = args.tags.unwrap_or_default();
    page.location_name = args.location.unwrap_or_default();
    if let Some((latitude, longitude)) = args.coordinates {
        page.use_location(latitude, longitude);
    }

    page.submit().await;
    fail_on(page.error.take())?;
    if let Some(post) = &page.created {
        println!("Uploaded post {}: {}", post.id, post.title);
    }
    report(page.effects.take());
    Ok(())
}

// --- Watch party ---

async fn rooms(app: &App, tab: RoomTab) -> anyhow::Result<()> {
    let mut list = RoomListController::new(app.api.clone());
    list.switch_tab(tab).await;
    fail_on(list.error.take())?;

    for room in &list.rooms {
        let mut badges = Vec::new();
        if list.is_creator(room) {
            badges.push("yours");
        } else if list.is_member(room) {
            badges.push("member");
        }
        if !room.active {
            badges.push("closed");
        }
        let playing = room
            .current_post
            .as_ref()
            .filter(|_| list.has_current_video(room))
            .map(|p| format!(", playing \"{}\"", p.title))
            .unwrap_or_default();
        println!(
            "#{:<5} {:<32} by {:<16} {} members{} {}",
            room.id,
            room.name,
            room.creator.username,
            room.member_count(),
            playing,
            badges.join(" ")
        );
    }
    if list.rooms.is_empty() {
        println!("No rooms");
    }
    Ok(())
}

async fn create_room(app: &App, name: String) -> anyhow::Result<()> {
    let mut list = RoomListController::new(app.api.clone());
    list.open_create();
    list.new_room_name = name;
    let room = list.create_room().await;
    fail_on(list.error.take())?;
    if let Some(room) = room {
        println!("Created room {}: {}", room.id, room.name);
    }
    report(list.effects.take());
    Ok(())
}

async fn join(app: &App, room_id: RoomId) -> anyhow::Result<()> {
    let mut list = RoomListController::new(app.api.clone());
    let joined = list.join_room(room_id).await;
    report(list.effects.take());
    if !joined {
        bail!("Could not join room {}", room_id);
    }
    Ok(())
}

async fn enter_room(app: &App, room_id: RoomId) -> anyhow::Result<RoomViewController> {
    let mut room = RoomViewController::new(app.api.clone(), realtime(app), room_id);
    room.activate().await;
    if !room.connected {
        report(room.effects.take());
        bail!("Not connected to room {}", room_id);
    }
    Ok(room)
}

async fn watch(app: &App, room_id: RoomId) -> anyhow::Result<()> {
    let mut room = enter_room(app, room_id).await?;
    if let Some(info) = &room.room {
        println!(
            "In \"{}\" with {}",
            info.name,
            info.members.join(", ")
        );
    }
    report(room.effects.take());
    println!("Watching room {}. Press Ctrl-C to leave.", room_id);

    loop {
        tokio::select! {
            event = room.next_event() => {
                let Some(event) = event else { break };
                let closed = matches!(event, RealtimeEvent::RoomClosed { .. });
                room.handle_event(event).await;
                report(room.effects.take());
                if closed {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    room.deactivate().await;
    Ok(())
}

async fn start_video(app: &App, room_id: RoomId, post_id: PostId) -> anyhow::Result<()> {
    let mut room = enter_room(app, room_id).await?;
    room.effects.take();
    room.select_video(post_id);

    if room.start_video().await {
        let echoed = tokio::time::timeout(ECHO_TIMEOUT, async {
            while let Some(event) = room.next_event().await {
                if matches!(event, RealtimeEvent::VideoStarted { .. }) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .ok()
        .flatten();
        match echoed {
            Some(event) => room.handle_event(event).await,
            None => tracing::warn!("Room did not confirm the start"),
        }
    }

    let effects = room.effects.take();
    let failed = !effects.alerts.is_empty();
    report(effects);
    room.deactivate().await;
    if failed {
        bail!("Video was not started");
    }
    Ok(())
}

async fn close_room(app: &App, room_id: RoomId) -> anyhow::Result<()> {
    let mut room = RoomViewController::new(app.api.clone(), realtime(app), room_id);
    room.connect().await;
    let closed = room.close_room().await;
    report(room.effects.take());
    room.deactivate().await;
    if !closed {
        bail!("Room {} was not closed", room_id);
    }
    println!("Closed room {}", room_id);
    Ok(())
}
