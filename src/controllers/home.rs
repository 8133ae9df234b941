use super::{Effects, Route};
use crate::api::ApiClient;
use crate::models::{Identity, Post, PostId};

/// The public feed.
pub struct HomeController {
    api: ApiClient,
    pub identity: Option<Identity>,
    pub posts: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
    pub effects: Effects,
}

impl HomeController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            identity: None,
            posts: Vec::new(),
            loading: false,
            error: None,
            effects: Effects::default(),
        }
    }

    pub async fn activate(&mut self) {
        self.identity = self.api.session().current_identity();
        self.load_posts().await;
    }

    pub fn is_logged_in(&self) -> bool {
        self.api.session().is_authenticated()
    }

    pub async fn load_posts(&mut self) {
        self.loading = true;
        self.error = None;
        match self.api.posts().await {
            Ok(posts) => {
                tracing::debug!("Loaded {} posts", posts.len());
                self.posts = posts;
            }
            Err(e) => {
                tracing::warn!("Loading posts failed: {}", e);
                self.error = Some("Could not load posts. Please try again.".into());
            }
        }
        self.loading = false;
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.api.logout() {
            tracing::warn!("Clearing session failed: {}", e);
        }
        self.identity = None;
        self.effects.navigate(Route::Login);
    }

    pub fn thumbnail_url(&self, post: &Post) -> String {
        self.api.resolve_media_url(&post.thumbnail_url)
    }

    pub fn open_video(&mut self, id: PostId) {
        self.effects.navigate(Route::Video(id));
    }

    pub fn go_to_login(&mut self) {
        self.effects.navigate(Route::Login);
    }

    pub fn go_to_register(&mut self) {
        self.effects.navigate(Route::Register);
    }

    pub fn go_to_upload(&mut self) {
        self.effects.navigate(Route::Upload);
    }

    pub fn go_to_watch_party(&mut self) {
        self.effects.navigate(Route::RoomList);
    }

    pub fn go_to_profile(&mut self, username: &str) {
        self.effects.navigate(Route::Profile(username.to_string()));
    }
}
