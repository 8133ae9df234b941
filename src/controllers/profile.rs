use super::{Effects, Route};
use crate::api::ApiClient;
use crate::models::{Identity, Post, PostId};

pub struct ProfileController {
    api: ApiClient,
    pub username: String,
    pub user: Option<Identity>,
    pub posts: Vec<Post>,
    pub loading: bool,
    pub error: Option<String>,
    pub total_posts: usize,
    pub total_views: i64,
    pub total_likes: i64,
    pub effects: Effects,
}

impl ProfileController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            username: String::new(),
            user: None,
            posts: Vec::new(),
            loading: false,
            error: None,
            total_posts: 0,
            total_views: 0,
            total_likes: 0,
            effects: Effects::default(),
        }
    }

    pub async fn load(&mut self, username: &str) {
        self.username = username.trim().to_string();
        self.error = None;
        if self.username.is_empty() {
            self.error = Some("Invalid username".into());
            return;
        }

        self.loading = true;
        match self.api.user(&self.username).await {
            Ok(user) => self.user = Some(user),
            Err(e) => {
                tracing::warn!("Loading user {} failed: {}", self.username, e);
                self.error = Some("User not found".into());
                self.loading = false;
                return;
            }
        }

        match self.api.user_posts(&self.username).await {
            Ok(posts) => {
                self.posts = posts;
                self.calculate_statistics();
            }
            Err(e) => {
                tracing::warn!("Loading posts of {} failed: {}", self.username, e);
                self.error = Some("Could not load posts".into());
            }
        }
        self.loading = false;
    }

    fn calculate_statistics(&mut self) {
        self.total_posts = self.posts.len();
        self.total_views = self.posts.iter().map(|p| p.views_count).sum();
        self.total_likes = self.posts.iter().map(|p| p.likes_count).sum();
    }

    pub fn thumbnail_url(&self, post: &Post) -> String {
        self.api.resolve_media_url(&post.thumbnail_url)
    }

    pub fn open_video(&mut self, id: PostId) {
        self.effects.navigate(Route::Video(id));
    }

    pub fn go_back(&mut self) {
        self.effects.navigate(Route::Home);
    }
}
