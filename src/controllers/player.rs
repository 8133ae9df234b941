use super::{Effects, Route};
use crate::api::ApiClient;
use crate::error::ErrorKind;
use crate::models::{Post, PostId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    YouTube { embed_url: String },
    File { url: String },
}

/// Map `watch?v=ID` and `youtu.be/ID` links to the embeddable player URL.
pub fn youtube_embed_url(url: &str) -> Option<String> {
    if !url.contains("youtube.com") && !url.contains("youtu.be") {
        return None;
    }
    let video_id = if let Some((_, rest)) = url.split_once("watch?v=") {
        rest.split('&').next().unwrap_or_default()
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest.split('?').next().unwrap_or_default()
    } else {
        ""
    };
    Some(format!("https://www.youtube.com/embed/{}", video_id))
}

pub struct PlayerController {
    api: ApiClient,
    pub post: Option<Post>,
    pub liked: bool,
    pub source: Option<VideoSource>,
    pub loading: bool,
    pub error: Option<String>,
    pub effects: Effects,
}

impl PlayerController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            post: None,
            liked: false,
            source: None,
            loading: false,
            error: None,
            effects: Effects::default(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.api.session().is_authenticated()
    }

    pub fn video_source(&self, url: &str) -> VideoSource {
        match youtube_embed_url(url) {
            Some(embed_url) => VideoSource::YouTube { embed_url },
            None => VideoSource::File {
                url: self.api.resolve_media_url(url),
            },
        }
    }

    /// Load a post (counts as a view) and, when logged in, its like status.
    pub async fn load(&mut self, id: PostId) {
        self.loading = true;
        self.error = None;

        match self.api.post(id).await {
            Ok(post) => {
                self.source = Some(self.video_source(&post.video_url));
                self.post = Some(post);
            }
            Err(e) => {
                tracing::warn!("Loading post {} failed: {}", id, e);
                self.error = Some("Post not found".into());
                self.loading = false;
                return;
            }
        }

        if self.is_logged_in() {
            match self.api.like_status(id).await {
                Ok(status) => self.liked = status.is_liked,
                Err(e) => tracing::debug!("Like status unavailable: {}", e),
            }
        }
        self.loading = false;
    }

    /// Pull fresh counters without registering a view or resetting playback.
    pub async fn refresh(&mut self) {
        let Some(id) = self.post.as_ref().map(|p| p.id) else {
            return;
        };
        match self.api.refresh_post(id).await {
            Ok(fresh) => {
                if let Some(post) = self.post.as_mut() {
                    post.comments_count = fresh.comments_count;
                    post.likes_count = fresh.likes_count;
                    post.views_count = fresh.views_count;
                }
            }
            Err(e) => tracing::warn!("Refreshing post {} failed: {}", id, e),
        }
    }

    /// Flip the like immediately, then confirm with the server.
    pub async fn toggle_like(&mut self) {
        if !self.is_logged_in() {
            self.effects.alert("You must be logged in to like videos!");
            self.effects.navigate(Route::Login);
            return;
        }
        let Some(post) = self.post.as_mut() else {
            return;
        };

        let id = post.id;
        let was_liked = self.liked;
        self.liked = !was_liked;
        post.likes_count += if was_liked { -1 } else { 1 };

        let result = if was_liked {
            self.api.unlike_post(id).await
        } else {
            self.api.like_post(id).await
        };

        let Err(e) = result else {
            return;
        };
        tracing::warn!("Like toggle on post {} failed: {}", id, e);
        self.liked = was_liked;
        if let Some(post) = self.post.as_mut() {
            post.likes_count += if was_liked { 1 } else { -1 };
        }

        if e.kind() == ErrorKind::Unauthorized {
            self.effects
                .alert("Your session has expired. Please log in again.");
            if let Err(e) = self.api.logout() {
                tracing::warn!("Clearing session failed: {}", e);
            }
            self.effects.navigate(Route::Login);
        } else {
            self.effects.alert("Could not update the like. Please try again.");
        }
    }

    pub fn on_comment(&mut self) {
        if !self.is_logged_in() {
            self.effects.alert("You must be logged in to comment!");
        }
    }

    pub fn go_to_profile(&mut self, username: &str) {
        self.effects.navigate(Route::Profile(username.to_string()));
    }

    pub fn go_back(&mut self) {
        self.effects.navigate(Route::Home);
    }
}
