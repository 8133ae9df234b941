use super::Effects;
use crate::api::ApiClient;
use crate::models::{Comment, CommentId, CommentPage, PostId};

/// Comments under one post, newest first, paged by the server.
pub struct CommentsController {
    api: ApiClient,
    pub post_id: PostId,
    pub comments: Vec<Comment>,
    pub current_page: u32,
    pub total_pages: i64,
    pub total_comments: i64,
    pub has_more: bool,
    pub loading: bool,
    pub loading_more: bool,
    pub new_comment_text: String,
    pub submitting: bool,
    pub error: Option<String>,
    pub effects: Effects,
}

impl CommentsController {
    pub fn new(api: ApiClient, post_id: PostId) -> Self {
        Self {
            api,
            post_id,
            comments: Vec::new(),
            current_page: 0,
            total_pages: 0,
            total_comments: 0,
            has_more: false,
            loading: false,
            loading_more: false,
            new_comment_text: String::new(),
            submitting: false,
            error: None,
            effects: Effects::default(),
        }
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.api.comments(self.post_id, 0).await {
            Ok(page) => {
                self.total_pages = page.total_pages;
                self.total_comments = page.total_elements;
                self.apply_page(page, false);
            }
            Err(e) => {
                tracing::warn!("Loading comments of post {} failed: {}", self.post_id, e);
                self.error = Some("Could not load comments".into());
            }
        }
        self.loading = false;
    }

    /// Append the next page. A no-op while a load is running or on the last page.
    pub async fn load_more(&mut self) -> bool {
        if !self.has_more || self.loading_more {
            return false;
        }
        self.loading_more = true;
        let next = self.current_page + 1;
        let loaded = match self.api.comments(self.post_id, next).await {
            Ok(page) => {
                self.apply_page(page, true);
                true
            }
            Err(e) => {
                tracing::warn!("Loading comment page {} failed: {}", next, e);
                false
            }
        };
        self.loading_more = false;
        loaded
    }

    fn apply_page(&mut self, page: CommentPage, append: bool) {
        if append {
            self.comments.extend(page.content);
        } else {
            self.comments = page.content;
        }
        self.current_page = page.number;
        self.has_more = !page.last;
    }

    pub async fn submit(&mut self) -> bool {
        let text = self.new_comment_text.trim().to_string();
        if text.is_empty() {
            self.effects.alert("Enter some text first!");
            return false;
        }
        if !self.api.session().is_authenticated() {
            self.effects.alert("You must be logged in to comment!");
            return false;
        }

        self.submitting = true;
        let result = self.api.create_comment(self.post_id, &text).await;
        self.submitting = false;

        match result {
            Ok(comment) => {
                self.comments.insert(0, comment);
                self.total_comments += 1;
                self.new_comment_text.clear();
                self.effects.notify("Comment added!");
                true
            }
            Err(e) => {
                tracing::warn!("Posting comment failed: {}", e);
                // Rate limit messages come from the server and are shown as-is.
                self.effects
                    .alert(e.message_or("Could not post the comment"));
                false
            }
        }
    }

    pub async fn delete(&mut self, id: CommentId) -> bool {
        let Some(author) = self
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.username.clone())
        else {
            return false;
        };
        if author != self.api.session().current_username() {
            self.effects.alert("You can only delete your own comments!");
            return false;
        }

        match self.api.delete_comment(id).await {
            Ok(message) => {
                tracing::debug!("{}", message);
                self.comments.retain(|c| c.id != id);
                self.total_comments -= 1;
                self.effects.notify("Comment deleted!");
                true
            }
            Err(e) => {
                tracing::warn!("Deleting comment {} failed: {}", id, e);
                self.effects.alert("Could not delete the comment!");
                false
            }
        }
    }

    pub fn is_owner(&self, comment: &Comment) -> bool {
        let session = self.api.session();
        session.is_authenticated() && comment.username == session.current_username()
    }
}
