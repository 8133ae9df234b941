use reqwest::Method;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{Comment, CommentId, CommentPage, CreateCommentRequest, PostId};

impl ApiClient {
    pub async fn create_comment(&self, post_id: PostId, text: &str) -> ClientResult<Comment> {
        let url = self.endpoint(&["api", "posts", &post_id.to_string(), "comments"])?;
        let body = CreateCommentRequest {
            text: text.to_string(),
        };
        self.send_json(self.request(Method::POST, url).json(&body))
            .await
    }

    /// Page `page` (0-based) of a post's comments, newest first.
    pub async fn comments(&self, post_id: PostId, page: u32) -> ClientResult<CommentPage> {
        let mut url = self.endpoint(&["api", "posts", &post_id.to_string(), "comments"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string());
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn delete_comment(&self, id: CommentId) -> ClientResult<String> {
        let url = self.endpoint(&["api", "comments", &id.to_string()])?;
        self.send_text(self.request(Method::DELETE, url)).await
    }
}
