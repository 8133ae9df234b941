use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Method;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{LikeResponse, LikeStatus, NewPost, Post, PostId};

impl ApiClient {
    pub async fn posts(&self) -> ClientResult<Vec<Post>> {
        let url = self.endpoint(&["api", "posts"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Fetching a single post counts as a view.
    pub async fn post(&self, id: PostId) -> ClientResult<Post> {
        let url = self.endpoint(&["api", "posts", &id.to_string()])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Fresh counters without registering another view.
    pub async fn refresh_post(&self, id: PostId) -> ClientResult<Post> {
        let url = self.endpoint(&["api", "posts", &id.to_string(), "refresh"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn user_posts(&self, username: &str) -> ClientResult<Vec<Post>> {
        let url = self.endpoint(&["api", "posts", "user", username])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn posts_by_tag(&self, tag: &str) -> ClientResult<Vec<Post>> {
        let url = self.endpoint(&["api", "posts", "tag", tag])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Multipart upload of a video, its thumbnail and metadata.
    pub async fn create_post(
        &self,
        post: &NewPost,
        video: &Path,
        thumbnail: &Path,
    ) -> ClientResult<Post> {
        let mut form = Form::new()
            .text("title", post.title.clone())
            .part("video", file_part(video).await?)
            .part("thumbnail", file_part(thumbnail).await?);

        if let Some(description) = post.description.as_ref().filter(|d| !d.is_empty()) {
            form = form.text("description", description.clone());
        }
        if !post.tags.is_empty() {
            form = form.text("tags", post.tags.join(","));
        }
        if let Some(location) = &post.location {
            form = form
                .text("latitude", location.latitude.to_string())
                .text("longitude", location.longitude.to_string());
            if let Some(name) = location.name.as_ref().filter(|n| !n.is_empty()) {
                form = form.text("locationName", name.clone());
            }
        }

        let url = self.endpoint(&["api", "posts"])?;
        self.send_json(self.request(Method::POST, url).multipart(form))
            .await
    }

    pub async fn delete_post(&self, id: PostId) -> ClientResult<String> {
        let url = self.endpoint(&["api", "posts", &id.to_string()])?;
        self.send_text(self.request(Method::DELETE, url)).await
    }

    pub async fn like_post(&self, id: PostId) -> ClientResult<LikeResponse> {
        let url = self.endpoint(&["api", "posts", &id.to_string(), "like"])?;
        self.send_json(self.request(Method::POST, url)).await
    }

    pub async fn unlike_post(&self, id: PostId) -> ClientResult<LikeResponse> {
        let url = self.endpoint(&["api", "posts", &id.to_string(), "like"])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    pub async fn like_status(&self, id: PostId) -> ClientResult<LikeStatus> {
        let url = self.endpoint(&["api", "posts", &id.to_string(), "like", "status"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    /// Streaming URL of an uploaded video file.
    pub fn video_url(&self, filename: &str) -> ClientResult<String> {
        Ok(self.endpoint(&["api", "videos", filename])?.to_string())
    }

    pub fn thumbnail_url(&self, filename: &str) -> ClientResult<String> {
        Ok(self.endpoint(&["api", "thumbnails", filename])?.to_string())
    }
}

async fn file_part(path: &Path) -> ClientResult<Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Ok(Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime.essence_str())?)
}
