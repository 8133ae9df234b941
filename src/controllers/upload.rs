use std::path::{Path, PathBuf};

use super::{Effects, Route};
use crate::api::ApiClient;
use crate::models::{GeoLocation, NewPost, Post};

pub const MAX_VIDEO_BYTES: u64 = 200 * 1024 * 1024;
pub const MAX_THUMBNAIL_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub size: u64,
    pub mime: String,
}

/// `1536` → `"1.5 KB"`. Two decimals at most, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exponent = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && exponent < UNITS.len() - 1 {
        scaled /= 1024.0;
        exponent += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent])
}

/// Comma separated, trimmed, empties dropped.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

async fn inspect(path: &Path) -> Result<SelectedFile, String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("{} is not a file", path.display()));
    }
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(SelectedFile {
        path: path.to_path_buf(),
        size: metadata.len(),
        mime: mime.essence_str().to_string(),
    })
}

pub struct UploadController {
    api: ApiClient,
    pub title: String,
    pub description: String,
    pub tags_input: String,
    pub location_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub video: Option<SelectedFile>,
    pub thumbnail: Option<SelectedFile>,
    pub video_error: Option<String>,
    pub thumbnail_error: Option<String>,
    pub uploading: bool,
    pub error: Option<String>,
    pub created: Option<Post>,
    pub effects: Effects,
}

impl UploadController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            title: String::new(),
            description: String::new(),
            tags_input: String::new(),
            location_name: String::new(),
            latitude: None,
            longitude: None,
            video: None,
            thumbnail: None,
            video_error: None,
            thumbnail_error: None,
            uploading: false,
            error: None,
            created: None,
            effects: Effects::default(),
        }
    }

    /// Anonymous users are sent to the login page.
    pub fn activate(&mut self) -> bool {
        if self.api.session().is_authenticated() {
            return true;
        }
        self.effects.alert("You must be logged in to upload a video!");
        self.effects.navigate(Route::Login);
        false
    }

    pub async fn select_video(&mut self, path: &Path) -> bool {
        self.video = None;
        self.video_error = None;
        match inspect(path).await.and_then(check_video) {
            Ok(file) => {
                tracing::debug!("Video selected: {} ({})", file.path.display(), format_file_size(file.size));
                self.video = Some(file);
                true
            }
            Err(message) => {
                self.video_error = Some(message);
                false
            }
        }
    }

    pub async fn select_thumbnail(&mut self, path: &Path) -> bool {
        self.thumbnail = None;
        self.thumbnail_error = None;
        match inspect(path).await.and_then(check_thumbnail) {
            Ok(file) => {
                self.thumbnail = Some(file);
                true
            }
            Err(message) => {
                self.thumbnail_error = Some(message);
                false
            }
        }
    }

    /// Set coordinates and a default place name derived from them.
    pub fn use_location(&mut self, latitude: f64, longitude: f64) {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        if self.location_name.trim().is_empty() {
            self.location_name = format!("Location: {:.4}, {:.4}", latitude, longitude);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title is required!".into());
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!(
                "Title can be at most {} characters!",
                MAX_TITLE_CHARS
            ));
        }
        if self.video.is_none() {
            return Err("A video file is required!".into());
        }
        if self.thumbnail.is_none() {
            return Err("A thumbnail image is required!".into());
        }
        if self.latitude.is_some() != self.longitude.is_some() {
            return Err("Location needs both latitude and longitude!".into());
        }
        Ok(())
    }

    fn new_post(&self) -> NewPost {
        let description = self.description.trim();
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoLocation {
                latitude,
                longitude,
                name: Some(self.location_name.trim().to_string()).filter(|n| !n.is_empty()),
            }),
            _ => None,
        };
        NewPost {
            title: self.title.trim().to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            tags: parse_tags(&self.tags_input),
            location,
        }
    }

    pub async fn submit(&mut self) -> bool {
        self.error = None;
        if let Err(message) = self.validate() {
            self.error = Some(message);
            return false;
        }
        let (Some(video), Some(thumbnail)) = (self.video.clone(), self.thumbnail.clone()) else {
            return false;
        };

        let post = self.new_post();
        self.uploading = true;
        tracing::info!("Uploading {} ({})", video.path.display(), format_file_size(video.size));
        let result = self
            .api
            .create_post(&post, &video.path, &thumbnail.path)
            .await;
        self.uploading = false;

        match result {
            Ok(created) => {
                tracing::info!("Created post {}", created.id);
                self.effects.notify("Video uploaded!");
                self.effects.navigate(Route::Video(created.id));
                self.created = Some(created);
                true
            }
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                self.error = Some(e.message_or("Upload failed. Please try again."));
                false
            }
        }
    }

    pub fn cancel(&mut self) {
        self.effects.navigate(Route::Home);
    }
}

fn check_video(file: SelectedFile) -> Result<SelectedFile, String> {
    if file.mime != "video/mp4" {
        return Err("Only MP4 videos are allowed!".into());
    }
    if file.size > MAX_VIDEO_BYTES {
        return Err(format!(
            "Video is too large! Maximum: 200 MB. Your file: {}",
            format_file_size(file.size)
        ));
    }
    Ok(file)
}

fn check_thumbnail(file: SelectedFile) -> Result<SelectedFile, String> {
    if !file.mime.starts_with("image/") {
        return Err("Only images are allowed (jpg, png, webp)!".into());
    }
    if file.size > MAX_THUMBNAIL_BYTES {
        return Err(format!(
            "Image is too large! Maximum: 5 MB. Your file: {}",
            format_file_size(file.size)
        ));
    }
    Ok(file)
}
