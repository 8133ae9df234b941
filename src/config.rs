use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "watchparty", about = "Watch videos together from the terminal")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API origin, e.g. http://localhost:9090
    #[arg(long, global = true)]
    pub api: Option<String>,

    /// Realtime (STOMP over WebSocket) endpoint
    #[arg(long, global = true)]
    pub ws: Option<String>,

    /// Path to data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        address: String,
    },
    /// Activate an account with the emailed token
    Activate { token: String },
    /// Show the logged in user
    Whoami,
    /// List the latest videos
    Feed,
    /// Show a user's profile and videos
    Profile { username: String },
    /// Show a single video
    Video { id: i64 },
    /// Like or unlike a video
    Like { id: i64 },
    /// List comments of a video
    Comments {
        post_id: i64,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Comment on a video
    Comment { post_id: i64, text: String },
    /// Delete one of your comments
    DeleteComment { post_id: i64, comment_id: i64 },
    /// Upload a video
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long)]
        video: PathBuf,
        #[arg(long)]
        thumbnail: PathBuf,
        #[arg(long)]
        description: Option<String>,
        /// Comma separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, requires = "longitude")]
        latitude: Option<f64>,
        #[arg(long, requires = "latitude")]
        longitude: Option<f64>,
        #[arg(long)]
        location: Option<String>,
    },
    /// List watch-party rooms
    Rooms {
        /// all, my or joined
        #[arg(long, default_value = "all")]
        tab: String,
    },
    /// Create a watch-party room
    CreateRoom { name: String },
    /// Join a watch-party room
    Join { room_id: i64 },
    /// Enter a room and print events until Ctrl-C
    Watch { room_id: i64 },
    /// Start a video for everyone in the room
    StartVideo { room_id: i64, post_id: i64 },
    /// Close a room you created
    CloseRoom { room_id: i64 },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub session: SessionConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub origin: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RealtimeConfig {
    pub url: String,
    pub heartbeat_outgoing_ms: u64,
    pub heartbeat_incoming_ms: u64,
    pub handshake_timeout_ms: u64,
    pub event_buffer: usize,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:9090".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9090/ws/websocket".to_string(),
            heartbeat_outgoing_ms: 4000,
            heartbeat_incoming_ms: 4000,
            handshake_timeout_ms: 10_000,
            event_buffer: 64,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RealtimeConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Value of the STOMP `heart-beat` header we offer: `outgoing,incoming`.
    pub fn heart_beat_header(&self) -> String {
        format!(
            "{},{}",
            self.heartbeat_outgoing_ms, self.heartbeat_incoming_ms
        )
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref api) = cli.api {
            config.api.origin = api.clone();
        }
        if let Some(ref ws) = cli.ws {
            config.realtime.url = ws.clone();
        }

        // Resolve paths relative to data dir
        if config.session.path.is_none() {
            config.session.path = Some(data_dir.join("session.json"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".watchparty")
        })
    }

    /// Location of the persisted session; falls back to the working directory
    /// when `load` has not resolved it.
    pub fn session_path(&self) -> PathBuf {
        self.session
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("session.json"))
    }
}
