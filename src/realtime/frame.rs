//! STOMP 1.2 frames as carried in WebSocket text messages.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl FrameCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameCommand::Connect => "CONNECT",
            FrameCommand::Connected => "CONNECTED",
            FrameCommand::Send => "SEND",
            FrameCommand::Subscribe => "SUBSCRIBE",
            FrameCommand::Unsubscribe => "UNSUBSCRIBE",
            FrameCommand::Message => "MESSAGE",
            FrameCommand::Receipt => "RECEIPT",
            FrameCommand::Error => "ERROR",
            FrameCommand::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" | "STOMP" => FrameCommand::Connect,
            "CONNECTED" => FrameCommand::Connected,
            "SEND" => FrameCommand::Send,
            "SUBSCRIBE" => FrameCommand::Subscribe,
            "UNSUBSCRIBE" => FrameCommand::Unsubscribe,
            "MESSAGE" => FrameCommand::Message,
            "RECEIPT" => FrameCommand::Receipt,
            "ERROR" => FrameCommand::Error,
            "DISCONNECT" => FrameCommand::Disconnect,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(self) -> bool {
        !matches!(self, FrameCommand::Connect | FrameCommand::Connected)
    }
}

impl fmt::Display for FrameCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("malformed header line {0:?}")]
    MalformedHeader(String),

    #[error("invalid escape sequence in {0:?}")]
    BadEscape(String),

    #[error("frame is missing its NUL terminator")]
    Unterminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: FrameCommand,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: FrameCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First occurrence wins when a header is repeated.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// `Ok(None)` for a heart-beat (nothing but end-of-line characters).
    pub fn decode(raw: &str) -> Result<Option<Frame>, FrameError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() {
            return Ok(None);
        }

        let (head, rest) = match raw.find("\n\n") {
            Some(i) => (&raw[..i], &raw[i + 2..]),
            None => match raw.find("\r\n\r\n") {
                Some(i) => (&raw[..i], &raw[i + 4..]),
                None => (raw.trim_end_matches('\0'), ""),
            },
        };

        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default();
        let command = FrameCommand::parse(command_line.trim_end_matches('\r'))
            .ok_or_else(|| FrameError::UnknownCommand(command_line.to_string()))?;

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if command.escapes_headers() {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .and_then(|(_, v)| v.trim().parse::<usize>().ok());

        let body = match content_length {
            Some(len) if len <= rest.len() && rest.is_char_boundary(len) => rest[..len].to_string(),
            Some(_) => return Err(FrameError::Unterminated),
            None => match rest.find('\0') {
                Some(end) => rest[..end].to_string(),
                None if rest.is_empty() => String::new(),
                None => return Err(FrameError::Unterminated),
            },
        };

        Ok(Some(Frame {
            command,
            headers,
            body,
        }))
    }
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::BadEscape(s.to_string())),
        }
    }
    Ok(out)
}
