//! Page controllers. Each one owns the state a screen renders and records
//! the side effects a UI would perform (navigation, alerts, toasts) in an
//! [`Effects`] value for the caller to drain.

pub mod comments;
pub mod home;
pub mod login;
pub mod player;
pub mod profile;
pub mod register;
pub mod room_list;
pub mod room_view;
pub mod upload;

pub use comments::CommentsController;
pub use home::HomeController;
pub use login::LoginController;
pub use player::{PlayerController, VideoSource};
pub use profile::ProfileController;
pub use register::RegisterController;
pub use room_list::{RoomListController, RoomTab};
pub use room_view::RoomViewController;
pub use upload::UploadController;

use std::fmt;

use crate::models::{PostId, Room, RoomId};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Upload,
    Video(PostId),
    Profile(String),
    RoomList,
    Room(RoomId),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => write!(f, "/home"),
            Route::Login => write!(f, "/login"),
            Route::Register => write!(f, "/register"),
            Route::Upload => write!(f, "/upload"),
            Route::Video(id) => write!(f, "/video/{}", id),
            Route::Profile(username) => write!(f, "/profile/{}", username),
            Route::RoomList => write!(f, "/watch-party-list"),
            Route::Room(id) => write!(f, "/watch-party/{}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    /// Last navigation wins.
    pub redirect: Option<Route>,
    /// Blocking messages.
    pub alerts: Vec<String>,
    /// Toasts.
    pub notifications: Vec<String>,
}

impl Effects {
    pub fn navigate(&mut self, route: Route) {
        tracing::debug!("navigate {}", route);
        self.redirect = Some(route);
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        self.alerts.push(message.into());
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notifications.push(message.into());
    }

    pub fn take(&mut self) -> Effects {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        self.redirect.is_none() && self.alerts.is_empty() && self.notifications.is_empty()
    }
}

/// The keys the current user may appear under in room data. Older rooms
/// stored the email where a username was expected, so both are tried.
pub(crate) fn user_keys(session: &Session) -> Vec<String> {
    let Some(identity) = session.current_identity() else {
        return Vec::new();
    };
    [identity.username, identity.email]
        .into_iter()
        .filter(|key| !key.is_empty())
        .collect()
}

pub(crate) fn is_room_creator(session: &Session, room: &Room) -> bool {
    user_keys(session).iter().any(|key| room.is_creator(key))
}

pub(crate) fn is_room_member(session: &Session, room: &Room) -> bool {
    user_keys(session).iter().any(|key| room.is_member(key))
}

/// Loose `local@domain` check, the same shape browsers accept.
pub(crate) fn is_email_shaped(input: &str) -> bool {
    let Some((local, domain)) = input.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !input.chars().any(char::is_whitespace)
        && domain.split('.').all(|label| !label.is_empty())
}
