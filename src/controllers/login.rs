use super::{is_email_shaped, Effects, Route};
use crate::api::ApiClient;
use crate::error::ErrorKind;
use crate::models::LoginRequest;

pub struct LoginController {
    api: ApiClient,
    return_to: Route,
    pub email: String,
    pub password: String,
    pub loading: bool,
    pub error: Option<String>,
    pub effects: Effects,
}

impl LoginController {
    pub fn new(api: ApiClient, return_to: Option<Route>) -> Self {
        Self {
            api,
            return_to: return_to.unwrap_or(Route::Home),
            email: String::new(),
            password: String::new(),
            loading: false,
            error: None,
            effects: Effects::default(),
        }
    }

    /// Already logged in users are sent home.
    pub fn activate(&mut self) {
        if self.api.session().is_authenticated() {
            self.effects.navigate(Route::Home);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err("Email is required".into());
        }
        if !is_email_shaped(email) {
            return Err("Enter a valid email address".into());
        }
        if self.password.is_empty() {
            return Err("Password is required".into());
        }
        Ok(())
    }

    /// Returns true once the session is stored.
    pub async fn submit(&mut self) -> bool {
        self.error = None;
        if let Err(message) = self.validate() {
            self.error = Some(message);
            return false;
        }

        self.loading = true;
        let request = LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        };
        let result = self.api.login(&request).await;
        self.loading = false;

        match result {
            Ok(identity) => {
                tracing::info!("Login succeeded for {}", identity.username);
                self.password.clear();
                self.effects.navigate(self.return_to.clone());
                true
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                self.error = Some(match e.kind() {
                    ErrorKind::Unauthorized => e.message_or("Invalid email or password"),
                    ErrorKind::RateLimited => "Too many attempts. Try again in 1 minute.".into(),
                    _ => "Login failed. Please try again.".into(),
                });
                false
            }
        }
    }

    pub fn go_to_register(&mut self) {
        self.effects.navigate(Route::Register);
    }
}
