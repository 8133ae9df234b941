use super::{is_email_shaped, Effects, Route};
use crate::api::ApiClient;
use crate::models::RegisterRequest;

pub struct RegisterController {
    api: ApiClient,
    pub form: RegisterRequest,
    pub loading: bool,
    pub error: Option<String>,
    pub success: Option<String>,
    pub effects: Effects,
}

fn check_len(value: &str, min: usize, label: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", label));
    }
    if value.chars().count() < min {
        return Err(format!("{} must be at least {} characters", label, min));
    }
    Ok(())
}

/// Field rules in form order; the first failure is reported.
pub fn validate(form: &RegisterRequest) -> Result<(), String> {
    let username_len = form.username.trim().chars().count();
    if username_len == 0 {
        return Err("Username is required".into());
    }
    if !(3..=20).contains(&username_len) {
        return Err("Username must be 3-20 characters".into());
    }

    let email = form.email.trim();
    if email.is_empty() {
        return Err("Email is required".into());
    }
    if !is_email_shaped(email) {
        return Err("Enter a valid email address".into());
    }

    if form.password.is_empty() {
        return Err("Password is required".into());
    }
    if form.password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".into());
    }
    if form.confirm_password.is_empty() {
        return Err("Confirm your password".into());
    }

    check_len(&form.first_name, 2, "First name")?;
    check_len(&form.last_name, 2, "Last name")?;
    check_len(&form.address, 5, "Address")?;

    if form.password != form.confirm_password {
        return Err("Passwords do not match!".into());
    }
    Ok(())
}

impl RegisterController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            form: RegisterRequest::default(),
            loading: false,
            error: None,
            success: None,
            effects: Effects::default(),
        }
    }

    pub async fn submit(&mut self) -> bool {
        self.error = None;
        self.success = None;
        if let Err(message) = validate(&self.form) {
            self.error = Some(message);
            return false;
        }

        let request = RegisterRequest {
            username: self.form.username.trim().to_string(),
            email: self.form.email.trim().to_string(),
            first_name: self.form.first_name.trim().to_string(),
            last_name: self.form.last_name.trim().to_string(),
            address: self.form.address.trim().to_string(),
            ..self.form.clone()
        };

        self.loading = true;
        let result = self.api.register(&request).await;
        self.loading = false;

        match result {
            Ok(identity) => {
                tracing::info!("Registered {}", identity.username);
                self.success = Some(
                    "Registration successful! Check your email to activate your account.".into(),
                );
                self.effects.navigate(Route::Login);
                true
            }
            Err(e) => {
                tracing::warn!("Registration failed: {}", e);
                self.error = Some(e.message_or("Registration failed. Please try again."));
                false
            }
        }
    }

    /// Follow an activation link's token.
    pub async fn activate(&mut self, token: &str) -> bool {
        self.error = None;
        self.success = None;
        if token.trim().is_empty() {
            self.error = Some("Activation token is missing".into());
            return false;
        }

        match self.api.activate_account(token.trim()).await {
            Ok(message) => {
                self.success = Some(message);
                self.effects.navigate(Route::Login);
                true
            }
            Err(e) => {
                tracing::warn!("Activation failed: {}", e);
                self.error = Some(e.message_or("Account activation failed."));
                false
            }
        }
    }
}
