use reqwest::Method;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::{Identity, LoginRequest, LoginResponse, RegisterRequest};

impl ApiClient {
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Identity> {
        let url = self.endpoint(&["auth", "register"])?;
        self.send_json(self.request(Method::POST, url).json(request))
            .await
    }

    /// Log in and store the returned credential and identity in the session.
    pub async fn login(&self, request: &LoginRequest) -> ClientResult<Identity> {
        let url = self.endpoint(&["auth", "login"])?;
        let response: LoginResponse = self
            .send_json(self.request(Method::POST, url).json(request))
            .await?;

        self.session()
            .set_session(&response.token, response.user.clone())?;
        Ok(response.user)
    }

    pub fn logout(&self) -> ClientResult<()> {
        self.session().clear_session()?;
        Ok(())
    }

    /// Returns the server's confirmation text.
    pub async fn activate_account(&self, token: &str) -> ClientResult<String> {
        let mut url = self.endpoint(&["auth", "activate"])?;
        url.query_pairs_mut().append_pair("token", token);
        self.send_text(self.request(Method::GET, url)).await
    }
}
