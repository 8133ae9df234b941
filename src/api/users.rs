use reqwest::Method;

use super::ApiClient;
use crate::error::ClientResult;
use crate::models::Identity;

impl ApiClient {
    /// Public profile of any user.
    pub async fn user(&self, username: &str) -> ClientResult<Identity> {
        let url = self.endpoint(&["api", "users", username])?;
        self.send_json(self.request(Method::GET, url)).await
    }
}
