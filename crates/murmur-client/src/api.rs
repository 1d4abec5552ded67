//! HTTP client for the Murmur REST API.
//!
//! Thin typed wrapper over reqwest. `signup`/`login` capture the session
//! token; every later call attaches it as a bearer header. The token is
//! also what the live channel's handshake needs (see
//! [`crate::socket::LiveChannel`]).

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use murmur_shared::types::{Message, UserId, UserProfile};

use crate::error::ClientError;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: UserProfile,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiClient {
    /// Create a client against e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// The current session token, if authenticated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a response into its typed body, or the server's error message.
    async fn check<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp.json().await?)
        } else {
            let message = resp
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    pub async fn signup(
        &mut self,
        username: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/signup"))
            .json(&serde_json::json!({
                "username": username,
                "displayName": display_name,
                "password": password,
            }))
            .send()
            .await?;

        let auth: AuthResponse = Self::check(resp).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<UserProfile, ClientError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await?;

        let auth: AuthResponse = Self::check(resp).await?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    /// Revoke the session server-side and forget the token locally.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let resp = self.authed(self.http.post(self.url("/auth/logout"))).send().await?;
        let _: serde_json::Value = Self::check(resp).await?;
        self.token = None;
        Ok(())
    }

    pub async fn check_auth(&self) -> Result<UserProfile, ClientError> {
        let resp = self.authed(self.http.get(self.url("/auth/check"))).send().await?;
        Self::check(resp).await
    }

    /// Every known user except the caller.
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ClientError> {
        let resp = self
            .authed(self.http.get(self.url("/messages/users")))
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Full history with the given peer, oldest first.
    pub async fn get_messages(&self, peer: UserId) -> Result<Vec<Message>, ClientError> {
        let resp = self
            .authed(self.http.get(self.url(&format!("/messages/{peer}"))))
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Send a message; the returned record is the server-confirmed one.
    pub async fn send_message(
        &self,
        recipient: UserId,
        text: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<Message, ClientError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url(&format!("/messages/send/{recipient}")))
                    .json(&serde_json::json!({
                        "text": text,
                        "mediaUrl": media_url,
                    })),
            )
            .send()
            .await?;
        Self::check(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.url("/health"), "http://localhost:8080/health");
    }

    #[test]
    fn starts_unauthenticated() {
        let client = ApiClient::new("http://localhost:8080");
        assert!(client.token().is_none());
    }
}
