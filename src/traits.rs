use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait DiscordApi: Send + Sync {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), AppError>;

    /// Fetch a message's author display name and content (reply-context path).
    async fn get_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(String, String), AppError>;

    async fn trigger_typing(&self, channel_id: &str) -> Result<(), AppError>;

    /// Fetch a guild's name and approximate member count (`/server` command).
    async fn get_guild(&self, guild_id: &str) -> Result<(String, u64), AppError>;

    async fn create_response(
        &self,
        interaction_id: &str,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<(), AppError>;

    async fn defer_response(&self, interaction_id: &str, token: &str) -> Result<(), AppError>;

    async fn edit_response(&self, token: &str, content: &str) -> Result<(), AppError>;

    /// Overwrite the application's global slash-command set. Returns the
    /// number of commands accepted.
    async fn register_commands(&self, commands: &Value) -> Result<usize, AppError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, AppError>;
}

pub(crate) struct DiscordHttpApi {
    pub(crate) http: Client,
    pub(crate) api_url: String,
    pub(crate) token: String,
    pub(crate) application_id: String,
}

impl DiscordHttpApi {
    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

#[async_trait]
impl DiscordApi for DiscordHttpApi {
    async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), AppError> {
        let url = format!("{}/channels/{}/messages", self.api_url, channel_id);
        let mut body = serde_json::json!({
            "content": content,
            "allowed_mentions": { "parse": [] },
        });
        if let Some(message_id) = reply_to {
            body["message_reference"] = serde_json::json!({ "message_id": message_id });
        }

        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Discord send failed");
            return Err(AppError::Discord(format!("Send failed: {status}")));
        }
        Ok(())
    }

    async fn get_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(String, String), AppError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_url, channel_id, message_id
        );
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::Discord(format!(
                "Message fetch failed: {}",
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        let author = body["author"]["username"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        let content = body["content"].as_str().unwrap_or_default().to_string();
        Ok((author, content))
    }

    async fn trigger_typing(&self, channel_id: &str) -> Result<(), AppError> {
        let url = format!("{}/channels/{}/typing", self.api_url, channel_id);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            debug!("Typing indicator failed: {}", resp.status());
        }
        Ok(())
    }

    async fn get_guild(&self, guild_id: &str) -> Result<(String, u64), AppError> {
        let url = format!("{}/guilds/{}?with_counts=true", self.api_url, guild_id);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::Discord(format!(
                "Guild fetch failed: {}",
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        let name = body["name"].as_str().unwrap_or("unknown").to_string();
        let members = body["approximate_member_count"].as_u64().unwrap_or(0);
        Ok((name, members))
    }

    async fn create_response(
        &self,
        interaction_id: &str,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/interactions/{}/{}/callback",
            self.api_url, interaction_id, token
        );
        let mut data = serde_json::json!({ "content": content });
        if ephemeral {
            data["flags"] = serde_json::json!(64);
        }
        let body = serde_json::json!({ "type": 4, "data": data });

        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AppError::Discord(format!(
                "Interaction response failed: {status}"
            )));
        }
        Ok(())
    }

    async fn defer_response(&self, interaction_id: &str, token: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/interactions/{}/{}/callback",
            self.api_url, interaction_id, token
        );
        let body = serde_json::json!({ "type": 5 });
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Discord(format!(
                "Interaction defer failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn edit_response(&self, token: &str, content: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.api_url, self.application_id, token
        );
        let body = serde_json::json!({ "content": content });
        let resp = self.http.patch(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Discord(format!(
                "Interaction edit failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn register_commands(&self, commands: &Value) -> Result<usize, AppError> {
        let url = format!(
            "{}/applications/{}/commands",
            self.api_url, self.application_id
        );
        let resp = self
            .http
            .put(&url)
            .header("Authorization", self.auth())
            .json(commands)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Command registration failed");
            return Err(AppError::Discord(format!(
                "Command registration failed: {status}"
            )));
        }
        let body: Value = resp.json().await?;
        Ok(body.as_array().map(|a| a.len()).unwrap_or(0))
    }
}

pub(crate) struct LlmHttpClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
}

#[async_trait]
impl LlmClient for LlmHttpClient {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, AppError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), model);
        let request = if model == "blackbox" {
            self.http.get(&url).query(&[
                ("text_prompt", prompt),
                ("system_prompt", crate::constants::LLM_SYSTEM_PROMPT),
                ("search_mode", "false"),
                ("think_mode", "false"),
            ])
        } else {
            self.http.get(&url).query(&[("text", prompt)])
        };

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "LLM request failed");
            return Err(AppError::Llm(format!("HTTP {status}")));
        }

        let body: Value = resp.json().await?;
        if body["code"].as_i64() == Some(200) {
            if let Some(content) = body["response"]["content"].as_str() {
                debug!(model = %model, chars = content.len(), "LLM response received");
                return Ok(content.to_string());
            }
        }
        Err(AppError::Llm(
            "unexpected response format: 'content' key not found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discord_api(server: &wiremock::MockServer) -> DiscordHttpApi {
        DiscordHttpApi {
            http: Client::new(),
            api_url: server.uri(),
            token: "test-token".to_string(),
            application_id: "app123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/channels/c1/messages"))
            .and(wiremock::matchers::header("Authorization", "Bot test-token"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        assert!(api.send_message("c1", "hello", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_message_with_reply_reference() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/channels/c1/messages"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "message_reference": { "message_id": "m42" }
            })))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        assert!(api.send_message("c1", "hello", Some("m42")).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_message_failure_maps_to_discord_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/channels/c1/messages"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        let err = api.send_message("c1", "hello", None).await.unwrap_err();
        assert!(matches!(err, AppError::Discord(_)));
    }

    #[tokio::test]
    async fn test_get_message_extracts_author_and_content() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/channels/c1/messages/m7"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "author": { "username": "alice" },
                "content": "original text"
            })))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        let (author, content) = api.get_message("c1", "m7").await.unwrap();
        assert_eq!(author, "alice");
        assert_eq!(content, "original text");
    }

    #[tokio::test]
    async fn test_trigger_typing_tolerates_failure() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/channels/c1/typing"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        assert!(api.trigger_typing("c1").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_response_plain() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/interactions/i1/tok/callback"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "type": 4,
                "data": { "content": "Pong!" }
            })))
            .respond_with(wiremock::ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        assert!(api.create_response("i1", "tok", "Pong!", false).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_response_ephemeral_sets_flags() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/interactions/i1/tok/callback"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "data": { "flags": 64 }
            })))
            .respond_with(wiremock::ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        assert!(api.create_response("i1", "tok", "secret", true).await.is_ok());
    }

    #[tokio::test]
    async fn test_defer_then_edit_response() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/interactions/i1/tok/callback"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({ "type": 5 })))
            .respond_with(wiremock::ResponseTemplate::new(204))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("PATCH"))
            .and(wiremock::matchers::path(
                "/webhooks/app123/tok/messages/@original",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        assert!(api.defer_response("i1", "tok").await.is_ok());
        assert!(api.edit_response("tok", "answer").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_commands_counts_result() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .and(wiremock::matchers::path("/applications/app123/commands"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"name": "ask"}, {"name": "ping"}])),
            )
            .mount(&server)
            .await;
        let api = discord_api(&server);
        let count = api
            .register_commands(&serde_json::json!([{"name": "ask"}, {"name": "ping"}]))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_get_guild_with_counts() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/guilds/g9"))
            .and(wiremock::matchers::query_param("with_counts", "true"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Rustaceans",
                "approximate_member_count": 1234
            })))
            .mount(&server)
            .await;
        let api = discord_api(&server);
        let (name, members) = api.get_guild("g9").await.unwrap();
        assert_eq!(name, "Rustaceans");
        assert_eq!(members, 1234);
    }

    // --- LLM client ---

    fn llm_client(server: &wiremock::MockServer) -> LlmHttpClient {
        LlmHttpClient {
            http: Client::new(),
            base_url: server.uri(),
        }
    }

    #[tokio::test]
    async fn test_llm_complete_success() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/copilot"))
            .and(wiremock::matchers::query_param("text", "hello"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "response": { "content": "hi from the model" }
            })))
            .mount(&server)
            .await;
        let client = llm_client(&server);
        let reply = client.complete("hello", "copilot").await.unwrap();
        assert_eq!(reply, "hi from the model");
    }

    #[tokio::test]
    async fn test_llm_blackbox_request_shape() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/blackbox"))
            .and(wiremock::matchers::query_param("text_prompt", "hello"))
            .and(wiremock::matchers::query_param("search_mode", "false"))
            .and(wiremock::matchers::query_param("think_mode", "false"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "response": { "content": "bb reply" }
            })))
            .mount(&server)
            .await;
        let client = llm_client(&server);
        assert_eq!(client.complete("hello", "blackbox").await.unwrap(), "bb reply");
    }

    #[tokio::test]
    async fn test_llm_http_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/copilot"))
            .respond_with(wiremock::ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        let client = llm_client(&server);
        let err = client.complete("hello", "copilot").await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_llm_missing_content_key() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/copilot"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "code": 200, "response": {} })),
            )
            .mount(&server)
            .await;
        let client = llm_client(&server);
        let err = client.complete("hello", "copilot").await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
        assert!(err.to_string().contains("content"));
    }

    #[tokio::test]
    async fn test_llm_wrong_code_field() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/copilot"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 500,
                "response": { "content": "should be ignored" }
            })))
            .mount(&server)
            .await;
        let client = llm_client(&server);
        assert!(client.complete("hello", "copilot").await.is_err());
    }
}
