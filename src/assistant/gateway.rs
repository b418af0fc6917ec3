//! HTTP client for the remote assistant API (threads/runs surface).
//!
//! One logical operation: submit a user turn on a thread, poll the run
//! until terminal, return the newest assistant reply. Polling is a
//! bounded wait — a fixed interval inside a hard deadline — never a
//! busy loop. The gateway does not persist or broadcast anything;
//! that sequencing belongs to the room coordinator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;
use crate::models::PersonaVariant;

use super::AssistantError;

/// Client for the assistant threads/runs REST surface.
pub struct AssistantGateway {
    base_url: String,
    api_key: String,
    emergency_persona: String,
    clinical_persona: String,
    poll_interval: Duration,
    turn_timeout: Duration,
    client: reqwest::Client,
}

impl AssistantGateway {
    pub fn new(config: AssistantConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            emergency_persona: config.emergency_persona,
            clinical_persona: config.clinical_persona,
            poll_interval: config.poll_interval,
            turn_timeout: config.turn_timeout,
            client,
        }
    }

    pub fn from_env() -> Self {
        Self::new(AssistantConfig::from_env())
    }

    /// Create a fresh conversation thread. Called once per room; the
    /// coordinator stores the returned id and reuses it for every turn.
    pub async fn create_thread(&self) -> Result<String, AssistantError> {
        let response = self
            .request(reqwest::Method::POST, "/threads")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let thread: ThreadObject = Self::parse(response).await?;
        Ok(thread.id)
    }

    /// Submit one user turn and wait for the assistant's reply.
    ///
    /// `variant` selects the persona ruleset — a pure input, not stored
    /// state. Polls every `poll_interval` until the run is terminal or
    /// `turn_timeout` elapses. No retries on failure.
    pub async fn send_turn(
        &self,
        thread_id: &str,
        content: &str,
        variant: PersonaVariant,
    ) -> Result<String, AssistantError> {
        self.append_user_message(thread_id, content).await?;
        let run_id = self.start_run(thread_id, variant).await?;

        let timeout_secs = self.turn_timeout.as_secs();
        tokio::time::timeout(
            self.turn_timeout,
            self.poll_until_terminal(thread_id, &run_id),
        )
        .await
        .map_err(|_| AssistantError::Timeout(timeout_secs))??;

        self.latest_assistant_reply(thread_id).await
    }

    fn persona_for(&self, variant: PersonaVariant) -> &str {
        match variant {
            PersonaVariant::Emergency => &self.emergency_persona,
            PersonaVariant::Clinical => &self.clinical_persona,
        }
    }

    async fn append_user_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<(), AssistantError> {
        let body = NewMessageRequest {
            role: "user",
            content,
        };
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/threads/{thread_id}/messages"),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn start_run(
        &self,
        thread_id: &str,
        variant: PersonaVariant,
    ) -> Result<String, AssistantError> {
        let body = NewRunRequest {
            assistant_id: self.persona_for(variant),
        };
        let response = self
            .request(reqwest::Method::POST, &format!("/threads/{thread_id}/runs"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let run: RunObject = Self::parse(response).await?;
        Ok(run.id)
    }

    /// Poll the run until it reaches a terminal state. `completed`
    /// returns; every other terminal state is a distinct failure. The
    /// caller bounds this loop with the turn timeout.
    async fn poll_until_terminal(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<(), AssistantError> {
        let mut tick = tokio::time::interval(self.poll_interval);
        loop {
            tick.tick().await;
            let response = self
                .request(
                    reqwest::Method::GET,
                    &format!("/threads/{thread_id}/runs/{run_id}"),
                )
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            let run: RunObject = Self::parse(response).await?;

            match run.status.as_str() {
                "completed" => return Ok(()),
                "failed" | "cancelled" | "expired" | "requires_action" => {
                    return Err(AssistantError::Turn(run.status))
                }
                // queued / in_progress — keep waiting
                _ => {}
            }
        }
    }

    /// Fetch the newest assistant-authored message on the thread.
    async fn latest_assistant_reply(&self, thread_id: &str) -> Result<String, AssistantError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/threads/{thread_id}/messages?order=desc&limit=20"),
            )
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let list: MessageListObject = Self::parse(response).await?;

        let reply = list
            .data
            .iter()
            .find(|m| m.role == "assistant")
            .map(|m| {
                m.content
                    .iter()
                    .filter_map(|c| c.text.as_ref())
                    .map(|t| t.value.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                AssistantError::MalformedResponse("no assistant reply on thread".into())
            })?;
        Ok(reply)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn transport_error(&self, e: reqwest::Error) -> AssistantError {
        if e.is_connect() {
            AssistantError::Http(format!("cannot reach assistant API at {}", self.base_url))
        } else if e.is_timeout() {
            AssistantError::Http("request timed out".into())
        } else {
            AssistantError::Http(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AssistantError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AssistantError> {
        let response = Self::check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AssistantError::MalformedResponse(e.to_string()))
    }
}

#[derive(Serialize)]
struct NewMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct NewRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct MessageListObject {
    data: Vec<MessageObject>,
}

#[derive(Deserialize)]
struct MessageObject {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    text: Option<ContentText>,
}

#[derive(Deserialize)]
struct ContentText {
    value: String,
}
