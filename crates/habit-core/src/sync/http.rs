//! REST gateway for the habit API.
//!
//! Routes:
//! - `GET    {base}/habits?userId={owner}`
//! - `PUT    {base}/habits/{id}` (falls back to `POST {base}/habits` on 404)
//! - `DELETE {base}/habits/{id}` (404 counts as already deleted)

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::HabitId;
use crate::util::{canonical_base_url, compact_text};

use super::gateway::{GatewayError, GatewayResult, RemoteGateway, RemoteHabit};

#[derive(Clone, Debug)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Unavailable(error.to_string()))?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn habits_url(&self) -> String {
        format!("{}/habits", self.base_url)
    }

    fn habit_url(&self, id: &str) -> String {
        format!("{}/habits/{}", self.base_url, urlencoding::encode(id))
    }
}

impl RemoteGateway for HttpGateway {
    async fn list_records(&self, owner_id: &str) -> GatewayResult<Vec<RemoteHabit>> {
        let url = format!(
            "{}?userId={}",
            self.habits_url(),
            urlencoding::encode(owner_id)
        );
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        read_json(ensure_success(response).await?).await
    }

    async fn upsert_record(&self, habit: &RemoteHabit) -> GatewayResult<RemoteHabit> {
        let id = habit
            .id
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidPayload("habit has no id".to_string()))?;

        let response = self
            .client
            .put(self.habit_url(id))
            .json(habit)
            .send()
            .await
            .map_err(transport_error)?;

        let response = if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Habit {id} unknown to server, creating it");
            self.client
                .post(self.habits_url())
                .json(habit)
                .send()
                .await
                .map_err(transport_error)?
        } else {
            response
        };

        let response = ensure_success(response).await?;
        // Some servers answer 204 with no body; the upload is still confirmed.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(habit.clone());
        }
        read_json(response).await
    }

    async fn delete_record(&self, id: &HabitId) -> GatewayResult<()> {
        let response = self
            .client
            .delete(self.habit_url(id.as_str()))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Habit {id} already absent on server");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let body = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|error| {
        GatewayError::InvalidPayload(format!("{error}: {}", compact_text(&body)))
    })
}

fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let message = parse_api_error(body);
    if status.is_client_error() {
        GatewayError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        GatewayError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    GatewayError::Transport(error.to_string())
}

fn normalize_base_url(raw: String) -> GatewayResult<String> {
    canonical_base_url(&raw)
        .map_err(|reason| GatewayError::Unavailable(format!("base URL {reason}")))
}
