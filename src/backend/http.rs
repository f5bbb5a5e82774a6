use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    BackendError, BackendResult, ContestBackend, ContestResult, JoinReceipt, ParticipationStatus,
    SubmitReceipt, SubmitRequest, ViolationAck,
};
use crate::types::Contest;

/// HTTP implementation of the backend contracts.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map an HTTP response to either the parsed body or a typed error.
    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
        let status = response.status();
        match status {
            StatusCode::CONFLICT => Err(BackendError::AlreadySubmitted),
            StatusCode::FORBIDDEN => Err(BackendError::ContestRunning),
            s if s.is_client_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(BackendError::Rejected(body))
            }
            s if !s.is_success() => Err(BackendError::Status(s.as_u16())),
            _ => response
                .json::<T>()
                .await
                .map_err(|e| BackendError::Parse(e.to_string())),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::read(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> BackendResult<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::read(response).await
    }
}

#[derive(Debug, Serialize)]
struct JoinBody<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_code: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ViolationBody<'a> {
    participation_id: &'a str,
    label: &'a str,
}

#[async_trait]
impl ContestBackend for HttpBackend {
    async fn fetch_contest(&self, contest_id: &str) -> BackendResult<Contest> {
        self.get(&format!("/api/contests/{}", contest_id)).await
    }

    async fn participation_status(
        &self,
        contest_id: &str,
        user_id: &str,
    ) -> BackendResult<ParticipationStatus> {
        self.get(&format!(
            "/api/contests/{}/participation?user={}",
            contest_id, user_id
        ))
        .await
    }

    async fn join(
        &self,
        contest_id: &str,
        user_id: &str,
        access_code: Option<&str>,
    ) -> BackendResult<JoinReceipt> {
        self.post(
            &format!("/api/contests/{}/join", contest_id),
            &JoinBody {
                user_id,
                access_code,
            },
        )
        .await
    }

    async fn report_violation(
        &self,
        contest_id: &str,
        participation_id: &str,
        label: &str,
    ) -> BackendResult<ViolationAck> {
        self.post(
            &format!("/api/contests/{}/violations", contest_id),
            &ViolationBody {
                participation_id,
                label,
            },
        )
        .await
    }

    async fn submit(
        &self,
        contest_id: &str,
        participation_id: &str,
        request: &SubmitRequest,
    ) -> BackendResult<SubmitReceipt> {
        self.post(
            &format!(
                "/api/contests/{}/participations/{}/submit",
                contest_id, participation_id
            ),
            request,
        )
        .await
    }

    async fn result(
        &self,
        contest_id: &str,
        participation_id: &str,
    ) -> BackendResult<ContestResult> {
        self.get(&format!(
            "/api/contests/{}/result?participation={}",
            contest_id, participation_id
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:9090/".to_string());
        assert_eq!(
            backend.url("/api/contests/c1"),
            "http://localhost:9090/api/contests/c1"
        );
    }

    #[tokio::test]
    async fn test_transport_error_on_unreachable_host() {
        // Port 1 on localhost is never listening.
        let backend = HttpBackend::new("http://127.0.0.1:1".to_string());
        let result = backend.fetch_contest("c1").await;
        match result {
            Err(BackendError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
