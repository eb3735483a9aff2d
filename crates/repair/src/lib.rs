use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Full URL of the repair procedure, e.g. `https://<project>/rest/v1/rpc/repair_html`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("repair endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("repair endpoint returned no content")]
    EmptyResponse,
}

/// Remote HTML repair procedure. Opaque: one request, one response.
#[async_trait::async_trait]
pub trait HtmlRepair: Send + Sync {
    async fn repair(&self, html: &str) -> Result<String>;
}

#[derive(Serialize)]
struct RepairRequest<'a> {
    content: &'a str,
}

/// Calls a PostgREST-style RPC endpoint with `{"content": html}`.
///
/// The response may be the repaired HTML as a bare JSON string or an object
/// with a `content` field. A blank result is an error so a misbehaving
/// procedure can never wipe a post.
pub struct RpcRepairer {
    client: reqwest::Client,
    config: RepairConfig,
}

impl RpcRepairer {
    pub fn new(config: RepairConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build repair http client")?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl HtmlRepair for RpcRepairer {
    async fn repair(&self, html: &str) -> Result<String> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&RepairRequest { content: html });
        if let Some(key) = &self.config.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("call repair endpoint {}", self.config.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepairError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let value: serde_json::Value = response.json().await.context("decode repair response")?;
        let repaired = match value {
            serde_json::Value::String(html) => html,
            serde_json::Value::Object(mut fields) => match fields.remove("content") {
                Some(serde_json::Value::String(html)) => html,
                _ => return Err(RepairError::EmptyResponse.into()),
            },
            _ => return Err(RepairError::EmptyResponse.into()),
        };
        if repaired.trim().is_empty() {
            return Err(RepairError::EmptyResponse.into());
        }

        debug!(before = html.len(), after = repaired.len(), "html repaired remotely");
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/rpc/repair_html")
    }

    fn repairer(endpoint: String) -> RpcRepairer {
        RpcRepairer::new(RepairConfig {
            endpoint,
            api_key: Some("anon-key".to_owned()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_bare_string_response() {
        let app = Router::new().route(
            "/rpc/repair_html",
            post(|Json(body): Json<serde_json::Value>| async move {
                let html = body["content"].as_str().unwrap_or_default();
                Json(serde_json::json!(format!("{html}</p>")))
            }),
        );
        let endpoint = serve(app).await;

        let repaired = repairer(endpoint).repair("<p>aperto").await.unwrap();
        assert_eq!(repaired, "<p>aperto</p>");
    }

    #[tokio::test]
    async fn accepts_object_response() {
        let app = Router::new().route(
            "/rpc/repair_html",
            post(|| async { Json(serde_json::json!({"content": "<p>ok</p>"})) }),
        );
        let endpoint = serve(app).await;

        let repaired = repairer(endpoint).repair("<p>ok").await.unwrap();
        assert_eq!(repaired, "<p>ok</p>");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let app = Router::new().route(
            "/rpc/repair_html",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "function missing") }),
        );
        let endpoint = serve(app).await;

        let err = repairer(endpoint).repair("<p>x</p>").await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("function missing"));
    }

    #[tokio::test]
    async fn blank_result_is_rejected() {
        let app = Router::new().route(
            "/rpc/repair_html",
            post(|| async { Json(serde_json::json!("   ")) }),
        );
        let endpoint = serve(app).await;

        let err = repairer(endpoint).repair("<p>x</p>").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepairError>(),
            Some(RepairError::EmptyResponse)
        ));
    }
}
