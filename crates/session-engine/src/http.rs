//! HTTP implementation of the identity collaborator.
//!
//! Talks to the two backend endpoints the session core consumes:
//! `GET /me` for identity and `GET /auth/permissions` for the permission
//! list. No other wire format is owned here.

use crate::{EngineError, EngineResult, IdentityProvider, IdentitySnapshot};
use credential_store::RoleId;
use serde::Deserialize;

/// Identity/permission client over HTTP.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    role_id: i64,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    email: Option<String>,
}

/// Permission endpoint row; only `name` is consumed.
#[derive(Debug, Deserialize)]
struct PermissionRow {
    #[allow(dead_code)]
    id: i64,
    name: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_authorized(&self, path: &str, token: &str) -> EngineResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "calling identity backend");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    EngineError::NetworkUnavailable
                } else {
                    EngineError::Http(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EngineError::AuthRejected);
        }
        if !status.is_success() {
            tracing::warn!(status = %status, path = %path, "identity backend returned unexpected status");
            return Err(EngineError::Endpoint(status.as_u16()));
        }

        Ok(response)
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn fetch_identity(&self, token: &str) -> EngineResult<IdentitySnapshot> {
        let response = self.get_authorized("/me", token).await?;
        let body: IdentityResponse = response.json().await?;

        let role = RoleId::from_backend_id(body.role_id)
            .ok_or(EngineError::UnknownRole(body.role_id))?;

        tracing::debug!(role = %role, verified = body.is_verified, "identity fetched");

        Ok(IdentitySnapshot {
            role,
            verified: body.is_verified,
            email: body.email,
        })
    }

    async fn fetch_permissions(&self, token: &str) -> EngineResult<Vec<String>> {
        let response = self.get_authorized("/auth/permissions", token).await?;
        let rows: Vec<PermissionRow> = response.json().await?;

        tracing::debug!(count = rows.len(), "permissions fetched");

        Ok(rows.into_iter().map(|row| row.name).collect())
    }
}
