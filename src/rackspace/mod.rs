//! Rackspace Cloud Servers adapter.
//!
//! Authenticates against identity v2 with an API key, picks the compute
//! endpoint for the configured region from the service catalogue, and talks
//! to the OpenStack compute v2 API with the issued token.

mod types;

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::RackspaceConfig;
use crate::provider::{
    Credentials, Provider, ProviderError, ProviderFuture, RebootMode, ServerDetails, ServerId,
    ServerSpec,
};
use types::{
    CreateKeypairRequest, CreateServerRequest, KeypairEnvelope, RebootRequest, ServerEnvelope,
    TokenRequest, TokenResponse, fault_message,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Authenticated Rackspace session.
#[derive(Clone, Eq, PartialEq)]
pub struct RackspaceSession {
    token: String,
    compute_url: String,
}

impl RackspaceSession {
    /// Compute endpoint selected for the session's region.
    #[must_use]
    pub fn compute_url(&self) -> &str {
        &self.compute_url
    }
}

impl fmt::Debug for RackspaceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RackspaceSession")
            .field("token", &"<redacted>")
            .field("compute_url", &self.compute_url)
            .finish()
    }
}

/// Provider that talks to Rackspace over HTTPS.
#[derive(Clone, Debug)]
pub struct RackspaceProvider {
    identity_endpoint: String,
}

impl RackspaceProvider {
    /// Creates a provider using the configured identity endpoint.
    #[must_use]
    pub fn new(config: &RackspaceConfig) -> Self {
        Self::with_identity_endpoint(config.identity_endpoint.trim())
    }

    /// Creates a provider against an explicit identity endpoint.
    #[must_use]
    pub fn with_identity_endpoint(endpoint: &str) -> Self {
        Self {
            identity_endpoint: endpoint.trim_end_matches('/').to_owned(),
        }
    }

    async fn send<B: Serialize + Sync>(
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<(StatusCode, Vec<u8>), ProviderError> {
        debug!(%method, url, "provider request");
        let mut request = HTTP_CLIENT
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(value) = token {
            request = request.header(AUTH_TOKEN_HEADER, value);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok((status, bytes.to_vec()))
    }

    async fn compute<B: Serialize + Sync>(
        session: &RackspaceSession,
        method: Method,
        path: &str,
        body: Option<&B>,
        resource: &'static str,
        id: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = format!("{}/{path}", session.compute_url);
        let (status, bytes) = Self::send(method, &url, Some(&session.token), body).await?;
        check_status(status, &bytes, resource, id)?;
        Ok(bytes)
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        message: err.to_string(),
    }
}

fn check_status(
    status: StatusCode,
    body: &[u8],
    resource: &'static str,
    id: &str,
) -> Result<(), ProviderError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(ProviderError::Authentication {
            message: fault_message(body),
        }),
        StatusCode::NOT_FOUND => Err(ProviderError::NotFound {
            resource,
            id: id.to_owned(),
        }),
        other => Err(ProviderError::Api {
            status: other.as_u16(),
            message: fault_message(body),
        }),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(body).map_err(|err| ProviderError::Api {
        status: StatusCode::OK.as_u16(),
        message: format!("unexpected response body: {err}"),
    })
}

const NO_BODY: Option<&()> = None;

impl Provider for RackspaceProvider {
    type Session = RackspaceSession;

    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> ProviderFuture<'a, Self::Session> {
        Box::pin(async move {
            let url = format!("{}/tokens", self.identity_endpoint);
            let payload = TokenRequest::new(credentials);
            let (status, body) = Self::send(Method::POST, &url, None, Some(&payload)).await?;
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                return Err(ProviderError::Authentication {
                    message: fault_message(&body),
                });
            }
            check_status(status, &body, "identity", &credentials.username)?;

            let response: TokenResponse = decode(&body)?;
            let (token, compute_url) = response.into_session_parts(&credentials.region)?;
            debug!(compute_url = %compute_url, "authenticated");
            Ok(RackspaceSession { token, compute_url })
        })
    }

    fn create_server<'a>(
        &'a self,
        session: &'a Self::Session,
        spec: &'a ServerSpec,
    ) -> ProviderFuture<'a, ServerId> {
        Box::pin(async move {
            let payload = CreateServerRequest::new(spec);
            let body = Self::compute(
                session,
                Method::POST,
                "servers",
                Some(&payload),
                "server",
                &spec.name,
            )
            .await?;
            let envelope: ServerEnvelope = decode(&body)?;
            Ok(ServerId::new(envelope.server.id))
        })
    }

    fn get_server<'a>(
        &'a self,
        session: &'a Self::Session,
        id: &'a ServerId,
    ) -> ProviderFuture<'a, ServerDetails> {
        Box::pin(async move {
            let path = format!("servers/{id}");
            let body = Self::compute(session, Method::GET, &path, NO_BODY, "server", id.as_str())
                .await?;
            let envelope: ServerEnvelope = decode(&body)?;
            let server = envelope.server;
            Ok(ServerDetails {
                ipv4: server.ipv4(),
                status: server.status.unwrap_or_default(),
                id: ServerId::new(server.id),
            })
        })
    }

    fn delete_server<'a>(
        &'a self,
        session: &'a Self::Session,
        id: &'a ServerId,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("servers/{id}");
            Self::compute(session, Method::DELETE, &path, NO_BODY, "server", id.as_str()).await?;
            Ok(())
        })
    }

    fn reboot_server<'a>(
        &'a self,
        session: &'a Self::Session,
        id: &'a ServerId,
        mode: RebootMode,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("servers/{id}/action");
            let payload = RebootRequest::new(mode.as_str());
            Self::compute(
                session,
                Method::POST,
                &path,
                Some(&payload),
                "server",
                id.as_str(),
            )
            .await?;
            Ok(())
        })
    }

    fn create_keypair<'a>(
        &'a self,
        session: &'a Self::Session,
        name: &'a str,
        public_key: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let payload = CreateKeypairRequest::new(name, public_key);
            let body = Self::compute(
                session,
                Method::POST,
                "os-keypairs",
                Some(&payload),
                "keypair",
                name,
            )
            .await?;
            let envelope: KeypairEnvelope = decode(&body)?;
            Ok(envelope.keypair.name)
        })
    }

    fn delete_keypair<'a>(
        &'a self,
        session: &'a Self::Session,
        name: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("os-keypairs/{name}");
            Self::compute(session, Method::DELETE, &path, NO_BODY, "keypair", name).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests;
