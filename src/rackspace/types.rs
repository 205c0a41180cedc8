//! Wire types for the Rackspace identity and compute APIs.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::provider::{Credentials, ProviderError, ServerSpec};

/// Service catalogue type of the compute endpoint.
pub(super) const COMPUTE_SERVICE_TYPE: &str = "compute";
/// Service catalogue name of the next-generation compute endpoint.
pub(super) const COMPUTE_SERVICE_NAME: &str = "cloudServersOpenStack";

#[derive(Serialize)]
pub(super) struct TokenRequest<'a> {
    auth: TokenAuth<'a>,
}

#[derive(Serialize)]
struct TokenAuth<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    api_key_credentials: ApiKeyCredentials<'a>,
}

#[derive(Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

impl<'a> TokenRequest<'a> {
    pub(super) fn new(credentials: &'a Credentials) -> Self {
        Self {
            auth: TokenAuth {
                api_key_credentials: ApiKeyCredentials {
                    username: &credentials.username,
                    api_key: &credentials.api_key,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

impl TokenResponse {
    /// Returns the token and the compute endpoint for `region`.
    pub(super) fn into_session_parts(self, region: &str) -> Result<(String, String), ProviderError> {
        let Access {
            token,
            service_catalog,
        } = self.access;
        let endpoint = service_catalog
            .into_iter()
            .filter(|entry| entry.kind == COMPUTE_SERVICE_TYPE && entry.name == COMPUTE_SERVICE_NAME)
            .flat_map(|entry| entry.endpoints)
            .find(|endpoint| {
                endpoint
                    .region
                    .as_deref()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(region))
            })
            .ok_or_else(|| ProviderError::MissingEndpoint {
                region: region.to_owned(),
            })?;
        Ok((
            token.id,
            endpoint.public_url.trim_end_matches('/').to_owned(),
        ))
    }
}

#[derive(Serialize)]
pub(super) struct CreateServerRequest<'a> {
    server: CreateServerBody<'a>,
}

#[derive(Serialize)]
struct CreateServerBody<'a> {
    name: &'a str,
    #[serde(rename = "imageRef")]
    image_ref: &'a str,
    #[serde(rename = "flavorRef")]
    flavor_ref: &'a str,
    key_name: &'a str,
    #[serde(rename = "OS-DCF:diskConfig")]
    disk_config: &'static str,
}

impl<'a> CreateServerRequest<'a> {
    pub(super) fn new(spec: &'a ServerSpec) -> Self {
        Self {
            server: CreateServerBody {
                name: &spec.name,
                image_ref: &spec.image_id,
                flavor_ref: &spec.flavor_id,
                key_name: &spec.keypair_name,
                disk_config: spec.disk_config.as_str(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerEnvelope {
    pub(super) server: ServerBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerBody {
    pub(super) id: String,
    #[serde(default)]
    pub(super) status: Option<String>,
    #[serde(rename = "accessIPv4", default)]
    access_ipv4: Option<String>,
    #[serde(default)]
    addresses: Option<Addresses>,
}

#[derive(Debug, Deserialize)]
struct Addresses {
    #[serde(default)]
    public: Vec<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    addr: String,
    version: u8,
}

impl ServerBody {
    /// Public IPv4 address, preferring `accessIPv4` over the address list.
    pub(super) fn ipv4(&self) -> Option<Ipv4Addr> {
        let access = self
            .access_ipv4
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok());
        access.or_else(|| {
            self.addresses
                .iter()
                .flat_map(|addresses| addresses.public.iter())
                .filter(|address| address.version == 4)
                .find_map(|address| address.addr.parse().ok())
        })
    }
}

#[derive(Serialize)]
pub(super) struct RebootRequest {
    reboot: RebootBody,
}

#[derive(Serialize)]
struct RebootBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl RebootRequest {
    pub(super) const fn new(kind: &'static str) -> Self {
        Self {
            reboot: RebootBody { kind },
        }
    }
}

#[derive(Serialize)]
pub(super) struct CreateKeypairRequest<'a> {
    keypair: KeypairBody<'a>,
}

#[derive(Serialize)]
struct KeypairBody<'a> {
    name: &'a str,
    public_key: &'a str,
}

impl<'a> CreateKeypairRequest<'a> {
    pub(super) const fn new(name: &'a str, public_key: &'a str) -> Self {
        Self {
            keypair: KeypairBody { name, public_key },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct KeypairEnvelope {
    pub(super) keypair: KeypairName,
}

#[derive(Debug, Deserialize)]
pub(super) struct KeypairName {
    pub(super) name: String,
}

/// Extracts the `message` of a fault body such as
/// `{"itemNotFound": {"message": "...", "code": 404}}`, falling back to the
/// raw body.
pub(super) fn fault_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value.as_object().and_then(|fault| {
                fault
                    .values()
                    .find_map(|detail| detail.get("message").and_then(serde_json::Value::as_str))
                    .map(str::to_owned)
            })
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_owned())
}
