//! HTTP implementation of the orchestrator contract.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::types::{
    Address, Flavor, Image, Instance, InstanceSpec, Network, NetworkAdapter, SecurityGroup, Volume,
};
use super::Orchestrator;
use crate::error::{Error, Result};

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging: truncate long responses and strip
/// non-printable characters.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        // Back the cut off to a char boundary; bodies are not always ASCII.
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..end],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull a human-readable message out of an error body, falling back to the
/// status code.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("orchestrator returned {}", status))
}

/// Classify a non-success response into the error taxonomy.
fn classify(status: StatusCode, retry_after: Option<u64>, body: &str) -> Error {
    let message = error_message(status, body);
    match status {
        StatusCode::BAD_REQUEST => Error::BadRequest(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Forbidden(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::TOO_MANY_REQUESTS => Error::QuotaExceeded {
            message,
            retry_after,
        },
        _ => Error::Upstream(message),
    }
}

/// Orchestrator client speaking the REST API over HTTPS with bearer-token
/// auth.
#[derive(Clone, Debug)]
pub struct HttpOrchestrator {
    http: Client,
    base: String,
    token: String,
}

impl HttpOrchestrator {
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| Error::bad_request(format!("invalid orchestrator endpoint: {}", e)))?;
        let http = Client::builder()
            .user_agent(concat!("stratus/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::upstream(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Read the body, logging and classifying non-success statuses.
    async fn read_body(&self, response: Response) -> Result<String> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .map_err(|e| Error::upstream(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(classify(status, retry_after, &body));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("failed to send request: {}", e)))?;
        let body = self.read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::upstream(format!("failed to parse response JSON: {}", e)))
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let body = self.post_raw(path, Some(body)).await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::upstream(format!("failed to parse response JSON: {}", e)))
    }

    /// POST where the caller only cares about success.
    async fn post(&self, path: &str, body: Option<&Value>) -> Result<()> {
        self.post_raw(path, body).await.map(|_| ())
    }

    async fn post_raw(&self, path: &str, body: Option<&Value>) -> Result<String> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);
        let mut request = self.http.post(&url).bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::upstream(format!("failed to send request: {}", e)))?;
        self.read_body(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        tracing::debug!("DELETE {}", url);
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("failed to send request: {}", e)))?;
        self.read_body(response).await.map(|_| ())
    }
}

#[derive(Deserialize)]
struct Instances {
    instances: Vec<Instance>,
}

#[derive(Deserialize)]
struct Adapters {
    adapters: Vec<NetworkAdapter>,
}

#[derive(Deserialize)]
struct Pools {
    pools: Vec<String>,
}

#[derive(Deserialize)]
struct Networks {
    networks: Vec<Network>,
}

#[derive(Deserialize)]
struct Images {
    images: Vec<Image>,
}

#[derive(Deserialize)]
struct Flavors {
    flavors: Vec<Flavor>,
}

#[derive(Deserialize)]
struct Groups {
    groups: Vec<SecurityGroup>,
}

fn seg(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[async_trait]
impl Orchestrator for HttpOrchestrator {
    async fn create_instances(&self, spec: InstanceSpec) -> Result<Vec<Instance>> {
        let body = serde_json::to_value(&spec)
            .map_err(|e| Error::upstream(format!("failed to encode instance spec: {}", e)))?;
        let listing: Instances = self.post_json("/compute/instances", &body).await?;
        Ok(listing.instances)
    }

    async fn instance(&self, id: &str) -> Result<Instance> {
        self.get_json(&format!("/compute/instances/{}", seg(id))).await
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.delete(&format!("/compute/instances/{}", seg(id))).await
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        self.post(&format!("/compute/instances/{}/start", seg(id)), None)
            .await
    }

    async fn stop_instance(&self, id: &str) -> Result<()> {
        self.post(&format!("/compute/instances/{}/stop", seg(id)), None)
            .await
    }

    async fn restart_instance(&self, id: &str, hard: bool) -> Result<()> {
        let body = json!({ "hard": hard });
        self.post(&format!("/compute/instances/{}/restart", seg(id)), Some(&body))
            .await
    }

    async fn suspend_instance(&self, id: &str) -> Result<()> {
        self.post(&format!("/compute/instances/{}/suspend", seg(id)), None)
            .await
    }

    async fn resize_instance(&self, id: &str, flavor: &str) -> Result<()> {
        let body = json!({ "flavor": flavor });
        self.post(&format!("/compute/instances/{}/resize", seg(id)), Some(&body))
            .await
    }

    async fn rebuild_instance(&self, id: &str, image: &str) -> Result<()> {
        let body = json!({ "image": image });
        self.post(&format!("/compute/instances/{}/rebuild", seg(id)), Some(&body))
            .await
    }

    async fn set_admin_password(&self, id: &str, password: &str) -> Result<()> {
        let body = json!({ "password": password });
        self.post(&format!("/compute/instances/{}/password", seg(id)), Some(&body))
            .await
    }

    async fn snapshot_instance(&self, id: &str, name: &str) -> Result<()> {
        let body = json!({ "name": name });
        self.post(&format!("/compute/instances/{}/snapshot", seg(id)), Some(&body))
            .await
    }

    async fn instance_adapters(&self, id: &str) -> Result<Vec<NetworkAdapter>> {
        let listing: Adapters = self
            .get_json(&format!("/compute/instances/{}/adapters", seg(id)))
            .await?;
        Ok(listing.adapters)
    }

    async fn allocate_address(&self, pool: Option<&str>) -> Result<Address> {
        let body = match pool {
            Some(pool) => json!({ "pool": pool }),
            None => json!({}),
        };
        self.post_json("/network/addresses", &body).await
    }

    async fn release_address(&self, address: &str) -> Result<()> {
        self.delete(&format!("/network/addresses/{}", seg(address))).await
    }

    async fn associate_address(&self, instance: &str, address: &str) -> Result<()> {
        let body = json!({ "instance": instance });
        self.post(
            &format!("/network/addresses/{}/associate", seg(address)),
            Some(&body),
        )
        .await
    }

    async fn disassociate_address(&self, address: &str) -> Result<()> {
        self.post(
            &format!("/network/addresses/{}/disassociate", seg(address)),
            None,
        )
        .await
    }

    async fn address_pools(&self) -> Result<Vec<String>> {
        let listing: Pools = self.get_json("/network/pools").await?;
        Ok(listing.pools)
    }

    async fn networks(&self) -> Result<Vec<Network>> {
        let listing: Networks = self.get_json("/network/networks").await?;
        Ok(listing.networks)
    }

    async fn create_volume(&self, size_gb: f64, name: &str) -> Result<Volume> {
        let body = json!({ "size_gb": size_gb, "name": name });
        self.post_json("/storage/volumes", &body).await
    }

    async fn volume(&self, id: &str) -> Result<Volume> {
        self.get_json(&format!("/storage/volumes/{}", seg(id))).await
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.delete(&format!("/storage/volumes/{}", seg(id))).await
    }

    async fn attach_volume(&self, instance: &str, volume: &str, mountpoint: &str) -> Result<()> {
        let body = json!({ "instance": instance, "mountpoint": mountpoint });
        self.post(&format!("/storage/volumes/{}/attach", seg(volume)), Some(&body))
            .await
    }

    async fn detach_volume(&self, volume: &str) -> Result<()> {
        self.post(&format!("/storage/volumes/{}/detach", seg(volume)), None)
            .await
    }

    async fn snapshot_volume(&self, volume: &str, name: &str) -> Result<()> {
        let body = json!({ "name": name });
        self.post(&format!("/storage/volumes/{}/snapshot", seg(volume)), Some(&body))
            .await
    }

    async fn images(&self) -> Result<Vec<Image>> {
        let listing: Images = self.get_json("/catalog/images").await?;
        Ok(listing.images)
    }

    async fn flavors(&self) -> Result<Vec<Flavor>> {
        let listing: Flavors = self.get_json("/catalog/flavors").await?;
        Ok(listing.flavors)
    }

    async fn security_groups(&self, tenant: &str) -> Result<Vec<SecurityGroup>> {
        let listing: Groups = self
            .get_json(&format!("/catalog/security-groups?tenant={}", seg(tenant)))
            .await?;
        Ok(listing.groups)
    }
}
