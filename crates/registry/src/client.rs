//! HTTP client for the dopamine registry
//!
//! Connection pooling and retry logic; typed requests go through a single
//! generic [`RegistryClient::send`].

use crate::auth::LoginFile;
use crate::requests::{ApiRequest, AuthMode, Method};
use dop_cache::{DopHome, DOP_REGISTRY_ENV};
use dop_errors::{Error, RegistryError};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Registry host used when `DOP_REGISTRY` is not set
pub const DEFAULT_HOST: &str = "https://registry.dopamine.build";

/// API version this client speaks
pub const API_VERSION: &str = "v1";

/// Response header carrying the server's declared API version
pub const API_VERSION_HEADER: &str = "x-dop-api-version";

/// Client configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub host: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: std::env::var(DOP_REGISTRY_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            user_agent: format!("dopamine/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Typed API client with retry logic
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    config: RegistryConfig,
    token: Option<String>,
    cancel: CancellationToken,
}

impl RegistryClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(config: RegistryConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RegistryError::ServerDown {
                host: format!("{}: {e}", config.host),
            })?;
        Ok(Self {
            client,
            config,
            token: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Create from the environment: host from `DOP_REGISTRY`, bearer
    /// token for that host from the login file.
    ///
    /// # Errors
    ///
    /// Returns an error when the login file is malformed or the client
    /// cannot be built.
    pub fn from_env(home: &DopHome) -> Result<Self, Error> {
        let config = RegistryConfig::default();
        let login = LoginFile::load(&home.login_file())?;
        let token = login.token_for(&config.host).map(str::to_string);
        let mut client = Self::new(config)?;
        client.token = token;
        Ok(client)
    }

    /// Use an explicit bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Token used to stop issuing new requests.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send a typed request and decode its response.
    ///
    /// # Errors
    ///
    /// `RegistryError::NotLoggedIn` when auth is required and no token
    /// is configured; `ServerDown` after exhausted retries; `Http` for
    /// error statuses; `VersionMismatch` when the server declares
    /// another API version.
    pub async fn send<R: ApiRequest>(&self, request: &R) -> Result<R::Response, Error> {
        let response = self.execute_raw::<R>(request).await?;
        let declared = response
            .headers()
            .get(API_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        check_api_version(declared.as_deref())?;
        response
            .json::<R::Response>()
            .await
            .map_err(|e| {
                RegistryError::InvalidResponse {
                    message: e.to_string(),
                }
                .into()
            })
    }

    async fn execute_raw<R: ApiRequest>(&self, request: &R) -> Result<Response, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let bearer = match R::AUTH {
            AuthMode::None => None,
            AuthMode::Optional => self.token.as_deref(),
            AuthMode::Required => Some(self.token.as_deref().ok_or_else(|| {
                RegistryError::NotLoggedIn {
                    host: self.config.host.clone(),
                }
            })?),
        };

        let url = format!("{}{}", self.config.host, request.path());
        let query = request.query();
        let body = request.body();
        debug!(method = ?R::METHOD, url = %url, "registry request");

        self.retry_request(|| {
            let mut builder = match R::METHOD {
                Method::Get => self.client.get(&url),
                Method::Post => self.client.post(&url),
                Method::Patch => self.client.patch(&url),
            };
            if !query.is_empty() {
                builder = builder.query(&query);
            }
            if let Some(body) = &body {
                builder = builder.json(body);
            }
            if let Some(token) = bearer {
                builder = builder.bearer_auth(token);
            }
            builder.send()
        })
        .await
    }

    /// Execute a request with retries on transient failures.
    async fn retry_request<F, Fut>(&self, mut f: F) -> Result<Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                tokio::time::sleep(self.config.retry_delay * attempt).await;
            }

            match f().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.is_server_error() && attempt < self.config.retry_count {
                        warn!(status = %status, attempt, "registry server error, retrying");
                        continue;
                    }
                    return Err(http_error(status, response).await);
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let host = self.config.host.clone();
        match last_error {
            Some(e) => {
                debug!(error = %e, "registry unreachable");
                Err(RegistryError::ServerDown { host }.into())
            }
            None => Err(RegistryError::ServerDown { host }.into()),
        }
    }

    /// Upload a recipe archive with a single-use bearer token.
    ///
    /// # Errors
    ///
    /// `UploadTokenRejected` when the token is expired or already used;
    /// `Http` for other error statuses.
    pub async fn upload_archive(
        &self,
        upload_token: &str,
        archive_id: &str,
        archive: &Path,
    ) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|e| Error::io_with_path(&e, archive))?;
        let url = format!("{}/v1/archives/{archive_id}", self.config.host);
        debug!(url = %url, size = bytes.len(), "uploading archive");

        let response = self
            .client
            .post(&url)
            .bearer_auth(upload_token)
            .header("content-type", "application/x-xz")
            .body(bytes)
            .send()
            .await
            .map_err(|_| RegistryError::ServerDown {
                host: self.config.host.clone(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::GONE {
            return Err(RegistryError::UploadTokenRejected.into());
        }
        Err(http_error(status, response).await)
    }

    /// Download a recipe archive, streaming to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the file cannot be
    /// written.
    pub async fn download_archive(&self, archive_name: &str, dest: &Path) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let url = format!("{}/v1/archives/{archive_name}", self.config.host);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| RegistryError::ServerDown {
                host: self.config.host.clone(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(status, response).await);
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::io_with_path(&e, dest))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RegistryError::InvalidResponse {
                message: e.to_string(),
            })?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(|e| Error::io_with_path(&e, dest))?;
        }
        Ok(())
    }
}

/// Compare a declared API version against [`API_VERSION`].
///
/// An absent header is accepted for compatibility with older servers.
///
/// # Errors
///
/// Returns `RegistryError::VersionMismatch` on any other value.
pub fn check_api_version(declared: Option<&str>) -> Result<(), RegistryError> {
    match declared {
        None => Ok(()),
        Some(v) if v == API_VERSION => Ok(()),
        Some(v) => Err(RegistryError::VersionMismatch {
            expected: API_VERSION.to_string(),
            received: v.to_string(),
        }),
    }
}

async fn http_error(status: StatusCode, response: Response) -> Error {
    let body = response.text().await.ok().filter(|b| !b.is_empty());
    RegistryError::Http {
        code: status.as_u16(),
        reason: status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string(),
        body,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_check() {
        assert!(check_api_version(None).is_ok());
        assert!(check_api_version(Some("v1")).is_ok());
        assert!(matches!(
            check_api_version(Some("v2")),
            Err(RegistryError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_required_auth_without_token() {
        let client = RegistryClient::new(RegistryConfig {
            host: "http://127.0.0.1:1".to_string(),
            ..RegistryConfig::default()
        })
        .unwrap();
        let request = crate::requests::PostRecipe(crate::models::NewRecipeBody {
            name: "zlib".to_string(),
            version: dop_types::Version::new(1, 0, 0),
            revision: "abc".to_string(),
            description: None,
            upstream_url: None,
            license: None,
        });
        let err = client.send(&request).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Registry(RegistryError::NotLoggedIn { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_client_sends_nothing() {
        let client = RegistryClient::new(RegistryConfig {
            host: "http://127.0.0.1:1".to_string(),
            retry_count: 0,
            ..RegistryConfig::default()
        })
        .unwrap();
        client.cancellation_token().cancel();
        let request = crate::requests::GetPackage {
            name: "zlib".to_string(),
        };
        let err = client.send(&request).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
