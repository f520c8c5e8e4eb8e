//! Blocking facade over the async client
//!
//! For callers without a runtime (scripts, tests, simple tools); each
//! facade owns a current-thread runtime.

use crate::client::RegistryClient;
use crate::requests::ApiRequest;
use dop_errors::Error;
use std::path::Path;

/// A registry client driving its own runtime
#[derive(Debug)]
pub struct BlockingRegistryClient {
    inner: RegistryClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingRegistryClient {
    /// Wrap an async client.
    ///
    /// # Errors
    ///
    /// Returns an error when the runtime cannot be created.
    pub fn new(inner: RegistryClient) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::internal(format!("runtime creation failed: {e}")))?;
        Ok(Self { inner, runtime })
    }

    /// Blocking [`RegistryClient::send`].
    ///
    /// # Errors
    ///
    /// Same as the async call.
    pub fn send<R: ApiRequest>(&self, request: &R) -> Result<R::Response, Error> {
        self.runtime.block_on(self.inner.send(request))
    }

    /// Blocking [`RegistryClient::upload_archive`].
    ///
    /// # Errors
    ///
    /// Same as the async call.
    pub fn upload_archive(
        &self,
        upload_token: &str,
        archive_id: &str,
        archive: &Path,
    ) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.upload_archive(upload_token, archive_id, archive))
    }

    /// Blocking [`RegistryClient::download_archive`].
    ///
    /// # Errors
    ///
    /// Same as the async call.
    pub fn download_archive(&self, archive_name: &str, dest: &Path) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.download_archive(archive_name, dest))
    }

    /// The wrapped async client.
    #[must_use]
    pub fn inner(&self) -> &RegistryClient {
        &self.inner
    }
}
