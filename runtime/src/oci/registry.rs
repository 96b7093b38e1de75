//! Registry API client.
//!
//! Speaks the Docker Registry HTTP API v2: bearer tokens from the auth
//! service, manifests (resolving manifest lists), and layer blobs. Token and
//! manifest bodies are buffered as text; blobs are streamed to disk.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use burrow_core::config::RegistryConfig;
use burrow_core::error::{BurrowError, Result};
use futures::StreamExt;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{redirect, Client, RequestBuilder, Response, StatusCode};
use tokio::io::AsyncWriteExt;

use super::manifest::{extract_token, is_image_manifest, parse_manifest_list};
use super::reference::{ImageReference, DEFAULT_TAG};

/// Sequential client for one registry and its token service.
pub struct RegistryClient {
    client: Client,
    config: RegistryConfig,
    accept: String,
}

impl RegistryClient {
    /// Create a client. Redirects are never followed automatically.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BurrowError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            accept: config.accept_header(),
            config,
        })
    }

    /// Request a pull-scoped bearer token for `image`.
    pub async fn fetch_auth_token(&self, image: &ImageReference) -> Result<String> {
        let scope = image.scope();
        let request = self.client.get(&self.config.auth_url).query(&[
            ("service", self.config.auth_service.as_str()),
            ("scope", scope.as_str()),
        ]);

        let body = self.get_text(&self.config.auth_url, request).await?;
        let token = extract_token(&body)?;

        tracing::debug!(image = %image, "Authentication token fetched");
        Ok(token)
    }

    /// Fetch the `latest` manifest of `image`.
    ///
    /// A manifest list is resolved by taking its first entry, regardless of
    /// architecture, and fetching that entry's manifest.
    pub async fn fetch_manifest(&self, image: &ImageReference, token: Option<&str>) -> Result<String> {
        let url = self.manifest_url(image, DEFAULT_TAG);
        let body = self.get_text(&url, self.request(&url, token)).await?;

        if is_image_manifest(&body) {
            tracing::debug!(image = %image, "Image manifest fetched");
            return Ok(body);
        }

        let entries = parse_manifest_list(&body);
        let selected = entries.first().ok_or_else(|| {
            BurrowError::Parse(format!("manifest list for {} has no platform entries", image))
        })?;

        tracing::info!(
            image = %image,
            entries = entries.len(),
            digest = %selected.digest,
            architecture = %selected.architecture,
            "Resolved manifest list to its first entry"
        );

        let url = self.manifest_url(image, &selected.digest);
        self.get_text(&url, self.request(&url, token)).await
    }

    /// Download a blob into `dir` as `<basename>_<n>.tar` and return its path.
    ///
    /// A 307 response is followed exactly once, to its `Location`, with the
    /// same `Accept` and bearer headers.
    pub async fn fetch_blob(
        &self,
        url: &str,
        token: Option<&str>,
        dir: &Path,
        basename: &str,
    ) -> Result<PathBuf> {
        let response = self.send(url, self.request(url, token)).await?;

        match response.status() {
            StatusCode::OK => stream_to_file(response, dir, basename).await,
            StatusCode::TEMPORARY_REDIRECT => {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| response.url().join(v).ok())
                    .ok_or_else(|| {
                        tracing::error!(url = %url, "Redirect without a usable Location header");
                        BurrowError::Protocol {
                            url: url.to_string(),
                            status: StatusCode::TEMPORARY_REDIRECT.as_u16(),
                        }
                    })?;

                tracing::debug!(location = %location, "Following blob redirect");

                let location = location.to_string();
                let redirected = self.send(&location, self.request(&location, token)).await?;
                if redirected.status() != StatusCode::OK {
                    return Err(BurrowError::Protocol {
                        url: location,
                        status: redirected.status().as_u16(),
                    });
                }
                stream_to_file(redirected, dir, basename).await
            }
            status => Err(BurrowError::Protocol {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// URL of a manifest by tag or digest.
    pub fn manifest_url(&self, image: &ImageReference, reference: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.registry_base(),
            image.repository,
            reference
        )
    }

    /// URL of a blob by digest.
    pub fn blob_url(&self, image: &ImageReference, digest: &str) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            self.registry_base(),
            image.repository,
            digest
        )
    }

    fn registry_base(&self) -> &str {
        self.config.registry_url.trim_end_matches('/')
    }

    fn request(&self, url: &str, token: Option<&str>) -> RequestBuilder {
        let request = self.client.get(url).header(ACCEPT, &self.accept);
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| BurrowError::Network(format!("GET {} failed: {}", url, e)))
    }

    async fn get_text(&self, url: &str, request: RequestBuilder) -> Result<String> {
        let response = self.send(url, request).await?;
        if response.status() != StatusCode::OK {
            return Err(BurrowError::Protocol {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| BurrowError::Network(format!("Failed to read body of {}: {}", url, e)))
    }
}

/// Create the first free `<basename>_<n>.<ext>` in `dir`.
pub fn open_unique_file(dir: &Path, basename: &str, ext: &str) -> Result<(PathBuf, File)> {
    let mut counter = 0u32;
    loop {
        let path = dir.join(format!("{}_{}.{}", basename, counter, ext));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(e) => {
                return Err(BurrowError::Filesystem(format!(
                    "Failed to create {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

async fn stream_to_file(response: Response, dir: &Path, basename: &str) -> Result<PathBuf> {
    let (path, file) = open_unique_file(dir, basename, "tar")?;
    let mut file = tokio::fs::File::from_std(file);
    let write_err = |e: std::io::Error| {
        BurrowError::Filesystem(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BurrowError::Network(format!("Blob transfer failed: {}", e)))?;
        file.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;

    tracing::debug!(path = %path.display(), bytes = written, "Blob written");
    Ok(path)
}
