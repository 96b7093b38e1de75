use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Docker Hub token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io/token";

/// Service name requested from the token endpoint.
pub const DEFAULT_AUTH_SERVICE: &str = "registry.docker.io";

/// Docker Hub registry API base URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Manifest media types sent in the `Accept` header.
pub const MANIFEST_MEDIA_TYPES: &[&str] = &[
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.oci.image.manifest.v1+json",
];

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Registry and token endpoints
    pub registry: RegistryConfig,

    /// Sandbox root placement
    pub sandbox: SandboxConfig,
}

impl EngineConfig {
    /// Build the default configuration, then apply environment overrides.
    ///
    /// Reads `BURROW_AUTH_URL`, `BURROW_AUTH_SERVICE`, `BURROW_REGISTRY_URL`
    /// and `BURROW_TMPDIR`. Empty values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("BURROW_AUTH_URL") {
            config.registry.auth_url = url;
        }
        if let Some(service) = get("BURROW_AUTH_SERVICE") {
            config.registry.auth_service = service;
        }
        if let Some(url) = get("BURROW_REGISTRY_URL") {
            config.registry.registry_url = url;
        }
        if let Some(dir) = get("BURROW_TMPDIR") {
            config.sandbox.root_parent = PathBuf::from(dir);
        }

        config
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Bearer token endpoint
    pub auth_url: String,

    /// `service` query parameter for the token endpoint
    pub auth_service: String,

    /// Registry API base URL (without `/v2`)
    pub registry_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            auth_service: DEFAULT_AUTH_SERVICE.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Value of the `Accept` header for manifest and blob requests.
    pub fn accept_header(&self) -> String {
        MANIFEST_MEDIA_TYPES.join(", ")
    }
}

/// Sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Directory under which sandbox roots are created
    pub root_parent: PathBuf,

    /// Name prefix of each sandbox root
    pub root_prefix: String,

    /// Base name of downloaded layer archives (`<base>_<n>.tar`)
    pub archive_basename: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root_parent: std::env::temp_dir(),
            root_prefix: "burrow_".to_string(),
            archive_basename: "downloaded_file".to_string(),
        }
    }
}
