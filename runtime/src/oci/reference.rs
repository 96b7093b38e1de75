//! Image reference parsing.
//!
//! References are `namespace/repository` paths on Docker Hub. There is no
//! tag or digest syntax: every reference resolves to `latest`.

use std::fmt;

use burrow_core::error::{BurrowError, Result};

/// Namespace used for single-component names (`alpine` → `library/alpine`).
const OFFICIAL_NAMESPACE: &str = "library";

/// Tag every reference resolves to.
pub const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Repository path (e.g., "library/alpine", "myuser/tool")
    pub repository: String,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `alpine` → library/alpine
    /// - `myuser/myimage` → myuser/myimage
    ///
    /// Tags (`:`) and digests (`@`) are rejected.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(BurrowError::Config("Empty image reference".to_string()));
        }

        if reference.contains('@') || reference.contains(':') {
            return Err(BurrowError::Config(format!(
                "Image reference '{}' has a tag or digest; images always resolve to '{}'",
                reference, DEFAULT_TAG
            )));
        }

        if reference.split('/').any(str::is_empty) {
            return Err(BurrowError::Config(format!(
                "Empty path component in image reference '{}'",
                reference
            )));
        }

        let repository = if reference.contains('/') {
            reference.to_string()
        } else {
            format!("{}/{}", OFFICIAL_NAMESPACE, reference)
        };

        Ok(Self { repository })
    }

    /// Token scope granting pull access to this repository.
    pub fn scope(&self) -> String {
        format!("repository:{}:pull", self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)
    }
}
