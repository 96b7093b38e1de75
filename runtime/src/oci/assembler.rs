//! Image assembly: registry pull plus in-place layer extraction.
//!
//! ```text
//! INIT → AUTH → MANIFEST → PARSE → LAYER_FETCH(n)… → EXTRACT(n)… → DONE
//!   └──────────────── first error: abort, keep partial state ─────┘
//! ```
//!
//! A fresh token is requested before every layer blob. Layers land in the
//! target directory as `<basename>_<n>.tar` and are extracted in manifest
//! order once all of them are downloaded.

use std::fmt;
use std::path::{Path, PathBuf};

use burrow_core::config::EngineConfig;
use burrow_core::error::{BurrowError, Result};

use super::layers::{LayerExtractor, TarExtractor};
use super::manifest::{parse_manifest, ManifestInfo};
use super::reference::ImageReference;
use super::registry::RegistryClient;

/// Pipeline stage, used to tag failures and progress logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStage {
    Init,
    Auth,
    Manifest,
    Parse,
    LayerFetch(usize),
    Extract(usize),
    Done,
}

impl fmt::Display for PullStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Auth => write!(f, "auth"),
            Self::Manifest => write!(f, "manifest"),
            Self::Parse => write!(f, "parse"),
            Self::LayerFetch(n) => write!(f, "layer fetch {}", n),
            Self::Extract(n) => write!(f, "extract {}", n),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Result of a completed assembly.
#[derive(Debug, Clone)]
pub struct AssembledImage {
    pub reference: ImageReference,
    pub manifest: ManifestInfo,
    pub root: PathBuf,
}

/// Populates a directory with an image's root filesystem.
pub struct ImageAssembler {
    client: RegistryClient,
    extractor: Box<dyn LayerExtractor>,
    archive_basename: String,
}

impl ImageAssembler {
    /// Create an assembler using the tar extractor.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Self::with_extractor(config, Box::new(TarExtractor))
    }

    /// Create an assembler with a custom extraction collaborator.
    pub fn with_extractor(config: &EngineConfig, extractor: Box<dyn LayerExtractor>) -> Result<Self> {
        Ok(Self {
            client: RegistryClient::new(config.registry.clone())?,
            extractor,
            archive_basename: config.sandbox.archive_basename.clone(),
        })
    }

    /// Pull `image` and unpack all of its layers into `root`.
    ///
    /// Fails fast: the first error aborts the pull and is returned wrapped
    /// with the stage it occurred in. Archives and files already written
    /// stay on disk.
    pub async fn assemble(&self, image: &ImageReference, root: &Path) -> Result<AssembledImage> {
        let mut stage = PullStage::Init;
        tracing::info!(image = %image, root = %root.display(), "Assembling image");

        let result = self.run(image, root, &mut stage).await;
        result.map_err(|e| {
            tracing::error!(image = %image, stage = %stage, error = %e, "Image assembly failed");
            e.at_stage(stage)
        })
    }

    async fn run(
        &self,
        image: &ImageReference,
        root: &Path,
        stage: &mut PullStage,
    ) -> Result<AssembledImage> {
        if !root.is_dir() {
            return Err(BurrowError::Filesystem(format!(
                "Sandbox root {} is not a directory",
                root.display()
            )));
        }

        *stage = PullStage::Auth;
        let token = self.client.fetch_auth_token(image).await?;

        *stage = PullStage::Manifest;
        let text = self.client.fetch_manifest(image, Some(&token)).await?;
        tracing::debug!(manifest = %text, "Manifest content");

        *stage = PullStage::Parse;
        let manifest = parse_manifest(&text)?;
        tracing::info!(
            image = %image,
            layers = manifest.layers.len(),
            config = %manifest.config.digest,
            "Manifest parsed"
        );
        tracing::debug!(layers = ?manifest.layers, "Layers to download");

        let mut archives = Vec::with_capacity(manifest.layers.len());
        for (index, digest) in manifest.layers.iter().enumerate() {
            *stage = PullStage::LayerFetch(index);
            tracing::info!(layer = index, digest = %digest, "Fetching layer");

            // Tokens are short-lived; each blob gets its own
            let token = self.client.fetch_auth_token(image).await?;
            let url = self.client.blob_url(image, digest);
            let archive = self
                .client
                .fetch_blob(&url, Some(&token), root, &self.archive_basename)
                .await?;
            archives.push(archive);
        }

        for (index, archive) in archives.iter().enumerate() {
            *stage = PullStage::Extract(index);
            tracing::info!(layer = index, archive = %archive.display(), "Extracting layer");
            self.extractor.extract_and_remove(archive, root)?;
        }

        *stage = PullStage::Done;
        tracing::info!(image = %image, "All layers extracted");

        Ok(AssembledImage {
            reference: image.clone(),
            manifest,
            root: root.to_path_buf(),
        })
    }
}
