//! Registry image support.
//!
//! ```text
//! ImageAssembler ──► RegistryClient ──► auth service  (bearer token)
//!       │                  │        └─► registry v2   (manifest, blobs)
//!       │                  └──► ManifestParser        (manifest / list)
//!       └──► LayerExtractor ──► sandbox root          (tar, in order)
//! ```

mod assembler;
pub mod layers;
pub mod manifest;
pub mod reference;
pub mod registry;

pub use assembler::{AssembledImage, ImageAssembler, PullStage};
pub use layers::{extract_layer, LayerExtractor, TarExtractor};
pub use manifest::{ConfigDescriptor, ManifestInfo, PlatformManifestRef};
pub use reference::ImageReference;
pub use registry::RegistryClient;
