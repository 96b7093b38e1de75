//! Manifest, manifest list and token body decoding.
//!
//! Registry documents are scanned by key rather than decoded into a fixed
//! schema. Scalar fields are best-effort: a missing key or a value of the
//! wrong type leaves the field empty. Only a manifest without any layer
//! digest is rejected.

use burrow_core::error::{BurrowError, Result};

const CONFIG_KEY: &str = "\"config\"";
const LAYERS_KEY: &str = "\"layers\"";
const DIGEST_KEY: &str = "\"digest\"";
const MEDIA_TYPE_KEY: &str = "\"mediaType\"";
const SIZE_KEY: &str = "\"size\"";
const SCHEMA_VERSION_KEY: &str = "\"schemaVersion\"";
const ARCHITECTURE_KEY: &str = "\"architecture\"";
const TOKEN_KEY: &str = "\"token\"";

/// Descriptor of the image configuration blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub media_type: String,
    pub size: Option<u64>,
    pub digest: String,
}

/// Decoded image manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestInfo {
    pub schema_version: Option<u32>,
    pub media_type: String,
    pub config: ConfigDescriptor,
    /// Layer digests in application order (never empty)
    pub layers: Vec<String>,
}

/// One platform entry of a manifest list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformManifestRef {
    pub digest: String,
    /// Empty when the entry carries no architecture
    pub architecture: String,
}

/// Whether `text` is a single-image manifest rather than a manifest list.
pub fn is_image_manifest(text: &str) -> bool {
    find_key(text, CONFIG_KEY).is_some() && find_key(text, LAYERS_KEY).is_some()
}

/// Parse an image manifest.
///
/// # Errors
///
/// Returns `BurrowError::Parse` if no layer digest is found.
pub fn parse_manifest(text: &str) -> Result<ManifestInfo> {
    let layers_at = find_key(text, LAYERS_KEY);

    // Byte range of the config object; a non-object value leaves it empty
    let config_range = find_key(text, CONFIG_KEY).and_then(|at| {
        let value = text[at..].trim_start();
        if !value.starts_with('{') {
            return None;
        }
        let open = text.len() - value.len();
        let close = open + text[open..].find('}')?;
        Some((open, close + 1))
    });

    let config = match config_range {
        Some((start, end)) => {
            let region = &text[start..end];
            ConfigDescriptor {
                media_type: extract_string(region, MEDIA_TYPE_KEY).unwrap_or_default(),
                size: extract_number(region, SIZE_KEY),
                digest: extract_string(region, DIGEST_KEY).unwrap_or_default(),
            }
        }
        None => ConfigDescriptor::default(),
    };

    // Top-level mediaType lives outside the config object and before the layers
    let top_level_end = layers_at.unwrap_or(text.len());
    let media_type = match config_range {
        Some((start, end)) => extract_string(&text[..start], MEDIA_TYPE_KEY).or_else(|| {
            text.get(end..top_level_end.max(end))
                .and_then(|region| extract_string(region, MEDIA_TYPE_KEY))
        }),
        None => extract_string(&text[..top_level_end], MEDIA_TYPE_KEY),
    }
    .unwrap_or_default();

    let mut layers = Vec::new();
    if let Some(mut pos) = layers_at.and_then(|at| text[at..].find('[').map(|p| at + p)) {
        while let Some(value_at) = find_key(&text[pos..], DIGEST_KEY).map(|o| pos + o) {
            let Some((digest, end)) = string_at(text, value_at) else {
                break;
            };
            layers.push(digest.to_string());
            pos = end;
        }
    }

    if layers.is_empty() {
        return Err(BurrowError::Parse(
            "manifest does not list any layer digest".to_string(),
        ));
    }

    Ok(ManifestInfo {
        schema_version: extract_number(text, SCHEMA_VERSION_KEY).and_then(|v| u32::try_from(v).ok()),
        media_type,
        config,
        layers,
    })
}

/// Parse the platform entries of a manifest list, in document order.
///
/// Each digest is paired with the architecture found in the same JSON
/// object, whichever of the two comes first.
pub fn parse_manifest_list(text: &str) -> Vec<PlatformManifestRef> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while let Some(value_at) = find_key(&text[pos..], DIGEST_KEY).map(|o| pos + o) {
        let Some((digest, end)) = string_at(text, value_at) else {
            break;
        };

        let object_start = text[..value_at].rfind('{').unwrap_or(0);
        let object_end = text[end..].find('}').map_or(text.len(), |p| end + p + 1);
        let architecture =
            extract_string(&text[object_start..object_end], ARCHITECTURE_KEY).unwrap_or_default();

        entries.push(PlatformManifestRef {
            digest: digest.to_string(),
            architecture,
        });
        pos = end;
    }

    entries
}

/// Extract the bearer token from a token endpoint response body.
pub fn extract_token(body: &str) -> Result<String> {
    match extract_string(body, TOKEN_KEY) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(BurrowError::Auth(
            "token endpoint response has no \"token\" field".to_string(),
        )),
    }
}

/// Byte offset just past the `:` following the first use of `key` as an
/// object key.
fn find_key(text: &str, key: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = text[from..].find(key) {
        let after = from + pos + key.len();
        let rest = text[after..].trim_start();
        if let Some(value) = rest.strip_prefix(':') {
            return Some(text.len() - value.len());
        }
        from = after;
    }
    None
}

/// Quoted string starting at `at` (after optional whitespace), and the byte
/// offset just past its closing quote.
fn string_at(text: &str, at: usize) -> Option<(&str, usize)> {
    let rest = text[at..].trim_start();
    let body = rest.strip_prefix('"')?;
    let len = body.find('"')?;
    let start = text.len() - body.len();
    Some((&body[..len], start + len + 1))
}

fn extract_string(text: &str, key: &str) -> Option<String> {
    let at = find_key(text, key)?;
    string_at(text, at).map(|(value, _)| value.to_string())
}

fn extract_number(text: &str, key: &str) -> Option<u64> {
    let at = find_key(text, key)?;
    let rest = text[at..].trim_start();
    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..digits].parse().ok()
}
