use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Wraps raw base64 PNG content received from the backend for display.
pub fn png_data_url(base64_png: &str) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", base64_png.trim())
}

pub fn data_url_from_bytes(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// Removes a leading `data:image/<kind>;base64,` scheme. Anything else is
/// returned unchanged so raw base64 can be passed straight through.
pub fn strip_data_url_prefix(source: &str) -> &str {
    let Some(rest) = source.strip_prefix("data:image/") else {
        return source;
    };
    let kind_len = rest
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if kind_len == 0 {
        return source;
    }
    rest[kind_len..]
        .strip_prefix(";base64,")
        .unwrap_or(source)
}

/// Splits a base64 data URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> anyhow::Result<(String, Vec<u8>)> {
    let Some(rest) = url.strip_prefix("data:") else {
        bail!("not a data URL");
    };
    let Some((mime_type, payload)) = rest.split_once(";base64,") else {
        bail!("data URL is not base64 encoded");
    };
    let bytes = BASE64
        .decode(payload.trim().as_bytes())
        .context("data URL base64 decode failed")?;
    Ok((mime_type.to_string(), bytes))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// The photo picked at step 1, held in memory for the multipart upload.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            name,
            mime_type: mime_for_path(path)
                .unwrap_or("application/octet-stream")
                .to_string(),
            bytes: bytes.into(),
        })
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Local handle to the uploaded photo. It is only turned into a data URL
/// when something has to leave the process (saving to the gallery).
#[derive(Clone, PartialEq, Eq)]
pub enum PreviewRef {
    Path(PathBuf),
    Memory { mime_type: String, bytes: Arc<[u8]> },
}

impl PreviewRef {
    pub fn for_source(file: &SourceFile, path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::Path(path.to_path_buf()),
            None => Self::Memory {
                mime_type: file.mime_type.clone(),
                bytes: file.bytes.clone(),
            },
        }
    }

    /// Reads the referenced image afresh and encodes it as a data URL.
    pub fn to_data_url(&self) -> anyhow::Result<String> {
        match self {
            Self::Path(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed reading {}", path.display()))?;
                let mime_type = mime_for_path(path).unwrap_or("image/png");
                Ok(data_url_from_bytes(mime_type, &bytes))
            }
            Self::Memory { mime_type, bytes } => Ok(data_url_from_bytes(mime_type, bytes)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Memory { mime_type, bytes } => format!("memory:{mime_type}:{}", bytes.len()),
        }
    }
}

impl fmt::Debug for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreviewRef({})", self.label())
    }
}
