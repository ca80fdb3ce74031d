use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Saved artwork as returned by the account service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryEntry {
    #[serde(default)]
    pub art_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub animal: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub original_image_url: String,
    #[serde(default)]
    pub masked_image_url: String,
    #[serde(default)]
    pub final_image_url: String,
}

impl GalleryEntry {
    pub fn image(&self, which: GalleryImage) -> &str {
        match which {
            GalleryImage::Final => &self.final_image_url,
            GalleryImage::Original => &self.original_image_url,
            GalleryImage::Masked => &self.masked_image_url,
        }
    }

    /// `created_at` rendered as `YYYY-MM-DD HH:MM`, or the raw text when the
    /// backend sent something that is not a timestamp.
    pub fn created_at_display(&self) -> String {
        let raw = self.created_at.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return parsed.format("%Y-%m-%d %H:%M").to_string();
        }
        for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
                return parsed.format("%Y-%m-%d %H:%M").to_string();
            }
        }
        raw.to_string()
    }
}

/// Which of an entry's three images the detail view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GalleryImage {
    #[default]
    Final,
    Original,
    Masked,
}

impl GalleryImage {
    /// final -> original -> masked -> final
    pub fn next(self) -> Self {
        match self {
            Self::Final => Self::Original,
            Self::Original => Self::Masked,
            Self::Masked => Self::Final,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Final => "final",
            Self::Original => "original",
            Self::Masked => "masked",
        }
    }
}

/// Body of `POST /user/save`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGalleryEntry {
    pub user_id: String,
    pub art_name: String,
    pub description: String,
    pub prompt: String,
    pub animal: String,
    pub original_image_url: String,
    pub masked_image_url: String,
    pub final_image_url: String,
}
