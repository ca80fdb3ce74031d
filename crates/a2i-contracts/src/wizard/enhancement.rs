use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Post-processing operations offered at step 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceOp {
    Story,
    Sketch,
    RemoveBackground,
}

impl EnhanceOp {
    pub const ALL: [EnhanceOp; 3] = [EnhanceOp::Story, EnhanceOp::Sketch, EnhanceOp::RemoveBackground];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Sketch => "sketch",
            Self::RemoveBackground => "remove_background",
        }
    }

    /// Preview variant produced by the operation; the story has none.
    pub fn preview(self) -> Option<PreviewKind> {
        match self {
            Self::Story => None,
            Self::Sketch => Some(PreviewKind::Sketch),
            Self::RemoveBackground => Some(PreviewKind::NoBackground),
        }
    }
}

impl fmt::Display for EnhanceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewKind {
    #[default]
    Original,
    Sketch,
    NoBackground,
}

impl PreviewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Sketch => "sketch",
            Self::NoBackground => "no_bg",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "original" => Some(Self::Original),
            "sketch" => Some(Self::Sketch),
            "no_bg" | "nobg" | "no-bg" | "no_background" => Some(Self::NoBackground),
            _ => None,
        }
    }
}

impl fmt::Display for PreviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step-7 sub-state. Results are cached per operation for the rest of the
/// wizard run; loading flags and error slots are independent per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhancementState {
    results: BTreeMap<EnhanceOp, String>,
    loading: BTreeMap<EnhanceOp, bool>,
    errors: BTreeMap<EnhanceOp, String>,
    pub active_preview: PreviewKind,
}

impl EnhancementState {
    /// Cached result for `op`. An empty result counts as not computed.
    pub fn result(&self, op: EnhanceOp) -> Option<&str> {
        self.results
            .get(&op)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn set_result(&mut self, op: EnhanceOp, value: String) {
        self.results.insert(op, value);
    }

    pub fn story(&self) -> Option<&str> {
        self.result(EnhanceOp::Story)
    }

    pub fn sketch(&self) -> Option<&str> {
        self.result(EnhanceOp::Sketch)
    }

    pub fn no_background(&self) -> Option<&str> {
        self.result(EnhanceOp::RemoveBackground)
    }

    pub fn is_loading(&self, op: EnhanceOp) -> bool {
        self.loading.get(&op).copied().unwrap_or(false)
    }

    pub fn set_loading(&mut self, op: EnhanceOp, loading: bool) {
        self.loading.insert(op, loading);
    }

    pub fn error(&self, op: EnhanceOp) -> Option<&str> {
        self.errors.get(&op).map(String::as_str)
    }

    pub fn set_error(&mut self, op: EnhanceOp, message: String) {
        self.errors.insert(op, message);
    }

    pub fn clear_error(&mut self, op: EnhanceOp) {
        self.errors.remove(&op);
    }

    pub fn is_available(&self, kind: PreviewKind) -> bool {
        match kind {
            PreviewKind::Original => true,
            PreviewKind::Sketch => self.sketch().is_some(),
            PreviewKind::NoBackground => self.no_background().is_some(),
        }
    }

    /// Image for `kind`, given the original final image.
    pub fn preview_source<'a>(&'a self, original: Option<&'a str>, kind: PreviewKind) -> Option<&'a str> {
        match kind {
            PreviewKind::Original => original,
            PreviewKind::Sketch => self.sketch(),
            PreviewKind::NoBackground => self.no_background(),
        }
    }
}
