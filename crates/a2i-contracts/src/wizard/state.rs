use std::fmt;

use serde::{Deserialize, Serialize};

use crate::images::{PreviewRef, SourceFile};

use super::step::WizardStep;
use super::suggestions::Suggestions;

/// Object categories offered at step 2. `Other` switches to the free-text
/// custom label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectLabel {
    #[default]
    Stone,
    Cloud,
    Fire,
    Leaf,
    Other,
}

impl ObjectLabel {
    pub const ALL: [ObjectLabel; 5] = [
        ObjectLabel::Stone,
        ObjectLabel::Cloud,
        ObjectLabel::Fire,
        ObjectLabel::Leaf,
        ObjectLabel::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stone => "Stone",
            Self::Cloud => "Cloud",
            Self::Fire => "Fire",
            Self::Leaf => "Leaf",
            Self::Other => "Other",
        }
    }

    /// Case-insensitive lookup of one of the fixed labels.
    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(needle))
    }
}

impl fmt::Display for ObjectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardState {
    pub step: WizardStep,
    pub selected_file: Option<SourceFile>,
    pub preview: Option<PreviewRef>,
    pub mask_preview: Option<String>,
    pub final_image: Option<String>,
    pub object_label: ObjectLabel,
    pub custom_label: String,
    pub refined_label: String,
    pub suggestions: Suggestions,
    pub selected_animal: String,
    pub custom_animal: String,
    pub edited_prompt: String,
    pub edited_negative_prompt: String,
    pub is_listening: bool,
    pub loading: bool,
    pub error: String,
}

impl WizardState {
    /// Label sent for mask generation: the custom text when `Other` is
    /// chosen, the fixed label otherwise.
    pub fn effective_label(&self) -> String {
        match self.object_label {
            ObjectLabel::Other => self.custom_label.trim().to_string(),
            label => label.as_str().to_string(),
        }
    }

    /// Clears everything produced after the upload step. The source file and
    /// its preview are left for the caller to replace.
    pub fn reset_downstream(&mut self) {
        self.mask_preview = None;
        self.final_image = None;
        self.object_label = ObjectLabel::default();
        self.custom_label.clear();
        self.refined_label.clear();
        self.suggestions = Suggestions::default();
        self.selected_animal.clear();
        self.custom_animal.clear();
        self.edited_prompt.clear();
        self.edited_negative_prompt.clear();
        self.error.clear();
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}
