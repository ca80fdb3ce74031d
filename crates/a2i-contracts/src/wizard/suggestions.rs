use serde::{Deserialize, Serialize};

pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality, text, watermark";

pub fn default_prompt_for(animal: &str) -> String {
    format!("A high-quality, photorealistic image of a {animal}.")
}

/// Backend suggestion set. Index `i` of each list describes the same
/// candidate; `animals` defines the index space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    #[serde(default)]
    pub animals: Vec<String>,
    #[serde(default)]
    pub prompts: Vec<String>,
    #[serde(default)]
    pub negative_prompts: Vec<String>,
}

/// One resolved row of a suggestion set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionPick {
    pub animal: String,
    pub prompt: String,
    pub negative_prompt: String,
}

impl Suggestions {
    pub fn len(&self) -> usize {
        self.animals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        self.prompts.len() == self.animals.len()
            && self.negative_prompts.len() == self.animals.len()
    }

    pub fn first_animal(&self) -> Option<&str> {
        self.animals.first().map(String::as_str)
    }

    /// Resolves index `index`, substituting the templated defaults for a
    /// missing or blank prompt / negative prompt.
    pub fn pick(&self, index: usize) -> Option<SuggestionPick> {
        let animal = self.animals.get(index)?.clone();
        let prompt = self
            .prompts
            .get(index)
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| default_prompt_for(&animal));
        let negative_prompt = self
            .negative_prompts
            .get(index)
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.to_string());
        Some(SuggestionPick {
            animal,
            prompt,
            negative_prompt,
        })
    }
}
