mod enhancement;
mod state;
mod step;
mod suggestions;

pub use enhancement::{EnhanceOp, EnhancementState, PreviewKind};
pub use state::{ObjectLabel, WizardState};
pub use step::WizardStep;
pub use suggestions::{default_prompt_for, SuggestionPick, Suggestions, DEFAULT_NEGATIVE_PROMPT};
