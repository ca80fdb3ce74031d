pub mod account;
pub mod ai;
pub mod config;
pub mod dictation;
pub mod dryrun;
pub mod gallery;
pub mod http;
pub mod session;
pub mod wizard;

#[cfg(test)]
mod test_support;

pub use account::{AccountService, HttpAccountService, ACCOUNT_API_BASE};
pub use ai::{AiService, CustomPrompt, HttpAiService};
pub use config::EngineConfig;
pub use dictation::DictationProvider;
pub use dryrun::DryrunAiService;
pub use gallery::{GalleryMount, GalleryPage};
pub use session::Session;
pub use wizard::{EnhanceJob, EnhanceOutcome, PendingSave, WizardController};
