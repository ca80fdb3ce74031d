use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use a2i_contracts::events::{EventPayload, EventWriter};
use a2i_contracts::images::{png_data_url, PreviewRef, SourceFile};
use a2i_contracts::wizard::{EnhancementState, ObjectLabel, PreviewKind, WizardState, WizardStep};
use serde_json::{json, Value};

use crate::account::AccountService;
use crate::ai::AiService;
use crate::config::normalize_base_url;
use crate::dictation::DictationProvider;
use crate::http::error_chain_text;
use crate::session::Session;

mod enhance;
mod save;

pub use enhance::{EnhanceJob, EnhanceOutcome};
pub use save::PendingSave;

pub const MISSING_API_BASE: &str = "Please provide the backend API URL before starting.";
const ERROR_TEXT_LIMIT: usize = 512;

/// Drives the seven-step flow. Each transition validates locally, performs at
/// most one backend call, and records its outcome in the state's error slot
/// as well as in the returned `Result`.
pub struct WizardController {
    state: WizardState,
    enhancement: EnhancementState,
    enhance_epoch: u64,
    api_base: String,
    ai: Arc<dyn AiService>,
    account: Arc<dyn AccountService>,
    session: Session,
    events: EventWriter,
    dictation: Option<Box<dyn DictationProvider>>,
}

pub(crate) fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

impl WizardController {
    pub fn new(
        ai: Arc<dyn AiService>,
        account: Arc<dyn AccountService>,
        session: Session,
        events: EventWriter,
    ) -> Self {
        let controller = Self {
            state: WizardState::default(),
            enhancement: EnhancementState::default(),
            enhance_epoch: 0,
            api_base: String::new(),
            ai,
            account,
            session,
            events,
            dictation: None,
        };
        controller.emit(
            "session_started",
            json!({
                "ai_service": controller.ai.name(),
                "step": controller.state.step.number(),
            }),
        );
        controller
    }

    pub fn with_api_base(mut self, api_base: Option<&str>) -> Self {
        if let Some(value) = api_base {
            self.api_base = normalize_base_url(value);
        }
        self
    }

    pub fn with_dictation(mut self, provider: Box<dyn DictationProvider>) -> Self {
        self.dictation = Some(provider);
        self
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> WizardStep {
        self.state.step
    }

    pub fn enhancement(&self) -> &EnhancementState {
        &self.enhancement
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn ai_name(&self) -> &str {
        self.ai.name()
    }

    pub fn has_dictation(&self) -> bool {
        self.dictation
            .as_ref()
            .map(|provider| provider.is_available())
            .unwrap_or(false)
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let _ = self.events.emit(event_type, map_object(payload));
    }

    fn change_step(&mut self, to: WizardStep, reason: &str) {
        let from = self.state.step;
        if from == to {
            return;
        }
        self.state.step = to;
        self.emit(
            "step_changed",
            json!({ "from": from.number(), "to": to.number(), "reason": reason }),
        );
    }

    /// Validation failure: stored in the error slot, no backend call.
    fn reject(&mut self, message: &str) -> Result<()> {
        self.state.error = message.to_string();
        bail!("{message}")
    }

    fn require_api_base(&mut self) -> Result<String> {
        if self.api_base.is_empty() {
            self.state.error = MISSING_API_BASE.to_string();
            bail!(MISSING_API_BASE);
        }
        Ok(self.api_base.clone())
    }

    fn start_request(&mut self, action: &str) {
        self.state.loading = true;
        self.state.error.clear();
        self.emit(
            "request_started",
            json!({ "action": action, "step": self.state.step.number() }),
        );
    }

    fn request_succeeded(&mut self, action: &str) {
        self.state.loading = false;
        self.emit("request_succeeded", json!({ "action": action }));
    }

    fn request_failed(&mut self, action: &str, err: &anyhow::Error) -> anyhow::Error {
        let message = error_chain_text(err, ERROR_TEXT_LIMIT);
        self.state.loading = false;
        self.state.error = message.clone();
        self.emit(
            "request_failed",
            json!({ "action": action, "error": message }),
        );
        anyhow!(message)
    }

    fn reset_enhancement(&mut self) {
        self.enhancement = EnhancementState::default();
        self.enhance_epoch += 1;
    }

    pub fn set_api_base(&mut self, api_base: &str) {
        self.api_base = normalize_base_url(api_base);
    }

    pub fn set_object_label(&mut self, label: ObjectLabel) {
        self.state.object_label = label;
    }

    pub fn set_custom_label(&mut self, text: &str) {
        self.state.custom_label = text.to_string();
    }

    /// One of the fixed labels by name, otherwise `Other` with `raw` as the
    /// custom label.
    pub fn choose_label(&mut self, raw: &str) {
        match ObjectLabel::parse(raw) {
            Some(label) => self.set_object_label(label),
            None => {
                self.set_object_label(ObjectLabel::Other);
                self.set_custom_label(raw.trim());
            }
        }
    }

    pub fn set_refined_label(&mut self, text: &str) {
        self.state.refined_label = text.to_string();
    }

    pub fn set_custom_animal(&mut self, text: &str) {
        self.state.custom_animal = text.to_string();
    }

    pub fn set_edited_prompt(&mut self, text: &str) {
        self.state.edited_prompt = text.to_string();
    }

    pub fn set_edited_negative_prompt(&mut self, text: &str) {
        self.state.edited_negative_prompt = text.to_string();
    }

    /// Step 1. Starts a fresh run on the new photo; `preview_path` is kept as
    /// the preview reference when the photo came from disk.
    pub fn select_file(&mut self, file: SourceFile, preview_path: Option<&Path>) {
        self.state.reset_downstream();
        self.reset_enhancement();
        self.emit(
            "file_selected",
            json!({
                "name": file.name,
                "mime_type": file.mime_type,
                "bytes": file.len(),
            }),
        );
        self.state.preview = Some(PreviewRef::for_source(&file, preview_path));
        self.state.selected_file = Some(file);
        self.change_step(WizardStep::SelectObject, "file_selected");
    }

    pub fn select_file_path(&mut self, path: &Path) -> Result<()> {
        match SourceFile::from_path(path) {
            Ok(file) => {
                self.select_file(file, Some(path));
                Ok(())
            }
            Err(err) => {
                let message = error_chain_text(&err, ERROR_TEXT_LIMIT);
                self.reject(&message)
            }
        }
    }

    /// Step 2 -> 3.
    pub fn generate_mask(&mut self) -> Result<()> {
        let Some(file) = self.state.selected_file.clone() else {
            return self.reject("Please upload an image first.");
        };
        let label = self.state.effective_label();
        if label.is_empty() {
            return self.reject("Please select or enter an object label.");
        }
        let api_base = self.require_api_base()?;

        self.start_request("generate_mask");
        match self.ai.generate_mask(&api_base, &file, &label) {
            Ok(mask) => {
                self.state.mask_preview = Some(png_data_url(&mask));
                self.state.refined_label = label;
                self.request_succeeded("generate_mask");
                self.change_step(WizardStep::RefineMask, "mask_generated");
                Ok(())
            }
            Err(err) => Err(self.request_failed("generate_mask", &err)),
        }
    }

    /// Step 3, repeatable. Replaces the mask; the step does not move.
    pub fn refine_mask(&mut self) -> Result<()> {
        let label = self.state.refined_label.trim().to_string();
        if label.is_empty() {
            return self.reject("Please enter a label to refine the mask.");
        }
        let api_base = self.require_api_base()?;

        self.start_request("refine_mask");
        match self.ai.refine_mask(&api_base, &label) {
            Ok(mask) => {
                self.state.mask_preview = Some(png_data_url(&mask));
                self.request_succeeded("refine_mask");
                Ok(())
            }
            Err(err) => Err(self.request_failed("refine_mask", &err)),
        }
    }

    /// Step 3 -> 4. The step moves before the suggestions arrive and stays at
    /// 4 even when they fail.
    pub fn confirm_mask(&mut self) -> Result<()> {
        if self.state.mask_preview.is_none() {
            return self.reject("Please generate a mask first.");
        }
        let api_base = self.require_api_base()?;

        self.start_request("get_suggestions");
        self.change_step(WizardStep::ChooseAnimal, "mask_confirmed");
        match self.ai.suggestions(&api_base) {
            Ok(suggestions) => {
                if let Some(first) = suggestions.first_animal() {
                    self.state.selected_animal = first.to_string();
                }
                self.state.suggestions = suggestions;
                self.request_succeeded("get_suggestions");
                Ok(())
            }
            Err(err) => Err(self.request_failed("get_suggestions", &err)),
        }
    }

    /// Step 4 -> 5, local only.
    pub fn pick_animal(&mut self, index: usize) -> Result<()> {
        let Some(pick) = self.state.suggestions.pick(index) else {
            return self.reject("Please choose one of the suggested animals.");
        };
        self.state.selected_animal = pick.animal;
        self.state.edited_prompt = pick.prompt;
        self.state.edited_negative_prompt = pick.negative_prompt;
        self.state.error.clear();
        self.change_step(WizardStep::EditPrompt, "animal_picked");
        Ok(())
    }

    /// Step 4 -> 5 with a backend-written prompt for a free-text animal.
    pub fn submit_custom_animal(&mut self, name: &str) -> Result<()> {
        let animal = name.trim().to_string();
        if animal.is_empty() {
            return self.reject("Please enter an animal name.");
        }
        self.state.custom_animal = animal.clone();
        let api_base = self.require_api_base()?;

        self.start_request("custom_prompt");
        match self.ai.custom_prompt(&api_base, &animal) {
            Ok(custom) => {
                self.state.selected_animal = animal;
                self.state.edited_prompt = custom.prompt;
                self.state.edited_negative_prompt = custom.negative_prompt;
                self.request_succeeded("custom_prompt");
                self.change_step(WizardStep::EditPrompt, "custom_animal");
                Ok(())
            }
            Err(err) => Err(self.request_failed("custom_prompt", &err)),
        }
    }

    /// Step 5 -> 6, rolled back to 5 when generation fails.
    pub fn start_generation(&mut self) -> Result<()> {
        if self.state.edited_prompt.trim().is_empty() {
            return self.reject("Prompt cannot be empty.");
        }
        let api_base = self.require_api_base()?;
        let prompt = self.state.edited_prompt.clone();
        let negative_prompt = self.state.edited_negative_prompt.clone();

        self.start_request("generate_final");
        self.change_step(WizardStep::Result, "generation_started");
        match self.ai.generate_final(&api_base, &prompt, &negative_prompt) {
            Ok(image) => {
                self.state.final_image = Some(png_data_url(&image));
                self.reset_enhancement();
                self.request_succeeded("generate_final");
                Ok(())
            }
            Err(err) => {
                let err = self.request_failed("generate_final", &err);
                self.change_step(WizardStep::EditPrompt, "generation_failed");
                Err(err)
            }
        }
    }

    /// Step 6 -> 7, local only.
    pub fn open_enhance(&mut self) -> Result<()> {
        if self.state.final_image.is_none() {
            return self.reject("Please generate the final image first.");
        }
        self.state.error.clear();
        self.change_step(WizardStep::Enhance, "enhance_requested");
        Ok(())
    }

    pub fn restart(&mut self) {
        if self.state.is_listening {
            if let Some(provider) = self.dictation.as_mut() {
                provider.stop();
            }
        }
        let from = self.state.step;
        self.state = WizardState::default();
        self.reset_enhancement();
        self.emit("wizard_restarted", json!({ "from": from.number() }));
        if from != WizardStep::Upload {
            self.emit(
                "step_changed",
                json!({ "from": from.number(), "to": WizardStep::Upload.number(), "reason": "restart" }),
            );
        }
    }

    /// Starts or stops dictation. Without an available provider this does
    /// nothing.
    pub fn toggle_listening(&mut self) -> Result<()> {
        let Some(provider) = self.dictation.as_mut() else {
            return Ok(());
        };
        if !provider.is_available() {
            return Ok(());
        }
        if self.state.is_listening {
            provider.stop();
            self.state.is_listening = false;
            return Ok(());
        }
        if let Err(err) = provider.start() {
            self.state.is_listening = false;
            let message = error_chain_text(&err, ERROR_TEXT_LIMIT);
            return self.reject(&message);
        }
        self.state.is_listening = true;
        Ok(())
    }

    /// The provider stopped on its own (end of speech or error).
    pub fn listening_ended(&mut self) {
        self.state.is_listening = false;
    }

    pub fn append_transcript(&mut self, transcript: &str) {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return;
        }
        if !self.state.edited_prompt.is_empty() {
            self.state.edited_prompt.push(' ');
        }
        self.state.edited_prompt.push_str(transcript);
    }

    /// The image currently on screen: the selected step-7 variant, or the
    /// final image before step 7.
    pub fn active_image(&self) -> Option<&str> {
        let kind = if self.state.step == WizardStep::Enhance {
            self.enhancement.active_preview
        } else {
            PreviewKind::Original
        };
        self.enhancement
            .preview_source(self.state.final_image.as_deref(), kind)
    }

    pub fn download_file_name(&self) -> String {
        if self.state.step != WizardStep::Enhance {
            return "anything2image-art.png".to_string();
        }
        let animal: String = self
            .state
            .selected_animal
            .trim()
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        format!(
            "anything2image_{}_{}.png",
            animal,
            self.enhancement.active_preview.as_str()
        )
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<String> {
        let user_id = self.session.login(self.account.as_ref(), email, password)?;
        self.emit("session_login", json!({ "user_id": user_id }));
        Ok(user_id)
    }

    pub fn logout(&mut self) {
        if self.session.is_logged_in() {
            self.session.logout();
            self.emit("session_logout", json!({}));
        }
    }
}
