use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use a2i_contracts::images::{png_data_url, strip_data_url_prefix};
use a2i_contracts::wizard::{EnhanceOp, PreviewKind, WizardStep};
use serde_json::json;

use super::{WizardController, ERROR_TEXT_LIMIT, MISSING_API_BASE};
use crate::ai::AiService;
use crate::http::error_chain_text;

const ENHANCE_STEP_REQUIRED: &str = "Enhancements are available once the final image is ready.";

fn missing_source_message(op: EnhanceOp) -> &'static str {
    match op {
        EnhanceOp::Story => "Cannot generate story: prompt or animal is missing.",
        EnhanceOp::Sketch => "Cannot generate sketch: Original image is missing.",
        EnhanceOp::RemoveBackground => "Cannot remove background: Original image is missing.",
    }
}

enum EnhanceInput {
    Story { prompt: String, animal: String },
    Image(String),
}

/// A validated enhancement request detached from the controller. `run` only
/// talks to the backend, so jobs for different operations can run on
/// separate threads.
pub struct EnhanceJob {
    op: EnhanceOp,
    epoch: u64,
    api_base: String,
    ai: Arc<dyn AiService>,
    input: EnhanceInput,
}

pub struct EnhanceOutcome {
    op: EnhanceOp,
    epoch: u64,
    result: Result<String>,
}

impl EnhanceJob {
    pub fn op(&self) -> EnhanceOp {
        self.op
    }

    pub fn run(self) -> EnhanceOutcome {
        let result = match (&self.input, self.op) {
            (EnhanceInput::Story { prompt, animal }, _) => {
                self.ai.generate_story(&self.api_base, prompt, animal)
            }
            (EnhanceInput::Image(image), EnhanceOp::Sketch) => {
                self.ai.convert_to_sketch(&self.api_base, image)
            }
            (EnhanceInput::Image(image), _) => self.ai.remove_background(&self.api_base, image),
        };
        EnhanceOutcome {
            op: self.op,
            epoch: self.epoch,
            result,
        }
    }
}

impl EnhanceOutcome {
    pub fn op(&self) -> EnhanceOp {
        self.op
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl WizardController {
    fn enhance_rejected(&mut self, op: EnhanceOp, message: &str) -> anyhow::Error {
        self.enhancement.set_error(op, message.to_string());
        anyhow!(message.to_string())
    }

    /// Validates `op` and marks it loading. `Ok(None)` means nothing has to
    /// run: the result is cached (image variants become the active preview)
    /// or a job for `op` is already in flight.
    pub fn begin_enhancement(&mut self, op: EnhanceOp) -> Result<Option<EnhanceJob>> {
        if self.state.step != WizardStep::Enhance {
            return Err(self.enhance_rejected(op, ENHANCE_STEP_REQUIRED));
        }
        if self.enhancement.result(op).is_some() {
            if let Some(kind) = op.preview() {
                self.enhancement.active_preview = kind;
            }
            self.emit("enhancement_cached", json!({ "op": op.as_str() }));
            return Ok(None);
        }
        if self.enhancement.is_loading(op) {
            return Ok(None);
        }

        let input = match op {
            EnhanceOp::Story => {
                let prompt = &self.state.edited_prompt;
                let animal = &self.state.selected_animal;
                if prompt.trim().is_empty() || animal.trim().is_empty() {
                    return Err(self.enhance_rejected(op, missing_source_message(op)));
                }
                EnhanceInput::Story {
                    prompt: prompt.clone(),
                    animal: animal.clone(),
                }
            }
            EnhanceOp::Sketch | EnhanceOp::RemoveBackground => {
                let Some(image) = self.state.final_image.as_deref() else {
                    return Err(self.enhance_rejected(op, missing_source_message(op)));
                };
                EnhanceInput::Image(strip_data_url_prefix(image).to_string())
            }
        };
        if self.api_base.is_empty() {
            return Err(self.enhance_rejected(op, MISSING_API_BASE));
        }

        self.enhancement.set_loading(op, true);
        self.enhancement.clear_error(op);
        self.emit(
            "request_started",
            json!({ "action": op.as_str(), "step": self.state.step.number() }),
        );
        Ok(Some(EnhanceJob {
            op,
            epoch: self.enhance_epoch,
            api_base: self.api_base.clone(),
            ai: Arc::clone(&self.ai),
            input,
        }))
    }

    /// Commits a job's outcome into its own slot. Outcomes from a run that
    /// has since been restarted are dropped.
    pub fn finish_enhancement(&mut self, outcome: EnhanceOutcome) -> Result<()> {
        let EnhanceOutcome { op, epoch, result } = outcome;
        if epoch != self.enhance_epoch {
            self.emit(
                "enhancement_finished",
                json!({ "op": op.as_str(), "ok": false, "discarded": true }),
            );
            return Ok(());
        }
        self.enhancement.set_loading(op, false);
        match result {
            Ok(value) => {
                let value = match op.preview() {
                    Some(kind) => {
                        self.enhancement.active_preview = kind;
                        png_data_url(&value)
                    }
                    None => value,
                };
                self.enhancement.set_result(op, value);
                self.emit("request_succeeded", json!({ "action": op.as_str() }));
                self.emit("enhancement_finished", json!({ "op": op.as_str(), "ok": true }));
                Ok(())
            }
            Err(err) => {
                let message = error_chain_text(&err, ERROR_TEXT_LIMIT);
                self.enhancement.set_error(op, message.clone());
                self.emit(
                    "request_failed",
                    json!({ "action": op.as_str(), "error": message }),
                );
                self.emit("enhancement_finished", json!({ "op": op.as_str(), "ok": false }));
                Err(anyhow!(message))
            }
        }
    }

    pub fn run_enhancement(&mut self, op: EnhanceOp) -> Result<()> {
        match self.begin_enhancement(op)? {
            Some(job) => {
                let outcome = job.run();
                self.finish_enhancement(outcome)
            }
            None => Ok(()),
        }
    }

    pub fn generate_story(&mut self) -> Result<()> {
        self.run_enhancement(EnhanceOp::Story)
    }

    pub fn convert_to_sketch(&mut self) -> Result<()> {
        self.run_enhancement(EnhanceOp::Sketch)
    }

    pub fn remove_background(&mut self) -> Result<()> {
        self.run_enhancement(EnhanceOp::RemoveBackground)
    }

    pub fn select_preview(&mut self, kind: PreviewKind) -> Result<()> {
        if !self.enhancement.is_available(kind) {
            bail!("The {kind} preview has not been generated yet.");
        }
        self.enhancement.active_preview = kind;
        Ok(())
    }

    /// Upscales whatever is currently shown. The result goes back to the
    /// caller and is not cached.
    pub fn upscale_active_preview(&mut self, target_resolution: &str) -> Result<String> {
        let target_resolution = target_resolution.trim();
        if target_resolution.is_empty() {
            bail!("Please choose a target resolution.");
        }
        let Some(image) = self.active_image().map(|image| strip_data_url_prefix(image).to_string())
        else {
            bail!("Cannot upscale image: no image is available.");
        };
        if self.api_base.is_empty() {
            bail!(MISSING_API_BASE);
        }

        self.emit(
            "request_started",
            json!({ "action": "upscale", "step": self.state.step.number(), "target_resolution": target_resolution }),
        );
        match self
            .ai
            .upscale_image(&self.api_base, &image, target_resolution)
        {
            Ok(upscaled) => {
                self.emit("request_succeeded", json!({ "action": "upscale" }));
                Ok(png_data_url(&upscaled))
            }
            Err(err) => {
                let message = error_chain_text(&err, ERROR_TEXT_LIMIT);
                self.emit(
                    "request_failed",
                    json!({ "action": "upscale", "error": message }),
                );
                Err(anyhow!(message))
            }
        }
    }
}
