use anyhow::{bail, Context, Result};
use a2i_contracts::gallery::NewGalleryEntry;
use a2i_contracts::images::PreviewRef;
use serde_json::json;

use super::WizardController;

/// Everything a gallery save needs, frozen when the save dialog opens.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub image: String,
    pub prompt: String,
    pub animal: String,
    pub preview: Option<PreviewRef>,
    pub mask_preview: Option<String>,
}

impl WizardController {
    /// Opens the save dialog for `image` (usually [`Self::active_image`]).
    pub fn request_gallery_save(&mut self, image: Option<&str>) -> Result<PendingSave> {
        if !self.session.is_logged_in() {
            bail!("You must be logged in to save to the gallery.");
        }
        let Some(image) = image.map(str::trim).filter(|value| !value.is_empty()) else {
            bail!("No image available to save.");
        };
        self.emit(
            "gallery_save_requested",
            json!({
                "step": self.state.step.number(),
                "preview": self.enhancement.active_preview.as_str(),
            }),
        );
        Ok(PendingSave {
            image: image.to_string(),
            prompt: self.state.edited_prompt.clone(),
            animal: self.state.selected_animal.clone(),
            preview: self.state.preview.clone(),
            mask_preview: self.state.mask_preview.clone(),
        })
    }

    /// Submits the dialog. `pending` is consumed whether or not the save
    /// succeeds.
    pub fn confirm_gallery_save(
        &mut self,
        pending: PendingSave,
        art_name: &str,
        description: &str,
    ) -> Result<()> {
        let Some(user_id) = self.session.user_id() else {
            bail!("User is not authenticated.");
        };
        let Some(preview) = pending.preview.as_ref() else {
            bail!("Missing image data for saving.");
        };

        self.state.loading = true;
        self.emit("request_started", json!({ "action": "save_gallery" }));
        let result = preview
            .to_data_url()
            .context("Failed to save to gallery")
            .and_then(|original_image_url| {
                let entry = NewGalleryEntry {
                    user_id,
                    art_name: art_name.trim().to_string(),
                    description: description.trim().to_string(),
                    prompt: pending.prompt.clone(),
                    animal: pending.animal.clone(),
                    original_image_url,
                    masked_image_url: pending.mask_preview.clone().unwrap_or_default(),
                    final_image_url: pending.image.clone(),
                };
                self.account.save_gallery_entry(&entry)
            });
        self.state.loading = false;

        match result {
            Ok(()) => {
                self.emit(
                    "gallery_saved",
                    json!({ "art_name": art_name.trim(), "animal": pending.animal }),
                );
                Ok(())
            }
            Err(err) => {
                self.emit(
                    "request_failed",
                    json!({ "action": "save_gallery", "error": format!("{err:#}") }),
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use a2i_contracts::wizard::WizardStep;

    use crate::test_support::harness;

    fn error_text<T>(result: anyhow::Result<T>) -> String {
        result.err().map(|err| err.to_string()).unwrap_or_default()
    }

    #[test]
    fn save_needs_a_session_and_an_image() -> anyhow::Result<()> {
        let mut h = harness()?;
        h.advance_to(WizardStep::Result)?;
        let image = h.controller.active_image().map(str::to_string);

        assert_eq!(
            error_text(h.controller.request_gallery_save(image.as_deref())),
            "You must be logged in to save to the gallery."
        );
        h.controller.login("me@example.com", "secret")?;
        assert_eq!(
            error_text(h.controller.request_gallery_save(None)),
            "No image available to save."
        );
        assert!(h.account.saved().is_empty());
        Ok(())
    }

    #[test]
    fn save_uses_the_snapshot_taken_at_request_time() -> anyhow::Result<()> {
        let mut h = harness()?;
        h.advance_to(WizardStep::Enhance)?;
        h.controller.login("me@example.com", "secret")?;
        h.controller.convert_to_sketch()?;
        let image = h.controller.active_image().map(str::to_string);
        let pending = h.controller.request_gallery_save(image.as_deref())?;

        h.controller.set_edited_prompt("edited after the dialog opened");
        h.controller.confirm_gallery_save(pending, " Rock Owl ", "Stone bird")?;

        let saved = h.account.saved();
        assert_eq!(saved.len(), 1);
        let entry = &saved[0];
        assert_eq!(entry.user_id, "user-1");
        assert_eq!(entry.art_name, "Rock Owl");
        assert_eq!(entry.description, "Stone bird");
        assert_eq!(entry.prompt, "an owl of stone");
        assert_eq!(entry.animal, "Owl");
        assert_eq!(entry.final_image_url, "data:image/png;base64,SKETCH");
        assert_eq!(entry.masked_image_url, "data:image/png;base64,MASK-Stone");
        assert_eq!(entry.original_image_url, "data:image/png;base64,cG5n");
        Ok(())
    }

    #[test]
    fn original_image_is_read_fresh_from_disk() -> anyhow::Result<()> {
        let mut h = harness()?;
        let path = h.dir.path().join("rock.png");
        std::fs::write(&path, b"first")?;
        h.controller.select_file_path(&path)?;
        h.controller.generate_mask()?;
        h.controller.login("me@example.com", "secret")?;
        let pending = h.controller.request_gallery_save(Some("data:image/png;base64,RklOQUw="))?;

        std::fs::write(&path, b"second")?;
        h.controller.confirm_gallery_save(pending, "Rock", "")?;
        assert_eq!(
            h.account.saved()[0].original_image_url,
            "data:image/png;base64,c2Vjb25k"
        );
        Ok(())
    }

    #[test]
    fn confirm_rechecks_the_session() -> anyhow::Result<()> {
        let mut h = harness()?;
        h.advance_to(WizardStep::Result)?;
        h.controller.login("me@example.com", "secret")?;
        let image = h.controller.active_image().map(str::to_string);
        let pending = h.controller.request_gallery_save(image.as_deref())?;
        h.controller.logout();

        assert_eq!(
            error_text(h.controller.confirm_gallery_save(pending, "Rock Owl", "")),
            "User is not authenticated."
        );
        assert!(h.account.saved().is_empty());
        Ok(())
    }

    #[test]
    fn save_failures_are_returned_and_clear_loading() -> anyhow::Result<()> {
        let mut h = harness()?;
        h.advance_to(WizardStep::Result)?;
        h.controller.login("me@example.com", "secret")?;
        let pending = h.controller.request_gallery_save(Some("data:image/png;base64,RklOQUw="))?;
        h.account.fail_with("Failed to save to gallery");

        let err = error_text(h.controller.confirm_gallery_save(pending, "Rock Owl", ""));
        assert_eq!(err, "Failed to save to gallery");
        assert!(!h.controller.state().loading);
        assert!(!h.controller.state().has_error());
        Ok(())
    }

    #[test]
    fn missing_preview_is_reported() -> anyhow::Result<()> {
        let mut h = harness()?;
        h.controller.login("me@example.com", "secret")?;
        let pending = h.controller.request_gallery_save(Some("data:image/png;base64,RklOQUw="))?;
        assert_eq!(
            error_text(h.controller.confirm_gallery_save(pending, "Rock Owl", "")),
            "Missing image data for saving."
        );
        Ok(())
    }
}
