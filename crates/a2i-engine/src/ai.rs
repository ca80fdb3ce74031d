use anyhow::{Context, Result};
use a2i_contracts::images::SourceFile;
use a2i_contracts::wizard::Suggestions;
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::http::{build_http_client, endpoint, required_str, response_json_or_error};

const AI_ERROR_FIELD: &str = "error";
const NGROK_SKIP_WARNING: (&str, &str) = ("ngrok-skip-browser-warning", "true");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPrompt {
    pub prompt: String,
    pub negative_prompt: String,
}

/// Calls into the generation backend. Every method takes the backend base
/// URL the user entered; images travel as raw base64 (no data-URL prefix).
pub trait AiService: Send + Sync {
    fn name(&self) -> &str;

    /// Multipart upload of the photo; returns the mask as base64 PNG.
    fn generate_mask(&self, api_base: &str, file: &SourceFile, object_label: &str) -> Result<String>;

    fn refine_mask(&self, api_base: &str, object_label: &str) -> Result<String>;

    fn suggestions(&self, api_base: &str) -> Result<Suggestions>;

    fn custom_prompt(&self, api_base: &str, animal_name: &str) -> Result<CustomPrompt>;

    fn generate_final(&self, api_base: &str, prompt: &str, negative_prompt: &str) -> Result<String>;

    fn generate_story(&self, api_base: &str, prompt: &str, animal_name: &str) -> Result<String>;

    fn convert_to_sketch(&self, api_base: &str, image_base64: &str) -> Result<String>;

    fn upscale_image(
        &self,
        api_base: &str,
        image_base64: &str,
        target_resolution: &str,
    ) -> Result<String>;

    fn remove_background(&self, api_base: &str, image_base64: &str) -> Result<String>;
}

pub struct HttpAiService {
    http: HttpClient,
}

impl HttpAiService {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config.request_timeout, &[NGROK_SKIP_WARNING])?,
        })
    }

    fn post_json(&self, api_base: &str, path: &str, body: Value, fallback: &str) -> Result<Value> {
        let url = endpoint(api_base, path)?;
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .with_context(|| fallback.to_string())?;
        response_json_or_error(response, AI_ERROR_FIELD, fallback)
    }

    fn get_json(&self, api_base: &str, path: &str, fallback: &str) -> Result<Value> {
        let url = endpoint(api_base, path)?;
        let response = self
            .http
            .get(&url)
            .send()
            .with_context(|| fallback.to_string())?;
        response_json_or_error(response, AI_ERROR_FIELD, fallback)
    }
}

/// Prefers the sniffed image type over the one guessed from the file name.
fn upload_mime_type(file: &SourceFile) -> String {
    image::guess_format(&file.bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| file.mime_type.clone())
}

impl AiService for HttpAiService {
    fn name(&self) -> &str {
        "http"
    }

    fn generate_mask(&self, api_base: &str, file: &SourceFile, object_label: &str) -> Result<String> {
        const FALLBACK: &str = "Failed to generate mask.";
        let url = endpoint(api_base, "step1_upload_and_mask")?;
        let part = MultipartPart::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&upload_mime_type(file))
            .context("invalid upload MIME type")?;
        let form = MultipartForm::new()
            .part("file", part)
            .text("object_label", object_label.to_string());
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .with_context(|| FALLBACK.to_string())?;
        let payload = response_json_or_error(response, AI_ERROR_FIELD, FALLBACK)?;
        required_str(&payload, "mask_image_base64", FALLBACK)
    }

    fn refine_mask(&self, api_base: &str, object_label: &str) -> Result<String> {
        const FALLBACK: &str = "Failed to refine mask.";
        let payload = self.post_json(
            api_base,
            "step3_refine_mask",
            json!({ "object_label": object_label }),
            FALLBACK,
        )?;
        required_str(&payload, "mask_image_base64", FALLBACK)
    }

    fn suggestions(&self, api_base: &str) -> Result<Suggestions> {
        const FALLBACK: &str = "Failed to get suggestions.";
        let payload = self.get_json(api_base, "step4_get_suggestions", FALLBACK)?;
        serde_json::from_value(payload).with_context(|| format!("{FALLBACK} (unexpected payload)"))
    }

    fn custom_prompt(&self, api_base: &str, animal_name: &str) -> Result<CustomPrompt> {
        const FALLBACK: &str = "Failed to generate custom prompt";
        let payload = self.post_json(
            api_base,
            "step5_generate_custom_prompt",
            json!({ "animal_name": animal_name }),
            FALLBACK,
        )?;
        Ok(CustomPrompt {
            prompt: required_str(&payload, "prompt", FALLBACK)?,
            negative_prompt: payload
                .get("negative_prompt")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn generate_final(&self, api_base: &str, prompt: &str, negative_prompt: &str) -> Result<String> {
        const FALLBACK: &str = "Failed to generate final image";
        let payload = self.post_json(
            api_base,
            "step6_generate_final",
            json!({ "prompt": prompt, "negative_prompt": negative_prompt }),
            FALLBACK,
        )?;
        required_str(&payload, "final_image_base64", FALLBACK)
    }

    fn generate_story(&self, api_base: &str, prompt: &str, animal_name: &str) -> Result<String> {
        const FALLBACK: &str = "Failed to generate story.";
        let payload = self.post_json(
            api_base,
            "step7_generate_story",
            json!({ "prompt": prompt, "animal_name": animal_name }),
            FALLBACK,
        )?;
        required_str(&payload, "story", FALLBACK)
    }

    fn convert_to_sketch(&self, api_base: &str, image_base64: &str) -> Result<String> {
        const FALLBACK: &str = "Failed to convert to AI sketch.";
        let payload = self.post_json(
            api_base,
            "step7_generate_ai_sketch",
            json!({ "image_base64": image_base64 }),
            FALLBACK,
        )?;
        required_str(&payload, "sketch_image_base64", FALLBACK)
    }

    fn upscale_image(
        &self,
        api_base: &str,
        image_base64: &str,
        target_resolution: &str,
    ) -> Result<String> {
        const FALLBACK: &str = "Failed to upscale image.";
        let payload = self.post_json(
            api_base,
            "step7_upscale_image",
            json!({ "image_base64": image_base64, "target_resolution": target_resolution }),
            FALLBACK,
        )?;
        required_str(&payload, "enhanced_image_base64", FALLBACK)
    }

    fn remove_background(&self, api_base: &str, image_base64: &str) -> Result<String> {
        const FALLBACK: &str = "Failed to remove background.";
        let payload = self.post_json(
            api_base,
            "step7_remove_background",
            json!({ "image_base64": image_base64 }),
            FALLBACK,
        )?;
        required_str(&payload, "enhanced_image_base64", FALLBACK)
    }
}
