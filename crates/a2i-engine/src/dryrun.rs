use std::io::Cursor;

use anyhow::{Context, Result};
use a2i_contracts::images::{strip_data_url_prefix, SourceFile};
use a2i_contracts::wizard::{default_prompt_for, Suggestions, DEFAULT_NEGATIVE_PROMPT};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::ai::{AiService, CustomPrompt};

const DEFAULT_SIDE: u32 = 512;
const MAX_SIDE: u32 = 4096;
const DRYRUN_ANIMALS: [&str; 3] = ["Owl", "Fox", "Turtle"];

/// Offline stand-in for the AI backend. Every image is a solid colour picked
/// from a hash of the request, so repeated calls with the same input agree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunAiService;

impl DryrunAiService {
    pub fn new() -> Self {
        Self
    }
}

fn color_from_parts(parts: &[&[u8]]) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn short_id(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(&hasher.finalize()[..4])
}

fn dims_of(bytes: &[u8]) -> (u32, u32) {
    image::load_from_memory(bytes)
        .map(|decoded| (decoded.width(), decoded.height()))
        .unwrap_or((DEFAULT_SIDE, DEFAULT_SIDE))
}

fn dims_of_base64(image_base64: &str) -> (u32, u32) {
    BASE64
        .decode(strip_data_url_prefix(image_base64).trim().as_bytes())
        .map(|bytes| dims_of(&bytes))
        .unwrap_or((DEFAULT_SIDE, DEFAULT_SIDE))
}

/// `2x`/`4x` scale the source; `WxH` is taken literally; anything else
/// doubles.
fn upscaled_dims(source: (u32, u32), target_resolution: &str) -> (u32, u32) {
    let raw = target_resolution.trim().to_ascii_lowercase();
    if let Some(factor) = raw
        .strip_suffix('x')
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
    {
        return (source.0.saturating_mul(factor), source.1.saturating_mul(factor));
    }
    if let Some((width, height)) = raw.split_once('x') {
        if let (Ok(width), Ok(height)) = (width.trim().parse::<u32>(), height.trim().parse::<u32>()) {
            return (width, height);
        }
    }
    (source.0.saturating_mul(2), source.1.saturating_mul(2))
}

fn solid_png_base64(width: u32, height: u32, color: (u8, u8, u8)) -> Result<String> {
    let width = width.clamp(1, MAX_SIDE);
    let height = height.clamp(1, MAX_SIDE);
    let image = RgbImage::from_pixel(width, height, Rgb([color.0, color.1, color.2]));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode dryrun image")?;
    Ok(BASE64.encode(buffer.into_inner()))
}

impl AiService for DryrunAiService {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_mask(&self, _api_base: &str, file: &SourceFile, object_label: &str) -> Result<String> {
        let (width, height) = dims_of(&file.bytes);
        let color = color_from_parts(&[b"mask", &file.bytes, object_label.as_bytes()]);
        solid_png_base64(width, height, color)
    }

    fn refine_mask(&self, _api_base: &str, object_label: &str) -> Result<String> {
        let color = color_from_parts(&[b"refine", object_label.as_bytes()]);
        solid_png_base64(DEFAULT_SIDE, DEFAULT_SIDE, color)
    }

    fn suggestions(&self, _api_base: &str) -> Result<Suggestions> {
        Ok(Suggestions {
            animals: DRYRUN_ANIMALS.iter().map(|animal| animal.to_string()).collect(),
            prompts: DRYRUN_ANIMALS
                .iter()
                .map(|animal| default_prompt_for(animal))
                .collect(),
            negative_prompts: DRYRUN_ANIMALS
                .iter()
                .map(|_| DEFAULT_NEGATIVE_PROMPT.to_string())
                .collect(),
        })
    }

    fn custom_prompt(&self, _api_base: &str, animal_name: &str) -> Result<CustomPrompt> {
        let animal = animal_name.trim();
        Ok(CustomPrompt {
            prompt: format!(
                "A detailed, photorealistic {animal} shaped from the selected object, soft natural light."
            ),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        })
    }

    fn generate_final(&self, _api_base: &str, prompt: &str, negative_prompt: &str) -> Result<String> {
        let color = color_from_parts(&[b"final", prompt.as_bytes(), negative_prompt.as_bytes()]);
        solid_png_base64(DEFAULT_SIDE, DEFAULT_SIDE, color)
    }

    fn generate_story(&self, _api_base: &str, prompt: &str, animal_name: &str) -> Result<String> {
        let id = short_id(&[prompt.as_bytes(), animal_name.as_bytes()]);
        Ok(format!(
            "Once, a {animal} woke up inside an ordinary thing and decided to stay. \
             It remembered only this: \"{prompt}\". (dryrun story {id})",
            animal = animal_name.trim(),
            prompt = prompt.trim(),
        ))
    }

    fn convert_to_sketch(&self, _api_base: &str, image_base64: &str) -> Result<String> {
        let (width, height) = dims_of_base64(image_base64);
        let (r, g, b) = color_from_parts(&[b"sketch", image_base64.as_bytes()]);
        let gray = ((r as u16 + g as u16 + b as u16) / 3) as u8;
        solid_png_base64(width, height, (gray, gray, gray))
    }

    fn upscale_image(
        &self,
        _api_base: &str,
        image_base64: &str,
        target_resolution: &str,
    ) -> Result<String> {
        let (width, height) = upscaled_dims(dims_of_base64(image_base64), target_resolution);
        let color = color_from_parts(&[b"upscale", image_base64.as_bytes()]);
        solid_png_base64(width, height, color)
    }

    fn remove_background(&self, _api_base: &str, image_base64: &str) -> Result<String> {
        let (width, height) = dims_of_base64(image_base64);
        let color = color_from_parts(&[b"no_bg", image_base64.as_bytes()]);
        solid_png_base64(width, height, color)
    }
}
