use anyhow::{bail, Context, Result};
use a2i_contracts::gallery::{GalleryEntry, NewGalleryEntry};
use reqwest::blocking::Client as HttpClient;
use reqwest::Url;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::http::{build_http_client, endpoint, response_json_or_error};

/// The account backend lives at a fixed address; only the AI backend URL is
/// user supplied.
pub const ACCOUNT_API_BASE: &str = "http://127.0.0.1:8000";

const ACCOUNT_ERROR_FIELD: &str = "detail";

pub trait AccountService: Send + Sync {
    fn register(&self, email: &str, password: &str, full_name: &str) -> Result<()>;

    /// Returns the user id on success.
    fn login(&self, email: &str, password: &str) -> Result<String>;

    fn save_gallery_entry(&self, entry: &NewGalleryEntry) -> Result<()>;

    fn list_gallery(&self, user_id: &str) -> Result<Vec<GalleryEntry>>;
}

pub struct HttpAccountService {
    api_base: String,
    http: HttpClient,
}

impl HttpAccountService {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Self::with_api_base(config, ACCOUNT_API_BASE)
    }

    pub(crate) fn with_api_base(config: &EngineConfig, api_base: &str) -> Result<Self> {
        Ok(Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            http: build_http_client(config.request_timeout, &[])?,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn post_json(&self, path: &str, body: Value, fallback: &str) -> Result<Value> {
        let url = endpoint(&self.api_base, path)?;
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .with_context(|| fallback.to_string())?;
        response_json_or_error(response, ACCOUNT_ERROR_FIELD, fallback)
    }

    fn gallery_url(&self, user_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .with_context(|| format!("invalid account service URL {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("account service URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["user", "gallery", user_id]);
        Ok(url)
    }
}

/// Login ids come back as strings or bare numbers depending on the backend.
fn user_id_from(payload: &Value) -> Option<String> {
    match payload.get("user_id")? {
        Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

impl AccountService for HttpAccountService {
    fn register(&self, email: &str, password: &str, full_name: &str) -> Result<()> {
        self.post_json(
            "user/register",
            json!({ "email": email, "password": password, "full_name": full_name }),
            "Signup failed",
        )?;
        Ok(())
    }

    fn login(&self, email: &str, password: &str) -> Result<String> {
        const FALLBACK: &str = "Login failed";
        let payload = self.post_json(
            "user/login",
            json!({ "email": email, "password": password }),
            FALLBACK,
        )?;
        let Some(user_id) = user_id_from(&payload) else {
            bail!("{FALLBACK} (response missing `user_id`)");
        };
        Ok(user_id)
    }

    fn save_gallery_entry(&self, entry: &NewGalleryEntry) -> Result<()> {
        const FALLBACK: &str = "Failed to save to gallery";
        let body = serde_json::to_value(entry).context(FALLBACK)?;
        self.post_json("user/save", body, FALLBACK)?;
        Ok(())
    }

    fn list_gallery(&self, user_id: &str) -> Result<Vec<GalleryEntry>> {
        const FALLBACK: &str = "Failed to fetch gallery";
        let url = self.gallery_url(user_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| FALLBACK.to_string())?;
        let payload = response_json_or_error(response, ACCOUNT_ERROR_FIELD, FALLBACK)?;
        match payload.get("gallery") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(rows) => serde_json::from_value(rows.clone())
                .with_context(|| format!("{FALLBACK} (unexpected gallery payload)")),
        }
    }
}
