use std::collections::BTreeMap;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Barrier, Mutex, MutexGuard};

use anyhow::{bail, Result};
use a2i_contracts::events::EventWriter;
use a2i_contracts::gallery::{GalleryEntry, NewGalleryEntry};
use a2i_contracts::images::SourceFile;
use a2i_contracts::wizard::{Suggestions, WizardStep};
use tempfile::TempDir;

use crate::account::AccountService;
use crate::ai::{AiService, CustomPrompt};
use crate::dictation::DictationProvider;
use crate::session::Session;
use crate::wizard::WizardController;

pub(crate) const TEST_API_BASE: &str = "http://backend.test";

pub(crate) fn source_file(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, "image/png", b"png".to_vec())
}

/// A loopback listener that accepts connections but never answers. Keep the
/// listener alive for as long as requests should hang.
pub(crate) fn silent_backend() -> Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let base = format!("http://{}", listener.local_addr()?);
    Ok((listener, base))
}

/// A controller wired to fakes, logging into a temp directory.
pub(crate) struct Harness {
    pub(crate) controller: WizardController,
    pub(crate) ai: Arc<FakeAiService>,
    pub(crate) account: Arc<FakeAccountService>,
    pub(crate) session: Session,
    pub(crate) events_path: PathBuf,
    pub(crate) dir: TempDir,
}

pub(crate) fn harness() -> Result<Harness> {
    let dir = tempfile::tempdir()?;
    let events_path = dir.path().join("events.jsonl");
    let ai = FakeAiService::new();
    let account = FakeAccountService::new();
    let session = Session::new();
    let controller = WizardController::new(
        ai.clone(),
        account.clone(),
        session.clone(),
        EventWriter::new(&events_path, "a2i-test"),
    )
    .with_api_base(Some(TEST_API_BASE));
    Ok(Harness {
        controller,
        ai,
        account,
        session,
        events_path,
        dir,
    })
}

impl Harness {
    /// A second controller over the same fakes, session and log.
    pub(crate) fn rebuild(&self) -> WizardController {
        WizardController::new(
            self.ai.clone(),
            self.account.clone(),
            self.session.clone(),
            EventWriter::new(&self.events_path, "a2i-test"),
        )
        .with_api_base(Some(TEST_API_BASE))
    }

    /// Restarts, then walks the happy path until `target` is current.
    pub(crate) fn advance_to(&mut self, target: WizardStep) -> Result<()> {
        self.controller.restart();
        for step in WizardStep::ALL {
            if step.number() > target.number() {
                break;
            }
            match step {
                WizardStep::Upload => {}
                WizardStep::SelectObject => {
                    self.controller.select_file(source_file("rock.png"), None)
                }
                WizardStep::RefineMask => self.controller.generate_mask()?,
                WizardStep::ChooseAnimal => self.controller.confirm_mask()?,
                WizardStep::EditPrompt => self.controller.pick_animal(0)?,
                WizardStep::Result => self.controller.start_generation()?,
                WizardStep::Enhance => self.controller.open_enhance()?,
            }
        }
        Ok(())
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct FakeAiState {
    calls: Vec<(String, String)>,
    failures: BTreeMap<String, String>,
    suggestions: Option<Suggestions>,
    story: Option<String>,
    final_route: Option<(Arc<dyn AiService>, String)>,
    rendezvous: Option<Arc<Barrier>>,
}

/// Records every call as `(method, argument)` and answers with short
/// recognisable strings. Methods listed in `failures` return that message.
#[derive(Default)]
pub(crate) struct FakeAiService {
    state: Mutex<FakeAiState>,
}

impl FakeAiService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail(&self, method: &str, message: &str) {
        guard(&self.state)
            .failures
            .insert(method.to_string(), message.to_string());
    }

    pub(crate) fn recover(&self, method: &str) {
        guard(&self.state).failures.remove(method);
    }

    pub(crate) fn set_suggestions(&self, suggestions: Suggestions) {
        guard(&self.state).suggestions = Some(suggestions);
    }

    pub(crate) fn set_story(&self, story: &str) {
        guard(&self.state).story = Some(story.to_string());
    }

    /// Sends final-image generation to `ai` at `api_base` instead of
    /// answering it locally.
    pub(crate) fn route_final_to(&self, ai: Arc<dyn AiService>, api_base: &str) {
        guard(&self.state).final_route = Some((ai, api_base.to_string()));
    }

    /// Story and sketch calls wait on this barrier before answering.
    pub(crate) fn set_rendezvous(&self, barrier: Arc<Barrier>) {
        guard(&self.state).rendezvous = Some(barrier);
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        guard(&self.state).calls.clone()
    }

    pub(crate) fn call_count(&self, method: &str) -> usize {
        guard(&self.state)
            .calls
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        guard(&self.state).calls.len()
    }

    fn record(&self, method: &str, arg: &str) -> Result<()> {
        let (failure, rendezvous) = {
            let mut state = guard(&self.state);
            state.calls.push((method.to_string(), arg.to_string()));
            let rendezvous = match method {
                "generate_story" | "convert_to_sketch" => state.rendezvous.clone(),
                _ => None,
            };
            (state.failures.get(method).cloned(), rendezvous)
        };
        if let Some(barrier) = rendezvous {
            barrier.wait();
        }
        if let Some(message) = failure {
            bail!("{message}");
        }
        Ok(())
    }
}

pub(crate) fn fake_suggestions() -> Suggestions {
    Suggestions {
        animals: vec!["Owl".to_string(), "Fox".to_string()],
        prompts: vec!["an owl of stone".to_string(), "a fox of stone".to_string()],
        negative_prompts: vec!["owl neg".to_string(), "fox neg".to_string()],
    }
}

impl AiService for FakeAiService {
    fn name(&self) -> &str {
        "fake"
    }

    fn generate_mask(&self, _api_base: &str, file: &SourceFile, object_label: &str) -> Result<String> {
        self.record("generate_mask", &format!("{}:{object_label}", file.name))?;
        Ok(format!("MASK-{object_label}"))
    }

    fn refine_mask(&self, _api_base: &str, object_label: &str) -> Result<String> {
        self.record("refine_mask", object_label)?;
        Ok(format!("REFINED-{object_label}"))
    }

    fn suggestions(&self, _api_base: &str) -> Result<Suggestions> {
        self.record("suggestions", "")?;
        Ok(guard(&self.state)
            .suggestions
            .clone()
            .unwrap_or_else(fake_suggestions))
    }

    fn custom_prompt(&self, _api_base: &str, animal_name: &str) -> Result<CustomPrompt> {
        self.record("custom_prompt", animal_name)?;
        Ok(CustomPrompt {
            prompt: format!("custom prompt for {animal_name}"),
            negative_prompt: format!("custom negative for {animal_name}"),
        })
    }

    fn generate_final(&self, _api_base: &str, prompt: &str, negative_prompt: &str) -> Result<String> {
        self.record("generate_final", prompt)?;
        let route = guard(&self.state).final_route.clone();
        match route {
            Some((ai, api_base)) => ai.generate_final(&api_base, prompt, negative_prompt),
            None => Ok("FINAL".to_string()),
        }
    }

    fn generate_story(&self, _api_base: &str, prompt: &str, animal_name: &str) -> Result<String> {
        self.record("generate_story", &format!("{animal_name}:{prompt}"))?;
        Ok(guard(&self.state)
            .story
            .clone()
            .unwrap_or_else(|| format!("A story about a {animal_name}.")))
    }

    fn convert_to_sketch(&self, _api_base: &str, image_base64: &str) -> Result<String> {
        self.record("convert_to_sketch", image_base64)?;
        Ok("SKETCH".to_string())
    }

    fn upscale_image(
        &self,
        _api_base: &str,
        image_base64: &str,
        target_resolution: &str,
    ) -> Result<String> {
        self.record("upscale_image", &format!("{target_resolution}:{image_base64}"))?;
        Ok(format!("UPSCALED-{target_resolution}"))
    }

    fn remove_background(&self, _api_base: &str, image_base64: &str) -> Result<String> {
        self.record("remove_background", image_base64)?;
        Ok("NOBG".to_string())
    }
}

#[derive(Default)]
struct FakeAccountState {
    logins: Vec<(String, String)>,
    registrations: Vec<String>,
    saved: Vec<NewGalleryEntry>,
    gallery: Vec<GalleryEntry>,
    list_calls: usize,
    failure: Option<String>,
}

#[derive(Default)]
pub(crate) struct FakeAccountService {
    state: Mutex<FakeAccountState>,
}

impl FakeAccountService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every following call fails with `message`.
    pub(crate) fn fail_with(&self, message: &str) {
        guard(&self.state).failure = Some(message.to_string());
    }

    pub(crate) fn set_gallery(&self, entries: Vec<GalleryEntry>) {
        guard(&self.state).gallery = entries;
    }

    pub(crate) fn logins(&self) -> Vec<(String, String)> {
        guard(&self.state).logins.clone()
    }

    pub(crate) fn registrations(&self) -> Vec<String> {
        guard(&self.state).registrations.clone()
    }

    pub(crate) fn saved(&self) -> Vec<NewGalleryEntry> {
        guard(&self.state).saved.clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        guard(&self.state).list_calls
    }

    fn check(state: &FakeAccountState) -> Result<()> {
        if let Some(message) = &state.failure {
            bail!("{message}");
        }
        Ok(())
    }
}

impl AccountService for FakeAccountService {
    fn register(&self, email: &str, _password: &str, _full_name: &str) -> Result<()> {
        let mut state = guard(&self.state);
        Self::check(&state)?;
        state.registrations.push(email.to_string());
        Ok(())
    }

    fn login(&self, email: &str, password: &str) -> Result<String> {
        let mut state = guard(&self.state);
        Self::check(&state)?;
        state.logins.push((email.to_string(), password.to_string()));
        Ok(format!("user-{}", state.logins.len()))
    }

    fn save_gallery_entry(&self, entry: &NewGalleryEntry) -> Result<()> {
        let mut state = guard(&self.state);
        Self::check(&state)?;
        state.saved.push(entry.clone());
        Ok(())
    }

    fn list_gallery(&self, _user_id: &str) -> Result<Vec<GalleryEntry>> {
        let mut state = guard(&self.state);
        state.list_calls += 1;
        Self::check(&state)?;
        Ok(state.gallery.clone())
    }
}

#[derive(Default)]
struct FakeDictationState {
    starts: usize,
    stops: usize,
}

/// Dictation stub whose counters stay readable after the controller takes
/// ownership of the boxed provider.
#[derive(Clone, Default)]
pub(crate) struct FakeDictation {
    state: Arc<Mutex<FakeDictationState>>,
    pub(crate) available: bool,
}

impl FakeDictation {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::default(),
            available: true,
        }
    }

    pub(crate) fn starts(&self) -> usize {
        guard(&self.state).starts
    }

    pub(crate) fn stops(&self) -> usize {
        guard(&self.state).stops
    }
}

impl DictationProvider for FakeDictation {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self) -> Result<()> {
        guard(&self.state).starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        guard(&self.state).stops += 1;
    }
}
