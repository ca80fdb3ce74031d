use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use a2i_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use a2i_contracts::events::{new_session_id, EventWriter};
use a2i_contracts::gallery::{GalleryEntry, GalleryImage};
use a2i_contracts::images::{decode_data_url, extension_for_mime};
use a2i_contracts::wizard::{EnhanceOp, PreviewKind, WizardStep};
use a2i_engine::{
    AccountService, AiService, DryrunAiService, EngineConfig, GalleryMount, GalleryPage,
    HttpAccountService, HttpAiService, Session, WizardController,
};
use clap::{Parser, Subcommand};
use serde_json::Value;

const DRYRUN_API_BASE: &str = "dryrun://local";

#[derive(Debug, Parser)]
#[command(
    name = "anything2image",
    version,
    about = "Turn an object in a photo into an animal, step by step"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive wizard driven by slash commands.
    Wizard(WizardArgs),
    /// Steps 1-6 in one go; writes the final PNG.
    Run(RunArgs),
    Signup(SignupArgs),
    /// Log in and list (optionally download) saved artwork.
    Gallery(GalleryArgs),
}

#[derive(Debug, Parser)]
struct WizardArgs {
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long, conflicts_with = "pick")]
    animal: Option<String>,
    /// 1-based index into the suggested animals.
    #[arg(long)]
    pick: Option<usize>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct SignupArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    full_name: String,
}

#[derive(Debug, Parser)]
struct GalleryArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("anything2image error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Wizard(args) => {
            run_wizard(args)?;
            Ok(0)
        }
        Command::Run(args) => run_oneshot(args),
        Command::Signup(args) => run_signup(args),
        Command::Gallery(args) => run_gallery(args),
    }
}

fn event_writer(path: Option<&Path>) -> EventWriter {
    match path {
        Some(path) => EventWriter::new(path, new_session_id()),
        None => EventWriter::disabled(new_session_id()),
    }
}

fn build_controller(
    config: &EngineConfig,
    dryrun: bool,
    account: Arc<dyn AccountService>,
    session: Session,
    events: EventWriter,
) -> Result<WizardController> {
    let ai: Arc<dyn AiService> = if dryrun {
        Arc::new(DryrunAiService::new())
    } else {
        Arc::new(HttpAiService::new(config)?)
    };
    let api_base = match (&config.api_base, dryrun) {
        (Some(base), _) => Some(base.as_str()),
        (None, true) => Some(DRYRUN_API_BASE),
        (None, false) => None,
    };
    Ok(WizardController::new(ai, account, session, events).with_api_base(api_base))
}

fn run_wizard(args: WizardArgs) -> Result<()> {
    let config = EngineConfig::from_env().with_api_base(args.api_url.clone());
    let account: Arc<dyn AccountService> = Arc::new(HttpAccountService::new(&config)?);
    let session = Session::new();
    let events = event_writer(args.events.as_deref());
    let mut controller = build_controller(
        &config,
        args.dryrun,
        Arc::clone(&account),
        session.clone(),
        events.clone(),
    )?;

    println!(
        "Anything2Image wizard started ({} backend). Type /help for commands.",
        controller.ai_name()
    );
    if controller.api_base().is_empty() {
        println!("Set the backend URL first with /api <url>.");
    }
    print_step(&controller);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("[{}] > ", controller.step().number());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        if intent.action == "noop" {
            continue;
        }
        let before = controller.step();
        handle_intent(&mut controller, &intent, account.as_ref(), &session, &events)?;
        if controller.step() != before {
            print_step(&controller);
        }
    }
    Ok(())
}

fn handle_intent(
    controller: &mut WizardController,
    intent: &Intent,
    account: &dyn AccountService,
    session: &Session,
    events: &EventWriter,
) -> Result<()> {
    match intent.action.as_str() {
        "help" => {
            println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            println!("Plain text replaces the prompt.");
        }
        "set_api_base" => {
            if let Some(url) = intent.arg_str("url") {
                controller.set_api_base(url);
            }
            match controller.api_base() {
                "" => println!("Backend URL: (not set)"),
                base => println!("Backend URL: {base}"),
            }
        }
        "select_file" => match intent.arg_str("path") {
            Some(path) => {
                if report(controller.select_file_path(Path::new(path))) {
                    println!("Loaded {path}.");
                }
            }
            None => println!("/upload requires a path"),
        },
        "set_label" => {
            match intent.arg_str("label") {
                Some(label) => controller.choose_label(label),
                None => println!("/label requires a label"),
            }
            println!("Object label: {}", controller.state().effective_label());
        }
        "generate_mask" => {
            println!("Generating mask...");
            if report(controller.generate_mask()) {
                println!(
                    "Mask ready for \"{}\". /refine <label> to adjust, /confirm to continue.",
                    controller.state().refined_label
                );
            }
        }
        "refine_mask" => {
            if let Some(label) = intent.arg_str("label") {
                controller.set_refined_label(label);
            }
            if report(controller.refine_mask()) {
                println!("Mask refined for \"{}\".", controller.state().refined_label);
            }
        }
        "confirm_mask" => {
            println!("Fetching animal suggestions...");
            if report(controller.confirm_mask()) {
                print_suggestions(controller);
            }
        }
        "pick_animal" => {
            let index = intent
                .command_args
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|value| usize::try_from(value).ok());
            match index {
                Some(index) => {
                    if report(controller.pick_animal(index)) {
                        print_prompts(controller);
                    }
                }
                None => println!("/pick requires a number from the list"),
            }
        }
        "custom_animal" => {
            let animal = intent.arg_str("animal").unwrap_or_default().to_string();
            if !animal.is_empty() {
                println!("Writing a prompt for {animal}...");
            }
            if report(controller.submit_custom_animal(&animal)) {
                print_prompts(controller);
            }
        }
        "set_prompt" => {
            controller.set_edited_prompt(intent.arg_str("text").unwrap_or_default());
            println!("Prompt: {}", controller.state().edited_prompt);
        }
        "set_negative_prompt" => {
            controller.set_edited_negative_prompt(intent.arg_str("text").unwrap_or_default());
            println!("Negative prompt: {}", controller.state().edited_negative_prompt);
        }
        "toggle_listening" => {
            if !controller.has_dictation() {
                println!("Dictation is not available here; use /say <text>.");
            } else if report(controller.toggle_listening()) {
                println!(
                    "Dictation {}.",
                    if controller.state().is_listening { "on" } else { "off" }
                );
            }
        }
        "transcript" => {
            if let Some(text) = intent.arg_str("text") {
                controller.append_transcript(text);
            }
            println!("Prompt: {}", controller.state().edited_prompt);
        }
        "generate" => {
            println!("Generating the final image...");
            if report(controller.start_generation()) {
                println!("Final image ready. /download, /save or /enhance.");
            }
        }
        "enhance" => {
            report(controller.open_enhance());
        }
        "story" => {
            if report(controller.generate_story()) {
                print_story(controller);
            }
        }
        "sketch" => {
            if report(controller.convert_to_sketch()) {
                println!("Showing: {}", controller.enhancement().active_preview);
            }
        }
        "remove_background" => {
            if report(controller.remove_background()) {
                println!("Showing: {}", controller.enhancement().active_preview);
            }
        }
        "enhance_all" => run_enhance_all(controller)?,
        "view" => {
            match intent.arg_str("preview").and_then(PreviewKind::parse) {
                Some(kind) => {
                    report(controller.select_preview(kind));
                }
                None => println!("/view requires original, sketch or no_bg"),
            }
            println!("Showing: {}", controller.enhancement().active_preview);
        }
        "upscale" => {
            let resolution = intent.arg_str("resolution").unwrap_or("2x").to_string();
            println!("Upscaling to {resolution}...");
            match controller.upscale_active_preview(&resolution) {
                Ok(image) => {
                    let target = PathBuf::from(format!("upscaled-{}", controller.download_file_name()));
                    report_written(write_data_url(&image, &target));
                }
                Err(err) => println!("Error: {err}"),
            }
        }
        "download" => match controller.active_image() {
            Some(image) => {
                let target = resolve_download_path(
                    intent.arg_str("path").map(Path::new),
                    &controller.download_file_name(),
                );
                report_written(write_data_url(image, &target));
            }
            None => println!("No image to download yet."),
        },
        "save" => {
            let Some(art_name) = intent.arg_str("art_name").map(str::to_string) else {
                println!("usage: /save <art name> | <description>");
                return Ok(());
            };
            let description = intent.arg_str("description").unwrap_or_default().to_string();
            let image = controller.active_image().map(str::to_string);
            match controller.request_gallery_save(image.as_deref()) {
                Ok(pending) => {
                    match controller.confirm_gallery_save(pending, &art_name, &description) {
                        Ok(()) => println!("Art saved to your gallery successfully!"),
                        Err(err) => println!("Error: {err}"),
                    }
                }
                Err(err) => println!("Error: {err}"),
            }
        }
        "login" => {
            let email = intent.arg_str("email").unwrap_or_default();
            let password = intent.arg_str("password").unwrap_or_default();
            if email.is_empty() || password.is_empty() {
                println!("usage: /login <email> <password>");
                return Ok(());
            }
            match controller.login(email, password) {
                Ok(user_id) => println!("Logged in as {user_id}."),
                Err(err) => println!("Error: {err}"),
            }
        }
        "logout" => {
            controller.logout();
            println!("Logged out.");
        }
        "gallery" => {
            let mut page = GalleryPage::new(session.clone(), events.clone());
            match page.mount(account) {
                GalleryMount::Redirect => println!("Log in with /login to see your gallery."),
                GalleryMount::Loaded => print_gallery(&page),
            }
        }
        "status" => print_status(controller),
        "restart" => {
            controller.restart();
            println!("Starting over.");
        }
        "unknown" => {
            let command = intent.arg_str("command").unwrap_or_default();
            println!("Unknown command: /{command}. Type /help for commands.");
        }
        other => println!("Unhandled action: {other}"),
    }
    Ok(())
}

/// Prints the error of a failed step; returns whether it succeeded.
fn report(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            println!("Error: {err}");
            false
        }
    }
}

fn report_written(result: Result<PathBuf>) {
    match result {
        Ok(path) => println!("Saved {}", path.display()),
        Err(err) => println!("Error: {err:#}"),
    }
}

/// Story, sketch and background removal, each on its own thread.
fn run_enhance_all(controller: &mut WizardController) -> Result<()> {
    let mut jobs = Vec::new();
    for op in EnhanceOp::ALL {
        match controller.begin_enhancement(op) {
            Ok(Some(job)) => jobs.push(job),
            Ok(None) => {}
            Err(err) => println!("{op}: {err}"),
        }
    }
    if jobs.is_empty() {
        return Ok(());
    }
    println!("Running {} enhancement(s)...", jobs.len());

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| thread::spawn(move || job.run()))
        .collect();
    for handle in handles {
        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => bail!("enhancement worker panicked"),
        };
        let op = outcome.op();
        match controller.finish_enhancement(outcome) {
            Ok(()) => println!("{op}: done"),
            Err(err) => println!("{op}: {err}"),
        }
    }
    if controller.enhancement().story().is_some() {
        print_story(controller);
    }
    Ok(())
}

fn print_step(controller: &WizardController) {
    println!("== Step {} ==", controller.step());
    let hint = match controller.step() {
        WizardStep::Upload => "/upload <path>",
        WizardStep::SelectObject => "/label <object>, then /mask",
        WizardStep::RefineMask => "/refine <label> or /confirm",
        WizardStep::ChooseAnimal => "/pick <n> or /custom <animal>",
        WizardStep::EditPrompt => "edit with /prompt, /negative or /say, then /generate",
        WizardStep::Result => "/download, /save, /enhance or /restart",
        WizardStep::Enhance => "/story, /sketch, /nobg, /enhance_all, /view, /upscale",
    };
    println!("Next: {hint}");
}

fn print_suggestions(controller: &WizardController) {
    let suggestions = &controller.state().suggestions;
    if suggestions.is_empty() {
        println!("No suggestions returned; try /custom <animal>.");
        return;
    }
    for (idx, animal) in suggestions.animals.iter().enumerate() {
        let marker = if *animal == controller.state().selected_animal {
            "*"
        } else {
            " "
        };
        println!("{marker} {}. {animal}", idx + 1);
    }
}

fn print_prompts(controller: &WizardController) {
    let state = controller.state();
    println!("Animal: {}", state.selected_animal);
    println!("Prompt: {}", state.edited_prompt);
    println!("Negative prompt: {}", state.edited_negative_prompt);
}

fn print_story(controller: &WizardController) {
    if let Some(story) = controller.enhancement().story() {
        println!("Story:\n{story}");
    }
}

fn print_status(controller: &WizardController) {
    let state = controller.state();
    println!("Step: {}", state.step);
    match controller.api_base() {
        "" => println!("Backend: (not set)"),
        base => println!("Backend: {base} ({})", controller.ai_name()),
    }
    if let Some(file) = &state.selected_file {
        println!("Image: {} ({} bytes)", file.name, file.len());
    }
    println!("Object label: {}", state.effective_label());
    if !state.refined_label.is_empty() {
        println!("Refined label: {}", state.refined_label);
    }
    println!(
        "Mask: {}",
        if state.mask_preview.is_some() { "ready" } else { "none" }
    );
    if !state.selected_animal.is_empty() {
        println!("Animal: {}", state.selected_animal);
    }
    if !state.edited_prompt.is_empty() {
        println!("Prompt: {}", state.edited_prompt);
    }
    println!(
        "Final image: {}",
        if state.final_image.is_some() { "ready" } else { "none" }
    );
    if state.step == WizardStep::Enhance {
        let enhancement = controller.enhancement();
        println!("Showing: {}", enhancement.active_preview);
        for op in EnhanceOp::ALL {
            let status = if enhancement.is_loading(op) {
                "running".to_string()
            } else if let Some(err) = enhancement.error(op) {
                format!("failed: {err}")
            } else if enhancement.result(op).is_some() {
                "done".to_string()
            } else {
                "-".to_string()
            };
            println!("  {op}: {status}");
        }
    }
    match controller.session().user_id() {
        Some(user_id) => println!("Logged in: {user_id}"),
        None => println!("Logged in: no"),
    }
    if state.has_error() {
        println!("Last error: {}", state.error);
    }
}

fn print_gallery(page: &GalleryPage) {
    if let Some(err) = page.error() {
        println!("Error: {err}");
        return;
    }
    if page.cards().is_empty() {
        println!("Your gallery is empty.");
        return;
    }
    for (idx, entry) in page.cards().iter().enumerate() {
        println!("{}. {}", idx + 1, describe_entry(entry));
    }
}

fn describe_entry(entry: &GalleryEntry) -> String {
    let name = match entry.art_name.trim() {
        "" => "(untitled)",
        name => name,
    };
    let mut line = format!("{name} - {}", entry.animal.trim());
    let created = entry.created_at_display();
    if !created.is_empty() {
        line.push_str(&format!(" ({created})"));
    }
    if !entry.description.trim().is_empty() {
        line.push_str(&format!(": {}", entry.description.trim()));
    }
    line
}

fn resolve_download_path(requested: Option<&Path>, default_name: &str) -> PathBuf {
    match requested {
        Some(path) if path.is_dir() => path.join(default_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_name),
    }
}

/// Decodes `url` into `path`, adding an extension from the MIME type when
/// the path has none.
fn write_data_url(url: &str, path: &Path) -> Result<PathBuf> {
    let (mime_type, bytes) = decode_data_url(url)?;
    let target = if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension_for_mime(&mime_type))
    };
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&target, bytes).with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

fn slug(text: &str) -> String {
    let slug: String = text
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "art".to_string()
    } else {
        slug
    }
}

fn compact_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

fn run_oneshot(args: RunArgs) -> Result<i32> {
    let config = EngineConfig::from_env().with_api_base(args.api_url.clone());
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let account: Arc<dyn AccountService> = Arc::new(HttpAccountService::new(&config)?);
    let mut controller = build_controller(
        &config,
        args.dryrun,
        account,
        Session::new(),
        EventWriter::new(&events_path, new_session_id()),
    )?;

    controller.select_file_path(&args.image)?;
    if let Some(label) = args.label.as_deref() {
        controller.choose_label(label);
    }
    println!("Generating mask for \"{}\"...", controller.state().effective_label());
    controller.generate_mask()?;
    controller.confirm_mask()?;
    match (args.animal.as_deref(), args.pick) {
        (Some(animal), _) => controller.submit_custom_animal(animal)?,
        (None, Some(pick)) => {
            let Some(index) = pick.checked_sub(1) else {
                bail!("--pick is 1-based");
            };
            controller.pick_animal(index)?
        }
        (None, None) => controller.pick_animal(0)?,
    }
    println!("Animal: {}", controller.state().selected_animal);
    println!("Prompt: {}", controller.state().edited_prompt);
    controller.start_generation()?;

    let Some(image) = controller.state().final_image.clone() else {
        bail!("no final image was produced");
    };
    let file_name = format!(
        "anything2image-{}-{}.png",
        slug(&controller.state().selected_animal),
        compact_timestamp()
    );
    let written = write_data_url(&image, &args.out.join(file_name))?;
    println!("Saved {}", written.display());
    Ok(0)
}

fn run_signup(args: SignupArgs) -> Result<i32> {
    let config = EngineConfig::from_env();
    let account = HttpAccountService::new(&config)?;
    Session::new().signup(&account, &args.email, &args.password, &args.full_name)?;
    println!("Account created for {}. Log in to start saving art.", args.email.trim());
    Ok(0)
}

fn run_gallery(args: GalleryArgs) -> Result<i32> {
    let config = EngineConfig::from_env();
    let account = HttpAccountService::new(&config)?;
    let session = Session::new();
    session.login(&account, &args.email, &args.password)?;

    let mut page = GalleryPage::new(session, EventWriter::disabled(new_session_id()));
    if page.mount(&account) == GalleryMount::Redirect {
        bail!("login did not produce a session");
    }
    print_gallery(&page);
    if let Some(err) = page.error() {
        bail!("{err}");
    }

    let Some(out) = args.out.as_deref() else {
        return Ok(0);
    };
    let mut written = 0usize;
    for (idx, entry) in page.cards().iter().enumerate() {
        for which in [GalleryImage::Final, GalleryImage::Original, GalleryImage::Masked] {
            let url = entry.image(which);
            if !url.starts_with("data:") {
                continue;
            }
            let stem = format!("{:02}-{}-{}", idx + 1, slug(&entry.art_name), which.as_str());
            match write_data_url(url, &out.join(stem)) {
                Ok(_) => written += 1,
                Err(err) => eprintln!("skipping {} of entry {}: {err:#}", which.as_str(), idx + 1),
            }
        }
    }
    println!("Wrote {written} image(s) to {}", out.display());
    Ok(0)
}
