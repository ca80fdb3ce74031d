use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, LOGIN_COMMAND, NO_ARG_COMMANDS, PICK_COMMAND, SAVE_COMMAND, SINGLE_PATH_COMMANDS,
    TEXT_ARG_COMMANDS,
};

/// One line typed into the wizard session, resolved to an action name plus
/// its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn find_spec<'a>(command: &str, specs: &'a [CommandSpec]) -> Option<&'a CommandSpec> {
    specs.iter().find(|spec| spec.command == command)
}

fn parse_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Accepts 1-based indices as shown in the suggestion list.
fn parse_pick_index(arg: &str) -> Option<usize> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .and_then(|value| value.checked_sub(1))
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return Intent::new("set_prompt", text)
            .with_arg("text", Value::String(raw_trimmed.to_string()));
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return Intent::new("unknown", text).with_arg("command", Value::String(String::new()));
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(spec) = find_spec(&command, TEXT_ARG_COMMANDS) {
        return Intent::new(spec.action, text)
            .with_arg(spec.arg_key, Value::String(arg.to_string()));
    }

    if let Some(spec) = find_spec(&command, SINGLE_PATH_COMMANDS) {
        return Intent::new(spec.action, text)
            .with_arg(spec.arg_key, Value::String(parse_single_path_arg(arg)));
    }

    if let Some((_, action)) = NO_ARG_COMMANDS.iter().find(|(name, _)| *name == command) {
        return Intent::new(action, text);
    }

    if command == PICK_COMMAND {
        let index = parse_pick_index(arg)
            .map(|value| Value::Number(value.into()))
            .unwrap_or(Value::Null);
        return Intent::new("pick_animal", text).with_arg("index", index);
    }

    if command == LOGIN_COMMAND {
        let parts = parse_args(arg);
        let email = parts.first().cloned().unwrap_or_default();
        let password = parts.get(1).cloned().unwrap_or_default();
        return Intent::new("login", text)
            .with_arg("email", Value::String(email))
            .with_arg("password", Value::String(password));
    }

    if command == SAVE_COMMAND {
        let (art_name, description) = match arg.split_once('|') {
            Some((name, description)) => (name.trim(), description.trim()),
            None => (arg, ""),
        };
        return Intent::new("save", text)
            .with_arg("art_name", Value::String(art_name.to_string()))
            .with_arg("description", Value::String(description.to_string()));
    }

    Intent::new("unknown", text)
        .with_arg("command", Value::String(command))
        .with_arg("arg", Value::String(arg.to_string()))
}
