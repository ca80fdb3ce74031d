#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub arg_key: &'static str,
}

pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "api",
        action: "set_api_base",
        arg_key: "url",
    },
    CommandSpec {
        command: "label",
        action: "set_label",
        arg_key: "label",
    },
    CommandSpec {
        command: "refine",
        action: "refine_mask",
        arg_key: "label",
    },
    CommandSpec {
        command: "custom",
        action: "custom_animal",
        arg_key: "animal",
    },
    CommandSpec {
        command: "prompt",
        action: "set_prompt",
        arg_key: "text",
    },
    CommandSpec {
        command: "negative",
        action: "set_negative_prompt",
        arg_key: "text",
    },
    CommandSpec {
        command: "say",
        action: "transcript",
        arg_key: "text",
    },
    CommandSpec {
        command: "view",
        action: "view",
        arg_key: "preview",
    },
    CommandSpec {
        command: "upscale",
        action: "upscale",
        arg_key: "resolution",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "select_file",
        arg_key: "path",
    },
    CommandSpec {
        command: "download",
        action: "download",
        arg_key: "path",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[(&str, &str)] = &[
    ("mask", "generate_mask"),
    ("confirm", "confirm_mask"),
    ("generate", "generate"),
    ("enhance", "enhance"),
    ("story", "story"),
    ("sketch", "sketch"),
    ("nobg", "remove_background"),
    ("enhance_all", "enhance_all"),
    ("listen", "toggle_listening"),
    ("status", "status"),
    ("restart", "restart"),
    ("logout", "logout"),
    ("gallery", "gallery"),
    ("help", "help"),
];

pub(crate) const PICK_COMMAND: &str = "pick";
pub(crate) const LOGIN_COMMAND: &str = "login";
pub(crate) const SAVE_COMMAND: &str = "save";

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/api <url>",
    "/upload <path>",
    "/label <Stone|Cloud|Fire|Leaf|Other|custom text>",
    "/mask",
    "/refine [label]",
    "/confirm",
    "/pick <n>",
    "/custom <animal>",
    "/prompt <text>",
    "/negative <text>",
    "/listen",
    "/say <text>",
    "/generate",
    "/enhance",
    "/story",
    "/sketch",
    "/nobg",
    "/enhance_all",
    "/view <original|sketch|no_bg>",
    "/upscale <resolution>",
    "/download <path>",
    "/save <art name> | <description>",
    "/login <email> <password>",
    "/logout",
    "/gallery",
    "/status",
    "/restart",
    "/help",
];
