use std::path::PathBuf;

use ratcompose_core::{QuadOption, log_debug, xdg_config_dir};
use ratcompose_engine::ComposeSettings;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ComposeConfig {
    pub(crate) settings: ComposeSettings,
    /// `[editor] command`; falls back to `$VISUAL` and `$EDITOR`.
    pub(crate) editor: Option<String>,
    /// `[ui] theme`: "default" or "mono".
    pub(crate) theme: Option<String>,
    pub(crate) load_error: Option<String>,
}

fn config_path_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("ratcompose.toml"),
        xdg_config_dir().join("ratcompose").join("ratcompose.toml"),
    ]
}

fn load_config_text() -> Option<String> {
    for path in config_path_candidates() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            return Some(content);
        }
    }
    None
}

pub(crate) fn load_compose_config() -> ComposeConfig {
    let config = parse_compose_config(load_config_text().as_deref());
    if let Some(err) = config.load_error.as_deref() {
        log_debug(&format!("config warn {}", err));
    }
    config
}

pub(crate) fn parse_compose_config(content: Option<&str>) -> ComposeConfig {
    let mut config = ComposeConfig::default();
    let Some(content) = content else {
        return config;
    };
    let value: toml::Value = match toml::from_str(content) {
        Ok(value) => value,
        Err(_) => {
            config.load_error = Some("Invalid ratcompose.toml".to_string());
            return config;
        }
    };
    let settings = &mut config.settings;

    if let Some(compose) = value.get("compose") {
        if let Some(v) = compose.get("show_user_headers").and_then(parse_bool) {
            settings.show_user_headers = v;
        }
        if let Some(v) = compose.get("edit_headers").and_then(parse_bool) {
            settings.edit_headers = v;
        }
        if let Some(v) = compose.get("x_comment_to").and_then(parse_bool) {
            settings.x_comment_to = v;
        }
        if let Some(v) = parse_quad(compose, "postpone") {
            settings.postpone = v;
        }
        if let Some(v) = parse_quad(compose, "copy") {
            settings.copy = v;
        }
        if let Some(v) = compose.get("status_format").and_then(|v| v.as_str()) {
            settings.status_format = v.to_string();
        }
    }

    if let Some(crypt) = value.get("crypt") {
        if let Some(v) = crypt.get("opportunistic_encrypt").and_then(parse_bool) {
            settings.opportunistic_encrypt = v;
        }
        if let Some(v) = crypt.get("autocrypt").and_then(parse_bool) {
            settings.autocrypt = v;
        }
        settings.pgp_sign_as = parse_string(crypt, "pgp_sign_as");
        settings.smime_sign_as = parse_string(crypt, "smime_sign_as");
        settings.smime_encrypt_with = parse_string(crypt, "smime_encrypt_with");
    }

    config.editor = value
        .get("editor")
        .and_then(|editor| parse_string(editor, "command"));
    config.theme = value.get("ui").and_then(|ui| parse_string(ui, "theme"));
    config
}

fn parse_string(value: &toml::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_quad(value: &toml::Value, key: &str) -> Option<QuadOption> {
    let raw = value.get(key)?;
    if let Some(flag) = raw.as_bool() {
        return Some(if flag { QuadOption::Yes } else { QuadOption::No });
    }
    let parsed = raw.as_str().and_then(QuadOption::parse);
    if parsed.is_none() {
        log_debug(&format!("config warn {} is not a quad option", key));
    }
    parsed
}

fn parse_bool(value: &toml::Value) -> Option<bool> {
    value.as_bool().or_else(|| {
        value
            .as_str()
            .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
    })
}
