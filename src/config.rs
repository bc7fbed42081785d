use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
pub const APP_NAME: &str = "rldesk";
pub const DEFAULT_API_URL: &str = "http://localhost:3000/contacts";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from, if one existed.
    pub config_path: Option<PathBuf>,
    pub api_url: String,
    pub request_timeout: Option<Duration>,
    pub keys: Keys,
    pub ui: UiConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: None,
            keys: Keys::default(),
            ui: UiFile::default().into(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Replace the backend URL, e.g. from `--api`.
    pub fn with_api_url(mut self, url: &str) -> Result<Self> {
        self.api_url = validate_api_url(url)?;
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn validate_api_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        bail!("`api_url` must not be empty");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("`api_url` must be an http(s) URL, got `{}`", url);
    }
    Ok(url.to_string())
}

// =============================================================================
// UI
// =============================================================================

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
    pub error: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// =============================================================================
// Key Bindings
// =============================================================================

/// Key bindings grouped by the context they are active in.
#[derive(Debug, Clone, Default)]
pub struct Keys {
    /// Active on the listing, alongside `listing`
    pub global: GlobalKeys,
    /// Table navigation and per-row actions
    pub listing: ListingKeys,
    /// Detail view, confirmation and notice popups
    pub modal: ModalKeys,
    /// Edit popup and new-contact screen
    pub form: FormKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub search: Vec<String>,
    pub sort: Vec<String>,
    pub new_contact: Vec<String>,
    pub refresh: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListingKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub page_down: Vec<String>,
    pub page_up: Vec<String>,
    pub view: Vec<String>,
    pub edit: Vec<String>,
    pub delete: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModalKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub edit: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FormKeys {
    pub cancel: Vec<String>,
    pub submit: Vec<String>,
    pub next_field: Vec<String>,
    pub prev_field: Vec<String>,
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: vec!["q".into()],
            search: vec!["/".into()],
            sort: vec!["s".into()],
            new_contact: vec!["n".into(), "a".into()],
            refresh: vec!["r".into(), "F5".into()],
        }
    }
}

impl Default for ListingKeys {
    fn default() -> Self {
        Self {
            next: vec!["j".into(), "Down".into()],
            prev: vec!["k".into(), "Up".into()],
            page_down: vec!["PageDown".into()],
            page_up: vec!["PageUp".into()],
            view: vec!["Enter".into(), "v".into()],
            edit: vec!["e".into()],
            delete: vec!["d".into(), "Delete".into()],
        }
    }
}

impl Default for ModalKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into(), "q".into()],
            confirm: vec!["Enter".into(), "y".into()],
            edit: vec!["e".into()],
        }
    }
}

impl Default for FormKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into()],
            submit: vec!["Enter".into()],
            next_field: vec!["Tab".into(), "Down".into()],
            prev_field: vec!["Backtab".into(), "Up".into()],
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    listing: ListingKeysFile,
    modal: ModalKeysFile,
    form: FormKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalKeysFile {
    quit: KeyBinding,
    search: KeyBinding,
    sort: KeyBinding,
    new_contact: KeyBinding,
    refresh: KeyBinding,
}

impl Default for GlobalKeysFile {
    fn default() -> Self {
        let defaults = GlobalKeys::default();
        Self {
            quit: KeyBinding::Multiple(defaults.quit),
            search: KeyBinding::Multiple(defaults.search),
            sort: KeyBinding::Multiple(defaults.sort),
            new_contact: KeyBinding::Multiple(defaults.new_contact),
            refresh: KeyBinding::Multiple(defaults.refresh),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ListingKeysFile {
    next: KeyBinding,
    prev: KeyBinding,
    page_down: KeyBinding,
    page_up: KeyBinding,
    view: KeyBinding,
    edit: KeyBinding,
    delete: KeyBinding,
}

impl Default for ListingKeysFile {
    fn default() -> Self {
        let defaults = ListingKeys::default();
        Self {
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            page_down: KeyBinding::Multiple(defaults.page_down),
            page_up: KeyBinding::Multiple(defaults.page_up),
            view: KeyBinding::Multiple(defaults.view),
            edit: KeyBinding::Multiple(defaults.edit),
            delete: KeyBinding::Multiple(defaults.delete),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ModalKeysFile {
    cancel: KeyBinding,
    confirm: KeyBinding,
    edit: KeyBinding,
}

impl Default for ModalKeysFile {
    fn default() -> Self {
        let defaults = ModalKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            confirm: KeyBinding::Multiple(defaults.confirm),
            edit: KeyBinding::Multiple(defaults.edit),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FormKeysFile {
    cancel: KeyBinding,
    submit: KeyBinding,
    next_field: KeyBinding,
    prev_field: KeyBinding,
}

impl Default for FormKeysFile {
    fn default() -> Self {
        let defaults = FormKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            submit: KeyBinding::Multiple(defaults.submit),
            next_field: KeyBinding::Multiple(defaults.next_field),
            prev_field: KeyBinding::Multiple(defaults.prev_field),
        }
    }
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: GlobalKeys {
                quit: file.global.quit.into_vec(),
                search: file.global.search.into_vec(),
                sort: file.global.sort.into_vec(),
                new_contact: file.global.new_contact.into_vec(),
                refresh: file.global.refresh.into_vec(),
            },
            listing: ListingKeys {
                next: file.listing.next.into_vec(),
                prev: file.listing.prev.into_vec(),
                page_down: file.listing.page_down.into_vec(),
                page_up: file.listing.page_up.into_vec(),
                view: file.listing.view.into_vec(),
                edit: file.listing.edit.into_vec(),
                delete: file.listing.delete.into_vec(),
            },
            modal: ModalKeys {
                cancel: file.modal.cancel.into_vec(),
                confirm: file.modal.confirm.into_vec(),
                edit: file.modal.edit.into_vec(),
            },
            form: FormKeys {
                cancel: file.form.cancel.into_vec(),
                submit: file.form.submit.into_vec(),
                next_field: file.form.next_field.into_vec(),
                prev_field: file.form.prev_field.into_vec(),
            },
        }
    }
}

/// Canonical form of a binding for collision detection.
/// Single characters keep their case ('D' is not 'd'); key names do not.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

fn validate_key_bindings(keys: &Keys) -> Result<()> {
    let global = [
        ("quit", keys.global.quit.as_slice()),
        ("search", keys.global.search.as_slice()),
        ("sort", keys.global.sort.as_slice()),
        ("new_contact", keys.global.new_contact.as_slice()),
        ("refresh", keys.global.refresh.as_slice()),
    ];
    check_context_collisions(&global, "global")?;

    // Listing keys are live at the same time as the global ones
    let mut listing: Vec<(&str, &[String])> = global.to_vec();
    listing.extend([
        ("next", keys.listing.next.as_slice()),
        ("prev", keys.listing.prev.as_slice()),
        ("page_down", keys.listing.page_down.as_slice()),
        ("page_up", keys.listing.page_up.as_slice()),
        ("view", keys.listing.view.as_slice()),
        ("edit", keys.listing.edit.as_slice()),
        ("delete", keys.listing.delete.as_slice()),
    ]);
    check_context_collisions(&listing, "listing")?;

    check_context_collisions(
        &[
            ("cancel", &keys.modal.cancel),
            ("confirm", &keys.modal.confirm),
            ("edit", &keys.modal.edit),
        ],
        "modal",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.form.cancel),
            ("submit", &keys.form.submit),
            ("next_field", &keys.form.next_field),
            ("prev_field", &keys.form.prev_field),
        ],
        "form",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_url: String,
    request_timeout_secs: Option<u64>,
    keys: KeysFile,
    ui: UiFile,
    log: LogFile,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: None,
            keys: KeysFile::default(),
            ui: UiFile::default(),
            log: LogFile::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LogFile {
    file: Option<PathBuf>,
    level: Option<String>,
}

impl From<LogFile> for LogConfig {
    fn from(file: LogFile) -> Self {
        let level = file
            .level
            .map(|level| level.trim().to_string())
            .filter(|level| !level.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        Self {
            file: file.file.map(|path| expand_tilde(&path)),
            level,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
    error: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
            error: RgbColor::new(220, 50, 47),
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        let colors = file.colors;
        Self {
            colors: UiColors {
                border: colors.border,
                selection_bg: colors.selection_bg,
                selection_fg: colors.selection_fg,
                separator: colors.separator,
                status_fg: colors.status_fg,
                status_bg: colors.status_bg,
                error: colors.error,
            },
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration. An explicit path must exist; the default location
/// may be absent, in which case built-in defaults apply.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                return Ok(Config::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let mut config =
        parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))?;
    config.config_path = Some(path);
    Ok(config)
}

/// Parse configuration text.
pub fn parse(raw: &str) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .context("failed to deserialize configuration")?;

    let api_url = validate_api_url(&cfg_file.api_url)?;

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    let request_timeout = cfg_file
        .request_timeout_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(Config {
        config_path: None,
        api_url,
        request_timeout,
        keys,
        ui: cfg_file.ui.into(),
        log: cfg_file.log.into(),
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn unknown_keys<'a>(value: &'a toml::Value, known: &[&str]) -> Vec<&'a str> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };
    let known: HashSet<&str> = known.iter().copied().collect();
    table
        .keys()
        .map(String::as_str)
        .filter(|key| !known.contains(key))
        .collect()
}

fn warn_unknown_keys(value: &toml::Value) {
    for key in unknown_keys(value, &["api_url", "request_timeout_secs", "keys", "ui", "log"]) {
        eprintln!("warning: unknown configuration key `{}`", key);
    }

    if let Some(keys) = value.get("keys") {
        warn_unknown_keys_section(keys);
    }

    if let Some(ui) = value.get("ui") {
        for key in unknown_keys(ui, &["colors"]) {
            eprintln!("warning: unknown ui.* entry `{}`", key);
        }
        if let Some(colors) = ui.get("colors") {
            let known = [
                "border",
                "selection_bg",
                "selection_fg",
                "separator",
                "status_fg",
                "status_bg",
                "error",
            ];
            for key in unknown_keys(colors, &known) {
                eprintln!("warning: unknown ui.colors entry `{}`", key);
            }
        }
    }

    if let Some(log) = value.get("log") {
        for key in unknown_keys(log, &["file", "level"]) {
            eprintln!("warning: unknown log.* entry `{}`", key);
        }
    }
}

fn warn_unknown_keys_section(value: &toml::Value) {
    for key in unknown_keys(value, &["global", "listing", "modal", "form"]) {
        eprintln!("warning: unknown keys.* context `{}`", key);
    }

    let contexts: [(&str, &[&str]); 4] = [
        ("global", &["quit", "search", "sort", "new_contact", "refresh"]),
        (
            "listing",
            &["next", "prev", "page_down", "page_up", "view", "edit", "delete"],
        ),
        ("modal", &["cancel", "confirm", "edit"]),
        ("form", &["cancel", "submit", "next_field", "prev_field"]),
    ];
    for (context, known) in contexts {
        if let Some(v) = value.get(context) {
            for key in unknown_keys(v, known) {
                eprintln!("warning: unknown keys.{}.* entry `{}`", context, key);
            }
        }
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.request_timeout.is_none());
        assert_eq!(config.keys.global.quit, vec!["q"]);
        assert_eq!(config.log.level, "info");
        assert!(config.log.file.is_none());
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
            api_url = "https://contacts.example.com/api/contacts/"
            request_timeout_secs = 5

            [keys.global]
            quit = ["Q", "F10"]
            sort = "o"

            [keys.form]
            submit = "F2"

            [ui.colors]
            border = [1, 2, 3]
            error = { r = 10, g = 20, b = 30 }

            [log]
            level = "rldesk=debug"
            file = "/tmp/rldesk-test.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://contacts.example.com/api/contacts");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.keys.global.quit, vec!["Q", "F10"]);
        assert_eq!(config.keys.global.sort, vec!["o"]);
        // Untouched actions keep their defaults
        assert_eq!(config.keys.global.search, vec!["/"]);
        assert_eq!(config.keys.form.submit, vec!["F2"]);
        assert_eq!(config.ui.colors.border, RgbColor::new(1, 2, 3));
        assert_eq!(config.ui.colors.error, RgbColor::new(10, 20, 30));
        assert_eq!(config.log.level, "rldesk=debug");
        assert_eq!(config.log.file, Some(PathBuf::from("/tmp/rldesk-test.log")));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = parse("request_timeout_secs = 0").unwrap();
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_collision_in_context_is_rejected() {
        let err = parse(
            r#"
            [keys.modal]
            cancel = "x"
            edit = "x"
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("collision in [keys.modal]"));
    }

    #[test]
    fn test_listing_collides_with_global() {
        let err = parse(
            r#"
            [keys.listing]
            delete = "q"
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("'quit' and 'delete'"));
    }

    #[test]
    fn test_key_names_collide_case_insensitively() {
        assert!(parse("[keys.form]\ncancel = \"ENTER\"").is_err());
        // Characters are case-sensitive
        assert!(parse("[keys.modal]\nedit = \"E\"").is_ok());
    }

    #[test]
    fn test_bad_api_url() {
        assert!(parse("api_url = \"localhost:3000\"").is_err());
        assert!(parse("api_url = \"  \"").is_err());
        let config = Config::default().with_api_url("http://127.0.0.1:1/c/").unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:1/c");
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load(Some(&missing)).is_err());

        let present = dir.path().join("config.toml");
        fs::write(&present, "api_url = \"http://example.test/contacts\"\n").unwrap();
        let config = load(Some(&present)).unwrap();
        assert_eq!(config.api_url, "http://example.test/contacts");
        assert_eq!(config.config_path.as_deref(), Some(present.as_path()));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/logs/rldesk.log"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("logs/rldesk.log"));
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
