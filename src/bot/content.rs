//! Built-in content catalogue and the runtime custom-rule store.
//!
//! Built-in rules come from embedded defaults plus an on-disk catalogue
//! (an `index.json` mapping keywords to template files) and never change at
//! runtime. Custom rules are authored through the add-keyword flow and
//! persisted one file per keyword; they are additive and never shadow a
//! built-in with the same name.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bot::outbound::{Button, Element, MessagePayload, OutboundMessage, QuickReply};

/// Errors from loading or persisting content.
#[derive(Debug)]
pub enum ContentError {
    ReadFile { path: PathBuf, source: std::io::Error },
    WriteFile { path: PathBuf, source: std::io::Error },
    ParseJson { path: PathBuf, source: serde_json::Error },
    EmptyTemplate { path: PathBuf },
    InvalidKeyword(String),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            Self::WriteFile { path, source } => {
                write!(f, "failed to write '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse '{}': {}", path.display(), source)
            }
            Self::EmptyTemplate { path } => {
                write!(f, "template '{}' has neither text nor attachment", path.display())
            }
            Self::InvalidKeyword(keyword) => {
                write!(f, "invalid keyword '{}': only letters, digits and spaces are allowed", keyword)
            }
        }
    }
}

impl std::error::Error for ContentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } | Self::WriteFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::EmptyTemplate { .. } | Self::InvalidKeyword(_) => None,
        }
    }
}

/// Canonical keyword form used for every store lookup.
pub fn normalize_keyword(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Keywords become filenames; keep them to letters, digits and spaces.
fn validate_keyword(keyword: &str) -> Result<(), ContentError> {
    if keyword.is_empty()
        || !keyword.chars().all(|c| c.is_alphanumeric() || c == ' ')
    {
        return Err(ContentError::InvalidKeyword(keyword.to_string()));
    }
    Ok(())
}

/// Read-only keyword -> reply-template catalogue, loaded once at startup.
pub struct ContentStore {
    rules: HashMap<String, MessagePayload>,
}

impl ContentStore {
    /// Embedded defaults plus whatever the catalogue directory provides.
    /// Per-file problems are logged and skipped; a missing directory just
    /// means defaults only.
    pub fn load(dir: &Path) -> Self {
        let mut rules = default_rules();

        match load_index(dir) {
            Ok(index) => {
                for (keyword, filename) in index {
                    let path = dir.join(&filename);
                    match load_template(&path) {
                        Ok(template) => {
                            rules.insert(normalize_keyword(&keyword), template);
                        }
                        Err(e) => warn!("skipping content rule '{keyword}': {e}"),
                    }
                }
            }
            Err(e) => info!("no content catalogue loaded: {e}"),
        }

        info!("content store ready ({} rules)", rules.len());
        Self { rules }
    }

    /// Defaults only; used by tests and by deployments without a catalogue.
    pub fn builtin() -> Self {
        Self { rules: default_rules() }
    }

    pub fn get(&self, keyword: &str) -> Option<&MessagePayload> {
        self.rules.get(&normalize_keyword(keyword))
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.rules.contains_key(&normalize_keyword(keyword))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn load_index(dir: &Path) -> Result<HashMap<String, String>, ContentError> {
    let path = dir.join("index.json");
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ContentError::ReadFile { path: path.clone(), source: e })?;
    serde_json::from_str(&raw).map_err(|e| ContentError::ParseJson { path, source: e })
}

fn load_template(path: &Path) -> Result<MessagePayload, ContentError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ContentError::ReadFile { path: path.to_path_buf(), source: e })?;
    let template: MessagePayload = serde_json::from_str(&raw)
        .map_err(|e| ContentError::ParseJson { path: path.to_path_buf(), source: e })?;
    if template.is_empty() {
        return Err(ContentError::EmptyTemplate { path: path.to_path_buf() });
    }
    Ok(template)
}

fn default_rules() -> HashMap<String, MessagePayload> {
    let mut rules = HashMap::new();

    let home = OutboundMessage::generic(vec![Element {
        title: "COVID-19".to_string(),
        subtitle: Some("Epidemic statistics".to_string()),
        item_url: None,
        image_url: None,
        buttons: Some(vec![
            Button::postback("Vietnam", "VN"),
            Button::postback("Global", "GB"),
            Button::postback("Top 10", "top10_cases"),
        ]),
    }]);
    let about = OutboundMessage::text_with_quick_replies(
        "I keep you posted on the epidemic and learn new keywords when you teach me.",
        vec![QuickReply::text("Home", "HOME")],
    );
    let more = OutboundMessage::text_with_quick_replies(
        "More detail is on the way, hold tight!",
        vec![QuickReply::text("Home", "HOME")],
    );

    for (keyword, message) in [("HOME", home), ("ABOUT_ME", about), ("MORE_INFO", more)] {
        if let OutboundMessage::Message(payload) = message {
            rules.insert(keyword.to_string(), payload);
        }
    }
    rules
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleFile {
    text: String,
}

/// Runtime-extensible keyword -> text rules, one `<KEYWORD>.json` per rule.
pub struct CustomRuleStore {
    dir: PathBuf,
    rules: RwLock<HashMap<String, String>>,
}

impl CustomRuleStore {
    /// Scan the directory for persisted rules so they survive a restart.
    /// Unreadable files are logged and skipped.
    pub fn load(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("cannot create custom-rule dir '{}': {e}", dir.display());
        }

        let mut rules = HashMap::new();
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match std::fs::read_to_string(&path) {
                    Ok(raw) => match serde_json::from_str::<RuleFile>(&raw) {
                        Ok(rule) => {
                            rules.insert(normalize_keyword(stem), rule.text);
                        }
                        Err(e) => warn!("skipping custom rule '{}': {e}", path.display()),
                    },
                    Err(e) => warn!("skipping custom rule '{}': {e}", path.display()),
                }
            }
        }

        info!("custom rule store ready ({} rules)", rules.len());
        Self { dir, rules: RwLock::new(rules) }
    }

    pub fn get(&self, keyword: &str) -> Option<String> {
        self.rules
            .read()
            .expect("custom rules lock poisoned")
            .get(&normalize_keyword(keyword))
            .cloned()
    }

    /// Persist a rule, then register it. The write is best-effort, not
    /// atomic; on failure nothing is registered and the caller may retry.
    pub fn add(&self, keyword: &str, text: &str) -> Result<(), ContentError> {
        let normalized = normalize_keyword(keyword);
        validate_keyword(&normalized)?;

        let path = self.dir.join(format!("{normalized}.json"));
        let contents = serde_json::to_string(&RuleFile { text: text.to_string() })
            .map_err(|e| ContentError::ParseJson { path: path.clone(), source: e })?;
        std::fs::write(&path, contents)
            .map_err(|e| ContentError::WriteFile { path, source: e })?;

        self.rules
            .write()
            .expect("custom rules lock poisoned")
            .insert(normalized, text.to_string());
        Ok(())
    }

    /// Sorted custom keywords, for `list keywords`.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .rules
            .read()
            .expect("custom rules lock poisoned")
            .keys()
            .cloned()
            .collect();
        keywords.sort();
        keywords
    }

    pub fn len(&self) -> usize {
        self.rules.read().expect("custom rules lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
