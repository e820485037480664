//! Startup configuration: API credentials plus the per-doc-type keyword and
//! prompt tables.
//!
//! `keywords.json` maps a doc type to a list of keywords, `prompts.json`
//! maps a doc type to an extra instruction for the language model. Both are
//! looked up in `<dir>/data/` first and then in `<dir>/`. A missing or
//! malformed file is logged and treated as empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::SourceKind;

pub const KEYWORDS_FILE: &str = "keywords.json";
pub const PROMPTS_FILE: &str = "prompts.json";

/// Default target language of the rewrite.
pub const DEFAULT_LANGUAGE: &str = "Chinese";

/// Credentials for the OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiCredentials {
    /// Read credentials from the environment.
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_API_BASE` (required)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_values(
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("OPENAI_API_BASE").ok(),
        )
    }

    /// Validate already-read values. Blank strings count as missing.
    pub fn from_values(api_key: Option<String>, base_url: Option<String>) -> Result<Self, AppError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::ConfigError("OPENAI_API_KEY not set".into()))?;
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::ConfigError("OPENAI_API_BASE not set".into()))?;
        Ok(Self {
            api_key,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }
}

/// Keyword and prompt tables keyed by doc type.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub keywords: HashMap<String, Vec<String>>,
    pub prompts: HashMap<String, String>,
}

impl AppConfig {
    /// Load both tables from `dir`. Never fails; see [`AppConfig::validate`].
    pub fn load(dir: &Path) -> Self {
        Self {
            keywords: load_json_table(dir, KEYWORDS_FILE),
            prompts: load_json_table(dir, PROMPTS_FILE),
        }
    }

    /// The run cannot start when neither table has any content.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.keywords.is_empty() && self.prompts.is_empty() {
            return Err(AppError::ConfigError(format!(
                "neither {KEYWORDS_FILE} nor {PROMPTS_FILE} could be loaded"
            )));
        }
        Ok(())
    }

    /// Resolve the prompt settings for one run.
    pub fn prompt_config(
        &self,
        doc_type: &str,
        focus: Option<&str>,
        tool_name: Option<&str>,
        language: &str,
    ) -> PromptConfig {
        PromptConfig {
            doc_type: doc_type.to_string(),
            keywords: self.keywords.get(doc_type).cloned().unwrap_or_default(),
            doc_prompt: self.prompts.get(doc_type).cloned(),
            focus: focus.map(String::from),
            tool_name: tool_name.map(String::from),
            language: language.to_string(),
        }
    }
}

/// `<dir>/data/<file>` if it exists, otherwise `<dir>/<file>`.
pub fn config_path(dir: &Path, file_name: &str) -> PathBuf {
    let data_path = dir.join("data").join(file_name);
    if data_path.exists() {
        data_path
    } else {
        dir.join(file_name)
    }
}

fn load_json_table<T: DeserializeOwned>(dir: &Path, file_name: &str) -> HashMap<String, T> {
    let path = config_path(dir, file_name);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Configuration file not readable");
            return HashMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(table) => {
            tracing::info!(path = %path.display(), "Loaded configuration file");
            table
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Invalid JSON in configuration file");
            HashMap::new()
        }
    }
}

/// Everything that shapes the instruction sent with each rewrite.
#[derive(Debug, Clone, Default)]
pub struct PromptConfig {
    pub doc_type: String,
    pub keywords: Vec<String>,
    /// Extra instruction from `prompts.json` for this doc type.
    pub doc_prompt: Option<String>,
    pub focus: Option<String>,
    pub tool_name: Option<String>,
    pub language: String,
}

impl PromptConfig {
    /// Instruction for content of the given kind.
    ///
    /// HTML gets a heavier restructuring instruction than markdown.
    pub fn instruction(&self, kind: SourceKind) -> String {
        let language = if self.language.trim().is_empty() {
            DEFAULT_LANGUAGE
        } else {
            self.language.as_str()
        };

        let mut parts = vec![match kind {
            SourceKind::RawHtml => format!(
                "Convert the following HTML content into a well-structured {language} Markdown document. \
                 Rebuild headings, lists, tables and code blocks from the markup and drop navigation, \
                 scripts, forms and other page chrome."
            ),
            SourceKind::FilteredMarkdown | SourceKind::StructuredExtraction => format!(
                "Convert the following Markdown content into a well-structured {language} Markdown document."
            ),
        }];
        parts.push(
            "Output the document directly. Do not wrap it in ```markdown fences; \
             it is saved to a .md file as-is."
                .to_string(),
        );

        if let Some(prompt) = self.doc_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            parts.push(prompt.trim().to_string());
        }
        if let Some(tool) = self.tool_name.as_deref().filter(|t| !t.trim().is_empty()) {
            parts.push(format!("The documentation describes {}.", tool.trim()));
        }
        if let Some(focus) = self.focus.as_deref().filter(|f| !f.trim().is_empty()) {
            parts.push(format!("Focus on: {}.", focus.trim()));
        }
        if !self.keywords.is_empty() {
            parts.push(format!(
                "Pay particular attention to: {}.",
                self.keywords.join(", ")
            ));
        }

        parts.join("\n")
    }
}
