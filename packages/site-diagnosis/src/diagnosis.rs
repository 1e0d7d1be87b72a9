//! Structured key facts about a site, extracted by a chat model.
//!
//! Parsing failures trigger a full re-invocation through the
//! [`ResilientInvoker`]. That retry loop is separate from the invoker's
//! shrink loop: each extraction attempt starts again from the budget fit, and
//! a parse failure never shrinks the text.

use pulldown_cmark::{html, Parser};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{DiagnosisError, Result};
use crate::invoker::ResilientInvoker;
use crate::models::{ChatModel, Model};
use crate::prompts::DIAGNOSIS_FIELDS;
use crate::site::Site;

/// Default number of extraction attempts before giving up.
pub const DEFAULT_MAX_EXTRACTION_ATTEMPTS: usize = 5;

/// Key facts about a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub name: String,
    pub contacts: String,
    pub industries: String,
    pub investment_stages: String,
}

/// Why a model reply is not a diagnosis.
#[derive(Debug, Error)]
pub enum DiagnosisParseError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unexpected field: {0}")]
    UnexpectedField(String),
}

impl Diagnosis {
    /// Parse a model reply.
    ///
    /// Code fences are stripped. The reply must be a JSON object whose keys are
    /// exactly the four diagnosis fields (compared case-insensitively, with
    /// spaces and hyphens read as underscores). Non-string values are flattened.
    pub fn parse(reply: &str) -> std::result::Result<Self, DiagnosisParseError> {
        let value: Value = serde_json::from_str(openai_client::strip_code_blocks(reply))?;
        let Value::Object(object) = value else {
            return Err(DiagnosisParseError::NotAnObject);
        };

        let mut fields = Map::new();
        for (key, value) in object {
            let key = canonical_key(&key);
            if !DIAGNOSIS_FIELDS.contains(&key.as_str()) || fields.contains_key(&key) {
                return Err(DiagnosisParseError::UnexpectedField(key));
            }
            fields.insert(key, value);
        }

        let mut take = |field: &'static str| {
            fields
                .remove(field)
                .map(|value| flatten(&value))
                .ok_or(DiagnosisParseError::MissingField(field))
        };

        Ok(Self {
            name: take("name")?,
            contacts: take("contacts")?,
            industries: take("industries")?,
            investment_stages: take("investment_stages")?,
        })
    }

    /// Field labels and values in display order.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("Name", &self.name),
            ("Contacts", &self.contacts),
            ("Industries", &self.industries),
            ("Investment stages", &self.investment_stages),
        ]
    }

    /// Markdown bullet list, one line per field.
    pub fn to_markdown(&self) -> String {
        self.fields()
            .iter()
            .map(|(label, value)| format!("- **{}:** {}\n", label, single_line(value)))
            .collect()
    }

    /// HTML rendering of [`Diagnosis::to_markdown`].
    pub fn to_html(&self) -> String {
        let markdown = self.to_markdown();
        let mut out = String::new();
        html::push_html(&mut out, Parser::new(&markdown));
        out
    }
}

fn canonical_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn single_line(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render any JSON value as a display string.
fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, flatten(v)))
            .collect::<Vec<_>>()
            .join("; "),
    }
}

/// Extracts a [`Diagnosis`] from a site, re-invoking the model on malformed replies.
pub struct DiagnosisExtractor<M = ChatModel> {
    model: M,
    invoker: ResilientInvoker,
    max_attempts: usize,
}

impl<M: Model<Output = String>> DiagnosisExtractor<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            invoker: ResilientInvoker::default(),
            max_attempts: DEFAULT_MAX_EXTRACTION_ATTEMPTS,
        }
    }

    /// Invoker (and its shrink policy) used for each attempt.
    pub fn with_invoker(mut self, invoker: ResilientInvoker) -> Self {
        self.invoker = invoker;
        self
    }

    /// Full invocations allowed before [`DiagnosisError::PersistentExtractionFailure`].
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Invoke the model until its reply parses.
    ///
    /// Provider errors and exhausted shrinking end the loop immediately.
    pub async fn extract(&self, site: &Site) -> Result<Diagnosis> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            let invocation = self.invoker.invoke(site, &self.model).await?;

            match Diagnosis::parse(&invocation.output) {
                Ok(diagnosis) => {
                    info!(
                        url = %site.url(),
                        attempt,
                        keep_fraction = invocation.keep_fraction.value(),
                        "Diagnosis extracted"
                    );
                    return Ok(diagnosis);
                }
                Err(e) => {
                    warn!(url = %site.url(), attempt, error = %e, "Malformed diagnosis, re-invoking");
                    last_error = e.to_string();
                }
            }
        }

        Err(DiagnosisError::PersistentExtractionFailure {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
