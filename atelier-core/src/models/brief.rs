//! Project briefs from the upstream project catalog.
//!
//! The engine consumes a brief only as a single query string. Enum-like
//! values arrive as `SNAKE_CASE` tokens and are rewritten to lowercase
//! space-separated words; missing fields are omitted silently.

use serde::{Deserialize, Serialize};

/// A project brief. All fields optional; extra upstream fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Brief {
    pub title: Option<String>,
    pub description: Option<String>,
    pub modality: Option<String>,
    pub contract: Option<String>,
    pub specialty: Option<String>,
    pub requirements: Option<String>,
}

impl Brief {
    /// Flatten the present fields into one human-readable paragraph.
    pub fn to_query_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(title) = non_empty(&self.title) {
            parts.push(title.to_string());
        }
        if let Some(description) = non_empty(&self.description) {
            parts.push(description.to_string());
        }
        if let Some(modality) = non_empty(&self.modality) {
            parts.push(humanize(modality));
        }
        if let Some(contract) = non_empty(&self.contract) {
            parts.push(humanize(contract));
        }
        if let Some(specialty) = non_empty(&self.specialty) {
            parts.push(humanize(specialty));
        }
        if let Some(requirements) = non_empty(&self.requirements) {
            parts.push(requirements.to_string());
        }

        parts.join(". ")
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

/// Rewrite enum-like tokens: underscores become spaces, letters lowercase.
fn humanize(value: &str) -> String {
    value.replace('_', " ").to_lowercase()
}
