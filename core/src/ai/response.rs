// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Strict validation of the model's reply.
//!
//! The model is asked for a JSON object but may wrap it in a Markdown code fence.
//! Anything else that doesn't match the schema is an invalid response.

use super::model::{Analysis, AnalysisFailure};
use crate::tags;
use itertools::Itertools;
use serde::Deserialize;

/// Longest tag accepted from the model, in characters.
pub const MAX_TAG_CHARS: usize = 64;

/// Most tags accepted from the model.
pub const MAX_TAGS: usize = 32;

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    description: String,
    tags: Vec<String>,
    #[serde(default)]
    references: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    meaning: Option<String>,
}

/// Parses and validates the text content of a model reply.
pub fn parse(content: &str) -> Result<Analysis, AnalysisFailure> {
    let json = strip_code_fence(content);
    if json.is_empty() {
        return Err(AnalysisFailure::invalid_response("empty reply"));
    }

    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| AnalysisFailure::invalid_response(format!("reply is not the expected JSON: {}", e)))?;

    let description = raw.description.trim();
    if description.is_empty() {
        return Err(AnalysisFailure::invalid_response("description is empty"));
    }

    if let Some(tag) = raw.tags.iter().find(|t| t.chars().count() > MAX_TAG_CHARS) {
        return Err(AnalysisFailure::invalid_response(format!(
            "tag longer than {} characters: {:?}",
            MAX_TAG_CHARS, tag
        )));
    }

    let tags: Vec<String> = raw
        .tags
        .iter()
        .filter_map(|t| tags::normalize(t))
        .unique_by(|t| tags::key(t))
        .collect();

    if tags.len() > MAX_TAGS {
        return Err(AnalysisFailure::invalid_response(format!(
            "{} tags is more than the limit of {}",
            tags.len(),
            MAX_TAGS
        )));
    }

    Ok(Analysis {
        description: description.to_string(),
        tags,
        references: non_blank(raw.references),
        template: non_blank(raw.template),
        caption: non_blank(raw.caption),
        meaning: non_blank(raw.meaning),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Removes a surrounding ``` or ```json fence.
fn strip_code_fence(content: &str) -> &str {
    let content = content.trim();
    let content = content
        .strip_prefix("```json")
        .or_else(|| content.strip_prefix("```"))
        .unwrap_or(content);
    let content = content.strip_suffix("```").unwrap_or(content);
    content.trim()
}
