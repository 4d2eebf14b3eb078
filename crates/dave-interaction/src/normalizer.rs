//! Request framing and response parsing for the two backends.
//!
//! Wire revision: query-string GET. Inference takes `sentence` plus the
//! backend's tuning fields; the version endpoint answers
//! `{"updated": bool, "version": .., "old": ..}`.

use dave_core::generation::{Backend, Context, GenerationRequest, VersionTransition};
use dave_core::{DaveError, Result};
use serde_json::Value;

/// Frames utterances for the legacy backend and separates its output.
pub const LEGACY_SEPARATOR: &str = ";";
/// End-of-sequence token separating the modern backend's output.
pub const MODERN_SEPARATOR: &str = "EOS";

/// Returns the response separator for a backend.
pub fn separator(backend: Backend) -> &'static str {
    match backend {
        Backend::Legacy => LEGACY_SEPARATOR,
        Backend::Modern => MODERN_SEPARATOR,
    }
}

/// Builds the `sentence` field for a request.
///
/// Legacy joins every trimmed utterance with `;`. Modern sends its single
/// utterance untouched.
pub fn frame_sentence(backend: Backend, context: &Context) -> Result<String> {
    if context.is_empty() {
        return Err(DaveError::invalid_context("context carries no utterances"));
    }

    match backend {
        Backend::Legacy => Ok(context
            .utterances()
            .into_iter()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(LEGACY_SEPARATOR)),
        Backend::Modern => match context {
            Context::Single(text) => Ok(text.clone()),
            Context::Sequence(items) if items.len() == 1 => Ok(items[0].clone()),
            Context::Sequence(items) => Err(DaveError::invalid_context(format!(
                "modern backend takes a single utterance, got {}",
                items.len()
            ))),
        },
    }
}

/// Builds the full query for an inference call.
pub fn build_query(request: &GenerationRequest) -> Result<Vec<(&'static str, String)>> {
    let mut query = vec![("sentence", frame_sentence(request.backend, &request.context)?)];
    query.extend(request.parameters.query_pairs());
    Ok(query)
}

/// Extracts the rendered text from a raw inference payload.
///
/// A string `response` has one leading and one trailing separator stripped,
/// is split on the separator, and the non-empty segments are joined with
/// single spaces. An array `response` is space-joined as-is.
pub fn parse_response(backend: Backend, raw: &Value) -> Result<String> {
    let response = raw
        .get("response")
        .ok_or_else(|| DaveError::backend_unavailable(backend, "payload has no `response` field"))?;

    match response {
        Value::String(text) => Ok(unframe(text, separator(backend))),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        DaveError::backend_unavailable(backend, "`response` array holds a non-string")
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(" "))
        }
        other => Err(DaveError::backend_unavailable(
            backend,
            format!("unexpected `response` shape: {other}"),
        )),
    }
}

fn unframe(text: &str, separator: &str) -> String {
    let text = text.strip_prefix(separator).unwrap_or(text);
    let text = text.strip_suffix(separator).unwrap_or(text);
    text.split(separator)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a version endpoint payload.
pub fn parse_version(backend: Backend, raw: &Value) -> Result<VersionTransition> {
    let updated = raw
        .get("updated")
        .and_then(Value::as_bool)
        .ok_or_else(|| DaveError::backend_unavailable(backend, "payload has no boolean `updated`"))?;
    let current = version_field(backend, raw, "version")?;

    if updated {
        let previous = version_field(backend, raw, "old")?;
        Ok(VersionTransition::upgraded(previous, current))
    } else {
        Ok(VersionTransition::unchanged(current))
    }
}

fn version_field(backend: Backend, raw: &Value, field: &str) -> Result<String> {
    match raw.get(field) {
        Some(Value::String(version)) => Ok(version.clone()),
        Some(Value::Number(version)) => Ok(version.to_string()),
        Some(other) => Err(DaveError::backend_unavailable(
            backend,
            format!("`{field}` is neither a string nor a number: {other}"),
        )),
        None => Err(DaveError::backend_unavailable(
            backend,
            format!("payload has no `{field}` field"),
        )),
    }
}
