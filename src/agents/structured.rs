//! Parse boundary for model replies that are supposed to carry JSON.
//!
//! Every structured request in the workflow goes through [`parse_json`]; the
//! caller decides what default replaces an unparseable reply.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::context::RunContext;
use crate::errors::FlaghuntError;
use crate::llm::Message;

/// `{technologies, endpoints}` extracted from an analysis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteFacts {
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Append the items of `extra` not yet present in `target`.
pub fn merge_unique(target: &mut Vec<String>, extra: Vec<String>) -> usize {
    let before = target.len();
    for item in extra {
        let item = item.trim().to_string();
        if !item.is_empty() && !target.contains(&item) {
            target.push(item);
        }
    }
    target.len() - before
}

/// Result of one structured request that did not end the run.
#[derive(Debug)]
pub enum Reply<T> {
    Parsed(T),
    /// The model answered but the answer did not decode.
    Unparsed(String),
    /// The call itself failed with a stage-local error.
    Failed(String),
}

impl<T> Reply<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            _ => None,
        }
    }
}

/// One tool-less model call. Fatal errors propagate; anything else comes
/// back as `Err(message)` for the stage to log.
pub async fn ask_text(ctx: &RunContext, system: &str, prompt: &str) -> Result<Result<String, String>, FlaghuntError> {
    let messages = [Message::system(system), Message::user(prompt)];
    match ctx.invoke(&messages, &[]).await {
        Ok(response) => Ok(Ok(response.content)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "Model call failed");
            Ok(Err(e.to_string()))
        }
    }
}

/// [`ask_text`] followed by [`parse_json`].
pub async fn ask_json<T: DeserializeOwned>(
    ctx: &RunContext,
    system: &str,
    prompt: &str,
) -> Result<Reply<T>, FlaghuntError> {
    Ok(match ask_text(ctx, system, prompt).await? {
        Ok(text) => match parse_json(&text) {
            Ok(value) => Reply::Parsed(value),
            Err(e) => {
                warn!(error = %e, "Model reply was not valid JSON");
                Reply::Unparsed(text)
            }
        },
        Err(message) => Reply::Failed(message),
    })
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json", "JSON", ...) up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// The first balanced `{...}` or `[...]` span in `text`, honouring strings.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a model reply into `T`. Fences are stripped first; when the reply
/// still is not valid JSON the first embedded JSON value is tried.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, FlaghuntError> {
    let body = strip_fences(text);
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first) => match extract_json(body) {
            Some(candidate) => Ok(serde_json::from_str(candidate)?),
            None => Err(FlaghuntError::Json(first)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_with_prose_around() {
        let v: Value = parse_json("Here is the plan:\n{\"strategy\": \"x\", \"n\": \"}\"}\nGood luck").unwrap();
        assert_eq!(v["strategy"], "x");
        assert_eq!(v["n"], "}");
    }

    #[test]
    fn test_parse_json_array() {
        let v: Vec<u32> = parse_json("```json\n[1, 2, 3]\n```").unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn test_site_facts_defaults_and_merge() {
        let facts: SiteFacts = parse_json("{\"technologies\": [\"PHP\", \"PHP\", \" \"]}").unwrap();
        assert!(facts.endpoints.is_empty());
        let mut known = vec!["nginx".to_string()];
        assert_eq!(merge_unique(&mut known, facts.technologies), 1);
        assert_eq!(known, vec!["nginx", "PHP"]);
    }

    #[test]
    fn test_parse_json_failure() {
        assert!(parse_json::<Value>("no json here").is_err());
        assert!(parse_json::<Value>("{ unterminated").is_err());
    }
}
