//! Defensive JSON extraction from model output.

use serde::de::DeserializeOwned;

use super::LlmFailure;

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (`json`, `JSON`, ...) on the opening fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output as `T`.
///
/// Tries the fence-stripped text, then the outermost `{...}` slice, then the
/// outermost `[...]` slice.
pub fn parse_json_lenient<T: DeserializeOwned>(text: &str) -> Result<T, LlmFailure> {
    let stripped = strip_code_fences(text);
    let first_err = match serde_json::from_str::<T>(stripped) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(slice) = outer_slice(stripped, open, close) {
            if let Ok(value) = serde_json::from_str::<T>(slice) {
                return Ok(value);
            }
        }
    }

    Err(LlmFailure::Malformed(format!(
        "{first_err}; response began with {:?}",
        excerpt(stripped, 80)
    )))
}

fn outer_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn excerpt(text: &str, max_chars: usize) -> String {
    crate::entry::truncate_chars(text, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tags {
        tags: Vec<String>,
    }

    #[test]
    fn strips_fences_with_language_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let text = "Sure! Here you go:\n{\"tags\": [\"grief\"]}\nHope that helps.";
        let parsed: Tags = parse_json_lenient(text).unwrap();
        assert_eq!(parsed.tags, vec!["grief"]);
    }

    #[test]
    fn parses_bare_array() {
        let parsed: Vec<u32> = parse_json_lenient("result: [1, 2, 3]").unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_json_lenient::<Tags>("I cannot help with that.").unwrap_err();
        assert!(matches!(err, LlmFailure::Malformed(_)));
    }
}
