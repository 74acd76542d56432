//! Bracket-aware `key=value` argument parsing.

use super::{
    resolve_color, ChromaKey, CommandError, GenerationJob, DEFAULT_BLEND, DEFAULT_SIMILARITY,
};

/// Splits argument text into tokens, preserving spaces inside `[...]`.
///
/// Brackets do not nest; a `[` inside a bracketed value is literal.
fn tokenize(text: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;

    for c in text.chars() {
        match c {
            '[' if !in_brackets => in_brackets = true,
            ']' if in_brackets => in_brackets = false,
            c if c.is_whitespace() && !in_brackets => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_brackets {
        return Err(CommandError::UnbalancedBrackets);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Resolves an argument key or its alias to the canonical key.
fn resolve_key(key: &str) -> Option<&'static str> {
    match key {
        "w" | "width" => Some("width"),
        "b" | "background" => Some("background"),
        "t" | "title" => Some("title"),
        "l" | "link" => Some("link"),
        "s" | "similarity" => Some("similarity"),
        "bl" | "blend" => Some("blend"),
        _ => None,
    }
}

fn parse_fraction(key: &str, value: &str) -> Result<f32, CommandError> {
    let parsed: f32 = value.parse().map_err(|_| CommandError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(CommandError::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

/// Parses free-form argument text into a validated [`GenerationJob`].
///
/// Empty input returns a job with defaults (full-width grid, new pack).
/// Similarity and blend are only valid together with an explicit
/// background color.
pub fn parse_args(text: &str) -> Result<GenerationJob, CommandError> {
    let mut job = GenerationJob::with_defaults();
    let mut background: Option<String> = None;
    let mut similarity: Option<f32> = None;
    let mut blend: Option<f32> = None;

    for token in tokenize(text)? {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| CommandError::Malformed {
                token: token.clone(),
            })?;
        if key.is_empty() || value.is_empty() {
            return Err(CommandError::Malformed { token });
        }

        match resolve_key(&key.to_ascii_lowercase()) {
            Some("width") => {
                let width: u32 = value.parse().map_err(|_| CommandError::InvalidWidth {
                    value: value.to_string(),
                })?;
                if !(1..=8).contains(&width) {
                    return Err(CommandError::InvalidWidth {
                        value: value.to_string(),
                    });
                }
                job.width = width;
            }
            Some("background") => {
                let color = resolve_color(value).ok_or_else(|| CommandError::UnknownColor {
                    value: value.to_string(),
                })?;
                background = Some(color);
            }
            Some("title") => job.set_title = value.to_string(),
            Some("link") => {
                job.pack_link = value.to_string();
                job.new_set = false;
            }
            Some("similarity") => similarity = Some(parse_fraction("similarity", value)?),
            Some("blend") => blend = Some(parse_fraction("blend", value)?),
            _ => {
                return Err(CommandError::UnknownKey {
                    key: key.to_string(),
                })
            }
        }
    }

    if background.is_none() && (similarity.is_some() || blend.is_some()) {
        return Err(CommandError::InvalidBackgroundCombination);
    }

    if let Some(color) = background {
        job.background = Some(ChromaKey {
            color,
            similarity: similarity.unwrap_or(DEFAULT_SIMILARITY),
            blend: blend.unwrap_or(DEFAULT_BLEND),
        });
    }

    Ok(job)
}
