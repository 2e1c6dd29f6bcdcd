// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-processing applied to provider output before it is persisted:
//! hashtag and emoji policy, then length truncation on a word boundary.

use std::collections::BTreeMap;

use soapbox_core::Template;

/// Context key holding comma-separated hashtag candidates.
const TAGS_KEY: &str = "tags";

/// Suffix appended when the emoji flag is on and the text has none yet.
const EMOJI_SUFFIX: char = '\u{2728}'; // sparkles

/// Apply the template's content policy to raw provider output.
///
/// Truncation runs last so the final text never exceeds
/// `template.max_output_len` characters, whatever the policy appended.
pub fn apply(text: &str, template: &Template, context: &BTreeMap<String, String>) -> String {
    let mut out = text.trim().to_string();

    if template.include_hashtags {
        let tags = tags_from_context(context);
        append_hashtags(&mut out, &tags, template.max_hashtags as usize);
    }

    if template.include_emojis {
        append_emoji(&mut out);
    }

    truncate_words(&out, template.max_output_len)
}

/// Hashtag candidates from the post context: the `tags` value, split on
/// commas, reduced to alphanumeric characters.
fn tags_from_context(context: &BTreeMap<String, String>) -> Vec<String> {
    let Some(raw) = context.get(TAGS_KEY) else {
        return Vec::new();
    };
    raw.split(',')
        .map(|tag| {
            tag.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Append up to `max` hashtags that the text does not already carry.
fn append_hashtags(out: &mut String, tags: &[String], max: usize) {
    let mut appended = 0;
    for tag in tags {
        if appended >= max {
            break;
        }
        let hashtag = format!("#{tag}");
        if out.contains(&hashtag) {
            continue;
        }
        if appended == 0 {
            out.push('\n');
        } else {
            out.push(' ');
        }
        out.push_str(&hashtag);
        appended += 1;
    }
}

/// Append the emoji suffix unless the text already contains it.
fn append_emoji(out: &mut String) {
    if !out.contains(EMOJI_SUFFIX) {
        out.push(' ');
        out.push(EMOJI_SUFFIX);
    }
}

/// Truncate to at most `max_chars` characters, preferring the last word
/// boundary inside the window. Counts characters, not bytes.
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut_byte = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let window = &text[..cut_byte];
    // A cut landing exactly on a word boundary keeps the whole window.
    if text[cut_byte..].chars().next().is_some_and(|c| c.is_whitespace()) {
        return window.trim_end().to_string();
    }
    match window.rfind(char::is_whitespace) {
        Some(boundary) => window[..boundary].trim_end().to_string(),
        None => window.to_string(),
    }
}
