//! Prompt templates for content analysis and evolution decisions.

use mnema_core::defaults::{PREVIEW_ANALYSIS, PREVIEW_JOINT, TAG_MAX_SUGGESTED, TAG_MIN_SUGGESTED};
use mnema_core::{Note, PartialMetadata};

/// System prompt sent with every analysis request.
pub const JSON_SYSTEM_PROMPT: &str =
    "You must respond with a single JSON object only. Do not add prose, comments or code fences.";

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt asking for keywords, context and tags of a note.
pub fn analysis_prompt(content: &str, hints: &PartialMetadata) -> String {
    let mut known = String::new();
    if let Some(keywords) = &hints.keywords {
        known.push_str(&format!("- Keywords (already chosen): {}\n", keywords.join(", ")));
    }
    if let Some(context) = &hints.context {
        known.push_str(&format!("- Context (already chosen): {}\n", context));
    }
    if let Some(tags) = &hints.tags {
        known.push_str(&format!("- Tags (already chosen): {}\n", tags.join(", ")));
    }
    let known = if known.is_empty() {
        String::new()
    } else {
        format!("\nMetadata the author already provided (stay consistent with it):\n{}", known)
    };

    format!(
        r#"Analyse this memory note and generate metadata for an agent's memory network.

1. **Keywords**: The most salient terms and concepts, ordered from most to least important
2. **Context**: One sentence summarising the topic, its purpose and the key points
3. **Tags**: {min}-{max} broad categories for classification (lowercase, short)
{known}
Content:
{content}

Return JSON:
{{
    "keywords": ["term1", "term2", ...],
    "context": "One sentence summary...",
    "tags": ["category1", "category2", ...]
}}"#,
        min = TAG_MIN_SUGGESTED,
        max = TAG_MAX_SUGGESTED,
        known = known,
        content = preview(content, PREVIEW_ANALYSIS),
    )
}

fn describe(label: &str, note: &Note) -> String {
    let tags: Vec<&str> = note.tags.iter().map(String::as_str).collect();
    format!(
        "{label}:\n- Content: {content}\n- Context: {context}\n- Keywords: {keywords}\n- Tags: {tags}\n",
        label = label,
        content = preview(&note.content, PREVIEW_JOINT),
        context = note.context,
        keywords = note.keywords.join(", "),
        tags = tags.join(", "),
    )
}

/// Prompt asking whether `candidate` should be linked to `anchor` and
/// whether the candidate's tags or context should absorb anything.
pub fn joint_prompt(anchor: &Note, candidate: &Note, similarity: f32) -> String {
    format!(
        r#"You are a memory evolution agent. A memory was just added or changed; decide how it relates to one existing neighbour.

{anchor}
{candidate}
Embedding similarity: {similarity:.3}

Choose exactly one action:
- "link_only": the memories are related; link them without changing the neighbour
- "link_and_enrich": link them AND the neighbour should gain tags and/or a short context addition drawn from the new memory
- "skip": the memories are not meaningfully related

Never rewrite the neighbour's content. A context addition is appended to the neighbour's existing context, so keep it to one short sentence.

Return JSON:
{{
    "action": "link_only" | "link_and_enrich" | "skip",
    "tags_to_add": ["tag1", ...],
    "context_addition": "One short sentence or empty string"
}}"#,
        anchor = describe("New memory", anchor),
        candidate = describe("Neighbour memory", candidate),
        similarity = similarity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("abc", 10), "abc");
    }

    #[test]
    fn test_analysis_prompt_includes_hints() {
        let hints = PartialMetadata {
            tags: Some(vec!["manual".to_string()]),
            ..Default::default()
        };
        let prompt = analysis_prompt("borrow checker", &hints);
        assert!(prompt.contains("borrow checker"));
        assert!(prompt.contains("Tags (already chosen): manual"));
        assert!(!prompt.contains("Keywords (already chosen)"));
    }

    #[test]
    fn test_analysis_prompt_without_hints() {
        let prompt = analysis_prompt("x", &PartialMetadata::default());
        assert!(!prompt.contains("already provided"));
    }
}
