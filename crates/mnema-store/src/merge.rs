//! Metadata delta merging.
//!
//! Tags merge by set union. A context fragment is appended on its own line
//! unless the current context already contains it (case-insensitive, after
//! trimming), so repeated or concurrent deltas never duplicate text and
//! never replace what is already there.

use std::collections::BTreeSet;

use mnema_core::defaults::CONTEXT_SEPARATOR;
use mnema_core::MetadataDelta;

/// Whether `context` already contains `fragment`.
pub fn context_contains(context: &str, fragment: &str) -> bool {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return true;
    }
    context.to_lowercase().contains(&fragment.to_lowercase())
}

/// Merge `delta` into the given tags and context. Returns whether anything changed.
pub fn apply_delta(tags: &mut BTreeSet<String>, context: &mut String, delta: &MetadataDelta) -> bool {
    let mut changed = false;

    for tag in &delta.tags {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.contains(tag) {
            tags.insert(tag.to_string());
            changed = true;
        }
    }

    if let Some(fragment) = delta.context.as_deref() {
        if !context_contains(context, fragment) {
            let fragment = fragment.trim();
            if context.trim().is_empty() {
                *context = fragment.to_string();
            } else {
                context.push_str(CONTEXT_SEPARATOR);
                context.push_str(fragment);
            }
            changed = true;
        }
    }

    changed
}
