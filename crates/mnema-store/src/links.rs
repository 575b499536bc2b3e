//! Symmetric link maintenance and graph invariant checks.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mnema_core::{EvolutionAction, EvolutionEvent, Note};

/// Link two distinct notes in both directions.
///
/// Returns `true` when the link is new. A new link appends a `Linked` event
/// to both histories, attributed to `source`.
pub fn link_pair(a: &mut Note, b: &mut Note, source: Uuid, at: DateTime<Utc>) -> bool {
    if a.id == b.id {
        return false;
    }
    let added_a = a.links.insert(b.id);
    let added_b = b.links.insert(a.id);
    let created = added_a || added_b;
    if created {
        for note in [a, b] {
            note.evolution_history.push(EvolutionEvent {
                source,
                action: EvolutionAction::Linked,
                at,
            });
        }
    }
    created
}

/// Remove `removed` from a neighbor's link set, recording an `Unlinked` event.
pub fn unlink_from(neighbor: &mut Note, removed: Uuid, at: DateTime<Utc>) -> bool {
    if neighbor.links.remove(&removed) {
        neighbor.evolution_history.push(EvolutionEvent {
            source: removed,
            action: EvolutionAction::Unlinked,
            at,
        });
        true
    } else {
        false
    }
}

/// A broken graph invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkViolation {
    /// A note links to itself.
    SelfLink(Uuid),
    /// A note links to an identifier that is not stored.
    Dangling { from: Uuid, to: Uuid },
    /// `from` links to `to` but not the other way round.
    Asymmetric { from: Uuid, to: Uuid },
}

impl fmt::Display for LinkViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfLink(id) => write!(f, "note {} links to itself", id),
            Self::Dangling { from, to } => write!(f, "note {} links to missing note {}", from, to),
            Self::Asymmetric { from, to } => {
                write!(f, "note {} links to {} without a back-link", from, to)
            }
        }
    }
}

/// Every invariant violation in a set of notes, in identifier order.
pub fn violations(notes: &HashMap<Uuid, Note>) -> Vec<LinkViolation> {
    let mut ids: Vec<&Uuid> = notes.keys().collect();
    ids.sort();
    let mut found = Vec::new();
    for id in ids {
        let note = &notes[id];
        for target in &note.links {
            if target == id {
                found.push(LinkViolation::SelfLink(*id));
                continue;
            }
            match notes.get(target) {
                None => found.push(LinkViolation::Dangling {
                    from: *id,
                    to: *target,
                }),
                Some(other) if !other.links.contains(id) => found.push(LinkViolation::Asymmetric {
                    from: *id,
                    to: *target,
                }),
                Some(_) => {}
            }
        }
    }
    found
}
