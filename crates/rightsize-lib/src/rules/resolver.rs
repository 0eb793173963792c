//! Priority-based conflict resolution across candidate patches

use crate::models::Patch;
use std::cmp::Ordering;

/// Ranking used for resolution: priority descending, then rule id ascending.
///
/// Rule ids are unique within a rule set, so this is a total order and the
/// outcome does not depend on declaration order.
pub fn rank(a: &Patch, b: &Patch) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

/// Merge candidates into a single patch.
///
/// The top-ranked candidate supplies action, rule id and priority. Lower
/// candidates only fill `set`/`set_env` keys that are still missing.
pub fn resolve(service_name: &str, mut candidates: Vec<Patch>) -> Patch {
    candidates.sort_by(rank);

    let mut ranked = candidates.into_iter();
    let Some(mut result) = ranked.next() else {
        return Patch::empty(service_name);
    };
    result.service_name = service_name.to_string();

    for candidate in ranked {
        for (key, value) in candidate.set {
            result.set.entry(key).or_insert(value);
        }
        for (key, value) in candidate.set_env {
            result.set_env.entry(key).or_insert(value);
        }
    }

    result
}
