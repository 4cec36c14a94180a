//! Time-based retention
//!
//! Pure selection of the artifacts that have outlived the retention horizon.
//! Only `created_at` is consulted; artifact contents are never inspected.

use crate::artifact::StoredArtifactRef;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// Select the keys of artifacts older than `retention_days`
///
/// An artifact is selected when `now - created_at > retention_days` (an
/// artifact exactly `retention_days` old is kept). `retention_days = 0`
/// selects everything older than `now`.
///
/// The most recent artifact is never selected, so at least one backup of the
/// database always survives a pruning pass.
pub fn select_for_deletion(
    refs: &[StoredArtifactRef],
    retention_days: u32,
    now: DateTime<Utc>,
) -> BTreeSet<String> {
    let horizon = Duration::days(i64::from(retention_days));

    // Ties on created_at resolve to the lexically greatest key
    let newest = refs
        .iter()
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.destination_key.cmp(&b.destination_key))
        })
        .map(|r| r.destination_key.as_str());

    refs.iter()
        .filter(|r| Some(r.destination_key.as_str()) != newest)
        .filter(|r| now.signed_duration_since(r.created_at) > horizon)
        .map(|r| r.destination_key.clone())
        .collect()
}
