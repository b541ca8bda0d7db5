//! Clone-to-new-window handoff
//!
//! The source window stores a capture under `clone_{millis}` and opens the
//! same URL with `#restore={key}`. The new window restores from that entry,
//! deletes it and drops the fragment from its URL.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ControllerError;
use crate::data::KeyValueBackend;
use crate::snapshot::{
    capture, LiveRegion, RegionSnapshot, RestoreOptions, RestoreReport, Restorer, WidgetRegistry,
};

pub const CLONE_PREFIX: &str = "clone_";

/// URL fragment marking a clone handoff
pub const RESTORE_FRAGMENT: &str = "#restore=";

/// Outcome of [`restore_from_url`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonedRestore {
    /// The URL with the restore fragment removed
    pub url: String,
    /// None when the entry had already expired or been claimed
    pub report: Option<RestoreReport>,
}

/// Store a capture of `region` and return the fragment to open it with
pub async fn clone_region(
    region: &dyn LiveRegion,
    kv: &dyn KeyValueBackend,
) -> Result<String, ControllerError> {
    let snapshot = capture(region).await?;
    let raw = snapshot
        .to_json()
        .map_err(crate::data::StorageError::from)?;

    let mut millis = Utc::now().timestamp_millis();
    while kv.get(&clone_key(millis))?.is_some() {
        millis += 1;
    }
    let key = clone_key(millis);
    kv.set(&key, &raw)?;

    tracing::info!(key = %key, bytes = raw.len(), "Region cloned");
    Ok(format!("{RESTORE_FRAGMENT}{key}"))
}

fn clone_key(millis: i64) -> String {
    format!("{CLONE_PREFIX}{millis}")
}

/// Key named by a `#restore=` fragment in `url`, if any
pub fn restore_key(url: &str) -> Option<&str> {
    let (_, fragment) = url.split_once('#')?;
    let key = fragment.strip_prefix(&RESTORE_FRAGMENT[1..])?;
    key.starts_with(CLONE_PREFIX).then_some(key)
}

/// Restore a cloned region if `url` carries a restore fragment.
///
/// Returns `Ok(None)` for an ordinary URL. The stored entry is deleted
/// whether or not it parses; a malformed entry is an error and nothing is
/// applied to the region.
pub async fn restore_from_url(
    url: &str,
    region: &mut dyn LiveRegion,
    kv: &dyn KeyValueBackend,
    registry: Option<&WidgetRegistry>,
    options: RestoreOptions,
) -> Result<Option<ClonedRestore>, ControllerError> {
    let Some(key) = restore_key(url) else {
        return Ok(None);
    };
    let clean_url = url
        .split_once('#')
        .map(|(base, _)| base)
        .unwrap_or(url)
        .to_string();

    let Some(raw) = kv.get(key)? else {
        tracing::warn!(key = %key, "Clone state not found");
        return Ok(Some(ClonedRestore {
            url: clean_url,
            report: None,
        }));
    };
    kv.remove(key)?;

    let snapshot = RegionSnapshot::from_json(&raw)?;
    let report = Restorer::new(registry, options)
        .restore(region, &snapshot)
        .await?;
    tracing::info!(key = %key, sections = report.sections_restored, "Clone restored");

    Ok(Some(ClonedRestore {
        url: clean_url,
        report: Some(report),
    }))
}

/// Remove clone entries older than `ttl`. Returns how many were removed.
pub fn purge_expired_clones(
    kv: &dyn KeyValueBackend,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<usize, ControllerError> {
    let cutoff = now.timestamp_millis() - ttl.as_millis() as i64;
    let mut purged = 0;
    for key in kv.keys(CLONE_PREFIX)? {
        let Some(millis) = key
            .strip_prefix(CLONE_PREFIX)
            .and_then(|m| m.parse::<i64>().ok())
        else {
            continue;
        };
        if millis < cutoff {
            kv.remove(&key)?;
            purged += 1;
        }
    }
    if purged > 0 {
        tracing::debug!(purged, "Expired clone entries removed");
    }
    Ok(purged)
}
