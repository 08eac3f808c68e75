//! Duplicate filtering against the lead store.

use std::collections::HashSet;

use tracing::{debug, warn};

use leadflow_shared::{InputRecord, LeadStore};

/// Records to process plus how many were dropped as already known.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Records not yet known, in input order.
    pub new_records: Vec<InputRecord>,
    pub duplicate_count: usize,
    /// The store lookup failed and the batch was passed through unfiltered.
    pub lookup_failed: bool,
}

/// Split `batch` into unseen records and a duplicate count.
///
/// The store is asked once for all keys. A record is a duplicate if its key
/// is already stored or appeared earlier in this batch. If the lookup fails
/// the whole batch is treated as new and nothing is counted as a duplicate.
pub async fn filter_new(store: &dyn LeadStore, batch: Vec<InputRecord>) -> DedupOutcome {
    if batch.is_empty() {
        return DedupOutcome::default();
    }

    let mut keys: Vec<String> = Vec::with_capacity(batch.len());
    let mut unique = HashSet::with_capacity(batch.len());
    for record in &batch {
        let key = record.email_key();
        if unique.insert(key.clone()) {
            keys.push(key);
        }
    }

    let known = match store.existing_emails(&keys).await {
        Ok(known) => known,
        Err(e) => {
            warn!(error = %e, records = batch.len(), "duplicate check failed, treating batch as new");
            return DedupOutcome {
                new_records: batch,
                duplicate_count: 0,
                lookup_failed: true,
            };
        }
    };

    let total = batch.len();
    let mut seen = HashSet::with_capacity(total);
    let new_records: Vec<InputRecord> = batch
        .into_iter()
        .filter(|record| {
            let key = record.email_key();
            !known.contains(&key) && seen.insert(key)
        })
        .collect();

    let duplicate_count = total - new_records.len();
    debug!(new = new_records.len(), duplicate_count, "duplicate check complete");

    DedupOutcome {
        new_records,
        duplicate_count,
        lookup_failed: false,
    }
}
