//! All-or-nothing bulk persistence of a classified batch.

use tracing::{error, info};

use leadflow_shared::{ClassifiedRecord, LeadStore, NewLead};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub success: bool,
    /// Rows written: the full batch on success, otherwise 0.
    pub count: usize,
}

/// Write every record as a new lead in one store call.
pub async fn persist_all(store: &dyn LeadStore, records: &[ClassifiedRecord]) -> PersistOutcome {
    if records.is_empty() {
        return PersistOutcome {
            success: true,
            count: 0,
        };
    }

    let leads: Vec<NewLead> = records.iter().map(NewLead::from_classified).collect();

    match store.insert_leads(&leads).await {
        Ok(count) => {
            info!(count, "leads persisted");
            PersistOutcome {
                success: true,
                count,
            }
        }
        Err(e) => {
            error!(error = %e, records = leads.len(), "bulk insert failed, nothing persisted");
            PersistOutcome {
                success: false,
                count: 0,
            }
        }
    }
}
