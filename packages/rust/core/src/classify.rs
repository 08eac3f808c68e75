//! Per-record classification with fallback to `Other`.

use tracing::{debug, warn};

use leadflow_classifier::{build_request, parse_category};
use leadflow_shared::{Category, CategoryService, ClassifiedRecord, FallbackReason, InputRecord};

/// Category assigned whenever the service can't give a usable answer.
pub const FALLBACK_CATEGORY: Category = Category::Other;

/// Ask `service` for the category of one record.
///
/// Never fails: a failed call or an unreadable answer yields
/// [`FALLBACK_CATEGORY`] with the reason recorded on the result.
pub async fn classify_record(service: &dyn CategoryService, record: InputRecord) -> ClassifiedRecord {
    let request = build_request(&record);

    match service.complete(&request).await {
        Ok(answer) => match parse_category(&answer) {
            Some(category) => {
                debug!(email = %record.email, %category, "classified");
                ClassifiedRecord {
                    record,
                    category,
                    fallback: None,
                }
            }
            None => {
                let reason = FallbackReason::UnrecognizedResponse;
                warn!(
                    email = %record.email,
                    reason = reason.as_str(),
                    answer = %answer.trim(),
                    "unrecognised classification answer, using {FALLBACK_CATEGORY}"
                );
                fallback(record, reason)
            }
        },
        Err(e) => {
            let reason = FallbackReason::ServiceError;
            warn!(
                email = %record.email,
                reason = reason.as_str(),
                error = %e,
                "classification failed, using {FALLBACK_CATEGORY}"
            );
            fallback(record, reason)
        }
    }
}

/// The fallback classification for `record`.
pub fn fallback(record: InputRecord, reason: FallbackReason) -> ClassifiedRecord {
    ClassifiedRecord {
        record,
        category: FALLBACK_CATEGORY,
        fallback: Some(reason),
    }
}
