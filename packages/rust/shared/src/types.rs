//! Core domain types for leadflow runs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LeadflowError;

/// Status written to every newly stored lead.
pub const INITIAL_LEAD_STATUS: &str = "Not Contacted";

/// Normalise an email into its identity key (trimmed, ASCII-lowercased).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// InputRecord
// ---------------------------------------------------------------------------

/// One contact row as read from the record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRecord {
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub company: String,
    /// Identity key. Stored as given; compare via [`InputRecord::email_key`].
    pub email: String,
    pub phone: String,
}

impl InputRecord {
    /// The normalised email used for duplicate detection and storage.
    pub fn email_key(&self) -> String {
        normalize_email(&self.email)
    }

    /// `"First Last"`, skipping empty parts.
    pub fn full_name(&self) -> String {
        [self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The closed set of categories a lead can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Owner,
    Operations,
    Procurement,
    Other,
}

impl Category {
    /// All categories, in reporting order.
    pub const ALL: [Category; 4] = [
        Category::Owner,
        Category::Operations,
        Category::Procurement,
        Category::Other,
    ];

    /// Canonical token, also used as the stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Operations => "Operations",
            Self::Procurement => "Procurement",
            Self::Other => "Other",
        }
    }

    /// Match a single token case-insensitively. Anything else is `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LeadflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| {
            LeadflowError::parse(format!(
                "unknown category '{s}': expected Owner, Operations, Procurement, or Other"
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Why a record ended up in the fallback category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The classification call itself failed.
    ServiceError,
    /// The service answered but no single category token could be read.
    UnrecognizedResponse,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceError => "service_error",
            Self::UnrecognizedResponse => "unrecognized_response",
        }
    }
}

/// Request sent to a classification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    /// Category rules and answer format.
    pub instructions: String,
    /// Natural-language description of the record.
    pub description: String,
}

/// An input record paired with exactly one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: InputRecord,
    pub category: Category,
    /// Set when `category` is the fallback rather than the service's answer.
    pub fallback: Option<FallbackReason>,
}

impl ClassifiedRecord {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

// ---------------------------------------------------------------------------
// Stored leads
// ---------------------------------------------------------------------------

/// A lead row ready for insertion. `created_at` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    /// Unique row identifier (UUID v7).
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub category: Category,
    pub status: String,
}

impl NewLead {
    /// Map a classified record to its stored shape.
    pub fn from_classified(classified: &ClassifiedRecord) -> Self {
        let r = &classified.record;
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            first_name: r.first_name.clone(),
            last_name: r.last_name.clone(),
            job_title: r.job_title.clone(),
            company: r.company.clone(),
            email: r.email_key(),
            phone: r.phone.clone(),
            category: classified.category,
            status: INITIAL_LEAD_STATUS.to_string(),
        }
    }
}

/// A lead as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredLead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub category: Category,
    pub status: String,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Delivery payload
// ---------------------------------------------------------------------------

/// JSON body posted to the webhook for each classified record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub category: Category,
    /// Dispatch time.
    pub timestamp: DateTime<Utc>,
}

impl DeliveryPayload {
    pub fn new(classified: &ClassifiedRecord, timestamp: DateTime<Utc>) -> Self {
        let r = &classified.record;
        Self {
            first_name: r.first_name.clone(),
            last_name: r.last_name.clone(),
            job_title: r.job_title.clone(),
            company: r.company.clone(),
            email: r.email.clone(),
            phone: r.phone.clone(),
            category: classified.category,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Per-category tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub owner: usize,
    pub operations: usize,
    pub procurement: usize,
    pub other: usize,
}

impl CategoryCounts {
    pub fn record(&mut self, category: Category) {
        self.add(category, 1);
    }

    pub fn add(&mut self, category: Category, n: usize) {
        *self.slot(category) += n;
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Owner => self.owner,
            Category::Operations => self.operations,
            Category::Procurement => self.procurement,
            Category::Other => self.other,
        }
    }

    pub fn total(&self) -> usize {
        self.owner + self.operations + self.procurement + self.other
    }

    fn slot(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Owner => &mut self.owner,
            Category::Operations => &mut self.operations,
            Category::Procurement => &mut self.procurement,
            Category::Other => &mut self.other,
        }
    }
}

/// Aggregate outcome of one run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Records read from the source.
    pub total: usize,
    /// Records skipped as already known (store or earlier in the batch).
    pub skipped: usize,
    /// Whether the duplicate check failed and the batch went through unfiltered.
    pub dedup_failed: bool,
    /// Records that went through classification.
    pub classified: usize,
    /// Classifications that fell back to `Other`.
    pub classification_fallbacks: usize,
    /// Records persisted (0 or all of `classified`).
    pub persisted: usize,
    /// Whether the bulk insert failed for this batch.
    pub persist_failed: bool,
    pub delivered: usize,
    pub delivery_failed: usize,
    pub categories: CategoryCounts,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Records that did not make it all the way through storage and delivery.
    pub fn failed(&self) -> usize {
        let unpersisted = self.classified - self.persisted;
        unpersisted.max(self.delivery_failed)
    }
}
