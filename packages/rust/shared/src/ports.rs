//! Seams to the external collaborators of a run.
//!
//! Each handle is constructed once per run and shared across concurrent
//! operations, so implementations take `&self` and must be `Send + Sync`.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ClassificationRequest, DeliveryPayload, NewLead};

/// The persistent lead store.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Return the subset of `emails` (normalised keys) already present.
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>>;

    /// Insert every row or none of them. Returns the number inserted.
    async fn insert_leads(&self, leads: &[NewLead]) -> Result<usize>;
}

/// An external natural-language classification service.
#[async_trait]
pub trait CategoryService: Send + Sync {
    /// Send one request and return the raw response text.
    async fn complete(&self, request: &ClassificationRequest) -> Result<String>;
}

/// The downstream webhook consumer.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Post one payload and return the HTTP status code received.
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<u16>;
}
