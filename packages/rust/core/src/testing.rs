//! In-memory collaborators for stage and pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use leadflow_shared::{
    CategoryService, ClassificationRequest, DeliveryPayload, InputRecord, LeadSink, LeadStore,
    LeadflowError, NewLead, Result,
};

pub fn record(email: &str, title: &str) -> InputRecord {
    InputRecord {
        first_name: "Test".into(),
        last_name: "Contact".into(),
        job_title: title.into(),
        company: "Harbor Tavern".into(),
        email: email.into(),
        phone: "555-0100".into(),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    pub known: Mutex<HashSet<String>>,
    pub fail_lookup: bool,
    pub fail_insert: bool,
    pub inserted: Mutex<Vec<NewLead>>,
    pub lookup_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_known(emails: &[&str]) -> Self {
        let store = Self::default();
        store
            .known
            .lock()
            .unwrap()
            .extend(emails.iter().map(|e| e.to_string()));
        store
    }

    pub fn lookups(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn inserted_emails(&self) -> Vec<String> {
        self.inserted
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.email.clone())
            .collect()
    }
}

#[async_trait]
impl LeadStore for FakeStore {
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup {
            return Err(LeadflowError::Storage("database is locked".into()));
        }
        let known = self.known.lock().unwrap();
        Ok(emails.iter().filter(|e| known.contains(*e)).cloned().collect())
    }

    async fn insert_leads(&self, leads: &[NewLead]) -> Result<usize> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert {
            return Err(LeadflowError::Storage("UNIQUE constraint failed: leads.email".into()));
        }
        let mut known = self.known.lock().unwrap();
        known.extend(leads.iter().map(|l| l.email.clone()));
        self.inserted.lock().unwrap().extend_from_slice(leads);
        Ok(leads.len())
    }
}

// ---------------------------------------------------------------------------
// Classification service
// ---------------------------------------------------------------------------

/// Answers by job title. Titles mapped to `None` fail the call.
#[derive(Default)]
pub struct FakeClassifier {
    pub answers: HashMap<String, Option<String>>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(answers: &[(&str, Option<&str>)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(title, answer)| (title.to_string(), answer.map(str::to_string)))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CategoryService for FakeClassifier {
    async fn complete(&self, request: &ClassificationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .iter()
            .find(|(title, _)| request.description.contains(&format!("Job title: {title}\n")))
            .map(|(_, answer)| answer.clone());

        match answer {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(LeadflowError::Classification("HTTP 503: unavailable".into())),
            None => Ok("Other".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Acknowledges with 201 unless the email has an override. An override of
/// `0` simulates a transport failure.
#[derive(Default)]
pub struct FakeSink {
    pub statuses: HashMap<String, u16>,
    pub received: Mutex<Vec<DeliveryPayload>>,
}

impl FakeSink {
    pub fn with_statuses(statuses: &[(&str, u16)]) -> Self {
        Self {
            statuses: statuses.iter().map(|(e, s)| (e.to_string(), *s)).collect(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.email.clone())
            .collect();
        emails.sort();
        emails
    }
}

#[async_trait]
impl LeadSink for FakeSink {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<u16> {
        self.received.lock().unwrap().push(payload.clone());
        match self.statuses.get(&payload.email).copied() {
            Some(0) => Err(LeadflowError::Delivery("connection refused".into())),
            Some(status) => Ok(status),
            None => Ok(201),
        }
    }
}
