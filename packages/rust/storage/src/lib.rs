//! libSQL storage layer for classified leads.
//!
//! The [`Storage`] struct wraps a local libSQL database and implements
//! [`LeadStore`] for the run pipeline.
//!
//! **Access rules:**
//! - Runs: read-write via [`Storage::open`]
//! - Reporting commands: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use leadflow_shared::{
    Category, CategoryCounts, LeadStore, LeadflowError, NewLead, Result, StoredLead,
};
use libsql::{Connection, Database, params};
use tracing::{debug, info, instrument, warn};

/// Upper bound on bound parameters per existence query.
const EXISTENCE_QUERY_SLICE: usize = 500;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LeadflowError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LeadflowError::Storage(format!(
                "no lead database at {}; run `leadflow run` first",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LeadflowError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LeadflowError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lead operations
    // -----------------------------------------------------------------------

    /// Return which of the given emails are already stored.
    #[instrument(skip_all, fields(candidates = emails.len()))]
    pub async fn find_existing_emails(&self, emails: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();

        for slice in emails.chunks(EXISTENCE_QUERY_SLICE) {
            let placeholders = vec!["?"; slice.len()].join(", ");
            let sql = format!("SELECT email FROM leads WHERE email IN ({placeholders})");

            let mut rows = self
                .conn
                .query(&sql, libsql::params_from_iter(slice.iter().cloned()))
                .await
                .map_err(|e| LeadflowError::Storage(e.to_string()))?;

            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| LeadflowError::Storage(e.to_string()))?
            {
                found.insert(
                    row.get::<String>(0)
                        .map_err(|e| LeadflowError::Storage(e.to_string()))?,
                );
            }
        }

        debug!(existing = found.len(), "existence check complete");
        Ok(found)
    }

    /// Insert all leads in a single transaction. Any failure rolls back every row.
    #[instrument(skip_all, fields(rows = leads.len()))]
    pub async fn insert_lead_batch(&self, leads: &[NewLead]) -> Result<usize> {
        self.check_writable()?;
        if leads.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        for lead in leads {
            let inserted = tx
                .execute(
                    "INSERT INTO leads (id, first_name, last_name, job_title, company, email, phone, category, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        lead.id.as_str(),
                        lead.first_name.as_str(),
                        lead.last_name.as_str(),
                        lead.job_title.as_str(),
                        lead.company.as_str(),
                        lead.email.as_str(),
                        lead.phone.as_str(),
                        lead.category.as_str(),
                        lead.status.as_str(),
                    ],
                )
                .await;

            if let Err(e) = inserted {
                warn!(email = %lead.email, error = %e, "insert failed, rolling back batch");
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "rollback failed");
                }
                return Err(LeadflowError::Storage(format!(
                    "insert of {} failed: {e}",
                    lead.email
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        Ok(leads.len())
    }

    /// List stored leads, newest first, optionally filtered by category.
    pub async fn list_leads(
        &self,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<StoredLead>> {
        let mut rows = match category {
            Some(category) => {
                self.conn
                    .query(
                        "SELECT id, first_name, last_name, job_title, company, email, phone, category, status, created_at
                         FROM leads WHERE category = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                        params![category.as_str(), limit],
                    )
                    .await
            }
            None => {
                self.conn
                    .query(
                        "SELECT id, first_name, last_name, job_title, company, email, phone, category, status, created_at
                         FROM leads ORDER BY created_at DESC, id DESC LIMIT ?1",
                        params![limit],
                    )
                    .await
            }
        }
        .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?
        {
            results.push(row_to_stored_lead(&row)?);
        }
        Ok(results)
    }

    /// Count stored leads per category.
    pub async fn category_counts(&self) -> Result<CategoryCounts> {
        let mut rows = self
            .conn
            .query(
                "SELECT category, COUNT(*) FROM leads GROUP BY category",
                params![],
            )
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?;

        let mut counts = CategoryCounts::default();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| LeadflowError::Storage(e.to_string()))?
        {
            let name: String = row
                .get(0)
                .map_err(|e| LeadflowError::Storage(e.to_string()))?;
            let n: i64 = row
                .get(1)
                .map_err(|e| LeadflowError::Storage(e.to_string()))?;

            match Category::from_token(&name) {
                Some(category) => counts.add(category, n.max(0) as usize),
                None => warn!(category = %name, count = n, "unknown category in store"),
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl LeadStore for Storage {
    async fn existing_emails(&self, emails: &[String]) -> Result<HashSet<String>> {
        self.find_existing_emails(emails).await
    }

    async fn insert_leads(&self, leads: &[NewLead]) -> Result<usize> {
        self.insert_lead_batch(leads).await
    }
}

/// Convert a database row to a [`StoredLead`].
fn row_to_stored_lead(row: &libsql::Row) -> Result<StoredLead> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| LeadflowError::Storage(e.to_string()))
    };

    let category_name = text(7)?;
    let category = Category::from_token(&category_name).ok_or_else(|| {
        LeadflowError::Storage(format!("unknown category '{category_name}' in store"))
    })?;

    Ok(StoredLead {
        id: text(0)?,
        first_name: text(1)?,
        last_name: text(2)?,
        job_title: text(3)?,
        company: text(4)?,
        email: text(5)?,
        phone: text(6)?,
        category,
        status: text(8)?,
        created_at: text(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_shared::{ClassifiedRecord, InputRecord};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("lf_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn lead(email: &str, category: Category) -> NewLead {
        NewLead::from_classified(&ClassifiedRecord {
            record: InputRecord {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                job_title: "Owner".into(),
                company: "Analytical Bar".into(),
                email: email.into(),
                phone: "555-0100".into(),
            },
            category,
            fallback: None,
        })
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("lf_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn insert_and_check_existence() {
        let storage = test_storage().await;
        let inserted = storage
            .insert_lead_batch(&[
                lead("a@example.com", Category::Owner),
                lead("b@example.com", Category::Operations),
            ])
            .await
            .expect("insert");
        assert_eq!(inserted, 2);

        let existing = storage
            .find_existing_emails(&[
                "a@example.com".into(),
                "c@example.com".into(),
                "b@example.com".into(),
            ])
            .await
            .expect("existence check");
        assert_eq!(existing.len(), 2);
        assert!(existing.contains("a@example.com"));
        assert!(!existing.contains("c@example.com"));
    }

    #[tokio::test]
    async fn existence_check_spans_slices() {
        let storage = test_storage().await;
        storage
            .insert_lead_batch(&[lead("needle@example.com", Category::Other)])
            .await
            .unwrap();

        let mut emails: Vec<String> = (0..EXISTENCE_QUERY_SLICE + 10)
            .map(|i| format!("hay{i}@example.com"))
            .collect();
        emails.push("needle@example.com".into());

        let existing = storage.find_existing_emails(&emails).await.unwrap();
        assert_eq!(existing.len(), 1);
        assert!(existing.contains("needle@example.com"));
    }

    #[tokio::test]
    async fn stored_rows_get_defaults() {
        let storage = test_storage().await;
        storage
            .insert_lead_batch(&[lead("a@example.com", Category::Procurement)])
            .await
            .unwrap();

        let leads = storage.list_leads(None, 10).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].status, "Not Contacted");
        assert_eq!(leads[0].category, Category::Procurement);
        assert!(!leads[0].created_at.is_empty());
    }

    #[tokio::test]
    async fn unique_violation_rolls_back_whole_batch() {
        let storage = test_storage().await;
        storage
            .insert_lead_batch(&[lead("taken@example.com", Category::Owner)])
            .await
            .unwrap();

        let result = storage
            .insert_lead_batch(&[
                lead("fresh@example.com", Category::Owner),
                lead("taken@example.com", Category::Other),
            ])
            .await;
        assert!(result.is_err());

        let existing = storage
            .find_existing_emails(&["fresh@example.com".into()])
            .await
            .unwrap();
        assert!(existing.is_empty(), "partial insert leaked through");
        assert_eq!(storage.list_leads(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_category_and_counts() {
        let storage = test_storage().await;
        storage
            .insert_lead_batch(&[
                lead("a@example.com", Category::Owner),
                lead("b@example.com", Category::Owner),
                lead("c@example.com", Category::Other),
            ])
            .await
            .unwrap();

        let owners = storage.list_leads(Some(Category::Owner), 10).await.unwrap();
        assert_eq!(owners.len(), 2);
        assert!(owners.iter().all(|l| l.category == Category::Owner));

        let limited = storage.list_leads(None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let counts = storage.category_counts().await.unwrap();
        assert_eq!(counts.owner, 2);
        assert_eq!(counts.other, 1);
        assert_eq!(counts.total(), 3);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("lf_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_lead_batch(&[lead("a@example.com", Category::Owner)])
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro
            .insert_lead_batch(&[lead("b@example.com", Category::Owner)])
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
        assert_eq!(ro.list_leads(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("lf_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
