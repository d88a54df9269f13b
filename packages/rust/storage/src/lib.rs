//! libSQL storage layer for siteagent.
//!
//! The [`Storage`] struct wraps an embedded libSQL database holding analyzed
//! sites, fetched pages, crawl job history, conversation threads with their
//! turns, and stored analysis reports.
//!
//! **Access rules:**
//! - Server/CLI: read-write (sole writer) via [`Storage::open`]
//! - Diagnostics tooling: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use siteagent_shared::{ChatMessage, ChatRole, PageMeta, Result, SiteAgentError};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A stored site row.
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub id: String,
    pub url: String,
    pub host: String,
    pub index_name: String,
    pub created_at: String,
    pub last_crawled_at: Option<String>,
    pub page_count: u32,
}

/// A stored analysis row.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub report_json: String,
    pub model_id: String,
    pub created_at: String,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SiteAgentError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

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
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SiteAgentError::Storage(format!(
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
            return Err(SiteAgentError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Site operations
    // -----------------------------------------------------------------------

    /// Insert a new site record.
    pub async fn insert_site(
        &self,
        id: &str,
        url: &str,
        host: &str,
        index_name: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO sites (id, url, host, index_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, url, host, index_name, now.as_str()],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Look up a site by its host.
    pub async fn get_site_by_host(&self, host: &str) -> Result<Option<SiteRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, host, index_name, created_at, last_crawled_at, page_count
                 FROM sites WHERE host = ?1",
                params![host],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_site(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(SiteAgentError::Storage(e.to_string())),
        }
    }

    /// List all sites, newest first.
    pub async fn list_sites(&self) -> Result<Vec<SiteRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, host, index_name, created_at, last_crawled_at, page_count
                 FROM sites ORDER BY created_at DESC",
                params![],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_site(&row)?);
        }
        Ok(results)
    }

    /// Record a completed crawl on a site.
    pub async fn mark_site_crawled(&self, id: &str, page_count: u32) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE sites SET last_crawled_at = ?1, page_count = ?2 WHERE id = ?3",
                params![now.as_str(), page_count, id],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Page operations
    // -----------------------------------------------------------------------

    /// Upsert a page (insert or update on conflict by `site_id + url`).
    pub async fn upsert_page(&self, page: &PageMeta) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO pages (id, site_id, url, title, content_hash, fetched_at, status_code, content_len)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(site_id, url) DO UPDATE SET
                   title = excluded.title,
                   content_hash = excluded.content_hash,
                   fetched_at = excluded.fetched_at,
                   status_code = excluded.status_code,
                   content_len = excluded.content_len",
                params![
                    page.id.as_str(),
                    page.site_id.as_str(),
                    page.url.as_str(),
                    page.title.as_deref(),
                    page.content_hash.as_str(),
                    page.fetched_at.to_rfc3339(),
                    page.status_code.map(i64::from),
                    page.content_len.map(|l| l as i64),
                ],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List all pages for a site.
    pub async fn list_pages_by_site(&self, site_id: &str) -> Result<Vec<PageMeta>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, site_id, url, title, content_hash, fetched_at, status_code, content_len
                 FROM pages WHERE site_id = ?1 ORDER BY url",
                params![site_id],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_page_meta(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Crawl job operations
    // -----------------------------------------------------------------------

    /// Insert a new crawl job. Returns the generated job ID.
    pub async fn insert_crawl_job(&self, site_id: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO crawl_jobs (id, site_id, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), site_id, now.as_str()],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Update a crawl job with completion data.
    pub async fn update_crawl_job(&self, job_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE crawl_jobs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, job_id],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Thread operations
    // -----------------------------------------------------------------------

    /// Get the row ID of a thread, creating it if it does not exist.
    pub async fn get_or_create_thread(&self, site_id: &str, external_id: &str) -> Result<String> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM threads WHERE site_id = ?1 AND external_id = ?2",
                params![site_id, external_id],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        if let Ok(Some(row)) = rows.next().await {
            let id: String = row
                .get(0)
                .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
            return Ok(id);
        }

        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO threads (id, site_id, external_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), site_id, external_id, now.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Append a conversational turn to a thread.
    pub async fn append_message(
        &self,
        thread_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO messages (id, thread_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), thread_id, role.as_str(), content, now.as_str()],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        self.conn
            .execute(
                "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
                params![now.as_str(), thread_id],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(())
    }

    /// The most recent `limit` turns of a thread, oldest first.
    pub async fn list_messages(&self, thread_id: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        let mut rows = self
            .conn
            .query(
                "SELECT role, content FROM messages
                 WHERE thread_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
                params![thread_id, limit],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let role: String = row
                .get(0)
                .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
            let content: String = row
                .get(1)
                .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
            let role: ChatRole = role
                .parse()
                .map_err(|e: String| SiteAgentError::Storage(e))?;
            results.push(ChatMessage { role, content });
        }

        results.reverse();
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Analysis operations
    // -----------------------------------------------------------------------

    /// Store an analysis report for a site.
    pub async fn insert_analysis(
        &self,
        site_id: &str,
        report_json: &str,
        model_id: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO analyses (id, site_id, report_json, model_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), site_id, report_json, model_id, now.as_str()],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
        Ok(())
    }

    /// The most recent analysis stored for a site.
    pub async fn latest_analysis(&self, site_id: &str) -> Result<Option<AnalysisRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT report_json, model_id, created_at FROM analyses
                 WHERE site_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![site_id],
            )
            .await
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(AnalysisRecord {
                report_json: row
                    .get(0)
                    .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
                model_id: row
                    .get(1)
                    .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
                created_at: row
                    .get(2)
                    .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(SiteAgentError::Storage(e.to_string())),
        }
    }
}

/// Convert a database row to a [`SiteRecord`].
fn row_to_site(row: &libsql::Row) -> Result<SiteRecord> {
    Ok(SiteRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        url: row
            .get::<String>(1)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        host: row
            .get::<String>(2)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        index_name: row
            .get::<String>(3)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        created_at: row
            .get::<String>(4)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        last_crawled_at: row.get::<String>(5).ok(),
        page_count: row.get::<i64>(6).unwrap_or(0) as u32,
    })
}

/// Convert a database row to a [`PageMeta`].
fn row_to_page_meta(row: &libsql::Row) -> Result<PageMeta> {
    Ok(PageMeta {
        id: row
            .get::<String>(0)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        site_id: row
            .get::<String>(1)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        url: row
            .get::<String>(2)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        title: row.get::<String>(3).ok(),
        content_hash: row
            .get::<String>(4)
            .map_err(|e| SiteAgentError::Storage(e.to_string()))?,
        fetched_at: {
            let s: String = row
                .get(5)
                .map_err(|e| SiteAgentError::Storage(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| SiteAgentError::Storage(format!("invalid date: {e}")))?
        },
        status_code: row.get::<i64>(6).ok().map(|v| v as u16),
        content_len: row.get::<i64>(7).ok().map(|v| v as usize),
    })
}
