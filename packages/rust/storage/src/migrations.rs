//! SQL migration definitions for the siteagent database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: sites, pages, crawl_jobs, threads, messages, analyses",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Analyzed sites
CREATE TABLE IF NOT EXISTS sites (
    id              TEXT PRIMARY KEY,
    url             TEXT NOT NULL,
    host            TEXT NOT NULL UNIQUE,
    index_name      TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    last_crawled_at TEXT,
    page_count      INTEGER NOT NULL DEFAULT 0
);

-- Individual fetched pages
CREATE TABLE IF NOT EXISTS pages (
    id           TEXT PRIMARY KEY,
    site_id      TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    url          TEXT NOT NULL,
    title        TEXT,
    content_hash TEXT NOT NULL,
    fetched_at   TEXT NOT NULL,
    status_code  INTEGER,
    content_len  INTEGER,
    UNIQUE(site_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_site_id ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_pages_content_hash ON pages(content_hash);

-- Crawl job history
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id          TEXT PRIMARY KEY,
    site_id     TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_site_id ON crawl_jobs(site_id);

-- Conversation threads, one per (site, client thread id)
CREATE TABLE IF NOT EXISTS threads (
    id          TEXT PRIMARY KEY,
    site_id     TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    external_id TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE(site_id, external_id)
);

-- Conversation turns
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY,
    thread_id  TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, created_at);

-- Stored analysis reports
CREATE TABLE IF NOT EXISTS analyses (
    id          TEXT PRIMARY KEY,
    site_id     TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    report_json TEXT NOT NULL,
    model_id    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analyses_site ON analyses(site_id, created_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
