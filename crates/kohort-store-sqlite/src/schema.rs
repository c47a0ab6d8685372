//! SQL schema for the Kohort SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per experiment, rewritten in place on every update.
-- `version` guards updates: UPDATE ... WHERE version = <expected>.
CREATE TABLE IF NOT EXISTS experiments (
    experiment_id TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    description   TEXT,
    variants      TEXT NOT NULL,           -- JSON array of variants
    rules         TEXT NOT NULL,           -- JSON array of targeting rules
    active        INTEGER NOT NULL DEFAULT 1,
    version       INTEGER NOT NULL CHECK (version >= 1),
    created_at    TEXT NOT NULL,           -- ISO 8601 UTC; server-assigned
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS experiments_created_idx ON experiments(created_at);

PRAGMA user_version = 1;
";
