use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Forward and copy ids are not foreign keys: a dangling forward link is a
    // NodeNotFound the engine reports, not a write the store refuses.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
            id            TEXT PRIMARY KEY,
            owner         TEXT NOT NULL,
            node_type     TEXT NOT NULL DEFAULT 'leaf',
            name          TEXT,
            arc_list      TEXT NOT NULL DEFAULT '[]',
            comp_arc_list TEXT NOT NULL DEFAULT '[]',
            forward_id    TEXT,
            copy_id       TEXT,
            generation    INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS ideas (
            id         TEXT PRIMARY KEY REFERENCES nodes(id),
            owner      TEXT NOT NULL,
            title      TEXT NOT NULL,
            content    TEXT,
            tags       TEXT NOT NULL DEFAULT '[]',
            energy     INTEGER NOT NULL DEFAULT 1,
            archived   INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS generations (
            owner TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS relations (
            source_id  TEXT NOT NULL REFERENCES ideas(id),
            target_id  TEXT NOT NULL REFERENCES ideas(id),
            strength   REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (source_id, target_id)
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_forward ON nodes(forward_id);
        CREATE INDEX IF NOT EXISTS idx_ideas_owner ON ideas(owner, archived);
        CREATE INDEX IF NOT EXISTS idx_relations_source ON relations(source_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    tracing::info!(version = SCHEMA_VERSION, "schema initialized");
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
