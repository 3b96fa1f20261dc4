//! Database schema migrations.
//!
//! Version 1 creates the product catalog (`categorias`, `productos`);
//! version 2 adds `knowledge_chunks`, the persisted side of the vector index.

use rusqlite::Connection;
use tracing::info;

use brocha_core::error::BrochaError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), BrochaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| BrochaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| BrochaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: catalog");
    }
    if current_version < 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: knowledge_chunks");
    }

    Ok(())
}

/// Version 1: product catalog.
fn apply_v1(conn: &Connection) -> Result<(), BrochaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categorias (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS productos (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            marca           TEXT NOT NULL,
            nombre          TEXT NOT NULL,
            precio_regular  TEXT,
            precio_promo    TEXT,
            categoria_id    INTEGER,
            FOREIGN KEY (categoria_id) REFERENCES categorias(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_productos_marca
            ON productos (marca);

        CREATE INDEX IF NOT EXISTS idx_productos_categoria
            ON productos (categoria_id);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'catalog');
        ",
    )
    .map_err(|e| BrochaError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

/// Version 2: knowledge chunks with their embeddings (little-endian f32 blob).
fn apply_v2(conn: &Connection) -> Result<(), BrochaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS knowledge_chunks (
            id          TEXT PRIMARY KEY NOT NULL,
            collection  TEXT NOT NULL,
            text        TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            source      TEXT NOT NULL DEFAULT '',
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_chunks_collection
            ON knowledge_chunks (collection, created_at ASC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (2, 'knowledge_chunks');
        ",
    )
    .map_err(|e| BrochaError::Storage(format!("Failed to apply migration v2: {}", e)))?;

    Ok(())
}
