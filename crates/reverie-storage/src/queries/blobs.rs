// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized index blob operations.

use reverie_core::ReverieError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

/// Fetch the index blob for a collection.
pub async fn get_blob(db: &Database, collection: &str) -> Result<Option<Vec<u8>>, ReverieError> {
    let collection = collection.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Vec<u8>>, rusqlite::Error> {
            conn.query_row(
                "SELECT data FROM index_blobs WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace the index blob for a collection.
pub async fn put_blob(db: &Database, collection: &str, data: Vec<u8>) -> Result<(), ReverieError> {
    let collection = collection.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO index_blobs (collection, data) VALUES (?1, ?2)
                 ON CONFLICT(collection) DO UPDATE SET
                     data = excluded.data,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![collection, data],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete the index blob for a collection. Missing rows are ignored.
pub async fn delete_blob(db: &Database, collection: &str) -> Result<(), ReverieError> {
    let collection = collection.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "DELETE FROM index_blobs WHERE collection = ?1",
                params![collection],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
