// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-collection vector dimensionality.

use reverie_core::ReverieError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

pub async fn get_dimensions(
    db: &Database,
    collection: &str,
) -> Result<Option<usize>, ReverieError> {
    let collection = collection.to_string();
    let stored = db
        .connection()
        .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
            conn.query_row(
                "SELECT dimensions FROM index_dimensions WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    stored
        .map(|d| {
            usize::try_from(d)
                .map_err(|_| ReverieError::storage(format!("invalid stored dimensions: {d}")))
        })
        .transpose()
}

pub async fn put_dimensions(
    db: &Database,
    collection: &str,
    dimensions: usize,
) -> Result<(), ReverieError> {
    let collection = collection.to_string();
    let dimensions = i64::try_from(dimensions)
        .map_err(|_| ReverieError::storage(format!("dimensions out of range: {dimensions}")))?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO index_dimensions (collection, dimensions) VALUES (?1, ?2)
                 ON CONFLICT(collection) DO UPDATE SET dimensions = excluded.dimensions",
                params![collection, dimensions],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_dimensions(db: &Database, collection: &str) -> Result<(), ReverieError> {
    let collection = collection.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "DELETE FROM index_dimensions WHERE collection = ?1",
                params![collection],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dimensions_are_per_collection() {
        let db = Database::open_in_memory().await.unwrap();
        put_dimensions(&db, "a", 1536).await.unwrap();
        put_dimensions(&db, "b", 384).await.unwrap();
        assert_eq!(get_dimensions(&db, "a").await.unwrap(), Some(1536));
        assert_eq!(get_dimensions(&db, "b").await.unwrap(), Some(384));

        delete_dimensions(&db, "a").await.unwrap();
        assert_eq!(get_dimensions(&db, "a").await.unwrap(), None);
        assert_eq!(get_dimensions(&db, "b").await.unwrap(), Some(384));
    }

    #[tokio::test]
    async fn zero_dimensions_violate_check_constraint() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(put_dimensions(&db, "a", 0).await.is_err());
    }
}
