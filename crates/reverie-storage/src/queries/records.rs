// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory metadata record operations.
//!
//! Prefix matching uses `substr` rather than `LIKE` so that `%` and `_` in
//! collection names are matched literally.

use reverie_core::ReverieError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// All records whose key starts with `prefix`, ordered by key.
pub async fn list_records(
    db: &Database,
    prefix: &str,
) -> Result<Vec<(String, String)>, ReverieError> {
    let prefix = prefix.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<(String, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM memory_records
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key ASC",
            )?;
            let rows = stmt.query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert many records in a single transaction.
pub async fn put_records(
    db: &Database,
    records: Vec<(String, String)>,
) -> Result<(), ReverieError> {
    if records.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO memory_records (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                )?;
                for (key, value) in &records {
                    stmt.execute(params![key, value])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete records by exact key in a single transaction.
pub async fn delete_records(db: &Database, keys: Vec<String>) -> Result<(), ReverieError> {
    if keys.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("DELETE FROM memory_records WHERE key = ?1")?;
                for key in &keys {
                    stmt.execute(params![key])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every record under `prefix`; returns the number of rows removed.
pub async fn delete_records_with_prefix(
    db: &Database,
    prefix: &str,
) -> Result<usize, ReverieError> {
    let prefix = prefix.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM memory_records WHERE substr(key, 1, length(?1)) = ?1",
                params![prefix],
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn put_list_and_upsert() {
        let db = Database::open_in_memory().await.unwrap();
        put_records(&db, vec![rec("c1:b", "{\"n\":2}"), rec("c1:a", "{\"n\":1}")])
            .await
            .unwrap();
        put_records(&db, vec![rec("c1:a", "{\"n\":10}")]).await.unwrap();

        let listed = list_records(&db, "c1:").await.unwrap();
        assert_eq!(listed, vec![rec("c1:a", "{\"n\":10}"), rec("c1:b", "{\"n\":2}")]);
    }

    #[tokio::test]
    async fn prefix_is_matched_literally() {
        let db = Database::open_in_memory().await.unwrap();
        put_records(
            &db,
            vec![rec("a_b:1", "x"), rec("axb:1", "y"), rec("a%:1", "z")],
        )
        .await
        .unwrap();

        assert_eq!(list_records(&db, "a_b:").await.unwrap(), vec![rec("a_b:1", "x")]);
        assert_eq!(list_records(&db, "a%:").await.unwrap(), vec![rec("a%:1", "z")]);
    }

    #[tokio::test]
    async fn delete_by_key_and_prefix() {
        let db = Database::open_in_memory().await.unwrap();
        put_records(
            &db,
            vec![rec("c1:a", "1"), rec("c1:b", "2"), rec("c2:a", "3")],
        )
        .await
        .unwrap();

        delete_records(&db, vec!["c1:a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(list_records(&db, "c1:").await.unwrap(), vec![rec("c1:b", "2")]);

        let removed = delete_records_with_prefix(&db, "c1:").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(list_records(&db, "").await.unwrap(), vec![rec("c2:a", "3")]);
    }
}
