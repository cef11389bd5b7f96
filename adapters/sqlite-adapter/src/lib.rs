//! sqlite-adapter: SQLite implementations of the deposit store and search index.
//!
//! Purpose
//! - `SqliteDepositRepo` is the system of record: table `deposit` with an
//!   AUTOINCREMENT id so issued ids are monotonic and never reused.
//! - `SqliteSearchIndex` is the secondary copy: a separate database file whose
//!   `deposit` table stores each record as a JSON document. Queries are parsed
//!   and evaluated in process with `domain::query`, so a search reads and
//!   scores every document: cost is linear in the number of indexed deposits.
//!   Decoding and scoring happen after the connection lock is released.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Each write runs in its own transaction; the store and index never share one.

use std::path::Path;
use std::sync::Mutex;

use domain::query::Query;
use domain::{CoreError, Deposit, DepositRepository, DepositSearchRepository};
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed entity store.
pub struct SqliteDepositRepo {
    conn: Mutex<Connection>,
}

/// SQLite-backed search index.
pub struct SqliteSearchIndex {
    conn: Mutex<Connection>,
}

fn open<P, F>(path: P, map_err: F) -> Result<Connection, CoreError>
where
    P: AsRef<Path>,
    F: Fn(String) -> CoreError,
{
    // Ensure directory exists
    if let Some(dir) = path.as_ref().parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .map_err(|e| map_err(format!("cannot create {}: {e}", dir.display())))?;
        }
    }
    Connection::open(path).map_err(|e| map_err(e.to_string()))
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn map_idxerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Index(format!("sqlite index error: {e}"))
}

impl SqliteDepositRepo {
    /// Open (or create) the store database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = open(path, map_sqerr::<String>)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS deposit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                booking_code TEXT,
                user_id INTEGER,
                currency_code TEXT
            );
            "#,
        )
        .map_err(map_sqerr)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn row_to_deposit(row: &rusqlite::Row) -> Result<Deposit, rusqlite::Error> {
    Ok(Deposit {
        id: Some(row.get(0)?),
        booking_code: row.get(1)?,
        user_id: row.get(2)?,
        currency_code: row.get(3)?,
    })
}

impl DepositRepository for SqliteDepositRepo {
    fn save(&self, mut deposit: Deposit) -> Result<Deposit, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        match deposit.id {
            Some(id) => {
                let changed = tx
                    .execute(
                        "UPDATE deposit SET booking_code = ?1, user_id = ?2, currency_code = ?3 WHERE id = ?4",
                        params![deposit.booking_code, deposit.user_id, deposit.currency_code, id],
                    )
                    .map_err(map_sqerr)?;
                if changed == 0 {
                    return Err(CoreError::NotFound);
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO deposit(booking_code, user_id, currency_code) VALUES (?1, ?2, ?3)",
                    params![deposit.booking_code, deposit.user_id, deposit.currency_code],
                )
                .map_err(map_sqerr)?;
                deposit.id = Some(tx.last_insert_rowid());
            }
        }
        tx.commit().map_err(map_sqerr)?;
        Ok(deposit)
    }

    fn find_all(&self) -> Result<Vec<Deposit>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let mut stmt = conn
            .prepare("SELECT id, booking_code, user_id, currency_code FROM deposit ORDER BY id")
            .map_err(map_sqerr)?;
        let rows = stmt.query_map([], row_to_deposit).map_err(map_sqerr)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqerr)
    }

    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        conn.query_row(
            "SELECT id, booking_code, user_id, currency_code FROM deposit WHERE id = ?1",
            params![id],
            row_to_deposit,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn delete(&self, id: i64) -> Result<(), CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        tx.execute("DELETE FROM deposit WHERE id = ?1", params![id])
            .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        Ok(())
    }

    fn count(&self) -> Result<usize, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM deposit", [], |r| r.get(0))
            .map_err(map_sqerr)?;
        usize::try_from(n).map_err(map_sqerr)
    }
}

impl SqliteSearchIndex {
    /// Open (or create) the index database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = open(path, map_idxerr::<String>)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS deposit (
                id INTEGER PRIMARY KEY,
                document TEXT NOT NULL
            );
            "#,
        )
        .map_err(map_idxerr)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_documents(&self) -> Result<Vec<String>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        let mut stmt = conn
            .prepare("SELECT document FROM deposit ORDER BY id")
            .map_err(map_idxerr)?;
        let docs = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(map_idxerr)?;
        docs.collect::<Result<Vec<_>, _>>().map_err(map_idxerr)
    }
}

impl DepositSearchRepository for SqliteSearchIndex {
    fn index(&self, deposit: &Deposit) -> Result<(), CoreError> {
        let id = deposit
            .id
            .ok_or_else(|| CoreError::Index("cannot index a deposit without id".into()))?;
        let document = serde_json::to_string(deposit).map_err(map_idxerr)?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        conn.execute(
            "INSERT INTO deposit(id, document) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document",
            params![id, document],
        )
        .map_err(map_idxerr)?;
        Ok(())
    }

    fn remove(&self, id: i64) -> Result<(), CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        conn.execute("DELETE FROM deposit WHERE id = ?1", params![id])
            .map_err(map_idxerr)?;
        Ok(())
    }

    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        let json: Option<String> = conn
            .query_row(
                "SELECT document FROM deposit WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()
            .map_err(map_idxerr)?;
        json.map(|j| serde_json::from_str(&j).map_err(map_idxerr))
            .transpose()
    }

    fn search(&self, query: &str) -> Result<Vec<Deposit>, CoreError> {
        let parsed = Query::parse(query)?;
        // Full scan: every document is decoded and scored, O(N) in index size.
        let docs = self
            .load_documents()?
            .iter()
            .map(|json| serde_json::from_str(json).map_err(map_idxerr))
            .collect::<Result<Vec<Deposit>, _>>()?;
        Ok(parsed.run(docs.iter()))
    }

    fn delete_all(&self) -> Result<(), CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        conn.execute("DELETE FROM deposit", []).map_err(map_idxerr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_store() -> (SqliteDepositRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteDepositRepo::new(dir.path().join("store.db")).unwrap();
        (repo, dir)
    }

    fn tmp_index() -> (SqliteSearchIndex, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let idx = SqliteSearchIndex::new(dir.path().join("index.db")).unwrap();
        (idx, dir)
    }

    fn sample() -> Deposit {
        Deposit::default()
            .booking_code("AAAAAAAAAA")
            .user_id(1)
            .currency_code("AAAAAAAAAA")
    }

    #[test]
    fn insert_assigns_id_and_roundtrips() {
        let (repo, _dir) = tmp_store();
        let saved = repo.save(sample()).unwrap();
        let id = saved.id.unwrap();
        let got = repo.find_one(id).unwrap().unwrap();
        assert_eq!(got, saved);
        assert_eq!(got.booking_code.as_deref(), Some("AAAAAAAAAA"));
    }

    #[test]
    fn nulls_survive_storage() {
        let (repo, _dir) = tmp_store();
        let saved = repo.save(Deposit::default()).unwrap();
        let got = repo.find_one(saved.id.unwrap()).unwrap().unwrap();
        assert_eq!(got.booking_code, None);
        assert_eq!(got.user_id, None);
        assert_eq!(got.currency_code, None);
    }

    #[test]
    fn update_replaces_all_fields() {
        let (repo, _dir) = tmp_store();
        let saved = repo.save(sample()).unwrap();
        let replacement = Deposit {
            id: saved.id,
            booking_code: Some("BBBBBBBBBB".into()),
            user_id: Some(2),
            currency_code: None,
        };
        repo.save(replacement.clone()).unwrap();
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.find_one(saved.id.unwrap()).unwrap(), Some(replacement));
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let (repo, _dir) = tmp_store();
        let mut d = sample();
        d.id = Some(77);
        assert!(matches!(repo.save(d), Err(CoreError::NotFound)));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn ids_not_reused_after_delete() {
        let (repo, _dir) = tmp_store();
        let a = repo.save(sample()).unwrap().id.unwrap();
        repo.delete(a).unwrap();
        let b = repo.save(sample()).unwrap().id.unwrap();
        assert!(b > a);
        // deleting twice is fine
        repo.delete(a).unwrap();
    }

    #[test]
    fn find_all_is_id_ordered() {
        let (repo, _dir) = tmp_store();
        for _ in 0..3 {
            repo.save(sample()).unwrap();
        }
        let ids: Vec<_> = repo
            .find_all()
            .unwrap()
            .into_iter()
            .filter_map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn index_overwrites_and_searches() {
        let (idx, _dir) = tmp_index();
        let mut d = sample();
        d.id = Some(10);
        idx.index(&d).unwrap();

        d.booking_code = Some("HOTEL-9".into());
        idx.index(&d).unwrap();

        assert_eq!(idx.find_one(10).unwrap(), Some(d));
        assert_eq!(idx.search("id:10").unwrap().len(), 1);
        assert_eq!(idx.search("bookingCode:hotel").unwrap().len(), 1);
        assert!(idx.search("bookingCode:aaaaaaaaaa").unwrap().is_empty());
    }

    #[test]
    fn index_remove_and_delete_all() {
        let (idx, _dir) = tmp_index();
        for id in 1..=3 {
            let mut d = sample();
            d.id = Some(id);
            idx.index(&d).unwrap();
        }
        idx.remove(2).unwrap();
        assert!(!idx.exists(2).unwrap());
        assert!(idx.exists(1).unwrap());

        idx.delete_all().unwrap();
        assert!(idx.search("*").unwrap().is_empty());
    }

    #[test]
    fn index_rejects_bad_query() {
        let (idx, _dir) = tmp_index();
        assert!(matches!(idx.search("id:"), Err(CoreError::InvalidQuery(_))));
    }

    #[test]
    fn unwritable_parent_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = SqliteDepositRepo::new(blocker.join("store.db")).err().unwrap();
        assert!(
            matches!(&err, CoreError::Repository(msg) if msg.contains("cannot create")),
            "{err:?}"
        );
        let err = SqliteSearchIndex::new(blocker.join("index.db")).err().unwrap();
        assert!(
            matches!(&err, CoreError::Index(msg) if msg.contains("cannot create")),
            "{err:?}"
        );
    }

    #[test]
    fn search_reports_corrupt_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let idx = SqliteSearchIndex::new(&path).unwrap();
        let raw = Connection::open(&path).unwrap();
        raw.execute("INSERT INTO deposit(id, document) VALUES (1, 'not json')", [])
            .unwrap();
        assert!(matches!(idx.search("*"), Err(CoreError::Index(_))));
    }
}
