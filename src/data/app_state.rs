//! App state data access object (key-value table in SQLite)

use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

use super::kv::KeyValueBackend;
use super::StorageError;

/// Data access object for the `app_state` table. Also serves as the durable
/// [`KeyValueBackend`] for key-value notebook storage and clone entries.
#[derive(Clone)]
pub struct AppStateStore {
    conn: Arc<Mutex<Connection>>,
    /// Byte bound on keys + values across the table
    quota: Option<usize>,
}

impl AppStateStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn, quota: None }
    }

    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Insert or update a value
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        if let Some(quota) = self.quota {
            let others: i64 = conn.query_row(
                "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
                 FROM app_state WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )?;
            let needed = others as usize + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        conn.execute(
            "INSERT INTO app_state (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM app_state WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;

        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM app_state WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Keys starting with `prefix`, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key FROM app_state WHERE substr(key, 1, ?2) = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![prefix, prefix.chars().count() as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    pub fn clear_all(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM app_state", [])?;
        Ok(())
    }
}

impl KeyValueBackend for AppStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        AppStateStore::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        AppStateStore::set(self, key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.delete(key)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.keys_with_prefix(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Database, KeyValueNotebookStore, NotebookStore};
    use crate::model::Notebook;
    use tempfile::tempdir;

    fn setup_db() -> (tempfile::TempDir, Database, AppStateStore) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        let dao = AppStateStore::new(db.connection());
        (dir, db, dao)
    }

    #[test]
    fn test_set_and_get() {
        let (_dir, _db, dao) = setup_db();

        dao.set("last_notebook", "abc").unwrap();
        assert_eq!(dao.get("last_notebook").unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_update() {
        let (_dir, _db, dao) = setup_db();

        dao.set("theme", "light").unwrap();
        dao.set("theme", "dark").unwrap();
        assert_eq!(dao.get("theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_get_nonexistent() {
        let (_dir, _db, dao) = setup_db();
        assert_eq!(dao.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let (_dir, _db, dao) = setup_db();

        dao.set("to_delete", "value").unwrap();
        dao.delete("to_delete").unwrap();
        assert_eq!(dao.get("to_delete").unwrap(), None);

        dao.set("key1", "value1").unwrap();
        dao.set("key2", "value2").unwrap();
        dao.clear_all().unwrap();
        assert_eq!(dao.get("key1").unwrap(), None);
        assert_eq!(dao.get("key2").unwrap(), None);
    }

    #[test]
    fn test_keys_with_prefix() {
        let (_dir, _db, dao) = setup_db();
        dao.set("clone_2", "b").unwrap();
        dao.set("clone_1", "a").unwrap();
        dao.set("notebook_x", "c").unwrap();
        dao.set("clone%", "literal").unwrap();

        assert_eq!(
            dao.keys_with_prefix("clone_").unwrap(),
            vec!["clone_1".to_string(), "clone_2".to_string()]
        );
    }

    #[test]
    fn test_quota_rejects_without_writing() {
        let (_dir, db, _) = setup_db();
        let dao = AppStateStore::new(db.connection()).with_quota(Some(16));

        dao.set("a", "12345").unwrap();
        dao.set("a", "1234567890").unwrap();
        let err = dao.set("b", "123456").unwrap_err();
        assert!(err.is_quota());
        assert_eq!(dao.get("b").unwrap(), None);
        assert_eq!(dao.get("a").unwrap(), Some("1234567890".to_string()));
    }

    #[test]
    fn test_backs_key_value_notebook_store() {
        let (_dir, _db, dao) = setup_db();
        let store = KeyValueNotebookStore::new(dao);
        let notebook = Notebook::new("Durable", "");
        store.save(&notebook).unwrap();
        assert_eq!(store.load(notebook.id()).unwrap(), Some(notebook));
    }
}
