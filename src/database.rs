//! Flat per-group key-value store. Each group's records live in one file
//! of escaped `key=value` lines; every read-modify-write runs under the
//! group's stable lock.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    admission::GroupLocks,
    config::GroupConfig,
    error::{GatewayError, Result},
    wire,
};

pub struct Database {
    locks: GroupLocks,
}

impl Database {
    pub fn new() -> Self {
        Self {
            locks: GroupLocks::new(),
        }
    }

    pub async fn get(&self, group: &GroupConfig, key: &str) -> Result<Option<String>> {
        let path = Self::path_for(group)?;
        let key = key.to_string();
        let lock = self.locks.lock_for(&group.name);
        let _guard = lock.lock().await;
        run_blocking(move || {
            let records = read_records(&path)?;
            Ok(records
                .into_iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v))
        })
        .await
    }

    pub async fn set(&self, group: &GroupConfig, key: &str, value: &str) -> Result<()> {
        let path = Self::path_for(group)?;
        let key = key.to_string();
        let value = value.to_string();
        let lock = self.locks.lock_for(&group.name);
        let _guard = lock.lock().await;
        run_blocking(move || {
            let mut records = read_records(&path)?;
            match records.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => records.push((key, value)),
            }
            write_records(&path, &records)
        })
        .await
    }

    /// Removes the record; absent keys are not an error.
    pub async fn delete(&self, group: &GroupConfig, key: &str) -> Result<()> {
        let path = Self::path_for(group)?;
        let key = key.to_string();
        let lock = self.locks.lock_for(&group.name);
        let _guard = lock.lock().await;
        run_blocking(move || {
            let mut records = read_records(&path)?;
            records.retain(|(k, _)| *k != key);
            write_records(&path, &records)
        })
        .await
    }

    fn path_for(group: &GroupConfig) -> Result<PathBuf> {
        group
            .database
            .clone()
            .ok_or_else(|| GatewayError::domain("no database configured for group"))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| GatewayError::Storage(format!("database task failed: {err}")))?
}

fn read_records(path: &Path) -> Result<Vec<(String, String)>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut records = Vec::new();
    for line in raw.lines() {
        let mut parts = line.split('=');
        if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
            records.push((wire::unescape(key), wire::unescape(value)));
        }
    }
    Ok(records)
}

fn write_records(path: &Path, records: &[(String, String)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut out = String::new();
    for (key, value) in records {
        out.push_str(&wire::escape(key));
        out.push('=');
        out.push_str(&wire::escape(value));
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::group_named;

    fn group_with_db(dir: &Path) -> GroupConfig {
        let mut group = group_named("Tester", "secret");
        group.database = Some(dir.join("tester.db"));
        group
    }

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_db(dir.path());
        let database = Database::new();

        assert_eq!(database.get(&group, "color").await.unwrap(), None);
        database.set(&group, "color", "blue").await.unwrap();
        database.set(&group, "shape", "cube").await.unwrap();
        assert_eq!(
            database.get(&group, "color").await.unwrap(),
            Some("blue".to_string())
        );

        database.set(&group, "color", "red").await.unwrap();
        assert_eq!(
            database.get(&group, "color").await.unwrap(),
            Some("red".to_string())
        );

        database.delete(&group, "color").await.unwrap();
        assert_eq!(database.get(&group, "color").await.unwrap(), None);
        assert_eq!(
            database.get(&group, "shape").await.unwrap(),
            Some("cube".to_string())
        );
    }

    #[tokio::test]
    async fn values_with_wire_characters_survive_storage() {
        let dir = tempfile::tempdir().unwrap();
        let group = group_with_db(dir.path());
        let database = Database::new();

        database.set(&group, "note", "a=b&c d").await.unwrap();
        assert_eq!(
            database.get(&group, "note").await.unwrap(),
            Some("a=b&c d".to_string())
        );
    }

    #[tokio::test]
    async fn missing_database_path_is_a_domain_error() {
        let group = group_named("Tester", "secret");
        let database = Database::new();
        let err = database.get(&group, "anything").await.unwrap_err();
        assert!(matches!(err, GatewayError::Domain(_)));
    }
}
