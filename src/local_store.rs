//! Worksheet backend kept in JSON files on local disk
//!
//! Each worksheet is one file `<data_dir>/<sheet>.json` holding the rows as a
//! JSON array of string arrays, header row first. Every operation reads and
//! rewrites the whole file, which is what the spreadsheet API does too.

use async_trait::async_trait;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{FicoreError, Result};
use crate::store::TableStore;

pub struct LocalStore {
    dir: PathBuf,
    // serializes read-modify-write cycles inside this process
    lock: Mutex<()>,
}

impl LocalStore {
    /// Open the store, creating the data directory if it does not exist
    ///
    /// # Examples
    /// ```no_run
    /// use ficore::local_store::LocalStore;
    ///
    /// let store = LocalStore::open("database").expect("data directory");
    /// ```
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            create_dir_all(&dir)?;
        }
        Ok(LocalStore {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sheet))
    }

    async fn read(&self, sheet: &str) -> Result<Option<Vec<Vec<String>>>> {
        let path = self.path(sheet);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).await?;
        if contents.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn write(&self, sheet: &str, rows: &[Vec<String>]) -> Result<()> {
        let json = serde_json::to_string_pretty(rows)?;
        fs::write(self.path(sheet), json).await?;
        Ok(())
    }

    async fn existing(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        self.read(sheet)
            .await?
            .ok_or_else(|| FicoreError::Store(format!("Worksheet {} not found", sheet)))
    }
}

#[async_trait]
impl TableStore for LocalStore {
    async fn rows(&self, sheet: &str) -> Result<Option<Vec<Vec<String>>>> {
        let _guard = self.lock.lock().await;
        self.read(sheet).await
    }

    async fn create_sheet(&self, sheet: &str, headers: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let header_row = headers.iter().map(|h| h.to_string()).collect();
        self.write(sheet, &[header_row]).await
    }

    async fn clear(&self, sheet: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(sheet, &[]).await
    }

    async fn update_row(&self, sheet: &str, row: usize, values: Vec<String>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.existing(sheet).await?;
        if row == 0 || row > rows.len() {
            return Err(FicoreError::Store(format!(
                "Row {} out of range in {}",
                row, sheet
            )));
        }
        rows[row - 1] = values;
        self.write(sheet, &rows).await
    }

    async fn append_row(&self, sheet: &str, values: Vec<String>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.existing(sheet).await?;
        rows.push(values);
        self.write(sheet, &rows).await
    }

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.existing(sheet).await?;
        if row == 0 || row > rows.len() {
            return Err(FicoreError::Store(format!(
                "Row {} out of range in {}",
                row, sheet
            )));
        }
        rows.remove(row - 1);
        self.write(sheet, &rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_sheet_is_none() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.rows("Nope").await.unwrap().is_none());
        assert!(store.append_row("Nope", row(&["x"])).await.is_err());
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LocalStore::open(dir.path()).unwrap();
            store.create_sheet("Sheet", &["a", "b"]).await.unwrap();
            store.append_row("Sheet", row(&["1", "2"])).await.unwrap();
            store.append_row("Sheet", row(&["3", "4"])).await.unwrap();
            store.update_row("Sheet", 2, row(&["5", "6"])).await.unwrap();
        }

        let store = LocalStore::open(dir.path()).unwrap();
        let rows = store.rows("Sheet").await.unwrap().unwrap();
        assert_eq!(rows, vec![row(&["a", "b"]), row(&["5", "6"]), row(&["3", "4"])]);
    }

    #[tokio::test]
    async fn test_delete_shifts_rows() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store.create_sheet("Sheet", &["a"]).await.unwrap();
        store.append_row("Sheet", row(&["1"])).await.unwrap();
        store.append_row("Sheet", row(&["2"])).await.unwrap();

        store.delete_row("Sheet", 2).await.unwrap();
        let rows = store.rows("Sheet").await.unwrap().unwrap();
        assert_eq!(rows, vec![row(&["a"]), row(&["2"])]);

        assert!(store.delete_row("Sheet", 9).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_keeps_sheet() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store.create_sheet("Sheet", &["a"]).await.unwrap();
        store.clear("Sheet").await.unwrap();
        assert_eq!(store.rows("Sheet").await.unwrap(), Some(Vec::new()));
    }
}
