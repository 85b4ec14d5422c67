//! Spreadsheet adapter
//!
//! [`TableStore`] is the minimal surface a worksheet backend has to offer:
//! fetch every row, overwrite a row, append a row, delete a row. On top of it
//! [`Worksheets`] treats each worksheet as a table with a fixed header row and
//! implements the lookups the tools need as linear scans over all rows.
//!
//! There is no locking: two concurrent read-modify-write cycles on the same
//! worksheet race and the last writer wins.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

use crate::error::Result;
use crate::i18n::Language;
use crate::worksheet::{DERIVED_HEADERS, Record, Tool, now_timestamp};

/// A backend holding named worksheets of string cells
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Every row of `sheet`, header row first; `None` when the sheet does not exist
    async fn rows(&self, sheet: &str) -> Result<Option<Vec<Vec<String>>>>;

    /// Create `sheet` with `headers` as its first row
    async fn create_sheet(&self, sheet: &str, headers: &[&str]) -> Result<()>;

    /// Remove every row of `sheet`
    async fn clear(&self, sheet: &str) -> Result<()>;

    /// Overwrite the 1-based row `row`
    async fn update_row(&self, sheet: &str, row: usize, values: Vec<String>) -> Result<()>;

    async fn append_row(&self, sheet: &str, values: Vec<String>) -> Result<()>;

    /// Delete the 1-based row `row`, shifting later rows up
    async fn delete_row(&self, sheet: &str, row: usize) -> Result<()>;
}

/// Outcome of [`Worksheets::update_or_append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    /// An existing row (1-based) was overwritten
    Updated(usize),
    Appended,
}

/// Table-style access to the tool worksheets
#[derive(Clone)]
pub struct Worksheets {
    store: Arc<dyn TableStore>,
}

impl Worksheets {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Worksheets { store }
    }

    /// Make sure the worksheet exists and starts with the configured header row
    ///
    /// A worksheet whose first row differs from the configured headers is
    /// cleared and gets the configured headers written back.
    pub async fn initialize_worksheet(&self, tool: Tool) -> Result<Vec<Vec<String>>> {
        let name = tool.sheet_name();
        let headers = tool.headers();

        let rows = match self.store.rows(name).await? {
            Some(rows) => rows,
            None => {
                info!("Creating new worksheet: {}", name);
                self.store.create_sheet(name, headers).await?;
                return Ok(vec![headers.iter().map(|h| h.to_string()).collect()]);
            }
        };

        let current: Vec<String> = rows
            .first()
            .map(|row| {
                let mut row = row.clone();
                while row.last().is_some_and(|cell| cell.is_empty()) {
                    row.pop();
                }
                row
            })
            .unwrap_or_default();

        for header in &current {
            let known = headers.iter().any(|h| h.eq_ignore_ascii_case(header))
                || DERIVED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(header));
            if !known {
                warn!("Unexpected header '{}' in {}", header, name);
            }
        }

        if current.is_empty() || current.iter().map(String::as_str).ne(headers.iter().copied()) {
            info!("Updating headers for {}", name);
            self.store.clear(name).await?;
            self.store
                .append_row(name, headers.iter().map(|h| h.to_string()).collect())
                .await?;
            return Ok(vec![headers.iter().map(|h| h.to_string()).collect()]);
        }

        Ok(rows)
    }

    /// Records paired with their 1-based row number; blank rows are skipped
    async fn load(&self, tool: Tool) -> Result<Vec<(usize, Record)>> {
        let rows = self.initialize_worksheet(tool).await?;
        let Some((header, body)) = rows.split_first() else {
            return Ok(Vec::new());
        };

        Ok(body
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|(i, row)| (i + 2, Record::from_row(header, row)))
            .collect())
    }

    /// Every record of the worksheet
    pub async fn get_all_records(&self, tool: Tool) -> Result<Vec<Record>> {
        Ok(self.load(tool).await?.into_iter().map(|(_, r)| r).collect())
    }

    /// Records whose `email` cell equals `email`
    pub async fn get_user_data_by_email(&self, email: &str, tool: Tool) -> Result<Vec<Record>> {
        Ok(self
            .get_all_records(tool)
            .await?
            .into_iter()
            .filter(|record| record.get("email") == email)
            .collect())
    }

    /// First record whose `id`, `timestamp` or `bill_timestamp` equals `id`
    pub async fn get_record_by_id(&self, id: &str, tool: Tool) -> Result<Option<Record>> {
        Ok(self
            .get_all_records(tool)
            .await?
            .into_iter()
            .find(|record| record.has_key(id)))
    }

    /// Record keyed by `id` that belongs to `email`
    pub async fn get_user_record(&self, id: &str, email: &str, tool: Tool) -> Result<Option<Record>> {
        if id.is_empty() || email.is_empty() {
            return Ok(None);
        }
        Ok(self
            .get_all_records(tool)
            .await?
            .into_iter()
            .find(|record| record.has_key(id) && record.get("email") == email))
    }

    /// Overwrite the matching row or append a new one
    ///
    /// A row matches when one of its key columns equals the key of `data`
    /// (`id`, else `timestamp`, else `bill_timestamp`) or, for tools that
    /// keep one row per user, when its email equals the email of `data`.
    /// A key match on a row owned by another email is not a match, so two
    /// users whose rows share a timestamp keep separate rows. The stored row
    /// is merged with `data`, entirely or only for `only_fields`.
    pub async fn update_or_append(
        &self,
        data: &Record,
        tool: Tool,
        only_fields: Option<&[&str]>,
    ) -> Result<Saved> {
        let headers = tool.headers();
        let email = data.get("email");
        let key = data.key().unwrap_or("");

        for (row, record) in self.load(tool).await? {
            let owner = record.get("email");
            let same_user = tool.matches_by_email() && !email.is_empty() && owner == email;
            let same_key = !key.is_empty()
                && record.has_key(key)
                && (email.is_empty() || owner.is_empty() || owner == email);
            if same_user || same_key {
                let mut merged = record;
                merged.merge(data, only_fields);
                self.store
                    .update_row(tool.sheet_name(), row, merged.to_row(headers))
                    .await?;
                return Ok(Saved::Updated(row));
            }
        }

        self.store
            .append_row(tool.sheet_name(), data.to_row(headers))
            .await?;
        Ok(Saved::Appended)
    }

    /// Delete the first row keyed by `id` that belongs to `email`
    pub async fn delete_record(&self, id: &str, email: &str, tool: Tool) -> Result<bool> {
        for (row, record) in self.load(tool).await? {
            if record.has_key(id) && record.get("email") == email {
                self.store.delete_row(tool.sheet_name(), row).await?;
                info!("Deleted row {} from {}", row, tool);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Record who submitted a form in the Authentication worksheet
    pub async fn store_authentication_data(
        &self,
        first_name: &str,
        email: &str,
        last_name: &str,
        phone_number: &str,
        language: Language,
        session_id: &str,
    ) -> Result<Saved> {
        let record = Record::new()
            .with("timestamp", now_timestamp())
            .with("first_name", first_name)
            .with("email", email)
            .with("last_name", last_name)
            .with("phone_number", phone_number)
            .with("language", language)
            .with("session_id", session_id);
        self.update_or_append(&record, Tool::Authentication, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::LocalStore;
    use tempfile::TempDir;

    fn worksheets() -> (TempDir, Worksheets) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        (dir, Worksheets::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_initialize_creates_header_row() {
        let (_dir, sheets) = worksheets();
        let rows = sheets.initialize_worksheet(Tool::Quiz).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), Tool::Quiz.headers().len());
        assert!(sheets.get_all_records(Tool::Quiz).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_headers_are_reset() {
        let (dir, sheets) = worksheets();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .create_sheet(Tool::NetWorth.sheet_name(), &["email", "legacy_column"])
            .await
            .unwrap();
        store
            .append_row(
                Tool::NetWorth.sheet_name(),
                vec!["a@b.co".to_string(), "x".to_string()],
            )
            .await
            .unwrap();

        let rows = sheets.initialize_worksheet(Tool::NetWorth).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "id");
    }

    #[tokio::test]
    async fn test_profile_tools_overwrite_by_email() {
        let (_dir, sheets) = worksheets();
        let first = Record::new()
            .with("id", "one")
            .with("email", "amina@example.com")
            .with("assets", 100);
        let second = Record::new()
            .with("id", "two")
            .with("email", "amina@example.com")
            .with("assets", 200);

        assert_eq!(
            sheets.update_or_append(&first, Tool::NetWorth, None).await.unwrap(),
            Saved::Appended
        );
        assert_eq!(
            sheets.update_or_append(&second, Tool::NetWorth, None).await.unwrap(),
            Saved::Updated(2)
        );

        let records = sheets.get_all_records(Tool::NetWorth).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("assets"), "200");
        assert_eq!(records[0].get("id"), "two");
    }

    #[tokio::test]
    async fn test_ledger_tools_append_per_entry() {
        let (_dir, sheets) = worksheets();
        for id in ["t1", "t2"] {
            let record = Record::new()
                .with("id", id)
                .with("email", "musa@example.com")
                .with("amount", 10);
            sheets
                .update_or_append(&record, Tool::ExpenseTracker, None)
                .await
                .unwrap();
        }
        let records = sheets
            .get_user_data_by_email("musa@example.com", Tool::ExpenseTracker)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);

        let edit = Record::new()
            .with("id", "t2")
            .with("email", "musa@example.com")
            .with("amount", 25);
        assert_eq!(
            sheets.update_or_append(&edit, Tool::ExpenseTracker, None).await.unwrap(),
            Saved::Updated(3)
        );
        let found = sheets
            .get_record_by_id("t2", Tool::ExpenseTracker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get("amount"), "25");
    }

    #[tokio::test]
    async fn test_update_specific_fields_only() {
        let (_dir, sheets) = worksheets();
        let record = Record::new()
            .with("id", "t1")
            .with("email", "a@b.co")
            .with("amount", 10)
            .with("running_balance", 0);
        sheets
            .update_or_append(&record, Tool::ExpenseTracker, None)
            .await
            .unwrap();

        let update = Record::new()
            .with("id", "t1")
            .with("amount", 999)
            .with("running_balance", 10);
        sheets
            .update_or_append(&update, Tool::ExpenseTracker, Some(&["running_balance"]))
            .await
            .unwrap();

        let stored = sheets
            .get_record_by_id("t1", Tool::ExpenseTracker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get("amount"), "10");
        assert_eq!(stored.get("running_balance"), "10");
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let (_dir, sheets) = worksheets();
        let bill = Record::new()
            .with("timestamp", "2025-05-01 09:00:00")
            .with("email", "owner@example.com")
            .with("description", "Rent");
        sheets
            .update_or_append(&bill, Tool::BillPlanner, None)
            .await
            .unwrap();

        assert!(
            !sheets
                .delete_record("2025-05-01 09:00:00", "intruder@example.com", Tool::BillPlanner)
                .await
                .unwrap()
        );
        assert!(
            sheets
                .delete_record("2025-05-01 09:00:00", "owner@example.com", Tool::BillPlanner)
                .await
                .unwrap()
        );
        assert!(sheets.get_all_records(Tool::BillPlanner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shared_timestamp_keeps_both_users() {
        let (_dir, sheets) = worksheets();
        for (email, income) in [("amina@example.com", 100), ("bello@example.com", 50)] {
            let budget = Record::new()
                .with("timestamp", "2025-06-01 10:00:00")
                .with("email", email)
                .with("monthly_income", income);
            assert_eq!(
                sheets.update_or_append(&budget, Tool::Budget, None).await.unwrap(),
                Saved::Appended
            );
        }

        let amina = sheets
            .get_user_record("2025-06-01 10:00:00", "amina@example.com", Tool::Budget)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(amina.get("monthly_income"), "100");
        let bello = sheets
            .get_user_record("2025-06-01 10:00:00", "bello@example.com", Tool::Budget)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bello.get("monthly_income"), "50");
        assert!(
            sheets
                .get_user_record("2025-06-01 10:00:00", "", Tool::Budget)
                .await
                .unwrap()
                .is_none()
        );

        let edit = Record::new()
            .with("timestamp", "2025-06-01 10:00:00")
            .with("email", "bello@example.com")
            .with("monthly_income", 75);
        assert_eq!(
            sheets.update_or_append(&edit, Tool::Budget, None).await.unwrap(),
            Saved::Updated(3)
        );
    }

    #[tokio::test]
    async fn test_authentication_row_per_email() {
        let (_dir, sheets) = worksheets();
        for name in ["Aisha", "Aisha B."] {
            sheets
                .store_authentication_data(name, "aisha@example.com", "", "", Language::Hausa, "s1")
                .await
                .unwrap();
        }
        let records = sheets.get_all_records(Tool::Authentication).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("first_name"), "Aisha B.");
        assert_eq!(records[0].get("language"), "Hausa");
    }
}
