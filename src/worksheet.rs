//! Worksheet definitions and the flat row type stored in them.
//!
//! Every tool owns one worksheet with a fixed header row. A row is read back
//! as a [`Record`]: header name to cell text. Numbers are kept as text and
//! parsed on demand with [`parse_number`].

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Timestamp format used for every `timestamp` cell
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Headers that are computed rather than entered and may linger in old sheets
pub const DERIVED_HEADERS: &[&str] = &[
    "timestamp",
    "badges",
    "score",
    "running_balance",
    "surplus_deficit",
    "total_expenses",
    "savings",
    "rank",
    "total_users",
    "recommended_fund",
    "net_worth",
    "quiz_score",
    "personality",
];

/// One logical table in the spreadsheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Authentication,
    HealthScore,
    NetWorth,
    Quiz,
    EmergencyFund,
    Budget,
    ExpenseTracker,
    BillPlanner,
    BillReminders,
}

impl Tool {
    pub const ALL: [Tool; 9] = [
        Tool::Authentication,
        Tool::HealthScore,
        Tool::NetWorth,
        Tool::Quiz,
        Tool::EmergencyFund,
        Tool::Budget,
        Tool::ExpenseTracker,
        Tool::BillPlanner,
        Tool::BillReminders,
    ];

    /// Worksheet title inside the spreadsheet
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Tool::Authentication => "AuthenticationSheet",
            Tool::HealthScore => "HealthScoreSheet",
            Tool::NetWorth => "NetWorthSheet",
            Tool::Quiz => "QuizSheet",
            Tool::EmergencyFund => "EmergencyFundSheet",
            Tool::Budget => "BudgetSheet",
            Tool::ExpenseTracker => "ExpenseTrackerSheet",
            Tool::BillPlanner => "BillPlannerSheet",
            Tool::BillReminders => "BillRemindersSheet",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            Tool::Authentication => &[
                "timestamp",
                "first_name",
                "email",
                "last_name",
                "phone_number",
                "language",
                "session_id",
            ],
            Tool::HealthScore => &[
                "timestamp",
                "business_name",
                "monthly_income",
                "monthly_expenses",
                "debt_loan",
                "debt_interest_rate",
                "auto_email",
                "phone_number",
                "first_name",
                "last_name",
                "user_type",
                "email",
                "id",
                "badges",
                "language",
                "score",
            ],
            Tool::NetWorth => &[
                "id",
                "timestamp",
                "first_name",
                "email",
                "language",
                "assets",
                "liabilities",
                "net_worth",
            ],
            Tool::Quiz => &[
                "timestamp",
                "first_name",
                "email",
                "language",
                "q1",
                "q2",
                "q3",
                "q4",
                "q5",
                "q6",
                "q7",
                "q8",
                "q9",
                "q10",
                "quiz_score",
                "personality",
                "auto_email",
            ],
            Tool::EmergencyFund => &[
                "timestamp",
                "first_name",
                "email",
                "language",
                "monthly_expenses",
                "recommended_fund",
                "auto_email",
            ],
            Tool::Budget => &[
                "timestamp",
                "first_name",
                "email",
                "confirm_email",
                "auto_email",
                "language",
                "monthly_income",
                "housing_expenses",
                "food_expenses",
                "transport_expenses",
                "other_expenses",
                "total_expenses",
                "savings",
                "surplus_deficit",
                "rank",
                "total_users",
                "badges",
            ],
            Tool::ExpenseTracker => &[
                "id",
                "email",
                "amount",
                "category",
                "date",
                "description",
                "timestamp",
                "transaction_type",
                "running_balance",
                "first_name",
                "language",
                "auto_email",
            ],
            Tool::BillPlanner => &[
                "timestamp",
                "first_name",
                "email",
                "language",
                "description",
                "amount",
                "due_date",
                "category",
                "recurrence",
                "status",
                "auto_email",
            ],
            Tool::BillReminders => &[
                "timestamp",
                "bill_timestamp",
                "email",
                "reminder_date",
                "status",
            ],
        }
    }

    /// Whether a submission replaces the user's existing row.
    ///
    /// Profile-style tools keep one current row per email. Ledgers (budgets,
    /// transactions, bills, reminders) keep one row per entry and only match
    /// on the entry key.
    pub fn matches_by_email(&self) -> bool {
        matches!(
            self,
            Tool::Authentication
                | Tool::HealthScore
                | Tool::NetWorth
                | Tool::Quiz
                | Tool::EmergencyFund
        )
    }

    /// Spreadsheet column letter of the last header (A..Z)
    pub fn last_column(&self) -> char {
        column_letter(self.headers().len())
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

/// 1-based column index to its letter; worksheets never exceed 26 columns
pub fn column_letter(index: usize) -> char {
    (b'A' + (index.clamp(1, 26) - 1) as u8) as char
}

/// A worksheet row keyed by header name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(HashMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Record(HashMap::new())
    }

    /// Zip a raw row with the header row, padding short rows with empty cells
    pub fn from_row(headers: &[String], row: &[String]) -> Self {
        let map = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.is_empty())
            .map(|(i, header)| (header.clone(), row.get(i).cloned().unwrap_or_default()))
            .collect();
        Record(map)
    }

    /// Cell text, empty when the column is absent
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn number(&self, key: &str) -> f64 {
        parse_number(self.get(key))
    }

    /// Checkbox cells are stored as `True`/`False`
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).eq_ignore_ascii_case("true")
    }

    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Row key: `id`, else `timestamp`, else `bill_timestamp`
    pub fn key(&self) -> Option<&str> {
        ["id", "timestamp", "bill_timestamp"]
            .iter()
            .map(|field| self.get(field))
            .find(|value| !value.is_empty())
    }

    /// Whether any of the key columns equals `id`
    pub fn has_key(&self, id: &str) -> bool {
        !id.is_empty()
            && ["id", "timestamp", "bill_timestamp"]
                .iter()
                .any(|field| self.get(field) == id)
    }

    /// Overlay `other` onto this record, optionally restricted to some fields
    pub fn merge(&mut self, other: &Record, only_fields: Option<&[&str]>) {
        match only_fields {
            Some(fields) => {
                for field in fields {
                    if let Some(value) = other.0.get(*field) {
                        self.0.insert(field.to_string(), value.clone());
                    }
                }
            }
            None => {
                for (key, value) in &other.0 {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Cells in header order
    pub fn to_row(&self, headers: &[&str]) -> Vec<String> {
        headers.iter().map(|h| self.get(h).to_string()).collect()
    }
}

impl<const N: usize> From<[(&str, String); N]> for Record {
    fn from(pairs: [(&str, String); N]) -> Self {
        Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

/// Parse a cell as a number, tolerating thousands separators; 0 when invalid
///
/// # Examples
/// ```
/// use ficore::worksheet::parse_number;
///
/// assert_eq!(parse_number("150,000"), 150000.0);
/// assert_eq!(parse_number("abc"), 0.0);
/// ```
pub fn parse_number(value: &str) -> f64 {
    value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Render a number the way cells store it (no trailing `.0`)
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", (value * 100.0).round() / 100.0)
    }
}

/// Checkbox value as stored in a cell
pub fn format_flag(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(tool: Tool) -> Vec<String> {
        tool.headers().iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_headers_fit_in_single_letter_columns() {
        for tool in Tool::ALL {
            assert!(tool.headers().len() <= 26, "{} has too many columns", tool);
        }
        assert_eq!(Tool::HealthScore.last_column(), 'P');
        assert_eq!(Tool::BillReminders.last_column(), 'E');
    }

    #[test]
    fn test_short_rows_are_padded() {
        let row = vec!["2025-01-01 10:00:00".to_string(), "bill-1".to_string()];
        let record = Record::from_row(&headers(Tool::BillReminders), &row);
        assert_eq!(record.get("bill_timestamp"), "bill-1");
        assert_eq!(record.get("status"), "");
        assert!(record.contains("status"));
    }

    #[test]
    fn test_key_prefers_id() {
        let record = Record::new().with("timestamp", "t1").with("id", "abc");
        assert_eq!(record.key(), Some("abc"));

        let record = Record::new().with("id", "").with("timestamp", "t1");
        assert_eq!(record.key(), Some("t1"));
        assert!(record.has_key("t1"));
        assert!(!record.has_key(""));
    }

    #[test]
    fn test_merge_only_fields() {
        let mut stored = Record::new().with("amount", "10").with("running_balance", "0");
        let update = Record::new().with("amount", "99").with("running_balance", "40");
        stored.merge(&update, Some(&["running_balance"]));
        assert_eq!(stored.get("amount"), "10");
        assert_eq!(stored.get("running_balance"), "40");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(150000.0), "150000");
        assert_eq!(format_number(12.346), "12.35");
        assert_eq!(format_number(-3.5), "-3.5");
        assert_eq!(parse_number(" 1,234.5 "), 1234.5);
    }

    #[test]
    fn test_to_row_follows_header_order() {
        let record = Record::new().with("status", "Pending").with("email", "a@b.co");
        let row = record.to_row(Tool::BillReminders.headers());
        assert_eq!(row, vec!["", "", "a@b.co", "", "Pending"]);
    }
}
