//! Bill planner: recurring bill expansion and reminder bookkeeping
//!
//! Recurrences use fixed day steps (a "month" is 30 days, a "year" 365), so
//! an occurrence is simply `due_date + n * step`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use serde::Serialize;

use crate::error::{FicoreError, Result};
use crate::i18n::Language;
use crate::store::Worksheets;
use crate::worksheet::{Record, TIMESTAMP_FORMAT, Tool, now_timestamp};

/// Date format of generated occurrences
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Years a user supplied date may fall in
pub const YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Longest window a schedule may cover
pub const MAX_SCHEDULE_DAYS: i64 = 3660;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub const ALL: [Recurrence; 5] = [
        Recurrence::None,
        Recurrence::Daily,
        Recurrence::Weekly,
        Recurrence::Monthly,
        Recurrence::Yearly,
    ];

    /// Unknown values are treated as a one-off bill
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Daily" => Recurrence::Daily,
            "Weekly" => Recurrence::Weekly,
            "Monthly" => Recurrence::Monthly,
            "Yearly" => Recurrence::Yearly,
            _ => Recurrence::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "None",
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::Monthly => "Monthly",
            Recurrence::Yearly => "Yearly",
        }
    }

    /// Distance between two occurrences; `None` for one-off bills
    pub fn step(&self) -> Option<Duration> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(Duration::days(1)),
            Recurrence::Weekly => Some(Duration::days(7)),
            Recurrence::Monthly => Some(Duration::days(30)),
            Recurrence::Yearly => Some(Duration::days(365)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BillStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

impl BillStatus {
    pub const ALL: [BillStatus; 3] = [BillStatus::Pending, BillStatus::Paid, BillStatus::Overdue];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Pending" => Some(BillStatus::Pending),
            "Paid" => Some(BillStatus::Paid),
            "Overdue" => Some(BillStatus::Overdue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "Pending",
            BillStatus::Paid => "Paid",
            BillStatus::Overdue => "Overdue",
        }
    }
}

/// A bill planner row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bill {
    pub timestamp: String,
    pub email: String,
    pub first_name: String,
    pub language: Language,
    pub description: String,
    pub amount: f64,
    pub due_date: String,
    pub category: String,
    pub recurrence: Recurrence,
    pub status: BillStatus,
    pub auto_email: bool,
}

impl Bill {
    /// Read a bill row; blank cells fall back to the planner defaults
    pub fn from_record(record: &Record) -> Self {
        let category = match record.get("category") {
            "" => "Other",
            other => other,
        };
        Bill {
            timestamp: record.get("timestamp").to_string(),
            email: record.get("email").to_string(),
            first_name: record.get("first_name").to_string(),
            language: Language::parse_or_default(record.get("language")),
            description: record.get("description").to_string(),
            amount: record.number("amount"),
            due_date: record.get("due_date").to_string(),
            category: category.to_string(),
            recurrence: Recurrence::parse(record.get("recurrence")),
            status: BillStatus::parse(record.get("status")).unwrap_or_default(),
            auto_email: record.flag("auto_email"),
        }
    }
}

/// Parse a user supplied date
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY/MM/DD` and `DD-MM-YYYY`.
/// Dates without a time are midnight. Years outside [`YEARS`] are rejected.
///
/// # Examples
/// ```
/// use ficore::schedule::parse_date;
///
/// assert!(parse_date("2025-06-01").is_ok());
/// assert!(parse_date("01-06-2025").is_ok());
/// assert!(parse_date("next tuesday").is_err());
/// assert!(parse_date("+262142-12-30").is_err());
/// ```
pub fn parse_date(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    let parsed = [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            [DATE_FORMAT, "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        });
    match parsed {
        Some(datetime) if YEARS.contains(&datetime.year()) => Ok(datetime),
        _ => Err(FicoreError::InvalidDate(value.to_string())),
    }
}

fn shift(date: NaiveDateTime, by: Duration) -> Result<NaiveDateTime> {
    date.checked_add_signed(by)
        .ok_or_else(|| FicoreError::InvalidDate(date.format(TIMESTAMP_FORMAT).to_string()))
}

/// Occurrences of pending bills falling inside `[start, end]`, sorted by due date
///
/// One-off bills are kept as they are. Recurring bills are stepped forward
/// from their due date and every occurrence inside the window is emitted
/// with its own `due_date`. Windows longer than [`MAX_SCHEDULE_DAYS`] are
/// rejected.
pub fn generate_bill_schedule(bills: &[Bill], start: &str, end: &str) -> Result<Vec<Bill>> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if (end - start).num_days() > MAX_SCHEDULE_DAYS {
        return Err(FicoreError::InvalidDate(format!(
            "{} to {}",
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        )));
    }

    let mut schedule: Vec<(NaiveDateTime, Bill)> = Vec::new();
    for bill in bills.iter().filter(|b| b.status == BillStatus::Pending) {
        let due = parse_date(&bill.due_date)?;
        match bill.recurrence.step() {
            None => {
                if start <= due && due <= end {
                    schedule.push((due, bill.clone()));
                }
            }
            Some(step) => {
                // jump straight to the first occurrence inside the window
                let mut current = due;
                if current < start {
                    let behind = (start - current).num_days();
                    let steps = (behind + step.num_days() - 1) / step.num_days();
                    current = shift(current, step * steps as i32)?;
                }
                while current <= end {
                    if current >= start {
                        let mut occurrence = bill.clone();
                        occurrence.due_date = current.format(DATE_FORMAT).to_string();
                        schedule.push((current, occurrence));
                    }
                    current = shift(current, step)?;
                }
            }
        }
    }

    schedule.sort_by_key(|(due, _)| *due);
    Ok(schedule.into_iter().map(|(_, bill)| bill).collect())
}

/// Reminder row for a new bill: one day before it is due
///
/// Returns `Ok(None)` when that moment has already passed.
pub fn reminder_for(bill: &Record, now: NaiveDateTime) -> Result<Option<Record>> {
    let due = parse_date(bill.get("due_date"))?;
    let reminder_date = shift(due, Duration::days(-1))?;
    if reminder_date <= now {
        return Ok(None);
    }
    Ok(Some(
        Record::new()
            .with("timestamp", now.format(TIMESTAMP_FORMAT))
            .with("bill_timestamp", bill.get("timestamp"))
            .with("email", bill.get("email"))
            .with("reminder_date", reminder_date.format(TIMESTAMP_FORMAT))
            .with("status", "Pending"),
    ))
}

/// Store the reminder for a bill; `Ok(false)` when it would already be late
pub async fn schedule_bill_reminder(sheets: &Worksheets, bill: &Record) -> Result<bool> {
    let now = chrono::Local::now().naive_local();
    match reminder_for(bill, now)? {
        Some(reminder) => {
            sheets
                .update_or_append(&reminder, Tool::BillReminders, None)
                .await?;
            info!("Scheduled reminder for bill {}", bill.get("timestamp"));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Hand every bill whose reminder is due to `send`, returning how many were sent
///
/// A reminder is marked sent only once `send` succeeds; after a failure it
/// stays pending and is retried on the next check. A reminder whose bill is
/// gone or no longer pending is marked sent without calling `send`.
/// Unparseable reminder dates count as due.
pub async fn check_bill_reminders<F>(sheets: &Worksheets, now: NaiveDateTime, mut send: F) -> Result<usize>
where
    F: FnMut(&Bill) -> Result<()>,
{
    let mut sent = 0;

    for mut reminder in sheets.get_all_records(Tool::BillReminders).await? {
        if reminder.get("status") != "Pending" {
            continue;
        }
        let reminder_date = parse_date(reminder.get("reminder_date")).unwrap_or_else(|_| {
            warn!("Reminder {} has no valid date", reminder.get("timestamp"));
            NaiveDateTime::MIN
        });
        if reminder_date > now {
            continue;
        }

        let bill = sheets
            .get_user_record(reminder.get("bill_timestamp"), reminder.get("email"), Tool::BillPlanner)
            .await?
            .map(|bill| Bill::from_record(&bill))
            .filter(|bill| bill.status == BillStatus::Pending);
        if let Some(bill) = bill {
            if let Err(e) = send(&bill) {
                error!("Error sending bill reminder for {}: {}", bill.timestamp, e);
                continue;
            }
            sent += 1;
        }

        reminder.set("status", "Sent");
        sheets
            .update_or_append(&reminder, Tool::BillReminders, None)
            .await?;
    }

    Ok(sent)
}

/// A bill row as first stored by the planner form
pub fn new_bill_record(timestamp: Option<&str>) -> Record {
    let timestamp = match timestamp {
        Some(ts) if !ts.is_empty() => ts.to_string(),
        _ => now_timestamp(),
    };
    Record::new()
        .with("timestamp", timestamp)
        .with("status", BillStatus::Pending.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::LocalStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn bill(due: &str, recurrence: Recurrence, status: BillStatus) -> Bill {
        Bill {
            timestamp: format!("ts-{}", due),
            email: "a@b.co".to_string(),
            first_name: "Ada".to_string(),
            language: Language::English,
            description: "Rent".to_string(),
            amount: 100.0,
            due_date: due.to_string(),
            category: "Housing".to_string(),
            recurrence,
            status,
            auto_email: false,
        }
    }

    fn at(value: &str) -> NaiveDateTime {
        parse_date(value).unwrap()
    }

    #[test]
    fn test_date_formats() {
        let expected = at("2025-06-01");
        assert_eq!(at("2025/06/01"), expected);
        assert_eq!(at("01-06-2025"), expected);
        assert_eq!(at("2025-06-01 00:00:00"), expected);
        assert!(matches!(parse_date(""), Err(FicoreError::InvalidDate(_))));
    }

    #[test]
    fn test_out_of_range_years_rejected() {
        for value in ["+262142-12-30", "-262143-01-01", "1899-12-31", "+10000-01-01"] {
            assert!(
                matches!(parse_date(value), Err(FicoreError::InvalidDate(_))),
                "{}",
                value
            );
        }
        assert!(parse_date("1900-01-01").is_ok());
        assert!(parse_date("9999-12-31").is_ok());
    }

    #[test]
    fn test_extreme_dates_do_not_panic() {
        let bills = vec![bill("2025-01-01", Recurrence::Daily, BillStatus::Pending)];
        assert!(generate_bill_schedule(&bills, "2025-01-01", "+262142-12-31").is_err());
        assert!(generate_bill_schedule(&bills, "1900-01-01", "9999-12-31").is_err());

        let late = vec![bill("9999-12-30", Recurrence::Yearly, BillStatus::Pending)];
        let schedule = generate_bill_schedule(&late, "9999-01-01", "9999-12-31").unwrap();
        assert_eq!(schedule.len(), 1);

        let record = Record::new()
            .with("timestamp", "2025-06-01 08:00:00")
            .with("due_date", "-262143-01-01");
        assert!(reminder_for(&record, at("2025-06-01 08:00:00")).is_err());
    }

    #[test]
    fn test_old_daily_bill_jumps_to_window() {
        let bills = vec![bill("1990-03-15", Recurrence::Daily, BillStatus::Pending)];
        let schedule = generate_bill_schedule(&bills, "2025-06-01", "2025-06-03").unwrap();
        let dates: Vec<&str> = schedule.iter().map(|b| b.due_date.as_str()).collect();
        assert_eq!(dates, vec!["2025-06-01", "2025-06-02", "2025-06-03"]);
    }

    #[test]
    fn test_one_off_bills_inside_window() {
        let bills = vec![
            bill("2025-06-10", Recurrence::None, BillStatus::Pending),
            bill("2025-08-10", Recurrence::None, BillStatus::Pending),
            bill("2025-06-05", Recurrence::None, BillStatus::Paid),
        ];
        let schedule = generate_bill_schedule(&bills, "2025-06-01", "2025-06-30").unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].due_date, "2025-06-10");
    }

    #[test]
    fn test_weekly_bill_expands() {
        let bills = vec![bill("2025-05-20", Recurrence::Weekly, BillStatus::Pending)];
        let schedule = generate_bill_schedule(&bills, "2025-06-01", "2025-06-30").unwrap();
        let dates: Vec<&str> = schedule.iter().map(|b| b.due_date.as_str()).collect();
        assert_eq!(dates, vec!["2025-06-03", "2025-06-10", "2025-06-17", "2025-06-24"]);
    }

    #[test]
    fn test_monthly_is_thirty_days_and_sorted() {
        let bills = vec![
            bill("2025-01-31", Recurrence::Monthly, BillStatus::Pending),
            bill("2025-03-01", Recurrence::None, BillStatus::Pending),
        ];
        let schedule = generate_bill_schedule(&bills, "2025-01-01", "2025-03-31").unwrap();
        let dates: Vec<&str> = schedule.iter().map(|b| b.due_date.as_str()).collect();
        assert_eq!(dates, vec!["2025-01-31", "2025-03-01", "2025-03-02"]);
    }

    #[test]
    fn test_bad_due_date_fails_schedule() {
        let bills = vec![bill("someday", Recurrence::None, BillStatus::Pending)];
        assert!(generate_bill_schedule(&bills, "2025-01-01", "2025-12-31").is_err());
    }

    #[test]
    fn test_reminder_day_before_due() {
        let record = Record::new()
            .with("timestamp", "2025-06-01 08:00:00")
            .with("email", "a@b.co")
            .with("due_date", "2025-06-10");
        let reminder = reminder_for(&record, at("2025-06-01 08:00:00")).unwrap().unwrap();
        assert_eq!(reminder.get("reminder_date"), "2025-06-09 00:00:00");
        assert_eq!(reminder.get("bill_timestamp"), "2025-06-01 08:00:00");
        assert_eq!(reminder.get("status"), "Pending");

        assert!(reminder_for(&record, at("2025-06-09 12:00:00")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_reminders_are_marked_sent() {
        let dir = TempDir::new().unwrap();
        let sheets = Worksheets::new(Arc::new(LocalStore::open(dir.path()).unwrap()));

        let pending = Record::new()
            .with("timestamp", "2025-06-01 08:00:00")
            .with("email", "a@b.co")
            .with("description", "Electricity")
            .with("due_date", "2025-06-10")
            .with("status", "Pending");
        let paid = Record::new()
            .with("timestamp", "2025-06-01 09:00:00")
            .with("email", "a@b.co")
            .with("due_date", "2025-06-10")
            .with("status", "Paid");
        for record in [&pending, &paid] {
            sheets.update_or_append(record, Tool::BillPlanner, None).await.unwrap();
            let reminder = reminder_for(record, at("2025-06-01 00:00:00")).unwrap().unwrap();
            let reminder = reminder.with("timestamp", format!("r-{}", record.get("timestamp")));
            sheets
                .update_or_append(&reminder, Tool::BillReminders, None)
                .await
                .unwrap();
        }

        let mut due = Vec::new();
        let early = check_bill_reminders(&sheets, at("2025-06-05"), |bill| {
            due.push(bill.clone());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(early, 0);

        let sent = check_bill_reminders(&sheets, at("2025-06-09 06:00:00"), |bill| {
            due.push(bill.clone());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(sent, 1);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].description, "Electricity");

        let reminders = sheets.get_all_records(Tool::BillReminders).await.unwrap();
        assert!(reminders.iter().all(|r| r.get("status") == "Sent"));

        let again = check_bill_reminders(&sheets, at("2025-06-09 06:00:00"), |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_reminder_pending() {
        let dir = TempDir::new().unwrap();
        let sheets = Worksheets::new(Arc::new(LocalStore::open(dir.path()).unwrap()));
        let bill = Record::new()
            .with("timestamp", "2025-06-01 08:00:00")
            .with("email", "a@b.co")
            .with("description", "Water")
            .with("due_date", "2025-06-10")
            .with("status", "Pending");
        sheets.update_or_append(&bill, Tool::BillPlanner, None).await.unwrap();
        let reminder = reminder_for(&bill, at("2025-06-01 08:00:00")).unwrap().unwrap();
        sheets
            .update_or_append(&reminder, Tool::BillReminders, None)
            .await
            .unwrap();

        let now = at("2025-06-09 06:00:00");
        let failed = check_bill_reminders(&sheets, now, |_| {
            Err(FicoreError::Mail("queue closed".to_string()))
        })
        .await
        .unwrap();
        assert_eq!(failed, 0);
        let reminders = sheets.get_all_records(Tool::BillReminders).await.unwrap();
        assert_eq!(reminders[0].get("status"), "Pending");

        assert_eq!(check_bill_reminders(&sheets, now, |_| Ok(())).await.unwrap(), 1);
        let reminders = sheets.get_all_records(Tool::BillReminders).await.unwrap();
        assert_eq!(reminders[0].get("status"), "Sent");
    }
}
