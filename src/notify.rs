#![cfg(feature = "web")]
//! Background email queue and the bill reminder poller

use chrono::{Local, NaiveDateTime};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Args;
use crate::error::{FicoreError, Result};
use crate::mailer::{Email, MailTransport, Mailer};
use crate::pages::Pages;
use crate::schedule::check_bill_reminders;
use crate::store::Worksheets;

/// Handle to the email queue; cheap to clone
///
/// Each queued email is delivered in its own task. A failed delivery is
/// retried after a fixed delay, up to the configured number of retries, and
/// then dropped with an error log.
#[derive(Clone)]
pub struct Notifier {
    queue: Option<mpsc::UnboundedSender<Email>>,
}

impl Notifier {
    /// A notifier that drops every email with a warning
    pub fn disabled() -> Self {
        Notifier { queue: None }
    }

    /// Spawn the queue worker; must be called inside a tokio runtime
    pub fn start(transport: Arc<dyn MailTransport>, retry_delay: Duration, max_retries: u32) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Email>();
        tokio::spawn(async move {
            while let Some(email) = receiver.recv().await {
                tokio::spawn(deliver(transport.clone(), email, retry_delay, max_retries));
            }
            info!("Email queue closed");
        });
        Notifier {
            queue: Some(sender),
        }
    }

    /// SMTP-backed notifier, or a disabled one when mail is not configured
    pub fn from_config(config: &Args) -> Self {
        if !config.mail_enabled() {
            warn!("SMTP_PASSWORD not set; email notifications are disabled");
            return Notifier::disabled();
        }
        match Mailer::new(config) {
            Ok(mailer) => Notifier::start(
                Arc::new(mailer),
                config.mail_retry_delay(),
                config.mail_max_retries,
            ),
            Err(e) => {
                error!("Failed to set up SMTP transport, email disabled: {}", e);
                Notifier::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Hand an email to the background worker
    pub fn queue(&self, email: Email) -> Result<()> {
        let Some(queue) = &self.queue else {
            warn!(
                "Email functionality is disabled. Skipping '{}' to {}",
                email.subject, email.to
            );
            return Ok(());
        };
        queue
            .send(email)
            .map_err(|_| FicoreError::Mail("email queue is closed".to_string()))
    }
}

async fn deliver(transport: Arc<dyn MailTransport>, email: Email, retry_delay: Duration, max_retries: u32) {
    let email = Arc::new(email);
    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(retry_delay).await;
        }
        let transport = transport.clone();
        let job = email.clone();
        let sent = tokio::task::spawn_blocking(move || transport.send(&job))
            .await
            .unwrap_or_else(|e| Err(FicoreError::Mail(e.to_string())));
        match sent {
            Ok(()) => return,
            Err(e) => error!(
                "SMTP error sending '{}' to {} (attempt {}): {}",
                email.subject,
                email.to,
                attempt + 1,
                e
            ),
        }
    }
    error!("Giving up on email '{}' to {}", email.subject, email.to);
}

/// Queue a reminder for every bill whose reminder is due, returning how many
///
/// A reminder that cannot be rendered or queued stays pending for the next run.
pub async fn send_due_reminders(
    sheets: &Worksheets,
    pages: &Pages,
    notifier: &Notifier,
    now: NaiveDateTime,
) -> Result<usize> {
    check_bill_reminders(sheets, now, |bill| {
        notifier.queue(pages.bill_reminder_email(bill)?)
    })
    .await
}

/// Check the reminders every `interval` until the runtime shuts down
pub fn spawn_reminder_poller(
    sheets: Worksheets,
    pages: Arc<Pages>,
    notifier: Notifier,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            match send_due_reminders(&sheets, &pages, &notifier, now).await {
                Ok(0) => {}
                Ok(count) => info!("Queued {} bill reminder(s)", count),
                Err(e) => error!("Error checking bill reminders: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::LocalStore;
    use crate::schedule::parse_date;
    use crate::worksheet::{Record, Tool};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fails the first `failures` sends, then records every email
    struct FlakyTransport {
        failures: usize,
        attempts: AtomicUsize,
        sent: Mutex<Vec<Email>>,
    }

    impl FlakyTransport {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(FlakyTransport {
                failures,
                attempts: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl MailTransport for FlakyTransport {
        fn send(&self, email: &Email) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(FicoreError::Mail("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn email() -> Email {
        Email {
            to: "amina@example.com".to_string(),
            subject: "Budget Plan".to_string(),
            html: "<p>hi</p>".to_string(),
        }
    }

    async fn wait_for(transport: &FlakyTransport, attempts: usize) {
        for _ in 0..200 {
            if transport.attempts.load(Ordering::SeqCst) >= attempts {
                tokio::time::sleep(Duration::from_millis(20)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_delivers_after_one_retry() {
        let transport = FlakyTransport::new(1);
        let notifier = Notifier::start(transport.clone(), Duration::from_millis(10), 1);
        notifier.queue(email()).unwrap();

        wait_for(&transport, 2).await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(transport.sent(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let transport = FlakyTransport::new(5);
        let notifier = Notifier::start(transport.clone(), Duration::from_millis(10), 1);
        notifier.queue(email()).unwrap();

        wait_for(&transport, 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(transport.sent(), 0);
    }

    #[test]
    fn test_disabled_notifier_skips() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        assert!(notifier.queue(email()).is_ok());
    }

    #[tokio::test]
    async fn test_due_reminders_are_queued_once() {
        let dir = TempDir::new().unwrap();
        let sheets = Worksheets::new(Arc::new(LocalStore::open(dir.path()).unwrap()));
        let bill = Record::new()
            .with("timestamp", "2025-06-01 10:00:00")
            .with("first_name", "Amina")
            .with("email", "amina@example.com")
            .with("language", "English")
            .with("description", "Rent")
            .with("amount", 50000)
            .with("due_date", "2025-06-10")
            .with("status", "Pending");
        sheets.update_or_append(&bill, Tool::BillPlanner, None).await.unwrap();
        let reminder = Record::new()
            .with("timestamp", "2025-06-01 10:00:01")
            .with("bill_timestamp", "2025-06-01 10:00:00")
            .with("email", "amina@example.com")
            .with("reminder_date", "2025-06-09 00:00:00")
            .with("status", "Pending");
        sheets
            .update_or_append(&reminder, Tool::BillReminders, None)
            .await
            .unwrap();

        let transport = FlakyTransport::new(0);
        let notifier = Notifier::start(transport.clone(), Duration::from_millis(10), 1);
        let pages = Pages::new().unwrap();
        let now = parse_date("2025-06-09 08:00:00").unwrap();

        assert_eq!(send_due_reminders(&sheets, &pages, &notifier, now).await.unwrap(), 1);
        assert_eq!(send_due_reminders(&sheets, &pages, &notifier, now).await.unwrap(), 0);

        wait_for(&transport, 1).await;
        assert_eq!(transport.sent(), 1);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Reminder: Rent Due Soon");
    }

    #[tokio::test]
    async fn test_closed_queue_leaves_reminder_pending() {
        let dir = TempDir::new().unwrap();
        let sheets = Worksheets::new(Arc::new(LocalStore::open(dir.path()).unwrap()));
        let bill = Record::new()
            .with("timestamp", "2025-06-01 10:00:00")
            .with("first_name", "Bello")
            .with("email", "bello@example.com")
            .with("language", "English")
            .with("description", "Electricity")
            .with("amount", 8000)
            .with("due_date", "2025-06-10")
            .with("status", "Pending");
        sheets.update_or_append(&bill, Tool::BillPlanner, None).await.unwrap();
        let reminder = Record::new()
            .with("timestamp", "2025-06-01 10:00:01")
            .with("bill_timestamp", "2025-06-01 10:00:00")
            .with("email", "bello@example.com")
            .with("reminder_date", "2025-06-09 00:00:00")
            .with("status", "Pending");
        sheets
            .update_or_append(&reminder, Tool::BillReminders, None)
            .await
            .unwrap();

        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let closed = Notifier {
            queue: Some(sender),
        };
        let pages = Pages::new().unwrap();
        let now = parse_date("2025-06-09 08:00:00").unwrap();

        assert_eq!(send_due_reminders(&sheets, &pages, &closed, now).await.unwrap(), 0);
        let reminders = sheets.get_all_records(Tool::BillReminders).await.unwrap();
        assert_eq!(reminders[0].get("status"), "Pending");

        let transport = FlakyTransport::new(0);
        let notifier = Notifier::start(transport.clone(), Duration::from_millis(10), 1);
        assert_eq!(send_due_reminders(&sheets, &pages, &notifier, now).await.unwrap(), 1);
        let reminders = sheets.get_all_records(Tool::BillReminders).await.unwrap();
        assert_eq!(reminders[0].get("status"), "Sent");
        wait_for(&transport, 1).await;
    }
}
