//! Configuration for the Ficore web application
//!
//! CLI arguments and environment variable handling using clap. A `.env` file
//! is honoured by the binary before parsing.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FicoreError, Result};

/// Spreadsheet the production deployment writes to.
pub const DEFAULT_SPREADSHEET_ID: &str = "13hbiMTMRBHo9MHjWwcugngY_aSiuxII67HCf03MiZ8I";

pub const FEEDBACK_FORM_URL: &str =
    "https://forms.gle/1g1FVulyf7ZvvXr7G0q7hAKwbGJMxV4blpjBuqrSjKzQ";
pub const WAITLIST_FORM_URL: &str =
    "https://forms.gle/17e0XYcp-z3hCl0I-j2JkHoKKJrp4PfgujsK8D7uqNxo";
pub const CONSULTANCY_FORM_URL: &str =
    "https://forms.gle/1TKvlT7OTvNS70YNd8DaPpswvqd9y7hKydxKr07gpK9A";

/// Which worksheet backend to persist records in
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// JSON files under `DATA_DIR`
    Local,
    /// Google Sheets through the v4 REST API
    Sheets,
}

/// Ficore Africa personal finance tools
#[derive(Parser, Debug, Clone)]
#[command(name = "ficore")]
#[command(about = "Personal finance calculators backed by a spreadsheet")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Worksheet backend
    #[arg(long, env = "STORE", value_enum, default_value = "local")]
    pub store: StoreKind,

    /// Directory holding the local worksheet files
    #[arg(long, env = "DATA_DIR", default_value = "database")]
    pub data_dir: PathBuf,

    /// Google spreadsheet key
    #[arg(long, env = "SPREADSHEET_ID", default_value = DEFAULT_SPREADSHEET_ID)]
    pub spreadsheet_id: String,

    /// Service-account credentials as a JSON string
    #[arg(long, env = "GOOGLE_CREDENTIALS_JSON", hide_env_values = true)]
    pub google_credentials_json: Option<String>,

    #[arg(long, env = "SMTP_SERVER", default_value = "smtp.gmail.com")]
    pub smtp_server: String,

    #[arg(long, env = "SMTP_PORT", default_value = "587")]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME", default_value = "ficore.ai.africa@gmail.com")]
    pub smtp_username: String,

    /// Email is disabled when no password is configured
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    #[arg(long, env = "MAIL_SENDER", default_value = "Ficore Africa <ficore.ai.africa@gmail.com>")]
    pub mail_sender: String,

    /// Delay before retrying a failed email
    #[arg(long, env = "MAIL_RETRY_DELAY_SECS", default_value = "60")]
    pub mail_retry_delay_secs: u64,

    /// How many times a failed email is retried
    #[arg(long, env = "MAIL_MAX_RETRIES", default_value = "1")]
    pub mail_max_retries: u32,

    /// How often pending bill reminders are checked
    #[arg(long, env = "REMINDER_INTERVAL_SECS", default_value = "60")]
    pub reminder_interval_secs: u64,

    /// Lifetime of memoized chart fragments
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "300")]
    pub cache_ttl_secs: u64,

    /// Lifetime of a browser session
    #[arg(long, env = "SESSION_TTL_SECS", default_value = "86400")]
    pub session_ttl_secs: u64,
}

impl Args {
    /// Check option combinations clap cannot express
    pub fn validate(&self) -> Result<()> {
        if self.store == StoreKind::Sheets && self.google_credentials_json.is_none() {
            return Err(FicoreError::Config(
                "GOOGLE_CREDENTIALS_JSON is required when STORE=sheets".to_string(),
            ));
        }
        if self.reminder_interval_secs == 0 {
            return Err(FicoreError::Config(
                "REMINDER_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(FicoreError::Config(
                "SESSION_TTL_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mail_enabled(&self) -> bool {
        self.smtp_password.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn mail_retry_delay(&self) -> Duration {
        Duration::from_secs(self.mail_retry_delay_secs)
    }
}
