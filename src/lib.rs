/*!
# Ficore Africa

Personal finance tools for individuals and small businesses, served as a
bilingual (English/Hausa) web application.

## Overview

Every tool is a form. A submission is validated, computed, stored as a row
of a spreadsheet worksheet and answered with a result page, charts and,
when asked for, an email. The email typed into a form identifies the user
for the rest of the browser session.

## Architecture

### Web Layer
- **Technologies**: Rust, axum, handlebars
- **Key Components**:
  - Router and shared state - `app`
  - Sessions, flash messages, login and language switching - `login`
  - Form handlers for the assessments - `assessments`
  - Form handlers and dashboards for the ledgers - `planners`
  - Templates and the notification emails - `pages`
  - SVG charts - `graph`

### Domain Layer
- Form definitions and validation - `forms`
- Financial calculations, badges and advice - `calculators`
- Bill schedules and reminders - `schedule`
- Translations - `i18n`

### Data Persistence Layer
- Worksheet schemas and the record type - `worksheet`
- Record operations over any table backend - `store`
- Backends: Google Sheets (`sheets`) or local JSON files (`local_store`)

### Background Work
- Email queue with retries and the reminder poller - `notify`, `mailer`

## Tools

- Financial health score
- Net worth calculator
- Financial personality quiz
- Emergency fund calculator
- Budget planner and budget dashboard
- Expense tracker and its dashboard
- Bill planner, bill schedule and reminders

## Routes

- `/index`, `/login`, `/logout`, `/change_language`
- `/health_score_form`, `/net_worth_form`, `/quiz_form`, `/emergency_fund_form`
- `/budget_form`, `/expense_tracker_form`, `/bill_planner_form`
- `/budget_dashboard/{email}`, `/expense_tracker_dashboard/{email}`, `/bill_dashboard/{email}`
- `/update_bill_status/{timestamp}`
- `/delete_expense/{id}`, `/delete_bill/{timestamp}`, `/delete_budget/{timestamp}`
*/

pub mod cache;
pub mod calculators;
pub mod config;
pub mod error;
pub mod forms;
pub mod i18n;
pub mod local_store;
pub mod schedule;
pub mod store;
pub mod worksheet;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod assessments;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod mailer;
#[cfg(feature = "web")]
pub mod notify;
#[cfg(feature = "web")]
pub mod pages;
#[cfg(feature = "web")]
pub mod planners;
#[cfg(feature = "web")]
pub mod sheets;

pub use error::{FicoreError, Result};
pub use worksheet::{Record, Tool};
