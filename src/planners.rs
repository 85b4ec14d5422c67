#![cfg(feature = "web")]
//! Ledger tools: budgets, the expense tracker and the bill planner
//!
//! Unlike the assessments these keep one row per entry. Every entry can be
//! edited through `?record_id=` on its form and is listed on a dashboard
//! reachable only by its owner.

use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Redirect, Response},
};
use chrono::{Duration, Local};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::{
    AppState, FormPage, RecordQuery, accept_form, check_owner, owned_record, render_page,
    send_email, show_form,
};
use crate::calculators::{
    BudgetInput, Transaction, assign_rank, format_money, health_badges, running_balance,
    summarize_expenses,
};
use crate::forms::FormData;
use crate::graph::{budget_chart, cached_fragment, expense_fragment};
use crate::i18n::translate;
use crate::login::Visit;
use crate::pages::{EmailBody, Line};
use crate::schedule::{
    Bill, BillStatus, DATE_FORMAT, generate_bill_schedule, new_bill_record,
    schedule_bill_reminder,
};
use crate::worksheet::{Record, Tool, format_flag, format_number, now_timestamp};

pub const BUDGET: FormPage = FormPage {
    tool: Tool::Budget,
    title: "Budget Planner",
    action: "/budget_form",
};

pub const EXPENSE_TRACKER: FormPage = FormPage {
    tool: Tool::ExpenseTracker,
    title: "Expense Tracker",
    action: "/expense_tracker_form",
};

pub const BILL_PLANNER: FormPage = FormPage {
    tool: Tool::BillPlanner,
    title: "Bill Planner",
    action: "/bill_planner_form",
};

fn money(value: f64) -> String {
    format!("₦{}", format_money(value))
}

fn budget_input(data: &FormData) -> BudgetInput {
    BudgetInput {
        monthly_income: data.number("monthly_income"),
        housing: data.number("housing_expenses"),
        food: data.number("food_expenses"),
        transport: data.number("transport_expenses"),
        other: data.number("other_expenses"),
    }
}

fn budget_from_record(record: &Record) -> BudgetInput {
    BudgetInput {
        monthly_income: record.number("monthly_income"),
        housing: record.number("housing_expenses"),
        food: record.number("food_expenses"),
        transport: record.number("transport_expenses"),
        other: record.number("other_expenses"),
    }
}

pub async fn budget_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, BUDGET, query).await
}

pub async fn submit_budget(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) = match accept_form(&state, visit, BUDGET, FormData::from(form)).await {
        Ok(accepted) => accepted,
        Err(page) => return page,
    };
    let language = data.language();
    let email = data.get("email").to_string();

    let budget = budget_input(&data);
    let summary = budget.summary();
    let advice = budget.advice(language);
    let badges = health_badges(
        summary.surplus_deficit,
        summary.total_expenses,
        budget.monthly_income,
        language,
    );

    let edited = owned_record(&state, Tool::Budget, data.get("record_id"), &email).await;
    let timestamp = edited
        .as_ref()
        .map(|record| record.get("timestamp").to_string())
        .unwrap_or_else(now_timestamp);

    let (rank, total_users) = match state.sheets.get_all_records(Tool::Budget).await {
        Ok(records) => {
            let others: Vec<f64> = records
                .iter()
                .filter(|record| !(record.has_key(&timestamp) && record.get("email") == email))
                .map(|record| record.number("surplus_deficit"))
                .collect();
            assign_rank(summary.surplus_deficit, &others)
        }
        Err(e) => {
            error!("Error ranking budgets: {}", e);
            visit.flash_tr("error", "Failed to assign rank due to server error");
            (1, 1)
        }
    };

    let record = Record::new()
        .with("timestamp", &timestamp)
        .with("first_name", data.get("first_name"))
        .with("email", &email)
        .with("confirm_email", data.get("confirm_email"))
        .with("auto_email", format_flag(data.checked("auto_email")))
        .with("language", language)
        .with("monthly_income", format_number(budget.monthly_income))
        .with("housing_expenses", format_number(budget.housing))
        .with("food_expenses", format_number(budget.food))
        .with("transport_expenses", format_number(budget.transport))
        .with("other_expenses", format_number(budget.other))
        .with("total_expenses", format_number(summary.total_expenses))
        .with("savings", format_number(summary.savings))
        .with("surplus_deficit", format_number(summary.surplus_deficit))
        .with("rank", rank)
        .with("total_users", total_users)
        .with("badges", serde_json::to_string(&badges).unwrap_or_default());
    if let Err(e) = state.sheets.update_or_append(&record, Tool::Budget, None).await {
        error!("Error saving budget for {}: {}", email, e);
        visit.flash_tr("error", "Failed to save data due to server error");
    }

    let lines = vec![
        Line::new(translate("Total Monthly Income", language), money(budget.monthly_income)),
        Line::new(translate("Total Expenses", language), money(summary.total_expenses)),
        Line::new(translate("Savings", language), money(summary.savings)),
        Line::new(translate("Surplus/Deficit", language), money(summary.surplus_deficit)),
        Line::new(translate("Rank", language), format!("{} / {}", rank, total_users)),
    ];

    send_email(
        &state,
        &visit,
        &data,
        translate("Budget Plan", language),
        &EmailBody {
            language,
            user_name: data.get("first_name").to_string(),
            heading: translate("Budget Plan", language),
            lines: lines.clone(),
            badges: badges.clone(),
            advice: advice.clone(),
        },
    );

    let chart = cached_fragment(&state.charts, &budget_chart(&budget, language), language);

    render_page(
        &state,
        visit,
        "result",
        json!({
            "title": "Budget Planner",
            "lines": lines,
            "advice": advice,
            "badges": badges,
            "charts": [chart],
            "form_url": BUDGET.action,
            "dashboard_url": format!("/budget_dashboard/{}", email),
        }),
    )
}

pub async fn budget_dashboard(
    State(state): State<AppState>,
    visit: Visit,
    Path(email): Path<String>,
) -> Response {
    let visit = match check_owner(visit, &email) {
        Ok(visit) => visit,
        Err(redirect) => return redirect,
    };
    let language = visit.language();

    let records = match state.sheets.get_user_data_by_email(&email, Tool::Budget).await {
        Ok(records) => records,
        Err(e) => {
            error!("Error fetching budgets for {}: {}", email, e);
            visit.flash_tr("error", "Failed to fetch user data due to server error");
            Vec::new()
        }
    };

    let budgets: Vec<Value> = records
        .iter()
        .map(|record| {
            let budget = budget_from_record(record);
            let badges: Vec<String> =
                serde_json::from_str(record.get("badges")).unwrap_or_default();
            json!({
                "timestamp": record.get("timestamp"),
                "monthly_income": budget.monthly_income,
                "total_expenses": record.number("total_expenses"),
                "savings": record.number("savings"),
                "surplus_deficit": record.number("surplus_deficit"),
                "rank": record.get("rank"),
                "total_users": record.get("total_users"),
                "badges": badges,
                "chart": cached_fragment(&state.charts, &budget_chart(&budget, language), language),
            })
        })
        .collect();

    render_page(
        &state,
        visit,
        "budget_dashboard",
        json!({ "title": "Budget Dashboard", "budgets": budgets }),
    )
}

pub async fn expense_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, EXPENSE_TRACKER, query).await
}

/// Store the user's final balance on their latest transaction
async fn update_running_balance(state: &AppState, email: &str) -> crate::error::Result<f64> {
    let transactions: Vec<Transaction> = state
        .sheets
        .get_user_data_by_email(email, Tool::ExpenseTracker)
        .await?
        .iter()
        .map(Transaction::from_record)
        .collect();
    let (balance, latest) = running_balance(&transactions);
    if let Some(latest) = latest {
        let update = Record::new()
            .with("id", &transactions[latest].id)
            .with("email", email)
            .with("running_balance", format_number(balance));
        state
            .sheets
            .update_or_append(&update, Tool::ExpenseTracker, Some(&["running_balance"][..]))
            .await?;
    }
    Ok(balance)
}

pub async fn submit_expense(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) =
        match accept_form(&state, visit, EXPENSE_TRACKER, FormData::from(form)).await {
            Ok(accepted) => accepted,
            Err(page) => return page,
        };
    let language = data.language();
    let email = data.get("email").to_string();

    let edited = owned_record(&state, Tool::ExpenseTracker, data.get("record_id"), &email).await;
    let (id, timestamp) = match &edited {
        Some(record) => (
            record.get("id").to_string(),
            record.get("timestamp").to_string(),
        ),
        None => (Uuid::new_v4().to_string(), now_timestamp()),
    };

    let amount = data.number("amount");
    let record = Record::new()
        .with("id", &id)
        .with("email", &email)
        .with("amount", format_number(amount))
        .with("category", data.get("category"))
        .with("date", data.get("date"))
        .with("description", data.get("description"))
        .with("timestamp", &timestamp)
        .with("transaction_type", data.get("transaction_type"))
        .with("first_name", data.get("first_name"))
        .with("language", language)
        .with("auto_email", format_flag(data.checked("auto_email")));

    if let Err(e) = state
        .sheets
        .update_or_append(&record, Tool::ExpenseTracker, None)
        .await
    {
        error!("Error saving transaction for {}: {}", email, e);
        visit.flash_tr("error", "Failed to save data due to server error");
        return visit.respond(Redirect::to(EXPENSE_TRACKER.action));
    }

    let balance = match update_running_balance(&state, &email).await {
        Ok(balance) => balance,
        Err(e) => {
            error!("Error updating running balance for {}: {}", email, e);
            0.0
        }
    };

    send_email(
        &state,
        &visit,
        &data,
        translate("Expense Tracker Update", language),
        &EmailBody {
            language,
            user_name: data.get("first_name").to_string(),
            heading: translate("Expense Tracker Update", language),
            lines: vec![
                Line::new(translate("Description", language), data.get("description")),
                Line::new(translate("Amount", language), money(amount)),
                Line::new(translate("Category", language), translate(data.get("category"), language)),
                Line::new(
                    translate("Transaction Type", language),
                    translate(data.get("transaction_type"), language),
                ),
                Line::new(translate("Running Balance", language), money(balance)),
            ],
            ..EmailBody::default()
        },
    );

    info!("Saved transaction {} for {}", id, email);
    visit.flash_tr("success", "Transaction added successfully");
    visit.respond(Redirect::to(&format!("/expense_tracker_dashboard/{}", email)))
}

pub async fn expense_dashboard(
    State(state): State<AppState>,
    visit: Visit,
    Path(email): Path<String>,
) -> Response {
    let visit = match check_owner(visit, &email) {
        Ok(visit) => visit,
        Err(redirect) => return redirect,
    };
    let language = visit.language();

    let records = match state
        .sheets
        .get_user_data_by_email(&email, Tool::ExpenseTracker)
        .await
    {
        Ok(records) => records,
        Err(e) => {
            error!("Error fetching transactions for {}: {}", email, e);
            visit.flash_tr("error", "Failed to fetch user data due to server error");
            Vec::new()
        }
    };
    let transactions: Vec<Transaction> = records.iter().map(Transaction::from_record).collect();
    let (balance, _) = running_balance(&transactions);
    let summary = summarize_expenses(&transactions, language);
    let chart = expense_fragment(&state.charts, &summary, language);

    render_page(
        &state,
        visit,
        "expense_dashboard",
        json!({
            "title": "Expense Tracker",
            "summary": summary,
            "running_balance": balance,
            "chart": chart,
            "expenses": transactions,
        }),
    )
}

pub async fn bill_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, BILL_PLANNER, query).await
}

pub async fn submit_bill(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) = match accept_form(&state, visit, BILL_PLANNER, FormData::from(form)).await
    {
        Ok(accepted) => accepted,
        Err(page) => return page,
    };
    let language = data.language();
    let email = data.get("email").to_string();

    let edited = owned_record(&state, Tool::BillPlanner, data.get("record_id"), &email).await;
    let mut record = new_bill_record(edited.as_ref().map(|record| record.get("timestamp")));
    if let Some(previous) = &edited {
        record.set("status", previous.get("status"));
    }
    record
        .set("first_name", data.get("first_name"))
        .set("email", &email)
        .set("language", language)
        .set("description", data.get("description"))
        .set("amount", format_number(data.number("amount")))
        .set("due_date", data.get("due_date"))
        .set("category", data.get("category"))
        .set("recurrence", data.get("recurrence"))
        .set("auto_email", format_flag(data.checked("auto_email")));

    if let Err(e) = state
        .sheets
        .update_or_append(&record, Tool::BillPlanner, None)
        .await
    {
        error!("Error saving bill for {}: {}", email, e);
        visit.flash_tr("error", "Failed to save data due to server error");
        return visit.respond(Redirect::to(BILL_PLANNER.action));
    }

    if data.checked("auto_email") && edited.is_none() {
        match schedule_bill_reminder(&state.sheets, &record).await {
            Ok(true) => {}
            Ok(false) => info!("Bill {} is due too soon for a reminder", record.get("timestamp")),
            Err(e) => {
                error!("Error scheduling reminder for {}: {}", email, e);
                visit.flash_tr("warning", "Failed to schedule bill reminder");
            }
        }
    }

    visit.flash_tr("success", "Bill added successfully");
    visit.respond(Redirect::to(&format!("/bill_dashboard/{}", email)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

pub async fn bill_dashboard(
    State(state): State<AppState>,
    visit: Visit,
    Path(email): Path<String>,
    Query(range): Query<DateRange>,
) -> Response {
    let visit = match check_owner(visit, &email) {
        Ok(visit) => visit,
        Err(redirect) => return redirect,
    };

    let today = Local::now().naive_local();
    let start_date = match range.start_date.trim() {
        "" => (today - Duration::days(30)).format(DATE_FORMAT).to_string(),
        start => start.to_string(),
    };
    let end_date = match range.end_date.trim() {
        "" => (today + Duration::days(30)).format(DATE_FORMAT).to_string(),
        end => end.to_string(),
    };

    let bills: Vec<Bill> = match state
        .sheets
        .get_user_data_by_email(&email, Tool::BillPlanner)
        .await
    {
        Ok(records) => records.iter().map(Bill::from_record).collect(),
        Err(e) => {
            error!("Error fetching bills for {}: {}", email, e);
            visit.flash_tr("error", "Failed to fetch user data due to server error");
            Vec::new()
        }
    };

    let schedule = match generate_bill_schedule(&bills, &start_date, &end_date) {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!("Bill schedule for {} failed: {}", email, e);
            visit.flash_tr("error", "Invalid date format in bill schedule");
            Vec::new()
        }
    };

    let statuses: Vec<&str> = BillStatus::ALL.iter().map(BillStatus::as_str).collect();
    render_page(
        &state,
        visit,
        "bill_dashboard",
        json!({
            "title": "Bill Planner",
            "email": email,
            "start_date": start_date,
            "end_date": end_date,
            "schedule": schedule,
            "bills": bills,
            "statuses": statuses,
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

/// Change a bill's status; only the bill's owner may do so
pub async fn update_bill_status(
    State(state): State<AppState>,
    visit: Visit,
    Path(timestamp): Path<String>,
    Form(form): Form<StatusForm>,
) -> Response {
    let email = visit.user_email().to_string();
    if email.is_empty() {
        visit.flash_tr("error", "Unauthorized access");
        return visit.respond(Redirect::to("/index"));
    }
    let dashboard = format!("/bill_dashboard/{}", email);

    let Some(status) = BillStatus::parse(&form.status) else {
        visit.flash_tr("error", "Invalid status");
        return visit.respond(Redirect::to(&dashboard));
    };

    let bill = match state.sheets.get_user_record(&timestamp, &email, Tool::BillPlanner).await {
        Ok(bill) => bill,
        Err(e) => {
            error!("Error looking up bill {}: {}", timestamp, e);
            None
        }
    };
    let Some(mut bill) = bill else {
        visit.flash_tr("error", "Bill not found or unauthorized");
        return visit.respond(Redirect::to(&dashboard));
    };

    bill.set("status", status.as_str());
    match state
        .sheets
        .update_or_append(&bill, Tool::BillPlanner, Some(&["status"][..]))
        .await
    {
        Ok(_) => {
            info!("Bill {} marked {}", timestamp, status.as_str());
            visit.flash_tr("success", "Bill status updated successfully");
        }
        Err(e) => {
            error!("Error updating bill {}: {}", timestamp, e);
            visit.flash_tr("error", "Failed to save data due to server error");
        }
    }
    visit.respond(Redirect::to(&dashboard))
}

/// Delete one of the session user's rows and go back to `dashboard`
async fn delete_entry(state: &AppState, visit: Visit, tool: Tool, key: &str, dashboard: &str) -> Response {
    let email = visit.user_email().to_string();
    if email.is_empty() {
        visit.flash_tr("error", "Unauthorized access");
        return visit.respond(Redirect::to("/index"));
    }
    match state.sheets.delete_record(key, &email, tool).await {
        Ok(true) => {
            info!("Deleted {} record {} for {}", tool, key, email);
            visit.flash_tr("success", "Record deleted successfully");
        }
        Ok(false) => visit.flash_tr("error", "Record not found"),
        Err(e) => {
            error!("Error deleting {} record {}: {}", tool, key, e);
            visit.flash_tr("error", "Failed to delete record due to server error");
        }
    }
    visit.respond(Redirect::to(&format!("{}/{}", dashboard, email)))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    visit: Visit,
    Path(id): Path<String>,
) -> Response {
    let email = visit.user_email().to_string();
    let response = delete_entry(
        &state,
        visit,
        Tool::ExpenseTracker,
        &id,
        "/expense_tracker_dashboard",
    )
    .await;
    if !email.is_empty() {
        if let Err(e) = update_running_balance(&state, &email).await {
            error!("Error updating running balance for {}: {}", email, e);
        }
    }
    response
}

pub async fn delete_bill(
    State(state): State<AppState>,
    visit: Visit,
    Path(timestamp): Path<String>,
) -> Response {
    delete_entry(&state, visit, Tool::BillPlanner, &timestamp, "/bill_dashboard").await
}

pub async fn delete_budget(
    State(state): State<AppState>,
    visit: Visit,
    Path(timestamp): Path<String>,
) -> Response {
    delete_entry(&state, visit, Tool::Budget, &timestamp, "/budget_dashboard").await
}
