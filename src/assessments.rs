#![cfg(feature = "web")]
//! One-shot assessment tools: health score, net worth, quiz, emergency fund
//!
//! Each tool keeps one current row per email. A submission computes the
//! result, compares it with the other users' rows, saves it and renders the
//! result page with its charts.

use axum::{
    Form,
    extract::{Query, State},
    response::Response,
};
use log::error;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::app::{
    AppState, FormPage, RecordQuery, accept_form, owned_record, render_page, send_email,
    show_form,
};
use crate::calculators::{
    assign_rank, average, average_score, courses, emergency_fund, format_money,
    health_badges, net_worth, net_worth_advice, net_worth_badges, net_worth_percentile,
    quiz_advice, quiz_badges, quiz_results, score_description, tips,
    calculate_health_score, DEFAULT_PERCENTILE,
};
use crate::forms::{FormData, QUIZ_QUESTIONS};
use crate::graph::{
    cached_fragment, emergency_fund_chart, health_score_charts, net_worth_charts, quiz_chart,
};
use crate::i18n::translate;
use crate::login::Visit;
use crate::pages::{EmailBody, Line};
use crate::store::Saved;
use crate::worksheet::{Record, Tool, format_flag, format_number, now_timestamp};

pub const HEALTH_SCORE: FormPage = FormPage {
    tool: Tool::HealthScore,
    title: "Financial Health Score",
    action: "/health_score_form",
};

pub const NET_WORTH: FormPage = FormPage {
    tool: Tool::NetWorth,
    title: "Net Worth Calculator",
    action: "/net_worth_form",
};

pub const QUIZ: FormPage = FormPage {
    tool: Tool::Quiz,
    title: "Financial Personality Quiz",
    action: "/quiz_form",
};

pub const EMERGENCY_FUND: FormPage = FormPage {
    tool: Tool::EmergencyFund,
    title: "Emergency Fund Calculator",
    action: "/emergency_fund_form",
};

/// `column` of every other user's row; failures are logged, flashed and yield `None`
async fn peer_values(
    state: &AppState,
    visit: &Visit,
    tool: Tool,
    column: &str,
    failure_key: &str,
) -> Option<Vec<f64>> {
    let email = visit.user_email();
    match state.sheets.get_all_records(tool).await {
        Ok(records) => Some(
            records
                .iter()
                .filter(|record| record.get("email") != email)
                .filter(|record| !record.get(column).trim().is_empty())
                .map(|record| record.number(column))
                .collect(),
        ),
        Err(e) => {
            error!("Error reading {} for comparison: {}", tool, e);
            visit.flash_tr("error", failure_key);
            None
        }
    }
}

/// Save a result row; a failure is logged and flashed but the result still shows
async fn save(state: &AppState, visit: &Visit, record: &Record, tool: Tool) -> Option<Saved> {
    match state.sheets.update_or_append(record, tool, None).await {
        Ok(saved) => Some(saved),
        Err(e) => {
            error!("Error saving {} record: {}", tool, e);
            visit.flash_tr("error", "Failed to save data due to server error");
            None
        }
    }
}

fn submitted(form: HashMap<String, String>) -> FormData {
    FormData::from(form)
}

/// `column` of the caller's row named by `record_id`, if the caller owns one
async fn edited_key(state: &AppState, data: &FormData, tool: Tool, column: &str) -> Option<String> {
    owned_record(state, tool, data.get("record_id"), data.get("email"))
        .await
        .map(|record| record.get(column).to_string())
        .filter(|key| !key.is_empty())
}

fn money(value: f64) -> String {
    format!("₦{}", format_money(value))
}

pub async fn health_score_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, HEALTH_SCORE, query).await
}

pub async fn submit_health_score(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) = match accept_form(&state, visit, HEALTH_SCORE, submitted(form)).await {
        Ok(accepted) => accepted,
        Err(page) => return page,
    };
    let language = data.language();

    let income = data.number("monthly_income");
    let expenses = data.number("monthly_expenses");
    let debt = data.number("debt_loan");
    let interest_rate = data.number("debt_interest_rate");

    let score = calculate_health_score(income, expenses, debt, interest_rate);
    let description = score_description(score, language);
    let badges = health_badges(score, debt, income, language);

    let peers = peer_values(
        &state,
        &visit,
        Tool::HealthScore,
        "score",
        "Failed to assign rank due to server error",
    )
    .await;
    let (rank, total_users) = match &peers {
        Some(scores) => assign_rank(score, scores),
        None => (1, 1),
    };
    let peer_average = average_score(peers.as_deref().unwrap_or_default());

    let id = edited_key(&state, &data, Tool::HealthScore, "id")
        .await
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let record = Record::new()
        .with("timestamp", now_timestamp())
        .with("business_name", data.get("business_name"))
        .with("monthly_income", format_number(income))
        .with("monthly_expenses", format_number(expenses))
        .with("debt_loan", format_number(debt))
        .with("debt_interest_rate", format_number(interest_rate))
        .with("auto_email", format_flag(data.checked("auto_email")))
        .with("phone_number", data.get("phone_number"))
        .with("first_name", data.get("first_name"))
        .with("last_name", data.get("last_name"))
        .with("user_type", data.get("user_type"))
        .with("email", data.get("email"))
        .with("id", id)
        .with("badges", serde_json::to_string(&badges).unwrap_or_default())
        .with("language", language)
        .with("score", format_number(score));
    save(&state, &visit, &record, Tool::HealthScore).await;

    let lines = vec![
        Line::new(translate("Your Score", language), format_number(score)),
        Line::new(translate("Rank", language), format!("{} / {}", rank, total_users)),
    ];

    send_email(
        &state,
        &visit,
        &data,
        translate("Financial Health Score", language),
        &EmailBody {
            language,
            user_name: data.get("first_name").to_string(),
            heading: translate("Financial Health Score", language),
            lines: lines.clone(),
            badges: badges.clone(),
            advice: description.clone(),
        },
    );

    let (money_chart, comparison_chart) = health_score_charts(income, debt, score, peer_average, language);
    let charts = vec![
        cached_fragment(&state.charts, &money_chart, language),
        cached_fragment(&state.charts, &comparison_chart, language),
    ];

    render_page(
        &state,
        visit,
        "result",
        json!({
            "title": "Financial Health Score",
            "headline": description,
            "lines": lines,
            "badges": badges,
            "charts": charts,
            "form_url": HEALTH_SCORE.action,
        }),
    )
}

pub async fn net_worth_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, NET_WORTH, query).await
}

pub async fn submit_net_worth(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) = match accept_form(&state, visit, NET_WORTH, submitted(form)).await {
        Ok(accepted) => accepted,
        Err(page) => return page,
    };
    let language = data.language();

    let assets = data.number("assets");
    let liabilities = data.number("liabilities");
    let worth = net_worth(assets, liabilities);

    let peers = peer_values(
        &state,
        &visit,
        Tool::NetWorth,
        "net_worth",
        "Failed to assign rank due to server error",
    )
    .await;
    let percentile = peers
        .as_deref()
        .map(|others| net_worth_percentile(worth, others))
        .unwrap_or(DEFAULT_PERCENTILE);
    let average_worth = peers.as_deref().and_then(average).unwrap_or(0.0);

    let advice = net_worth_advice(worth, language);
    let badges = net_worth_badges(worth, language);

    let edited = edited_key(&state, &data, Tool::NetWorth, "id").await;
    let record = Record::new()
        .with("id", edited.clone().unwrap_or_else(|| Uuid::new_v4().to_string()))
        .with("timestamp", now_timestamp())
        .with("first_name", data.get("first_name"))
        .with("email", data.get("email"))
        .with("language", language)
        .with("assets", format_number(assets))
        .with("liabilities", format_number(liabilities))
        .with("net_worth", format_number(worth));
    if save(&state, &visit, &record, Tool::NetWorth).await.is_some() {
        let key = match edited {
            Some(_) => "Net Worth record updated successfully",
            None => "Net Worth calculated successfully",
        };
        visit.flash("success", translate(key, language));
    }

    let (breakdown, comparison) = net_worth_charts(assets, liabilities, worth, average_worth, language);
    let charts = vec![
        cached_fragment(&state.charts, &breakdown, language),
        cached_fragment(&state.charts, &comparison, language),
    ];

    render_page(
        &state,
        visit,
        "result",
        json!({
            "title": "Net Worth Calculator",
            "headline": format!("{}: {}", translate("Your Net Worth", language), money(worth)),
            "lines": [
                Line::new(translate("Total Assets", language), money(assets)),
                Line::new(translate("Total Liabilities", language), money(liabilities)),
                Line::new(translate("Percentile", language), format!("{}%", percentile)),
            ],
            "advice": advice,
            "badges": badges,
            "charts": charts,
            "tips": tips(language),
            "courses": courses(language),
            "form_url": NET_WORTH.action,
        }),
    )
}

pub async fn quiz_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, QUIZ, query).await
}

pub async fn submit_quiz(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) = match accept_form(&state, visit, QUIZ, submitted(form)).await {
        Ok(accepted) => accepted,
        Err(page) => return page,
    };
    let language = data.language();

    let answers: Vec<&str> = QUIZ_QUESTIONS.iter().map(|q| data.get(q)).collect();
    let (score, personality) = quiz_results(&answers);
    let advice = quiz_advice(score, personality, language);
    let badges = quiz_badges(score, language);

    let timestamp = edited_key(&state, &data, Tool::Quiz, "timestamp")
        .await
        .unwrap_or_else(now_timestamp);
    let mut record = Record::new()
        .with("timestamp", timestamp)
        .with("first_name", data.get("first_name"))
        .with("email", data.get("email"))
        .with("language", language)
        .with("quiz_score", score)
        .with("personality", personality.as_str())
        .with("auto_email", format_flag(data.checked("auto_email")));
    for (question, answer) in QUIZ_QUESTIONS.iter().zip(&answers) {
        record.set(question, answer);
    }
    save(&state, &visit, &record, Tool::Quiz).await;

    let lines = vec![
        Line::new(translate("Quiz Score", language), format!("{} / 10", score)),
        Line::new(translate("Personality", language), personality.label(language)),
    ];

    send_email(
        &state,
        &visit,
        &data,
        translate("Financial Quiz Results", language),
        &EmailBody {
            language,
            user_name: data.get("first_name").to_string(),
            heading: translate("Financial Quiz Results", language),
            lines: lines.clone(),
            badges: badges.clone(),
            advice: advice.clone(),
        },
    );

    let chart = cached_fragment(&state.charts, &quiz_chart(score, language), language);

    render_page(
        &state,
        visit,
        "result",
        json!({
            "title": "Financial Personality Quiz",
            "headline": personality.label(language),
            "lines": lines,
            "advice": advice,
            "badges": badges,
            "charts": [chart],
            "form_url": QUIZ.action,
        }),
    )
}

pub async fn emergency_fund_form(
    State(state): State<AppState>,
    visit: Visit,
    Query(query): Query<RecordQuery>,
) -> Response {
    show_form(&state, visit, EMERGENCY_FUND, query).await
}

pub async fn submit_emergency_fund(
    State(state): State<AppState>,
    visit: Visit,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let (visit, data) = match accept_form(&state, visit, EMERGENCY_FUND, submitted(form)).await {
        Ok(accepted) => accepted,
        Err(page) => return page,
    };
    let language = data.language();

    let monthly_expenses = data.number("monthly_expenses");
    let recommended = emergency_fund(monthly_expenses);

    let timestamp = edited_key(&state, &data, Tool::EmergencyFund, "timestamp")
        .await
        .unwrap_or_else(now_timestamp);
    let record = Record::new()
        .with("timestamp", timestamp)
        .with("first_name", data.get("first_name"))
        .with("email", data.get("email"))
        .with("language", language)
        .with("monthly_expenses", format_number(monthly_expenses))
        .with("recommended_fund", format_number(recommended))
        .with("auto_email", format_flag(data.checked("auto_email")));
    save(&state, &visit, &record, Tool::EmergencyFund).await;

    let lines = vec![
        Line::new(translate("Monthly Expenses", language), money(monthly_expenses)),
        Line::new(translate("Recommended Fund", language), money(recommended)),
    ];

    send_email(
        &state,
        &visit,
        &data,
        translate("Emergency Fund Recommendation", language),
        &EmailBody {
            language,
            user_name: data.get("first_name").to_string(),
            heading: translate("Emergency Fund Recommendation", language),
            lines: lines.clone(),
            ..EmailBody::default()
        },
    );

    let chart = cached_fragment(
        &state.charts,
        &emergency_fund_chart(monthly_expenses, recommended, language),
        language,
    );

    render_page(
        &state,
        visit,
        "result",
        json!({
            "title": "Emergency Fund Calculator",
            "lines": lines,
            "charts": [chart],
            "form_url": EMERGENCY_FUND.action,
        }),
    )
}
