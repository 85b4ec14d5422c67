#![cfg(feature = "web")]
//! HTTP front door: shared state, page rendering and the router

use axum::{
    Router,
    extract::{FromRef, State},
    http::StatusCode,
    response::{Html, Redirect, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::assessments;
use crate::cache::TtlCache;
use crate::config::{Args, StoreKind};
use crate::error::{FicoreError, Result};
use crate::forms::{self, FieldSpec, FormData, FormErrors};
use crate::i18n::Language;
use crate::local_store::LocalStore;
use crate::login::{self, SessionStore, Visit};
use crate::mailer::Email;
use crate::notify::{self, Notifier};
use crate::pages::{EmailBody, Pages, links};
use crate::planners;
use crate::sheets::SheetsStore;
use crate::store::{TableStore, Worksheets};
use crate::worksheet::{Record, Tool};

/// Everything the handlers share
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Args>,
    pub sheets: Worksheets,
    pub sessions: Arc<SessionStore>,
    pub pages: Arc<Pages>,
    pub notifier: Notifier,
    pub charts: Arc<TtlCache<String, String>>,
}

impl AppState {
    pub fn new(config: Args, store: Arc<dyn TableStore>, notifier: Notifier) -> Result<Self> {
        Ok(AppState {
            sheets: Worksheets::new(store),
            sessions: Arc::new(SessionStore::new(config.session_ttl())),
            pages: Arc::new(Pages::new()?),
            notifier,
            charts: Arc::new(TtlCache::new(config.cache_ttl())),
            config: Arc::new(config),
        })
    }
}

/// Where the tool forms live and what they are called
#[derive(Debug, Clone, Copy)]
pub struct FormPage {
    pub tool: Tool,
    /// Translation key of the page title
    pub title: &'static str,
    pub action: &'static str,
}

impl FormPage {
    pub fn fields(&self) -> &'static [FieldSpec] {
        forms::fields_for(self.tool)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    #[serde(default)]
    pub record_id: String,
}

const TOOLS: &[(&str, &str)] = &[
    ("Financial Health Score", "/health_score_form"),
    ("Net Worth Calculator", "/net_worth_form"),
    ("Financial Personality Quiz", "/quiz_form"),
    ("Emergency Fund Calculator", "/emergency_fund_form"),
    ("Budget Planner", "/budget_form"),
    ("Expense Tracker", "/expense_tracker_form"),
    ("Bill Planner", "/bill_planner_form"),
];

/// Values every page template expects, overlaid with `data`
fn page_context(visit: &Visit, flashes: Vec<login::Flash>, data: Value) -> Value {
    let mut context = links();
    context.insert("language".to_string(), json!(visit.language()));
    context.insert(
        "languages".to_string(),
        json!(Language::ALL.iter().map(Language::as_str).collect::<Vec<_>>()),
    );
    context.insert("user_email".to_string(), json!(visit.user_email()));
    context.insert("flashes".to_string(), json!(flashes));
    if let Value::Object(extra) = data {
        context.extend(extra);
    }
    Value::Object(context)
}

/// Render `template` inside the layout, consuming the pending flashes
pub fn render_page(state: &AppState, visit: Visit, template: &str, data: Value) -> Response {
    render_with_status(state, visit, StatusCode::OK, template, data)
}

pub fn render_with_status(
    state: &AppState,
    visit: Visit,
    status: StatusCode,
    template: &str,
    data: Value,
) -> Response {
    let flashes = visit.take_flashes();
    let context = page_context(&visit, flashes, data);
    match state.pages.render(template, &context) {
        Ok(html) => visit.respond((status, Html(html))),
        Err(e) => {
            error!("Error rendering template {}: {}", template, e);
            visit.respond((StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"))
        }
    }
}

/// Log `err` and show the 500 page
pub fn server_error(state: &AppState, visit: Visit, err: FicoreError) -> Response {
    error!("Internal server error: {}", err);
    render_with_status(
        state,
        visit,
        StatusCode::INTERNAL_SERVER_ERROR,
        "error",
        json!({ "status": 500, "title": "Server Error" }),
    )
}

async fn not_found(State(state): State<AppState>, visit: Visit) -> Response {
    render_with_status(
        &state,
        visit,
        StatusCode::NOT_FOUND,
        "error",
        json!({ "status": 404, "title": "Page Not Found" }),
    )
}

async fn serve_index(State(state): State<AppState>, visit: Visit) -> Response {
    let tools: Vec<Value> = TOOLS
        .iter()
        .map(|(name, href)| json!({ "name": name, "href": href }))
        .collect();
    render_page(
        &state,
        visit,
        "index",
        json!({ "title": "FiCore AI - Personal Finance Tools", "tools": tools }),
    )
}

/// The logged-in user's rows of `tool`; lookup failures are logged and flashed
pub async fn user_records(state: &AppState, visit: &Visit, tool: Tool) -> Vec<Record> {
    let email = visit.user_email();
    if email.is_empty() {
        return Vec::new();
    }
    match state.sheets.get_user_data_by_email(email, tool).await {
        Ok(records) => records,
        Err(e) => {
            error!("Error fetching {} records for {}: {}", tool, email, e);
            visit.flash_tr("error", "Failed to fetch user data due to server error");
            Vec::new()
        }
    }
}

/// Draw a tool form, with its validation messages when re-rendered after a POST
pub fn render_form(
    state: &AppState,
    visit: Visit,
    page: FormPage,
    data: &FormData,
    errors: &FormErrors,
    records: &[Record],
) -> Response {
    let language = visit.language();
    let logged_in = !visit.user_email().is_empty();
    let record_id = data.get("record_id").to_string();
    let fields = forms::render_fields(page.fields(), data, errors, language, logged_in);
    let record_choices = if logged_in {
        forms::record_choices(records, &record_id, language)
    } else {
        Vec::new()
    };
    render_page(
        state,
        visit,
        "form",
        json!({
            "title": page.title,
            "action": page.action,
            "fields": fields,
            "record_choices": record_choices,
            "record_id": record_id,
        }),
    )
}

/// GET handler body shared by every tool form
///
/// A logged-in user gets their email filled in read-only, and `?record_id=`
/// fills the form from one of their stored rows.
pub async fn show_form(state: &AppState, visit: Visit, page: FormPage, query: RecordQuery) -> Response {
    let records = user_records(state, &visit, page.tool).await;
    let mut data = FormData::new();
    data.set("language", visit.language());

    let email = visit.user_email().to_string();
    if !email.is_empty() {
        data.set("email", &email);
        data.set("confirm_email", &email);
    }

    let record_id = query.record_id.trim();
    if !record_id.is_empty() {
        match records.iter().find(|record| record.has_key(record_id)) {
            Some(record) => {
                data.prefill(page.fields(), record);
                data.set("record_id", record_id);
            }
            None => warn!("Record {} not found in {} for {}", record_id, page.tool, email),
        }
    }

    render_form(state, visit, page, &data, &FormErrors::new(), &records)
}

/// POST handler prologue shared by every tool form
///
/// Returns the form data when it validates; otherwise the re-rendered form.
/// A valid submission records the submitter in the Authentication worksheet
/// and logs the session in with the submitted email and language.
pub async fn accept_form(
    state: &AppState,
    mut visit: Visit,
    page: FormPage,
    data: FormData,
) -> std::result::Result<(Visit, FormData), Response> {
    let errors = forms::validate(page.fields(), &data, visit.language());
    if !errors.is_empty() {
        let records = user_records(state, &visit, page.tool).await;
        return Err(render_form(state, visit, page, &data, &errors, &records));
    }

    let email = data.get("email").to_string();
    let language = data.language();
    if let Err(e) = state
        .sheets
        .store_authentication_data(
            data.get("first_name"),
            &email,
            data.get("last_name"),
            data.get("phone_number"),
            language,
            &visit.session_id,
        )
        .await
    {
        error!("Error storing authentication data for {}: {}", email, e);
    }
    visit.remember(&email, language);
    Ok((visit, data))
}

/// Queue a notification email when the user asked for one
///
/// Nothing happens when mail is disabled. A failure to render or queue is
/// logged and flashed as a warning.
pub fn send_email(state: &AppState, visit: &Visit, data: &FormData, subject: String, body: &EmailBody) {
    if !data.checked("auto_email") || !state.notifier.is_enabled() {
        return;
    }
    let queued = state
        .pages
        .email(data.get("email"), subject, body)
        .and_then(|email: Email| state.notifier.queue(email));
    if let Err(e) = queued {
        error!("Error queuing email: {}", e);
        visit.flash_tr("warning", "Failed to queue email notification");
    }
}

/// The edited row when `record_id` names one owned by `email`
///
/// An unknown key or someone else's row is ignored, so the submission is
/// stored as a new entry.
pub async fn owned_record(
    state: &AppState,
    tool: Tool,
    record_id: &str,
    email: &str,
) -> Option<Record> {
    let record_id = record_id.trim();
    if record_id.is_empty() {
        return None;
    }
    match state.sheets.get_user_record(record_id, email, tool).await {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            warn!("{} record {} not found for {}", tool, record_id, email);
            None
        }
        Err(e) => {
            error!("Error looking up {} record {}: {}", tool, record_id, e);
            None
        }
    }
}

/// Redirect to the index with "Unauthorized access" unless `email` is the session user
pub fn check_owner(visit: Visit, email: &str) -> std::result::Result<Visit, Response> {
    if email.is_empty() || visit.user_email() != email {
        warn!("Unauthorized dashboard access for {}", email);
        visit.flash_tr("error", "Unauthorized access");
        return Err(visit.respond(Redirect::to("/index")));
    }
    Ok(visit)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/index") }))
        .route("/index", get(serve_index))
        .route("/change_language", post(login::change_language))
        .route("/login", get(login::serve_login_page).post(login::handle_login))
        .route("/logout", get(login::handle_logout))
        .route(
            "/health_score_form",
            get(assessments::health_score_form).post(assessments::submit_health_score),
        )
        .route(
            "/net_worth_form",
            get(assessments::net_worth_form).post(assessments::submit_net_worth),
        )
        .route(
            "/quiz_form",
            get(assessments::quiz_form).post(assessments::submit_quiz),
        )
        .route(
            "/emergency_fund_form",
            get(assessments::emergency_fund_form).post(assessments::submit_emergency_fund),
        )
        .route(
            "/budget_form",
            get(planners::budget_form).post(planners::submit_budget),
        )
        .route(
            "/expense_tracker_form",
            get(planners::expense_form).post(planners::submit_expense),
        )
        .route(
            "/bill_planner_form",
            get(planners::bill_form).post(planners::submit_bill),
        )
        .route(
            "/expense_tracker_dashboard/:email",
            get(planners::expense_dashboard),
        )
        .route("/bill_dashboard/:email", get(planners::bill_dashboard))
        .route("/budget_dashboard/:email", get(planners::budget_dashboard))
        .route(
            "/update_bill_status/:timestamp",
            post(planners::update_bill_status),
        )
        .route("/delete_expense/:id", post(planners::delete_expense))
        .route("/delete_bill/:timestamp", post(planners::delete_bill))
        .route("/delete_budget/:timestamp", post(planners::delete_budget))
        .nest_service("/static", ServeDir::new("static"))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn open_store(config: &Args) -> Result<Arc<dyn TableStore>> {
    match config.store {
        StoreKind::Local => {
            info!("Using local worksheets in {}", config.data_dir.display());
            Ok(Arc::new(LocalStore::open(&config.data_dir)?))
        }
        StoreKind::Sheets => {
            let credentials = config.google_credentials_json.as_deref().ok_or_else(|| {
                FicoreError::Config("GOOGLE_CREDENTIALS_JSON is not set".to_string())
            })?;
            Ok(Arc::new(
                SheetsStore::connect(credentials, &config.spreadsheet_id).await?,
            ))
        }
    }
}

/// Open the store, start the background tasks and serve until shut down
pub async fn run(config: Args) -> Result<()> {
    let store = open_store(&config).await?;
    let notifier = Notifier::from_config(&config);
    let state = AppState::new(config, store, notifier)?;

    for tool in Tool::ALL {
        if let Err(e) = state.sheets.initialize_worksheet(tool).await {
            error!("Failed to initialize {}: {}", tool, e);
        }
    }

    notify::spawn_reminder_poller(
        state.sheets.clone(),
        state.pages.clone(),
        state.notifier.clone(),
        state.config.reminder_interval(),
    );

    let sessions = state.sessions.clone();
    let purge_every = state.config.session_ttl().min(std::time::Duration::from_secs(3600));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            let purged = sessions.purge();
            if purged > 0 {
                info!("Purged {} expired session(s)", purged);
            }
        }
    });

    let listen = state.config.listen;
    let app = router(state);
    let listener = TcpListener::bind(listen).await?;
    info!("Listening on http://{}", listen);
    axum::serve(listener, app).await?;
    Ok(())
}
