#![cfg(feature = "web")]
//! Handlebars templates for the pages and the notification emails
//!
//! Templates are compiled into the binary. Two helpers are registered:
//! `{{tr "key"}}` looks the key up in the language named by the root
//! `language` value, and `{{money value}}` formats an amount.

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, handlebars_helper,
};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::calculators::format_money;
use crate::config::{CONSULTANCY_FORM_URL, FEEDBACK_FORM_URL, WAITLIST_FORM_URL};
use crate::error::{FicoreError, Result};
use crate::i18n::{Language, translate, translate_with};
use crate::mailer::Email;
use crate::schedule::Bill;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout", include_str!("./templates/layout.hbs")),
    ("index", include_str!("./templates/index.hbs")),
    ("login", include_str!("./templates/login.hbs")),
    ("form", include_str!("./templates/form.hbs")),
    ("result", include_str!("./templates/result.hbs")),
    ("expense_dashboard", include_str!("./templates/expense_dashboard.hbs")),
    ("bill_dashboard", include_str!("./templates/bill_dashboard.hbs")),
    ("budget_dashboard", include_str!("./templates/budget_dashboard.hbs")),
    ("error", include_str!("./templates/error.hbs")),
    ("email", include_str!("./templates/email.hbs")),
];

handlebars_helper!(money: |value: f64| format_money(value));

fn tr_helper(
    h: &Helper,
    _: &Handlebars,
    ctx: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let key = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
    let language = ctx
        .data()
        .get("language")
        .and_then(Value::as_str)
        .map(Language::parse_or_default)
        .unwrap_or_default();
    out.write(&translate(key, language))?;
    Ok(())
}

/// A key/value line of a result page or email
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Line {
    pub label: String,
    pub value: String,
}

impl Line {
    pub fn new(label: impl Into<String>, value: impl ToString) -> Self {
        Line {
            label: label.into(),
            value: value.to_string(),
        }
    }
}

/// Content of a notification email
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailBody {
    pub language: Language,
    pub user_name: String,
    pub heading: String,
    pub lines: Vec<Line>,
    pub badges: Vec<String>,
    pub advice: String,
}

/// Compiled templates
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        for (name, source) in TEMPLATES {
            registry
                .register_template_string(name, *source)
                .map_err(|e| FicoreError::Template(format!("{}: {}", name, e)))?;
        }
        registry.register_helper("tr", Box::new(tr_helper));
        registry.register_helper("money", Box::new(money));
        Ok(Pages { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// Render a notification email addressed to `to`
    pub fn email(&self, to: &str, subject: String, body: &EmailBody) -> Result<Email> {
        let mut data = serde_json::to_value(body)?;
        if let Value::Object(map) = &mut data {
            map.extend(links());
        }
        Ok(Email {
            to: to.to_string(),
            subject,
            html: self.render("email", &data)?,
        })
    }

    /// The reminder sent the day before a bill is due
    pub fn bill_reminder_email(&self, bill: &Bill) -> Result<Email> {
        let language = bill.language;
        let subject = translate_with(
            "Bill Reminder Subject",
            language,
            &[("description", &bill.description)],
        );
        let body = EmailBody {
            language,
            user_name: bill.first_name.clone(),
            heading: translate("Bill Reminder", language),
            lines: vec![
                Line::new(translate("Description", language), &bill.description),
                Line::new(
                    translate("Amount", language),
                    format!("₦{}", format_money(bill.amount)),
                ),
                Line::new(translate("Due Date", language), &bill.due_date),
            ],
            ..EmailBody::default()
        };
        self.email(&bill.email, subject, &body)
    }
}

/// Footer links every page and email carries
pub fn links() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("feedback_url".to_string(), json!(FEEDBACK_FORM_URL));
    map.insert("waitlist_url".to_string(), json!(WAITLIST_FORM_URL));
    map.insert("consultancy_url".to_string(), json!(CONSULTANCY_FORM_URL));
    map
}
