//! Form definitions and validation for every tool
//!
//! A form is a static list of [`FieldSpec`]s. Posted values arrive as plain
//! strings in a [`FormData`]. [`validate`] checks them against the field
//! list and returns localized messages per field. [`render_fields`] turns the
//! field list into the view model the generic form template draws.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::i18n::{Language, translate, translate_with};
use crate::schedule::parse_date;
use crate::worksheet::{Record, Tool};

/// Upper bound of most amount fields
const MAX_AMOUNT: f64 = 10_000_000_000.0;
/// Upper bound of budget and emergency fund amounts
const MAX_BUDGET_AMOUNT: f64 = 100_000_000.0;

pub const LANGUAGES: &[&str] = &["English", "Hausa"];
pub const USER_TYPES: &[&str] = &["Individual", "Business"];
pub const YES_NO: &[&str] = &["Yes", "No"];
pub const EXPENSE_CATEGORIES: &[&str] = &[
    "Food and Groceries",
    "Transport",
    "Housing",
    "Utilities",
    "Entertainment",
    "Other",
];
pub const TRANSACTION_TYPES: &[&str] = &["Income", "Expense"];
pub const BILL_CATEGORIES: &[&str] = &["Utilities", "Housing", "Transport", "Food", "Other"];
pub const RECURRENCES: &[&str] = &["None", "Daily", "Weekly", "Monthly", "Yearly"];

/// How a field is entered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Email,
    Number,
    TextArea,
    Date,
    Select(&'static [&'static str]),
    Checkbox,
}

impl FieldKind {
    fn input_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Number => "text",
            FieldKind::TextArea => "textarea",
            FieldKind::Date => "text",
            FieldKind::Select(_) => "select",
            FieldKind::Checkbox => "checkbox",
        }
    }
}

/// Extra checks run after the required/type checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    EqualTo(&'static str),
    Range(f64, f64),
    TwoDecimals,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Translation key of the label
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub rules: &'static [Rule],
    /// Translation key of the placeholder, empty for none
    pub placeholder: &'static str,
}

const fn field(
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    required: bool,
    rules: &'static [Rule],
    placeholder: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind,
        required,
        rules,
        placeholder,
    }
}

const FIRST_NAME: FieldSpec = field("first_name", "First Name", FieldKind::Text, true, &[], "e.g. John");
const EMAIL: FieldSpec = field(
    "email",
    "Email",
    FieldKind::Email,
    true,
    &[],
    "e.g. john.doe@example.com",
);
const CONFIRM_EMAIL: FieldSpec = field(
    "confirm_email",
    "Confirm Email",
    FieldKind::Email,
    true,
    &[Rule::EqualTo("email")],
    "e.g. john.doe@example.com",
);
const LANGUAGE: FieldSpec = field("language", "Language", FieldKind::Select(LANGUAGES), true, &[], "");
const AUTO_EMAIL: FieldSpec = field(
    "auto_email",
    "Send Email Notification",
    FieldKind::Checkbox,
    false,
    &[],
    "",
);

const AMOUNT_RANGE: &[Rule] = &[Rule::Range(0.0, MAX_AMOUNT)];
const BUDGET_RANGE: &[Rule] = &[Rule::Range(0.0, MAX_BUDGET_AMOUNT), Rule::TwoDecimals];

pub const HEALTH_SCORE_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    field("last_name", "Last Name", FieldKind::Text, false, &[], "Enter your last name (optional)"),
    EMAIL,
    CONFIRM_EMAIL,
    field("phone_number", "Phone Number", FieldKind::Text, false, &[], "Enter phone number (optional)"),
    LANGUAGE,
    field(
        "business_name",
        "Business Name",
        FieldKind::Text,
        true,
        &[],
        "Type personal name if no business",
    ),
    field("user_type", "User Type", FieldKind::Select(USER_TYPES), true, &[], ""),
    field("monthly_income", "Income/Revenue (₦)", FieldKind::Number, true, AMOUNT_RANGE, "e.g. 150,000"),
    field("monthly_expenses", "Expenses/Costs (₦)", FieldKind::Number, true, AMOUNT_RANGE, "e.g. 60,000"),
    field("debt_loan", "Debt/Loan (₦)", FieldKind::Number, true, AMOUNT_RANGE, "e.g. 25,000"),
    field(
        "debt_interest_rate",
        "Interest Percentage on Debt (%)",
        FieldKind::Number,
        false,
        &[Rule::Range(0.0, 100.0)],
        "e.g. 10%",
    ),
    field("auto_email", "Send Me My Score by Email", FieldKind::Checkbox, false, &[], ""),
];

pub const NET_WORTH_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    EMAIL,
    LANGUAGE,
    field("assets", "Total Assets (₦)", FieldKind::Number, true, AMOUNT_RANGE, "e.g. 500,000"),
    field("liabilities", "Total Liabilities (₦)", FieldKind::Number, true, AMOUNT_RANGE, "e.g. 200,000"),
];

pub const QUIZ_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    EMAIL,
    LANGUAGE,
    field("q1", "Do you save some money every month?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q2", "Do you know how much you spend each week?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q3", "Do you like to plan before spending money?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q4", "Do you keep money for emergencies?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q5", "Do you check your money goals often?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q6", "Do you avoid borrowing money when possible?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q7", "Do you feel okay taking small money risks?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q8", "Do you learn about saving or investing?", FieldKind::Select(YES_NO), true, &[], ""),
    field("q9", "Do you spend less than you earn?", FieldKind::Select(YES_NO), true, &[], ""),
    field(
        "q10",
        "Do you talk about money with family or friends?",
        FieldKind::Select(YES_NO),
        true,
        &[],
        "",
    ),
    AUTO_EMAIL,
];

/// Names of the quiz answer fields, in order
pub const QUIZ_QUESTIONS: [&str; 10] = ["q1", "q2", "q3", "q4", "q5", "q6", "q7", "q8", "q9", "q10"];

pub const EMERGENCY_FUND_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    EMAIL,
    LANGUAGE,
    field(
        "monthly_expenses",
        "Monthly Expenses (₦)",
        FieldKind::Number,
        true,
        &[Rule::Range(0.0, MAX_BUDGET_AMOUNT)],
        "e.g. 50,000",
    ),
    AUTO_EMAIL,
];

pub const BUDGET_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    EMAIL,
    CONFIRM_EMAIL,
    LANGUAGE,
    field("monthly_income", "Total Monthly Income", FieldKind::Number, true, BUDGET_RANGE, "e.g. 150,000"),
    field("housing_expenses", "Housing Expenses", FieldKind::Number, true, BUDGET_RANGE, "e.g. 30,000"),
    field("food_expenses", "Food Expenses", FieldKind::Number, true, BUDGET_RANGE, "e.g. 45,000"),
    field("transport_expenses", "Transport Expenses", FieldKind::Number, true, BUDGET_RANGE, "e.g. 10,000"),
    field("other_expenses", "Other Expenses", FieldKind::Number, true, BUDGET_RANGE, "e.g. 20,000"),
    AUTO_EMAIL,
];

pub const EXPENSE_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    EMAIL,
    CONFIRM_EMAIL,
    LANGUAGE,
    field(
        "amount",
        "Amount",
        FieldKind::Number,
        true,
        &[Rule::Range(0.0, MAX_AMOUNT), Rule::TwoDecimals],
        "e.g. 5000",
    ),
    field("description", "Description", FieldKind::TextArea, true, &[], "e.g. Groceries at Market"),
    field("category", "Category", FieldKind::Select(EXPENSE_CATEGORIES), true, &[], ""),
    field(
        "transaction_type",
        "Transaction Type",
        FieldKind::Select(TRANSACTION_TYPES),
        true,
        &[],
        "",
    ),
    field("date", "Date", FieldKind::Date, true, &[], "e.g. 2025-06-01"),
    AUTO_EMAIL,
];

pub const BILL_FIELDS: &[FieldSpec] = &[
    FIRST_NAME,
    EMAIL,
    LANGUAGE,
    field("description", "Description", FieldKind::TextArea, true, &[], "e.g. Electricity bill"),
    field("amount", "Amount (₦)", FieldKind::Number, true, AMOUNT_RANGE, "e.g. 5000"),
    field("due_date", "Due Date", FieldKind::Date, true, &[], "e.g. 2025-06-01"),
    field("category", "Category", FieldKind::Select(BILL_CATEGORIES), true, &[], ""),
    field("recurrence", "Recurrence", FieldKind::Select(RECURRENCES), true, &[], ""),
    AUTO_EMAIL,
];

/// Field list of the form feeding `tool`
pub fn fields_for(tool: Tool) -> &'static [FieldSpec] {
    match tool {
        Tool::HealthScore => HEALTH_SCORE_FIELDS,
        Tool::NetWorth => NET_WORTH_FIELDS,
        Tool::Quiz => QUIZ_FIELDS,
        Tool::EmergencyFund => EMERGENCY_FUND_FIELDS,
        Tool::Budget => BUDGET_FIELDS,
        Tool::ExpenseTracker => EXPENSE_FIELDS,
        Tool::BillPlanner => BILL_FIELDS,
        Tool::Authentication | Tool::BillReminders => &[],
    }
}

/// Raw posted form values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(HashMap<String, String>);

impl FormData {
    pub fn new() -> Self {
        FormData(HashMap::new())
    }

    /// Trimmed value, empty when absent
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(|v| v.trim()).unwrap_or("")
    }

    pub fn set(&mut self, name: &str, value: impl ToString) {
        self.0.insert(name.to_string(), value.to_string());
    }

    /// Numeric value; validated forms only hold parseable numbers
    pub fn number(&self, name: &str) -> f64 {
        parse_amount(self.get(name)).unwrap_or(0.0)
    }

    /// Checkboxes post a value only when ticked
    pub fn checked(&self, name: &str) -> bool {
        matches!(self.get(name), "y" | "on" | "true" | "True" | "1")
    }

    pub fn language(&self) -> Language {
        Language::parse_or_default(self.get("language"))
    }

    /// Fill the form fields from a stored row
    pub fn prefill(&mut self, specs: &[FieldSpec], record: &Record) {
        for spec in specs {
            if !record.contains(spec.name) {
                continue;
            }
            match spec.kind {
                FieldKind::Checkbox => {
                    if record.flag(spec.name) {
                        self.set(spec.name, "y");
                    } else {
                        self.0.remove(spec.name);
                    }
                }
                _ => self.set(spec.name, record.get(spec.name)),
            }
        }
    }
}

impl From<HashMap<String, String>> for FormData {
    fn from(values: HashMap<String, String>) -> Self {
        FormData(values)
    }
}

/// Localized messages per field name
pub type FormErrors = BTreeMap<String, Vec<String>>;

/// Parse an amount, tolerating thousands separators and a currency sign
pub fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .trim_start_matches('₦')
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Whether `value` has at most two digits after the decimal point
///
/// # Examples
/// ```
/// use ficore::forms::has_two_decimals;
///
/// assert!(has_two_decimals("150000.50"));
/// assert!(has_two_decimals("12.100"));
/// assert!(!has_two_decimals("12.345"));
/// ```
pub fn has_two_decimals(value: &str) -> bool {
    match value.trim().split_once('.') {
        Some((_, fraction)) => fraction.trim_end_matches('0').len() <= 2,
        None => true,
    }
}

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").unwrap();
}

/// Loose `local@domain.tld` check
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

fn format_bound(value: f64) -> String {
    crate::worksheet::format_number(value)
}

fn check_field(spec: &FieldSpec, data: &FormData, language: Language) -> Vec<String> {
    let value = data.get(spec.name);
    let mut errors = Vec::new();

    if value.is_empty() {
        if spec.required && spec.kind != FieldKind::Checkbox {
            errors.push(translate("This field is required.", language));
        }
        return errors;
    }

    match spec.kind {
        FieldKind::Email if !is_valid_email(value) => {
            errors.push(translate("Invalid email address.", language));
        }
        FieldKind::Select(choices) if !choices.contains(&value) => {
            errors.push(translate("Not a valid choice", language));
        }
        FieldKind::Date if parse_date(value).is_err() => {
            errors.push(translate("Date must be in YYYY-MM-DD format.", language));
        }
        FieldKind::Number if parse_amount(value).is_none() => {
            errors.push(translate("Not a valid number", language));
            return errors;
        }
        _ => {}
    }

    for rule in spec.rules {
        match *rule {
            Rule::EqualTo(other) => {
                if value != data.get(other) {
                    errors.push(translate("Emails must match", language));
                }
            }
            Rule::Range(min, max) => {
                if let Some(number) = parse_amount(value) {
                    if number < min || number > max {
                        errors.push(translate_with(
                            "Number must be between {min} and {max}.",
                            language,
                            &[("min", &format_bound(min)), ("max", &format_bound(max))],
                        ));
                    }
                }
            }
            Rule::TwoDecimals => {
                if !has_two_decimals(&value.replace(',', "")) {
                    errors.push(translate("Two decimal places required", language));
                }
            }
        }
    }
    errors
}

/// Check every field; an empty map means the form is valid
pub fn validate(specs: &[FieldSpec], data: &FormData, language: Language) -> FormErrors {
    specs
        .iter()
        .filter_map(|spec| {
            let errors = check_field(spec, data, language);
            (!errors.is_empty()).then(|| (spec.name.to_string(), errors))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// One input as the form template draws it
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: String,
    pub input_type: &'static str,
    pub is_select: bool,
    pub is_checkbox: bool,
    pub is_textarea: bool,
    pub value: String,
    pub checked: bool,
    pub readonly: bool,
    pub required: bool,
    pub placeholder: String,
    pub choices: Vec<ChoiceView>,
    pub errors: Vec<String>,
}

/// View models for `specs`; email fields are read-only for a logged-in user
pub fn render_fields(
    specs: &[FieldSpec],
    data: &FormData,
    errors: &FormErrors,
    language: Language,
    lock_email: bool,
) -> Vec<FieldView> {
    specs
        .iter()
        .map(|spec| {
            let value = data.get(spec.name).to_string();
            let choices = match spec.kind {
                FieldKind::Select(options) => options
                    .iter()
                    .map(|option| ChoiceView {
                        value: option.to_string(),
                        label: translate(option, language),
                        selected: *option == value,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            FieldView {
                name: spec.name,
                label: translate(spec.label, language),
                input_type: spec.kind.input_type(),
                is_select: matches!(spec.kind, FieldKind::Select(_)),
                is_checkbox: spec.kind == FieldKind::Checkbox,
                is_textarea: spec.kind == FieldKind::TextArea,
                checked: data.checked(spec.name),
                readonly: lock_email && matches!(spec.name, "email" | "confirm_email"),
                required: spec.required,
                placeholder: if spec.placeholder.is_empty() {
                    String::new()
                } else {
                    translate(spec.placeholder, language)
                },
                choices,
                errors: errors.get(spec.name).cloned().unwrap_or_default(),
                value,
            }
        })
        .collect()
}

/// Choices of the "record to edit" selector: a blank entry then one per record
pub fn record_choices(records: &[Record], selected: &str, language: Language) -> Vec<ChoiceView> {
    let mut choices = vec![ChoiceView {
        value: String::new(),
        label: translate("Create New Record", language),
        selected: selected.is_empty(),
    }];
    for record in records {
        let Some(key) = record.key() else { continue };
        let label = match record.get("timestamp") {
            "" => key.to_string(),
            timestamp => timestamp.to_string(),
        };
        choices.push(ChoiceView {
            value: key.to_string(),
            label,
            selected: key == selected,
        });
    }
    choices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> FormData {
        let mut form = FormData::new();
        for (k, v) in pairs {
            form.set(k, v);
        }
        form
    }

    fn valid_health_form() -> FormData {
        data(&[
            ("first_name", "Amina"),
            ("email", "amina@example.com"),
            ("confirm_email", "amina@example.com"),
            ("language", "Hausa"),
            ("business_name", "Amina Foods"),
            ("user_type", "Business"),
            ("monthly_income", "150,000"),
            ("monthly_expenses", "60000"),
            ("debt_loan", "0"),
        ])
    }

    #[test]
    fn test_valid_health_form() {
        let errors = validate(HEALTH_SCORE_FIELDS, &valid_health_form(), Language::English);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_missing_and_mismatched_fields() {
        let mut form = valid_health_form();
        form.set("confirm_email", "other@example.com");
        form.set("first_name", "  ");
        form.set("user_type", "Government");

        let errors = validate(HEALTH_SCORE_FIELDS, &form, Language::English);
        assert_eq!(errors["first_name"], vec!["This field is required."]);
        assert_eq!(errors["confirm_email"], vec!["Emails must match"]);
        assert_eq!(errors["user_type"], vec!["Not a valid choice"]);
        assert!(!errors.contains_key("auto_email"));
    }

    #[test]
    fn test_number_rules() {
        let mut form = valid_health_form();
        form.set("debt_interest_rate", "150");
        form.set("monthly_expenses", "lots");
        let errors = validate(HEALTH_SCORE_FIELDS, &form, Language::English);
        assert_eq!(
            errors["debt_interest_rate"],
            vec!["Number must be between 0 and 100."]
        );
        assert_eq!(errors["monthly_expenses"], vec!["Not a valid number"]);
    }

    #[test]
    fn test_expense_amount_two_decimals_and_date() {
        let form = data(&[
            ("first_name", "Musa"),
            ("email", "musa@example.com"),
            ("confirm_email", "musa@example.com"),
            ("language", "English"),
            ("amount", "12.345"),
            ("description", "Fuel"),
            ("category", "Transport"),
            ("transaction_type", "Expense"),
            ("date", "yesterday-ish"),
        ]);
        let errors = validate(EXPENSE_FIELDS, &form, Language::English);
        assert_eq!(errors["amount"], vec!["Two decimal places required"]);
        assert_eq!(errors["date"], vec!["Date must be in YYYY-MM-DD format."]);
    }

    #[test]
    fn test_bill_due_date_outside_supported_years() {
        for due_date in ["+262142-12-30", "-262143-01-01", "1850-01-01"] {
            let form = data(&[
                ("first_name", "Musa"),
                ("email", "musa@example.com"),
                ("language", "English"),
                ("description", "Rent"),
                ("amount", "5000"),
                ("due_date", due_date),
                ("category", "Housing"),
                ("recurrence", "Daily"),
            ]);
            let errors = validate(BILL_FIELDS, &form, Language::English);
            assert_eq!(
                errors["due_date"],
                vec!["Date must be in YYYY-MM-DD format."],
                "{}",
                due_date
            );
        }
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("john.doe@example.com"));
        assert!(!is_valid_email("john.doe@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("john doe@example.com"));
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount("₦150,000"), Some(150000.0));
        assert_eq!(parse_amount("10%"), Some(10.0));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_prefill_and_render() {
        let record = Record::new()
            .with("first_name", "Amina")
            .with("language", "Hausa")
            .with("auto_email", "True");
        let mut form = FormData::new();
        form.set("email", "amina@example.com");
        form.prefill(EMERGENCY_FUND_FIELDS, &record);
        assert!(form.checked("auto_email"));
        assert_eq!(form.language(), Language::Hausa);

        let fields = render_fields(
            EMERGENCY_FUND_FIELDS,
            &form,
            &FormErrors::new(),
            Language::English,
            true,
        );
        let email = fields.iter().find(|f| f.name == "email").unwrap();
        assert!(email.readonly);
        let language = fields.iter().find(|f| f.name == "language").unwrap();
        assert!(language.choices.iter().any(|c| c.value == "Hausa" && c.selected));
    }

    #[test]
    fn test_record_choices() {
        let records = vec![
            Record::new().with("id", "abc").with("timestamp", "2025-06-01 10:00:00"),
            Record::new().with("timestamp", "2025-06-02 10:00:00"),
        ];
        let choices = record_choices(&records, "abc", Language::English);
        assert_eq!(choices.len(), 3);
        assert!(choices[1].selected);
        assert_eq!(choices[1].label, "2025-06-01 10:00:00");
        assert_eq!(choices[2].value, "2025-06-02 10:00:00");
    }

    #[test]
    fn test_every_tool_form_has_email() {
        for tool in Tool::ALL {
            let fields = fields_for(tool);
            if !fields.is_empty() {
                assert!(fields.iter().any(|f| f.name == "email"), "{}", tool);
            }
        }
    }
}
