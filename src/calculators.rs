//! Arithmetic behind every tool
//!
//! Everything here is a pure function of its inputs. Peer comparisons take the
//! already-fetched column values so that the callers decide where they come
//! from (and what to do when the worksheet cannot be read).

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::i18n::{Language, translate, translate_with};
use crate::worksheet::{Record, parse_timestamp};

/// Course link shown with the net worth result
pub const COURSE_LINK: &str = "https://youtube.com/@ficore.africa?si=xRuw7Ozcqbfmveru";

/// Average used when nobody has a score yet
pub const DEFAULT_AVERAGE_SCORE: f64 = 50.0;

/// Percentile reported when peers cannot be compared
pub const DEFAULT_PERCENTILE: f64 = 50.0;

/// Months of expenses an emergency fund should cover
pub const EMERGENCY_FUND_MONTHS: f64 = 6.0;

/// Share of income set aside as savings in a budget
pub const SAVINGS_RATE: f64 = 0.2;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format an amount with thousands separators and two decimals
///
/// # Examples
/// ```
/// use ficore::calculators::format_money;
///
/// assert_eq!(format_money(150000.0), "150,000.00");
/// assert_eq!(format_money(-1234.5), "-1,234.50");
/// ```
pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

/// Financial health score between 0 and 100
///
/// Starts at 100 and deducts up to 40 points for the expense ratio, up to 30
/// for the debt ratio and up to 20 for the interest rate. A non-positive
/// income scores 0.
///
/// # Examples
/// ```
/// use ficore::calculators::calculate_health_score;
///
/// assert_eq!(calculate_health_score(100000.0, 50000.0, 20000.0, 10.0), 69.0);
/// assert_eq!(calculate_health_score(0.0, 50000.0, 0.0, 0.0), 0.0);
/// ```
pub fn calculate_health_score(income: f64, expenses: f64, debt: f64, interest_rate: f64) -> f64 {
    if income <= 0.0 {
        return 0.0;
    }
    let expense_ratio = expenses / income;
    let debt_ratio = debt / income;

    let mut score = 100.0;
    score -= 40.0 * expense_ratio.min(1.0);
    score -= 30.0 * debt_ratio.min(1.0);
    if interest_rate > 0.0 {
        score -= (0.5 * interest_rate).min(20.0);
    }
    round2(score).max(0.0)
}

pub fn score_description(score: f64, language: Language) -> String {
    let key = if score >= 80.0 {
        "Strong Financial Health"
    } else if score >= 60.0 {
        "Stable Finances"
    } else if score >= 40.0 {
        "Financial Strain"
    } else {
        "Urgent Attention Needed"
    };
    translate(key, language)
}

/// Badges earned by a health score (also awarded to budgets, on the surplus)
pub fn health_badges(score: f64, debt: f64, income: f64, language: Language) -> Vec<String> {
    let mut badges = Vec::new();
    if score >= 60.0 {
        badges.push(translate("Financial Stability Achieved!", language));
    }
    if debt == 0.0 {
        badges.push(translate("Debt Slayer!", language));
    }
    if income > 0.0 {
        badges.push(translate("First Health Score Completed!", language));
    }
    if score >= 80.0 {
        badges.push(translate("High Value Badge", language));
    } else if score >= 60.0 {
        badges.push(translate("Positive Value Badge", language));
    }
    badges
}

/// 1-based rank of `value` among `others` plus itself, highest first
///
/// Returns `(rank, total)`.
///
/// # Examples
/// ```
/// use ficore::calculators::assign_rank;
///
/// assert_eq!(assign_rank(70.0, &[90.0, 50.0]), (2, 3));
/// assert_eq!(assign_rank(10.0, &[]), (1, 1));
/// ```
pub fn assign_rank(value: f64, others: &[f64]) -> (usize, usize) {
    let higher = others.iter().filter(|other| **other > value).count();
    (higher + 1, others.len() + 1)
}

pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean of the recorded scores, 50 when there are none
pub fn average_score(scores: &[f64]) -> f64 {
    average(scores).unwrap_or(DEFAULT_AVERAGE_SCORE)
}

pub fn net_worth(assets: f64, liabilities: f64) -> f64 {
    assets - liabilities
}

/// Share of peers (and the user) whose net worth is at or below `net_worth`
///
/// Percentage with one decimal.
///
/// # Examples
/// ```
/// use ficore::calculators::net_worth_percentile;
///
/// assert_eq!(net_worth_percentile(500.0, &[100.0, 900.0, 300.0]), 75.0);
/// assert_eq!(net_worth_percentile(-5.0, &[]), 100.0);
/// ```
pub fn net_worth_percentile(net_worth: f64, others: &[f64]) -> f64 {
    let at_or_below = others.iter().filter(|other| **other <= net_worth).count() + 1;
    let total = others.len() + 1;
    let percentile = 100.0 * at_or_below as f64 / total as f64;
    if percentile.is_finite() {
        (percentile * 10.0).round() / 10.0
    } else {
        DEFAULT_PERCENTILE
    }
}

pub fn net_worth_advice(net_worth: f64, language: Language) -> String {
    let key = if net_worth > 0.0 {
        "Maintain your positive net worth by continuing to manage liabilities and grow assets."
    } else if net_worth == 0.0 {
        "Your net worth is balanced. Consider increasing assets to build wealth."
    } else {
        "Focus on reducing liabilities to improve your net worth."
    };
    translate(key, language)
}

pub fn net_worth_badges(net_worth: f64, language: Language) -> Vec<String> {
    let mut badges = Vec::new();
    if net_worth > 0.0 {
        badges.push(translate("Positive Net Worth", language));
    }
    if net_worth >= 100_000.0 {
        badges.push(translate("Wealth Builder", language));
    }
    if net_worth <= -50_000.0 {
        badges.push(translate("Debt Recovery", language));
    }
    badges
}

/// Quiz outcome by number of "Yes" answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    Strategist,
    Planner,
    Learner,
}

impl Personality {
    pub fn from_score(score: usize) -> Self {
        if score >= 8 {
            Personality::Strategist
        } else if score >= 4 {
            Personality::Planner
        } else {
            Personality::Learner
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Strategist => "Strategist",
            Personality::Planner => "Planner",
            Personality::Learner => "Learner",
        }
    }

    pub fn label(&self, language: Language) -> String {
        translate(self.as_str(), language)
    }
}

/// Count the "Yes" answers and derive the personality
pub fn quiz_results<S: AsRef<str>>(answers: &[S]) -> (usize, Personality) {
    let score = answers.iter().filter(|a| a.as_ref() == "Yes").count();
    (score, Personality::from_score(score))
}

pub fn quiz_advice(score: usize, personality: Personality, language: Language) -> String {
    let key = if score >= 8 {
        "Great job! Continue to leverage your {personality} approach to build wealth."
    } else if score >= 4 {
        "Good effort! Your {personality} style is solid, but consider tracking expenses more closely."
    } else {
        "Keep learning! Your {personality} approach can improve with regular financial reviews."
    };
    let label = personality.label(language).to_lowercase();
    translate_with(key, language, &[("personality", &label)])
}

pub fn quiz_badges(score: usize, language: Language) -> Vec<String> {
    let mut badges = Vec::new();
    if score >= 8 {
        badges.push(translate("Financial Guru", language));
    }
    if score >= 4 {
        badges.push(translate("Quiz Achiever", language));
    }
    badges.push(translate("Quiz Participant", language));
    badges
}

/// Recommended emergency fund: six months of expenses
pub fn emergency_fund(monthly_expenses: f64) -> f64 {
    monthly_expenses * EMERGENCY_FUND_MONTHS
}

/// Monthly budget entered on the budget form
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetInput {
    pub monthly_income: f64,
    pub housing: f64,
    pub food: f64,
    pub transport: f64,
    pub other: f64,
}

/// Figures derived from a [`BudgetInput`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total_expenses: f64,
    pub savings: f64,
    pub surplus_deficit: f64,
}

impl BudgetInput {
    /// # Examples
    /// ```
    /// use ficore::calculators::BudgetInput;
    ///
    /// let budget = BudgetInput {
    ///     monthly_income: 100000.0,
    ///     housing: 30000.0,
    ///     food: 20000.0,
    ///     transport: 10000.0,
    ///     other: 5000.0,
    /// };
    /// let summary = budget.summary();
    /// assert_eq!(summary.total_expenses, 65000.0);
    /// assert_eq!(summary.savings, 20000.0);
    /// assert_eq!(summary.surplus_deficit, 35000.0);
    /// ```
    pub fn summary(&self) -> BudgetSummary {
        let total_expenses = self.housing + self.food + self.transport + self.other;
        BudgetSummary {
            total_expenses,
            savings: self.monthly_income * SAVINGS_RATE,
            surplus_deficit: self.monthly_income - total_expenses,
        }
    }

    pub fn advice(&self, language: Language) -> String {
        let surplus = self.summary().surplus_deficit;
        let mut advice = if surplus > 0.0 {
            translate_with(
                "You have a surplus of ₦{amount}. Consider saving or investing this amount.",
                language,
                &[("amount", &format_money(surplus))],
            )
        } else if surplus == 0.0 {
            translate(
                "Your budget is balanced. Try to reduce expenses to create savings.",
                language,
            )
        } else {
            translate_with(
                "You have a deficit of ₦{amount}. Reduce expenses or increase income.",
                language,
                &[("amount", &format_money(-surplus))],
            )
        };

        if self.monthly_income > 0.0 {
            if self.housing / self.monthly_income > 0.4 {
                advice.push(' ');
                advice.push_str(&translate(
                    "Housing expenses are high (>40% of income). Consider more affordable options.",
                    language,
                ));
            }
            if self.food / self.monthly_income > 0.3 {
                advice.push(' ');
                advice.push_str(&translate(
                    "Food expenses are high (>30% of income). Look for cost-saving meal plans.",
                    language,
                ));
            }
        }
        advice
    }
}

/// Direction of an expense tracker entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// Anything other than `Income` counts as an expense
    pub fn parse(value: &str) -> Self {
        if value == "Income" {
            TransactionType::Income
        } else {
            TransactionType::Expense
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
        }
    }

    fn sign(&self) -> f64 {
        match self {
            TransactionType::Income => 1.0,
            TransactionType::Expense => -1.0,
        }
    }
}

/// One expense tracker entry as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub description: String,
    pub transaction_type: TransactionType,
    pub running_balance: f64,
    pub timestamp: String,
}

impl Transaction {
    pub fn from_record(record: &Record) -> Self {
        let category = match record.get("category") {
            "" => "Other",
            other => other,
        };
        Transaction {
            id: record.get("id").to_string(),
            amount: record.number("amount"),
            category: category.to_string(),
            date: record.get("date").to_string(),
            description: record.get("description").to_string(),
            transaction_type: TransactionType::parse(record.get("transaction_type")),
            running_balance: record.number("running_balance"),
            timestamp: record.get("timestamp").to_string(),
        }
    }

    /// Amount with its sign: income positive, expense negative
    pub fn signed_amount(&self) -> f64 {
        self.transaction_type.sign() * self.amount
    }
}

/// Final balance of `transactions` taken in timestamp order
///
/// Also returns the index of the latest transaction, whose row stores the
/// balance. Unparseable timestamps sort first.
pub fn running_balance(transactions: &[Transaction]) -> (f64, Option<usize>) {
    let mut order: Vec<usize> = (0..transactions.len()).collect();
    order.sort_by_key(|&i| {
        parse_timestamp(&transactions[i].timestamp).unwrap_or(NaiveDateTime::MIN)
    });
    let balance = order.iter().map(|&i| transactions[i].signed_amount()).sum();
    (balance, order.last().copied())
}

/// Totals shown on the expense tracker dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_balance: f64,
    /// Signed totals per category, in first-seen order
    pub by_category: Vec<(String, f64)>,
}

/// # Examples
/// ```
/// use ficore::calculators::{summarize_expenses, Transaction, TransactionType};
/// use ficore::i18n::Language;
///
/// let salary = Transaction {
///     id: "1".into(),
///     amount: 1000.0,
///     category: "Other".into(),
///     date: "2025-06-01".into(),
///     description: "Salary".into(),
///     transaction_type: TransactionType::Income,
///     running_balance: 0.0,
///     timestamp: "2025-06-01 09:00:00".into(),
/// };
/// let summary = summarize_expenses(&[salary], Language::English);
/// assert_eq!(summary.net_balance, 1000.0);
/// ```
pub fn summarize_expenses(transactions: &[Transaction], language: Language) -> ExpenseSummary {
    let mut summary = ExpenseSummary::default();
    let mut categories: Vec<(String, f64)> = Vec::new();

    for transaction in transactions {
        match transaction.transaction_type {
            TransactionType::Income => summary.total_income += transaction.amount,
            TransactionType::Expense => summary.total_expenses += transaction.amount,
        }
        match categories.iter_mut().find(|(c, _)| *c == transaction.category) {
            Some((_, total)) => *total += transaction.signed_amount(),
            None => categories.push((transaction.category.clone(), transaction.signed_amount())),
        }
    }

    summary.net_balance = summary.total_income - summary.total_expenses;
    summary.by_category = categories
        .into_iter()
        .map(|(category, total)| (translate(&category, language), total))
        .collect();
    summary
}

pub fn tips(language: Language) -> Vec<String> {
    [
        "Regularly review your assets and liabilities to track progress.",
        "Invest in low-risk assets to grow your wealth steadily.",
        "Create a plan to pay down high-interest debt first.",
    ]
    .iter()
    .map(|tip| translate(tip, language))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub title: String,
    pub link: &'static str,
}

pub fn courses(language: Language) -> Vec<Course> {
    [
        "Personal Finance 101",
        "Debt Management Basics",
        "Investing for Beginners",
    ]
    .iter()
    .map(|title| Course {
        title: translate(title, language),
        link: COURSE_LINK,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(amount: f64, kind: TransactionType, category: &str, ts: &str) -> Transaction {
        Transaction {
            id: ts.to_string(),
            amount,
            category: category.to_string(),
            date: String::new(),
            description: String::new(),
            transaction_type: kind,
            running_balance: 0.0,
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn test_health_score_caps_each_penalty() {
        // expenses and debt both above income, interest above 40%
        assert_eq!(calculate_health_score(1000.0, 5000.0, 5000.0, 80.0), 10.0);
        assert_eq!(calculate_health_score(1000.0, 0.0, 0.0, 0.0), 100.0);
        assert_eq!(calculate_health_score(-5.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_health_score_rounds_to_cents() {
        assert_eq!(calculate_health_score(3.0, 1.0, 0.0, 0.0), 86.67);
    }

    #[test]
    fn test_score_descriptions() {
        assert_eq!(score_description(80.0, Language::English), "Strong Financial Health");
        assert_eq!(score_description(60.0, Language::English), "Stable Finances");
        assert_eq!(score_description(40.0, Language::English), "Financial Strain");
        assert_eq!(score_description(39.99, Language::English), "Urgent Attention Needed");
    }

    #[test]
    fn test_health_badges() {
        let badges = health_badges(85.0, 0.0, 1000.0, Language::English);
        assert_eq!(
            badges,
            vec![
                "Financial Stability Achieved!",
                "Debt Slayer!",
                "First Health Score Completed!",
                "High Value Badge",
            ]
        );

        let badges = health_badges(65.0, 10.0, 1000.0, Language::English);
        assert!(badges.contains(&"Positive Value Badge".to_string()));
        assert!(!badges.contains(&"Debt Slayer!".to_string()));

        assert!(health_badges(10.0, 5.0, 0.0, Language::English).is_empty());
    }

    #[test]
    fn test_rank_ties_share_position() {
        assert_eq!(assign_rank(70.0, &[70.0, 80.0, 10.0]), (2, 4));
    }

    #[test]
    fn test_average_score_defaults() {
        assert_eq!(average_score(&[]), 50.0);
        assert_eq!(average_score(&[40.0, 60.0, 80.0]), 60.0);
    }

    #[test]
    fn test_net_worth_badges() {
        assert_eq!(
            net_worth_badges(150_000.0, Language::English),
            vec!["Positive Net Worth", "Wealth Builder"]
        );
        assert_eq!(net_worth_badges(-60_000.0, Language::English), vec!["Debt Recovery"]);
        assert!(net_worth_badges(0.0, Language::English).is_empty());
    }

    #[test]
    fn test_net_worth_percentile_rounding() {
        assert_eq!(net_worth_percentile(0.0, &[1.0, 2.0]), 33.3);
    }

    #[test]
    fn test_quiz_thresholds() {
        let yes = vec!["Yes"; 8];
        assert_eq!(quiz_results(&yes), (8, Personality::Strategist));

        let mixed = ["Yes", "No", "Yes", "Yes", "Yes", "No", "No", "No", "No", "No"];
        assert_eq!(quiz_results(&mixed), (4, Personality::Planner));

        let none: [&str; 10] = ["No"; 10];
        assert_eq!(quiz_results(&none), (0, Personality::Learner));
    }

    #[test]
    fn test_quiz_advice_mentions_personality() {
        let advice = quiz_advice(9, Personality::Strategist, Language::English);
        assert_eq!(
            advice,
            "Great job! Continue to leverage your strategist approach to build wealth."
        );
        assert_eq!(quiz_badges(3, Language::English), vec!["Quiz Participant"]);
        assert_eq!(quiz_badges(8, Language::English).len(), 3);
    }

    #[test]
    fn test_emergency_fund_is_six_months() {
        assert_eq!(emergency_fund(50_000.0), 300_000.0);
    }

    #[test]
    fn test_budget_advice_warnings() {
        let budget = BudgetInput {
            monthly_income: 100.0,
            housing: 50.0,
            food: 40.0,
            transport: 20.0,
            other: 0.0,
        };
        let advice = budget.advice(Language::English);
        assert!(advice.starts_with("You have a deficit of ₦10.00."));
        assert!(advice.contains("Housing expenses are high"));
        assert!(advice.contains("Food expenses are high"));

        let balanced = BudgetInput {
            monthly_income: 100.0,
            housing: 25.0,
            food: 25.0,
            transport: 25.0,
            other: 25.0,
        };
        assert_eq!(
            balanced.advice(Language::English),
            "Your budget is balanced. Try to reduce expenses to create savings."
        );
    }

    #[test]
    fn test_running_balance_uses_timestamp_order() {
        let transactions = vec![
            transaction(200.0, TransactionType::Expense, "Food and Groceries", "2025-06-03 10:00:00"),
            transaction(1000.0, TransactionType::Income, "Other", "2025-06-01 10:00:00"),
            transaction(50.0, TransactionType::Expense, "Transport", "2025-06-02 10:00:00"),
        ];
        let (balance, latest) = running_balance(&transactions);
        assert_eq!(balance, 750.0);
        assert_eq!(latest, Some(0));
        assert_eq!(running_balance(&[]), (0.0, None));
    }

    #[test]
    fn test_summary_signs_categories() {
        let transactions = vec![
            transaction(1000.0, TransactionType::Income, "Other", "1"),
            transaction(300.0, TransactionType::Expense, "Other", "2"),
            transaction(100.0, TransactionType::Expense, "Transport", "3"),
        ];
        let summary = summarize_expenses(&transactions, Language::English);
        assert_eq!(summary.total_income, 1000.0);
        assert_eq!(summary.total_expenses, 400.0);
        assert_eq!(summary.net_balance, 600.0);
        assert_eq!(
            summary.by_category,
            vec![("Other".to_string(), 700.0), ("Transport".to_string(), -100.0)]
        );
    }

    #[test]
    fn test_transaction_from_record_defaults() {
        let record = Record::new().with("amount", "1,500").with("transaction_type", "");
        let transaction = Transaction::from_record(&record);
        assert_eq!(transaction.amount, 1500.0);
        assert_eq!(transaction.category, "Other");
        assert_eq!(transaction.transaction_type, TransactionType::Expense);
    }

    #[test]
    fn test_money_format() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(999.999), "1,000.00");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
    }
}
