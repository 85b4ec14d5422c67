#![cfg(feature = "web")]
//! Chart fragments for the result pages
//!
//! Every tool describes its chart as a [`Chart`] value; [`Chart::render`]
//! draws it into an inline SVG document with plotters. Page handlers go
//! through [`cached_fragment`], which memoizes the markup and swaps drawing
//! failures for a localized placeholder.

use log::error;
use plotters::element::Pie;
use plotters::prelude::*;
use serde::Serialize;

use crate::cache::TtlCache;
use crate::calculators::{BudgetInput, ExpenseSummary};
use crate::error::{FicoreError, Result};
use crate::i18n::{Language, translate};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 400;

/// Chart colours as RGB triples
pub mod palette {
    pub const GREEN: [u8; 3] = [0x2E, 0x7D, 0x32];
    pub const RED: [u8; 3] = [0xDC, 0x35, 0x45];
    pub const BLUE: [u8; 3] = [0x02, 0x88, 0xD1];
    pub const AMBER: [u8; 3] = [0xFF, 0xB3, 0x00];
    pub const LIGHT_GREEN: [u8; 3] = [0x4C, 0xAF, 0x50];
    pub const PURPLE: [u8; 3] = [0x9C, 0x27, 0xB0];
    pub const DARK_RED: [u8; 3] = [0xD3, 0x2F, 0x2F];

    /// Slice colours, cycled when a pie has more slices
    pub const SLICES: [[u8; 3]; 6] = [GREEN, RED, BLUE, AMBER, LIGHT_GREEN, PURPLE];
}

fn rgb([r, g, b]: [u8; 3]) -> RGBColor {
    RGBColor(r, g, b)
}

/// One bar or one pie slice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datum {
    pub label: String,
    pub value: f64,
    pub color: [u8; 3],
}

impl Datum {
    pub fn new(label: impl Into<String>, value: f64, color: [u8; 3]) -> Self {
        Datum {
            label: label.into(),
            value,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Chart {
    Bar {
        title: String,
        y_desc: String,
        bars: Vec<Datum>,
    },
    Pie {
        title: String,
        slices: Vec<Datum>,
    },
}

impl Chart {
    /// Draw the chart as a standalone `<svg>` element
    ///
    /// # Errors
    /// * `FicoreError::Chart` - a pie without any positive slice, or plotters
    ///   failed to draw
    pub fn render(&self) -> Result<String> {
        let mut svg = String::new();
        let drawn = match self {
            Chart::Bar {
                title,
                y_desc,
                bars,
            } => draw_bars(&mut svg, title, y_desc, bars),
            Chart::Pie { title, slices } => {
                if slices.iter().all(|s| s.value <= 0.0) {
                    return Err(FicoreError::Chart(format!("'{}' has nothing to show", title)));
                }
                draw_pie(&mut svg, title, slices)
            }
        };
        drawn.map_err(|e| FicoreError::Chart(e.to_string()))?;
        Ok(svg)
    }

    fn title(&self) -> &str {
        match self {
            Chart::Bar { title, .. } | Chart::Pie { title, .. } => title,
        }
    }
}

fn draw_bars(
    svg: &mut String,
    title: &str,
    y_desc: &str,
    bars: &[Datum],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::with_string(svg, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let top = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
    let bottom = bars.iter().map(|b| b.value).fold(0.0_f64, f64::min);
    let (top, bottom) = if top == bottom {
        (1.0, 0.0)
    } else {
        (top * 1.15, bottom * 1.15)
    };

    let labels: Vec<&str> = bars.iter().map(|b| b.label.as_str()).collect();
    let count = bars.len().max(1) as i32;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24).into_font())
        .margin(15)
        .x_label_area_size(35)
        .y_label_area_size(80)
        .build_cartesian_2d((0..count).into_segmented(), bottom..top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_label_formatter(&|value: &SegmentValue<i32>| match value {
            SegmentValue::CenterOf(i) => labels
                .get(*i as usize)
                .map(|label| label.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
        let i = i as i32;
        let mut rect = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), bar.value),
            ],
            rgb(bar.color).filled(),
        );
        rect.set_margin(0, 0, 20, 20);
        rect
    }))?;

    root.present()?;
    Ok(())
}

fn draw_pie(
    svg: &mut String,
    title: &str,
    slices: &[Datum],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::with_string(svg, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled(title, ("sans-serif", 24).into_font())?;

    // negative shares cannot be drawn
    let shown: Vec<&Datum> = slices.iter().filter(|s| s.value > 0.0).collect();
    let sizes: Vec<f64> = shown.iter().map(|s| s.value).collect();
    let colors: Vec<RGBColor> = shown.iter().map(|s| rgb(s.color)).collect();
    let labels: Vec<String> = shown.iter().map(|s| s.label.clone()).collect();

    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = f64::from(width.min(height)) * 0.33;

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 14).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 13).into_font().color(&WHITE));
    pie.donut_hole(radius * 0.3);
    area.draw(&pie)?;

    root.present()?;
    Ok(())
}

/// Rendered markup for `chart`, memoized in `cache`
///
/// Failures are logged and replaced by the localized
/// "Chart failed to load" text, which is cached like any other fragment.
pub fn cached_fragment(cache: &TtlCache<String, String>, chart: &Chart, language: Language) -> String {
    let key = match serde_json::to_string(chart) {
        Ok(json) => format!("{}:{}", language, json),
        Err(_) => return fragment(chart, language),
    };
    cache.get_or_insert_with(key, || fragment(chart, language))
}

fn fragment(chart: &Chart, language: Language) -> String {
    match chart.render() {
        Ok(svg) => svg,
        Err(e) => {
            error!("Error generating chart '{}': {}", chart.title(), e);
            translate("Chart failed to load. Please try again.", language)
        }
    }
}

/// Income against debt, and score against the average score
pub fn health_score_charts(
    income: f64,
    debt: f64,
    score: f64,
    average_score: f64,
    language: Language,
) -> (Chart, Chart) {
    let title = translate("Financial Health", language);
    let money = Chart::Bar {
        title: title.clone(),
        y_desc: "Amount (₦)".to_string(),
        bars: vec![
            Datum::new(translate("Money You Get", language), income, palette::GREEN),
            Datum::new(translate("Money You Owe", language), debt, palette::DARK_RED),
        ],
    };
    let comparison = Chart::Bar {
        title,
        y_desc: "Score".to_string(),
        bars: vec![
            Datum::new(translate("Your Score", language), score, palette::BLUE),
            Datum::new(translate("Average Score", language), average_score, palette::AMBER),
        ],
    };
    (money, comparison)
}

/// Asset/liability split, and the user against the average net worth
pub fn net_worth_charts(
    assets: f64,
    liabilities: f64,
    net_worth: f64,
    average_net_worth: f64,
    language: Language,
) -> (Chart, Chart) {
    let breakdown = Chart::Pie {
        title: translate("Asset-Liability Breakdown", language),
        slices: vec![
            Datum::new(translate("Assets", language), assets, palette::GREEN),
            Datum::new(translate("Liabilities", language), liabilities, palette::RED),
        ],
    };
    let comparison = Chart::Bar {
        title: translate("Comparison to Peers", language),
        y_desc: "Amount (₦)".to_string(),
        bars: vec![
            Datum::new(translate("Your Net Worth", language), net_worth, palette::GREEN),
            Datum::new(
                translate("Average Net Worth", language),
                average_net_worth,
                palette::BLUE,
            ),
        ],
    };
    (breakdown, comparison)
}

/// Expense categories plus the savings, which never go below zero
pub fn budget_chart(budget: &BudgetInput, language: Language) -> Chart {
    let savings = budget.summary().savings.max(0.0);
    let parts = [
        ("Housing", budget.housing),
        ("Food", budget.food),
        ("Transport", budget.transport),
        ("Other", budget.other),
        ("Savings", savings),
    ];
    Chart::Pie {
        title: translate("Budget Breakdown", language),
        slices: parts
            .iter()
            .zip(palette::SLICES)
            .map(|((label, value), color)| Datum::new(translate(label, language), *value, color))
            .collect(),
    }
}

pub fn quiz_chart(score: usize, language: Language) -> Chart {
    Chart::Bar {
        title: translate("Quiz Score", language),
        y_desc: "Score (out of 10)".to_string(),
        bars: vec![Datum::new(
            translate("Your Score", language),
            score as f64,
            palette::GREEN,
        )],
    }
}

pub fn emergency_fund_chart(monthly_expenses: f64, recommended_fund: f64, language: Language) -> Chart {
    Chart::Bar {
        title: translate("Emergency Fund", language),
        y_desc: "Amount (₦)".to_string(),
        bars: vec![
            Datum::new(
                translate("Monthly Expenses", language),
                monthly_expenses,
                palette::DARK_RED,
            ),
            Datum::new(
                translate("Recommended Fund", language),
                recommended_fund,
                palette::GREEN,
            ),
        ],
    }
}

/// Pie of the absolute signed total per category; `None` without transactions
pub fn expense_chart(summary: &ExpenseSummary, language: Language) -> Option<Chart> {
    if summary.by_category.is_empty() {
        return None;
    }
    Some(Chart::Pie {
        title: translate("Expense Breakdown by Category", language),
        slices: summary
            .by_category
            .iter()
            .zip(palette::SLICES.iter().cycle())
            .map(|((category, total), color)| Datum::new(category.clone(), total.abs(), *color))
            .collect(),
    })
}

/// Markup for the expense dashboard chart
pub fn expense_fragment(
    cache: &TtlCache<String, String>,
    summary: &ExpenseSummary,
    language: Language,
) -> String {
    match expense_chart(summary, language) {
        Some(chart) => cached_fragment(cache, &chart, language),
        None => translate("No expense data available.", language),
    }
}
