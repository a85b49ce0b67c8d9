use std::io;
use std::string::FromUtf8Error;

use clap::ValueEnum;
use tabled::{Table, builder::Builder};
use thiserror::Error;

use crate::core::{Projection, YearRecord};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV: {0}")]
    Io(#[from] io::Error),
    #[error("CSV output is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

const COLUMNS: [&str; 13] = [
    "year",
    "total_loan",
    "estimated_total_capital",
    "monthly_interest_payment",
    "monthly_loan_repayment",
    "monthly_rent",
    "monthly_apartment_spend",
    "monthly_spending",
    "monthly_income",
    "monthly_leftover",
    "invested_capital",
    "property_value",
    "property_equity",
];

fn amounts(record: &YearRecord) -> [f64; 12] {
    [
        record.total_loan,
        record.estimated_total_capital,
        record.monthly_interest_payment,
        record.monthly_loan_repayment,
        record.monthly_rent,
        record.monthly_apartment_spend,
        record.monthly_spending,
        record.monthly_income,
        record.monthly_leftover,
        record.invested_capital,
        record.property_value,
        record.property_equity,
    ]
}

pub fn render(projection: &Projection, format: OutputFormat) -> Result<String, RenderError> {
    match format {
        OutputFormat::Table => Ok(render_table(projection)),
        OutputFormat::Csv => render_csv(&projection.records),
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(projection)?)),
    }
}

pub fn render_csv(records: &[YearRecord]) -> Result<String, RenderError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for record in records {
        let mut row = Vec::with_capacity(COLUMNS.len());
        row.push(record.year.to_string());
        row.extend(amounts(record).iter().map(|value| value.to_string()));
        writer.write_record(&row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn render_table(projection: &Projection) -> String {
    let mut records = Builder::default();
    records.push_record([
        "Year",
        "Loan",
        "TotalCapital",
        "Interest",
        "Repay",
        "Rent",
        "AptSpend",
        "Spending",
        "Income",
        "Leftover",
        "Invested",
        "PropValue",
        "Equity",
    ]);
    for record in &projection.records {
        let mut row = Vec::with_capacity(COLUMNS.len());
        row.push(record.year.to_string());
        row.extend(amounts(record).iter().map(|value| format!("{value:.2}")));
        records.push_record(row);
    }

    let summary = &projection.summary;
    let payoff = match summary.loan_payoff_year {
        Some(year) => format!("year {year}"),
        None => "outstanding at end of horizon".to_string(),
    };
    let mut totals = Builder::default();
    totals.push_record(["Field", "Value"]);
    for (field, value) in [
        (
            "Final total capital",
            format!("{:.2}", summary.final_estimated_total_capital),
        ),
        (
            "Final property equity",
            format!("{:.2}", summary.final_property_equity),
        ),
        ("Final ETF capital", format!("{:.2}", summary.final_etf_capital)),
        ("Interest paid", format!("{:.2}", summary.total_interest_paid)),
        ("Loan repaid", format!("{:.2}", summary.total_loan_repaid)),
        ("Rent paid", format!("{:.2}", summary.total_rent_paid)),
        ("Loan payoff", payoff),
    ] {
        totals.push_record([field.to_string(), value]);
    }

    format!(
        "{}\n\nSummary:\n{}\n",
        Table::from(records),
        Table::from(totals)
    )
}
