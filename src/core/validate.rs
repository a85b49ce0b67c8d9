use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::types::{DerivedParameters, Parameters};

/// Longest projection horizon accepted, in years.
pub const MAX_YEARS: u32 = 200;

/// One violated constraint on a named input.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{field} {constraint}")]
pub struct InvalidParameter {
    pub field: &'static str,
    pub constraint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("invalid parameters: {}", Violations(.0))]
    InvalidParameters(Vec<InvalidParameter>),
}

impl ProjectionError {
    pub fn violations(&self) -> &[InvalidParameter] {
        match self {
            ProjectionError::InvalidParameters(violations) => violations,
        }
    }
}

struct Violations<'a>(&'a [InvalidParameter]);

impl fmt::Display for Violations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, violation) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Checks {
    violations: Vec<InvalidParameter>,
}

impl Checks {
    fn require(&mut self, ok: bool, field: &'static str, constraint: &'static str) {
        if !ok {
            self.violations.push(InvalidParameter { field, constraint });
        }
    }
}

/// Checks every constraint on `params` and returns the derived starting values.
///
/// All violations are collected before failing so callers can report them in
/// one go. Non-finite inputs are reported on their own and skip the ordering
/// checks of the same field; a derived amount that overflows is reported
/// under its own name.
pub fn validate(params: &Parameters) -> Result<DerivedParameters, ProjectionError> {
    let mut checks = Checks::default();

    for (field, value) in [
        ("mortgage_apartment_price", params.mortgage_apartment_price),
        ("mortgage_down_payment_rate", params.mortgage_down_payment_rate),
        ("mortgage_total_fees_rate", params.mortgage_total_fees_rate),
        ("mortgage_interest_rate", params.mortgage_interest_rate),
        (
            "mortgage_yearly_repayment_rate",
            params.mortgage_yearly_repayment_rate,
        ),
        ("etf_yearly_return_rate", params.etf_yearly_return_rate),
        ("cold_rent_monthly_cost", params.cold_rent_monthly_cost),
        (
            "cold_rent_yearly_increase_rate",
            params.cold_rent_yearly_increase_rate,
        ),
        ("initial_capital", params.initial_capital),
        ("monthly_net_income", params.monthly_net_income),
        ("monthly_spending", params.monthly_spending),
        (
            "yearly_income_increase_rate",
            params.yearly_income_increase_rate,
        ),
        ("yearly_inflation_rate", params.yearly_inflation_rate),
        ("yearly_apartment_raise_rate", params.yearly_apartment_raise_rate),
    ] {
        checks.require(value.is_finite(), field, "must be finite");
    }

    let mortgage_down_payment = params.mortgage_apartment_price * params.mortgage_down_payment_rate;
    let mortgage_total_fees = params.mortgage_apartment_price * params.mortgage_total_fees_rate;

    // Inputs reported as non-finite above skip their ordering checks. Derived
    // amounts of finite inputs are always checked, since the products can
    // overflow.
    let at_least_zero = |value: f64| !value.is_finite() || value >= 0.0;
    let above_total_loss = |value: f64| !value.is_finite() || value > -1.0;
    let down_payment_inputs =
        params.mortgage_apartment_price.is_finite() && params.mortgage_down_payment_rate.is_finite();
    let fees_inputs =
        params.mortgage_apartment_price.is_finite() && params.mortgage_total_fees_rate.is_finite();
    let purchase_inputs = down_payment_inputs && fees_inputs && params.initial_capital.is_finite();

    checks.require(
        at_least_zero(params.mortgage_apartment_price),
        "mortgage_apartment_price",
        "must be >= 0",
    );
    checks.require(
        !down_payment_inputs || mortgage_down_payment.is_finite(),
        "mortgage_down_payment",
        "must be finite",
    );
    checks.require(
        !fees_inputs || mortgage_total_fees.is_finite(),
        "mortgage_total_fees",
        "must be finite",
    );
    checks.require(
        !down_payment_inputs || mortgage_down_payment >= 0.0,
        "mortgage_down_payment",
        "must be >= 0",
    );
    checks.require(
        !fees_inputs || mortgage_total_fees >= 0.0,
        "mortgage_total_fees",
        "must be >= 0",
    );
    checks.require(
        !down_payment_inputs || mortgage_down_payment <= params.mortgage_apartment_price,
        "mortgage_down_payment",
        "cannot exceed mortgage_apartment_price",
    );
    checks.require(
        !purchase_inputs || mortgage_down_payment + mortgage_total_fees <= params.initial_capital,
        "initial_capital",
        "is insufficient to cover down payment and fees",
    );
    checks.require(
        at_least_zero(params.mortgage_interest_rate),
        "mortgage_interest_rate",
        "must be >= 0",
    );
    checks.require(
        at_least_zero(params.mortgage_yearly_repayment_rate),
        "mortgage_yearly_repayment_rate",
        "must be >= 0",
    );

    for (field, rate) in [
        ("etf_yearly_return_rate", params.etf_yearly_return_rate),
        ("yearly_inflation_rate", params.yearly_inflation_rate),
        ("yearly_apartment_raise_rate", params.yearly_apartment_raise_rate),
        (
            "cold_rent_yearly_increase_rate",
            params.cold_rent_yearly_increase_rate,
        ),
        (
            "yearly_income_increase_rate",
            params.yearly_income_increase_rate,
        ),
    ] {
        checks.require(above_total_loss(rate), field, "must be > -1.0");
    }

    for (field, amount) in [
        ("cold_rent_monthly_cost", params.cold_rent_monthly_cost),
        ("monthly_net_income", params.monthly_net_income),
        ("monthly_spending", params.monthly_spending),
    ] {
        checks.require(at_least_zero(amount), field, "must be >= 0");
    }

    checks.require(params.years > 0, "years", "must be > 0");
    checks.require(params.years <= MAX_YEARS, "years", "must be <= 200");

    if !checks.violations.is_empty() {
        return Err(ProjectionError::InvalidParameters(checks.violations));
    }

    Ok(DerivedParameters {
        mortgage_down_payment,
        mortgage_total_fees,
        initial_loan: params.mortgage_apartment_price - mortgage_down_payment,
        initial_invested_capital: params.initial_capital
            - mortgage_down_payment
            - mortgage_total_fees,
        monthly_inflation_rate: monthly_rate(params.yearly_inflation_rate),
        monthly_etf_rate: monthly_rate(params.etf_yearly_return_rate),
    })
}

/// Monthly rate that compounds to `yearly_rate` over twelve months.
fn monthly_rate(yearly_rate: f64) -> f64 {
    (1.0 + yearly_rate).powf(1.0 / 12.0) - 1.0
}
