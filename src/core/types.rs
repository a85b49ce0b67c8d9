use serde::{Deserialize, Serialize};

/// Inputs to a single buy-vs-rent projection.
///
/// Rates are fractional yearly rates (`0.03` is 3%). Amounts are in the same
/// currency throughout; monthly amounts are per month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub mortgage_apartment_price: f64,
    pub mortgage_down_payment_rate: f64,
    pub mortgage_total_fees_rate: f64,
    pub mortgage_interest_rate: f64,
    pub mortgage_yearly_repayment_rate: f64,
    /// Years between resets of the annuity base; `0` never refinances.
    pub mortgage_refinancing_years: u32,
    pub etf_yearly_return_rate: f64,
    pub cold_rent_monthly_cost: f64,
    pub cold_rent_yearly_increase_rate: f64,
    pub initial_capital: f64,
    pub monthly_net_income: f64,
    pub monthly_spending: f64,
    pub yearly_income_increase_rate: f64,
    pub yearly_inflation_rate: f64,
    pub yearly_apartment_raise_rate: f64,
    pub years: u32,
}

/// Values computed once from validated [`Parameters`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedParameters {
    pub mortgage_down_payment: f64,
    pub mortgage_total_fees: f64,
    pub initial_loan: f64,
    /// Initial capital left after the down payment and fees.
    pub initial_invested_capital: f64,
    pub monthly_inflation_rate: f64,
    pub monthly_etf_rate: f64,
}

/// End-of-year snapshot. Year 0 describes the starting position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub total_loan: f64,
    pub estimated_total_capital: f64,
    pub monthly_interest_payment: f64,
    pub monthly_loan_repayment: f64,
    pub monthly_rent: f64,
    pub monthly_apartment_spend: f64,
    pub monthly_spending: f64,
    pub monthly_income: f64,
    /// Leftover cash of the last month of the year.
    pub monthly_leftover: f64,
    /// Uncompounded running sum of leftover cash. Reference column only; the
    /// compounded market capital is what feeds `estimated_total_capital`.
    pub invested_capital: f64,
    pub property_value: f64,
    pub property_equity: f64,
}

impl YearRecord {
    /// Capital held in the market instrument at year end.
    pub fn etf_capital(&self) -> f64 {
        self.estimated_total_capital - self.property_equity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub final_estimated_total_capital: f64,
    pub final_property_equity: f64,
    pub final_etf_capital: f64,
    pub total_interest_paid: f64,
    pub total_loan_repaid: f64,
    pub total_rent_paid: f64,
    pub loan_payoff_year: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub records: Vec<YearRecord>,
    pub summary: ProjectionSummary,
}

/// Reference scenario: 300k apartment, 20% down, 5% fees, 30 years.
#[cfg(test)]
pub(crate) fn reference_parameters() -> Parameters {
    Parameters {
        mortgage_apartment_price: 300_000.0,
        mortgage_down_payment_rate: 0.20,
        mortgage_total_fees_rate: 0.05,
        mortgage_interest_rate: 0.03,
        mortgage_yearly_repayment_rate: 0.02,
        mortgage_refinancing_years: 10,
        etf_yearly_return_rate: 0.05,
        cold_rent_monthly_cost: 1_200.0,
        cold_rent_yearly_increase_rate: 0.02,
        initial_capital: 100_000.0,
        monthly_net_income: 4_000.0,
        monthly_spending: 2_000.0,
        yearly_income_increase_rate: 0.02,
        yearly_inflation_rate: 0.02,
        yearly_apartment_raise_rate: 0.02,
        years: 30,
    }
}
