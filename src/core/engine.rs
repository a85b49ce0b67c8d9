use log::{debug, trace};

use super::types::{DerivedParameters, Parameters, Projection, ProjectionSummary, YearRecord};
use super::validate::{ProjectionError, validate};

const MONTHS_PER_YEAR: u32 = 12;

/// Loop-carried values of a projection. Each step returns a new state.
#[derive(Debug, Clone, Copy)]
struct ProjectionState {
    loan_outstanding: f64,
    /// Principal the current installments are computed from.
    loan_base: f64,
    invested_capital: f64,
    etf_capital: f64,
    monthly_income: f64,
    monthly_rent: f64,
    monthly_spending: f64,
}

/// Flat monthly mortgage installments for one year.
#[derive(Debug, Clone, Copy)]
struct Installments {
    interest: f64,
    repayment: f64,
}

impl Installments {
    fn from_base(params: &Parameters, loan_base: f64) -> Self {
        Self {
            interest: loan_base * params.mortgage_interest_rate / 12.0,
            repayment: loan_base * params.mortgage_yearly_repayment_rate / 12.0,
        }
    }
}

impl ProjectionState {
    fn initial(params: &Parameters, derived: &DerivedParameters) -> Self {
        Self {
            loan_outstanding: derived.initial_loan,
            loan_base: derived.initial_loan,
            invested_capital: derived.initial_invested_capital,
            etf_capital: derived.initial_invested_capital,
            monthly_income: params.monthly_net_income,
            monthly_rent: params.cold_rent_monthly_cost,
            monthly_spending: params.monthly_spending,
        }
    }

    /// One month of cash flow. Returns the next state and that month's leftover.
    fn advance_month(
        self,
        derived: &DerivedParameters,
        apartment_spend: f64,
        repayment: f64,
    ) -> (Self, f64) {
        let leftover = self.monthly_income - apartment_spend - self.monthly_spending;
        let next = Self {
            invested_capital: self.invested_capital + leftover,
            etf_capital: self.etf_capital * (1.0 + derived.monthly_etf_rate) + leftover,
            monthly_spending: self.monthly_spending * (1.0 + derived.monthly_inflation_rate),
            loan_outstanding: self.loan_outstanding - repayment.min(self.loan_outstanding),
            ..self
        };
        (next, leftover)
    }

    /// Runs the twelve months of `year` and emits its end-of-year record
    /// together with the state the next year starts from.
    fn close_year(
        self,
        params: &Parameters,
        derived: &DerivedParameters,
        year: u32,
    ) -> (Self, YearRecord) {
        let appreciation = (1.0 + params.yearly_apartment_raise_rate).powf(f64::from(year));
        let property_value = params.mortgage_apartment_price * appreciation;
        let installments = Installments::from_base(params, self.loan_base);
        let apartment_spend = self.monthly_rent + installments.interest + installments.repayment;

        let (state, last_leftover) = (0..MONTHS_PER_YEAR).fold((self, 0.0), |(state, _), _| {
            state.advance_month(derived, apartment_spend, installments.repayment)
        });

        let property_equity = property_value - state.loan_outstanding;
        let record = YearRecord {
            year,
            total_loan: state.loan_outstanding,
            estimated_total_capital: property_equity + state.etf_capital,
            monthly_interest_payment: installments.interest,
            monthly_loan_repayment: installments.repayment,
            monthly_rent: state.monthly_rent,
            monthly_apartment_spend: apartment_spend,
            monthly_spending: state.monthly_spending,
            monthly_income: state.monthly_income,
            monthly_leftover: last_leftover,
            invested_capital: state.invested_capital,
            property_value,
            property_equity,
        };
        trace!(
            "year {year}: loan={:.2} capital={:.2} leftover={:.2}",
            record.total_loan, record.estimated_total_capital, record.monthly_leftover
        );

        (state.roll_forward(params, year), record)
    }

    /// Yearly income and rent growth, then the annuity base update.
    fn roll_forward(self, params: &Parameters, year: u32) -> Self {
        let loan_base = if self.loan_outstanding <= 0.0 {
            if self.loan_base > 0.0 {
                debug!("loan paid off in year {year}");
            }
            0.0
        } else if refinancing_due(params.mortgage_refinancing_years, year) {
            debug!(
                "refinancing in year {year}: base {:.2} -> {:.2}",
                self.loan_base, self.loan_outstanding
            );
            self.loan_outstanding
        } else {
            self.loan_base
        };

        Self {
            loan_base,
            monthly_income: self.monthly_income * (1.0 + params.yearly_income_increase_rate),
            monthly_rent: self.monthly_rent * (1.0 + params.cold_rent_yearly_increase_rate),
            ..self
        }
    }
}

/// A refinancing interval of zero never refinances.
fn refinancing_due(interval_years: u32, year: u32) -> bool {
    interval_years > 0 && year % interval_years == 0
}

fn opening_record(params: &Parameters) -> YearRecord {
    YearRecord {
        year: 0,
        total_loan: 0.0,
        estimated_total_capital: params.initial_capital,
        monthly_interest_payment: 0.0,
        monthly_loan_repayment: 0.0,
        monthly_rent: params.cold_rent_monthly_cost,
        monthly_apartment_spend: params.cold_rent_monthly_cost,
        monthly_spending: params.monthly_spending,
        monthly_income: params.monthly_net_income,
        monthly_leftover: params.monthly_net_income
            - params.monthly_spending
            - params.cold_rent_monthly_cost,
        invested_capital: params.initial_capital,
        property_value: 0.0,
        property_equity: 0.0,
    }
}

fn run_projection(params: &Parameters, derived: &DerivedParameters) -> Vec<YearRecord> {
    debug!(
        "projecting {} years: loan={:.2} invested={:.2}",
        params.years, derived.initial_loan, derived.initial_invested_capital
    );

    let mut records = vec![opening_record(params)];
    records.extend(
        (1..=params.years).scan(ProjectionState::initial(params, derived), |state, year| {
            let (next, record) = state.close_year(params, derived, year);
            *state = next;
            Some(record)
        }),
    );
    records
}

fn summarize(records: &[YearRecord], derived: &DerivedParameters) -> ProjectionSummary {
    let months = f64::from(MONTHS_PER_YEAR);
    let simulated = records.iter().filter(|record| record.year > 0);
    let (total_interest_paid, total_rent_paid) =
        simulated.fold((0.0, 0.0), |(interest, rent), record| {
            (
                interest + record.monthly_interest_payment * months,
                rent + record.monthly_rent * months,
            )
        });

    let last = records.last().copied().unwrap_or_default();
    let loan_payoff_year = if derived.initial_loan > 0.0 {
        records
            .iter()
            .find(|record| record.year > 0 && record.total_loan <= 0.0)
            .map(|record| record.year)
    } else {
        None
    };

    ProjectionSummary {
        final_estimated_total_capital: last.estimated_total_capital,
        final_property_equity: last.property_equity,
        final_etf_capital: last.etf_capital(),
        total_interest_paid,
        total_loan_repaid: derived.initial_loan - last.total_loan,
        total_rent_paid,
        loan_payoff_year,
    }
}

/// Yearly buy-vs-rent records for `params`, year 0 through `params.years`.
pub fn project_records(params: &Parameters) -> Result<Vec<YearRecord>, ProjectionError> {
    let derived = validate(params)?;
    Ok(run_projection(params, &derived))
}

/// Yearly records plus a summary of the whole horizon.
pub fn project(params: &Parameters) -> Result<Projection, ProjectionError> {
    let derived = validate(params)?;
    let records = run_projection(params, &derived);
    let summary = summarize(&records, &derived);
    Ok(Projection { records, summary })
}
