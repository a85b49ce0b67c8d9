mod output;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{InvalidParameter, Parameters, Projection, ProjectionError, project};

pub use output::{OutputFormat, RenderError, render, render_csv, render_table};

#[derive(Parser, Debug)]
#[command(
    name = "buy-vs-rent",
    about = "Year-by-year projection of buying an apartment on a mortgage while renting and investing the surplus"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one projection and print it
    Project {
        #[command(flatten)]
        args: ProjectArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Serve the projection as a JSON HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Projection inputs as given on the command line. Rates are in percent.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProjectArgs {
    #[arg(long, default_value_t = 300_000.0, help = "Purchase price of the apartment")]
    pub mortgage_apartment_price: f64,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Down payment in percent of the price"
    )]
    pub mortgage_down_payment_rate: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Purchase fees in percent of the price, paid upfront"
    )]
    pub mortgage_total_fees_rate: f64,
    #[arg(long, default_value_t = 3.0, help = "Yearly mortgage interest in percent")]
    pub mortgage_interest_rate: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Yearly principal repayment in percent of the annuity base"
    )]
    pub mortgage_yearly_repayment_rate: f64,
    #[arg(
        long,
        default_value_t = 10,
        help = "Years between refinancings; 0 never refinances"
    )]
    pub mortgage_refinancing_years: u32,
    #[arg(long, default_value_t = 5.0, help = "Expected yearly ETF return in percent")]
    pub etf_yearly_return_rate: f64,
    #[arg(long, default_value_t = 1_200.0, help = "Monthly cold rent")]
    pub cold_rent_monthly_cost: f64,
    #[arg(long, default_value_t = 2.0, help = "Yearly rent increase in percent")]
    pub cold_rent_yearly_increase_rate: f64,
    #[arg(long, default_value_t = 100_000.0)]
    pub initial_capital: f64,
    #[arg(long, default_value_t = 4_000.0)]
    pub monthly_net_income: f64,
    #[arg(
        long,
        default_value_t = 2_000.0,
        help = "Monthly living costs excluding rent and mortgage"
    )]
    pub monthly_spending: f64,
    #[arg(long, default_value_t = 2.0, help = "Yearly income increase in percent")]
    pub yearly_income_increase_rate: f64,
    #[arg(long, default_value_t = 2.0, help = "Yearly inflation in percent")]
    pub yearly_inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Yearly apartment value increase in percent"
    )]
    pub yearly_apartment_raise_rate: f64,
    #[arg(long, default_value_t = 30, help = "Projection horizon in years")]
    pub years: u32,
}

impl Default for ProjectArgs {
    fn default() -> Self {
        Self {
            mortgage_apartment_price: 300_000.0,
            mortgage_down_payment_rate: 20.0,
            mortgage_total_fees_rate: 5.0,
            mortgage_interest_rate: 3.0,
            mortgage_yearly_repayment_rate: 2.0,
            mortgage_refinancing_years: 10,
            etf_yearly_return_rate: 5.0,
            cold_rent_monthly_cost: 1_200.0,
            cold_rent_yearly_increase_rate: 2.0,
            initial_capital: 100_000.0,
            monthly_net_income: 4_000.0,
            monthly_spending: 2_000.0,
            yearly_income_increase_rate: 2.0,
            yearly_inflation_rate: 2.0,
            yearly_apartment_raise_rate: 2.0,
            years: 30,
        }
    }
}

/// Request body or query string for `/api/project`. Missing fields keep their
/// command-line defaults; rates are in percent.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    mortgage_apartment_price: Option<f64>,
    mortgage_down_payment_rate: Option<f64>,
    mortgage_total_fees_rate: Option<f64>,
    mortgage_interest_rate: Option<f64>,
    mortgage_yearly_repayment_rate: Option<f64>,
    mortgage_refinancing_years: Option<u32>,
    etf_yearly_return_rate: Option<f64>,
    cold_rent_monthly_cost: Option<f64>,
    cold_rent_yearly_increase_rate: Option<f64>,
    initial_capital: Option<f64>,
    monthly_net_income: Option<f64>,
    monthly_spending: Option<f64>,
    yearly_income_increase_rate: Option<f64>,
    yearly_inflation_rate: Option<f64>,
    yearly_apartment_raise_rate: Option<f64>,
    years: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    parameters: Parameters,
    #[serde(flatten)]
    projection: Projection,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<InvalidParameter>,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

pub fn build_parameters(args: &ProjectArgs) -> Parameters {
    Parameters {
        mortgage_apartment_price: args.mortgage_apartment_price,
        mortgage_down_payment_rate: args.mortgage_down_payment_rate / 100.0,
        mortgage_total_fees_rate: args.mortgage_total_fees_rate / 100.0,
        mortgage_interest_rate: args.mortgage_interest_rate / 100.0,
        mortgage_yearly_repayment_rate: args.mortgage_yearly_repayment_rate / 100.0,
        mortgage_refinancing_years: args.mortgage_refinancing_years,
        etf_yearly_return_rate: args.etf_yearly_return_rate / 100.0,
        cold_rent_monthly_cost: args.cold_rent_monthly_cost,
        cold_rent_yearly_increase_rate: args.cold_rent_yearly_increase_rate / 100.0,
        initial_capital: args.initial_capital,
        monthly_net_income: args.monthly_net_income,
        monthly_spending: args.monthly_spending,
        yearly_income_increase_rate: args.yearly_income_increase_rate / 100.0,
        yearly_inflation_rate: args.yearly_inflation_rate / 100.0,
        yearly_apartment_raise_rate: args.yearly_apartment_raise_rate / 100.0,
        years: args.years,
    }
}

/// Runs the `project` subcommand and returns the rendered output.
pub fn run_project_command(args: &ProjectArgs, format: OutputFormat) -> Result<String, CommandError> {
    let params = build_parameters(args);
    let projection = project(&params)?;
    info!(
        "projected {} years, final capital {:.2}",
        params.years, projection.summary.final_estimated_total_capital
    );
    Ok(render(&projection, format)?)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("buy-vs-rent HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found".to_string(), Vec::new())
}

async fn project_get_handler(payload: Result<Query<ProjectPayload>, QueryRejection>) -> Response {
    match payload {
        Ok(Query(payload)) => project_handler_impl(payload),
        Err(rejection) => malformed_payload_response(rejection.body_text()),
    }
}

async fn project_post_handler(payload: Result<Json<ProjectPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => project_handler_impl(payload),
        Err(rejection) => malformed_payload_response(rejection.body_text()),
    }
}

fn malformed_payload_response(reason: String) -> Response {
    warn!("rejected malformed projection request: {reason}");
    error_response(StatusCode::BAD_REQUEST, reason, Vec::new())
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let parameters = build_parameters(&args_from_payload(payload));
    match project(&parameters) {
        Ok(projection) => json_response(
            StatusCode::OK,
            ProjectResponse {
                parameters,
                projection,
            },
        ),
        Err(err) => {
            warn!("rejected projection request: {err}");
            let violations = err.violations().to_vec();
            error_response(StatusCode::BAD_REQUEST, err.to_string(), violations)
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, error: String, violations: Vec<InvalidParameter>) -> Response {
    json_response(status, ErrorResponse { error, violations })
}

fn args_from_payload(payload: ProjectPayload) -> ProjectArgs {
    let defaults = ProjectArgs::default();
    ProjectArgs {
        mortgage_apartment_price: payload
            .mortgage_apartment_price
            .unwrap_or(defaults.mortgage_apartment_price),
        mortgage_down_payment_rate: payload
            .mortgage_down_payment_rate
            .unwrap_or(defaults.mortgage_down_payment_rate),
        mortgage_total_fees_rate: payload
            .mortgage_total_fees_rate
            .unwrap_or(defaults.mortgage_total_fees_rate),
        mortgage_interest_rate: payload
            .mortgage_interest_rate
            .unwrap_or(defaults.mortgage_interest_rate),
        mortgage_yearly_repayment_rate: payload
            .mortgage_yearly_repayment_rate
            .unwrap_or(defaults.mortgage_yearly_repayment_rate),
        mortgage_refinancing_years: payload
            .mortgage_refinancing_years
            .unwrap_or(defaults.mortgage_refinancing_years),
        etf_yearly_return_rate: payload
            .etf_yearly_return_rate
            .unwrap_or(defaults.etf_yearly_return_rate),
        cold_rent_monthly_cost: payload
            .cold_rent_monthly_cost
            .unwrap_or(defaults.cold_rent_monthly_cost),
        cold_rent_yearly_increase_rate: payload
            .cold_rent_yearly_increase_rate
            .unwrap_or(defaults.cold_rent_yearly_increase_rate),
        initial_capital: payload.initial_capital.unwrap_or(defaults.initial_capital),
        monthly_net_income: payload
            .monthly_net_income
            .unwrap_or(defaults.monthly_net_income),
        monthly_spending: payload
            .monthly_spending
            .unwrap_or(defaults.monthly_spending),
        yearly_income_increase_rate: payload
            .yearly_income_increase_rate
            .unwrap_or(defaults.yearly_income_increase_rate),
        yearly_inflation_rate: payload
            .yearly_inflation_rate
            .unwrap_or(defaults.yearly_inflation_rate),
        yearly_apartment_raise_rate: payload
            .yearly_apartment_raise_rate
            .unwrap_or(defaults.yearly_apartment_raise_rate),
        years: payload.years.unwrap_or(defaults.years),
    }
}

#[cfg(test)]
fn args_from_json(json: &str) -> Result<ProjectArgs, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(args_from_payload(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference_parameters;
    use axum::body::to_bytes;
    use axum::http::Uri;

    const EPS: f64 = 1e-12;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("test runtime")
            .block_on(future)
    }

    fn body_json(response: Response) -> serde_json::Value {
        let bytes = block_on(to_bytes(response.into_body(), usize::MAX)).expect("response body");
        serde_json::from_slice(&bytes).expect("response is JSON")
    }

    #[test]
    fn cli_defaults_match_default_args() {
        let cli = Cli::try_parse_from(["buy-vs-rent", "project"]).expect("defaults parse");
        let Command::Project { args, format } = cli.command else {
            panic!("expected project subcommand");
        };
        assert_eq!(args, ProjectArgs::default());
        assert_eq!(format, OutputFormat::Table);
    }

    #[test]
    fn cli_parses_flags_in_percent() {
        let cli = Cli::try_parse_from([
            "buy-vs-rent",
            "project",
            "--mortgage-interest-rate",
            "4.5",
            "--mortgage-refinancing-years",
            "0",
            "--years",
            "12",
            "--format",
            "csv",
        ])
        .expect("flags parse");
        let Command::Project { args, format } = cli.command else {
            panic!("expected project subcommand");
        };
        let params = build_parameters(&args);

        assert_approx(params.mortgage_interest_rate, 0.045);
        assert_eq!(params.mortgage_refinancing_years, 0);
        assert_eq!(params.years, 12);
        assert_eq!(format, OutputFormat::Csv);
    }

    #[test]
    fn cli_parses_serve_port() {
        let cli = Cli::try_parse_from(["buy-vs-rent", "serve", "--port", "9000"])
            .expect("serve parses");
        assert!(matches!(cli.command, Command::Serve { port: 9000 }));
    }

    #[test]
    fn default_args_build_reference_parameters() {
        let params = build_parameters(&ProjectArgs::default());
        let reference = reference_parameters();

        assert_approx(params.mortgage_down_payment_rate, reference.mortgage_down_payment_rate);
        assert_approx(params.mortgage_total_fees_rate, reference.mortgage_total_fees_rate);
        assert_approx(params.mortgage_interest_rate, reference.mortgage_interest_rate);
        assert_approx(params.etf_yearly_return_rate, reference.etf_yearly_return_rate);
        assert_approx(params.yearly_inflation_rate, reference.yearly_inflation_rate);
        assert_eq!(params.years, reference.years);
        assert_eq!(
            params.mortgage_refinancing_years,
            reference.mortgage_refinancing_years
        );
    }

    #[test]
    fn args_from_json_overrides_only_given_fields() {
        let json = r#"{
          "mortgageApartmentPrice": 450000,
          "mortgageDownPaymentRate": 30,
          "initialCapital": 200000,
          "etfYearlyReturnRate": 7,
          "years": 25
        }"#;
        let args = args_from_json(json).expect("json should parse");
        let defaults = ProjectArgs::default();

        assert_approx(args.mortgage_apartment_price, 450_000.0);
        assert_approx(args.mortgage_down_payment_rate, 30.0);
        assert_approx(args.initial_capital, 200_000.0);
        assert_approx(args.etf_yearly_return_rate, 7.0);
        assert_eq!(args.years, 25);
        assert_approx(args.cold_rent_monthly_cost, defaults.cold_rent_monthly_cost);
        assert_eq!(
            args.mortgage_refinancing_years,
            defaults.mortgage_refinancing_years
        );
    }

    #[test]
    fn args_from_json_rejects_negative_years() {
        let err = args_from_json(r#"{ "years": -3 }"#).expect_err("u32 field");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn run_project_command_reports_every_violation() {
        let mut args = ProjectArgs::default();
        args.years = 0;
        args.etf_yearly_return_rate = -100.0;

        let err = run_project_command(&args, OutputFormat::Table).expect_err("invalid args");
        let CommandError::Projection(err) = err else {
            panic!("expected projection error");
        };
        let fields: Vec<_> = err.violations().iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["etf_yearly_return_rate", "years"]);
    }

    #[test]
    fn run_project_command_renders_csv() {
        let mut args = ProjectArgs::default();
        args.years = 2;

        let csv = run_project_command(&args, OutputFormat::Csv).expect("valid args");
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn project_handler_returns_records_summary_and_parameters() {
        let payload = ProjectPayload {
            years: Some(5),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&header::HeaderValue::from_static("no-store"))
        );

        let body = body_json(response);
        assert_eq!(body["records"].as_array().map(Vec::len), Some(6));
        assert_eq!(body["records"][1]["totalLoan"], serde_json::json!(235200.0));
        assert_eq!(body["parameters"]["years"], serde_json::json!(5));
        assert_eq!(
            body["parameters"]["mortgageInterestRate"],
            serde_json::json!(0.03)
        );
        assert!(body["summary"]["finalEstimatedTotalCapital"].is_number());
        assert!(body["summary"]["loanPayoffYear"].is_null());
    }

    #[test]
    fn project_handler_rejects_invalid_payload_with_violations() {
        let payload = ProjectPayload {
            mortgage_down_payment_rate: Some(120.0),
            initial_capital: Some(1_000_000.0),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response);
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|msg| msg.contains("cannot exceed mortgage_apartment_price"))
        );
        assert_eq!(
            body["violations"][0]["field"],
            serde_json::json!("mortgage_down_payment")
        );
    }

    #[test]
    fn error_response_omits_empty_violations() {
        let body = body_json(error_response(
            StatusCode::NOT_FOUND,
            "Not found".to_string(),
            Vec::new(),
        ));
        assert_eq!(body, serde_json::json!({ "error": "Not found" }));
    }

    #[test]
    fn project_handler_rejects_horizon_beyond_max_years() {
        let payload = ProjectPayload {
            years: Some(u32::MAX),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response);
        assert_eq!(body["violations"][0]["field"], serde_json::json!("years"));
        assert_eq!(
            body["violations"][0]["constraint"],
            serde_json::json!("must be <= 200")
        );
    }

    #[test]
    fn project_handler_rejects_overflowing_purchase() {
        let payload = ProjectPayload {
            mortgage_apartment_price: Some(1e308),
            mortgage_down_payment_rate: Some(200.0),
            initial_capital: Some(0.0),
            ..ProjectPayload::default()
        };
        let response = project_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response);
        let fields: Vec<&str> = body["violations"]
            .as_array()
            .expect("violations array")
            .iter()
            .filter_map(|violation| violation["field"].as_str())
            .collect();
        assert!(fields.contains(&"mortgage_down_payment"));
        assert!(body.get("records").is_none());
    }

    #[test]
    fn malformed_query_is_answered_with_error_json() {
        let uri: Uri = "/api/project?years=-3".parse().expect("valid uri");
        let rejection =
            Query::<ProjectPayload>::try_from_uri(&uri).expect_err("negative years rejected");

        let response = block_on(project_get_handler(Err(rejection)));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&header::HeaderValue::from_static("no-store"))
        );

        let body = body_json(response);
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|msg| msg.starts_with("Failed to deserialize query string"))
        );
        assert!(body.get("violations").is_none());
    }

    #[test]
    fn well_formed_query_reaches_the_projection() {
        let uri: Uri = "/api/project?years=4&initialCapital=150000"
            .parse()
            .expect("valid uri");
        let query = Query::<ProjectPayload>::try_from_uri(&uri).expect("query parses");

        let response = block_on(project_get_handler(Ok(query)));
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response);
        assert_eq!(body["records"].as_array().map(Vec::len), Some(5));
    }
}
