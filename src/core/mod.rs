mod engine;
mod types;
mod validate;

pub use engine::{project, project_records};
pub use types::{DerivedParameters, Parameters, Projection, ProjectionSummary, YearRecord};
pub use validate::{InvalidParameter, MAX_YEARS, ProjectionError, validate};

#[cfg(test)]
pub(crate) use types::reference_parameters;
