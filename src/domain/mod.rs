pub mod decimal;
pub mod survey_point;

pub use decimal::{Decimal, DecimalParseError};
pub use survey_point::{Axis, COORDINATE_PRECISION, DiscrepancyEntry, SurveyPointRecord};
