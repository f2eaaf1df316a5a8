use crate::domain::{Decimal, DecimalParseError, SurveyPointRecord};

/// Fields per row: `::id, ::lat, latitude, ::lon, longitude`
pub const FIELD_COUNT: usize = 5;

const FIELD_NAMES: [&str; FIELD_COUNT] = ["id", "lat", "latitude", "lon", "longitude"];

/// What is wrong with a CSV row
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowDefect {
    #[error("expected {expected} fields, found {0}", expected = FIELD_COUNT)]
    FieldCount(usize),
    #[error("invalid node id {0:?}")]
    InvalidId(String),
    #[error("invalid {field} value {value:?}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        source: DecimalParseError,
    },
}

/// A CSV row that could not be turned into a [`SurveyPointRecord`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed row {line} ({content:?}): {defect}")]
pub struct MalformedRowError {
    /// 1-based line number in the response body
    pub line: usize,
    pub content: String,
    pub defect: RowDefect,
}

/// Split the Overpass CSV body into rows
///
/// Blank lines are skipped; the returned line numbers are 1-based positions in
/// the body so a malformed row can be found in the saved response.
pub fn csv_rows(body: &str) -> impl Iterator<Item = (usize, &str)> {
    body.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
}

/// Parse one `id,lat,latitude,lon,longitude` row
pub fn parse_row(line_no: usize, line: &str) -> Result<SurveyPointRecord, MalformedRowError> {
    parse_fields(line).map_err(|defect| MalformedRowError {
        line: line_no,
        content: line.to_string(),
        defect,
    })
}

fn parse_fields(line: &str) -> Result<SurveyPointRecord, RowDefect> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let &[id, element_lat, tag_lat, element_lon, tag_lon] = fields.as_slice() else {
        return Err(RowDefect::FieldCount(fields.len()));
    };

    let id: u64 = id
        .parse()
        .map_err(|_| RowDefect::InvalidId(id.to_string()))?;

    Ok(SurveyPointRecord {
        id,
        element_lat: parse_number(1, element_lat)?,
        tag_lat: parse_number(2, tag_lat)?,
        element_lon: parse_number(3, element_lon)?,
        tag_lon: parse_number(4, tag_lon)?,
    })
}

fn parse_number(index: usize, value: &str) -> Result<Decimal, RowDefect> {
    value.parse().map_err(|source| RowDefect::InvalidNumber {
        field: FIELD_NAMES[index],
        value: value.to_string(),
        source,
    })
}
