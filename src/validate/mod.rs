//! Survey point coordinate validation
//!
//! Each CSV row carries the node coordinates and the `latitude`/`longitude`
//! tags. Tag values are rounded to OSM precision (7 decimals) and compared
//! with the node coordinates. Rows that cannot be parsed are recorded and
//! skipped so one bad tag never hides the rest of the batch.

use serde::Deserialize;

use crate::domain::{Axis, COORDINATE_PRECISION, Decimal, DiscrepancyEntry, SurveyPointRecord};
use crate::osm::{MalformedRowError, csv_rows, parse_row};

/// How a node coordinate is compared with its rounded tag value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// Flag only when the node coordinate is greater than the rounded tag.
    /// A tag larger than the node coordinate is never reported.
    #[default]
    GreaterThan,
    /// Flag any difference between node coordinate and rounded tag
    AnyDifference,
}

impl ComparisonMode {
    fn is_discrepancy(&self, element: &Decimal, rounded_tag: &Decimal) -> bool {
        match self {
            ComparisonMode::GreaterThan => element > rounded_tag,
            ComparisonMode::AnyDifference => element != rounded_tag,
        }
    }
}

/// Result of validating one Overpass CSV body
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Number of well-formed rows checked
    pub rows: usize,
    /// Discrepancies in input order
    pub discrepancies: Vec<DiscrepancyEntry>,
    /// Rows that were skipped
    pub malformed: Vec<MalformedRowError>,
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Compare one record, returning zero, one or two entries (latitude first)
pub fn check_point(record: &SurveyPointRecord, mode: ComparisonMode) -> Vec<DiscrepancyEntry> {
    [
        (Axis::Latitude, &record.element_lat, &record.tag_lat),
        (Axis::Longitude, &record.element_lon, &record.tag_lon),
    ]
    .into_iter()
    .filter_map(|(axis, element, tag)| {
        let rounded = tag.round_dp(COORDINATE_PRECISION);
        mode.is_discrepancy(element, &rounded)
            .then(|| DiscrepancyEntry {
                point_id: record.id,
                axis,
                element_value: *element,
                rounded_tag_value: rounded,
            })
    })
    .collect()
}

/// Validate every row of the CSV body
pub fn validate_csv(body: &str, mode: ComparisonMode) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for (line_no, line) in csv_rows(body) {
        let record = match parse_row(line_no, line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(line = err.line, content = %err.content, "{}", err.defect);
                outcome.malformed.push(err);
                continue;
            }
        };

        outcome.rows += 1;
        let entries = check_point(&record, mode);
        for entry in &entries {
            tracing::debug!(
                node = entry.point_id,
                axis = %entry.axis,
                element = %entry.element_value,
                tag = %entry.rounded_tag_value,
                "Coordinate mismatch"
            );
        }
        outcome.discrepancies.extend(entries);
    }

    tracing::info!(
        rows = outcome.rows,
        discrepancies = outcome.discrepancies.len(),
        malformed = outcome.malformed.len(),
        "Validation finished"
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_latitude_greater_than_tag() {
        let outcome = validate_csv(
            "101,4.1234567,4.1234560,-74.1234567,-74.1234560\n",
            ComparisonMode::GreaterThan,
        );

        assert_eq!(outcome.rows, 1);
        assert_eq!(outcome.discrepancies.len(), 1);
        let lat = &outcome.discrepancies[0];
        assert_eq!(lat.point_id, 101);
        assert_eq!(lat.axis, Axis::Latitude);
        assert_eq!(lat.element_value, dec("4.1234567"));
        assert_eq!(lat.rounded_tag_value, dec("4.123456"));
    }

    #[test]
    fn test_longitude_flagged_when_element_greater() {
        // -74.1234567 is below -74.1234560, so the greater-than rule only
        // fires when the element longitude sits east of the tag.
        let outcome = validate_csv(
            "101,4.1234567,4.1234560,-74.1234560,-74.1234567\n",
            ComparisonMode::GreaterThan,
        );

        let axes: Vec<Axis> = outcome.discrepancies.iter().map(|d| d.axis).collect();
        assert_eq!(axes, vec![Axis::Latitude, Axis::Longitude]);
        assert_eq!(outcome.discrepancies[1].rounded_tag_value, dec("-74.1234567"));
    }

    #[test]
    fn test_equal_or_smaller_element_not_flagged() {
        let outcome = validate_csv("102,4.0000000,4.0000001,-74.0,-74.0", ComparisonMode::GreaterThan);
        assert_eq!(outcome.rows, 1);
        assert!(outcome.is_clean());
        assert!(outcome.malformed.is_empty());
    }

    #[test]
    fn test_tag_rounded_before_compare() {
        // 4.12345665 rounds to 4.1234567, equal to the element value
        let outcome = validate_csv("7,4.1234567,4.12345665,-74,-74", ComparisonMode::GreaterThan);
        assert!(outcome.is_clean());

        // 4.12345664 rounds down to 4.1234566, below the element value
        let outcome = validate_csv("7,4.1234567,4.12345664,-74,-74", ComparisonMode::GreaterThan);
        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(outcome.discrepancies[0].rounded_tag_value, dec("4.1234566"));
    }

    #[test]
    fn test_larger_tag_only_flagged_in_any_difference_mode() {
        let row = "102,4.0000000,4.0000001,-74.0,-74.0";

        assert!(validate_csv(row, ComparisonMode::GreaterThan).is_clean());

        let outcome = validate_csv(row, ComparisonMode::AnyDifference);
        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(outcome.discrepancies[0].axis, Axis::Latitude);
        assert_eq!(outcome.discrepancies[0].rounded_tag_value, dec("4.0000001"));
    }

    #[test]
    fn test_empty_input() {
        let outcome = validate_csv("", ComparisonMode::GreaterThan);
        assert_eq!(outcome.rows, 0);
        assert!(outcome.is_clean());
        assert!(outcome.malformed.is_empty());
    }

    #[test]
    fn test_malformed_row_does_not_stop_batch() {
        let body = "\
1,4.5,4.4,-74.0,-74.0
2,4.5,abc,-74.0,-74.0
3,5.5,5.4,-75.0,-75.0
";
        let outcome = validate_csv(body, ComparisonMode::GreaterThan);

        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.malformed.len(), 1);
        assert_eq!(outcome.malformed[0].line, 2);
        let ids: Vec<u64> = outcome.discrepancies.iter().map(|d| d.point_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_order_preserved() {
        let body = "30,2,1,0,0\n10,2,1,2,1\n20,0,0,2,1\n";
        let outcome = validate_csv(body, ComparisonMode::GreaterThan);

        let flagged: Vec<(u64, Axis)> = outcome
            .discrepancies
            .iter()
            .map(|d| (d.point_id, d.axis))
            .collect();
        assert_eq!(
            flagged,
            vec![
                (30, Axis::Latitude),
                (10, Axis::Latitude),
                (10, Axis::Longitude),
                (20, Axis::Longitude),
            ]
        );
    }

    #[test]
    fn test_check_point_rounded_value_matches_rounding() {
        let record = SurveyPointRecord {
            id: 9,
            element_lat: dec("10"),
            tag_lat: dec("1.123456789"),
            element_lon: dec("0"),
            tag_lon: dec("0"),
        };

        let entries = check_point(&record, ComparisonMode::GreaterThan);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rounded_tag_value, dec("1.123456789").round_dp(7));
        assert_eq!(entries[0].rounded_tag_value.to_string(), "1.1234568");
    }
}
