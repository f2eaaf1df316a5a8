use std::fmt;

use super::Decimal;

/// Decimal places OSM stores node coordinates with
pub const COORDINATE_PRECISION: u32 = 7;

const NODE_URL: &str = "https://www.openstreetmap.org/node";

/// One survey point as returned by the Overpass CSV query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyPointRecord {
    pub id: u64,
    /// Latitude of the node itself
    pub element_lat: Decimal,
    /// Value of the `latitude` tag
    pub tag_lat: Decimal,
    /// Longitude of the node itself
    pub element_lon: Decimal,
    /// Value of the `longitude` tag
    pub tag_lon: Decimal,
}

pub fn node_url(id: u64) -> String {
    format!("{NODE_URL}/{id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mismatch between a node coordinate and its rounded tag value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscrepancyEntry {
    pub point_id: u64,
    pub axis: Axis,
    pub element_value: Decimal,
    pub rounded_tag_value: Decimal,
}

impl DiscrepancyEntry {
    /// Single report line for this entry
    pub fn message(&self) -> String {
        format!(
            "Node {}: {} {} does not match tag value {} {}",
            self.point_id,
            self.axis,
            self.element_value.to_fixed(COORDINATE_PRECISION),
            self.rounded_tag_value.to_fixed(COORDINATE_PRECISION),
            node_url(self.point_id)
        )
    }
}
