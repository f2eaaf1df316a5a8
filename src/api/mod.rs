pub mod overpass;

pub use overpass::{FetchError, FileSource, OverpassClient, PointSource, SurveyPointQuery};
