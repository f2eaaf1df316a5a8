pub mod parser;

pub use parser::{MalformedRowError, RowDefect, csv_rows, parse_row};
