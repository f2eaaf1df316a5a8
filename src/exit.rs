//! Process exit codes.
//!
//! Values are fixed so cron wrappers can tell failure kinds apart.

use crate::pipeline::RunError;

pub mod codes {
    pub const SUCCESS: u8 = 0;
    /// Usage was printed
    pub const HELP: u8 = 1;
    /// A required external tool is missing
    pub const MISSING_LIBRARY: u8 = 241;
    /// Bad command line or configuration value
    pub const INVALID_ARGUMENT: u8 = 242;
    /// The logger could not be set up
    pub const LOGGER_UTILITY: u8 = 243;
    pub const GENERAL: u8 = 255;
}

/// Map a pipeline failure to an exit code
pub fn exit_code(error: &RunError) -> u8 {
    match error {
        RunError::Prerequisite(_) => codes::MISSING_LIBRARY,
        RunError::Fetch(_) => codes::GENERAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchError;
    use crate::prerequisites::PrerequisiteMissing;

    #[test]
    fn test_prerequisite_exit_code() {
        let error = RunError::Prerequisite(PrerequisiteMissing::SmtpHost);
        assert_eq!(exit_code(&error), codes::MISSING_LIBRARY);
    }

    #[test]
    fn test_fetch_exit_code() {
        let error = RunError::Fetch(FetchError::NoEndpoint);
        assert_eq!(exit_code(&error), codes::GENERAL);
    }

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            codes::SUCCESS,
            codes::HELP,
            codes::MISSING_LIBRARY,
            codes::INVALID_ARGUMENT,
            codes::LOGGER_UTILITY,
            codes::GENERAL,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
