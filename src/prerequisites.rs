//! Checks that must pass before any network traffic happens.

use std::path::{Path, PathBuf};

use crate::config::MailTransport;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrerequisiteMissing {
    #[error("mail command {0:?} not found on PATH")]
    SendmailCommand(String),
    #[error("SMTP transport selected but no SMTP host configured")]
    SmtpHost,
}

/// Verify the configured mail transport can be used
pub fn check_mail_transport(transport: &MailTransport) -> Result<(), PrerequisiteMissing> {
    match transport {
        MailTransport::Sendmail { command } => {
            let found = find_command(command, std::env::var_os("PATH").as_deref());
            match found {
                Some(path) => {
                    tracing::debug!(command = %path.display(), "Mail command found");
                    Ok(())
                }
                None => Err(PrerequisiteMissing::SendmailCommand(command.clone())),
            }
        }
        MailTransport::Smtp { host: None, .. } => Err(PrerequisiteMissing::SmtpHost),
        MailTransport::Smtp { .. } => Ok(()),
    }
}

/// Resolve `command` like a shell would: paths are taken as-is, bare names
/// are searched in `path_var`
fn find_command(command: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    let command_path = Path::new(command);
    if command_path.components().count() > 1 {
        return command_path.is_file().then(|| command_path.to_path_buf());
    }

    std::env::split_paths(path_var?)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}
