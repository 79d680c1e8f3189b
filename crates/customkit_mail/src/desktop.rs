//! Desktop hand-off: the message becomes an unsent `.eml` draft that the OS
//! opens in the default mail client, which sends it as the logged-in user.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use customkit_log::Logger;

use crate::conf::{C_PREFIX_DRAFT, C_SUFFIX_DRAFT};
use crate::dispatcher::MailTransport;
use crate::mime::derive_mime_message;
use crate::spec::{EnumBodyFormat, MailError, SpecMailEnvelope};

#[derive(Debug, Clone)]
pub struct DesktopTransport {
    dir_draft: PathBuf,
    log: Arc<Logger>,
}

impl DesktopTransport {
    /// Drafts are written to the system temp directory.
    pub fn new(log: Arc<Logger>) -> Self {
        Self::with_draft_dir(std::env::temp_dir(), log)
    }

    pub fn with_draft_dir(dir_draft: impl Into<PathBuf>, log: Arc<Logger>) -> Self {
        Self {
            dir_draft: dir_draft.into(),
            log,
        }
    }

    /// Write the HTML draft and return its path; sender and credentials are ignored.
    pub fn write_draft(&self, envelope: &SpecMailEnvelope) -> Result<PathBuf, MailError> {
        let envelope_desktop = SpecMailEnvelope {
            sender: None,
            credentials: None,
            ..envelope.clone()
        };
        let v_message =
            derive_mime_message(&envelope_desktop, EnumBodyFormat::Html, &[("X-Unsent", "1")])?;

        let mut file_draft = tempfile::Builder::new()
            .prefix(C_PREFIX_DRAFT)
            .suffix(C_SUFFIX_DRAFT)
            .tempfile_in(&self.dir_draft)?;
        file_draft.write_all(&v_message)?;
        file_draft.flush()?;

        let (_, path_draft) = file_draft.keep().map_err(|err| MailError::Io(err.error))?;
        self.log.info(format!("Draft written to {}.", path_draft.display()));
        Ok(path_draft)
    }
}

impl MailTransport for DesktopTransport {
    fn send(&self, envelope: &SpecMailEnvelope) -> Result<(), MailError> {
        let path_draft = self.write_draft(envelope)?;
        opener::open(&path_draft)?;
        self.log.info("Draft handed to the desktop mail client.");
        Ok(())
    }
}
