//! Mail services, recipients, envelope and error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::conf::{C_HOST_SMTP_OUTLOOK, N_PORT_SMTP_DEFAULT};

////////////////////////////////////////////////////////////////////////////////
// #region Inputs

/// Transport selected when the dispatcher is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumMailService {
    /// Logged-in desktop mail client; sender and credentials are ignored.
    #[default]
    Desktop,
    /// SMTP relay derived from the sender address.
    Smtp,
}

/// Body rendering for the text part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumBodyFormat {
    #[default]
    Plain,
    Html,
}

impl EnumBodyFormat {
    pub(crate) fn as_mime_type(self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Html => "text/html",
        }
    }
}

/// One address or several; folded into a `"; "`-joined field before sending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecRecipients(pub Vec<String>);

impl From<&str> for SpecRecipients {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for SpecRecipients {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for SpecRecipients {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for SpecRecipients {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for SpecRecipients {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|c_addr| c_addr.to_string()).collect())
    }
}

/// One attachment path or several; always handled as a list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecAttachments(pub Vec<PathBuf>);

impl From<&str> for SpecAttachments {
    fn from(value: &str) -> Self {
        Self(vec![PathBuf::from(value)])
    }
}

impl From<&Path> for SpecAttachments {
    fn from(value: &Path) -> Self {
        Self(vec![value.to_path_buf()])
    }
}

impl From<PathBuf> for SpecAttachments {
    fn from(value: PathBuf) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<PathBuf>> for SpecAttachments {
    fn from(value: Vec<PathBuf>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for SpecAttachments {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(PathBuf::from).collect())
    }
}

/// SMTP relay connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSmtpOptions {
    pub host: String,
    pub port: u16,
    /// Upgrade the session with `STARTTLS` after the first `EHLO`.
    pub if_starttls: bool,
}

impl Default for SpecSmtpOptions {
    fn default() -> Self {
        Self {
            host: C_HOST_SMTP_OUTLOOK.to_string(),
            port: N_PORT_SMTP_DEFAULT,
            if_starttls: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Envelope

/// Fully normalized message handed to a transport.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SpecMailEnvelope {
    pub sender: Option<String>,
    pub credentials: Option<String>,
    /// `"; "`-joined receivers.
    pub receiver: String,
    /// `"; "`-joined carbon-copy receivers.
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl fmt::Debug for SpecMailEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecMailEnvelope")
            .field("sender", &self.sender)
            .field("credentials", &self.credentials.as_ref().map(|_| "***"))
            .field("receiver", &self.receiver)
            .field("cc", &self.cc)
            .field("subject", &self.subject)
            .field("body", &self.body)
            .field("attachments", &self.attachments)
            .finish()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("SMTP error {code}: {message}")]
    Smtp { code: u16, message: String },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server does not support {0}")]
    NotSupported(String),
    #[error("Attachment '{}' could not be read: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Sender address required for SMTP.")]
    MissingSender,
    #[error("Sender credentials required for SMTP.")]
    MissingCredentials,
    #[error("No receiver given.")]
    MissingReceiver,
    #[error("Draft could not be opened: {0}")]
    Open(#[from] opener::OpenError),
}

impl MailError {
    pub(crate) fn smtp(code: u16, message: impl Into<String>) -> Self {
        Self::Smtp {
            code,
            message: message.into(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_from_single_and_list() {
        assert_eq!(SpecRecipients::from("a@x.com").0, vec!["a@x.com"]);
        assert_eq!(
            SpecRecipients::from(vec!["a@x.com", "b@x.com"]).0,
            vec!["a@x.com", "b@x.com"]
        );
    }

    #[test]
    fn test_single_attachment_becomes_list() {
        let attachments = SpecAttachments::from("report.xlsx");
        assert_eq!(attachments.0, vec![PathBuf::from("report.xlsx")]);
    }

    #[test]
    fn test_envelope_debug_masks_credentials() {
        let envelope = SpecMailEnvelope {
            credentials: Some("secret".to_string()),
            ..Default::default()
        };
        let c_debug = format!("{envelope:?}");
        assert!(!c_debug.contains("secret"));
        assert!(c_debug.contains("***"));
    }
}
