//! `customkit_mail` v1:
//! Send one message through the desktop mail client or an SMTP relay.
//!
//! Architecture:
//! - `conf`       : constants and default presets
//! - `spec`       : services, recipients, envelope and errors
//! - `util`       : recipient/attachment normalization helpers
//! - `mime`       : RFC 5322 multipart message builder
//! - `smtp`       : blocking SMTP client (STARTTLS, AUTH PLAIN/LOGIN)
//! - `desktop`    : unsent `.eml` draft handed to the OS opener
//! - `dispatcher` : logged façade (`MailDispatcher`) and transport seam
pub mod conf;
pub mod desktop;
pub mod dispatcher;
pub mod mime;
pub mod smtp;
pub mod spec;
pub mod util;

pub use conf::{
    C_HOST_SMTP_GMAIL, C_HOST_SMTP_OUTLOOK, C_NAME_LOGGER_MAIL, N_PORT_SMTP_DEFAULT,
    derive_default_smtp_options,
};
pub use desktop::DesktopTransport;
pub use dispatcher::{MailDispatcher, MailTransport};
pub use smtp::{EnumAuthMechanism, SmtpTransport, SpecSmtpCapabilities};
pub use spec::{
    EnumBodyFormat, EnumMailService, MailError, SpecAttachments, SpecMailEnvelope,
    SpecRecipients, SpecSmtpOptions,
};
