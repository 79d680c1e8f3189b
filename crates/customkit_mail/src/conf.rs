//! Mail constants and default preset factories.

use crate::spec::SpecSmtpOptions;
use crate::util::derive_smtp_host;

/// Logger name used by [`crate::MailDispatcher`].
pub const C_NAME_LOGGER_MAIL: &str = "MailManager";

/// Submission port (STARTTLS).
pub const N_PORT_SMTP_DEFAULT: u16 = 587;
pub const C_HOST_SMTP_GMAIL: &str = "smtp.gmail.com";
pub const C_HOST_SMTP_OUTLOOK: &str = "smtp-mail.outlook.com";
/// Sender domain routed to [`C_HOST_SMTP_GMAIL`].
pub const C_DOMAIN_GMAIL: &str = "gmail.com";

/// Separator used when several addresses are folded into one field.
pub const C_SEP_RECIPIENTS: &str = "; ";

pub(crate) const C_NAME_CLIENT_EHLO: &str = "localhost";
pub(crate) const N_LEN_BASE64_LINE: usize = 76;
pub(crate) const C_PREFIX_DRAFT: &str = "customkit-mail-";
pub(crate) const C_SUFFIX_DRAFT: &str = ".eml";

/// SMTP options for `sender`: derived host, port 587, STARTTLS on.
pub fn derive_default_smtp_options(sender: &str) -> SpecSmtpOptions {
    SpecSmtpOptions {
        host: derive_smtp_host(sender).to_string(),
        ..Default::default()
    }
}
