//! Recipient and attachment normalization helpers.

use std::path::{Path, PathBuf};

use crate::conf::{C_DOMAIN_GMAIL, C_HOST_SMTP_GMAIL, C_HOST_SMTP_OUTLOOK, C_SEP_RECIPIENTS};
use crate::spec::{SpecAttachments, SpecRecipients};

/// Fold the addresses into one `"; "`-joined field.
pub fn derive_joined_recipients(recipients: &SpecRecipients) -> String {
    recipients.0.join(C_SEP_RECIPIENTS)
}

/// Carbon-copy field, or `None` when no address is given.
pub fn derive_joined_cc(cc: Option<&SpecRecipients>) -> Option<String> {
    cc.filter(|recipients| recipients.0.iter().any(|c_addr| !c_addr.trim().is_empty()))
        .map(derive_joined_recipients)
}

pub fn derive_attachment_list(attachments: Option<SpecAttachments>) -> Vec<PathBuf> {
    attachments.map(|attachments| attachments.0).unwrap_or_default()
}

/// Split a joined field back into individual envelope addresses.
pub fn derive_envelope_addresses(c_field: &str) -> Vec<String> {
    c_field
        .split(';')
        .map(str::trim)
        .filter(|c_addr| !c_addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Relay host for a sender: Gmail senders go to Gmail, everything else to Outlook.
pub fn derive_smtp_host(sender: &str) -> &'static str {
    if sender.contains(C_DOMAIN_GMAIL) {
        C_HOST_SMTP_GMAIL
    } else {
        C_HOST_SMTP_OUTLOOK
    }
}

/// File name shown to the receiver for an attachment path.
pub fn derive_attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
