//! RFC 5322 `multipart/mixed` message builder.
//!
//! The text part and every attachment are base64 encoded, so the boundary
//! can never collide with part content.

use std::fs;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::conf::N_LEN_BASE64_LINE;
use crate::spec::{EnumBodyFormat, MailError, SpecMailEnvelope};
use crate::util::derive_attachment_name;

const C_CRLF: &str = "\r\n";

/// Base64 with CRLF line breaks every 76 characters.
pub fn encode_base64_wrapped(v_data: &[u8]) -> String {
    let c_encoded = STANDARD.encode(v_data);
    c_encoded
        .as_bytes()
        .chunks(N_LEN_BASE64_LINE)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(C_CRLF)
}

/// Header text as-is when ASCII, otherwise an RFC 2047 encoded word.
pub fn encode_header_value(text: &str) -> String {
    if text.is_ascii() {
        text.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(text.as_bytes()))
    }
}

fn derive_boundary() -> String {
    let n_nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("=_customkit_{n_nanos:x}")
}

/// Render the envelope as a complete message; attachments are read from disk.
///
/// `l_headers_extra` is emitted after the standard headers.
pub fn derive_mime_message(
    envelope: &SpecMailEnvelope,
    body_format: EnumBodyFormat,
    l_headers_extra: &[(&str, &str)],
) -> Result<Vec<u8>, MailError> {
    let c_boundary = derive_boundary();
    let mut l_lines: Vec<String> = Vec::new();

    if let Some(sender) = &envelope.sender {
        l_lines.push(format!("From: {sender}"));
    }
    l_lines.push(format!("To: {}", envelope.receiver));
    if let Some(cc) = &envelope.cc {
        l_lines.push(format!("Cc: {cc}"));
    }
    l_lines.push(format!("Subject: {}", encode_header_value(&envelope.subject)));
    l_lines.push(format!("Date: {}", chrono::Local::now().to_rfc2822()));
    l_lines.push("MIME-Version: 1.0".to_string());
    for (c_name, c_value) in l_headers_extra {
        l_lines.push(format!("{c_name}: {c_value}"));
    }
    l_lines.push(format!(
        "Content-Type: multipart/mixed; boundary=\"{c_boundary}\""
    ));
    l_lines.push(String::new());

    l_lines.push(format!("--{c_boundary}"));
    l_lines.push(format!(
        "Content-Type: {}; charset=utf-8",
        body_format.as_mime_type()
    ));
    l_lines.push("Content-Transfer-Encoding: base64".to_string());
    l_lines.push(String::new());
    l_lines.push(encode_base64_wrapped(envelope.body.as_bytes()));

    for path in &envelope.attachments {
        let v_data = fs::read(path).map_err(|source| MailError::Attachment {
            path: path.clone(),
            source,
        })?;
        let c_name = encode_header_value(&derive_attachment_name(path));

        l_lines.push(format!("--{c_boundary}"));
        l_lines.push(format!(
            "Content-Type: application/octet-stream; name=\"{c_name}\""
        ));
        l_lines.push(format!(
            "Content-Disposition: attachment; filename=\"{c_name}\""
        ));
        l_lines.push("Content-Transfer-Encoding: base64".to_string());
        l_lines.push(String::new());
        l_lines.push(encode_base64_wrapped(&v_data));
    }

    l_lines.push(format!("--{c_boundary}--"));
    l_lines.push(String::new());
    Ok(l_lines.join(C_CRLF).into_bytes())
}
