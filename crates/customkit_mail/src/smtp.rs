//! Blocking SMTP client: greeting, `EHLO`, `STARTTLS`, `AUTH PLAIN` or
//! `AUTH LOGIN` as advertised, one transaction, `QUIT`.

use std::io::{BufRead, BufReader, Write};
use std::mem;
use std::net::TcpStream;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use customkit_log::Logger;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::conf::C_NAME_CLIENT_EHLO;
use crate::dispatcher::MailTransport;
use crate::mime::derive_mime_message;
use crate::spec::{EnumBodyFormat, MailError, SpecMailEnvelope, SpecSmtpOptions};
use crate::util::derive_envelope_addresses;

const N_CODE_SERVICE_READY: u16 = 220;
const N_CODE_AUTH_CHALLENGE: u16 = 334;
const N_CODE_START_DATA: u16 = 354;

////////////////////////////////////////////////////////////////////////////////
// #region Stream

enum SmtpStream {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<StreamOwned<ClientConnection, TcpStream>>>),
    /// Left behind by a failed TLS upgrade.
    Closed,
}

impl SmtpStream {
    fn connect(host: &str, port: u16) -> Result<Self, MailError> {
        let stream = TcpStream::connect((host, port))?;
        Ok(Self::Tcp(BufReader::new(stream)))
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut line = String::new();
        let n_read = match self {
            Self::Tcp(reader) => reader.read_line(&mut line)?,
            Self::Tls(reader) => reader.read_line(&mut line)?,
            Self::Closed => return Err(MailError::Protocol("connection closed".into())),
        };
        if n_read == 0 {
            return Err(MailError::Protocol("connection closed by server".into()));
        }
        Ok(line.trim_end().to_string())
    }

    fn write_all(&mut self, v_data: &[u8]) -> Result<(), MailError> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(v_data)?;
                reader.get_mut().flush()?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(v_data)?;
                reader.get_mut().flush()?;
            }
            Self::Closed => return Err(MailError::Protocol("connection closed".into())),
        }
        Ok(())
    }

    /// Wrap the TCP stream in a client TLS session for `host`.
    fn upgrade_to_tls(&mut self, host: &str) -> Result<(), MailError> {
        let tcp_stream = match mem::replace(self, Self::Closed) {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(reader) => {
                *self = Self::Tls(reader);
                return Err(MailError::Protocol("already using TLS".into()));
            }
            Self::Closed => return Err(MailError::Protocol("connection closed".into())),
        };

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| MailError::Protocol(format!("invalid hostname: {host}")))?;
        let connection = ClientConnection::new(derive_tls_config(), server_name)?;
        *self = Self::Tls(Box::new(BufReader::new(StreamOwned::new(
            connection, tcp_stream,
        ))));
        Ok(())
    }
}

fn derive_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Arc::new(config)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Reply

/// Parsed server reply: code plus the text of every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSmtpReply {
    pub code: u16,
    pub l_lines: Vec<String>,
}

impl SpecSmtpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn message_text(&self) -> String {
        self.l_lines.join(" ")
    }
}

/// Continuation lines use `-` after the code, the last one a space.
fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
}

pub fn parse_reply(l_lines: &[String]) -> Result<SpecSmtpReply, MailError> {
    let first = l_lines
        .first()
        .ok_or_else(|| MailError::Protocol("empty reply".into()))?;
    let c_code = first
        .get(..3)
        .ok_or_else(|| MailError::Protocol(format!("reply too short: {first}")))?;
    let code = c_code
        .parse::<u16>()
        .map_err(|_| MailError::Protocol(format!("invalid reply code: {c_code}")))?;

    let l_text = l_lines
        .iter()
        .map(|line| line.get(4..).unwrap_or_default().to_string())
        .collect();
    Ok(SpecSmtpReply {
        code,
        l_lines: l_text,
    })
}

/// SASL mechanisms the client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumAuthMechanism {
    Plain,
    Login,
}

impl EnumAuthMechanism {
    /// `None` for mechanisms the client does not implement.
    pub fn parse(c_name: &str) -> Option<Self> {
        match c_name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

/// Extensions from an `EHLO` reply that change how the session proceeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSmtpCapabilities {
    pub if_starttls: bool,
    pub l_auth: Vec<EnumAuthMechanism>,
}

impl SpecSmtpCapabilities {
    /// The first reply line is the server name; each later line is one
    /// extension keyword with its parameters.
    pub fn from_ehlo_reply(reply: &SpecSmtpReply) -> Self {
        let mut capabilities = Self::default();
        for line in reply.l_lines.iter().skip(1) {
            let mut parts = line.split(|c: char| c.is_whitespace() || c == '=');
            let Some(keyword) = parts.next() else {
                continue;
            };
            match keyword.to_ascii_uppercase().as_str() {
                "STARTTLS" => capabilities.if_starttls = true,
                "AUTH" => {
                    for mechanism in parts.filter_map(EnumAuthMechanism::parse) {
                        if !capabilities.l_auth.contains(&mechanism) {
                            capabilities.l_auth.push(mechanism);
                        }
                    }
                }
                _ => {}
            }
        }
        capabilities
    }

    /// `PLAIN` when offered, otherwise `LOGIN`.
    pub fn derive_auth_mechanism(&self) -> Option<EnumAuthMechanism> {
        [EnumAuthMechanism::Plain, EnumAuthMechanism::Login]
            .into_iter()
            .find(|mechanism| self.l_auth.contains(mechanism))
    }
}

/// Normalize line endings to CRLF and dot-stuff lines starting with `.`.
pub fn derive_dot_stuffed(v_message: &[u8]) -> Vec<u8> {
    let mut v_out = Vec::with_capacity(v_message.len() + 64);
    let v_trimmed = v_message.strip_suffix(b"\n").unwrap_or(v_message);
    for line in v_trimmed.split(|&n_byte| n_byte == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.first() == Some(&b'.') {
            v_out.push(b'.');
        }
        v_out.extend_from_slice(line);
        v_out.extend_from_slice(b"\r\n");
    }
    v_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Session

struct SmtpSession {
    stream: SmtpStream,
}

impl SmtpSession {
    fn read_reply(&mut self) -> Result<SpecSmtpReply, MailError> {
        let mut l_lines = Vec::new();
        loop {
            let line = self.stream.read_line()?;
            if line.is_empty() {
                continue;
            }
            let if_last = is_last_reply_line(&line);
            l_lines.push(line);
            if if_last {
                break;
            }
        }
        parse_reply(&l_lines)
    }

    fn command(&mut self, c_command: &str) -> Result<SpecSmtpReply, MailError> {
        self.stream.write_all(format!("{c_command}\r\n").as_bytes())?;
        self.read_reply()
    }

    fn expect_code(&mut self, c_command: &str, code: u16) -> Result<SpecSmtpReply, MailError> {
        let reply = self.command(c_command)?;
        if reply.code != code {
            return Err(MailError::smtp(reply.code, reply.message_text()));
        }
        Ok(reply)
    }

    fn expect_success(&mut self, c_command: &str) -> Result<SpecSmtpReply, MailError> {
        let reply = self.command(c_command)?;
        if !reply.is_success() {
            return Err(MailError::smtp(reply.code, reply.message_text()));
        }
        Ok(reply)
    }

    fn greeting(&mut self) -> Result<(), MailError> {
        let reply = self.read_reply()?;
        if reply.code != N_CODE_SERVICE_READY {
            return Err(MailError::smtp(reply.code, reply.message_text()));
        }
        Ok(())
    }

    fn ehlo(&mut self) -> Result<SpecSmtpCapabilities, MailError> {
        let reply = self.expect_success(&format!("EHLO {C_NAME_CLIENT_EHLO}"))?;
        Ok(SpecSmtpCapabilities::from_ehlo_reply(&reply))
    }

    /// Upgrade the connection and return the capabilities re-advertised over TLS.
    fn starttls(&mut self, host: &str) -> Result<SpecSmtpCapabilities, MailError> {
        self.expect_code("STARTTLS", N_CODE_SERVICE_READY)?;
        self.stream.upgrade_to_tls(host)?;
        self.ehlo()
    }

    fn authenticate(
        &mut self,
        mechanism: EnumAuthMechanism,
        username: &str,
        password: &str,
    ) -> Result<(), MailError> {
        match mechanism {
            EnumAuthMechanism::Plain => {
                let c_token = STANDARD.encode(format!("\0{username}\0{password}"));
                self.expect_success(&format!("AUTH PLAIN {c_token}"))?;
            }
            EnumAuthMechanism::Login => {
                self.expect_code("AUTH LOGIN", N_CODE_AUTH_CHALLENGE)?;
                self.expect_code(&STANDARD.encode(username), N_CODE_AUTH_CHALLENGE)?;
                self.expect_success(&STANDARD.encode(password))?;
            }
        }
        Ok(())
    }

    fn data(&mut self, v_message: &[u8]) -> Result<(), MailError> {
        self.expect_code("DATA", N_CODE_START_DATA)?;
        self.stream.write_all(&derive_dot_stuffed(v_message))?;
        self.stream.write_all(b".\r\n")?;
        let reply = self.read_reply()?;
        if !reply.is_success() {
            return Err(MailError::smtp(reply.code, reply.message_text()));
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<(), MailError> {
        self.command("QUIT")?;
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Transport

/// SMTP relay transport with a plain-text body.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    options: SpecSmtpOptions,
    log: Arc<Logger>,
}

impl SmtpTransport {
    pub fn new(options: SpecSmtpOptions, log: Arc<Logger>) -> Self {
        Self { options, log }
    }

    pub fn options(&self) -> &SpecSmtpOptions {
        &self.options
    }

    fn deliver(
        &self,
        session: &mut SmtpSession,
        sender: &str,
        credentials: &str,
        l_recipients: &[String],
        v_message: &[u8],
    ) -> Result<(), MailError> {
        session.greeting()?;
        let mut capabilities = session.ehlo()?;
        if self.options.if_starttls {
            if !capabilities.if_starttls {
                return Err(MailError::NotSupported("STARTTLS".into()));
            }
            capabilities = session.starttls(&self.options.host)?;
            self.log.debug("STARTTLS negotiated.");
        }

        let mechanism = capabilities
            .derive_auth_mechanism()
            .ok_or_else(|| MailError::NotSupported("AUTH PLAIN or AUTH LOGIN".into()))?;
        session.authenticate(mechanism, sender, credentials)?;
        self.log.debug(format!(
            "Authenticated as {sender} with AUTH {}.",
            mechanism.as_str()
        ));

        session.expect_success(&format!("MAIL FROM:<{sender}>"))?;
        for c_addr in l_recipients {
            session.expect_success(&format!("RCPT TO:<{c_addr}>"))?;
        }
        session.data(v_message)
    }
}

impl MailTransport for SmtpTransport {
    fn send(&self, envelope: &SpecMailEnvelope) -> Result<(), MailError> {
        let sender = envelope.sender.as_deref().ok_or(MailError::MissingSender)?;
        let credentials = envelope
            .credentials
            .as_deref()
            .ok_or(MailError::MissingCredentials)?;

        let mut l_recipients = derive_envelope_addresses(&envelope.receiver);
        if let Some(cc) = &envelope.cc {
            l_recipients.extend(derive_envelope_addresses(cc));
        }
        if l_recipients.is_empty() {
            return Err(MailError::MissingReceiver);
        }

        let v_message = derive_mime_message(envelope, EnumBodyFormat::Plain, &[])?;
        self.log.info("MIME message created.");

        let mut session = SmtpSession {
            stream: SmtpStream::connect(&self.options.host, self.options.port)?,
        };
        self.log.info(format!(
            "Connected to {}:{}.",
            self.options.host, self.options.port
        ));

        let result = self.deliver(&mut session, sender, credentials, &l_recipients, &v_message);
        match session.quit() {
            Ok(()) => self.log.info("SMTP server closed successfully."),
            Err(err) => self.log.warning(format!("QUIT failed: {err}")),
        }
        result
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
