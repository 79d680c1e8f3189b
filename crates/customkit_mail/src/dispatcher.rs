//! Logged mail façade and the transport seam.

use std::path::Path;
use std::sync::Arc;

use customkit_log::{EnumLogLevel, LogError, Logger, get_logger};

use crate::conf::{C_NAME_LOGGER_MAIL, derive_default_smtp_options};
use crate::desktop::DesktopTransport;
use crate::smtp::SmtpTransport;
use crate::spec::{EnumMailService, MailError, SpecAttachments, SpecMailEnvelope, SpecRecipients};
use crate::util::{derive_attachment_list, derive_joined_cc, derive_joined_recipients};

/// Something that can deliver one normalized message.
pub trait MailTransport {
    fn send(&self, envelope: &SpecMailEnvelope) -> Result<(), MailError>;
}

/// Subject, body and receivers fixed at construction; each `send` adds the
/// per-message parts and delivers through the chosen service.
pub struct MailDispatcher {
    subject: String,
    body: String,
    receiver: String,
    service: EnumMailService,
    log: Arc<Logger>,
    transport: Option<Box<dyn MailTransport>>,
}

impl MailDispatcher {
    pub fn new(
        subject: impl Into<String>,
        receiver: impl Into<SpecRecipients>,
        body: impl Into<String>,
        service: EnumMailService,
        path_file_log: impl AsRef<Path>,
    ) -> Result<Self, LogError> {
        let log = get_logger(C_NAME_LOGGER_MAIL, path_file_log, EnumLogLevel::Debug)?;
        let receiver = derive_joined_recipients(&receiver.into());
        log.info("MailManager initialized.");
        Ok(Self {
            subject: subject.into(),
            body: body.into(),
            receiver,
            service,
            log,
            transport: None,
        })
    }

    /// Deliver through `transport` instead of the service default.
    pub fn with_transport(mut self, transport: impl MailTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Receivers as one `"; "`-joined field.
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn service(&self) -> EnumMailService {
        self.service
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.log
    }

    /// Send the message; `false` on any failure (logged).
    ///
    /// With [`EnumMailService::Smtp`], `true` means the server accepted the
    /// message. With [`EnumMailService::Desktop`], `true` only means the draft
    /// was written and handed to the default mail client; whether the user
    /// then sends it is not observed.
    pub fn send(
        &self,
        cc: Option<SpecRecipients>,
        attachments: Option<SpecAttachments>,
        sender: Option<&str>,
        sender_credentials: Option<&str>,
    ) -> bool {
        match self.try_send(cc, attachments, sender, sender_credentials) {
            Ok(()) => true,
            Err(err) => {
                self.log.error(format!("Mail not sent: {err}"));
                false
            }
        }
    }

    /// Like [`MailDispatcher::send`], but returns the error instead of `false`.
    /// A desktop `Ok(())` is a hand-off, not a confirmed delivery.
    pub fn try_send(
        &self,
        cc: Option<SpecRecipients>,
        attachments: Option<SpecAttachments>,
        sender: Option<&str>,
        sender_credentials: Option<&str>,
    ) -> Result<(), MailError> {
        let envelope = self.derive_envelope(cc, attachments, sender, sender_credentials);
        self.log.info(format!(
            "send: cc={:?}, attachments={:?}, sender={:?}, service={:?}.",
            envelope.cc, envelope.attachments, envelope.sender, self.service
        ));
        if envelope.receiver.trim().is_empty() {
            return Err(MailError::MissingReceiver);
        }

        match &self.transport {
            Some(transport) => transport.send(&envelope)?,
            None => match self.service {
                EnumMailService::Desktop => {
                    DesktopTransport::new(Arc::clone(&self.log)).send(&envelope)?
                }
                EnumMailService::Smtp => {
                    let sender = envelope.sender.as_deref().ok_or(MailError::MissingSender)?;
                    if envelope.credentials.is_none() {
                        return Err(MailError::MissingCredentials);
                    }
                    let options = derive_default_smtp_options(sender);
                    self.log.info(format!("smtp_server={}", options.host));
                    SmtpTransport::new(options, Arc::clone(&self.log)).send(&envelope)?
                }
            },
        }

        self.log.info(format!(
            "Email sent with following details: From={}, To={}, CC={}.",
            envelope.sender.as_deref().unwrap_or("Desktop User"),
            envelope.receiver,
            envelope.cc.as_deref().unwrap_or("")
        ));
        self.log.info(format!(
            "Subject={}, Attachment={:?}.",
            envelope.subject, envelope.attachments
        ));
        Ok(())
    }

    fn derive_envelope(
        &self,
        cc: Option<SpecRecipients>,
        attachments: Option<SpecAttachments>,
        sender: Option<&str>,
        sender_credentials: Option<&str>,
    ) -> SpecMailEnvelope {
        let if_desktop = self.service == EnumMailService::Desktop;
        SpecMailEnvelope {
            sender: sender.filter(|_| !if_desktop).map(str::to_string),
            credentials: sender_credentials
                .filter(|_| !if_desktop)
                .map(str::to_string),
            receiver: self.receiver.clone(),
            cc: derive_joined_cc(cc.as_ref()),
            subject: self.subject.clone(),
            body: self.body.clone(),
            attachments: derive_attachment_list(attachments),
        }
    }
}
