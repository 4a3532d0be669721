//! End-to-end pipeline tests with in-memory transports.
//!
//! These exercise configuration, composition, attachments and both
//! strategies without touching the network.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use emailtool_core::{
    AttachmentBuilder, AttachmentError, DRAFTS_FOLDER, DraftError, DraftSession,
    DraftStore, EmailConfig, Error, Mailer, Outcome, SaveDraftStrategy, SendError, SendStrategy,
    SenderIdentity, SmtpConnector, SmtpSession,
};
use lettre::Message;
use tokio_test::{assert_err, assert_ok};

/// Everything the fakes observed.
#[derive(Debug, Default)]
struct Events {
    smtp_connects: u32,
    smtp_sends: Vec<Vec<u8>>,
    smtp_closes: u32,
    imap_connects: u32,
    imap_appends: Vec<(String, Vec<u8>)>,
    imap_logouts: u32,
}

type Shared = Arc<Mutex<Events>>;

/// SMTP fake that fails according to a script, then succeeds.
#[derive(Clone)]
struct FakeSmtp {
    events: Shared,
    script: Arc<Mutex<VecDeque<SendError>>>,
}

struct FakeSmtpSession {
    events: Shared,
    script: Arc<Mutex<VecDeque<SendError>>>,
}

impl SmtpConnector for FakeSmtp {
    type Session = FakeSmtpSession;

    async fn connect(&self, _sender: &SenderIdentity) -> Result<FakeSmtpSession, SendError> {
        self.events.lock().unwrap().smtp_connects += 1;
        Ok(FakeSmtpSession {
            events: Arc::clone(&self.events),
            script: Arc::clone(&self.script),
        })
    }
}

impl SmtpSession for FakeSmtpSession {
    async fn send(&self, message: &Message) -> Result<(), SendError> {
        let mut events = self.events.lock().unwrap();
        events.smtp_sends.push(message.formatted());
        self.script.lock().unwrap().pop_front().map_or(Ok(()), Err)
    }

    async fn close(self) -> Result<(), SendError> {
        self.events.lock().unwrap().smtp_closes += 1;
        Ok(())
    }
}

/// IMAP fake that records appends.
#[derive(Clone)]
struct FakeImap {
    events: Shared,
    refuse_append: bool,
}

struct FakeImapSession {
    store: FakeImap,
}

impl DraftStore for FakeImap {
    type Session = FakeImapSession;

    fn connect(&self, _sender: &SenderIdentity) -> Result<FakeImapSession, DraftError> {
        self.events.lock().unwrap().imap_connects += 1;
        Ok(FakeImapSession {
            store: self.clone(),
        })
    }
}

impl DraftSession for FakeImapSession {
    fn select(&mut self, _folder: &str) -> Result<(), DraftError> {
        Ok(())
    }

    fn append(&mut self, folder: &str, message: &[u8]) -> Result<(), DraftError> {
        if self.store.refuse_append {
            return Err(DraftError::Append {
                folder: folder.to_string(),
                reason: "NO [OVERQUOTA]".into(),
            });
        }
        self.store
            .events
            .lock()
            .unwrap()
            .imap_appends
            .push((folder.to_string(), message.to_vec()));
        Ok(())
    }

    fn logout(self) -> Result<(), DraftError> {
        self.store.events.lock().unwrap().imap_logouts += 1;
        Ok(())
    }
}

struct Harness {
    events: Shared,
    mailer: Mailer<FakeSmtp, FakeImap>,
}

fn harness(smtp_failures: Vec<SendError>, refuse_append: bool) -> Harness {
    let events = Shared::default();
    let smtp = FakeSmtp {
        events: Arc::clone(&events),
        script: Arc::new(Mutex::new(smtp_failures.into())),
    };
    let imap = FakeImap {
        events: Arc::clone(&events),
        refuse_append,
    };
    Harness {
        events,
        mailer: Mailer::new(
            AttachmentBuilder::default(),
            SendStrategy::new(smtp),
            SaveDraftStrategy::new(imap),
        ),
    }
}

fn config(draft_only: bool, attachments: &[&Path]) -> EmailConfig {
    let attachments: Vec<_> = attachments
        .iter()
        .map(|path| serde_json::json!({ "Path": path }))
        .collect();
    let text = serde_json::json!({
        "Sender": {
            "Name": "Jane Doe",
            "Email": "jane@example.com",
            "Token": "app-token",
            "Host": "mail.example.com",
            "Port": 587
        },
        "Recipients": { "To": ["a@x.com"], "Cc": [], "Bcc": [] },
        "Email": {
            "Subject": "Hi",
            "Body": "World",
            "IsBodyHtml": false,
            "DraftOnly": draft_only,
            "Attachments": attachments
        }
    })
    .to_string();
    EmailConfig::from_json(&text).unwrap()
}

fn protocol_error() -> SendError {
    SendError::Protocol("421 service not available".into())
}

#[tokio::test]
async fn test_send_mode_sends_once() {
    let harness = harness(Vec::new(), false);

    let outcome = assert_ok!(harness.mailer.run(&config(false, &[])).await);

    let Outcome::Sent(delivery) = &outcome else {
        panic!("expected a send, got {outcome:?}");
    };
    assert_eq!(delivery.attempts, 1);
    assert!(
        outcome
            .to_string()
            .starts_with("Email sent! Time taken to send email:")
    );

    let events = harness.events.lock().unwrap();
    assert_eq!(events.smtp_connects, 1);
    assert_eq!(events.smtp_sends.len(), 1);
    assert_eq!(events.smtp_closes, 1);
    assert_eq!(events.imap_connects, 0);

    let raw = String::from_utf8_lossy(&events.smtp_sends[0]);
    assert!(raw.contains("a@x.com"));
    assert!(raw.contains("Subject: Hi"));
    assert!(!raw.contains("multipart/mixed"));
}

#[tokio::test]
async fn test_draft_mode_appends_to_drafts() {
    let harness = harness(Vec::new(), false);

    let outcome = assert_ok!(harness.mailer.run(&config(true, &[])).await);

    assert_eq!(
        outcome,
        Outcome::Drafted {
            folder: DRAFTS_FOLDER.to_string()
        }
    );
    let events = harness.events.lock().unwrap();
    assert_eq!(events.imap_connects, 1);
    assert_eq!(events.imap_appends.len(), 1);
    assert_eq!(events.imap_appends[0].0, DRAFTS_FOLDER);
    assert_eq!(events.imap_logouts, 1);
    assert_eq!(events.smtp_connects, 0);
    assert!(events.smtp_sends.is_empty());
}

#[tokio::test]
async fn test_missing_attachment_fails_before_network() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.pdf");

    for draft_only in [false, true] {
        let harness = harness(Vec::new(), false);
        let err = assert_err!(
            harness
                .mailer
                .run(&config(draft_only, &[missing.as_path()]))
                .await
        );

        assert!(matches!(
            err,
            Error::Attachment(AttachmentError::NotFound { .. })
        ));
        assert!(err.to_string().contains("missing.pdf"));

        let events = harness.events.lock().unwrap();
        assert_eq!(events.smtp_connects + events.imap_connects, 0);
    }
}

#[tokio::test]
async fn test_send_succeeds_on_third_attempt() {
    let harness = harness(vec![protocol_error(), protocol_error()], false);

    let delivery = assert_ok!(harness.mailer.send_email(&config(false, &[])).await);

    assert_eq!(delivery.attempts, 3);
    let events = harness.events.lock().unwrap();
    assert_eq!(events.smtp_sends.len(), 3);
    assert_eq!(events.smtp_closes, 1);
}

#[tokio::test]
async fn test_send_exhaustion_closes_once() {
    let harness = harness(vec![protocol_error(); 3], false);

    let err = assert_err!(harness.mailer.send_email(&config(false, &[])).await);

    assert_eq!(err.category(), "RetryExhausted");
    assert!(err.to_string().contains("after 3 attempts due to SmtpProtocol"));
    let events = harness.events.lock().unwrap();
    assert_eq!(events.smtp_connects, 1);
    assert_eq!(events.smtp_closes, 1);
}

#[tokio::test]
async fn test_authentication_reply_is_not_retried() {
    let harness = harness(
        vec![SendError::Authentication("535 5.7.8 bad credentials".into())],
        false,
    );

    let err = assert_err!(harness.mailer.send_email(&config(false, &[])).await);

    assert_eq!(err.category(), "SmtpAuthentication");
    let events = harness.events.lock().unwrap();
    assert_eq!(events.smtp_sends.len(), 1);
    assert_eq!(events.smtp_closes, 1);
}

#[tokio::test]
async fn test_failed_append_logs_out_once() {
    let harness = harness(Vec::new(), true);

    let err = assert_err!(harness.mailer.save_draft(&config(true, &[])).await);

    assert_eq!(err.category(), "ImapAppend");
    let events = harness.events.lock().unwrap();
    assert_eq!(events.imap_connects, 1);
    assert_eq!(events.imap_logouts, 1);
}

#[tokio::test]
async fn test_attachments_reach_both_transports_in_order() {
    let mut first = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    first.write_all(b"first file").unwrap();
    let mut second = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    second.write_all(b"a,b\n1,2\n").unwrap();
    let paths = [first.path(), second.path()];
    let names: Vec<_> = paths
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    let harness = harness(Vec::new(), false);
    assert_ok!(harness.mailer.send_email(&config(false, &paths)).await);
    assert_ok!(harness.mailer.save_draft(&config(true, &paths)).await);

    let events = harness.events.lock().unwrap();
    let raw_messages = [
        String::from_utf8_lossy(&events.smtp_sends[0]).into_owned(),
        String::from_utf8_lossy(&events.imap_appends[0].1).into_owned(),
    ];
    for raw in &raw_messages {
        assert!(raw.contains("multipart/mixed"));
        let first_at = raw.find(&names[0]).unwrap();
        let second_at = raw.find(&names[1]).unwrap();
        assert!(first_at < second_at);
    }
}
