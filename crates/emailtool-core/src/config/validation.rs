//! Conversion of raw configuration sections into validated records.

use super::ConfigError;
use super::loader::{RawConfig, RawEmail, RawRecipients, RawSender};
use super::model::{AttachmentSource, EmailConfig, EmailContent, RecipientList, SenderIdentity};

/// Validates every section and builds the immutable configuration.
///
/// Sections are checked in file order (`Sender`, `Recipients`, `Email`);
/// the first incomplete one is reported with all of its missing keys.
///
/// # Errors
///
/// Returns [`ConfigError::Incomplete`] naming the section and its missing keys.
pub fn validate_config(raw: RawConfig) -> Result<EmailConfig, ConfigError> {
    let sender = validate_sender(raw.sender.unwrap_or_default())?;
    let recipients = validate_recipients(raw.recipients.unwrap_or_default())?;
    let content = validate_email(raw.email.unwrap_or_default())?;

    Ok(EmailConfig {
        sender,
        recipients,
        content,
    })
}

fn validate_sender(raw: RawSender) -> Result<SenderIdentity, ConfigError> {
    let mut missing = Vec::new();

    let name = required_text(raw.name, "Name", &mut missing);
    let email = required_text(raw.email, "Email", &mut missing);
    let token = required_text(raw.token, "Token", &mut missing);
    let host = required_text(raw.host, "Host", &mut missing);
    let port = match raw.port {
        Some(port) if port != 0 => port,
        _ => {
            missing.push("Port".to_string());
            0
        }
    };

    if !missing.is_empty() {
        return Err(ConfigError::incomplete("Sender", missing));
    }

    Ok(SenderIdentity {
        name,
        email,
        token,
        host,
        port,
    })
}

fn validate_recipients(raw: RawRecipients) -> Result<RecipientList, ConfigError> {
    let mut missing = Vec::new();
    if raw.to.is_none() {
        missing.push("To".to_string());
    }
    if raw.cc.is_none() {
        missing.push("Cc".to_string());
    }
    if raw.bcc.is_none() {
        missing.push("Bcc".to_string());
    }

    match (raw.to, raw.cc, raw.bcc) {
        (Some(to), Some(cc), Some(bcc)) => Ok(RecipientList { to, cc, bcc }),
        _ => Err(ConfigError::incomplete("Recipients", missing)),
    }
}

fn validate_email(raw: RawEmail) -> Result<EmailContent, ConfigError> {
    let mut missing = Vec::new();
    if raw.subject.is_none() {
        missing.push("Subject".to_string());
    }
    if raw.body.is_none() {
        missing.push("Body".to_string());
    }

    let attachments = match raw.attachments {
        Some(files) => files
            .into_iter()
            .enumerate()
            .filter_map(|(index, file)| {
                if file.path.is_none() {
                    missing.push(format!("Attachments[{index}].Path"));
                }
                file.path.map(AttachmentSource::Path)
            })
            .collect(),
        None => {
            missing.push("Attachments".to_string());
            Vec::new()
        }
    };

    match (raw.subject, raw.body) {
        (Some(subject), Some(body)) if missing.is_empty() => Ok(EmailContent {
            subject,
            body,
            is_body_html: raw.is_body_html.unwrap_or(false),
            draft_only: raw.draft_only.unwrap_or(false),
            attachments,
        }),
        _ => Err(ConfigError::incomplete("Email", missing)),
    }
}

fn required_text(value: Option<String>, key: &str, missing: &mut Vec<String>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            missing.push(key.to_string());
            String::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::loader::RawAttachment;

    fn complete_sender() -> RawSender {
        RawSender {
            name: Some("Jane Doe".into()),
            email: Some("jane@example.com".into()),
            token: Some("app-token".into()),
            host: Some("smtp.example.com".into()),
            port: Some(587),
        }
    }

    fn complete_recipients() -> RawRecipients {
        RawRecipients {
            to: Some(vec!["a@x.com".into()]),
            cc: Some(Vec::new()),
            bcc: Some(Vec::new()),
        }
    }

    fn complete_email() -> RawEmail {
        RawEmail {
            subject: Some("Hi".into()),
            body: Some("World".into()),
            is_body_html: None,
            draft_only: None,
            attachments: Some(Vec::new()),
        }
    }

    #[test]
    fn test_validate_complete_config() {
        let config = validate_config(RawConfig {
            sender: Some(complete_sender()),
            recipients: Some(complete_recipients()),
            email: Some(complete_email()),
        })
        .unwrap();

        assert_eq!(config.sender.port, 587);
        assert_eq!(config.recipients.to, vec!["a@x.com".to_string()]);
        assert!(!config.content.is_body_html);
        assert!(!config.content.draft_only);
    }

    #[test]
    fn test_sender_reports_every_missing_key() {
        let mut sender = complete_sender();
        sender.token = None;
        sender.host = Some("   ".into());
        sender.port = Some(0);

        let err = validate_sender(sender).unwrap_err();
        match err {
            ConfigError::Incomplete { section, missing } => {
                assert_eq!(section, "Sender");
                assert_eq!(missing, vec!["Token", "Host", "Port"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_recipient_list_is_incomplete() {
        let mut recipients = complete_recipients();
        recipients.cc = None;

        let err = validate_recipients(recipients).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Incomplete { section: "Recipients", ref missing } if missing == &["Cc"]
        ));
    }

    #[test]
    fn test_empty_recipient_lists_are_legal() {
        let recipients = validate_recipients(RawRecipients {
            to: Some(Vec::new()),
            cc: Some(Vec::new()),
            bcc: Some(Vec::new()),
        })
        .unwrap();
        assert!(recipients.is_empty());
    }

    #[test]
    fn test_attachment_without_path_is_incomplete() {
        let mut email = complete_email();
        email.attachments = Some(vec![
            RawAttachment {
                path: Some("a.txt".into()),
            },
            RawAttachment { path: None },
        ]);

        let err = validate_email(email).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Incomplete { section: "Email", ref missing }
                if missing == &["Attachments[1].Path"]
        ));
    }

    #[test]
    fn test_missing_sections_fail_on_first_section() {
        let err = validate_config(RawConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Incomplete {
                section: "Sender",
                ..
            }
        ));
    }
}
