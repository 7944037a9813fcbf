//! Transactional email templates for admission notifications.
//!
//! `RegistrationEmail` is rendered once per newly created account. The
//! `render()` method returns an `EmailMessage` ready to pass to
//! `EmailSender::send`.

use crate::services::email_sender::EmailMessage;
use crate::types::student::{level_label, programme_label, CreatedStudent};

/// Notification sent to a student whose account was created by a batch.
pub struct RegistrationEmail<'a> {
    pub student: &'a CreatedStudent,
    pub login_url: &'a str,
}

impl<'a> RegistrationEmail<'a> {
    pub fn render(&self) -> EmailMessage {
        let programme = programme_label(self.student.programme).unwrap_or("your programme");
        let level = level_label(self.student.current_level)
            .unwrap_or_else(|| "your current year".to_string());

        let subject = "Your QVerse account has been created";
        let html = format!(
            r#"<p>Dear {first_name},</p>
<p>You have been registered on QVerse with registration number <strong>{regno}</strong>,
admitted to {programme}, {level}.</p>
<p>Sign in here to activate your account and set a password:</p>
<p><a href="{url}">{url}</a></p>
<p>If you believe this registration is a mistake, please contact the admissions office.</p>"#,
            first_name = self.student.first_name,
            regno = self.student.registration_number,
            programme = programme,
            level = level,
            url = self.login_url,
        );
        let text = format!(
            "Dear {},\n\nYou have been registered on QVerse with registration number {} \
             ({}, {}).\n\nSign in to activate your account: {}\n\nIf you believe this \
             registration is a mistake, please contact the admissions office.",
            self.student.first_name,
            self.student.registration_number,
            programme,
            level,
            self.login_url,
        );

        EmailMessage {
            to: self.student.email.clone(),
            subject: subject.to_string(),
            html,
            text,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> CreatedStudent {
        CreatedStudent {
            registration_number: "A100".into(),
            email: "a@x.com".into(),
            first_name: "Ann".into(),
            surname: "Lee".into(),
            current_level: 3,
            programme: 2,
        }
    }

    #[test]
    fn test_render_addresses_the_student() {
        let student = student();
        let msg = RegistrationEmail {
            student: &student,
            login_url: "https://qverse.example.edu/login",
        }
        .render();

        assert_eq!(msg.to, "a@x.com");
        assert!(msg.text.contains("Dear Ann"));
        assert!(msg.text.contains("A100"));
        assert!(msg.html.contains("https://qverse.example.edu/login"));
    }

    #[test]
    fn test_render_uses_programme_and_level_labels() {
        let student = student();
        let msg = RegistrationEmail {
            student: &student,
            login_url: "https://qverse.example.edu/login",
        }
        .render();

        assert!(msg.text.contains("Postgraduate Studies"));
        assert!(msg.text.contains("Year 3"));
    }
}
