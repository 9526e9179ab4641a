use std::sync::Mutex;

use tracing::{info, trace};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mail {
    Verification { code: String },
    Welcome { name: String },
    PasswordReset { url: String },
    ResetSuccess,
}

impl Mail {
    pub fn subject(&self) -> &'static str {
        match self {
            Mail::Verification { .. } => "Verify your email",
            Mail::Welcome { .. } => "Welcome",
            Mail::PasswordReset { .. } => "Reset your password",
            Mail::ResetSuccess => "Password reset successful",
        }
    }
}

/// Outbound account mail. Delivery failures never fail the request that triggered them.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, mail: Mail);
}

/// Writes mail to the log instead of delivering it. Codes and links only appear at trace level.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, mail: Mail) {
        info!(to = %to, subject = mail.subject(), "outbound mail");
        trace!(to = %to, mail = ?mail, "outbound mail body");
    }
}

/// Keeps sent mail in memory; lets callers inspect codes and links.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<(String, Mail)>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<(String, Mail)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent().into_iter().rev().find(|(addr, _)| addr == to).map(|(_, m)| m)
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, to: &str, mail: Mail) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.to_string(), mail));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn log_mailer_keeps_secrets_out_of_debug_logs() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(out.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            LogMailer.send("a@b.test", Mail::Verification { code: "482913".to_string() });
            LogMailer.send(
                "a@b.test",
                Mail::PasswordReset { url: "http://localhost/reset-password/tok123".to_string() },
            );
        });

        let logged = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Verify your email"));
        assert!(logged.contains("a@b.test"));
        assert!(!logged.contains("482913"));
        assert!(!logged.contains("tok123"));
    }
}
