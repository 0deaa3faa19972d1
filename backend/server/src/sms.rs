//! Outbound SMS. Delivery is mocked: codes go to the log.
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::AppError;

pub fn otp_message(otp: &str) -> String {
    format!("Your Lupad verification code is: {otp}")
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError>;
}

pub struct LogSender;

#[async_trait]
impl SmsSender for LogSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
        info!(phone, "SMS: {message}");

        Ok(())
    }
}

/// Keeps every message so tests can read codes back.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Code from the latest message to `phone`.
    pub fn last_code(&self, phone: &str) -> Option<String> {
        self.messages()
            .into_iter()
            .rev()
            .find(|(to, _)| to == phone)
            .and_then(|(_, message)| {
                message
                    .rsplit(' ')
                    .next()
                    .map(|code| code.to_string())
            })
    }
}

#[async_trait]
impl SmsSender for RecordingSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
        self.sent
            .lock()
            .map_err(|_| AppError::InternalError("sms recorder poisoned".to_string()))?
            .push((phone.to_string(), message.to_string()));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sender_last_code() {
        let sender = RecordingSender::new();

        sender.send("+639171234567", &otp_message("111111")).await.unwrap();
        sender.send("+639181234567", &otp_message("222222")).await.unwrap();
        sender.send("+639171234567", &otp_message("333333")).await.unwrap();

        assert_eq!(sender.last_code("+639171234567").as_deref(), Some("333333"));
        assert_eq!(sender.last_code("+639181234567").as_deref(), Some("222222"));
        assert_eq!(sender.last_code("+639191234567"), None);
    }
}
