//! User-facing notices.
//!
//! Workflows never talk to the UI directly; they push a `Notice` through
//! a `Notifier` and whatever front end holds the receiver decides how to
//! show it.

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, UnboundedReceiver<Notice>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        if self.tx.send(notice).is_err() {
            debug!("Notice dropped; no receiver");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.info("Loading");
        notifier.clone().error("Failed");
        assert_eq!(rx.try_recv().unwrap().level, NoticeLevel::Info);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notice {
                level: NoticeLevel::Error,
                message: "Failed".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.success("nobody listening");
    }
}
