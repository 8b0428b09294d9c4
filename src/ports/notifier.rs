use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Category of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyKind {
    Status,
    Maintenance,
    Sell,
    Mooning,
    Finished,
    Buyback,
    Error,
}

impl fmt::Display for NotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotifyKind::Status => "Status",
            NotifyKind::Maintenance => "Maintenance",
            NotifyKind::Sell => "Sell",
            NotifyKind::Mooning => "Mooning",
            NotifyKind::Finished => "Finished",
            NotifyKind::Buyback => "Buyback",
            NotifyKind::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// Outbound notification port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: NotifyKind, text: &str) -> Result<(), NotifyError>;
}
