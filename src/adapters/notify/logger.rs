//! Log-only notifier
//!
//! Writes every message through `tracing` and keeps a copy so the run can be
//! inspected afterwards.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ports::{Notifier, NotifyError, NotifyKind};

#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    sent: Arc<Mutex<Vec<(NotifyKind, String)>>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<(NotifyKind, String)> {
        self.sent.lock().await.clone()
    }

    pub async fn messages_of(&self, kind: NotifyKind) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, kind: NotifyKind, text: &str) -> Result<(), NotifyError> {
        match kind {
            NotifyKind::Error | NotifyKind::Maintenance => tracing::warn!(target: "notify", "{}: {}", kind, text),
            _ => tracing::info!(target: "notify", "{}: {}", kind, text),
        }
        self.sent.lock().await.push((kind, text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_are_kept_in_order() {
        let notifier = LogNotifier::new();
        notifier.notify(NotifyKind::Sell, "stop-loss at 0.0015").await.unwrap();
        notifier.notify(NotifyKind::Finished, "gained 0.1").await.unwrap();
        notifier.notify(NotifyKind::Sell, "done").await.unwrap();

        assert_eq!(notifier.messages().await.len(), 3);
        assert_eq!(
            notifier.messages_of(NotifyKind::Sell).await,
            vec!["stop-loss at 0.0015".to_string(), "done".to_string()]
        );
    }
}
