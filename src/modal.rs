//! One-at-a-time confirmation and alert dialogs, plus a global busy indicator.
//!
//! The broker only brokers: whoever renders dialogs watches [`ModalBroker::subscribe`]
//! and answers through [`ModalBroker::confirm`], [`ModalBroker::cancel`] or
//! [`ModalBroker::dismiss`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{oneshot, watch};

pub const DEFAULT_CONFIRM_LABEL: &str = "Confirm";
pub const DEFAULT_CANCEL_LABEL: &str = "Cancel";
pub const DEFAULT_ACKNOWLEDGE_LABEL: &str = "OK";
pub const DEFAULT_BUSY_MESSAGE: &str = "Please wait...";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModalError {
    #[error("Another dialog is still waiting for an answer")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Confirmation,
    Alert,
}

/// What the renderer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalConfig {
    pub kind: ModalKind,
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    /// Only confirmations have a cancel button.
    pub cancel_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    title: String,
    message: String,
    confirm_label: Option<String>,
    cancel_label: Option<String>,
}

impl Confirmation {
    pub fn new<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: None,
            cancel_label: None,
        }
    }

    pub fn confirm_label<S: Into<String>>(mut self, label: S) -> Self {
        self.confirm_label = Some(label.into());
        self
    }

    pub fn cancel_label<S: Into<String>>(mut self, label: S) -> Self {
        self.cancel_label = Some(label.into());
        self
    }
}

impl From<Confirmation> for ModalConfig {
    fn from(request: Confirmation) -> Self {
        Self {
            kind: ModalKind::Confirmation,
            title: request.title,
            message: request.message,
            confirm_label: request
                .confirm_label
                .unwrap_or_else(|| DEFAULT_CONFIRM_LABEL.to_string()),
            cancel_label: Some(
                request
                    .cancel_label
                    .unwrap_or_else(|| DEFAULT_CANCEL_LABEL.to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    title: String,
    message: String,
    confirm_label: Option<String>,
}

impl Acknowledgement {
    pub fn new<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: None,
        }
    }

    pub fn confirm_label<S: Into<String>>(mut self, label: S) -> Self {
        self.confirm_label = Some(label.into());
        self
    }
}

impl From<Acknowledgement> for ModalConfig {
    fn from(request: Acknowledgement) -> Self {
        Self {
            kind: ModalKind::Alert,
            title: request.title,
            message: request.message,
            confirm_label: request
                .confirm_label
                .unwrap_or_else(|| DEFAULT_ACKNOWLEDGE_LABEL.to_string()),
            cancel_label: None,
        }
    }
}

pub struct ModalBroker {
    shown: watch::Sender<Option<ModalConfig>>,
    pending: Mutex<Option<oneshot::Sender<bool>>>,
    busy: watch::Sender<Option<String>>,
}

impl Default for ModalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalBroker {
    pub fn new() -> Self {
        let (shown, _) = watch::channel(None);
        let (busy, _) = watch::channel(None);
        Self {
            shown,
            pending: Mutex::new(None),
            busy,
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<oneshot::Sender<bool>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves to `true` on confirm and `false` on cancel or dismissal.
    pub async fn request_confirmation(&self, request: Confirmation) -> Result<bool, ModalError> {
        let answer = self.open(request.into())?;
        Ok(answer.await.unwrap_or(false))
    }

    /// Resolves once the alert is answered or dismissed.
    pub async fn request_acknowledgement(
        &self,
        request: Acknowledgement,
    ) -> Result<(), ModalError> {
        let answer = self.open(request.into())?;
        let _ = answer.await;
        Ok(())
    }

    fn open(&self, config: ModalConfig) -> Result<oneshot::Receiver<bool>, ModalError> {
        let mut pending = self.pending();
        // a requester that gave up leaves a closed sender behind
        if pending.as_ref().map_or(false, |tx| !tx.is_closed()) {
            log::warn!("Rejected dialog {:?}: another is pending", config.title);
            return Err(ModalError::Busy);
        }
        let (tx, rx) = oneshot::channel();
        *pending = Some(tx);
        log::debug!("Showing dialog {:?}", config.title);
        self.shown.send_replace(Some(config));
        Ok(rx)
    }

    fn close(&self, answer: Option<bool>) -> bool {
        let tx = self.pending().take();
        self.shown.send_replace(None);
        match (tx, answer) {
            (Some(tx), Some(answer)) => tx.send(answer).is_ok(),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Answers the open dialog positively. Returns whether anyone was waiting.
    pub fn confirm(&self) -> bool {
        self.close(Some(true))
    }

    pub fn cancel(&self) -> bool {
        self.close(Some(false))
    }

    /// Closes the open dialog without an answer.
    pub fn dismiss(&self) -> bool {
        self.close(None)
    }

    pub fn current(&self) -> Option<ModalConfig> {
        self.shown.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ModalConfig>> {
        self.shown.subscribe()
    }

    pub fn show_busy(&self, message: Option<&str>) {
        let message = message.unwrap_or(DEFAULT_BUSY_MESSAGE).to_string();
        self.busy.send_replace(Some(message));
    }

    pub fn hide_busy(&self) {
        self.busy.send_replace(None);
    }

    pub fn busy(&self) -> Option<String> {
        self.busy.borrow().clone()
    }

    pub fn subscribe_busy(&self) -> watch::Receiver<Option<String>> {
        self.busy.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn shown(rx: &mut watch::Receiver<Option<ModalConfig>>) -> ModalConfig {
        loop {
            if let Some(config) = rx.borrow_and_update().clone() {
                return config;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn confirmation_resolves_with_the_answer() {
        let broker = ModalBroker::new();
        let mut rx = broker.subscribe();

        let (answer, config) = tokio::join!(
            broker.request_confirmation(
                Confirmation::new("Confirm deletion", "Delete Kael?").confirm_label("Delete")
            ),
            async {
                let config = shown(&mut rx).await;
                assert!(broker.confirm());
                config
            }
        );
        assert_eq!(answer, Ok(true));
        assert_eq!(
            config,
            ModalConfig {
                kind: ModalKind::Confirmation,
                title: "Confirm deletion".to_string(),
                message: "Delete Kael?".to_string(),
                confirm_label: "Delete".to_string(),
                cancel_label: Some(DEFAULT_CANCEL_LABEL.to_string()),
            }
        );
        assert_eq!(broker.current(), None);

        let (answer, _) = tokio::join!(
            broker.request_confirmation(Confirmation::new("Discard", "Sure?")),
            async {
                shown(&mut rx).await;
                broker.cancel()
            }
        );
        assert_eq!(answer, Ok(false));
    }

    #[tokio::test]
    async fn dismissal_counts_as_cancel() {
        let broker = ModalBroker::new();
        let mut rx = broker.subscribe();

        let (answer, _) = tokio::join!(
            broker.request_confirmation(Confirmation::new("Discard", "Sure?")),
            async {
                shown(&mut rx).await;
                broker.dismiss()
            }
        );
        assert_eq!(answer, Ok(false));
    }

    #[tokio::test]
    async fn acknowledgement_uses_default_label() {
        let broker = ModalBroker::new();
        let mut rx = broker.subscribe();

        let (answer, config) = tokio::join!(
            broker.request_acknowledgement(Acknowledgement::new("Saved", "Kael was created")),
            async {
                let config = shown(&mut rx).await;
                broker.confirm();
                config
            }
        );
        assert_eq!(answer, Ok(()));
        assert_eq!(config.kind, ModalKind::Alert);
        assert_eq!(config.confirm_label, DEFAULT_ACKNOWLEDGE_LABEL);
        assert_eq!(config.cancel_label, None);
    }

    #[tokio::test]
    async fn only_one_dialog_at_a_time() {
        let broker = ModalBroker::new();
        let mut rx = broker.subscribe();

        let (first, second) = tokio::join!(
            broker.request_confirmation(Confirmation::new("First", "?")),
            async {
                shown(&mut rx).await;
                let second = broker
                    .request_acknowledgement(Acknowledgement::new("Second", "!"))
                    .await;
                assert_eq!(broker.current().map(|c| c.title), Some("First".to_string()));
                broker.confirm();
                second
            }
        );
        assert_eq!(first, Ok(true));
        assert_eq!(second, Err(ModalError::Busy));
        assert!(!broker.confirm());
    }

    #[tokio::test]
    async fn abandoned_requests_free_the_slot() {
        let broker = ModalBroker::new();
        drop(broker.open(Confirmation::new("Gone", "?").into()).unwrap());

        let mut rx = broker.subscribe();
        let (answer, _) = tokio::join!(
            broker.request_confirmation(Confirmation::new("Next", "?")),
            async {
                loop {
                    if shown(&mut rx).await.title == "Next" {
                        break;
                    }
                    rx.changed().await.unwrap();
                }
                broker.confirm()
            }
        );
        assert_eq!(answer, Ok(true));
    }

    #[test]
    fn busy_indicator_is_independent() {
        let broker = ModalBroker::new();
        assert_eq!(broker.busy(), None);

        broker.show_busy(None);
        assert_eq!(broker.busy().as_deref(), Some(DEFAULT_BUSY_MESSAGE));
        broker.show_busy(Some("Importing..."));
        assert_eq!(broker.busy().as_deref(), Some("Importing..."));
        assert_eq!(broker.current(), None);

        broker.hide_busy();
        assert_eq!(broker.busy(), None);
    }
}
