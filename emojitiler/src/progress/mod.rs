//! Progress messages and cancellation signals.
//!
//! Each live generation job owns one status message in the originating
//! chat, carrying a "cancel" action that encodes a [`CancelKey`] derived
//! from (chat, reply target, initiator). The tracker registers a
//! [`ProgressTicket`] per posted message and a [`CancelSignal`] per key;
//! the pipeline watches the signal's token while the job runs.
//!
//! # Architecture
//!
//! ```text
//! Pipeline                ProgressTracker                 Platform
//!    │ send_message             │                            │
//!    ├─────────────────────────►│ post status + cancel action│
//!    │                          ├───────────────────────────►│
//!    │   token                  │ register ticket + signal   │
//!    │◄─────────────────────────┤                            │
//!    │                          │        cancel action pressed
//!    │                          │◄───────────────────────────┤
//!    │                          │ check initiator, fire once │
//!    │ token.cancelled() fires  │                            │
//! ```

use crate::platform::{ChatId, MessageId, PlatformError, SentMessage, UserId};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Composite id binding chat, reply target and initiator to one
/// cancellation signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CancelKey(String);

impl CancelKey {
    /// Derives the key for a job.
    pub fn derive(chat: ChatId, reply_to: Option<MessageId>, initiator: UserId) -> Self {
        Self(format!("{chat}:{}:{initiator}", reply_to.unwrap_or(0)))
    }

    /// Parses a key previously rendered with `Display` (e.g. out of a
    /// cancel action payload).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl std::fmt::Display for CancelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Posting surface for status messages.
///
/// Implemented by the platform client; tests inject mocks.
pub trait StatusMessenger: Send + Sync {
    /// Posts a status message carrying a cancel action for `cancel_key`.
    fn send_status(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
        cancel_key: &CancelKey,
    ) -> impl Future<Output = Result<SentMessage, PlatformError>> + Send;

    /// Replaces a status message's text, re-attaching the cancel action.
    fn update_status(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        cancel_key: &CancelKey,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Removes a status message.
    fn delete_status(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

/// One live job's status message registration.
#[derive(Debug, Clone)]
pub struct ProgressTicket {
    /// Chat the status message lives in.
    pub chat: ChatId,
    /// Id of the status message.
    pub message_id: MessageId,
    /// Last status text posted.
    pub status: String,
    /// Key of the cancellation signal for this job.
    pub cancel_key: CancelKey,
    /// User who initiated the job; the only one allowed to cancel it.
    pub initiator: UserId,
}

/// Per-key one-shot cancellation broadcast.
///
/// The token is handed to the job as its cancellation context; `fire`
/// cancels it at most once and reports whether this call was the one
/// that fired.
#[derive(Debug)]
struct CancelSignal {
    token: CancellationToken,
    fired: AtomicBool,
}

impl CancelSignal {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            fired: AtomicBool::new(false),
        }
    }

    fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::SeqCst);
        if first {
            self.token.cancel();
        }
        first
    }
}

/// Errors from progress-message operations.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// No ticket registered for the given chat/message.
    #[error("no progress ticket for chat {chat} message {message}")]
    TicketNotFound { chat: ChatId, message: MessageId },

    /// The cancel requester is not the job initiator.
    #[error("user {requester} may not cancel a job initiated by {initiator}")]
    NotInitiator { requester: UserId, initiator: UserId },

    /// The platform call failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Registry of progress tickets and cancellation signals.
///
/// Owned by the pipeline driver and scoped to its lifecycle; each entry
/// is owned exclusively by the job that created it until evicted.
#[derive(Debug)]
pub struct ProgressTracker<M: StatusMessenger> {
    messenger: M,
    tickets: DashMap<(ChatId, MessageId), ProgressTicket>,
    signals: DashMap<CancelKey, CancelSignal>,
}

impl<M: StatusMessenger> ProgressTracker<M> {
    /// Creates a tracker posting through `messenger`.
    pub fn new(messenger: M) -> Self {
        Self {
            messenger,
            tickets: DashMap::new(),
            signals: DashMap::new(),
        }
    }

    /// Posts a status message for a starting job.
    ///
    /// Derives the cancel key from (chat, reply target, initiator),
    /// registers the ticket under (chat, message id), opens the
    /// cancellation signal, and returns the message id together with the
    /// job's cancellation token.
    pub async fn send_message(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        initiator: UserId,
        status: &str,
    ) -> Result<(MessageId, CancellationToken), ProgressError> {
        let key = CancelKey::derive(chat, reply_to, initiator);
        let sent = self
            .messenger
            .send_status(chat, reply_to, status, &key)
            .await?;

        let token = self
            .signals
            .entry(key.clone())
            .or_insert_with(CancelSignal::new)
            .token
            .clone();

        self.tickets.insert(
            (chat, sent.message_id),
            ProgressTicket {
                chat,
                message_id: sent.message_id,
                status: status.to_string(),
                cancel_key: key,
                initiator,
            },
        );

        debug!(chat, message = sent.message_id, "progress message posted");
        Ok((sent.message_id, token))
    }

    /// Updates a job's status text, re-attaching the cancel action.
    pub async fn update_message(
        &self,
        chat: ChatId,
        message: MessageId,
        status: &str,
    ) -> Result<(), ProgressError> {
        let key = {
            let mut ticket = self
                .tickets
                .get_mut(&(chat, message))
                .ok_or(ProgressError::TicketNotFound { chat, message })?;
            ticket.status = status.to_string();
            ticket.cancel_key.clone()
        };
        self.messenger
            .update_status(chat, message, status, &key)
            .await?;
        Ok(())
    }

    /// Removes a job's status message and evicts its ticket and signal.
    pub async fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> Result<(), ProgressError> {
        let ticket = self
            .tickets
            .remove(&(chat, message))
            .map(|(_, t)| t)
            .ok_or(ProgressError::TicketNotFound { chat, message })?;
        self.signals.remove(&ticket.cancel_key);
        self.messenger.delete_status(chat, message).await?;
        Ok(())
    }

    /// Returns the cancellation token for `key`, if a signal is open.
    pub fn cancel_signal(&self, key: &CancelKey) -> Option<CancellationToken> {
        self.signals.get(key).map(|s| s.token.clone())
    }

    /// Fires the signal for `key` at most once and evicts it.
    ///
    /// Returns true if this call fired the signal. Calling again (or on
    /// an unknown key) is a no-op returning false.
    pub fn cancel(&self, key: &CancelKey) -> bool {
        match self.signals.remove(key) {
            Some((_, signal)) => signal.fire(),
            None => false,
        }
    }

    /// Handles an inbound cancel action from the chat layer.
    ///
    /// Rejected unless `requester` matches the ticket's initiator.
    pub fn request_cancel(
        &self,
        chat: ChatId,
        message: MessageId,
        requester: UserId,
    ) -> Result<bool, ProgressError> {
        let key = {
            let ticket = self
                .tickets
                .get(&(chat, message))
                .ok_or(ProgressError::TicketNotFound { chat, message })?;
            if ticket.initiator != requester {
                return Err(ProgressError::NotInitiator {
                    requester,
                    initiator: ticket.initiator,
                });
            }
            ticket.cancel_key.clone()
        };
        Ok(self.cancel(&key))
    }

    /// Returns the ticket registered for (chat, message), if any.
    pub fn ticket(&self, chat: ChatId, message: MessageId) -> Option<ProgressTicket> {
        self.tickets.get(&(chat, message)).map(|t| t.clone())
    }

    /// Number of live tickets (for stats).
    pub fn active_count(&self) -> usize {
        self.tickets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex;

    /// Mock messenger recording calls and minting message ids.
    #[derive(Debug, Default)]
    struct MockMessenger {
        next_id: AtomicI64,
        deleted: Mutex<Vec<MessageId>>,
        updated: Mutex<Vec<(MessageId, String)>>,
    }

    impl StatusMessenger for MockMessenger {
        async fn send_status(
            &self,
            _chat: ChatId,
            _reply_to: Option<MessageId>,
            _text: &str,
            _cancel_key: &CancelKey,
        ) -> Result<SentMessage, PlatformError> {
            Ok(SentMessage {
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 100,
            })
        }

        async fn update_status(
            &self,
            _chat: ChatId,
            message: MessageId,
            text: &str,
            _cancel_key: &CancelKey,
        ) -> Result<(), PlatformError> {
            self.updated
                .lock()
                .unwrap()
                .push((message, text.to_string()));
            Ok(())
        }

        async fn delete_status(
            &self,
            _chat: ChatId,
            message: MessageId,
        ) -> Result<(), PlatformError> {
            self.deleted.lock().unwrap().push(message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_registers_ticket_and_signal() {
        let tracker = ProgressTracker::new(MockMessenger::default());
        let (message, token) = tracker.send_message(7, Some(3), 42, "working").await.unwrap();

        let ticket = tracker.ticket(7, message).unwrap();
        assert_eq!(ticket.initiator, 42);
        assert_eq!(ticket.status, "working");
        assert!(!token.is_cancelled());
        assert!(tracker.cancel_signal(&ticket.cancel_key).is_some());
    }

    #[tokio::test]
    async fn test_cancel_fires_token_once() {
        let tracker = ProgressTracker::new(MockMessenger::default());
        let (message, token) = tracker.send_message(7, None, 42, "working").await.unwrap();
        let key = tracker.ticket(7, message).unwrap().cancel_key;

        assert!(tracker.cancel(&key));
        assert!(token.is_cancelled());
        // Second fire must not fault and reports not-first
        assert!(!tracker.cancel(&key));
        // Signal entry evicted
        assert!(tracker.cancel_signal(&key).is_none());
    }

    #[tokio::test]
    async fn test_request_cancel_checks_initiator() {
        let tracker = ProgressTracker::new(MockMessenger::default());
        let (message, token) = tracker.send_message(7, None, 42, "working").await.unwrap();

        let err = tracker.request_cancel(7, message, 99).unwrap_err();
        assert!(matches!(
            err,
            ProgressError::NotInitiator {
                requester: 99,
                initiator: 42
            }
        ));
        assert!(!token.is_cancelled());

        assert!(tracker.request_cancel(7, message, 42).unwrap());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_update_rewrites_status() {
        let tracker = ProgressTracker::new(MockMessenger::default());
        let (message, _) = tracker.send_message(7, None, 42, "1/4").await.unwrap();

        tracker.update_message(7, message, "2/4").await.unwrap();
        assert_eq!(tracker.ticket(7, message).unwrap().status, "2/4");
    }

    #[tokio::test]
    async fn test_delete_evicts_everything() {
        let tracker = ProgressTracker::new(MockMessenger::default());
        let (message, _) = tracker.send_message(7, None, 42, "working").await.unwrap();
        let key = tracker.ticket(7, message).unwrap().cancel_key;

        tracker.delete_message(7, message).await.unwrap();
        assert!(tracker.ticket(7, message).is_none());
        assert!(tracker.cancel_signal(&key).is_none());
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn test_update_unknown_message_fails() {
        let tracker = ProgressTracker::new(MockMessenger::default());
        assert!(matches!(
            tracker.update_message(7, 12345, "status").await,
            Err(ProgressError::TicketNotFound { .. })
        ));
    }
}
