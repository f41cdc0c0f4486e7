//! Message Gateway
//!
//! Per-connection entry point of the delivery pipeline. A submission is
//! validated, fanned out to the recipient's sessions via the event bus, and
//! then appended to the durable log under the conversation key. Fanout
//! happens before the durable append completes, so perceived delivery
//! latency is bounded by the bus, not by storage. The caller is told
//! "accepted" once the append is acknowledged, not once the message is
//! persisted to the relational store.
//!
//! If the append fails after fanout already happened, the message may have
//! been seen live without ever reaching durable storage. The append is
//! retried with bounded backoff before that risk window is surfaced to the
//! caller as a `TransientInfra` error.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::bus::{EventBus, UserEvent};
use crate::backend::error::BackendError;
use crate::backend::log::DurableLog;
use crate::shared::messaging::{ChatMessage, PendingMessage};

/// Append attempts before the caller sees a failure.
const APPEND_ATTEMPTS: u32 = 3;
/// Base backoff between append attempts; doubles per attempt.
const APPEND_BACKOFF: Duration = Duration::from_millis(100);

/// Validates, fans out, and durably enqueues submissions.
pub struct MessageGateway {
    bus: Arc<EventBus>,
    log: Arc<dyn DurableLog>,
}

impl MessageGateway {
    pub fn new(bus: Arc<EventBus>, log: Arc<dyn DurableLog>) -> Self {
        Self { bus, log }
    }

    /// Submit a chat message on behalf of `sender_id`.
    ///
    /// Returns the accepted message once the durable append is
    /// acknowledged. Fanout is fire-and-forget; a recipient with no live
    /// session anywhere simply receives nothing until they query history.
    pub async fn submit(
        &self,
        sender_id: &str,
        receiver_id: &str,
        body: &str,
    ) -> Result<ChatMessage, BackendError> {
        if receiver_id.is_empty() {
            return Err(BackendError::invalid_input("Receiver ID is required"));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(BackendError::invalid_input("Message body cannot be empty"));
        }

        let pending = PendingMessage::new(sender_id, receiver_id, body);

        let delivered = self.bus.publish_to_user(
            receiver_id,
            UserEvent::ChatMessage {
                conversation_key: pending.conversation_key.clone(),
                sender_id: pending.sender_id.clone(),
                receiver_id: pending.receiver_id.clone(),
                body: pending.body.clone(),
                timestamp: pending.submitted_at,
            },
        );

        tracing::info!(
            sender_id,
            receiver_id,
            conversation_key = %pending.conversation_key,
            idempotency_key = %pending.idempotency_key,
            delivered_locally = delivered,
            "[Gateway] Message submitted"
        );

        let payload = serde_json::to_vec(&pending)?;
        self.append_with_retry(pending.conversation_key.as_str(), payload)
            .await?;

        Ok(pending.accepted_view())
    }

    async fn append_with_retry(
        &self,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> Result<(), BackendError> {
        let mut backoff = APPEND_BACKOFF;
        for attempt in 1..=APPEND_ATTEMPTS {
            match self.log.append(partition_key, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < APPEND_ATTEMPTS => {
                    tracing::warn!(
                        partition_key,
                        attempt,
                        "[Gateway] Log append failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        partition_key,
                        "[Gateway] Log append failed after {} attempts: {}",
                        APPEND_ATTEMPTS,
                        e
                    );
                    return Err(BackendError::transient(format!(
                        "message could not be queued: {}",
                        e
                    )));
                }
            }
        }
        unreachable!("retry loop always returns");
    }
}
