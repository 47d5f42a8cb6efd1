// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording connection sink with failure injection.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sibyl_core::error::SibylError;
use sibyl_core::events::{SessionEvent, SignalMessage};
use sibyl_core::traits::ConnectionSink;

/// A [`ConnectionSink`] that records every delivered payload.
///
/// Payloads are kept raw; [`events`](RecordingSink::events) and
/// [`signals`](RecordingSink::signals) parse them on demand, skipping
/// payloads of the other shape so a sink registered for both notification
/// and signaling traffic can still be asserted against. Flip
/// [`break_connection`](RecordingSink::break_connection) to make every
/// later delivery fail, which is how eviction paths are exercised.
pub struct RecordingSink {
    id: String,
    payloads: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new(id: &str) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            id: id.to_string(),
            payloads: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    /// Makes every subsequent delivery fail.
    pub fn break_connection(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Every payload delivered so far, in order.
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    /// Delivered payloads that parse as session events.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.payloads()
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }

    /// Delivered payloads that parse as signaling frames.
    pub fn signals(&self) -> Vec<SignalMessage> {
        self.payloads()
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }
}

#[async_trait]
impl ConnectionSink for RecordingSink {
    fn connection_id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, payload: String) -> Result<(), SibylError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SibylError::DeliveryFailure {
                party: sibyl_core::types::PartyId::new(self.id.clone()),
                source: None,
            });
        }
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sibyl_core::types::SessionId;

    #[tokio::test]
    async fn records_in_order_and_fails_after_breaking() {
        let sink = RecordingSink::new("conn-1");
        sink.deliver(r#"{"type":"session_rejected","session_id":"s-1"}"#.to_string())
            .await
            .unwrap();
        sink.deliver(r#"{"type":"offer","data":{"sdp":"v=0"}}"#.to_string())
            .await
            .unwrap();

        assert_eq!(sink.payloads().len(), 2);
        assert_eq!(
            sink.events(),
            vec![SessionEvent::SessionRejected {
                session_id: SessionId("s-1".into())
            }]
        );
        assert_eq!(sink.signals().len(), 2);

        sink.break_connection();
        assert!(sink.deliver("{}".to_string()).await.is_err());
        assert_eq!(sink.payloads().len(), 2);
    }
}
