// ── Audit logger ──
//
// Writes one audit row per resolved request. Failures are logged and
// swallowed: the NAS already has its answer by the time this runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::model::{AuditRecord, AuthRequest, Outcome};
use crate::store::AuditSink;

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    timeout: Duration,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Append the record for `request`. Returns whether the row was written.
    pub async fn record(&self, request: &AuthRequest, outcome: &Outcome) -> bool {
        let record = AuditRecord::new(request, outcome);
        match tokio::time::timeout(self.timeout, self.sink.append_audit(&record)).await {
            Ok(Ok(())) => {
                debug!(request_id = %request.id, username = %record.username, "audit recorded");
                true
            }
            Ok(Err(e)) => {
                warn!(request_id = %request.id, error = %e, reason = %record.reason, "audit write failed");
                false
            }
            Err(_) => {
                warn!(
                    request_id = %request.id,
                    timeout_ms = self.timeout.as_millis(),
                    reason = %record.reason,
                    "audit write timed out"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::RejectReason;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use radvlan_proto::{Code, Packet};

    fn request() -> AuthRequest {
        let packet = Packet::new(Code::AccessRequest, 1, [0; 16]);
        AuthRequest::from_packet(&packet, "10.0.0.2:1812".parse().unwrap(), Utc::now())
    }

    #[tokio::test]
    async fn writes_one_row() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::new(store.clone(), Duration::from_secs(1));
        assert!(logger.record(&request(), &Outcome::reject(RejectReason::MissingMac)).await);
        assert_eq!(store.audit_records().len(), 1);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_audit_failing(true);
        let logger = AuditLogger::new(store.clone(), Duration::from_secs(1));
        assert!(!logger.record(&request(), &Outcome::reject(RejectReason::MissingMac)).await);
        assert!(store.audit_records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sink_times_out() {
        let store = Arc::new(MemoryStore::new());
        store.set_latency(Duration::from_secs(30));
        let logger = AuditLogger::new(store.clone(), Duration::from_secs(1));
        assert!(!logger.record(&request(), &Outcome::reject(RejectReason::MissingMac)).await);
    }
}
