// ── Audit records ──
//
// One row per resolved Access-Request. Field names follow the audit
// table the web UI reads (`radius_logs`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AuthRequest, Outcome, RejectReason};

pub const REQUEST_TYPE_ACCESS: &str = "Access-Request";
pub const RESPONSE_ACCEPT: &str = "Access-Accept";
pub const RESPONSE_REJECT: &str = "Access-Reject";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub username: String,
    pub nas_ip_address: String,
    pub nas_port_id: String,
    pub called_station_id: String,
    pub calling_station_id: String,
    pub request_type: String,
    pub response_type: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(request: &AuthRequest, outcome: &Outcome) -> Self {
        let response_type = if outcome.is_accept() {
            RESPONSE_ACCEPT
        } else {
            RESPONSE_REJECT
        };

        Self {
            username: request.audit_identity().to_owned(),
            nas_ip_address: request.nas_ip.to_string(),
            nas_port_id: request.nas_port.clone().unwrap_or_default(),
            called_station_id: request.called_station_id.clone().unwrap_or_default(),
            calling_station_id: request.calling_station_id.clone().unwrap_or_default(),
            request_type: REQUEST_TYPE_ACCESS.to_owned(),
            response_type: response_type.to_owned(),
            reason: reason_text(request, outcome),
            timestamp: request.received_at,
        }
    }
}

fn reason_text(request: &AuthRequest, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Exact { vlan, .. } | Outcome::Prefix { vlan, .. } | Outcome::Default { vlan } => {
            format!("VLAN {vlan} assigned via {} match", outcome.kind())
        }
        Outcome::Reject {
            reason: RejectReason::NoAssignment,
        } => format!(
            "No VLAN assignment found for MAC {}",
            request.audit_identity()
        ),
        Outcome::Reject { reason } => reason.to_string(),
    }
}
