//! Request lifecycle records and status notifications.
//!
//! A caller submits a `TxRequest`. At admission the manager binds it to an
//! account and turns it into a `QueuedRequest`; once broadcast it becomes a
//! `TrackedTransaction` keyed by hash until a terminal `StatusUpdate`.

use std::fmt;

use alloy::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::{Category, TxDescriptor};

// ============================================================================
// Correlation Id
// ============================================================================

/// Caller-supplied key used to route status updates back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new unique correlation id.
    ///
    /// Format: `swarm_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().to_string()[..8];
        Self(format!("swarm_{ts}_{uuid_short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Caller Request
// ============================================================================

/// What a caller hands to `add_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub descriptor: TxDescriptor,
    /// Unix seconds after which the request must not be submitted.
    pub deadline: u64,
    /// Unix seconds before which the request must not be submitted.
    #[serde(default)]
    pub not_before: Option<u64>,
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
}

impl TxRequest {
    #[must_use]
    pub fn new(descriptor: TxDescriptor, deadline: u64) -> Self {
        Self {
            descriptor,
            deadline,
            not_before: None,
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_not_before(mut self, not_before: u64) -> Self {
        self.not_before = Some(not_before);
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

// ============================================================================
// Queued Request
// ============================================================================

/// A request bound to an account, waiting in the delayed area or main queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    pub descriptor: TxDescriptor,
    pub category: Category,
    pub deadline: u64,
    pub not_before: Option<u64>,
    pub correlation_id: Option<CorrelationId>,
    pub account: Address,
    pub retries: u32,
    /// Max fee per gas override (wei), set by speed-up.
    pub gas_price: Option<u128>,
    /// Priority fee override (wei), set by speed-up alongside `gas_price`.
    pub priority_fee: Option<u128>,
    /// Nonce override, set by speed-up so the replacement reuses the stalled nonce.
    pub nonce: Option<u64>,
    /// Admission sequence, assigned by the queue.
    pub seq: u64,
}

impl QueuedRequest {
    /// Bind a caller request to an account. The category is resolved here.
    #[must_use]
    pub fn admit(request: TxRequest, account: Address) -> Self {
        let category = request.descriptor.category();
        Self {
            descriptor: request.descriptor,
            category,
            deadline: request.deadline,
            not_before: request.not_before,
            correlation_id: request.correlation_id,
            account,
            retries: 0,
            gas_price: None,
            priority_fee: None,
            nonce: None,
            seq: 0,
        }
    }

    /// Deadline strictly before `now`.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.deadline < now
    }

    /// Not-before reached (absent counts as eligible).
    #[must_use]
    pub fn is_eligible(&self, now: u64) -> bool {
        self.not_before.map_or(true, |t| t <= now)
    }

    /// Ordering key: category rank, then not-before (absent = 0), then admission order.
    #[must_use]
    pub fn priority_key(&self) -> (u8, u64, u64) {
        (self.category.rank(), self.not_before.unwrap_or(0), self.seq)
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        self.descriptor.function_name()
    }
}

// ============================================================================
// Tracked Transaction
// ============================================================================

/// A broadcast transaction awaiting confirmation, keyed by `hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTransaction {
    pub request: QueuedRequest,
    pub hash: TxHash,
    pub nonce: u64,
    /// Max fee per gas used for the broadcast (wei).
    pub gas_price: Option<u128>,
    /// Priority fee per gas used for the broadcast (wei).
    pub priority_fee: Option<u128>,
    /// Wall-clock submission time (Unix milliseconds).
    pub submitted_at_ms: u64,
}

impl TrackedTransaction {
    #[must_use]
    pub fn new(
        request: QueuedRequest,
        hash: TxHash,
        nonce: u64,
        gas_price: Option<u128>,
        submitted_at_ms: u64,
    ) -> Self {
        Self {
            request,
            hash,
            nonce,
            gas_price,
            priority_fee: None,
            submitted_at_ms,
        }
    }

    #[must_use]
    pub fn with_priority_fee(mut self, priority_fee: u128) -> Self {
        self.priority_fee = Some(priority_fee);
        self
    }

    /// Milliseconds since submission.
    #[must_use]
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.submitted_at_ms)
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.request.correlation_id.as_ref()
    }
}

// ============================================================================
// Status Updates
// ============================================================================

/// Terminal outcome published to subscribers of a correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "hash", rename_all = "lowercase")]
pub enum StatusUpdate {
    /// Mined with success status.
    Confirmed(TxHash),
    /// Mined but reverted.
    Reverted(TxHash),
    /// Retries exhausted before any broadcast succeeded.
    Failed,
    /// Abandoned after repeated stalls.
    Dropped(TxHash),
    /// Deadline passed before submission.
    Expired,
}

impl StatusUpdate {
    #[must_use]
    pub fn hash(&self) -> Option<TxHash> {
        match self {
            Self::Confirmed(h) | Self::Reverted(h) | Self::Dropped(h) => Some(*h),
            Self::Failed | Self::Expired => None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(h) => write!(f, "{h}"),
            Self::Reverted(h) => write!(f, "reverted:{h}"),
            Self::Failed => write!(f, "failed"),
            Self::Dropped(h) => write!(f, "dropped:{h}"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};

    const ME: Address = address!("2222222222222222222222222222222222222222");

    fn transfer() -> TxDescriptor {
        TxDescriptor::native_transfer(ME, U256::from(1))
    }

    #[test]
    fn test_correlation_id_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("swarm_"));
    }

    #[test]
    fn test_admit_resolves_category() {
        let req = TxRequest::new(transfer(), 100).with_not_before(50);
        let q = QueuedRequest::admit(req, ME);
        assert_eq!(q.category, Category::Transfer);
        assert_eq!(q.retries, 0);
        assert_eq!(q.not_before, Some(50));
        assert_eq!(q.account, ME);
    }

    #[test]
    fn test_expiry_is_strict() {
        let q = QueuedRequest::admit(TxRequest::new(transfer(), 100), ME);
        assert!(!q.is_expired(100));
        assert!(q.is_expired(101));
    }

    #[test]
    fn test_eligibility() {
        let q = QueuedRequest::admit(TxRequest::new(transfer(), 100).with_not_before(10), ME);
        assert!(!q.is_eligible(9));
        assert!(q.is_eligible(10));

        let q = QueuedRequest::admit(TxRequest::new(transfer(), 100), ME);
        assert!(q.is_eligible(0));
    }

    #[test]
    fn test_status_display() {
        let h = TxHash::repeat_byte(0xab);
        assert_eq!(StatusUpdate::Failed.to_string(), "failed");
        assert_eq!(StatusUpdate::Confirmed(h).to_string(), h.to_string());
        assert_eq!(StatusUpdate::Dropped(h).hash(), Some(h));
        assert!(StatusUpdate::Expired.hash().is_none());
    }

    #[test]
    fn test_tracked_elapsed_saturates() {
        let q = QueuedRequest::admit(TxRequest::new(transfer(), 100), ME);
        let t = TrackedTransaction::new(q, TxHash::ZERO, 0, None, 5_000);
        assert_eq!(t.elapsed_ms(4_000), 0);
        assert_eq!(t.elapsed_ms(7_500), 2_500);
        assert!(t.priority_fee.is_none());
        assert_eq!(t.with_priority_fee(7).priority_fee, Some(7));
    }

    #[test]
    fn test_request_from_json_uses_defaults() {
        let json = r#"{
            "descriptor": {
                "kind": "native_transfer",
                "to": "0x2222222222222222222222222222222222222222",
                "value": "0x64"
            },
            "deadline": 100
        }"#;
        let req: TxRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.descriptor, TxDescriptor::native_transfer(ME, U256::from(100)));
        assert_eq!(req.deadline, 100);
        assert!(req.not_before.is_none());
        assert!(req.correlation_id.is_none());
    }

    #[test]
    fn test_status_update_json_shape() {
        let h = TxHash::repeat_byte(0xab);
        let confirmed = serde_json::to_value(StatusUpdate::Confirmed(h)).unwrap();
        assert_eq!(confirmed["status"], "confirmed");
        assert_eq!(confirmed["hash"], serde_json::to_value(h).unwrap());

        let failed = serde_json::to_value(StatusUpdate::Failed).unwrap();
        assert_eq!(failed, serde_json::json!({ "status": "failed" }));

        let back: StatusUpdate = serde_json::from_value(confirmed).unwrap();
        assert_eq!(back, StatusUpdate::Confirmed(h));
    }
}
