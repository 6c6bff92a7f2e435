//! One control record per outstanding transmitted message, plus the
//! randomized backoff arithmetic that drives retransmission.
//!
//! Timing follows RFC 8415 §15: the first timeout is `IRT` jittered
//! downward by up to 10%, every later timeout doubles with a ±10% jitter,
//! clamped to `MRT` (with the jitter re-applied) and then to whatever is
//! left of `MRD`.

use bytes::BytesMut;
use hexlease_proto::{MessageType, TransactionId};
use rand::Rng;

use crate::timing::RetransmitParams;

/// Which records a bulk [`RetryRegistry::cleanup`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupScope {
    /// Address-bearing exchanges only.
    Stateful,
    /// Information-Request exchanges only.
    Stateless,
    /// Everything; used on session teardown.
    All,
}

/// Control record for one transmitted message awaiting a response.
#[derive(Debug, Clone)]
pub struct RetryRecord {
    /// Transaction id the response must echo.
    pub xid: TransactionId,
    /// Message type that was sent.
    pub msg_type: MessageType,
    /// The serialized message, retransmitted byte-for-byte except for the
    /// elapsed-time field.
    pub payload: BytesMut,
    /// Offset of the 2-byte elapsed-time value within `payload`, patched
    /// on every retransmit. `None` if the pre-send hook replaced the
    /// buffer with one the engine cannot locate the field in.
    pub elapsed_at: Option<usize>,
    /// Timing profile in force for this exchange.
    pub params: RetransmitParams,
    /// Ticks since the last (re)transmission.
    pub ticks_since_send: u32,
    /// Current timeout being waited out.
    pub current_timeout: u32,
    /// Retransmissions performed so far.
    pub retry_count: u32,
    /// Seconds spent waiting across all timeouts so far.
    pub accumulated_loss: u32,
}

impl RetryRecord {
    /// True for records of the stateless Information-Request exchange.
    pub fn is_stateless(&self) -> bool {
        self.msg_type == MessageType::InformationRequest
    }

    /// Account one expired timeout and report whether the retry budget is
    /// exhausted.
    pub fn consume_timeout(&mut self) -> bool {
        self.retry_count += 1;
        self.accumulated_loss = self.accumulated_loss.saturating_add(self.current_timeout);
        (self.params.mrc != 0 && self.retry_count > self.params.mrc)
            || (self.params.mrd != 0 && self.accumulated_loss >= self.params.mrd)
    }

    /// Compute the next timeout and rearm the record.
    pub fn advance(&mut self, rng: &mut impl Rng) {
        let mut next = jittered(self.current_timeout.saturating_mul(2), rng);
        if self.params.mrt != 0 && next > self.params.mrt {
            next = jittered(self.params.mrt, rng);
        }
        if self.params.mrd != 0 {
            next = next.min(self.params.mrd - self.accumulated_loss);
        }
        self.current_timeout = next;
        self.ticks_since_send = 0;
    }

    /// Patch the elapsed-time field in the stored payload before a
    /// retransmit.
    pub fn refresh_elapsed(&mut self, hundredths: u16) {
        if let Some(at) = self.elapsed_at {
            if at + 2 <= self.payload.len() {
                self.payload[at..at + 2].copy_from_slice(&hundredths.to_be_bytes());
            }
        }
    }
}

/// First timeout of an exchange: `IRT` minus up to 10%, never above base.
pub fn initial_timeout(irt: u32, rng: &mut impl Rng) -> u32 {
    irt - rng.gen_range(0..=irt / 10)
}

/// Doubling jitter: `base` plus or minus up to 10%.
fn jittered(base: u32, rng: &mut impl Rng) -> u32 {
    let spread = rng.gen_range(0..=base / 10);
    if rng.gen_bool(0.5) { base + spread } else { base - spread }
}

/// Ordered set of in-flight retry records, looked up by transaction id.
#[derive(Debug, Default)]
pub struct RetryRegistry {
    pub(crate) records: Vec<RetryRecord>,
}

impl RetryRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Create and append a record for a just-transmitted message,
    /// computing its first randomized timeout.
    pub fn enqueue(
        &mut self,
        xid: TransactionId,
        msg_type: MessageType,
        payload: BytesMut,
        elapsed_at: Option<usize>,
        params: RetransmitParams,
        rng: &mut impl Rng,
    ) {
        let current_timeout = initial_timeout(params.irt, rng);
        self.records.push(RetryRecord {
            xid,
            msg_type,
            payload,
            elapsed_at,
            params,
            ticks_since_send: 0,
            current_timeout,
            retry_count: 0,
            accumulated_loss: 0,
        });
    }

    /// Find the record awaiting a response to `xid`.
    pub fn find(&self, xid: TransactionId) -> Option<&RetryRecord> {
        self.records.iter().find(|r| r.xid == xid)
    }

    /// Remove and return the record for `xid`, if any.
    pub fn dequeue(&mut self, xid: TransactionId) -> Option<RetryRecord> {
        let at = self.records.iter().position(|r| r.xid == xid)?;
        Some(self.records.remove(at))
    }

    /// Remove and return the first record of the given message type.
    pub fn dequeue_type(&mut self, msg_type: MessageType) -> Option<RetryRecord> {
        let at = self.records.iter().position(|r| r.msg_type == msg_type)?;
        Some(self.records.remove(at))
    }

    /// Bulk-remove records by scope, returning them so the caller can
    /// fire pending completion signals.
    pub fn cleanup(&mut self, scope: CleanupScope) -> Vec<RetryRecord> {
        let mut removed = Vec::new();
        self.records.retain(|record| {
            let take = match scope {
                CleanupScope::Stateful => !record.is_stateless(),
                CleanupScope::Stateless => record.is_stateless(),
                CleanupScope::All => true,
            };
            if take {
                removed.push(record.clone());
            }
            !take
        });
        removed
    }

    /// Number of outstanding records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
