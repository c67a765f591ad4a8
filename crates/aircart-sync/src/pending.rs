//! In-flight mutation bookkeeping.
//!
//! Operations on the same line must reach the projection in the order the
//! user issued them even though network responses arrive out of order. The
//! [`SequenceLedger`] hands out monotonically increasing sequence numbers
//! and remembers the highest one issued per line, so a slow response for an
//! older operation can be recognized and discarded (supersession).

use std::collections::HashMap;

use aircart_core::{LineId, OrderLine, VariantId};

/// What a pending mutation does.
#[derive(Debug, Clone)]
pub enum OpKind {
    Add {
        variant_id: VariantId,
        quantity: u32,
        /// Display price for the optimistic placeholder, minor units.
        unit_price: i64,
        /// Client-allocated placeholder id until the server assigns a line id.
        local_id: u64,
    },
    Adjust {
        line_id: LineId,
        quantity: u32,
    },
    Remove {
        line_id: LineId,
    },
}

impl OpKind {
    /// The per-line FIFO key. Adds have no server line id yet, so they key
    /// by variant; adjust/remove key by the server-assigned line id.
    #[must_use]
    pub fn key(&self) -> OpKey {
        match self {
            OpKind::Add { variant_id, .. } => OpKey::Variant(variant_id.clone()),
            OpKind::Adjust { line_id, .. } | OpKind::Remove { line_id } => {
                OpKey::Line(line_id.clone())
            }
        }
    }
}

/// Identifies the line an operation affects, for ordering purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKey {
    Variant(VariantId),
    Line(LineId),
}

/// A mutation that has been applied optimistically but not yet settled.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub seq: u64,
    pub kind: OpKind,
    /// The affected line as of the last confirmed state. Rollback restores
    /// this, never an intermediate optimistic value.
    pub prior: Option<OrderLine>,
    /// Where `prior` sat in the lines collection, so a rolled-back removal
    /// reappears at its original position.
    pub prior_index: Option<usize>,
}

/// Sequence numbers and pending-operation records, keyed per line.
#[derive(Debug, Default)]
pub struct SequenceLedger {
    next_seq: u64,
    latest: HashMap<OpKey, u64>,
    pending: HashMap<u64, PendingOperation>,
}

impl SequenceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next sequence number and marks it as the highest issued
    /// for `key`.
    pub fn issue(&mut self, key: &OpKey) -> u64 {
        self.next_seq += 1;
        self.latest.insert(key.clone(), self.next_seq);
        self.next_seq
    }

    /// Rollback baseline inherited from the newest still-pending operation
    /// on `key`, if any. Chaining baselines this way keeps rollback anchored
    /// to the last *confirmed* state rather than a half-applied optimistic one.
    #[must_use]
    pub fn baseline(&self, key: &OpKey) -> Option<(Option<OrderLine>, Option<usize>)> {
        self.pending
            .values()
            .filter(|op| op.kind.key() == *key)
            .max_by_key(|op| op.seq)
            .map(|op| (op.prior.clone(), op.prior_index))
    }

    pub fn record(&mut self, op: PendingOperation) {
        self.pending.insert(op.seq, op);
    }

    /// Removes and returns the pending record for a settled operation.
    /// `None` means the ledger was cleared (logout) while the call was in
    /// flight.
    pub fn settle(&mut self, seq: u64) -> Option<PendingOperation> {
        self.pending.remove(&seq)
    }

    /// `true` if `seq` is still the highest sequence issued for `key`. This
    /// is the supersession test applied to every arriving response.
    #[must_use]
    pub fn is_latest(&self, key: &OpKey, seq: u64) -> bool {
        self.latest.get(key) == Some(&seq)
    }

    /// Drops the latest-sequence marker once its operation has settled.
    pub fn retire(&mut self, key: &OpKey, seq: u64) {
        if self.is_latest(key, seq) {
            self.latest.remove(key);
        }
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.latest.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use aircart_core::LineRef;

    use super::*;

    fn line_key(id: &str) -> OpKey {
        OpKey::Line(LineId::new(id))
    }

    fn adjust_op(seq: u64, id: &str, quantity: u32) -> PendingOperation {
        PendingOperation {
            seq,
            kind: OpKind::Adjust {
                line_id: LineId::new(id),
                quantity,
            },
            prior: None,
            prior_index: None,
        }
    }

    #[test]
    fn sequence_numbers_increase_monotonically() {
        let mut ledger = SequenceLedger::new();
        let a = ledger.issue(&line_key("L1"));
        let b = ledger.issue(&line_key("L2"));
        let c = ledger.issue(&line_key("L1"));
        assert!(a < b && b < c);
    }

    #[test]
    fn later_operation_supersedes_earlier_one_on_same_line() {
        let mut ledger = SequenceLedger::new();
        let first = ledger.issue(&line_key("L1"));
        let second = ledger.issue(&line_key("L1"));
        assert!(!ledger.is_latest(&line_key("L1"), first));
        assert!(ledger.is_latest(&line_key("L1"), second));
    }

    #[test]
    fn different_lines_do_not_supersede_each_other() {
        let mut ledger = SequenceLedger::new();
        let first = ledger.issue(&line_key("L1"));
        let second = ledger.issue(&line_key("L2"));
        assert!(ledger.is_latest(&line_key("L1"), first));
        assert!(ledger.is_latest(&line_key("L2"), second));
    }

    #[test]
    fn baseline_comes_from_newest_pending_op_on_the_key() {
        let mut ledger = SequenceLedger::new();
        let confirmed = OrderLine {
            id: LineRef::Server(LineId::new("L1")),
            variant_id: VariantId::new("V1"),
            quantity: 2,
            unit_price: 1000,
            line_total: 2000,
        };

        let seq1 = ledger.issue(&line_key("L1"));
        let mut op1 = adjust_op(seq1, "L1", 3);
        op1.prior = Some(confirmed.clone());
        op1.prior_index = Some(0);
        ledger.record(op1);

        // A second op issued while the first is pending inherits its baseline.
        let (prior, prior_index) = ledger
            .baseline(&line_key("L1"))
            .expect("pending op should provide a baseline");
        assert_eq!(prior, Some(confirmed));
        assert_eq!(prior_index, Some(0));

        assert!(ledger.baseline(&line_key("L2")).is_none());
    }

    #[test]
    fn settle_removes_the_pending_record_once() {
        let mut ledger = SequenceLedger::new();
        let seq = ledger.issue(&line_key("L1"));
        ledger.record(adjust_op(seq, "L1", 3));
        assert_eq!(ledger.pending_count(), 1);
        assert!(ledger.settle(seq).is_some());
        assert!(ledger.settle(seq).is_none());
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn retire_only_drops_the_marker_for_the_latest_seq() {
        let mut ledger = SequenceLedger::new();
        let first = ledger.issue(&line_key("L1"));
        let second = ledger.issue(&line_key("L1"));

        ledger.retire(&line_key("L1"), first);
        assert!(
            ledger.is_latest(&line_key("L1"), second),
            "retiring a superseded seq must not clear the marker"
        );

        ledger.retire(&line_key("L1"), second);
        assert!(!ledger.is_latest(&line_key("L1"), second));
    }

    #[test]
    fn clear_empties_everything() {
        let mut ledger = SequenceLedger::new();
        let seq = ledger.issue(&line_key("L1"));
        ledger.record(adjust_op(seq, "L1", 3));
        ledger.clear();
        assert_eq!(ledger.pending_count(), 0);
        assert!(!ledger.is_latest(&line_key("L1"), seq));
    }
}
