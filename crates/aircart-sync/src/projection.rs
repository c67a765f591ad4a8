//! The optimistic cart projection.
//!
//! An in-memory mirror of the server order, mutated immediately on user
//! action and reconciled (or rolled back) when the server responds. Lines
//! keep insertion order. Totals are recomputed from the lines for optimistic
//! state; a reconcile takes the server's own totals verbatim, which is the
//! only way they become authoritative.

use serde::Serialize;

use aircart_core::{LineRef, OrderLine, OrderSnapshot};

use crate::pending::{OpKey, OpKind, PendingOperation};

/// Renderable snapshot of the projection, published on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<OrderLine>,
    pub total_quantity: u32,
    pub subtotal: i64,
    pub total: i64,
}

/// The locally held, possibly-ahead-of-server view of the cart.
///
/// Mutated only by the synchronizer; rendering code observes it through
/// [`CartView`]s.
#[derive(Debug, Default)]
pub struct CartProjection {
    lines: Vec<OrderLine>,
    total_quantity: u32,
    subtotal: i64,
    total: i64,
}

impl CartProjection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn view(&self) -> CartView {
        CartView {
            lines: self.lines.clone(),
            total_quantity: self.total_quantity,
            subtotal: self.subtotal,
            total: self.total,
        }
    }

    /// Finds the line an operation key refers to, with its position.
    #[must_use]
    pub fn line_position(&self, key: &OpKey) -> Option<(usize, &OrderLine)> {
        self.lines
            .iter()
            .enumerate()
            .find(|(_, line)| match key {
                OpKey::Variant(variant_id) => line.variant_id == *variant_id,
                OpKey::Line(line_id) => match &line.id {
                    LineRef::Server(id) => id == line_id,
                    LineRef::Local(_) => false,
                },
            })
    }

    /// Applies an operation's effect immediately, ahead of the server.
    pub fn apply_optimistic(&mut self, op: &PendingOperation) {
        match &op.kind {
            OpKind::Add {
                variant_id,
                quantity,
                unit_price,
                local_id,
            } => {
                if let Some(line) = self
                    .lines
                    .iter_mut()
                    .find(|line| line.variant_id == *variant_id)
                {
                    line.quantity += quantity;
                    line.recompute_total();
                } else {
                    let mut line = OrderLine {
                        id: LineRef::Local(*local_id),
                        variant_id: variant_id.clone(),
                        quantity: *quantity,
                        unit_price: *unit_price,
                        line_total: 0,
                    };
                    line.recompute_total();
                    self.lines.push(line);
                }
            }
            OpKind::Adjust { line_id, quantity } => {
                let key = OpKey::Line(line_id.clone());
                if let Some((index, _)) = self.line_position(&key) {
                    if *quantity == 0 {
                        // A zero-quantity line is removed, never stored.
                        self.lines.remove(index);
                    } else {
                        let line = &mut self.lines[index];
                        line.quantity = *quantity;
                        line.recompute_total();
                    }
                }
            }
            OpKind::Remove { line_id } => {
                let key = OpKey::Line(line_id.clone());
                if let Some((index, _)) = self.line_position(&key) {
                    self.lines.remove(index);
                }
            }
        }
        self.recompute_totals();
    }

    /// Replaces the projection wholesale with server truth.
    pub fn reconcile(&mut self, snapshot: &OrderSnapshot) {
        self.lines = snapshot
            .lines
            .iter()
            .cloned()
            .map(OrderLine::from)
            .collect();
        self.total_quantity = snapshot.total_quantity;
        self.subtotal = snapshot.subtotal;
        self.total = snapshot.total;
    }

    /// Undoes an optimistic mutation by restoring the operation's baseline.
    ///
    /// Idempotent: rolling back an effect that is not present is a no-op,
    /// and rolling back twice leaves the same state as rolling back once.
    pub fn rollback(&mut self, op: &PendingOperation) {
        let key = op.kind.key();
        let position = self.line_position(&key).map(|(index, _)| index);
        match (&op.prior, position) {
            (Some(prior), Some(index)) => {
                self.lines[index] = prior.clone();
            }
            (Some(prior), None) => {
                let index = op.prior_index.unwrap_or(self.lines.len());
                self.lines.insert(index.min(self.lines.len()), prior.clone());
            }
            (None, Some(index)) => {
                // The line only existed optimistically; drop it.
                self.lines.remove(index);
            }
            (None, None) => {}
        }
        self.recompute_totals();
    }

    /// Empties the projection (logout, or no active order on the server).
    pub fn reset(&mut self) {
        self.lines.clear();
        self.recompute_totals();
    }

    fn recompute_totals(&mut self) {
        self.total_quantity = self.lines.iter().map(|line| line.quantity).sum();
        self.subtotal = self.lines.iter().map(|line| line.line_total).sum();
        self.total = self.subtotal;
    }
}
