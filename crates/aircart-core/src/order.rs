//! Domain types shared by the gateway and the synchronizer.
//!
//! All monetary amounts are integer minor units (cents), tax inclusive,
//! matching the wire format of the order service.

use serde::{Deserialize, Serialize};

/// Opaque product-variant identifier assigned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub String);

impl VariantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque order-line identifier assigned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub String);

impl LineId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a cart line.
///
/// An optimistic add runs ahead of the server, so its line carries a
/// client-allocated `Local` placeholder id until the first reconcile
/// replaces it with the server-assigned [`LineId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineRef {
    Local(u64),
    Server(LineId),
}

impl LineRef {
    /// Returns the server-assigned id, if this line has been confirmed.
    #[must_use]
    pub fn server_id(&self) -> Option<&LineId> {
        match self {
            LineRef::Local(_) => None,
            LineRef::Server(id) => Some(id),
        }
    }
}

/// One product variant and quantity in the cart.
///
/// Invariant: `quantity >= 1`. A line adjusted to zero is removed, never
/// stored with quantity zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: LineRef,
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Unit price in minor units, tax inclusive.
    pub unit_price: i64,
    /// `quantity × unit_price` for optimistic state; overwritten by the
    /// server's own figure on reconcile.
    pub line_total: i64,
}

impl OrderLine {
    pub fn recompute_total(&mut self) {
        self.line_total = i64::from(self.quantity) * self.unit_price;
    }
}

/// A server-confirmed line inside an [`OrderSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: i64,
    pub line_total: i64,
}

impl From<SnapshotLine> for OrderLine {
    fn from(line: SnapshotLine) -> Self {
        OrderLine {
            id: LineRef::Server(line.id),
            variant_id: line.variant_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        }
    }
}

/// Authoritative order state as returned by the order service.
///
/// Totals here come straight off the wire and win over anything derived
/// locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: String,
    pub code: Option<String>,
    pub lines: Vec<SnapshotLine>,
    pub total_quantity: u32,
    pub subtotal: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_total_multiplies_quantity_by_unit_price() {
        let mut line = OrderLine {
            id: LineRef::Local(1),
            variant_id: VariantId::new("V1"),
            quantity: 5,
            unit_price: 1000,
            line_total: 0,
        };
        line.recompute_total();
        assert_eq!(line.line_total, 5000);
    }

    #[test]
    fn snapshot_line_converts_to_server_referenced_order_line() {
        let line: OrderLine = SnapshotLine {
            id: LineId::new("L1"),
            variant_id: VariantId::new("V1"),
            quantity: 2,
            unit_price: 1500,
            line_total: 3000,
        }
        .into();
        assert_eq!(line.id, LineRef::Server(LineId::new("L1")));
        assert_eq!(line.line_total, 3000);
    }

    #[test]
    fn local_line_ref_has_no_server_id() {
        assert!(LineRef::Local(7).server_id().is_none());
        let id = LineId::new("L9");
        assert_eq!(LineRef::Server(id.clone()).server_id(), Some(&id));
    }
}
