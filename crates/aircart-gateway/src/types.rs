//! Wire types for the GraphQL shop API.
//!
//! Every call is a POST of `{"query": ..., "variables": ...}`; the response
//! is the standard GraphQL envelope. Mutations on the order return a union:
//! the order itself, or an error result distinguished by `__typename` and
//! `errorCode`.

use serde::Deserialize;

use aircart_core::{LineId, OrderSnapshot, SnapshotLine, VariantId};

/// Standard GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// A top-level GraphQL error (auth failures land here, not in `data`).
#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphQlError {
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

/// An order as serialized by the shop API.
#[derive(Debug, Deserialize)]
pub struct OrderWire {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineWire>,
    #[serde(rename = "totalQuantity")]
    pub total_quantity: u32,
    #[serde(rename = "subTotalWithTax")]
    pub subtotal: i64,
    #[serde(rename = "totalWithTax")]
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct LineWire {
    pub id: String,
    #[serde(rename = "productVariant")]
    pub product_variant: VariantRefWire,
    pub quantity: u32,
    #[serde(rename = "unitPriceWithTax")]
    pub unit_price: i64,
    #[serde(rename = "linePriceWithTax")]
    pub line_total: i64,
}

#[derive(Debug, Deserialize)]
pub struct VariantRefWire {
    pub id: String,
}

impl From<OrderWire> for OrderSnapshot {
    fn from(order: OrderWire) -> Self {
        OrderSnapshot {
            id: order.id,
            code: order.code,
            lines: order
                .lines
                .into_iter()
                .map(|line| SnapshotLine {
                    id: LineId::new(line.id),
                    variant_id: VariantId::new(line.product_variant.id),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                })
                .collect(),
            total_quantity: order.total_quantity,
            subtotal: order.subtotal,
            total: order.total,
        }
    }
}
