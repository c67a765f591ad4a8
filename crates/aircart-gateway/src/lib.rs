pub mod client;
pub mod error;
pub mod types;

pub use client::{OrderGateway, ShopApiClient};
pub use error::{GatewayError, RejectionKind};
