//! GraphQL client for the order service's shop API.
//!
//! Wraps `reqwest` with the four order operations the synchronizer depends
//! on, bearer-token plumbing through an injected [`SessionStore`], and
//! mapping of union results onto the [`GatewayError`] taxonomy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use aircart_core::{LineId, OrderSnapshot, SessionStore, SessionToken, SyncConfig, VariantId};

use crate::error::{GatewayError, RejectionKind};
use crate::types::{GraphQlResponse, OrderWire};

/// Response header carrying the (possibly refreshed) session token.
const SESSION_TOKEN_HEADER: &str = "vendure-auth-token";
/// Request header selecting the sales channel.
const CHANNEL_TOKEN_HEADER: &str = "vendure-token";

const ORDER_FRAGMENT: &str = r"
fragment ActiveOrder on Order {
  id
  code
  totalQuantity
  subTotalWithTax
  totalWithTax
  lines {
    id
    quantity
    unitPriceWithTax
    linePriceWithTax
    productVariant { id }
  }
}";

/// The four operations the cart synchronizer issues against the order
/// service. A trait so tests can substitute a scripted gateway.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Fetches the active order for the current session. `Ok(None)` means
    /// the session has no active order yet.
    async fn fetch_active_order(&self) -> Result<Option<OrderSnapshot>, GatewayError>;

    async fn add_line(
        &self,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<OrderSnapshot, GatewayError>;

    async fn adjust_line(
        &self,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<OrderSnapshot, GatewayError>;

    async fn remove_line(&self, line_id: &LineId) -> Result<OrderSnapshot, GatewayError>;
}

/// GraphQL-over-HTTP implementation of [`OrderGateway`].
///
/// Every response may carry a fresh session token on a header; the client
/// writes it to the injected [`SessionStore`] before returning, so callers
/// never issue a follow-up request with a stale token.
pub struct ShopApiClient {
    client: Client,
    endpoint: Url,
    channel_token: Option<String>,
    session: Arc<dyn SessionStore>,
}

impl ShopApiClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`GatewayError::Protocol`] if the endpoint
    /// is not a valid URL.
    pub fn new(config: &SyncConfig, session: Arc<dyn SessionStore>) -> Result<Self, GatewayError> {
        Self::build(
            &config.shop_api_url,
            config.request_timeout_secs,
            &config.user_agent,
            config.channel_token.clone(),
            session,
        )
    }

    /// Creates a client pointed at a custom endpoint (for testing with
    /// wiremock).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ShopApiClient::new`].
    pub fn with_endpoint(
        endpoint: &str,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, GatewayError> {
        Self::build(endpoint, 30, "aircart/0.1 (cart-sync)", None, session)
    }

    fn build(
        endpoint: &str,
        timeout_secs: u64,
        user_agent: &str,
        channel_token: Option<String>,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let endpoint = Url::parse(endpoint)
            .map_err(|e| GatewayError::Protocol(format!("invalid endpoint '{endpoint}': {e}")))?;

        Ok(Self {
            client,
            endpoint,
            channel_token,
            session,
        })
    }

    /// Sends one GraphQL request and returns the `data` object.
    ///
    /// Token handling happens here: the current token (if any) is attached
    /// as a bearer credential, and a differing token on the response header
    /// replaces the stored one before this method returns.
    async fn execute(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, GatewayError> {
        let body = serde_json::json!({
            "query": format!("{query}\n{ORDER_FRAGMENT}"),
            "variables": variables,
        });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = self.session.get() {
            request = request.bearer_auth(&token.value);
        }
        if let Some(channel) = &self.channel_token {
            request = request.header(CHANNEL_TOKEN_HEADER, channel);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::SessionExpired);
        }

        // The refreshed token must land in the store before control returns
        // to the caller, so the next call never races a stale token.
        if let Some(fresh) = response
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let current = self.session.get();
            if current.as_ref().map(|t| t.value.as_str()) != Some(fresh) {
                self.session.set(SessionToken::new(fresh));
            }
        }

        let response = response.error_for_status()?;
        let text = response.text().await?;
        let envelope: GraphQlResponse =
            serde_json::from_str(&text).map_err(|e| GatewayError::Deserialize {
                context: operation.to_owned(),
                source: e,
            })?;

        if !envelope.errors.is_empty() {
            if envelope
                .errors
                .iter()
                .any(|e| matches!(e.code(), Some("FORBIDDEN" | "UNAUTHORIZED")))
            {
                return Err(GatewayError::SessionExpired);
            }
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(GatewayError::Protocol(format!(
                "{operation}: {}",
                messages.join("; ")
            )));
        }

        envelope.data.ok_or_else(|| {
            GatewayError::Protocol(format!("{operation}: response carried neither data nor errors"))
        })
    }

    /// Parses a mutation's union result: an order payload, or an error
    /// result identified by `__typename`/`errorCode`.
    fn parse_order_result(operation: &str, result: Value) -> Result<OrderSnapshot, GatewayError> {
        let typename = result
            .get("__typename")
            .and_then(Value::as_str)
            .unwrap_or("Order");

        if typename == "Order" {
            let order: OrderWire =
                serde_json::from_value(result).map_err(|e| GatewayError::Deserialize {
                    context: operation.to_owned(),
                    source: e,
                })?;
            return Ok(order.into());
        }

        let error_code = result
            .get("errorCode")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        let message = result
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request rejected by order service")
            .to_owned();

        let kind = match error_code {
            "INSUFFICIENT_STOCK_ERROR" => RejectionKind::InsufficientStock {
                available: result
                    .get("quantityAvailable")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok()),
            },
            "NEGATIVE_QUANTITY_ERROR" => RejectionKind::NegativeQuantity,
            "ORDER_LIMIT_ERROR" => RejectionKind::OrderLimitExceeded,
            "ORDER_MODIFICATION_ERROR" | "ENTITY_NOT_FOUND_ERROR" => RejectionKind::LineNotFound,
            other => {
                return Err(GatewayError::Protocol(format!(
                    "{operation}: unexpected result {typename}/{other}: {message}"
                )));
            }
        };

        Err(GatewayError::Rejected { kind, message })
    }

    fn field<'a>(data: &'a Value, name: &str, operation: &str) -> Result<&'a Value, GatewayError> {
        data.get(name).ok_or_else(|| {
            GatewayError::Protocol(format!("{operation}: missing field '{name}' in response"))
        })
    }
}

#[async_trait]
impl OrderGateway for ShopApiClient {
    async fn fetch_active_order(&self) -> Result<Option<OrderSnapshot>, GatewayError> {
        const QUERY: &str = "query ActiveOrder { activeOrder { ...ActiveOrder } }";
        let data = self
            .execute("activeOrder", QUERY, serde_json::json!({}))
            .await?;
        let order = Self::field(&data, "activeOrder", "activeOrder")?;
        if order.is_null() {
            return Ok(None);
        }
        let wire: OrderWire =
            serde_json::from_value(order.clone()).map_err(|e| GatewayError::Deserialize {
                context: "activeOrder".to_owned(),
                source: e,
            })?;
        Ok(Some(wire.into()))
    }

    async fn add_line(
        &self,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<OrderSnapshot, GatewayError> {
        const QUERY: &str = r"
mutation AddItemToOrder($productVariantId: ID!, $quantity: Int!) {
  addItemToOrder(productVariantId: $productVariantId, quantity: $quantity) {
    __typename
    ...ActiveOrder
    ... on ErrorResult { errorCode message }
    ... on InsufficientStockError { quantityAvailable }
  }
}";
        let variables = serde_json::json!({
            "productVariantId": variant_id.as_str(),
            "quantity": quantity,
        });
        let data = self.execute("addItemToOrder", QUERY, variables).await?;
        let result = Self::field(&data, "addItemToOrder", "addItemToOrder")?;
        Self::parse_order_result("addItemToOrder", result.clone())
    }

    async fn adjust_line(
        &self,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<OrderSnapshot, GatewayError> {
        const QUERY: &str = r"
mutation AdjustOrderLine($orderLineId: ID!, $quantity: Int!) {
  adjustOrderLine(orderLineId: $orderLineId, quantity: $quantity) {
    __typename
    ...ActiveOrder
    ... on ErrorResult { errorCode message }
    ... on InsufficientStockError { quantityAvailable }
  }
}";
        let variables = serde_json::json!({
            "orderLineId": line_id.as_str(),
            "quantity": quantity,
        });
        let data = self.execute("adjustOrderLine", QUERY, variables).await?;
        let result = Self::field(&data, "adjustOrderLine", "adjustOrderLine")?;
        Self::parse_order_result("adjustOrderLine", result.clone())
    }

    async fn remove_line(&self, line_id: &LineId) -> Result<OrderSnapshot, GatewayError> {
        const QUERY: &str = r"
mutation RemoveOrderLine($orderLineId: ID!) {
  removeOrderLine(orderLineId: $orderLineId) {
    __typename
    ...ActiveOrder
    ... on ErrorResult { errorCode message }
  }
}";
        let variables = serde_json::json!({ "orderLineId": line_id.as_str() });
        let data = self.execute("removeOrderLine", QUERY, variables).await?;
        let result = Self::field(&data, "removeOrderLine", "removeOrderLine")?;
        Self::parse_order_result("removeOrderLine", result.clone())
    }
}
