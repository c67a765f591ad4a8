//! Integration tests for `ShopApiClient` using wiremock HTTP mocks.

use std::sync::Arc;

use aircart_core::{LineId, MemorySessionStore, SessionStore, SessionToken, VariantId};
use aircart_gateway::{GatewayError, OrderGateway, RejectionKind, ShopApiClient};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> (ShopApiClient, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let client = ShopApiClient::with_endpoint(base_url, Arc::clone(&store) as Arc<dyn SessionStore>)
        .expect("client construction should not fail");
    (client, store)
}

fn order_body(quantity: u32, unit_price: i64) -> serde_json::Value {
    let line_total = i64::from(quantity) * unit_price;
    serde_json::json!({
        "data": {
            "addItemToOrder": {
                "__typename": "Order",
                "id": "1",
                "code": "ORD-100",
                "totalQuantity": quantity,
                "subTotalWithTax": line_total,
                "totalWithTax": line_total,
                "lines": [{
                    "id": "10",
                    "productVariant": { "id": "V1" },
                    "quantity": quantity,
                    "unitPriceWithTax": unit_price,
                    "linePriceWithTax": line_total
                }]
            }
        }
    })
}

#[tokio::test]
async fn add_line_parses_order_and_stores_session_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(serde_json::json!({
            "variables": { "productVariantId": "V1", "quantity": 2 }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("vendure-auth-token", "fresh-token")
                .set_body_json(order_body(2, 1000)),
        )
        .mount(&server)
        .await;

    let (client, store) = test_client(&server.uri());
    let snapshot = client
        .add_line(&VariantId::new("V1"), 2)
        .await
        .expect("should parse order");

    assert_eq!(snapshot.total_quantity, 2);
    assert_eq!(snapshot.subtotal, 2000);
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.lines[0].variant_id, VariantId::new("V1"));
    assert_eq!(
        store.get().map(|t| t.value),
        Some("fresh-token".to_owned()),
        "response header token must land in the store"
    );
}

#[tokio::test]
async fn requests_echo_the_stored_token_as_bearer_credential() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer existing-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "activeOrder": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = test_client(&server.uri());
    store.set(SessionToken::new("existing-token"));

    let order = client
        .fetch_active_order()
        .await
        .expect("call should succeed");
    assert!(order.is_none(), "null activeOrder means no active order");
}

#[tokio::test]
async fn differing_response_token_replaces_the_stored_one() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("vendure-auth-token", "rotated")
                .set_body_json(serde_json::json!({ "data": { "activeOrder": null } })),
        )
        .mount(&server)
        .await;

    let (client, store) = test_client(&server.uri());
    store.set(SessionToken::new("stale"));

    client
        .fetch_active_order()
        .await
        .expect("call should succeed");
    assert_eq!(store.get().map(|t| t.value), Some("rotated".to_owned()));
}

#[tokio::test]
async fn insufficient_stock_maps_to_domain_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "adjustOrderLine": {
                    "__typename": "InsufficientStockError",
                    "errorCode": "INSUFFICIENT_STOCK_ERROR",
                    "message": "Only 2 items were added to the order due to insufficient stock",
                    "quantityAvailable": 2
                }
            }
        })))
        .mount(&server)
        .await;

    let (client, _) = test_client(&server.uri());
    let err = client
        .adjust_line(&LineId::new("10"), 5)
        .await
        .expect_err("stock rejection expected");

    match err {
        GatewayError::Rejected { kind, message } => {
            assert_eq!(kind, RejectionKind::InsufficientStock { available: Some(2) });
            assert!(message.contains("insufficient stock"), "got: {message}");
        }
        other => panic!("expected Rejected, got: {other:?}"),
    }
}

#[tokio::test]
async fn http_401_maps_to_session_expired() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (client, _) = test_client(&server.uri());
    let err = client
        .fetch_active_order()
        .await
        .expect_err("auth failure expected");
    assert!(err.is_session(), "got: {err:?}");
}

#[tokio::test]
async fn graphql_forbidden_error_maps_to_session_expired() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errors": [{
                "message": "You are not currently authorized to perform this action",
                "extensions": { "code": "FORBIDDEN" }
            }]
        })))
        .mount(&server)
        .await;

    let (client, _) = test_client(&server.uri());
    let err = client
        .remove_line(&LineId::new("10"))
        .await
        .expect_err("auth failure expected");
    assert!(err.is_session(), "got: {err:?}");
}

#[tokio::test]
async fn server_error_is_transport_classified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (client, _) = test_client(&server.uri());
    let err = client
        .fetch_active_order()
        .await
        .expect_err("5xx expected");
    assert!(err.is_transport(), "5xx should be retriable: {err:?}");
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let (client, _) = test_client(&server.uri());
    let err = client
        .fetch_active_order()
        .await
        .expect_err("parse failure expected");
    assert!(
        matches!(err, GatewayError::Deserialize { .. }),
        "got: {err:?}"
    );
    assert!(!err.is_transport(), "malformed bodies must not be retried");
}
