use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use storefront_ledger::adapters::InMemoryStore;
use storefront_ledger::middleware::sign_user_token;
use storefront_ledger::{create_app, AppState};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct TestShop {
    app: Router,
    store: InMemoryStore,
    seller: i64,
    buyer: i64,
    address: i64,
}

async fn setup_shop() -> TestShop {
    let store = InMemoryStore::new();
    let seller = store.add_user("seller", true).await;
    let buyer = store.add_user("buyer", false).await;
    let address = store.add_address(buyer, "12 Harbour Street").await;
    let app = create_app(AppState::new(Arc::new(store.clone()), SECRET));
    TestShop {
        app,
        store,
        seller,
        buyer,
        address,
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user {
        let token = sign_user_token(SECRET, user_id).unwrap();
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let shop = setup_shop().await;
    let (status, body) = send(&shop.app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let shop = setup_shop().await;

    let (status, body) = send(&shop.app, "GET", "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let response = shop
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/payment")
                .header("authorization", format!("Bearer {}.deadbeef", shop.buyer))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_to_payment_flow() {
    let shop = setup_shop().await;
    let buyer_account = shop
        .store
        .add_account(shop.buyer, "BUY-1", BigDecimal::from(500))
        .await;
    let seller_account = shop
        .store
        .add_account(shop.seller, "SEL-1", BigDecimal::from(0))
        .await;
    let product = shop
        .store
        .add_product(shop.seller, "Desk lamp", BigDecimal::from(100), 5, None)
        .await;

    let (status, receipt) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["line"]["quantity"], 3);
    let order_id = receipt["order"]["id"].as_i64().unwrap();
    assert_eq!(shop.store.product(product).await.unwrap().stock, 2);

    let (status, cart) = send(&shop.app, "GET", "/orders", Some(shop.buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart.as_array().unwrap().len(), 1);
    assert_eq!(cart[0]["product_title"], "Desk lamp");
    assert_eq!(cart[0]["address_name"], "12 Harbour Street");

    let (status, payment) = send(
        &shop.app,
        "POST",
        &format!("/payment/pay_order/{}", order_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["amount"], 3);
    assert_eq!(
        shop.store.account(buyer_account).await.unwrap().balance,
        BigDecimal::from(200)
    );
    assert_eq!(
        shop.store.account(seller_account).await.unwrap().balance,
        BigDecimal::from(300)
    );

    let (status, body) = send(
        &shop.app,
        "POST",
        &format!("/payment/pay_order/{}", order_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_paid");

    let (status, payments) = send(&shop.app, "GET", "/payment", Some(shop.buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments.as_array().unwrap().len(), 1);
    let payment_id = payments[0]["payment_id"].as_i64().unwrap();

    let (status, _) = send(
        &shop.app,
        "DELETE",
        &format!("/payment/{}", payment_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, payments) = send(&shop.app, "GET", "/payment", Some(shop.buyer), None).await;
    assert!(payments.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_pay_with_named_account() {
    let shop = setup_shop().await;
    let first = shop
        .store
        .add_account(shop.buyer, "BUY-1", BigDecimal::from(500))
        .await;
    let second = shop
        .store
        .add_account(shop.buyer, "BUY-2", BigDecimal::from(500))
        .await;
    shop.store
        .add_account(shop.seller, "SEL-1", BigDecimal::from(0))
        .await;
    let product = shop
        .store
        .add_product(shop.seller, "Kettle", BigDecimal::from(40), 5, None)
        .await;

    let (_, receipt) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 1 })),
    )
    .await;
    let order_id = receipt["order"]["id"].as_i64().unwrap();

    let (status, payment) = send(
        &shop.app,
        "POST",
        &format!("/payment/pay_order/{}", order_id),
        Some(shop.buyer),
        Some(json!({ "account_number": "BUY-2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["account_id"], second);
    assert_eq!(
        shop.store.account(first).await.unwrap().balance,
        BigDecimal::from(500)
    );
    assert_eq!(
        shop.store.account(second).await.unwrap().balance,
        BigDecimal::from(460)
    );
}

#[tokio::test]
async fn test_unreadable_pay_body_is_rejected_before_any_debit() {
    let shop = setup_shop().await;
    let first = shop
        .store
        .add_account(shop.buyer, "BUY-1", BigDecimal::from(500))
        .await;
    let second = shop
        .store
        .add_account(shop.buyer, "BUY-2", BigDecimal::from(500))
        .await;
    shop.store
        .add_account(shop.seller, "SEL-1", BigDecimal::from(0))
        .await;
    let product = shop
        .store
        .add_product(shop.seller, "Desk lamp", BigDecimal::from(100), 5, None)
        .await;
    let (_, receipt) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 1 })),
    )
    .await;
    let order_id = receipt["order"]["id"].as_i64().unwrap();
    let token = sign_user_token(SECRET, shop.buyer).unwrap();

    let bodies: [(&str, Option<&str>); 3] = [
        (r#"{"account_number":"BUY-2""#, Some("application/json")),
        (r#"{"account_number":2}"#, Some("application/json")),
        ("account_number=BUY-2", None),
    ];
    for (body, content_type) in bodies {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/payment/pay_order/{}", order_id))
            .header("authorization", format!("Bearer {}", token));
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        let response = shop
            .app
            .clone()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error["error"], "validation");
    }

    assert_eq!(
        shop.store.account(first).await.unwrap().balance,
        BigDecimal::from(500)
    );
    assert_eq!(
        shop.store.account(second).await.unwrap().balance,
        BigDecimal::from(500)
    );
    assert!(!shop.store.order(order_id).await.unwrap().is_paid);
    assert!(shop.store.payments().await.is_empty());

    let response = shop
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/payment/pay_order/{}", order_id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from(r#"{"account_number":"BUY-2"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        shop.store.account(second).await.unwrap().balance,
        BigDecimal::from(400)
    );
    assert_eq!(
        shop.store.account(first).await.unwrap().balance,
        BigDecimal::from(500)
    );
}

#[tokio::test]
async fn test_quantity_update_and_cancel() {
    let shop = setup_shop().await;
    let product = shop
        .store
        .add_product(shop.seller, "Desk lamp", BigDecimal::from(100), 5, None)
        .await;

    let (_, receipt) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 2 })),
    )
    .await;
    let order_id = receipt["order"]["id"].as_i64().unwrap();

    let (status, updated) = send(
        &shop.app,
        "PUT",
        &format!("/orders/{}", order_id),
        Some(shop.buyer),
        Some(json!({ "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["line"]["quantity"], 5);

    let (status, body) = send(
        &shop.app,
        "PUT",
        &format!("/orders/{}", order_id),
        Some(shop.buyer),
        Some(json!({ "quantity": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");

    let (status, _) = send(
        &shop.app,
        "DELETE",
        &format!("/orders/{}", order_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &shop.app,
        "DELETE",
        &format!("/orders/{}", order_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, cart) = send(&shop.app, "GET", "/orders", Some(shop.buyer), None).await;
    assert!(cart.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_errors_map_to_statuses() {
    let shop = setup_shop().await;
    let product = shop
        .store
        .add_product(shop.seller, "Desk lamp", BigDecimal::from(100), 1, None)
        .await;

    let (status, body) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.seller),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission_denied");

    let (_, receipt) = send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 1 })),
    )
    .await;
    let order_id = receipt["order"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &shop.app,
        "POST",
        &format!("/payment/pay_order/{}", order_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_account");

    shop.store
        .add_account(shop.buyer, "BUY-1", BigDecimal::from(10))
        .await;
    let (status, body) = send(
        &shop.app,
        "POST",
        &format!("/payment/pay_order/{}", order_id),
        Some(shop.buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "insufficient_funds");
}

#[tokio::test]
async fn test_seller_sees_orders_on_own_products() {
    let shop = setup_shop().await;
    let product = shop
        .store
        .add_product(shop.seller, "Desk lamp", BigDecimal::from(100), 5, None)
        .await;
    send(
        &shop.app,
        "POST",
        "/orders",
        Some(shop.buyer),
        Some(json!({ "product_id": product, "address_id": shop.address, "quantity": 1 })),
    )
    .await;

    let (status, orders) = send(&shop.app, "GET", "/orders", Some(shop.seller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["product_id"], product);

    let (status, statuses) =
        send(&shop.app, "GET", "/orders/status", Some(shop.buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = statuses
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["status_name"].as_str())
        .collect();
    assert_eq!(names, vec!["placed", "in cart", "paid"]);
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let shop = setup_shop().await;
    let product = shop
        .store
        .add_product(shop.seller, "Last lamp", BigDecimal::from(100), 3, None)
        .await;

    let requests = (0..10).map(|_| {
        let app = shop.app.clone();
        let body = json!({ "product_id": product, "address_id": shop.address, "quantity": 1 });
        let buyer = shop.buyer;
        async move { send(&app, "POST", "/orders", Some(buyer), Some(body)).await }
    });
    let results = futures::future::join_all(requests).await;

    let created = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    let rejected = results
        .iter()
        .filter(|(_, body)| body["error"] == "insufficient_stock")
        .count();
    assert_eq!(created, 3);
    assert_eq!(rejected, 7);

    let product = shop.store.product(product).await.unwrap();
    assert_eq!(product.stock, 0);
    assert!(product.is_deleted);
    assert_eq!(shop.store.order_count().await, 3);
}
