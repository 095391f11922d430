//! End-to-end tests over the assembled router with an in-memory database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use bookshare_api::auth::{AppState, AppStateInner};
use bookshare_api::payments::{self, PaymentConfig};
use bookshare_api::routes;
use bookshare_api::uploads::Storage;
use bookshare_db::Database;

const TEST_PAYMENT_SECRET: &str = "test-payment-secret";

async fn test_app() -> Router {
    let db = Database::open_in_memory().unwrap();
    let storage = Storage::new(
        std::env::temp_dir().join(format!("bookshare-test-{}", uuid::Uuid::new_v4())),
    )
    .await
    .unwrap();

    // must agree with the auth middleware's fallback secret
    let jwt_secret =
        std::env::var("BOOKSHARE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        storage,
        payment: PaymentConfig {
            key_id: "test-key-id".into(),
            key_secret: TEST_PAYMENT_SECRET.into(),
            api_url: "http://127.0.0.1:9".into(),
            client: reqwest::Client::new(),
        },
    });

    routes::router(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

/// `Value::Null` means "no body", used for GETs, DELETEs and bodyless
/// POSTs.
fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if !body.is_null() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = if body.is_null() {
        Body::empty()
    } else {
        Body::from(body.to_string())
    };
    builder.body(body).unwrap()
}

const BOUNDARY: &str = "bookshare-test-boundary";

/// Hand-built multipart body: text fields plus optional file parts.
fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &str, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Register a student and return (token, user id).
async fn register_student(app: &Router, name: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": name,
                "email": email,
                "password": "correct-horse-battery",
                "role": "student"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    let token = body["data"]["token"].as_str().unwrap().to_string();
    let id = body["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, id)
}

/// Create a minimal active listing, returning its id.
async fn create_listing(app: &Router, token: &str, title: &str, price: &str, stock: &str) -> String {
    let (status, body) = send(
        app,
        multipart_request(
            "POST",
            "/api/listings",
            Some(token),
            &[
                ("title", title),
                ("author", "Cormen"),
                ("price", price),
                ("condition", "good"),
                ("category", "engineering"),
                ("description", "Third edition, lightly annotated"),
                ("stock", stock),
            ],
            &[("bookImage", "cover.png", "image/png", b"\x89PNG\r\n\x1a\n")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create listing failed: {body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_and_reject_bad_password() {
    let app = test_app().await;
    let (_token, _id) = register_student(&app, "Asha", "asha@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "asha@example.com", "password": "correct-horse-battery" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["token"].as_str().is_some());

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "asha@example.com", "password": "wrong-password-here" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = test_app().await;
    register_student(&app, "Asha", "asha@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": "Impostor",
                "email": "asha@example.com",
                "password": "another-password",
                "role": "student"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn library_registration_requires_library_fields() {
    let app = test_app().await;

    let (status, _body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": "Central Library",
                "email": "lib@example.com",
                "password": "books-books-books",
                "role": "library"
            }),
        ),
    )
    .await;
    assert!(status.is_client_error(), "missing libraryName/gstNumber must fail");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": "Central Library",
                "email": "lib@example.com",
                "password": "books-books-books",
                "role": "library",
                "libraryName": "Central Library",
                "gstNumber": "27AAPFU0939F1ZV"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "library register failed: {body}");
    assert_eq!(body["data"]["user"]["kycStatus"], "pending");
}

#[tokio::test]
async fn listing_belongs_to_its_creator_only() {
    let app = test_app().await;
    let (token_a, id_a) = register_student(&app, "Seller A", "a@example.com").await;
    let (token_b, _id_b) = register_student(&app, "Seller B", "b@example.com").await;

    let listing_id = create_listing(&app, &token_a, "Intro to Algo", "450", "1").await;

    // created active, seller forced to the authenticated user
    let (status, body) = send(
        &app,
        Request::builder()
            .uri(format!("/api/listings/{listing_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["seller"]["id"], Value::String(id_a.clone()));

    // the browse view lists it
    let (_, body) = send(
        &app,
        Request::builder().uri("/api/listings").body(Body::empty()).unwrap(),
    )
    .await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"Intro to Algo"));

    // B's /my view must not contain A's listing
    let (status, body) = send(
        &app,
        json_request("GET", "/api/listings/my", Some(&token_b), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // A's /my view does
    let (_, body) = send(
        &app,
        json_request("GET", "/api/listings/my", Some(&token_a), Value::Null),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn foreign_listing_mutation_is_forbidden() {
    let app = test_app().await;
    let (token_a, _) = register_student(&app, "Seller A", "a@example.com").await;
    let (token_b, _) = register_student(&app, "Intruder", "b@example.com").await;

    let listing_id = create_listing(&app, &token_a, "Intro to Algo", "450", "1").await;

    let (status, body) = send(
        &app,
        multipart_request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some(&token_b),
            &[("price", "1")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/api/listings/{listing_id}"),
            Some(&token_b),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // unknown listing is a distinct failure
    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/api/listings/{}", uuid::Uuid::new_v4()),
            Some(&token_b),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn inactive_listings_leave_the_browse_view() {
    let app = test_app().await;
    let (token, _) = register_student(&app, "Seller", "s@example.com").await;
    let listing_id = create_listing(&app, &token, "Physics Vol 1", "300", "1").await;

    let (status, _) = send(
        &app,
        multipart_request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some(&token),
            &[("status", "inactive")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        Request::builder().uri("/api/listings").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn sold_listings_cannot_be_relisted() {
    let app = test_app().await;
    let (token, _) = register_student(&app, "Seller", "s@example.com").await;
    let listing_id = create_listing(&app, &token, "Physics Vol 1", "300", "1").await;

    let (status, _) = send(
        &app,
        multipart_request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some(&token),
            &[("status", "sold")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        multipart_request(
            "PUT",
            &format!("/api/listings/{listing_id}"),
            Some(&token),
            &[("status", "active")],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "sold -> active must be rejected: {body}");
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn order_lifecycle_with_escrow_release() {
    let app = test_app().await;
    let (seller_token, seller_id) = register_student(&app, "Seller", "s@example.com").await;
    let (buyer_token, buyer_id) = register_student(&app, "Buyer", "b@example.com").await;

    let listing_id = create_listing(&app, &seller_token, "Intro to Algo", "450", "2").await;

    // the client-supplied seller is ignored
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/orders",
            Some(&buyer_token),
            json!({
                "listing": listing_id,
                "quantity": 1,
                "paymentMethod": "upi",
                "seller": buyer_id,
                "deliveryAddress": { "city": "Pune", "pincode": "411001" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "order failed: {body}");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["seller"]["id"], Value::String(seller_id.clone()));
    assert_eq!(body["data"]["buyer"]["id"], Value::String(buyer_id.clone()));
    assert_eq!(body["data"]["totalAmount"], 450.0);
    assert_eq!(body["data"]["orderStatus"], "placed");
    assert_eq!(body["data"]["paymentStatus"], "paid");

    // buyer sees it in my-orders, seller in my-sales
    let (_, body) = send(
        &app,
        json_request("GET", "/api/orders/my-orders", Some(&buyer_token), Value::Null),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app,
        json_request("GET", "/api/orders/my-sales", Some(&seller_token), Value::Null),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // only the seller may advance the order
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            Some(&buyer_token),
            json!({ "status": "confirmed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // skipping ahead is rejected
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            Some(&seller_token),
            json!({ "status": "delivered" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for next in ["confirmed", "shipped", "delivered"] {
        let (status, body) = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/orders/{order_id}/status"),
                Some(&seller_token),
                json!({ "status": next }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "transition to {next} failed: {body}");
    }

    // rewinding a delivered order is rejected
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            Some(&seller_token),
            json!({ "status": "shipped" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // buyer confirms receipt -> escrow released, exactly once
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/orders/{order_id}/confirm-delivery"),
            Some(&buyer_token),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["escrowReleased"], true);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/orders/{order_id}/confirm-delivery"),
            Some(&buyer_token),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // seller was notified when the order was placed
    let (_, body) = send(
        &app,
        json_request("GET", "/api/notifications", Some(&seller_token), Value::Null),
    )
    .await;
    assert!(
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["kind"] == "order-placed")
    );
}

#[tokio::test]
async fn ordering_the_last_unit_sells_out_the_listing() {
    let app = test_app().await;
    let (seller_token, _) = register_student(&app, "Seller", "s@example.com").await;
    let (buyer_token, _) = register_student(&app, "Buyer", "b@example.com").await;

    let listing_id = create_listing(&app, &seller_token, "Rare First Edition", "900", "1").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/orders",
            Some(&buyer_token),
            json!({ "listing": listing_id, "quantity": 1, "paymentMethod": "card" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(
        &app,
        Request::builder()
            .uri(format!("/api/listings/{listing_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["data"]["status"], "sold");
    assert_eq!(body["data"]["stock"], 0);

    // a second buyer cannot order it any more
    let (second_token, _) = register_student(&app, "Late Buyer", "late@example.com").await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/orders",
            Some(&second_token),
            json!({ "listing": listing_id, "quantity": 1, "paymentMethod": "card" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "sold-out order must conflict: {body}");
}

#[tokio::test]
async fn wishlist_is_unique_per_listing() {
    let app = test_app().await;
    let (seller_token, _) = register_student(&app, "Seller", "s@example.com").await;
    let (buyer_token, _) = register_student(&app, "Buyer", "b@example.com").await;
    let listing_id = create_listing(&app, &seller_token, "Intro to Algo", "450", "1").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/wishlist",
            Some(&buyer_token),
            json!({ "listingId": listing_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/wishlist",
            Some(&buyer_token),
            json!({ "listingId": listing_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (_, body) = send(
        &app,
        json_request(
            "GET",
            &format!("/api/wishlist/check/{listing_id}"),
            Some(&buyer_token),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(body["data"]["inWishlist"], true);

    let (_, body) = send(
        &app,
        json_request("GET", "/api/wishlist", Some(&buyer_token), Value::Null),
    )
    .await;
    assert_eq!(body["data"]["listings"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/api/wishlist/{listing_id}"),
            Some(&buyer_token),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn payment_signature_round_trip() {
    let app = test_app().await;

    let signature = payments::sign(TEST_PAYMENT_SECRET, "order_N1a2b3", "pay_X9y8z7");
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment/verify",
            None,
            json!({
                "order_id": "order_N1a2b3",
                "payment_id": "pay_X9y8z7",
                "signature": signature
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "verify failed: {body}");
    assert_eq!(body["success"], true);

    // a different payment id invalidates the same signature
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment/verify",
            None,
            json!({
                "order_id": "order_N1a2b3",
                "payment_id": "pay_X9y8z8",
                "signature": signature
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn chat_offer_flow() {
    let app = test_app().await;
    let (seller_token, seller_id) = register_student(&app, "Seller", "s@example.com").await;
    let (buyer_token, _) = register_student(&app, "Buyer", "b@example.com").await;
    let listing_id = create_listing(&app, &seller_token, "Intro to Algo", "450", "1").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/chats",
            Some(&buyer_token),
            json!({ "participantId": seller_id, "listingId": listing_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "chat create failed: {body}");
    let chat_id = body["data"]["id"].as_str().unwrap().to_string();

    // creating it again returns the same conversation
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/chats",
            Some(&buyer_token),
            json!({ "participantId": seller_id, "listingId": listing_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], Value::String(chat_id.clone()));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/chats/{chat_id}/messages"),
            Some(&buyer_token),
            json!({
                "content": "Would you take 400?",
                "messageType": "offer",
                "offer": { "amount": 400.0, "listingId": listing_id }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "offer failed: {body}");
    let message_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["offer"]["status"], "pending");

    // the sender cannot settle their own offer
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/chats/{chat_id}/messages/{message_id}/offer"),
            Some(&buyer_token),
            json!({ "status": "accepted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/chats/{chat_id}/messages/{message_id}/offer"),
            Some(&seller_token),
            json!({ "status": "accepted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["offer"]["status"], "accepted");

    // settled offers stay settled
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/chats/{chat_id}/messages/{message_id}/offer"),
            Some(&seller_token),
            json!({ "status": "rejected" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // an outsider cannot read the conversation
    let (outsider_token, _) = register_student(&app, "Outsider", "o@example.com").await;
    let (status, _) = send(
        &app,
        json_request(
            "GET",
            &format!("/api/chats/{chat_id}/messages"),
            Some(&outsider_token),
            Value::Null,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app().await;

    for uri in ["/api/wishlist", "/api/orders/my-orders", "/api/listings/my"] {
        let (status, _) = send(
            &app,
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} must require auth");
    }
}

#[tokio::test]
async fn library_must_clear_kyc_before_listing() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": "Central Library",
                "email": "lib@example.com",
                "password": "books-books-books",
                "role": "library",
                "libraryName": "Central Library",
                "gstNumber": "27AAPFU0939F1ZV"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let lib_token = body["data"]["token"].as_str().unwrap().to_string();
    let lib_id = body["data"]["user"]["id"].as_str().unwrap().to_string();

    // unverified library cannot list
    let (status, body) = send(
        &app,
        multipart_request(
            "POST",
            "/api/listings",
            Some(&lib_token),
            &[
                ("title", "Set of NCERT books"),
                ("author", "NCERT"),
                ("price", "200"),
                ("condition", "good"),
                ("category", "school"),
                ("description", "Full class 10 set"),
            ],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "unverified library listed: {body}");

    // an admin verdict flips the switch
    let admin_token = forge_admin_token();
    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/users/{lib_id}/kyc"),
            Some(&admin_token),
            json!({ "status": "verified" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "kyc verdict failed: {body}");
    assert_eq!(body["data"]["kycStatus"], "verified");

    let (status, _) = send(
        &app,
        multipart_request(
            "POST",
            "/api/listings",
            Some(&lib_token),
            &[
                ("title", "Set of NCERT books"),
                ("author", "NCERT"),
                ("price", "200"),
                ("condition", "good"),
                ("category", "school"),
                ("description", "Full class 10 set"),
            ],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // a student cannot hand out KYC verdicts
    let (student_token, _) = register_student(&app, "Student", "stu@example.com").await;
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/users/{lib_id}/kyc"),
            Some(&student_token),
            json!({ "status": "rejected" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

/// Admin accounts are provisioned out of band, so tests mint the token
/// directly with the shared signing secret.
fn forge_admin_token() -> String {
    use bookshare_types::api::Claims;
    use bookshare_types::models::Role;

    let secret =
        std::env::var("BOOKSHARE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let claims = Claims {
        sub: uuid::Uuid::new_v4(),
        name: "Root Admin".into(),
        role: Role::Admin,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn blog_counters_actually_move() {
    let app = test_app().await;
    let (token_a, _) = register_student(&app, "Author", "author@example.com").await;
    let (token_b, _) = register_student(&app, "Reader", "reader@example.com").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/blogs",
            Some(&token_a),
            json!({
                "title": "Best Physics textbook for JEE preparation?",
                "content": "Looking for recommendations that cover the JEE syllabus.",
                "category": "textbooks",
                "tags": ["JEE", "Physics"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "blog create failed: {body}");
    let blog_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["views"], 0);

    // reading bumps the view counter
    let (_, body) = send(
        &app,
        Request::builder()
            .uri(format!("/api/blogs/{blog_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["data"]["blog"]["views"], 1);

    // replying bumps the reply counter
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/blogs/{blog_id}/replies"),
            Some(&token_b),
            json!({ "content": "HC Verma, no contest." }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // one like per user
    let (status, body) = send(
        &app,
        json_request("POST", &format!("/api/blogs/{blog_id}/likes"), Some(&token_b), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likes"], 1);
    assert_eq!(body["data"]["replies"], 1);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/api/blogs/{blog_id}/likes"), Some(&token_b), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn notes_upload_and_download_counter() {
    let app = test_app().await;
    let (token, _) = register_student(&app, "Author", "author@example.com").await;

    let (status, body) = send(
        &app,
        multipart_request(
            "POST",
            "/api/notes/upload",
            Some(&token),
            &[
                ("title", "Organic Chemistry reactions"),
                ("subject", "Chemistry"),
                ("class", "12"),
                ("board", "CBSE"),
                ("price", "50"),
                ("pages", "42"),
            ],
            &[("noteFile", "organic.pdf", "application/pdf", b"%PDF-1.7 fake")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "notes upload failed: {body}");
    let note_id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(body["data"]["fileUrl"].as_str().unwrap().starts_with("/uploads/notes/"));
    assert_eq!(body["data"]["class"], "12");

    // an image is not acceptable study material
    let (status, _) = send(
        &app,
        multipart_request(
            "POST",
            "/api/notes/upload",
            Some(&token),
            &[
                ("title", "Doodles"),
                ("subject", "Art"),
                ("class", "12"),
                ("board", "CBSE"),
                ("price", "10"),
                ("pages", "1"),
            ],
            &[("noteFile", "doodle.png", "image/png", b"\x89PNG")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        Request::builder().uri("/api/notes").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // download hands out the URL and counts
    let (status, body) = send(
        &app,
        json_request("GET", &format!("/api/notes/{note_id}/download"), Some(&token), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["fileUrl"].as_str().is_some());

    let (_, body) = send(
        &app,
        Request::builder().uri("/api/notes").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(body["data"][0]["downloads"], 1);
}

#[tokio::test]
async fn auction_bids_must_beat_the_floor() {
    let app = test_app().await;
    let (seller_token, _) = register_student(&app, "Seller", "s@example.com").await;
    let (bidder_token, bidder_id) = register_student(&app, "Bidder", "bid@example.com").await;

    let end_date = (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339();
    let (status, body) = send(
        &app,
        multipart_request(
            "POST",
            "/api/listings",
            Some(&seller_token),
            &[
                ("title", "Rare First Edition"),
                ("author", "Knuth"),
                ("price", "1000"),
                ("condition", "fair"),
                ("category", "engineering"),
                ("description", "TAOCP Vol 1, 1968 printing"),
                ("saleType", "auction"),
                ("auctionEndDate", &end_date),
            ],
            &[],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "auction create failed: {body}");
    let listing_id = body["data"]["id"].as_str().unwrap().to_string();

    // at or below the asking price is not a bid
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/listings/{listing_id}/bids"),
            Some(&bidder_token),
            json!({ "amount": 1000.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // sellers cannot bid on their own auction
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/listings/{listing_id}/bids"),
            Some(&seller_token),
            json!({ "amount": 1100.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/listings/{listing_id}/bids"),
            Some(&bidder_token),
            json!({ "amount": 1100.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "bid failed: {body}");
    assert_eq!(body["data"]["currentBid"], 1100.0);
    assert_eq!(body["data"]["bidders"][0]["user"], Value::String(bidder_id));

    // the next bid has to beat the new floor
    let (second_token, _) = register_student(&app, "Second Bidder", "b2@example.com").await;
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/listings/{listing_id}/bids"),
            Some(&second_token),
            json!({ "amount": 1050.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rating_a_listing_moves_both_averages() {
    let app = test_app().await;
    let (seller_token, _) = register_student(&app, "Seller", "s@example.com").await;
    let (rater_token, _) = register_student(&app, "Rater", "r@example.com").await;
    let listing_id = create_listing(&app, &seller_token, "Intro to Algo", "450", "1").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/listings/{listing_id}/ratings"),
            Some(&rater_token),
            json!({ "rating": 6 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "out-of-range rating must fail");

    for (rating, expected_avg, expected_count) in [(5, 5.0, 1), (3, 4.0, 2)] {
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/listings/{listing_id}/ratings"),
                Some(&rater_token),
                json!({ "rating": rating }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["rating"]["average"], expected_avg);
        assert_eq!(body["data"]["rating"]["count"], expected_count);
    }

    // the seller's aggregate follows
    let (_, body) = send(
        &app,
        json_request("GET", "/api/users/profile", Some(&seller_token), Value::Null),
    )
    .await;
    assert_eq!(body["data"]["rating"]["average"], 4.0);
    assert_eq!(body["data"]["rating"]["count"], 2);
}

#[tokio::test]
async fn payment_order_requires_amount_and_title() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payment/create-order",
            None,
            json!({ "amount": 450.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Amount and bookTitle are required");

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/payment/create-order",
            None,
            json!({ "bookTitle": "Intro to Algo" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
