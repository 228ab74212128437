//! End-to-end flows against a live PostgreSQL instance. Run them with a
//! database available:
//!
//!   DATABASE_URL=postgres://... cargo test -- --ignored

mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use common::TestApp;
use soko_api::models::user::ROLE_ADMIN;

const FAKE_JPG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

async fn db_pool() -> Result<sqlx::PgPool> {
    let pool = sqlx::PgPool::connect(&common::database_url())
        .await
        .context("flow tests need PostgreSQL; set DATABASE_URL")?;
    soko_api::db::ensure_schema(&pool).await?;
    Ok(pool)
}

async fn register(app: &TestApp, client: &reqwest::Client) -> Result<(String, Uuid, String)> {
    let suffix = Uuid::new_v4().simple().to_string();
    let username = format!("u{}", &suffix[..12]);
    let res = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{username}@test.soko"),
            "phone": format!("+2557{:08}", Uuid::new_v4().as_u128() % 100_000_000),
            "password": "password-123",
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());

    let body: Value = res.json().await?;
    let token = body["token"].as_str().context("token missing")?.to_string();
    let user_id: Uuid = body["user"]["id"].as_str().context("user id missing")?.parse()?;
    Ok((token, user_id, username))
}

async fn create_product(
    app: &TestApp,
    client: &reqwest::Client,
    token: &str,
    title: &str,
    price: &str,
    location: &str,
    images: usize,
) -> Result<Uuid> {
    let mut form = reqwest::multipart::Form::new()
        .text("title", title.to_string())
        .text("description", "flow test listing")
        .text("price", price.to_string())
        .text("condition", "good")
        .text("location", location.to_string());
    for i in 0..images {
        form = form.part(
            "images",
            reqwest::multipart::Part::bytes(FAKE_JPG.to_vec())
                .file_name(format!("photo-{i}.jpg"))
                .mime_str("image/jpeg")?,
        );
    }

    let res = client
        .post(app.url("/api/products"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "create product failed: {}", res.status());

    let body: Value = res.json().await?;
    Ok(body["product"]["id"].as_str().context("product id missing")?.parse()?)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal value: {other}"),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn account_lifecycle_roundtrip() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (token, user_id, username) = register(&app, &client).await?;

    // Profile comes back without the password hash
    let res = client.get(app.url("/api/auth/profile")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["username"], username.as_str());
    assert!(body["user"].get("password_hash").is_none(), "hash leaked: {}", body);

    // Login works with username, email, and phone as the identifier
    let email = body["user"]["email"].as_str().unwrap().to_string();
    let phone = body["user"]["phone"].as_str().unwrap().to_string();
    for identifier in [username.clone(), email, phone] {
        let res = client
            .post(app.url("/api/auth/login"))
            .json(&json!({"identifier": identifier, "password": "password-123"}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK, "login failed for {identifier}");
    }

    // Profile update
    let res = client
        .put(app.url("/api/auth/profile"))
        .bearer_auth(&token)
        .json(&json!({"full_name": "Amina Hassan", "location": "Dar es Salaam"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["full_name"], "Amina Hassan");

    // Password change invalidates the old password
    let res = client
        .put(app.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({"current_password": "password-123", "new_password": "password-456"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(app.url("/api/auth/login"))
        .json(&json!({"identifier": username, "password": "password-123"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(app.url("/api/auth/login"))
        .json(&json!({"identifier": username, "password": "password-456"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // The public card shows the display fields only
    let res = client.get(app.url(&format!("/api/users/{user_id}"))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["full_name"], "Amina Hassan");
    assert_eq!(body["user"]["active_products"], 0);
    assert!(body["user"].get("email").is_none(), "email leaked: {}", body);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn duplicate_identity_fields_are_rejected() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (_, _, username) = register(&app, &client).await?;

    // Same username, fresh email and phone
    let res = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("fresh-{}@test.soko", Uuid::new_v4().simple()),
            "phone": format!("+2557{:08}", Uuid::new_v4().as_u128() % 100_000_000),
            "password": "password-123",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(
        body["error"].as_str().unwrap_or_default().contains("Username"),
        "unexpected error: {}",
        body
    );

    // Same email, fresh username, and email matching is case-insensitive
    let res = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "username": format!("u{}", &Uuid::new_v4().simple().to_string()[..12]),
            "email": format!("{}@TEST.SOKO", username.to_uppercase()),
            "phone": format!("+2557{:08}", Uuid::new_v4().as_u128() % 100_000_000),
            "password": "password-123",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(
        body["error"].as_str().unwrap_or_default().contains("Email"),
        "unexpected error: {}",
        body
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn product_create_with_images_marks_first_primary() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let pool = db_pool().await?;

    let (token, _, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_id =
        create_product(&app, &client, &token, &format!("Camera {marker}"), "85000", &marker, 3)
            .await?;

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(count, 3);

    let (primaries,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM product_images WHERE product_id = $1 AND is_primary = TRUE",
    )
    .bind(product_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(primaries, 1, "exactly one image should be primary");

    // Detail lists the primary first and bumps the view counter per hit
    let res = client.get(app.url(&format!("/api/products/{product_id}"))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let first: Value = res.json().await?;
    assert_eq!(first["product"]["images"][0]["is_primary"], true);
    assert_eq!(first["product"]["images"].as_array().map(Vec::len), Some(3));
    assert_eq!(decimal(&first["product"]["price"]), "85000".parse::<Decimal>()?);

    let res = client.get(app.url(&format!("/api/products/{product_id}"))).send().await?;
    let second: Value = res.json().await?;
    assert_eq!(
        second["product"]["views"].as_i64(),
        first["product"]["views"].as_i64().map(|v| v + 1)
    );

    let res = client.get(app.url(&format!("/api/products/{}", Uuid::new_v4()))).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn listing_filters_and_pagination_agree() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (token, _, _) = register(&app, &client).await?;
    // A unique location keeps this test's rows separate from everything else
    // in the shared database
    let marker = Uuid::new_v4().simple().to_string();
    for (i, price) in ["1000", "2000", "3000"].iter().enumerate() {
        create_product(&app, &client, &token, &format!("Lamp {i} {marker}"), price, &marker, 0)
            .await?;
    }

    let res = client.get(app.url(&format!("/api/products?location={marker}"))).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 3);

    let res = client
        .get(app.url(&format!("/api/products?location={marker}&min_price=1500")))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 2);

    // Page totals agree with the rows handed out
    let mut seen = Vec::new();
    for page in 1..=2 {
        let res = client
            .get(app.url(&format!(
                "/api/products?location={marker}&min_price=1500&limit=1&page={page}"
            )))
            .send()
            .await?;
        let body: Value = res.json().await?;
        assert_eq!(body["pagination"]["total"], 2);
        assert_eq!(body["pagination"]["total_pages"], 2);
        let rows = body["products"].as_array().unwrap().clone();
        assert_eq!(rows.len(), 1);
        seen.push(rows[0]["id"].as_str().unwrap().to_string());
    }
    assert_ne!(seen[0], seen[1], "pages should not repeat rows");

    // Search shares the same total discipline
    let res = client.get(app.url(&format!("/api/products?search={marker}"))).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 3);

    // Cheapest first when sorted ascending by price
    let res = client
        .get(app.url(&format!("/api/products?location={marker}&sort_by=price&order=asc")))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(decimal(&body["products"][0]["price"]), "1000".parse::<Decimal>()?);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn favorite_toggle_roundtrip() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (seller, _, _) = register(&app, &client).await?;
    let (buyer, _, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_id =
        create_product(&app, &client, &seller, &format!("Desk {marker}"), "40000", &marker, 0)
            .await?;

    let toggle_url = app.url(&format!("/api/products/{product_id}/favorite"));
    let res = client.post(&toggle_url).bearer_auth(&buyer).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["favorited"], true);

    // The saved list and the browse flag both reflect it
    let res = client.get(app.url("/api/users/favorites")).bearer_auth(&buyer).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["favorites"][0]["id"], product_id.to_string());
    assert!(body["favorites"][0].get("favorited_at").is_some());

    let res = client
        .get(app.url(&format!("/api/products?location={marker}")))
        .bearer_auth(&buyer)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["products"][0]["is_favorited"], true);

    // Anonymous browsers see the flag down
    let res = client.get(app.url(&format!("/api/products?location={marker}"))).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["products"][0]["is_favorited"], false);

    // Toggling back empties the list
    let res = client.post(&toggle_url).bearer_auth(&buyer).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["favorited"], false);

    let res = client.get(app.url("/api/users/favorites")).bearer_auth(&buyer).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 0);

    let res = client
        .post(app.url(&format!("/api/products/{}/favorite", Uuid::new_v4())))
        .bearer_auth(&buyer)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn checkout_completes_and_takes_product_off_market() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let pool = db_pool().await?;

    let (seller, _, _) = register(&app, &client).await?;
    let (buyer, _, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_id =
        create_product(&app, &client, &seller, &format!("Phone {marker}"), "250000", &marker, 0)
            .await?;

    let res = client
        .post(app.url("/api/payments"))
        .bearer_auth(&buyer)
        .json(&json!({
            "product_id": product_id,
            "amount": 250000,
            "payment_method": "mpesa",
            "phone_number": "+255712345678",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["payment"]["status"], "completed");
    let transaction_id = body["payment"]["transaction_id"].as_str().unwrap_or_default();
    assert!(transaction_id.starts_with("TXN-"), "unexpected transaction id: {transaction_id}");

    let (is_active,): (bool,) = sqlx::query_as("SELECT is_active FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&pool)
        .await?;
    assert!(!is_active, "sold product should be off-market");

    // Gone from public browse, still in the buyer's history
    let res = client.get(app.url(&format!("/api/products?location={marker}"))).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 0);

    let res = client.get(app.url("/api/payments")).bearer_auth(&buyer).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["payments"][0]["product_title"], format!("Phone {marker}"));

    // Visible to buyer and seller, hidden from strangers
    let payment_id = body["payments"][0]["id"].as_str().unwrap().to_string();
    let detail_url = app.url(&format!("/api/payments/{payment_id}"));
    for token in [&buyer, &seller] {
        let res = client.get(&detail_url).bearer_auth(token).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let (stranger, _, _) = register(&app, &client).await?;
    let res = client.get(&detail_url).bearer_auth(&stranger).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn checkout_guards_leave_no_trace() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let pool = db_pool().await?;

    let (seller, _, _) = register(&app, &client).await?;
    let (buyer, _, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_a =
        create_product(&app, &client, &seller, &format!("Sofa {marker}"), "90000", &marker, 0)
            .await?;
    let product_b =
        create_product(&app, &client, &seller, &format!("Table {marker}"), "60000", &marker, 0)
            .await?;

    // Sellers cannot buy their own listing
    let res = client
        .post(app.url("/api/payments"))
        .bearer_auth(&seller)
        .json(&json!({
            "product_id": product_a,
            "amount": 90000,
            "payment_method": "mpesa",
            "phone_number": "+255712345678",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // The charge must match the listed price
    let res = client
        .post(app.url("/api/payments"))
        .bearer_auth(&buyer)
        .json(&json!({
            "product_id": product_a,
            "amount": 1,
            "payment_method": "mpesa",
            "phone_number": "+255712345678",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE product_id = $1")
        .bind(product_a)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0, "failed checkouts must not leave payment rows");
    let (is_active,): (bool,) = sqlx::query_as("SELECT is_active FROM products WHERE id = $1")
        .bind(product_a)
        .fetch_one(&pool)
        .await?;
    assert!(is_active, "failed checkout must not deactivate the product");

    // A reference clash aborts mid-transaction and rolls everything back
    let reference = format!("REF-{}", Uuid::new_v4().simple());
    let res = client
        .post(app.url("/api/payments"))
        .bearer_auth(&buyer)
        .json(&json!({
            "product_id": product_a,
            "amount": 90000,
            "payment_method": "tigopesa",
            "phone_number": "+255712345678",
            "reference": reference,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(app.url("/api/payments"))
        .bearer_auth(&buyer)
        .json(&json!({
            "product_id": product_b,
            "amount": 60000,
            "payment_method": "tigopesa",
            "phone_number": "+255712345678",
            "reference": reference,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE product_id = $1")
        .bind(product_b)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);
    let (is_active,): (bool,) = sqlx::query_as("SELECT is_active FROM products WHERE id = $1")
        .bind(product_b)
        .fetch_one(&pool)
        .await?;
    assert!(is_active);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn cancelling_a_pending_payment_restores_the_product() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let pool = db_pool().await?;

    let (seller, _, _) = register(&app, &client).await?;
    let (buyer, buyer_id, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_id =
        create_product(&app, &client, &seller, &format!("Radio {marker}"), "30000", &marker, 0)
            .await?;

    // Stage an interrupted checkout: payment stuck pending, product held
    sqlx::query("UPDATE products SET is_active = FALSE WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await?;
    let (payment_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO payments (user_id, product_id, amount, payment_method, phone_number, reference, status) \
         VALUES ($1, $2, $3, 'mpesa', '+255712345678', $4, 'pending') RETURNING id",
    )
    .bind(buyer_id)
    .bind(product_id)
    .bind("30000".parse::<Decimal>()?)
    .bind(format!("REF-{}", Uuid::new_v4().simple()))
    .fetch_one(&pool)
    .await?;

    // A stranger's cancel reads as a missing payment
    let cancel_url = app.url(&format!("/api/payments/{payment_id}/cancel"));
    let (stranger, _, _) = register(&app, &client).await?;
    let res = client.post(&cancel_url).bearer_auth(&stranger).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.post(&cancel_url).bearer_auth(&buyer).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["payment"]["status"], "cancelled");

    let (is_active,): (bool,) = sqlx::query_as("SELECT is_active FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&pool)
        .await?;
    assert!(is_active, "cancel should put the product back on the market");

    // Only pending payments can be cancelled
    let res = client.post(&cancel_url).bearer_auth(&buyer).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn messaging_thread_marks_reads_and_tracks_counts() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (alice, alice_id, alice_name) = register(&app, &client).await?;
    let (bob, bob_id, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_id =
        create_product(&app, &client, &alice, &format!("Stove {marker}"), "55000", &marker, 0)
            .await?;

    // Two messages from Alice, the second pinned to her listing
    for (content, product) in
        [("Is this available?", None), ("I can deliver tomorrow", Some(product_id))]
    {
        let res = client
            .post(app.url("/api/messages"))
            .bearer_auth(&alice)
            .json(&json!({"receiver_id": bob_id, "content": content, "product_id": product}))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client.get(app.url("/api/messages/unread-count")).bearer_auth(&bob).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["unread_count"], 2);

    // Opening the thread returns newest first and clears Bob's unread count
    let res = client
        .get(app.url(&format!("/api/messages/conversation/{alice_id}")))
        .bearer_auth(&bob)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["messages"][0]["content"], "I can deliver tomorrow");
    assert_eq!(body["messages"][0]["sender_username"], alice_name.as_str());

    let res = client.get(app.url("/api/messages/unread-count")).bearer_auth(&bob).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["unread_count"], 0);

    let res = client
        .get(app.url("/api/messages/conversations"))
        .bearer_auth(&bob)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["other_username"], alice_name.as_str());
    assert_eq!(conversations[0]["last_message"], "I can deliver tomorrow");
    assert_eq!(conversations[0]["unread_count"], 0);

    // Bob replies; Alice reads it explicitly
    let res = client
        .post(app.url("/api/messages"))
        .bearer_auth(&bob)
        .json(&json!({"receiver_id": alice_id, "content": "Deal"}))
        .send()
        .await?;
    let body: Value = res.json().await?;
    let reply_id = body["data"]["id"].as_str().unwrap().to_string();

    let res = client.get(app.url("/api/messages/unread-count")).bearer_auth(&alice).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["unread_count"], 1);

    let res = client
        .put(app.url(&format!("/api/messages/{reply_id}/read")))
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(app.url("/api/messages/unread-count")).bearer_auth(&alice).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["unread_count"], 0);

    // Senders can retract; receivers cannot
    let res = client
        .delete(app.url(&format!("/api/messages/{reply_id}")))
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = client
        .delete(app.url(&format!("/api/messages/{reply_id}")))
        .bearer_auth(&bob)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // Guard rails
    let res = client
        .post(app.url("/api/messages"))
        .bearer_auth(&alice)
        .json(&json!({"receiver_id": alice_id, "content": "note to self"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = client
        .post(app.url("/api/messages"))
        .bearer_auth(&alice)
        .json(&json!({"receiver_id": Uuid::new_v4(), "content": "hello?"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn category_lifecycle_guards_deletions() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let admin = soko_api::auth::generate_token(Uuid::new_v4(), "flows-admin", ROLE_ADMIN)?;
    let (seller, _, _) = register(&app, &client).await?;
    let name = format!("Furniture {}", Uuid::new_v4().simple());

    let res = client
        .post(app.url("/api/categories"))
        .bearer_auth(&admin)
        .json(&json!({"name": name, "icon": "chair"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    let category_id = body["category"]["id"].as_str().unwrap().to_string();

    // Case-insensitive name clash
    let res = client
        .post(app.url("/api/categories"))
        .bearer_auth(&admin)
        .json(&json!({"name": name.to_uppercase()}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // File a product under it; the category then resists deletion
    let marker = Uuid::new_v4().simple().to_string();
    let form = reqwest::multipart::Form::new()
        .text("title", format!("Shelf {marker}"))
        .text("description", "flow test listing")
        .text("price", "20000")
        .text("condition", "good")
        .text("category_id", category_id.clone());
    let res = client
        .post(app.url("/api/products"))
        .bearer_auth(&seller)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    let product_id = body["product"]["id"].as_str().unwrap().to_string();

    let res = client
        .get(app.url(&format!("/api/products/{product_id}")))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["product"]["category_name"], name.as_str());

    let delete_url = app.url(&format!("/api/categories/{category_id}"));
    let res = client.delete(&delete_url).bearer_auth(&admin).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(app.url(&format!("/api/products/{product_id}")))
        .bearer_auth(&seller)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.delete(&delete_url).bearer_auth(&admin).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = client.get(&delete_url).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn admin_account_tools() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let admin_id = Uuid::new_v4();
    let admin = soko_api::auth::generate_token(admin_id, "flows-admin", ROLE_ADMIN)?;
    let (_, user_id, username) = register(&app, &client).await?;

    // Promote, verify, then tear down
    let res = client
        .put(app.url(&format!("/api/users/{user_id}/role")))
        .bearer_auth(&admin)
        .json(&json!({"role": "admin"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["role"], "admin");

    let res = client
        .put(app.url(&format!("/api/users/{user_id}/role")))
        .bearer_auth(&admin)
        .json(&json!({"role": "superuser"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(app.url(&format!("/api/users/{user_id}/verify")))
        .bearer_auth(&admin)
        .json(&json!({"is_verified": true}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["is_verified"], true);

    // The account browser can find the row
    let res = client
        .get(app.url(&format!("/api/users?search={username}")))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["users"][0]["username"], username.as_str());

    // Admins cannot delete themselves; deleting the user cascades their data
    let res = client
        .delete(app.url(&format!("/api/users/{admin_id}")))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .delete(app.url(&format!("/api/users/{user_id}")))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(app.url("/api/auth/login"))
        .json(&json!({"identifier": username, "password": "password-123"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn sellers_see_their_inactive_listings() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (seller, seller_id, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    create_product(&app, &client, &seller, &format!("Chair A {marker}"), "10000", &marker, 0)
        .await?;
    let second =
        create_product(&app, &client, &seller, &format!("Chair B {marker}"), "12000", &marker, 0)
            .await?;

    // Retire the second listing
    let form = reqwest::multipart::Form::new().text("is_active", "false");
    let res = client
        .put(app.url(&format!("/api/products/{second}")))
        .bearer_auth(&seller)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["product"]["is_active"], false);

    let shelf_url = app.url(&format!("/api/users/{seller_id}/products"));
    let res = client.get(&shelf_url).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 1, "public shelf shows active only");

    let res = client.get(&shelf_url).bearer_auth(&seller).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 2, "owner sees the retired listing too");

    let res = client.get(app.url("/api/products/my")).bearer_auth(&seller).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 2);

    let res = client
        .get(app.url("/api/products/my?is_active=false"))
        .bearer_auth(&seller)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["products"][0]["id"], second.to_string());
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn only_owners_and_admins_touch_listings() -> Result<()> {
    let app = common::spawn_app().await?;
    let client = reqwest::Client::new();
    let _pool = db_pool().await?;

    let (seller, _, _) = register(&app, &client).await?;
    let (intruder, _, _) = register(&app, &client).await?;
    let marker = Uuid::new_v4().simple().to_string();
    let product_id =
        create_product(&app, &client, &seller, &format!("Bike {marker}"), "70000", &marker, 0)
            .await?;

    let form = reqwest::multipart::Form::new().text("title", "Hijacked".to_string());
    let res = client
        .put(app.url(&format!("/api/products/{product_id}")))
        .bearer_auth(&intruder)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(app.url(&format!("/api/products/{product_id}")))
        .bearer_auth(&intruder)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // An admin may step in
    let admin = soko_api::auth::generate_token(Uuid::new_v4(), "flows-admin", ROLE_ADMIN)?;
    let res = client
        .delete(app.url(&format!("/api/products/{product_id}")))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
