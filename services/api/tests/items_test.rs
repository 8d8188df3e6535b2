//! End-to-end tests for the item CRUD surface: round-trips, defaults,
//! merge-patch semantics, and owner scoping.

mod common;

use common::{create_test_server, session_cookie, signup};
use serde_json::{json, Value};

#[tokio::test]
async fn create_then_get_round_trips_every_field() {
    let ctx = create_test_server();
    let (user_id, token) = signup(&ctx.server, "items@x.com", "Pw123!", "Items").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&token))
        .json(&json!({
            "navn": "Kamera",
            "kategori": "Elektronikk",
            "serienummer": "SN-0042",
            "notat": "Kjøpt brukt",
            "verdi": 7500.5,
            "valuta": "NOK",
            "vedlegg_urls": ["https://media.example/a.jpg", "https://media.example/b.jpg"],
        }))
        .await;
    assert_eq!(created.status_code(), 201);
    let created_body: Value = created.json();
    let item_id = created_body["item_id"].as_str().unwrap().to_string();
    assert!(item_id.starts_with("item_"));
    assert_eq!(created_body["user_id"], user_id.as_str());

    let fetched = ctx
        .server
        .get(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .await;
    assert_eq!(fetched.status_code(), 200);
    let fetched_body: Value = fetched.json();

    // Every field, timestamps included, survives the round trip.
    assert_eq!(fetched_body, created_body);
}

#[tokio::test]
async fn create_applies_currency_and_attachment_defaults() {
    let ctx = create_test_server();
    let (_, token) = signup(&ctx.server, "defaults@x.com", "Pw123!", "Defaults").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&token))
        .json(&json!({"navn": "Stol"}))
        .await;
    assert_eq!(created.status_code(), 201);
    let body: Value = created.json();

    assert_eq!(body["valuta"], "NOK");
    assert_eq!(body["vedlegg_urls"], json!([]));
    assert_eq!(body["kategori"], Value::Null);
    assert_eq!(body["verdi"], Value::Null);
}

#[tokio::test]
async fn update_merges_only_the_supplied_fields() {
    let ctx = create_test_server();
    let (_, token) = signup(&ctx.server, "merge@x.com", "Pw123!", "Merge").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&token))
        .json(&json!({"navn": "Laptop", "verdi": 25000, "valuta": "NOK"}))
        .await;
    assert_eq!(created.status_code(), 201);
    let created_body: Value = created.json();
    let item_id = created_body["item_id"].as_str().unwrap();

    let updated = ctx
        .server
        .put(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .json(&json!({"verdi": 30000}))
        .await;
    assert_eq!(updated.status_code(), 200);
    let updated_body: Value = updated.json();

    assert_eq!(updated_body["navn"], "Laptop");
    assert_eq!(updated_body["verdi"], 30000.0);
    assert_eq!(updated_body["valuta"], "NOK");
    assert_eq!(updated_body["created_at"], created_body["created_at"]);
}

#[tokio::test]
async fn empty_patch_refreshes_only_updated_at() {
    let ctx = create_test_server();
    let (_, token) = signup(&ctx.server, "touch@x.com", "Pw123!", "Touch").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&token))
        .json(&json!({"navn": "Sykkel", "verdi": 12000}))
        .await;
    let created_body: Value = created.json();
    let item_id = created_body["item_id"].as_str().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let touched = ctx
        .server
        .put(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .json(&json!({}))
        .await;
    assert_eq!(touched.status_code(), 200);
    let touched_body: Value = touched.json();

    assert_eq!(touched_body["navn"], created_body["navn"]);
    assert_eq!(touched_body["verdi"], created_body["verdi"]);
    assert_eq!(touched_body["valuta"], created_body["valuta"]);
    assert_eq!(touched_body["created_at"], created_body["created_at"]);
    assert_ne!(touched_body["updated_at"], created_body["updated_at"]);
}

#[tokio::test]
async fn applying_the_same_patch_twice_is_idempotent() {
    let ctx = create_test_server();
    let (_, token) = signup(&ctx.server, "twice@x.com", "Pw123!", "Twice").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&token))
        .json(&json!({"navn": "Klokke", "verdi": 5000}))
        .await;
    let item_id = created.json::<Value>()["item_id"]
        .as_str()
        .unwrap()
        .to_string();

    let patch = json!({"verdi": 30000, "notat": "Oppjustert"});

    let first = ctx
        .server
        .put(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .json(&patch)
        .await;
    let second = ctx
        .server
        .put(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .json(&patch)
        .await;

    let first_body: Value = first.json();
    let second_body: Value = second.json();
    for field in ["navn", "kategori", "serienummer", "notat", "verdi", "valuta", "vedlegg_urls"] {
        assert_eq!(first_body[field], second_body[field], "field {}", field);
    }
}

#[tokio::test]
async fn foreign_items_answer_like_absent_items() {
    let ctx = create_test_server();
    let (_, owner_token) = signup(&ctx.server, "owner@x.com", "Pw123!", "Owner").await;
    let (_, other_token) = signup(&ctx.server, "other@x.com", "Pw123!", "Other").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&owner_token))
        .json(&json!({"navn": "Maleri", "verdi": 90000}))
        .await;
    let item_id = created.json::<Value>()["item_id"]
        .as_str()
        .unwrap()
        .to_string();

    let get = ctx
        .server
        .get(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&other_token))
        .await;
    assert_eq!(get.status_code(), 404);

    let update = ctx
        .server
        .put(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&other_token))
        .json(&json!({"verdi": 1}))
        .await;
    assert_eq!(update.status_code(), 404);

    let delete = ctx
        .server
        .delete(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&other_token))
        .await;
    assert_eq!(delete.status_code(), 404);

    // The owner's item is untouched by all of the above.
    let still_there = ctx
        .server
        .get(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&owner_token))
        .await;
    assert_eq!(still_there.status_code(), 200);
    assert_eq!(still_there.json::<Value>()["verdi"], 90000.0);
}

#[tokio::test]
async fn list_returns_only_the_callers_items() {
    let ctx = create_test_server();
    let (_, a_token) = signup(&ctx.server, "lista@x.com", "Pw123!", "ListA").await;
    let (_, b_token) = signup(&ctx.server, "listb@x.com", "Pw123!", "ListB").await;

    for navn in ["Sofa", "Bord"] {
        ctx.server
            .post("/api/items")
            .add_cookie(session_cookie(&a_token))
            .json(&json!({"navn": navn}))
            .await;
    }
    ctx.server
        .post("/api/items")
        .add_cookie(session_cookie(&b_token))
        .json(&json!({"navn": "Lampe"}))
        .await;

    let list_a = ctx
        .server
        .get("/api/items")
        .add_cookie(session_cookie(&a_token))
        .await;
    let body_a: Value = list_a.json();
    assert_eq!(body_a.as_array().unwrap().len(), 2);

    let list_b = ctx
        .server
        .get("/api/items")
        .add_cookie(session_cookie(&b_token))
        .await;
    let body_b: Value = list_b.json();
    assert_eq!(body_b.as_array().unwrap().len(), 1);
    assert_eq!(body_b[0]["navn"], "Lampe");
}

#[tokio::test]
async fn delete_removes_the_item() {
    let ctx = create_test_server();
    let (_, token) = signup(&ctx.server, "delete@x.com", "Pw123!", "Delete").await;

    let created = ctx
        .server
        .post("/api/items")
        .add_cookie(session_cookie(&token))
        .json(&json!({"navn": "Telt"}))
        .await;
    let item_id = created.json::<Value>()["item_id"]
        .as_str()
        .unwrap()
        .to_string();

    let deleted = ctx
        .server
        .delete(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .await;
    assert_eq!(deleted.status_code(), 200);
    assert_eq!(deleted.json::<Value>()["message"], "Item deleted");

    let gone = ctx
        .server
        .get(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .await;
    assert_eq!(gone.status_code(), 404);

    let again = ctx
        .server
        .delete(&format!("/api/items/{}", item_id))
        .add_cookie(session_cookie(&token))
        .await;
    assert_eq!(again.status_code(), 404);
}

#[tokio::test]
async fn item_routes_require_authentication() {
    let ctx = create_test_server();

    assert_eq!(ctx.server.get("/api/items").await.status_code(), 401);
    assert_eq!(
        ctx.server
            .post("/api/items")
            .json(&json!({"navn": "X"}))
            .await
            .status_code(),
        401
    );
    assert_eq!(
        ctx.server.get("/api/items/item_abc").await.status_code(),
        401
    );
}
