//! Integration tests for voxmap-le API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt;
use uuid::Uuid;
use voxmap_common::events::EventBus;
use voxmap_le::{db, AppState};

/// Test helper: create test app over an in-memory database
async fn create_test_app() -> (axum::Router, sqlx::SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_tables(&pool).await.expect("Failed to init tables");

    let event_bus = EventBus::new(100);
    let state = AppState::new(pool.clone(), event_bus);
    (voxmap_le::build_router(state), pool)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn tc_i_health_reports_module_identity() {
    let (app, _pool) = create_test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "voxmap-le");
}

#[tokio::test]
async fn tc_i_statement_submit_and_approve() {
    let (app, _pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/polls/{}/statements", poll_id),
            json!({"text": "Cities should close streets to cars on weekends"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["approved"], false);
    let statement_id = body["statement_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post_json(
            &format!("/polls/{}/statements/{}/approve", poll_id, statement_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["approved"], true);
}

#[tokio::test]
async fn tc_i_statement_empty_text_rejected() {
    let (app, _pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    let response = app
        .oneshot(post_json(
            &format!("/polls/{}/statements", poll_id),
            json!({"text": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn tc_i_vote_on_unknown_statement_is_404() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/votes",
            json!({
                "voter_id": Uuid::new_v4(),
                "statement_id": Uuid::new_v4(),
                "value": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tc_i_vote_records_once_and_ignores_duplicates() {
    let (app, pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();
    let statement_id = Uuid::new_v4();
    let voter_id = Uuid::new_v4();

    db::statements::insert_statement(&pool, statement_id, poll_id, "test", true, Utc::now())
        .await
        .unwrap();

    let vote = json!({
        "voter_id": voter_id,
        "statement_id": statement_id,
        "value": -1
    });

    let response = app.clone().oneshot(post_json("/votes", vote.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["recorded"], true);

    // Votes are immutable: the second attempt is acknowledged but not written
    let response = app.oneshot(post_json("/votes", vote)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["recorded"], false);
}

#[tokio::test]
async fn tc_i_vote_value_out_of_range_is_400() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/votes",
            json!({
                "voter_id": Uuid::new_v4(),
                "statement_id": Uuid::new_v4(),
                "value": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tc_i_eligibility_names_the_missing_floor() {
    let (app, pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    for _ in 0..6 {
        db::statements::insert_statement(&pool, Uuid::new_v4(), poll_id, "test", true, Utc::now())
            .await
            .unwrap();
    }

    let response = app
        .oneshot(get(&format!("/polls/{}/eligibility", poll_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["eligible"], false);
    assert_eq!(body["reason"], "Insufficient users: 0/20");
    assert_eq!(body["statement_count"], 6);
}

#[tokio::test]
async fn tc_i_landscape_before_compute_is_404() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(get(&format!("/polls/{}/landscape", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn tc_i_compute_request_on_ineligible_poll_is_422() {
    let (app, _pool) = create_test_app().await;

    let response = app
        .oneshot(post_json(
            &format!("/polls/{}/landscape/compute", Uuid::new_v4()),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_DATA");
}

#[tokio::test]
async fn tc_i_compute_request_on_eligible_poll_is_accepted() {
    let (app, pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    let statements: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
    for &sid in &statements {
        db::statements::insert_statement(&pool, sid, poll_id, "test", true, Utc::now())
            .await
            .unwrap();
    }
    for v in 0..20u128 {
        for &sid in &statements {
            db::votes::record_vote(&pool, Uuid::from_u128(0x9000 + v), sid, 1)
                .await
                .unwrap();
        }
    }

    let response = app
        .clone()
        .oneshot(post_json(&format!("/polls/{}/landscape/compute", poll_id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "queued");

    // Second request while the job is still pending dedupes
    let response = app
        .clone()
        .oneshot(post_json(&format!("/polls/{}/landscape/compute", poll_id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "already_queued");

    // Job visible through the status surface
    let response = app
        .oneshot(get(&format!("/polls/{}/landscape/status", poll_id)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "pending");
}

#[tokio::test]
async fn tc_i_order_endpoint_is_deterministic_per_voter() {
    let (app, pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();
    let voter_id = Uuid::new_v4();

    for i in 0..8u128 {
        db::statements::insert_statement(
            &pool,
            Uuid::from_u128(0xA000 + i),
            poll_id,
            "test",
            true,
            Utc::now(),
        )
        .await
        .unwrap();
    }
    // Random strategy isolates ordering determinism from weighting
    db::polls::set_poll_config(
        &pool,
        &voxmap_le::models::PollConfig {
            poll_id,
            ordering_strategy: voxmap_le::models::OrderingStrategy::Random,
            batch_size: 10,
            seed_override: None,
        },
    )
    .await
    .unwrap();

    let request = || post_json(&format!("/polls/{}/order", poll_id), json!({"voter_id": voter_id}));

    let first = body_json(app.clone().oneshot(request()).await.unwrap()).await;
    let second = body_json(app.clone().oneshot(request()).await.unwrap()).await;
    assert_eq!(first["statement_ids"], second["statement_ids"]);
    assert_eq!(first["statement_ids"].as_array().unwrap().len(), 8);

    // A different voter sees a different order
    let other = body_json(
        app.oneshot(post_json(
            &format!("/polls/{}/order", poll_id),
            json!({"voter_id": Uuid::new_v4()}),
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_ne!(first["statement_ids"], other["statement_ids"]);
}

#[tokio::test]
async fn tc_i_weights_cold_start_mode_below_floor() {
    let (app, pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    for i in 0..6u128 {
        db::statements::insert_statement(
            &pool,
            Uuid::from_u128(0xB000 + i),
            poll_id,
            "test",
            true,
            Utc::now(),
        )
        .await
        .unwrap();
    }

    let response = app
        .oneshot(get(&format!("/polls/{}/weights", poll_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let weights = body["weights"].as_array().unwrap();
    assert_eq!(weights.len(), 6);
    for w in weights {
        assert_eq!(w["mode"], "cold_start");
        assert!(w["weight"].as_f64().unwrap() > 0.0);
    }
}

#[tokio::test]
async fn tc_i_weight_invalidation_reports_dropped_rows() {
    let (app, pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    for i in 0..6u128 {
        db::statements::insert_statement(
            &pool,
            Uuid::from_u128(0xC000 + i),
            poll_id,
            "test",
            true,
            Utc::now(),
        )
        .await
        .unwrap();
    }

    // Prime, invalidate, check the count
    let _ = app
        .clone()
        .oneshot(get(&format!("/polls/{}/weights", poll_id)))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(&format!("/polls/{}/weights/invalidate", poll_id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["invalidated"], 6);
}

#[tokio::test]
async fn tc_i_poll_config_round_trips() {
    let (app, _pool) = create_test_app().await;
    let poll_id = Uuid::new_v4();

    // Unconfigured poll reads back the defaults
    let body = body_json(
        app.clone()
            .oneshot(get(&format!("/polls/{}/config", poll_id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["ordering_strategy"], "weighted");
    assert_eq!(body["batch_size"], 10);

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/polls/{}/config", poll_id))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"ordering_strategy": "random", "batch_size": 5}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(
        app.oneshot(get(&format!("/polls/{}/config", poll_id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["ordering_strategy"], "random");
    assert_eq!(body["batch_size"], 5);
}
