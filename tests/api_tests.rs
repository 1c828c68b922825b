use std::sync::Arc;

use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::{App, test, web};
use serde_json::Value;
use switchctl::{AppState, SharedState, StatusFormat};

fn app_state(format: StatusFormat) -> (AppState, Arc<SharedState>) {
    let shared = Arc::new(SharedState::new());
    (AppState::new(shared.clone(), format), shared)
}

#[actix_rt::test]
async fn status_returns_full_snapshot() {
    let (state, shared) = app_state(StatusFormat::Full);
    shared.apply_transition(true);
    shared.write_analog_levels(12, 50, 99).unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.status_resource()),
    )
    .await;
    let req = test::TestRequest::get().uri("/switches/").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["is_on"], true);
    assert_eq!(resp["change"], true);
    assert_eq!(resp["red"], 12);
    assert_eq!(resp["green"], 50);
    assert_eq!(resp["blue"], 99);
}

#[actix_rt::test]
async fn status_read_resets_change_flag() {
    let (state, shared) = app_state(StatusFormat::Full);
    shared.apply_transition(false);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.status_resource()),
    )
    .await;

    let req = test::TestRequest::get().uri("/switches/").to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["change"], true);

    let req = test::TestRequest::get().uri("/switches/").to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["change"], false);
    assert_eq!(second["is_on"], false);

    assert!(!shared.snapshot().change);
}

#[actix_rt::test]
async fn change_only_format() {
    let (state, shared) = app_state(StatusFormat::ChangeOnly);
    shared.mark_changed();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.status_resource()),
    )
    .await;

    let req = test::TestRequest::get().uri("/switches/").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, serde_json::json!({ "state_change": true }));

    let req = test::TestRequest::get().uri("/switches/").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp, serde_json::json!({ "state_change": false }));
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let (state, shared) = app_state(StatusFormat::Full);
    shared.apply_transition(true);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.status_resource()),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/switches/")
        .set_payload(r#"{"is_on":false}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);

    // a rejected request must not consume the pending change
    assert!(shared.snapshot().change);
    assert!(shared.snapshot().is_on);
}

#[actix_rt::test]
async fn unknown_route_returns_404() {
    let (state, _shared) = app_state(StatusFormat::Full);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.status_resource()),
    )
    .await;

    let req = test::TestRequest::get().uri("/gpios").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_rt::test]
async fn status_without_trailing_slash_is_served() {
    let (state, shared) = app_state(StatusFormat::Full);
    shared.apply_transition(true);

    let app = test::init_service(
        App::new()
            .wrap(NormalizePath::new(TrailingSlash::Always))
            .app_data(web::Data::new(state.clone()))
            .service(state.status_resource()),
    )
    .await;

    let req = test::TestRequest::get().uri("/switches").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["is_on"], true);
    assert_eq!(resp["change"], true);

    let req = test::TestRequest::get().uri("/switches/").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["change"], false);
}
