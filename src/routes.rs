use log::debug;
use std::sync::Arc;

use actix_web::{HttpResponse, Responder, guard, http::Method, web};
use serde::Serialize;

use crate::config::StatusFormat;
use crate::state::SharedState;

pub const STATUS_PATH: &str = "/switches/";

#[derive(Clone)]
pub struct AppState {
    pub state: Arc<SharedState>,
    pub format: StatusFormat,
}

#[derive(Serialize)]
struct ChangeReport {
    state_change: bool,
}

impl AppState {
    pub fn new(state: Arc<SharedState>, format: StatusFormat) -> Self {
        Self { state, format }
    }

    pub fn status_resource(&self) -> actix_web::Resource {
        web::resource(STATUS_PATH)
            .route(web::get().to(get_status))
            .route(
                web::route()
                    .guard(guard_not_methods(&[Method::GET]))
                    .to(method_not_allowed),
            )
    }
}

/// Reports the latest state and clears the change flag.
async fn get_status(app: web::Data<AppState>) -> impl Responder {
    let snapshot = app.state.read_and_reset_change_flag();
    debug!("status read: {snapshot:?}");

    match app.format {
        StatusFormat::Full => HttpResponse::Ok().json(snapshot),
        StatusFormat::ChangeOnly => HttpResponse::Ok().json(ChangeReport {
            state_change: snapshot.change,
        }),
    }
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
