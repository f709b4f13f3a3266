//! Axum router wiring.
//!
//! Demo routes sit behind the instrumentation layers; ops routes are added
//! after `route_layer` and stay uninstrumented. Layer order, outermost first:
//! qps, latency, errcode.

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::{app_state::AppState, middleware, ops, services::hello};

pub fn build_router(state: AppState) -> Router {
    let toggles = &state.cfg().instrumentation;
    let inst = state.instrumentation();

    let mut app = Router::new()
        .route("/hello", get(hello::hello))
        .route("/world", get(hello::world));

    if toggles.errcode {
        app = app.route_layer(from_fn_with_state(inst.clone(), middleware::track_errcode));
    }
    if toggles.latency {
        app = app.route_layer(from_fn_with_state(inst.clone(), middleware::track_latency));
    }
    if toggles.qps {
        app = app.route_layer(from_fn_with_state(inst, middleware::track_qps));
    }

    app.route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
