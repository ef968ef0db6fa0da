use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::database::models::{Category, GradeResult, LineItem, Resource};
use crate::handlers::protected::resources;
use crate::handlers::public;
use crate::middleware::bearer_auth_middleware;
use crate::state::AppState;

/// OneRoster v1.2 REST prefix
pub const API_BASE: &str = "/ims/oneroster/v1p2";

pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .route("/oauth/token", post(public::token_post))
        // Protected OneRoster collections
        .nest(API_BASE, gradebook_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn gradebook_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(resource_routes::<Category>())
        .merge(resource_routes::<LineItem>())
        .merge(resource_routes::<GradeResult>())
        .route_layer(middleware::from_fn_with_state(state, bearer_auth_middleware))
}

/// Collection and item routes for one resource type
fn resource_routes<R: Resource>() -> Router<AppState> {
    let collection = format!("/{}", R::KIND.collection());
    let item = format!("/{}/:id", R::KIND.collection());

    Router::new()
        .route(&collection, get(resources::list::<R>).post(resources::create::<R>))
        .route(
            &item,
            get(resources::get::<R>)
                .put(resources::update::<R>)
                .delete(resources::delete::<R>),
        )
}
