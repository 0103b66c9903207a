// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{CreateUserRequest, DeleteUserRequest, MessageResponse, UpdateUserRequest, User},
    state::AppState,
};

pub mod extract;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/users",
            get(users::list_users)
                .post(users::create_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/users/username/{username}",
            get(users::get_user_by_username),
        )
        .route("/users/phone/{phone}", get(users::get_user_by_phone))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::create_user,
        users::get_user_by_username,
        users::get_user_by_phone,
        users::update_user,
        users::delete_user,
        users::list_users,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            User,
            CreateUserRequest,
            UpdateUserRequest,
            DeleteUserRequest,
            MessageResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Users", description = "User records with encrypted identifiers"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
