// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.
//!
//! All inputs are plaintext. Update and delete select their target with a
//! plaintext `username` (preferred) or `phone`; the repository encrypts it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::extract::AppJson;
use crate::{
    error::ApiError,
    models::{CreateUserRequest, DeleteUserRequest, MessageResponse, UpdateUserRequest, User},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    tag = "Users",
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Malformed body or neither username nor phone supplied"),
        (status = 409, description = "Username or phone already taken"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.users.insert(request.into()).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/username/{username}",
    params(("username" = String, Path, description = "Plaintext username")),
    tag = "Users",
    responses(
        (status = 200, body = User),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .find_by_username(&username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[utoipa::path(
    get,
    path = "/users/phone/{phone}",
    params(("phone" = String, Path, description = "Plaintext phone number")),
    tag = "Users",
    responses(
        (status = 200, body = User),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_user_by_phone(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .find_by_phone(&phone)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[utoipa::path(
    put,
    path = "/users",
    request_body = UpdateUserRequest,
    tag = "Users",
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "No target or no replacement values"),
        (status = 404, description = "User not found"),
        (status = 409, description = "New value already taken"),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let filter = request
        .filter()
        .ok_or_else(|| ApiError::bad_request("Username or Phone is required"))?;
    state.users.update(filter, request.update()).await?;
    Ok(Json(MessageResponse::new("User updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/users",
    request_body = DeleteUserRequest,
    tag = "Users",
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "No target supplied"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AppJson(request): AppJson<DeleteUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let filter = request
        .filter()
        .ok_or_else(|| ApiError::bad_request("Username or Phone is required"))?;
    state.users.delete(filter).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses((status = 200, body = [User]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.users.list_all().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::FieldCipher;

    fn test_state() -> AppState {
        AppState::in_memory(FieldCipher::new(b"0123456789abcdef").unwrap())
    }

    async fn create(state: &AppState, username: &str, phone: &str) -> User {
        let (status, Json(user)) = create_user(
            State(state.clone()),
            AppJson(CreateUserRequest {
                username: Some(username.into()),
                phone: Some(phone.into()),
            }),
        )
        .await
        .expect("user creation succeeds");
        assert_eq!(status, StatusCode::CREATED);
        user
    }

    #[tokio::test]
    async fn create_and_fetch_by_username_and_phone() {
        let state = test_state();
        let created = create(&state, "alice", "555-1").await;
        assert_eq!(created.username.as_deref(), Some("alice"));
        assert!(!created.id.is_empty());

        let Json(by_name) = get_user_by_username(State(state.clone()), Path("alice".into()))
            .await
            .unwrap();
        assert_eq!(by_name, created);

        let Json(by_phone) = get_user_by_phone(State(state.clone()), Path("555-1".into()))
            .await
            .unwrap();
        assert_eq!(by_phone, created);
    }

    #[tokio::test]
    async fn unknown_user_is_404() {
        let state = test_state();
        let err = get_user_by_username(State(state), Path("ghost".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_create_is_409() {
        let state = test_state();
        create(&state, "alice", "555-1").await;

        let err = create_user(
            State(state),
            AppJson(CreateUserRequest {
                username: Some("alice".into()),
                phone: Some("555-9".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_without_identifiers_is_400() {
        let err = create_user(State(test_state()), AppJson(CreateUserRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_changes_phone() {
        let state = test_state();
        create(&state, "alice", "555-1").await;

        let Json(message) = update_user(
            State(state.clone()),
            AppJson(UpdateUserRequest {
                username: Some("alice".into()),
                new_phone: Some("555-2".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(message.message, "User updated successfully");

        let Json(user) = get_user_by_username(State(state), Path("alice".into()))
            .await
            .unwrap();
        assert_eq!(user.phone.as_deref(), Some("555-2"));
    }

    #[tokio::test]
    async fn update_without_target_or_values_is_400() {
        let state = test_state();
        create(&state, "alice", "555-1").await;

        let no_target = update_user(
            State(state.clone()),
            AppJson(UpdateUserRequest {
                new_phone: Some("555-2".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(no_target.status, StatusCode::BAD_REQUEST);

        let no_values = update_user(
            State(state),
            AppJson(UpdateUserRequest {
                username: Some("alice".into()),
                new_username: Some(String::new()),
                new_phone: Some(String::new()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(no_values.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_lookup_is_404() {
        let state = test_state();
        create(&state, "alice", "555-1").await;

        delete_user(
            State(state.clone()),
            AppJson(DeleteUserRequest {
                username: None,
                phone: Some("555-1".into()),
            }),
        )
        .await
        .unwrap();

        let err = get_user_by_username(State(state.clone()), Path("alice".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let again = delete_user(
            State(state),
            AppJson(DeleteUserRequest {
                username: Some("alice".into()),
                phone: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(again.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_all_users_decrypted() {
        let state = test_state();
        let mut expected = vec![
            create(&state, "alice", "555-1").await,
            create(&state, "bob", "555-2").await,
        ];

        let Json(mut users) = list_users(State(state)).await.unwrap();

        expected.sort_by(|a, b| a.id.cmp(&b.id));
        users.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(users, expected);
    }
}
