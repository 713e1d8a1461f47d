pub mod apikeys;
pub mod auth;
pub mod databases;
pub mod health;
pub mod records;
pub mod tables;

use axum::routing::{delete, get, post};
use axum::{Router, middleware};

use crate::AppState;
use crate::rate_limit::rate_limit_middleware;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    // Bearer-only account scope: API key management
    let account_routes = Router::new().route(
        "/databases/{db_name}/apikey",
        get(apikeys::get_api_key)
            .post(apikeys::create_api_key)
            .delete(apikeys::delete_api_key),
    );

    // Combined bearer/API-key data plane
    let api_routes = Router::new()
        .route("/health", get(health::api_health))
        .route("/user/{user_id}", get(auth::find_user))
        .route(
            "/databases",
            get(databases::list_databases).post(databases::create_database),
        )
        .route("/databases/{db_name}", delete(databases::delete_database))
        .route("/databases/{db_name}/schema", post(tables::create_schema))
        .route("/databases/{db_name}/tables", get(tables::list_tables))
        .route(
            "/databases/{db_name}/tables/{table_name}",
            delete(tables::delete_table),
        )
        .route(
            "/databases/{db_name}/tables/{table_name}/schema",
            get(tables::get_table_schema),
        )
        .route(
            "/databases/{db_name}/tables/{table_name}/records",
            get(records::list_records).post(records::create_record),
        )
        .route(
            "/databases/{db_name}/tables/{table_name}/records/{record_id}",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        );

    Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .nest("/api/v1/account", account_routes)
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}
