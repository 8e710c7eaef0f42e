//! Route definitions for the Stockroom API

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes
        .nest("/auth", auth_routes(state.clone()))
        // Everything below is scoped to one organization
        .nest("/orgs/:org_id", tenant_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .merge(protected)
}

/// Organization scoped routes (protected)
fn tenant_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/skus", sku_routes())
        .nest("/inventory", inventory_routes())
        .nest("/transactions", transaction_routes())
        .nest("/users", user_routes())
        .nest("/change-logs", change_log_routes())
        .nest("/field-aliases", field_alias_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// SKU management routes
fn sku_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_skus).post(handlers::create_sku))
        .route("/categories", get(handlers::list_sku_categories))
        .route("/:sku_id", get(handlers::get_sku).patch(handlers::update_sku))
        .route("/:sku_id/status", patch(handlers::update_sku_status))
        .route("/:sku_id/change-logs", get(handlers::get_sku_change_logs))
}

/// Inventory routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_inventory).post(handlers::create_inventory))
        .route("/summary", get(handlers::get_inventory_summary))
        .route("/sku/:sku_id", get(handlers::get_inventory_by_sku))
        .route("/sku/:sku_id/cost", patch(handlers::update_manual_cost))
}

/// Stock movement routes
fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/summary", get(handlers::get_transaction_summary))
        .route("/:transaction_id", get(handlers::get_transaction))
}

/// User management routes
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/roles", get(handlers::list_roles))
        .route(
            "/:user_id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/:user_id/permissions", get(handlers::get_user_permissions))
        .route(
            "/:user_id/check-permission",
            post(handlers::check_user_permission),
        )
}

/// Audit log routes
fn change_log_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_change_logs).post(handlers::create_change_log),
        )
        .route("/activity-summary", get(handlers::get_activity_summary))
}

/// Field alias routes
fn field_alias_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_field_aliases).post(handlers::create_field_alias),
        )
        .route("/tables", get(handlers::list_alias_tables))
        .route("/tables/:table_name", get(handlers::get_table_fields))
        .route(
            "/tables/:table_name/initialize",
            post(handlers::initialize_table_aliases),
        )
        .route(
            "/:alias_id",
            get(handlers::get_field_alias)
                .patch(handlers::update_field_alias)
                .delete(handlers::delete_field_alias),
        )
}
