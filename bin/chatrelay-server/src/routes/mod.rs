//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - public routes: health, account (send-code, register, login, logout)
//! - protected routes behind the Request Gate: chat completion, title, chats
//! - optional Swagger UI / OpenAPI document (`CHATRELAY_ENABLE_SWAGGER=false`
//!   turns it off)
//! - CORS and per-request trace-id layers

mod account;
mod chat;
mod chats;
pub mod doc;
mod health;
mod title;

#[cfg(test)]
mod test;

use std::sync::Arc;

use axum::{middleware, Router};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, require_auth, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .merge(chat::router())
        .merge(title::router())
        .merge(chats::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let mut app = Router::new()
        .merge(health::router())
        .merge(account::router())
        .merge(protected);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
