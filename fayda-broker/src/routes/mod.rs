//! HTTP routes for the relay

mod fayda;
mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::driver::PortalDriver;
use crate::email::EmailSender;
use crate::state::AppState;
use crate::store::{IdentityStore, SubscriberRegistry};

pub use fayda::{InitiateResponse, UserDataRequest, UserDataResponse, UserView, VerifyResponse};

/// Create the router with all routes
pub fn create_router<D, R, E>(state: Arc<AppState<D, R, E>>) -> Router
where
    D: PortalDriver + 'static,
    R: SubscriberRegistry + IdentityStore + 'static,
    E: EmailSender + 'static,
{
    let api = Router::new()
        .route("/initiate", post(fayda::initiate::<D, R, E>))
        .route("/verify", post(fayda::verify::<D, R, E>))
        .route("/user-data", post(fayda::user_data::<D, R, E>));

    Router::new()
        .route("/", get(health::health))
        .nest("/api/v1/fayda", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
