pub mod blocked_dates;
pub mod bookings;
pub mod cards;
pub mod clients;
pub mod contacts;
pub mod events;
pub mod health;
pub mod marketing;
pub mod reports;
pub mod users;

use axum::Router;
use mongodb::bson::oid::ObjectId;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(health::health_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(users::user_routes())
        .merge(bookings::booking_routes())
        .merge(reports::report_routes())
        .merge(blocked_dates::blocked_date_routes())
        .merge(events::event_routes())
        .merge(cards::card_routes())
        .merge(contacts::contact_routes())
        .nest("/clients", clients::client_routes())
        .nest("/marketing", marketing::marketing_routes())
}

/// Parse a path id, rejecting anything that is not a valid document id.
pub(crate) fn parse_object_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| AppError::BadRequest("Invalid ID format".to_string()))
}
