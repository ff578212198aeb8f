//! HTTP routes, one module per feature, merged under `/api`.

use axum::Router;

use crate::AppState;

pub mod ai_summaries;
pub mod comments;
pub mod events;
pub mod health;
pub mod meeting_agendas;
pub mod mou_renewals;
pub mod persons;
pub mod timeline;
pub mod waiting_queue;
pub mod watchlist;

/// Every `/api` route.
pub fn api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router(state))
        .merge(mou_renewals::router(state))
        .merge(timeline::router(state))
        .merge(waiting_queue::router(state))
        .merge(comments::router(state))
        .merge(watchlist::router(state))
        .merge(persons::router(state))
        .merge(events::router(state))
        .merge(meeting_agendas::router(state))
        .merge(ai_summaries::router(state))
}
