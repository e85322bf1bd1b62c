use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use graffiti_protocol::endpoints;

use crate::handler::{self, AppState};

/// Build the axum router with every origin endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::CREATE, post(handler::create_object))
        .route(endpoints::DISCOVER, get(handler::discover))
        .route(endpoints::RECOVER_ORPHANS, get(handler::recover_orphans))
        .route(endpoints::CONTINUE, get(handler::continue_stream))
        .route(endpoints::CHANNEL_STATS, get(handler::channel_stats))
        .route(
            "/:name",
            get(handler::get_object)
                .put(handler::put_object)
                .patch(handler::patch_object)
                .delete(handler::delete_object),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
