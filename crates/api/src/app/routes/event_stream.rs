use std::sync::Arc;

use axum::extract::Extension;
use axum::response::IntoResponse;

use crate::app::services::{self, AppServices};

/// SSE feed of marketplace notifications (stock changes, order item status
/// changes). Delivery and formatting beyond this feed belong to downstream
/// consumers.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(_principal): Extension<crate::context::PrincipalContext>,
) -> impl IntoResponse {
    services::sse_stream(services)
}
