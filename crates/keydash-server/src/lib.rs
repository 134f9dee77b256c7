pub mod config;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use keydash_llm::ChatService;
use keydash_service::KeyService;
use tokio::net::TcpListener;

pub use routes::{build_router, AppState, InnerAppState};

pub async fn serve(
    listener: TcpListener,
    service: Arc<dyn KeyService>,
    chat: Arc<ChatService>,
) -> Result<()> {
    let state = Arc::new(InnerAppState { service, chat });
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
