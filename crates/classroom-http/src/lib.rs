//! HTTP server for Classroom.
//!
//! Exposes the content hierarchy as REST, file uploads as multipart, and
//! store changes over a WebSocket feed. Handlers are thin: all state lives
//! in the [`ClassroomContext`].

mod routes;
mod upload;
mod websocket;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use classroom_core::ClassroomContext;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub use routes::{ApiResponse, ApiResult};
pub use upload::MAX_UPLOAD_BYTES;

/// Build the application router.
///
/// `static_dir`, when given, is served for every path no route matches
/// (the built front-end).
pub fn router(ctx: ClassroomContext, static_dir: Option<PathBuf>) -> Router {
    let uploads = ServeDir::new(ctx.uploads_dir());

    let mut app = Router::new()
        .route("/api/health", get(routes::health))
        .route(
            "/api/upload",
            post(upload::upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/{collection}",
            get(routes::list_records).post(routes::create_record),
        )
        .route(
            "/api/{collection}/{id}",
            get(routes::get_record)
                .put(routes::update_record)
                .delete(routes::delete_record),
        )
        .route("/ws/events", get(websocket::ws_handler))
        .nest_service("/uploads", uploads)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ctx);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Serve on `addr` until `shutdown` resolves.
pub async fn serve<F>(
    ctx: ClassroomContext,
    addr: SocketAddr,
    static_dir: Option<PathBuf>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(ctx, static_dir);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Handle to a server running on its own thread.
#[derive(Default)]
pub struct HttpServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<std::thread::JoinHandle<()>>,
}

impl HttpServerHandle {
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Stop the server gracefully and wait for its thread.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.join();
        }
    }
}

impl Drop for HttpServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the server on a dedicated thread with its own tokio runtime.
///
/// For hosts that do not run tokio themselves.
pub fn start(
    ctx: ClassroomContext,
    host: &str,
    port: u16,
    static_dir: Option<PathBuf>,
) -> Result<HttpServerHandle, String> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("Invalid address: {e}"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create tokio runtime: {e}"))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = std::thread::spawn(move || {
        runtime.block_on(async move {
            let shutdown = async {
                shutdown_rx.await.ok();
                log::info!("HTTP server shutting down");
            };
            if let Err(e) = serve(ctx, addr, static_dir, shutdown).await {
                log::error!("HTTP server on {addr} failed: {e}");
            }
        });
    });

    Ok(HttpServerHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ============================================================================
// TESTS
// ============================================================================
