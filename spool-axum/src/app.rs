use axum::extract::DefaultBodyLimit;
use axum::Router;
use spool_jobs::JobService;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::rest;
use crate::SpoolAxumState;

/// Default cap on a single request body, which bounds chunk size
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct SpoolApp {
    pub jobs: JobService,
    pub router: Router<()>,
}

impl SpoolApp {
    /// Mount the job routes under `/api/jobs`
    pub fn new(jobs: JobService) -> Self {
        Self::with_body_limit(jobs, DEFAULT_BODY_LIMIT)
    }

    pub fn with_body_limit(jobs: JobService, body_limit: usize) -> Self {
        let state = SpoolAxumState::new(jobs.clone());
        let router = Router::new()
            .nest("/api/jobs", rest::jobs_router(state))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );
        Self { jobs, router }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

pub fn axum(jobs: JobService) -> SpoolApp {
    SpoolApp::new(jobs)
}
