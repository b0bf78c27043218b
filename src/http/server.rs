//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the application router with the ingress pipeline
//! - Wire up request ID and trace layers
//! - Bind server to listener with peer addresses available
//! - Run the rate-limit sweeper for the server's lifetime
//!
//! # Design Decisions
//! - Request IDs are assigned outside the pipeline so rejections can echo them
//! - Business handlers are plain axum routers; they never see the pipeline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigError, IngressConfig};
use crate::http::middleware::ingress_middleware;
use crate::lifecycle::Shutdown;
use crate::pipeline::IngressPipeline;
use crate::security::rate_limit::spawn_sweeper;

/// HTTP server hosting business routes behind the ingress pipeline.
pub struct HttpServer {
    router: Router,
    config: IngressConfig,
    pipeline: Arc<IngressPipeline>,
}

impl HttpServer {
    /// Build the pipeline from `config` and wrap `app` with it.
    pub fn new(config: IngressConfig, app: Router) -> Result<Self, ConfigError> {
        let pipeline = Arc::new(IngressPipeline::from_config(&config)?);
        let router = Self::build_router(app, pipeline.clone());
        Ok(Self {
            router,
            config,
            pipeline,
        })
    }

    /// Layer order, outermost first: request ID, trace, propagate ID, ingress.
    fn build_router(app: Router, pipeline: Arc<IngressPipeline>) -> Router {
        app.layer(middleware::from_fn_with_state(pipeline, ingress_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `stop` fires.
    ///
    /// Take the receiver before anything can trigger shutdown: a broadcast
    /// sent earlier than the subscription is never seen.
    pub async fn run(
        self,
        listener: TcpListener,
        mut stop: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // The sweeper follows the server, not the process signal.
        let sweeper_stop = Shutdown::new();
        let sweeper = self.config.rate_limit.enabled.then(|| {
            spawn_sweeper(
                self.pipeline.rate_limits().clone(),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                sweeper_stop.subscribe(),
            )
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        sweeper_stop.trigger();
        if let Some(sweeper) = sweeper {
            if let Err(e) = sweeper.await {
                tracing::error!(error = %e, "Rate-limit sweeper panicked");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, e.g. for driving with `oneshot` in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &IngressConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<IngressPipeline> {
        &self.pipeline
    }
}
