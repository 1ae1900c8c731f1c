//! Read-only statistics endpoint.
//!
//! `GET /stats` answers with a JSON object mapping each counter name to its
//! current value. The server runs on its own thread with a current-thread
//! tokio runtime so it never shares a core's time with a forwarding loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::shutdown::ShutdownFlag;
use crate::stats::{BridgeStats, StatsSnapshot};

/// How often the server checks the shutdown flag.
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

pub const STATS_PATH: &str = "/stats";

async fn get_stats(State(stats): State<Arc<BridgeStats>>) -> Json<StatsSnapshot> {
    Json(stats.snapshot())
}

pub fn router(stats: Arc<BridgeStats>) -> Router {
    Router::new()
        .route(STATS_PATH, get(get_stats))
        .with_state(stats)
}

/// Serve the stats router on `listener` until `shutdown` is set.
pub async fn serve(
    listener: TcpListener,
    stats: Arc<BridgeStats>,
    shutdown: ShutdownFlag,
) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "control plane listening");
    axum::serve(listener, router(stats))
        .with_graceful_shutdown(async move { shutdown.wait(SHUTDOWN_POLL).await })
        .await?;
    info!("control plane stopped");
    Ok(())
}

/// Control-plane server running on a dedicated thread.
pub struct ControlPlane {
    local_addr: SocketAddr,
    handle: JoinHandle<Result<()>>,
}

impl ControlPlane {
    /// Bind `addr` and start serving.
    ///
    /// Binding happens on the calling thread so address errors are returned
    /// here; errors inside the serve loop surface from [`join`](Self::join).
    pub fn spawn(
        addr: SocketAddr,
        stats: Arc<BridgeStats>,
        shutdown: ShutdownFlag,
    ) -> Result<Self> {
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let handle = std::thread::Builder::new()
            .name("tapbr-control".to_string())
            .spawn(move || -> Result<()> {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                rt.block_on(async move {
                    let listener = TcpListener::from_std(listener)?;
                    serve(listener, stats, shutdown).await
                })?;
                Ok(())
            })?;

        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server thread. Returns once the shutdown flag is set.
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| Error::ControlPlanePanicked)?
    }
}

/// Query a running bridge for its counters.
pub async fn fetch_stats(addr: SocketAddr) -> Result<StatsSnapshot> {
    let stream = TcpStream::connect(addr).await?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = ?e, "control connection error");
        }
    });

    let req = Request::get(STATS_PATH)
        .header(HOST, addr.to_string())
        .body(Empty::<Bytes>::new())?;
    let resp = sender.send_request(req).await?;
    if !resp.status().is_success() {
        return Err(Error::HttpStatus(resp.status()));
    }
    let body = resp.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Counter;

    #[tokio::test(flavor = "current_thread")]
    async fn serve_and_fetch() {
        let stats = Arc::new(BridgeStats::new());
        stats.add(Counter::TotalPkts, 11);
        stats.add(Counter::RingEnqDrops, 2);

        let shutdown = ShutdownFlag::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, stats.clone(), shutdown.clone()));

        let snap = fetch_stats(addr).await.unwrap();
        assert_eq!(snap.total_pkts, 11);
        assert_eq!(snap.ring_enq_drops, 2);
        assert_eq!(snap, stats.snapshot());

        shutdown.trigger();
        server.await.unwrap().unwrap();
    }
}
