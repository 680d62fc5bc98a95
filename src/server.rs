//! HTTP server.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::routing::Router;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Serves a [`Router`] over HTTP/1.1.
#[derive(Clone)]
pub struct Server {
    router: Arc<Router>,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Bind to all interfaces on `port`. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<TcpListener> {
        Ok(TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?)
    }

    /// Accept connections until `shutdown` resolves. Connections already
    /// accepted finish on their own tasks.
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "Server listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let io = TokioIo::new(stream);
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let router = Arc::clone(&router);
                    async move { Ok::<_, Infallible>(handle_request(req, &router).await) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%peer, error = %e, "Error serving connection");
                }
            });
        }
    }
}

async fn handle_request(req: Request<Incoming>, router: &Router) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());

    let mut request = HttpRequest::new(method.clone(), path.clone());
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    let response = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(body) => {
            request.body = body.to_bytes();
            match router.dispatch(request).await {
                Ok(response) => response,
                Err(err) => error_response(&err),
            }
        }
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(method = %method, path = %path, "Request body too large");
            error_response(&Error::PayloadTooLarge {
                limit: MAX_BODY_BYTES,
            })
        }
        Err(e) => error_response(&Error::BadRequest(format!("failed to read body: {}", e))),
    };

    info!(
        method = %method,
        path = %path,
        status = response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );
    into_hyper(response)
}

fn error_response(err: &Error) -> HttpResponse {
    if err.status_code() >= 500 {
        error!(error = %err, "Request failed");
    }
    HttpResponse::from_error(err)
}

fn into_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(response.body));
    *out.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (key, value) in response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            out.headers_mut().insert(name, value);
        }
    }
    out
}
