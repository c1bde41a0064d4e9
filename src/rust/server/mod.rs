//! HTTP/1.1 front end for the gloss classifier.
//!
//! Routing and error mapping live in [`router`] and know nothing about
//! sockets; this module only moves bytes between hyper and the router.

mod router;

pub use router::{map_error, parse_query, require_fields, HttpReply, Router};

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;

/// Largest request body accepted by [`serve`].
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Accepts connections on `listener` until `shutdown` resolves, with the
/// default body limit.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    serve_with_limit(listener, router, DEFAULT_MAX_BODY_BYTES, shutdown).await
}

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// Each connection gets its own task; each request runs its inference on the
/// blocking thread pool so slow models never stall the accept loop. Once
/// `shutdown` resolves no new connections are accepted, open connections
/// finish the request they are serving and then close, and only then does
/// this function return.
pub async fn serve_with_limit(
    listener: TcpListener,
    router: Router,
    max_body_bytes: usize,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    info!("Gloss classifier server running on '{}'", listener.local_addr()?);
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                let router = router.clone();
                let service =
                    service_fn(move |request| handle(router.clone(), max_body_bytes, request));
                let connection =
                    http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let connection = graceful.watch(connection);
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!("Connection from {} ended with error: {}", peer, e);
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    drop(listener);
    info!("Waiting for {} open connection(s) to finish", graceful.count());
    graceful.shutdown().await;
    info!("All connections closed");
    Ok(())
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn bind_and_serve(
    addr: SocketAddr,
    router: Router,
    max_body_bytes: usize,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_with_limit(listener, router, max_body_bytes, shutdown).await
}

async fn handle<B>(
    router: Router,
    max_body_bytes: usize,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = request.into_parts();

    let body = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!("Rejected request body larger than {} bytes", max_body_bytes);
            let reply = HttpReply::text(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload too large");
            return Ok(into_response(reply));
        }
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            let reply = HttpReply::text(StatusCode::BAD_REQUEST, "Unreadable request body");
            return Ok(into_response(reply));
        }
    };

    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(str::to_string);

    let routed = tokio::task::spawn_blocking(move || {
        router.route(&method, &path, query.as_deref(), &body)
    });
    let reply = match routed.await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Request handler panicked: {}", e);
            HttpReply::server_error()
        }
    };

    debug!("{} {} -> {}", parts.method, parts.uri.path(), reply.status);
    Ok(into_response(reply))
}

fn into_response(reply: HttpReply) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() = reply.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(reply.content_type));
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::classifier::{
        ClassificationPort, ClassifierError, ClassifierInput, GlossClassifier, ScoreVector,
        Sentence, Token, TokenizationPort, TokenizedInput,
    };

    struct Words;

    impl TokenizationPort for Words {
        fn tokenize(&self, text: &str) -> Result<TokenizedInput, ClassifierError> {
            Ok(vec![Sentence::new(text.split_whitespace().map(Token::word).collect())])
        }
    }

    struct Constant;

    impl ClassificationPort for Constant {
        fn output_size(&self) -> usize {
            2
        }

        fn classify(&mut self, _input: &ClassifierInput) -> Result<ScoreVector, ClassifierError> {
            Ok(vec![0.3, 0.7])
        }

        fn last_importance_scores(&self) -> Result<Vec<Vec<f32>>, ClassifierError> {
            Ok(vec![])
        }
    }

    fn router() -> Result<Router, ClassifierError> {
        let classifier = GlossClassifier::builder()
            .with_tokenizer(Words)
            .with_classifier(Constant)
            .with_labels(vec!["ANIMAL", "PLANT"])?
            .build()?;
        Ok(Router::new(Arc::new(classifier)))
    }

    fn post(body: &'static str) -> Result<Request<Full<Bytes>>, hyper::http::Error> {
        Request::post("/classify").body(Full::new(Bytes::from_static(body.as_bytes())))
    }

    async fn body_of(
        response: Response<Full<Bytes>>,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let bytes = response.into_body().collect().await?.to_bytes();
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    #[tokio::test]
    async fn test_body_within_limit_is_classified() -> Result<(), Box<dyn std::error::Error>> {
        let response = handle(router()?, 16, post("a red rose")?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_of(response).await?, "PLANT");
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let response = handle(router()?, 8, post("a red rose in a tall vase")?).await?;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_of(response).await?, "413 Payload too large");
        Ok(())
    }
}
