//! HTTP transport for the command protocol.
//!
//! Exposes the dispatcher over three routes:
//!
//! - `GET|POST /execute` — run a command, XML document response
//! - `GET /help` — one-line help text for a command
//! - `GET /usage` — usage text for a command (`204` when it has none)
//!
//! The command name travels in the `command` parameter; any remaining
//! parameters are passed through as command arguments. The caller's origin
//! is the peer address of the connection, never a header, so it cannot be
//! forged above the transport.

use axum::Router;
use axum::extract::{ConnectInfo, Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, TaskServError};
use crate::protocol::CommandDispatcher;
use crate::protocol::document;
use crate::scheduler::SchedulerService;
use crate::supervisor::ShutdownSignal;

/// Port the server binds when none is configured.
pub const DEFAULT_PORT: u16 = 1357;

/// Header carrying the client certificate subject, when a TLS terminator
/// forwards one. Logged for audit only; it plays no part in authorization.
const CLIENT_DN_HEADER: &str = "x-client-dn";

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
struct AppState<S> {
    dispatcher: Arc<CommandDispatcher<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandServer
// ---------------------------------------------------------------------------

/// HTTP server bound to a dispatcher.
///
/// The server runs in a background tokio task and drains gracefully when the
/// shutdown signal triggers, so a stop command's own response is delivered
/// before the listener closes.
pub struct CommandServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl CommandServer {
    /// Bind `bind` and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServError::Transport`] when the listener cannot bind.
    pub async fn start<S: SchedulerService>(
        dispatcher: Arc<CommandDispatcher<S>>,
        signal: ShutdownSignal,
        bind: SocketAddr,
    ) -> Result<Self> {
        let state = AppState { dispatcher };
        let app = Router::new()
            .route(
                "/execute",
                get(handle_execute_get::<S>).post(handle_execute_post::<S>),
            )
            .route("/help", get(handle_help::<S>))
            .route("/usage", get(handle_usage::<S>))
            .with_state(state);

        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| TaskServError::Transport(format!("bind {bind} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| TaskServError::Transport(format!("local addr unavailable: {e}")))?;

        info!("command server listening on http://{addr}");

        let handle = tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            let shutdown = async move { signal.triggered().await };
            if let Err(e) = axum::serve(listener, service)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("command server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// The address the server is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The port the server is listening on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait until the server has drained and closed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServError::Transport`] when the serving task panicked.
    pub async fn closed(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| TaskServError::Transport(format!("server task failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pull the command name out of the request parameters; everything else is
/// an argument.
fn split_command(mut params: HashMap<String, String>) -> (String, BTreeMap<String, String>) {
    let command = params.remove("command").unwrap_or_default();
    (command, params.into_iter().collect())
}

fn log_client_dn(headers: &HeaderMap, origin: &str) {
    if let Some(dn) = headers.get(CLIENT_DN_HEADER).and_then(|v| v.to_str().ok()) {
        debug!(%origin, dn, "client certificate dn");
    }
}

fn classify(err: &TaskServError) -> StatusCode {
    match err {
        TaskServError::CommandNotFound(_) => StatusCode::NOT_FOUND,
        TaskServError::AccessDenied(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn error_response(err: &TaskServError) -> Response {
    warn!(error = %err, "request failed");
    xml_response(classify(err), document::error_document(&err.to_string()))
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `GET /execute` — command in the query string.
async fn handle_execute_get<S: SchedulerService>(
    State(state): State<AppState<S>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    run_execute(&state, peer, &headers, params).await
}

/// `POST /execute` — command in a urlencoded form body.
async fn handle_execute_post<S: SchedulerService>(
    State(state): State<AppState<S>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    run_execute(&state, peer, &headers, params).await
}

async fn run_execute<S: SchedulerService>(
    state: &AppState<S>,
    peer: SocketAddr,
    headers: &HeaderMap,
    params: HashMap<String, String>,
) -> Response {
    let origin = peer.ip().to_string();
    log_client_dn(headers, &origin);
    let (command, arguments) = split_command(params);
    match state.dispatcher.execute(&command, &arguments, &origin).await {
        Ok(doc) => xml_response(StatusCode::OK, doc.render()),
        Err(e) => error_response(&e),
    }
}

/// `GET /help` — help text for the named command.
async fn handle_help<S: SchedulerService>(
    State(state): State<AppState<S>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let origin = peer.ip().to_string();
    log_client_dn(&headers, &origin);
    let (command, _) = split_command(params);
    match state.dispatcher.describe_help(&command, &origin) {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /usage` — usage text for the named command, `204` when it has none.
async fn handle_usage<S: SchedulerService>(
    State(state): State<AppState<S>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let origin = peer.ip().to_string();
    log_client_dn(&headers, &origin);
    let (command, _) = split_command(params);
    match state.dispatcher.describe_usage(&command, &origin) {
        Ok(Some(text)) => (StatusCode::OK, text).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn unknown_commands_map_to_not_found() {
        let err = TaskServError::CommandNotFound("Bogus".to_owned());
        assert_eq!(classify(&err), StatusCode::NOT_FOUND);
    }

    #[test]
    fn denied_origins_map_to_forbidden() {
        let err = TaskServError::AccessDenied("10.0.0.9".to_owned());
        assert_eq!(classify(&err), StatusCode::FORBIDDEN);
    }

    #[test]
    fn other_failures_map_to_internal_error() {
        assert_eq!(
            classify(&TaskServError::Scheduler("drain timed out".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            classify(&TaskServError::Config("missing key".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn split_command_separates_name_from_arguments() {
        let mut params = HashMap::new();
        params.insert("command".to_owned(), "GetTasksStatus".to_owned());
        params.insert("verbose".to_owned(), "1".to_owned());

        let (command, arguments) = split_command(params);
        assert_eq!(command, "GetTasksStatus");
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments.get("verbose").map(String::as_str), Some("1"));
    }

    #[test]
    fn missing_command_parameter_resolves_to_empty_name() {
        let (command, arguments) = split_command(HashMap::new());
        assert_eq!(command, "");
        assert!(arguments.is_empty());
    }

    #[test]
    fn xml_responses_carry_the_xml_content_type() {
        let resp = xml_response(StatusCode::OK, "<info></info>".to_owned());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );
    }

    #[test]
    fn error_responses_render_the_error_document() {
        let resp = error_response(&TaskServError::AccessDenied("10.0.0.9".to_owned()));
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );
    }
}
