//! GraphQL transport: POST for queries and mutations, WebSocket upgrade for
//! subscriptions, and the GraphiQL playground for browsers. All three share
//! the path [GRAPHQL_PATH].

use async_graphql::http::GraphiQLSource;
use async_graphql::{Data, ErrorExtensions, Pos};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::Router;
use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::http::header::{ACCEPT, AUTHORIZATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tracing::{debug, info};

use crate::app::AppState;
use crate::graphql::RequestContext;
use crate::services::CatalogError;

/// Path serving every GraphQL transport
pub const GRAPHQL_PATH: &str = "/";

pub fn router() -> Router<AppState> {
    Router::new().route(GRAPHQL_PATH, get(graphql_get).post(graphql_handler))
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok())
}

/// Value of the `Authorization` key in a `connection_init` payload
fn connection_param_authorization(params: &serde_json::Value) -> Option<&str> {
    params
        .get("Authorization")
        .or_else(|| params.get("authorization"))
        .and_then(|v| v.as_str())
}

fn error_body(err: &CatalogError) -> serde_json::Value {
    serde_json::json!({
        "errors": [{
            "message": err.to_string(),
            "extensions": { "code": err.code() },
        }]
    })
}

/// GraphQL query/mutation handler with auth context
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let context = match state.resolver.resolve(authorization(&headers)).await {
        Ok(context) => context,
        Err(e) => {
            debug!(code = e.code(), error = %e, "Rejecting request");
            let error = e.extend().into_server_error(Pos::default());
            return async_graphql::Response::from_errors(vec![error]).into();
        }
    };

    state.schema.execute(req.into_inner().data(context)).await.into()
}

/// GET on the GraphQL path: WebSocket upgrade for subscriptions, otherwise
/// the playground
async fn graphql_get(State(state): State<AppState>, req: Request) -> Response {
    let (mut parts, _body) = req.into_parts();

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => graphql_ws_handler(state, parts, ws).await,
        Err(_) => graphiql(&parts.headers),
    }
}

/// GraphiQL interactive playground (only for browsers)
fn graphiql(headers: &HeaderMap) -> Response {
    let accepts_html = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        Html(
            GraphiQLSource::build()
                .endpoint(GRAPHQL_PATH)
                .subscription_endpoint(GRAPHQL_PATH)
                .finish(),
        )
        .into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

/// GraphQL WebSocket handler for subscriptions with auth
async fn graphql_ws_handler(state: AppState, mut parts: Parts, ws: WebSocketUpgrade) -> Response {
    if state.subscriptions.is_draining() {
        debug!("Refusing WebSocket upgrade while draining");
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let protocol = match GraphQLProtocol::from_request_parts(&mut parts, &state).await {
        Ok(protocol) => protocol,
        Err(status) => return status.into_response(),
    };

    // A bad token on the upgrade request refuses the connection outright
    let header_context = match state.resolver.resolve(authorization(&parts.headers)).await {
        Ok(context) => context,
        Err(e) => {
            debug!(code = e.code(), error = %e, "Rejecting WebSocket upgrade");
            return (StatusCode::UNAUTHORIZED, axum::Json(error_body(&e))).into_response();
        }
    };

    let resolver = state.resolver.clone();
    let schema = state.schema.clone();
    let subscriptions = state.subscriptions.clone();

    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |socket| async move {
            info!("Subscription connection opened");
            let connection = GraphQLWebSocket::new(socket, schema, protocol)
                .on_connection_init(move |params| async move {
                    let context: RequestContext = match connection_param_authorization(&params) {
                        Some(value) => resolver.resolve(Some(value)).await.map_err(|e| e.extend())?,
                        None => header_context,
                    };
                    let mut data = Data::default();
                    data.insert(context);
                    Ok(data)
                })
                .serve();

            subscriptions.serve_connection(connection).await;
            info!("Subscription connection finished");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_param_authorization() {
        let upper = serde_json::json!({ "Authorization": "Bearer abc" });
        let lower = serde_json::json!({ "authorization": "Bearer def" });
        let none = serde_json::json!({ "other": 1 });

        assert_eq!(connection_param_authorization(&upper), Some("Bearer abc"));
        assert_eq!(connection_param_authorization(&lower), Some("Bearer def"));
        assert_eq!(connection_param_authorization(&none), None);
        assert_eq!(connection_param_authorization(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_error_body_has_code() {
        let body = error_body(&CatalogError::Authentication {
            reason: "InvalidSignature".to_string(),
        });
        assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
    }
}
