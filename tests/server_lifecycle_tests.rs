//! Transport server tests over real sockets

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use catalog_api::db::Database;
use catalog_api::services::{EventBus, ServerState, TokenService, Topic, TransportServer};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (TransportServer, String) {
    let db = Database::connect_in_memory().await.unwrap();
    let tokens = Arc::new(TokenService::new("lifecycle-secret", 3600));
    let server = TransportServer::new(db, EventBus::new(8), tokens);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.start_with_listener(listener).unwrap();
    (server, format!("http://{addr}"))
}

async fn post_graphql(
    client: &reqwest::Client,
    base: &str,
    query: &str,
    token: Option<&str>,
) -> Value {
    let mut request = client.post(format!("{base}/")).json(&json!({ "query": query }));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn test_queries_and_mutations_over_http() {
    let (server, base) = start_server().await;
    let client = reqwest::Client::new();

    let created = post_graphql(
        &client,
        &base,
        r#"mutation { createUser(username: "alice", favoriteGenre: "scifi") { username } }"#,
        None,
    )
    .await;
    assert_eq!(created["data"]["createUser"]["username"], "alice");

    let login = post_graphql(
        &client,
        &base,
        r#"mutation { login(username: "alice", password: "secret") { value } }"#,
        None,
    )
    .await;
    let token = login["data"]["login"]["value"].as_str().unwrap().to_string();

    let me = post_graphql(&client, &base, "{ me { username } }", Some(&token)).await;
    assert_eq!(me["data"]["me"]["username"], "alice");

    let added = post_graphql(
        &client,
        &base,
        r#"mutation { addBook(title: "Dune", published: 1965, author: "Frank Herbert", genres: ["scifi"]) { title author { name } } }"#,
        Some(&token),
    )
    .await;
    assert_eq!(
        added["data"]["addBook"],
        json!({ "title": "Dune", "author": { "name": "Frank Herbert" } })
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let (server, base) = start_server().await;
    let client = reqwest::Client::new();

    let response = post_graphql(&client, &base, "{ allBooksCount }", Some("forged")).await;
    assert_eq!(response["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_health_and_shutdown() {
    let (server, base) = start_server().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["state"], "listening");

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown should not hang")
        .unwrap();
    assert_eq!(server.state(), ServerState::Stopped);

    let after = reqwest::Client::new()
        .get(format!("{base}/healthz"))
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    assert!(after.is_err());
}

/// Create alice and return her bearer token
async fn login_alice(client: &reqwest::Client, base: &str) -> String {
    post_graphql(
        client,
        base,
        r#"mutation { createUser(username: "alice", favoriteGenre: "scifi") { username } }"#,
        None,
    )
    .await;
    let login = post_graphql(
        client,
        base,
        r#"mutation { login(username: "alice", password: "secret") { value } }"#,
        None,
    )
    .await;
    login["data"]["login"]["value"].as_str().unwrap().to_string()
}

/// Open a `graphql-transport-ws` connection to the GraphQL path
async fn connect_ws(base: &str, authorization: Option<&str>) -> Result<Socket, tungstenite::Error> {
    let url = format!("{}/", base.replacen("http://", "ws://", 1));
    let mut request = url.into_client_request().unwrap();
    request.headers_mut().insert(
        SEC_WEBSOCKET_PROTOCOL,
        HeaderValue::from_static("graphql-transport-ws"),
    );
    if let Some(value) = authorization {
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    }
    connect_async(request).await.map(|(socket, _)| socket)
}

async fn send_json(socket: &mut Socket, message: Value) {
    socket.send(Message::Text(message.to_string())).await.unwrap();
}

/// Next text or close frame, skipping pings
async fn next_frame(socket: &mut Socket) -> Option<Message> {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame within 5s")?;
        match message {
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(message) => return Some(message),
            Err(_) => return None,
        }
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    match next_frame(socket).await {
        Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Handshake and start a `bookAdded` subscription with id "1"
async fn subscribe_book_added(server: &TransportServer, socket: &mut Socket, init: Value) {
    send_json(socket, json!({ "type": "connection_init", "payload": init })).await;
    assert_eq!(next_json(socket).await["type"], "connection_ack");

    send_json(
        socket,
        json!({
            "id": "1",
            "type": "subscribe",
            "payload": { "query": "subscription { bookAdded { title author { name } } }" },
        }),
    )
    .await;

    let bus = server.subscriptions().bus();
    for _ in 0..200 {
        if bus.subscriber_count(Topic::BookAdded) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(bus.subscriber_count(Topic::BookAdded), 1);
}

const ADD_DUNE: &str = r#"mutation { addBook(title: "Dune", published: 1965, author: "Frank Herbert", genres: ["scifi"]) { title } }"#;

#[tokio::test]
async fn test_book_added_over_websocket() {
    let (server, base) = start_server().await;
    let client = reqwest::Client::new();
    let token = login_alice(&client, &base).await;

    let mut socket = connect_ws(&base, None).await.unwrap();
    subscribe_book_added(&server, &mut socket, json!({})).await;
    assert_eq!(server.subscriptions().live_connections(), 1);

    post_graphql(&client, &base, ADD_DUNE, Some(&token)).await;

    let next = next_json(&mut socket).await;
    assert_eq!(next["type"], "next");
    assert_eq!(next["id"], "1");
    assert_eq!(
        next["payload"]["data"]["bookAdded"],
        json!({ "title": "Dune", "author": { "name": "Frank Herbert" } })
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connection_init_authorization() {
    let (server, base) = start_server().await;
    let client = reqwest::Client::new();
    let token = login_alice(&client, &base).await;

    let mut socket = connect_ws(&base, None).await.unwrap();
    send_json(
        &mut socket,
        json!({ "type": "connection_init", "payload": { "Authorization": format!("Bearer {token}") } }),
    )
    .await;
    assert_eq!(next_json(&mut socket).await["type"], "connection_ack");

    send_json(
        &mut socket,
        json!({ "id": "me", "type": "subscribe", "payload": { "query": "{ me { username } }" } }),
    )
    .await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "next");
    assert_eq!(reply["payload"]["data"]["me"]["username"], "alice");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_connection_init_token_closes_socket() {
    let (server, base) = start_server().await;

    let mut socket = connect_ws(&base, None).await.unwrap();
    send_json(
        &mut socket,
        json!({ "type": "connection_init", "payload": { "authorization": "Bearer forged" } }),
    )
    .await;

    assert_matches!(
        next_frame(&mut socket).await,
        Some(Message::Close(Some(frame))) if frame.reason.contains("Invalid token")
    );
    assert_eq!(server.subscriptions().bus().subscriber_count(Topic::BookAdded), 0);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_header_token_refuses_upgrade() {
    let (server, base) = start_server().await;

    let err = connect_ws(&base, Some("Bearer forged")).await.unwrap_err();
    assert_matches!(err, tungstenite::Error::Http(response) if response.status() == 401);
    assert_eq!(server.subscriptions().live_connections(), 0);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_upgrade_refused_while_draining() {
    let (server, base) = start_server().await;

    // drain subscriptions while HTTP is still being served
    server.subscriptions().dispose_all().await;

    let err = connect_ws(&base, None).await.unwrap_err();
    assert_matches!(err, tungstenite::Error::Http(response) if response.status() == 503);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_disposes_live_websocket() {
    let (server, base) = start_server().await;

    let mut socket = connect_ws(&base, None).await.unwrap();
    subscribe_book_added(&server, &mut socket, json!({})).await;

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown should not hang")
        .unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
    assert_eq!(server.subscriptions().live_connections(), 0);
    assert_eq!(server.subscriptions().bus().subscriber_count(Topic::BookAdded), 0);

    // the client sees the subscription complete or the socket go away
    loop {
        match next_frame(&mut socket).await {
            Some(Message::Text(text)) => {
                let frame: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(frame["type"], "complete");
            }
            Some(Message::Close(_)) | None => break,
            Some(other) => panic!("unexpected frame {other:?}"),
        }
    }
}
