//! Integration tests for the game service client: retry policy and error
//! surfacing, against a scripted in-process HTTP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use descent::client::{ClientError, GameClient};
use descent::config::ServiceConfig;

// ============================================================================
// Scripted HTTP server
// ============================================================================

/// Serve one scripted `(status, body)` response per connection; later
/// connections repeat the last entry. Returns the base URL and a hit
/// counter.
async fn serve_script(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let hit_counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let hit = hit_counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses
                .get(hit)
                .or(responses.last())
                .copied()
                .unwrap_or((200, "{}"));

            // Drain the request best-effort; nothing here parses it.
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;

            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                500 => "Internal Server Error",
                _ => "Status",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len(),
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), hits)
}

fn client_config(base_url: &str, max_retries: u32) -> ServiceConfig {
    ServiceConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 2,
        max_retries,
        retry_delay_ms: 10,
    }
}

const COMBAT_OK: &str = r#"{
    "success": true, "message": "A clean hit.",
    "playerHp": 10, "playerMaxHp": 20, "enemyHp": 0, "enemyMaxHp": 8,
    "combatEnd": true
}"#;

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let (url, hits) = serve_script(vec![
        (500, r#"{"success":false,"error":"boom"}"#),
        (500, r#"{"success":false,"error":"boom"}"#),
        (200, COMBAT_OK),
    ])
    .await;

    let client = GameClient::new(&client_config(&url, 2)).unwrap();
    let round = client.resolve_combat("user_1").await.unwrap();

    assert!(round.combat_end);
    assert_eq!(round.message, "A clean hit.");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_the_server_error() {
    let (url, hits) = serve_script(vec![(500, r#"{"success":false,"error":"still down"}"#)]).await;

    let client = GameClient::new(&client_config(&url, 2)).unwrap();
    let err = client.resolve_combat("user_1").await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 500, ref message } if message == "still down"));
    // initial attempt + two retries
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (url, hits) = serve_script(vec![(404, r#"{"success":false,"error":"no such player"}"#)]).await;

    let client = GameClient::new(&client_config(&url, 2)).unwrap();
    let err = client.balance("user_1").await.unwrap_err();

    assert!(
        matches!(err, ClientError::Api { status: 404, ref message } if message == "no such player")
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_status() {
    let (url, _hits) = serve_script(vec![(404, "not json at all")]).await;

    let client = GameClient::new(&client_config(&url, 0)).unwrap();
    let err = client.balance("user_1").await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 404, ref message } if message == "HTTP 404"));
}

#[tokio::test]
async fn connection_refused_surfaces_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GameClient::new(&client_config(&format!("http://{addr}"), 0)).unwrap();
    let err = client.resolve_combat("user_1").await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
}
