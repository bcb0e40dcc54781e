//! Advertisement fetching and display tests

use playmanity_session::session::{ADVERTISEMENT_PATH, END_PATH, HEARTBEAT_PATH, INITIATE_PATH};
use playmanity_session::{
    AdKind, AdOutcome, AdProgress, ClientConfig, ErrorKind, MemoryTransport, Playmanity,
    SessionEvent, SessionManager,
};
use std::sync::Arc;
use std::time::Duration;

fn transport() -> Arc<MemoryTransport> {
    let transport = Arc::new(MemoryTransport::new());
    transport.set_default_json(INITIATE_PATH, serde_json::json!({"success": true}));
    transport.set_default_json(HEARTBEAT_PATH, serde_json::json!({"success": true}));
    transport.set_default_json(END_PATH, serde_json::json!({"success": true}));
    transport
}

async fn active_manager(transport: &Arc<MemoryTransport>) -> SessionManager {
    let manager = SessionManager::new(
        ClientConfig::new("http://localhost/api", "404e1b2b-de1b-4988-8cc8-94239dc482b3"),
        transport.clone(),
    );
    manager.set_auth_token("abc123");
    assert!(manager.init_session().await.unwrap());
    manager
}

fn api_errors(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<(String, ErrorKind)> {
    let mut errors = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::ApiError { context, kind, .. } = event {
            errors.push((context, kind));
        }
    }
    errors
}

#[tokio::test]
async fn test_no_session_no_request() {
    let transport = transport();
    let manager = SessionManager::new(
        ClientConfig::new("http://localhost/api", "g"),
        transport.clone(),
    );
    manager.set_auth_token("abc123");

    assert!(manager.get_advertisement().await.is_none());
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_advertisement() {
    let transport = transport();
    transport.push_json(
        ADVERTISEMENT_PATH,
        serde_json::json!({
            "ad": {
                "id": 42,
                "title": "Space Racer",
                "description": "Race through the stars",
                "type": "static",
                "campaignId": 7,
                "targetUrl": "https://example.com/space-racer",
                "mediaUrl": "https://cdn.example.com/space-racer.png",
                "isActive": true
            }
        }),
    );
    let manager = active_manager(&transport).await;

    let ad = manager.get_advertisement().await.unwrap();
    assert_eq!(ad.id, 42);
    assert_eq!(ad.kind, AdKind::Name("static".into()));
    assert_eq!(ad.campaign_id, 7);
    assert_eq!(ad.media_url, "https://cdn.example.com/space-racer.png");

    let request = &transport.calls_to(ADVERTISEMENT_PATH)[0];
    assert_eq!(
        request.body,
        serde_json::json!({
            "game_uuid": "404e1b2b-de1b-4988-8cc8-94239dc482b3",
            "auth_token": "abc123"
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_failures_yield_none_and_error_event() {
    let transport = transport();
    let manager = active_manager(&transport).await;
    let mut events = manager.subscribe();

    transport.push(
        ADVERTISEMENT_PATH,
        playmanity_session::Scripted::Reply(playmanity_session::TransportResponse::ok("{\"ad\": ")),
    );
    assert!(manager.get_advertisement().await.is_none());

    transport.push_json(ADVERTISEMENT_PATH, serde_json::json!({}));
    assert!(manager.get_advertisement().await.is_none());

    transport.push_failure(ADVERTISEMENT_PATH, "connection reset");
    assert!(manager.get_advertisement().await.is_none());

    transport.push_json(
        ADVERTISEMENT_PATH,
        serde_json::json!({"error": {"code": "NO_ADS", "message": "No ads available"}}),
    );
    assert!(manager.get_advertisement().await.is_none());

    let errors = api_errors(&mut events);
    assert_eq!(
        errors.iter().map(|(_, kind)| *kind).collect::<Vec<_>>(),
        vec![
            ErrorKind::Parse,
            ErrorKind::Parse,
            ErrorKind::Transport,
            ErrorKind::ServerRejection
        ]
    );
    assert!(errors.iter().all(|(context, _)| context == "fetch advertisement"));
    // Ad failures never touch the session
    assert!(manager.is_session_valid());
}

#[tokio::test(start_paused = true)]
async fn test_presenter_through_client() {
    let transport = transport();
    transport.set_default_json(
        ADVERTISEMENT_PATH,
        serde_json::json!({"ad": {"id": 3, "title": "Banner", "url": "https://example.com"}}),
    );
    let client = Playmanity::with_transport(
        ClientConfig::new("http://localhost/api", "game-1"),
        transport.clone(),
    );
    client.session().set_auth_token("abc123");
    client.session().init_session().await.unwrap();

    let handle = client.ads().start(Duration::from_secs(3)).unwrap();
    let progress = handle.progress();
    assert!(client.ads().is_displaying());

    match handle.wait().await {
        AdOutcome::Completed(ad) => assert_eq!(ad.target_url, "https://example.com"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(*progress.borrow(), AdProgress::Finished);
    assert!(!client.ads().is_displaying());

    assert!(client.shutdown().await);
}
