
// Include tests
#[cfg(test)]
mod tests {
    use crate::*;
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const SESSION_ROOT: u64 = 1234;

    fn test_config(tick_interval_ms: u64) -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            tick_interval_ms,
            ..ServerConfig::default()
        }
    }

    async fn start(config: ServerConfig) -> (Arc<GameServer>, SocketAddr) {
        let server = Arc::new(GameServer::new(config).expect("Failed to create server"));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let running = server.clone();
        tokio::spawn(async move { running.serve(listener).await });
        (server, addr)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}"))
            .await
            .expect("Failed to connect");
        ws
    }

    async fn send(ws: &mut Client, frame: Value) {
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
    }

    async fn next_frame(ws: &mut Client) -> Message {
        tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Stream ended")
            .expect("WebSocket error")
    }

    async fn next_json(ws: &mut Client) -> Value {
        loop {
            match next_frame(ws).await {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("Expected a text frame, got {other:?}"),
            }
        }
    }

    /// Logs in and returns the avatar id plus any other views created first.
    async fn login(ws: &mut Client, user: &str, password: &str) -> (u64, Vec<Value>) {
        send(ws, json!({"object_id": SESSION_ROOT, "field": "login", "args": [user, password]})).await;

        let state = next_json(ws).await;
        assert_eq!(state["type"], "state_changed");
        assert_eq!(state["state"], "established");

        let mut others = Vec::new();
        loop {
            let frame = next_json(ws).await;
            assert_eq!(frame["type"], "object_created");
            if frame["role"] == "owner_view" {
                return (frame["object_id"].as_u64().unwrap(), others);
            }
            others.push(frame);
        }
    }

    async fn expect_eject(ws: &mut Client, code: u16) {
        let eject = next_json(ws).await;
        assert_eq!(eject["type"], "eject");
        assert_eq!(eject["code"], code);

        match next_frame(ws).await {
            Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 4000 + code);
                assert!(frame.reason.as_str().starts_with(&code.to_string()));
            }
            other => panic!("Expected a close frame, got {other:?}"),
        }
    }

    async fn wait_for_channels(server: &GameServer, expected: usize) {
        let service = server.get_replication_service();
        for _ in 0..100 {
            if service.stats().await.channels == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Channel count never reached {expected}");
    }

    #[test]
    fn test_core_server_creation() {
        let server = create_server().expect("Default config should be valid");
        assert_eq!(server.config().tick_interval_ms, 50);
        assert_eq!(server.get_connection_manager().connection_count(), 0);
        assert_eq!(server.get_replication_service().session_root().0, SESSION_ROOT);
    }

    #[test]
    fn test_invalid_replication_config_is_refused() {
        let mut config = test_config(0);
        config.replication.min_object_id = 10;
        config.replication.max_object_id = 5;
        assert!(matches!(
            create_server_with_config(config),
            Err(ServerError::Internal(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_login_over_websocket() {
        let (server, addr) = start(test_config(0)).await;
        let mut ws = connect(addr).await;

        let (avatar, others) = login(&mut ws, "guest", "guest").await;
        assert!(others.is_empty());
        assert!(avatar >= 100_000_000);

        let service = server.get_replication_service();
        let stats = service.stats().await;
        assert_eq!(stats.channels, 1);
        assert_eq!(stats.ownership_bindings, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bad_credentials_close_with_code() {
        let (_server, addr) = start(test_config(0)).await;
        let mut ws = connect(addr).await;

        send(&mut ws, json!({"object_id": SESSION_ROOT, "field": "login", "args": ["guest", "nope"]})).await;
        expect_eject(&mut ws, 122).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_undecodable_frame_ejects() {
        let (_server, addr) = start(test_config(0)).await;
        let mut ws = connect(addr).await;

        ws.send(Message::Text("not json".into())).await.unwrap();
        expect_eject(&mut ws, 109).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_anonymous_update_ejects() {
        let (_server, addr) = start(test_config(0)).await;
        let mut ws = connect(addr).await;

        send(&mut ws, json!({"object_id": 399_999_999, "field": "indicateIntent", "args": [1.0, 1.0]})).await;
        expect_eject(&mut ws, 113).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_anonymous_update_to_live_avatar_ejects() {
        let (_server, addr) = start(test_config(0)).await;
        let mut owner = connect(addr).await;
        let (avatar, _) = login(&mut owner, "guest", "guest").await;

        let mut ws = connect(addr).await;
        send(&mut ws, json!({"object_id": avatar, "field": "indicateIntent", "args": [1.0, 1.0]})).await;
        expect_eject(&mut ws, 113).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clients_see_each_other_move() {
        let (_server, addr) = start(test_config(10)).await;
        let mut first = connect(addr).await;
        let mut second = connect(addr).await;

        let (first_avatar, _) = login(&mut first, "guest", "guest").await;
        let (second_avatar, others) = login(&mut second, "guest", "guest").await;
        assert_eq!(others.len(), 1);
        assert_eq!(others[0]["object_id"], first_avatar);
        assert_eq!(others[0]["role"], "client_view");

        let announced = next_json(&mut first).await;
        assert_eq!(announced["type"], "object_created");
        assert_eq!(announced["object_id"], second_avatar);
        assert_eq!(announced["role"], "client_view");

        send(&mut first, json!({"object_id": first_avatar, "field": "indicateIntent", "args": [0.0, 1.0]})).await;

        let update = next_json(&mut second).await;
        assert_eq!(update["type"], "field_update");
        assert_eq!(update["object_id"], first_avatar);
        assert_eq!(update["field"], "setXYZH");
        assert!(update["args"][1].as_f64().unwrap() > 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disconnect_releases_everything() {
        let (server, addr) = start(test_config(0)).await;
        let mut watcher = connect(addr).await;
        let mut leaver = connect(addr).await;

        login(&mut watcher, "guest", "guest").await;
        let (leaver_avatar, _) = login(&mut leaver, "guest", "guest").await;
        let announced = next_json(&mut watcher).await;
        assert_eq!(announced["object_id"], leaver_avatar);

        leaver.close(None).await.unwrap();
        drop(leaver);

        let deleted = next_json(&mut watcher).await;
        assert_eq!(deleted["type"], "object_deleted");
        assert_eq!(deleted["object_id"], leaver_avatar);

        wait_for_channels(&server, 1).await;
        let stats = server.get_replication_service().stats().await;
        assert_eq!(stats.ownership_bindings, 1);
        assert_eq!(stats.scheduled_tasks, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_oversized_frame_ejects() {
        let mut config = test_config(0);
        config.security.max_string_length = 10;
        let (_server, addr) = start(config).await;
        let mut ws = connect(addr).await;

        send(&mut ws, json!({"object_id": SESSION_ROOT, "field": "login", "args": ["a_very_long_name", "pw"]})).await;
        expect_eject(&mut ws, 109).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_stops_accept_loop() {
        let server = Arc::new(GameServer::new(test_config(10)).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let running = server.clone();
        let handle = tokio::spawn(async move { running.serve(listener).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("Server did not stop")
            .expect("Server task panicked");
        assert!(result.is_ok());
    }
}
