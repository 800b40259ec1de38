//! Automation protocol integration tests: a real server on loopback TCP over an
//! in-memory UI source.

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use aria_core::AriaError;
    use aria_device::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio_util::sync::CancellationToken;

    // ── Fixtures ───────────────────────────────────────────────

    struct FakeSource {
        tree: Mutex<Option<UiNode>>,
        actions: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl FakeSource {
        fn new(tree: Option<UiNode>) -> Arc<Self> {
            Arc::new(Self {
                tree: Mutex::new(tree),
                actions: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        fn slow(tree: UiNode, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                tree: Mutex::new(Some(tree)),
                actions: Mutex::new(Vec::new()),
                delay: Some(delay),
            })
        }

        fn actions(&self) -> Vec<String> {
            self.actions.lock().clone()
        }
    }

    #[async_trait]
    impl UiSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn foreground(&self) -> aria_core::Result<Option<UiNode>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.tree.lock().clone())
        }

        async fn perform_action(
            &self,
            index: usize,
            node: &UiNode,
            action: NodeAction,
        ) -> aria_core::Result<bool> {
            self.actions
                .lock()
                .push(format!("{index}:{}:{action:?}", node.class_name));
            Ok(true)
        }

        async fn global_action(&self, action: GlobalAction) -> aria_core::Result<bool> {
            self.actions.lock().push(format!("global:{}", action.as_str()));
            Ok(true)
        }

        async fn dispatch_gesture(&self, gesture: Gesture) -> aria_core::Result<bool> {
            self.actions.lock().push(format!("gesture:{gesture:?}"));
            Ok(true)
        }
    }

    /// 0 FrameLayout, 1 TextView "Inbox", 2 RecyclerView (scrollable),
    /// 3 Button "Compose", 4 EditText.
    fn chat_screen(input_focused: bool) -> UiNode {
        let mut input = UiNode::new("android.widget.EditText")
            .with_view_id("com.example.chat:id/input")
            .with_package("com.example.chat")
            .with_bounds(Bounds::new(0, 2200, 1080, 2300))
            .editable();
        if input_focused {
            input = input.focused();
        }
        UiNode::new("android.widget.FrameLayout")
            .with_package("com.example.chat")
            .with_bounds(Bounds::new(0, 0, 1080, 2400))
            .with_child(
                UiNode::new("android.widget.TextView")
                    .with_text("Inbox")
                    .with_package("com.example.chat")
                    .with_bounds(Bounds::new(0, 0, 1080, 120)),
            )
            .with_child(
                UiNode::new("androidx.recyclerview.widget.RecyclerView")
                    .with_package("com.example.chat")
                    .with_bounds(Bounds::new(0, 120, 1080, 2200))
                    .scrollable()
                    .with_child(
                        UiNode::new("android.widget.Button")
                            .with_text("Compose")
                            .with_view_id("com.example.chat:id/compose")
                            .with_package("com.example.chat")
                            .with_bounds(Bounds::new(800, 2000, 1040, 2150))
                            .clickable(),
                    ),
            )
            .with_child(input)
    }

    async fn start_server(handle: UiSourceHandle, timeout: Duration) -> (SocketAddr, CancellationToken) {
        let dispatcher = CommandDispatcher::new(handle)
            .with_service_name("aria-test")
            .with_command_timeout(timeout);
        let server = AutomationServer::bind("127.0.0.1:0", Arc::new(dispatcher))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(server.serve(cancel.clone()));
        (addr, cancel)
    }

    async fn serve_fake(source: Arc<FakeSource>) -> (SocketAddr, CancellationToken) {
        start_server(UiSourceHandle::bound(source), Duration::from_secs(5)).await
    }

    struct Conn {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl Conn {
        async fn open(addr: SocketAddr) -> Self {
            let (r, w) = TcpStream::connect(addr).await.unwrap().into_split();
            Self {
                reader: BufReader::new(r),
                writer: w,
            }
        }

        async fn send_raw(&mut self, line: &str) -> Value {
            self.send_bytes(line.as_bytes()).await
        }

        async fn send_bytes(&mut self, line: &[u8]) -> Value {
            self.writer.write_all(line).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            let mut reply = String::new();
            tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut reply))
                .await
                .expect("response in time")
                .unwrap();
            serde_json::from_str(&reply).unwrap()
        }

        async fn call(&mut self, method: &str, params: Value) -> Value {
            let line = json!({ "method": method, "params": params }).to_string();
            self.send_raw(&line).await
        }
    }

    // ── Shapes ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_ping() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.send_raw(r#"{"method":"ping"}"#).await;
        assert_eq!(
            resp,
            json!({"success": true, "result": {"status": "ok", "service": "aria-test"}})
        );
    }

    #[tokio::test]
    async fn test_screen_elements_shape_and_order() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let mut conn = Conn::open(addr).await;

        let first = conn.call("get_screen_elements", json!({})).await;
        assert_eq!(first["success"], true);
        let elements = first["result"].as_array().unwrap();
        assert_eq!(elements.len(), 5);

        let compose = &elements[3];
        assert_eq!(compose["text"], "Compose");
        assert_eq!(compose["className"], "android.widget.Button");
        assert_eq!(compose["viewId"], "com.example.chat:id/compose");
        assert_eq!(compose["packageName"], "com.example.chat");
        assert_eq!(compose["isClickable"], true);
        assert_eq!(compose["isEnabled"], true);
        assert_eq!(compose["bounds"], json!({"left": 800, "top": 2000, "right": 1040, "bottom": 2150}));
        assert_eq!(elements[2]["childCount"], 1);
        assert!(compose["nodeId"].is_u64());

        // An unchanged tree lists identically except for identity.
        let second = conn.call("get_screen_elements", json!({})).await;
        let strip = |v: &Value| {
            v.as_array()
                .unwrap()
                .iter()
                .map(|e| {
                    let mut e = e.clone();
                    e.as_object_mut().unwrap().remove("nodeId");
                    e
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first["result"]), strip(&second["result"]));
        assert_ne!(first["result"][3]["nodeId"], second["result"][3]["nodeId"]);
    }

    #[tokio::test]
    async fn test_screen_text_and_focused_app() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let mut conn = Conn::open(addr).await;

        let text = conn.call("get_screen_text", json!({})).await;
        assert_eq!(text["result"], json!({"text": "Inbox\nCompose"}));

        let app = conn.call("get_focused_app", json!({})).await;
        assert_eq!(app["result"], json!({"package": "com.example.chat"}));
    }

    #[tokio::test]
    async fn test_find_by_text_and_id() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let mut conn = Conn::open(addr).await;

        let by_text = conn.call("find_element_by_text", json!({"text": "compo"})).await;
        let found = by_text["result"].as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["text"], "Compose");

        let by_id = conn.call("find_element_by_id", json!({"id": "input"})).await;
        assert_eq!(by_id["result"].as_array().unwrap().len(), 1);
        assert_eq!(by_id["result"][0]["isEditable"], true);

        let none = conn.call("find_element_by_text", json!({"text": "nothing here"})).await;
        assert_eq!(none, json!({"success": true, "result": []}));

        let missing = conn.call("find_element_by_text", json!({})).await;
        assert_eq!(missing, json!({"success": false, "error": "missing required param: text"}));
    }

    // ── Node actions ───────────────────────────────────────────

    #[tokio::test]
    async fn test_tap_element_resolves_latest_snapshot() {
        let source = FakeSource::new(Some(chat_screen(false)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;

        let listing = conn.call("get_screen_elements", json!({})).await;
        let id = listing["result"][3]["nodeId"].clone();
        let tapped = conn.call("tap_element", json!({"nodeId": id})).await;
        assert_eq!(tapped, json!({"success": true, "result": {"clicked": true}}));
        assert_eq!(source.actions(), vec!["3:android.widget.Button:Click"]);

        // Numeric strings are accepted too.
        let id_text = id.as_u64().unwrap().to_string();
        let again = conn.call("tap_element", json!({"nodeId": id_text})).await;
        assert_eq!(again["success"], true);
    }

    #[tokio::test]
    async fn test_stale_identity_is_rejected() {
        let source = FakeSource::new(Some(chat_screen(false)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;

        let old = conn.call("get_screen_elements", json!({})).await;
        let _fresh = conn.call("get_screen_elements", json!({})).await;
        let old_id = old["result"][3]["nodeId"].as_u64().unwrap();

        let resp = conn.call("tap_element", json!({"nodeId": old_id})).await;
        assert_eq!(
            resp,
            json!({"success": false, "error": format!("Node not found with id: {old_id}")})
        );
        assert!(source.actions().is_empty());
    }

    #[tokio::test]
    async fn test_changed_tree_is_rejected() {
        let source = FakeSource::new(Some(chat_screen(false)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;

        let listing = conn.call("get_screen_elements", json!({})).await;
        let id = listing["result"][3]["nodeId"].as_u64().unwrap();

        // The button moved between the listing and the tap.
        *source.tree.lock() = Some({
            let mut tree = chat_screen(false);
            tree.children[1].children[0].bounds = Bounds::new(0, 0, 10, 10);
            tree
        });
        let resp = conn.call("tap_element", json!({"nodeId": id})).await;
        assert_eq!(resp["error"], format!("Node not found with id: {id}"));
    }

    #[tokio::test]
    async fn test_unknown_node_id() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.call("tap_element", json!({"nodeId": 12345})).await;
        assert_eq!(
            resp,
            json!({"success": false, "error": "Node not found with id: 12345"})
        );

        let missing = conn.call("tap_element", json!({})).await;
        assert_eq!(missing["error"], "missing required param: nodeId");
    }

    #[tokio::test]
    async fn test_type_text_needs_focused_input() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.call("type_text", json!({"text": "hello"})).await;
        assert_eq!(
            resp,
            json!({"success": false, "error": "No focused input field found"})
        );

        let source = FakeSource::new(Some(chat_screen(true)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.call("type_text", json!({"text": "hello"})).await;
        assert_eq!(resp["result"], json!({"typed": true, "text": "hello"}));
        assert_eq!(
            source.actions(),
            vec![r#"4:android.widget.EditText:SetText("hello")"#]
        );
    }

    #[tokio::test]
    async fn test_scroll_defaults_to_first_scrollable() {
        let source = FakeSource::new(Some(chat_screen(false)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;

        let fwd = conn.call("scroll_forward", json!({})).await;
        assert_eq!(fwd["result"], json!({"scrolled": true, "direction": "forward"}));
        let back = conn.call("scroll_backward", json!({})).await;
        assert_eq!(back["result"]["direction"], "backward");

        assert_eq!(
            source.actions(),
            vec![
                "2:androidx.recyclerview.widget.RecyclerView:ScrollForward",
                "2:androidx.recyclerview.widget.RecyclerView:ScrollBackward",
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_without_scrollables_targets_root() {
        let source = FakeSource::new(Some(UiNode::new("android.widget.FrameLayout")));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.call("scroll_forward", json!({})).await;
        assert_eq!(resp["success"], true);
        assert_eq!(source.actions(), vec!["0:android.widget.FrameLayout:ScrollForward"]);
    }

    // ── Gestures & global actions ──────────────────────────────

    #[tokio::test]
    async fn test_gestures_and_presses() {
        let source = FakeSource::new(Some(chat_screen(false)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let mut conn = Conn::open(addr).await;

        let tap = conn.call("tap_coords", json!({"x": 540, "y": 1200})).await;
        assert_eq!(tap["result"], json!({"tapped": true, "x": 540.0, "y": 1200.0}));

        let fractional = conn.call("tap_coords", json!({"x": 10.5, "y": 20.25, "extra": "ignored"})).await;
        assert_eq!(fractional["result"], json!({"tapped": true, "x": 10.5, "y": 20.25}));

        let not_numeric = conn.call("tap_coords", json!({"x": "540", "y": 1200})).await;
        assert_eq!(not_numeric["error"], "missing required param: x");

        let swipe = conn
            .call("swipe", json!({"x1": 500, "y1": 1800, "x2": 500, "y2": 600}))
            .await;
        assert_eq!(swipe["result"], json!({"swiped": true}));

        let missing = conn.call("swipe", json!({"x1": 1, "y1": 2, "x2": 3})).await;
        assert_eq!(missing["error"], "missing required param: y2");

        for (method, action) in [
            ("press_back", "back"),
            ("press_home", "home"),
            ("press_recents", "recents"),
            ("press_notifications", "notifications"),
        ] {
            let resp = conn.call(method, json!({})).await;
            assert_eq!(resp["result"], json!({"action": action, "performed": true}));
        }

        let actions = source.actions();
        assert_eq!(actions[0], "gesture:Tap { x: 540.0, y: 1200.0 }");
        assert_eq!(actions[1], "gesture:Tap { x: 10.5, y: 20.25 }");
        assert!(actions[2].contains("duration_ms: 300"));
        assert_eq!(&actions[3..], &["global:back", "global:home", "global:recents", "global:notifications"]);
    }

    // ── Errors ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_unknown_method() {
        let (addr, _cancel) = serve_fake(FakeSource::new(None)).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.call("fly_to_moon", json!({})).await;
        assert_eq!(resp, json!({"success": false, "error": "unknown method: fly_to_moon"}));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_connection() {
        let (addr, _cancel) = serve_fake(FakeSource::new(None)).await;
        let mut conn = Conn::open(addr).await;

        let bad = conn.send_raw("{this is not json").await;
        assert_eq!(bad["success"], false);
        assert!(bad["error"].as_str().unwrap().starts_with("parse error: "));

        // Blank lines produce no response; the next request still gets one.
        conn.writer.write_all(b"\n   \n").await.unwrap();
        let ok = conn.send_raw(r#"{"method":"ping","params":{}}"#).await;
        assert_eq!(ok["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_connection() {
        let (addr, _cancel) = serve_fake(FakeSource::new(None)).await;
        let mut conn = Conn::open(addr).await;

        let bad = conn.send_bytes(b"{\"method\":\"\xff\xfe\"}").await;
        assert_eq!(bad, json!({"success": false, "error": "parse error: invalid UTF-8"}));

        let ok = conn.call("ping", json!({})).await;
        assert_eq!(ok["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_overlong_line_keeps_connection() {
        let dispatcher = CommandDispatcher::new(UiSourceHandle::new()).with_service_name("aria-test");
        let server = AutomationServer::bind("127.0.0.1:0", Arc::new(dispatcher))
            .await
            .unwrap()
            .with_max_line_bytes(256);
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(server.serve(cancel.clone()));

        let mut conn = Conn::open(addr).await;
        let filler = "x".repeat(10_000);
        let long = json!({"method": "type_text", "params": {"text": filler}}).to_string();
        let bad = conn.send_raw(&long).await;
        assert_eq!(bad, json!({"success": false, "error": "parse error: line too long"}));

        let ok = conn.call("ping", json!({})).await;
        assert_eq!(ok["result"]["service"], "aria-test");
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unbound_source() {
        let handle = UiSourceHandle::new();
        let (addr, _cancel) = start_server(handle.clone(), Duration::from_secs(5)).await;
        let mut conn = Conn::open(addr).await;

        // ping never needs the source.
        let ping = conn.call("ping", json!({})).await;
        assert_eq!(ping["success"], true);

        let resp = conn.call("get_screen_elements", json!({})).await;
        assert_eq!(
            resp,
            json!({"success": false, "error": "Accessibility service not connected"})
        );
        let resp = conn.call("press_back", json!({})).await;
        assert_eq!(resp["error"], "Accessibility service not connected");

        // Binding later makes the same connection usable.
        handle.bind(FakeSource::new(Some(chat_screen(false))));
        let resp = conn.call("get_screen_text", json!({})).await;
        assert_eq!(resp["success"], true);

        handle.unbind();
        assert!(!handle.is_bound());
        let resp = conn.call("get_screen_text", json!({})).await;
        assert_eq!(resp["error"], "Accessibility service not connected");
    }

    #[tokio::test]
    async fn test_no_active_window() {
        let (addr, _cancel) = serve_fake(FakeSource::new(None)).await;
        let mut conn = Conn::open(addr).await;
        for method in ["get_screen_elements", "get_screen_text", "get_focused_app"] {
            let resp = conn.call(method, json!({})).await;
            assert_eq!(resp, json!({"success": false, "error": "No active window"}));
        }
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let source = FakeSource::slow(chat_screen(false), Duration::from_millis(500));
        let (addr, _cancel) =
            start_server(UiSourceHandle::bound(source), Duration::from_millis(50)).await;
        let mut conn = Conn::open(addr).await;
        let resp = conn.call("get_screen_text", json!({})).await;
        assert_eq!(
            resp,
            json!({"success": false, "error": "command timed out: get_screen_text"})
        );
        // ping does not touch the source and still answers.
        let ping = conn.call("ping", json!({})).await;
        assert_eq!(ping["success"], true);
    }

    // ── Concurrency & lifecycle ────────────────────────────────

    #[tokio::test]
    async fn test_concurrent_pings() {
        let (addr, _cancel) = serve_fake(FakeSource::new(None)).await;
        let mut a = Conn::open(addr).await;
        let mut b = Conn::open(addr).await;
        let (ra, rb) = futures::join!(
            a.call("ping", json!({})),
            b.call("ping", json!({}))
        );
        assert_eq!(ra["result"]["status"], "ok");
        assert_eq!(rb["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_cancel_stops_server() {
        let handle = UiSourceHandle::new();
        let dispatcher = Arc::new(CommandDispatcher::new(handle));
        let server = AutomationServer::bind("127.0.0.1:0", dispatcher).await.unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(server.serve(cancel.clone()));
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server stops")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_transport_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let dispatcher = Arc::new(CommandDispatcher::new(UiSourceHandle::new()));
        let err = AutomationServer::bind(&addr, dispatcher).await.err().unwrap();
        assert!(matches!(err, AriaError::Transport(_)));
    }

    // ── Client ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_client_typed_calls() {
        let source = FakeSource::new(Some(chat_screen(true)));
        let (addr, _cancel) = serve_fake(Arc::clone(&source)).await;
        let client = AutomationClient::new(addr.to_string());

        let ping = client.ping().await.unwrap();
        assert_eq!(ping["service"], "aria-test");
        assert!(client.is_connected().await);

        let elements = client.screen_elements().await.unwrap();
        assert_eq!(elements.len(), 5);
        assert_eq!(elements[3].label(), "Compose");
        assert!(client.tap_element(elements[3].node_id).await.unwrap());

        assert_eq!(client.screen_text().await.unwrap(), "Inbox\nCompose");
        assert_eq!(client.focused_app().await.unwrap(), "com.example.chat");
        assert_eq!(client.find_by_id("compose").await.unwrap().len(), 1);
        assert!(client.type_text("hi").await.unwrap());
        assert!(client.press(GlobalAction::Home).await.unwrap());
        assert!(client.scroll(true, None).await.unwrap());
        assert!(client.swipe(1.0, 2.0, 3.0, 4.0, 100).await.unwrap());
        assert!(client.tap_coords(10.0, 20.0).await.unwrap());
    }

    #[tokio::test]
    async fn test_client_surfaces_command_errors() {
        let (addr, _cancel) = serve_fake(FakeSource::new(Some(chat_screen(false)))).await;
        let client = AutomationClient::new(addr.to_string());

        let err = client.tap_element(NodeId::new(9, 9)).await.unwrap_err();
        match err {
            AriaError::Automation { method, reason } => {
                assert_eq!(method, "tap_element");
                assert_eq!(reason, format!("Node not found with id: {}", NodeId::new(9, 9)));
            }
            other => panic!("unexpected error: {other}"),
        }
        // A command error keeps the connection.
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_client_reconnects_after_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // First connection: read the request and hang up without answering.
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let _ = lines.next_line().await;
            drop(lines);

            // Second connection: answer properly.
            let (stream, _) = listener.accept().await.unwrap();
            let (r, mut w) = stream.into_split();
            let mut lines = BufReader::new(r).lines();
            while let Ok(Some(_)) = lines.next_line().await {
                w.write_all(b"{\"success\":true,\"result\":{\"status\":\"ok\",\"service\":\"second\"}}\n")
                    .await
                    .unwrap();
            }
        });

        let client = AutomationClient::new(addr.to_string());
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, AriaError::Transport(_)));
        assert!(!client.is_connected().await);

        let ok = client.ping().await.unwrap();
        assert_eq!(ok["service"], "second");
    }

    #[tokio::test]
    async fn test_client_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AutomationClient::new(addr.to_string())
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, AriaError::Transport(_)));
    }
}
