#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aria_config::ApiConfig;
    use aria_core::{ToolArgs, ToolDefinition, ToolRegistry, tool_fn};
    use aria_llm::mock::MockProvider;
    use aria_runtime::{AgentSettings, Orchestrator};
    use aria_server::{ApiServer, build_router};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    // ── Fixtures ───────────────────────────────────────────────

    fn orchestrator(mock: MockProvider) -> Arc<Orchestrator> {
        let mut registry = ToolRegistry::new().with_rate_limit(5);
        registry
            .register(
                ToolDefinition::new("read_screen", "Read the screen", json!({"type": "object"})),
                tool_fn(|_: ToolArgs| async { Ok("Messages app, 3 unread".to_string()) }),
            )
            .unwrap();
        let settings = AgentSettings {
            model: "mock-model".into(),
            ..AgentSettings::default()
        };
        Arc::new(Orchestrator::new(Arc::new(mock), Arc::new(registry), settings))
    }

    fn app(mock: MockProvider) -> (axum::Router, Arc<Orchestrator>) {
        let orchestrator = orchestrator(mock);
        (build_router(Arc::clone(&orchestrator), &ApiConfig::default()), orchestrator)
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::post("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ── Health & status ────────────────────────────────────────

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app(MockProvider::new("mock"));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_status_reports_tools_and_usage() {
        let mock = MockProvider::new("mock")
            .with_tool_call("read_screen", json!({}))
            .with_response("3 unread messages.");
        let (app, _) = app(mock);

        let resp = app
            .clone()
            .oneshot(post_chat(json!({"message": "anything new?", "session_id": "ui"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["status"], "running");
        assert_eq!(json["model"], "mock-model");
        assert_eq!(json["active_tools"], json!(["read_screen"]));
        assert_eq!(json["tool_calls_last_minute"]["read_screen"], 1);
        assert_eq!(json["tool_rate_limit_per_minute"], 5);
        assert_eq!(json["sessions"], 1);
        assert_eq!(json["requests_served"], 1);
    }

    // ── Chat ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_chat_runs_the_agent_loop() {
        let mock = MockProvider::new("mock")
            .with_tool_call("read_screen", json!({}))
            .with_response("You have 3 unread messages.");
        let (app, orchestrator) = app(mock);

        let resp = app
            .oneshot(post_chat(json!({"message": "check messages", "session_id": "ui"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["response"], "You have 3 unread messages.");
        assert_eq!(json["session_id"], "ui");
        assert_eq!(json["is_error"], false);
        assert_eq!(json["model_calls"], 2);
        assert_eq!(json["tool_calls"], 1);
        assert_eq!(json["tokens_used"], 300);

        let session = orchestrator.sessions().get("ui").await.unwrap();
        assert_eq!(session.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_chat_keeps_history_per_session() {
        let mock = MockProvider::new("mock").with_response("Hi!").with_response("Still here.");
        let requests = mock.recorded_requests();
        let (app, _) = app(mock);

        for text in ["hello", "are you there?"] {
            let resp = app
                .clone()
                .oneshot(post_chat(json!({"message": text, "session_id": "kitchen"})))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let requests = requests.lock();
        assert_eq!(requests[0].turns.len(), 1);
        assert_eq!(requests[1].turns.len(), 3);
    }

    #[tokio::test]
    async fn test_chat_without_session_gets_a_fresh_one() {
        let (app, _) = app(MockProvider::new("mock").with_response("ok"));
        let resp = app.oneshot(post_chat(json!({"message": "hi"}))).await.unwrap();
        let json = body_json(resp).await;
        let id = json["session_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (app, orchestrator) = app(MockProvider::new("mock"));
        let resp = app
            .oneshot(post_chat(json!({"message": "   ", "session_id": "ui"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "message is empty");
        assert_eq!(orchestrator.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_client_error() {
        let (app, _) = app(MockProvider::new("mock"));
        let req = Request::post("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{\"text\": 1}"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_llm_failure_is_a_bad_gateway() {
        let (app, _) = app(MockProvider::new("mock").with_error("HTTP 529: overloaded"));
        let resp = app
            .oneshot(post_chat(json!({"message": "hi", "session_id": "ui"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp).await;
        assert_eq!(json["is_error"], true);
        assert!(json["response"].as_str().unwrap().contains("overloaded"));
    }

    // ── Sessions ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_session() {
        let (app, orchestrator) = app(MockProvider::new("mock").with_response("ok"));
        app.clone()
            .oneshot(post_chat(json!({"message": "hi", "session_id": "ui"})))
            .await
            .unwrap();

        let del = || Request::delete("/sessions/ui").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(del()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(orchestrator.sessions().get("ui").await.is_none());

        let resp = app.oneshot(del()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // ── Listener ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_bound_server_answers_and_stops_on_cancel() {
        let config = ApiConfig {
            listen: "127.0.0.1:0".into(),
            cors: true,
        };
        let server = ApiServer::bind(&config, orchestrator(MockProvider::new("mock")))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(server.serve(cancel.clone()));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.contains("\"status\":\"ok\""));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_names_the_address() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ApiConfig {
            listen: taken.local_addr().unwrap().to_string(),
            cors: false,
        };
        let err = ApiServer::bind(&config, orchestrator(MockProvider::new("mock")))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains(&config.listen));
    }
}
