use scan_engine::{
    init_logging, Condition, DynamicValues, EngineError, ExecuterOptions, Extractor, InternalWrappedEvent,
    LoggingConfig, Matcher, NetworkInput, NetworkRequest, Operators, ProtocolRequest, Value,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one connection per accept: reads a request chunk, then replies
async fn spawn_service<F>(reply: F) -> String
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let reply = std::sync::Arc::new(reply);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let reply = reply.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let _ = socket.write_all(&reply(&buf[..n])).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr.to_string()
}

fn fast_options() -> ExecuterOptions {
    let mut options = ExecuterOptions::new("net-template");
    options.network.drain_delay_ms = 50;
    options.network.read_all_window_ms = 300;
    options
}

async fn run(mut request: NetworkRequest, options: &ExecuterOptions, input: &str) -> (Result<(), EngineError>, Vec<InternalWrappedEvent>) {
    init_logging(&LoggingConfig::default()).unwrap();
    request.compile(options).unwrap();
    let mut events = Vec::new();
    let result = request
        .execute_with_results(input, &DynamicValues::new(), &mut |event| events.push(event))
        .await;
    (result, events)
}

#[tokio::test]
async fn test_banner_grab_with_read_all() {
    let address = spawn_service(|_| b"SSH-2.0-OpenSSH_8.9\r\n".to_vec()).await;

    let mut request = NetworkRequest::new(&["{{Hostname}}"], vec![NetworkInput::text("\r\n")]).with_operators(
        Operators::new(
            vec![Matcher::words(&["OpenSSH"])],
            vec![Extractor::regex("version", &[r"SSH-([0-9.]+)-"], 1)],
        ),
    );
    request.read_all = true;

    let (result, events) = run(request, &fast_options(), &address).await;
    assert!(result.is_ok());
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.internal_event.get("data"), Some("SSH-2.0-OpenSSH_8.9\r\n"));
    assert_eq!(event.internal_event.get("request"), Some("\r\n"));

    assert_eq!(event.results.len(), 1);
    let result = &event.results[0];
    assert_eq!(result.extractor_name.as_deref(), Some("version"));
    assert_eq!(result.extracted_results, vec!["2.0".to_string()]);
    assert_eq!(result.template_id, "net-template");
    assert_eq!(result.matched, address);
    assert_eq!(result.ip, "127.0.0.1");
}

#[tokio::test]
async fn test_and_condition_requires_every_matcher() {
    let address = spawn_service(|request| {
        if request == b"PING\r\n" {
            b"PONG".to_vec()
        } else {
            b"ERR".to_vec()
        }
    })
    .await;

    let operators = Operators::new(vec![Matcher::words(&["PONG"]), Matcher::words(&["absent"])], vec![])
        .with_condition(Condition::And);
    let request = NetworkRequest::new(&["{{Hostname}}"], vec![NetworkInput::hex("50494e470d0a")]).with_operators(operators);

    let (result, events) = run(request, &fast_options(), &address).await;
    assert!(result.is_ok());
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_vars_payload_overrides_template_payloads() {
    let address = spawn_service(|request| {
        let text = String::from_utf8_lossy(request).to_string();
        format!("hello {}", text.trim()).into_bytes()
    })
    .await;

    let template = serde_json::json!({
        "host": ["{{Hostname}}"],
        "payloads": { "user": ["root", "admin"] },
        "inputs": [ { "data": "{{user}}\r\n" } ],
        "matchers": [ { "type": "regex", "regex": ["^hello [a-z]+$"], "name": "greeted" } ]
    });
    let request: NetworkRequest = serde_json::from_value(template).unwrap();

    let mut options = fast_options();
    options.vars_payload.insert("user".to_string(), Value::from("guest"));

    let (result, events) = run(request, &options, &address).await;
    assert!(result.is_ok());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].internal_event.get("data"), Some("hello guest"));

    let result = &events[0].results[0];
    assert_eq!(result.matcher_name.as_deref(), Some("greeted"));
    assert_eq!(result.metadata.get("user").map(String::as_str), Some("guest"));
}

#[tokio::test]
async fn test_missing_port_is_configuration_error() {
    let request = NetworkRequest::new(&["{{Host}}"], vec![NetworkInput::text("x")]);
    let (result, events) = run(request, &fast_options(), "127.0.0.1:7").await;
    let err = result.unwrap_err();
    assert!(!err.is_recoverable());
    assert!(events.is_empty());
}
