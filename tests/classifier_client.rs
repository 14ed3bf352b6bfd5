use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tx_sentry::{
    classifier::{
        http::{endpoint_url, HttpClassifier},
        ClassificationRequest, ClassificationResult, Classifier, ClassifyError, Label,
        PredictResponse, FEATURE_COLUMNS,
    },
    config::Config,
    record::RawRecord,
};

fn cfg_for(base_url: &str) -> Config {
    let mut cfg = Config::default();
    cfg.classifier.base_url = base_url.to_string();
    cfg.classifier.timeout_seconds = 5;
    cfg
}

/// Serves one canned HTTP response and hands back the request body it received.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let request_body = loop {
            let n = sock.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let headers = text[..split].to_ascii_lowercase();
                let len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let body = &text[split + 4..];
                if body.len() >= len || n == 0 {
                    break body.to_string();
                }
            } else if n == 0 {
                break String::new();
            }
        };
        let response = format!(
            "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        request_body
    });
    (format!("http://{addr}"), handle)
}

fn sample_row() -> RawRecord {
    let mut row = RawRecord::new();
    for (i, (_, column)) in FEATURE_COLUMNS.iter().enumerate() {
        row.insert(*column, format!("{}", i + 1));
    }
    row.insert("Sent tnx", "not-a-number");
    row
}

#[test]
fn request_uses_wire_keys_and_zero_defaults() {
    let full = sample_row();
    let row = RawRecord::from_pairs(
        FEATURE_COLUMNS
            .iter()
            .filter(|(_, c)| *c != "avg val sent")
            .map(|(_, c)| (*c, full.get(c).unwrap_or_default().to_string())),
    );

    let req = ClassificationRequest::from_record(&row);
    assert_eq!(req.avg_min_between_sent_tnx, 1.0);
    assert_eq!(req.sent_tnx, 0.0);
    assert_eq!(req.avg_val_sent, 0.0);
    assert_eq!(req.erc20_total_ether_sent_contract, 14.0);

    let json = serde_json::to_value(&req).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 14);
    for (key, _) in FEATURE_COLUMNS {
        assert!(obj.contains_key(key), "missing wire key {key}");
    }
}

#[test]
fn set_rejects_unknown_feature() {
    let mut req = ClassificationRequest::default();
    req.set("total_ether_balance", 2.5).unwrap();
    assert_eq!(req.total_ether_balance, 2.5);
    assert!(req.set("balance", 1.0).is_err());
}

#[test]
fn response_is_normalized() {
    let r: ClassificationResult = PredictResponse {
        prediction: serde_json::json!("fraud"),
        probability: 130.0,
    }
    .into();
    assert_eq!(r.label, Label::Fraud);
    assert_eq!(r.probability, 100.0);

    let r: ClassificationResult = PredictResponse {
        prediction: serde_json::json!("Legitimate"),
        probability: -3.0,
    }
    .into();
    assert_eq!(r.label, Label::Legitimate);
    assert_eq!(r.probability, 0.0);

    let r: ClassificationResult = PredictResponse {
        prediction: serde_json::json!(1),
        probability: 55.5,
    }
    .into();
    assert_eq!(r.label, Label::Fraud);
    assert_eq!(r.probability, 55.5);
}

#[test]
fn endpoint_joins_base_and_path() {
    assert_eq!(endpoint_url("http://h:5000/", "/predict"), "http://h:5000/predict");
    assert_eq!(endpoint_url("http://h:5000", "predict"), "http://h:5000/predict");
    assert_eq!(endpoint_url("http://h", ""), "http://h");
}

#[tokio::test]
async fn successful_call_posts_features() {
    let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"prediction":"fraud","probability":91.25}"#).await;
    let client = HttpClassifier::new(&cfg_for(&base)).unwrap();

    let result = client
        .classify(&sample_row(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.label, Label::Fraud);
    assert_eq!(result.probability, 91.25);

    let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(body["avg_min_between_sent_tnx"], 1.0);
    assert_eq!(body["sent_tnx"], 0.0);
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let (base, server) = serve_once("HTTP/1.1 500 Internal Server Error", r#"{"error":"model offline"}"#).await;
    let client = HttpClassifier::new(&cfg_for(&base)).unwrap();

    let err = client
        .classify(&sample_row(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ClassifyError::Transport {
            status: Some(500),
            message: "model offline".into(),
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let client = HttpClassifier::new(&cfg_for(&format!("http://127.0.0.1:{port}"))).unwrap();

    let err = client
        .classify(&sample_row(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifyError::Transport { status: None, .. }));
}

#[tokio::test]
async fn signalled_token_short_circuits() {
    let client = HttpClassifier::new(&cfg_for("http://127.0.0.1:9")).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client.classify(&sample_row(), &cancel).await.unwrap_err();
    assert_eq!(err, ClassifyError::Cancelled);
}

#[tokio::test]
async fn cancel_while_request_is_pending() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (_sock, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });

    let client = HttpClassifier::new(&cfg_for(&format!("http://{addr}"))).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = client.classify(&sample_row(), &cancel).await.unwrap_err();
    assert_eq!(err, ClassifyError::Cancelled);
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    server.abort();
}
