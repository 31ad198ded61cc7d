use std::time::Duration;

use tally_api::{ApiError, MetricsApi, MetricsServer};
use tally_prometheus::QueryMetrics;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type ServerTask = JoinHandle<Result<(), ApiError>>;

async fn start(metrics: QueryMetrics) -> (String, oneshot::Sender<()>, ServerTask) {
    let server = MetricsServer::bind("127.0.0.1:0", MetricsApi::new(metrics))
        .await
        .expect("bind ephemeral port");
    let base = format!("http://{}", server.local_addr());

    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = rx.await;
    }));
    (base, tx, task)
}

#[tokio::test]
async fn serves_current_samples() {
    let metrics = QueryMetrics::new().unwrap();
    metrics.set_count("users", "SELECT COUNT(*) FROM users", 17.0);
    let (base, stop, task) = start(metrics.clone()).await;

    let resp = reqwest::get(format!("{base}/metrics")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "{content_type}");

    let body = resp.text().await.unwrap();
    let sample = r#"mysql_query_exporter{name="users",query="SELECT COUNT(*) FROM users"} 17"#;
    assert!(body.contains(sample), "{body}");

    // Later writes are visible to the next scrape.
    metrics.set_count("users", "SELECT COUNT(*) FROM users", 18.0);
    let body = reqwest::get(format!("{base}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("} 18"));

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn other_paths_are_not_found() {
    let (base, stop, task) = start(QueryMetrics::new().unwrap()).await;

    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let (base, stop, task) = start(QueryMetrics::new().unwrap()).await;
    assert!(reqwest::get(format!("{base}/metrics")).await.is_ok());

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server must stop promptly")
        .unwrap()
        .unwrap();

    assert!(reqwest::get(format!("{base}/metrics")).await.is_err());
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let first = MetricsServer::bind("127.0.0.1:0", MetricsApi::new(QueryMetrics::new().unwrap()))
        .await
        .unwrap();
    let taken = first.local_addr().to_string();

    let err = MetricsServer::bind(&taken, MetricsApi::new(QueryMetrics::new().unwrap()))
        .await
        .err()
        .expect("port already in use");
    assert!(matches!(err, ApiError::Bind { ref addr, .. } if *addr == taken));
}
