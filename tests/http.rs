use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    current_rank: String,
    since_date: Option<String>,
    group_points: u32,
    private_points: u32,
    total_points: u32,
    required_for_next: Option<u32>,
    remaining: u32,
    next_rank: Option<String>,
    pending: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    profile: String,
    snapshot: Snapshot,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("belt_tracker_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/rules")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_belt_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn fetch_progress(client: &Client, base_url: &str, profile: &str) -> ProgressResponse {
    client
        .get(format!("{base_url}/api/profiles/{profile}/progress"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn post_json(client: &Client, url: String, body: Value) -> reqwest::Response {
    client.post(url).json(&body).send().await.unwrap()
}

#[tokio::test]
async fn http_fresh_profile_starts_at_white_belt() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let progress = fetch_progress(&client, &server.base_url, "fresh").await;
    assert_eq!(progress.profile, "fresh");
    assert_eq!(progress.snapshot.current_rank, "Blanche");
    assert_eq!(progress.snapshot.since_date, None);
    assert_eq!(progress.snapshot.total_points, 0);
    assert_eq!(progress.snapshot.required_for_next, Some(30));
    assert_eq!(progress.snapshot.remaining, 30);
    assert_eq!(progress.snapshot.next_rank.as_deref(), Some("Jaune"));
}

#[tokio::test]
async fn http_done_events_count_toward_progress() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let events_url = format!("{}/api/profiles/scoring/events", server.base_url);

    for body in [
        json!({ "date": "2024-01-05", "title": "Karaté Adultes", "type": "groupe", "status": "fait" }),
        json!({ "date": "2024-01-10", "title": "Cours privé", "type": "privé", "status": "fait" }),
        json!({ "date": "2024-01-12", "title": "Karaté Adultes", "type": "groupe" }),
    ] {
        let response = post_json(&client, events_url.clone(), body).await;
        assert!(response.status().is_success());
    }

    let progress = fetch_progress(&client, &server.base_url, "scoring").await;
    assert_eq!(progress.snapshot.group_points, 1);
    assert_eq!(progress.snapshot.private_points, 4);
    assert_eq!(progress.snapshot.total_points, 5);
    assert_eq!(progress.snapshot.remaining, 25);
}

#[tokio::test]
async fn http_status_change_marks_event_done() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let created: Value = post_json(
        &client,
        format!("{}/api/profiles/status/events", server.base_url),
        json!({ "date": "2024-02-01", "title": "Combat avancé", "type": "groupe" }),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(created["status"], "planifié");
    let id = created["id"].as_str().unwrap().to_string();

    let response = post_json(
        &client,
        format!("{}/api/profiles/status/events/{id}/status", server.base_url),
        json!({ "status": "fait" }),
    )
    .await;
    assert!(response.status().is_success());

    let progress = fetch_progress(&client, &server.base_url, "status").await;
    assert_eq!(progress.snapshot.group_points, 1);
}

#[tokio::test]
async fn http_invitation_toggle_is_idempotent() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let url = format!("{}/api/profiles/invite/invitation", server.base_url);

    for _ in 0..2 {
        let response = post_json(&client, url.clone(), json!({ "enabled": true })).await;
        assert!(response.status().is_success());
    }

    let ranks: Vec<Value> = client
        .get(format!("{}/api/profiles/invite/ranks", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ranks.len(), 1);
    assert_eq!(ranks[0]["isPending"], true);
    assert_eq!(ranks[0]["rank"], "Jaune");

    let progress = fetch_progress(&client, &server.base_url, "invite").await;
    assert!(progress.snapshot.pending.is_some());

    let response = post_json(&client, url, json!({ "enabled": false })).await;
    assert!(response.status().is_success());
    let progress = fetch_progress(&client, &server.base_url, "invite").await;
    assert!(progress.snapshot.pending.is_none());
}

#[tokio::test]
async fn http_confirmed_rank_resets_points() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = format!("{}/api/profiles/promoted", server.base_url);

    post_json(
        &client,
        format!("{base}/events"),
        json!({ "date": "2024-03-01", "title": "Karaté Adultes", "type": "groupe", "status": "fait" }),
    )
    .await;
    let response = post_json(
        &client,
        format!("{base}/ranks"),
        json!({ "rank": "Jaune", "date": "2024-03-10", "note": "Bon passage" }),
    )
    .await;
    assert!(response.status().is_success());

    let progress = fetch_progress(&client, &server.base_url, "promoted").await;
    assert_eq!(progress.snapshot.current_rank, "Jaune");
    assert_eq!(progress.snapshot.since_date.as_deref(), Some("2024-03-10"));
    assert_eq!(progress.snapshot.total_points, 0);
    assert_eq!(progress.snapshot.required_for_next, Some(40));
}

#[tokio::test]
async fn http_rejects_malformed_dates() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = post_json(
        &client,
        format!("{}/api/profiles/dates/events", server.base_url),
        json!({ "date": "05/01/2024", "type": "groupe" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &client,
        format!("{}/api/profiles/dates/invitation/date", server.base_url),
        json!({ "date": "2024-06-01" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_generate_month_does_not_duplicate() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let url = format!("{}/api/profiles/planner/calendar/generate", server.base_url);

    let first: Value = post_json(&client, url.clone(), json!({ "year": 2024, "month": 1 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["changed"], 22);

    let second: Value = post_json(&client, url, json!({ "year": 2024, "month": 1 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["changed"], 0);
}

#[tokio::test]
async fn http_rejects_unknown_status_values() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let events_url = format!("{}/api/profiles/strict/events", server.base_url);

    let response = post_json(
        &client,
        events_url.clone(),
        json!({ "date": "2024-02-01", "type": "groupe", "status": "done" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let created: Value = post_json(
        &client,
        events_url,
        json!({ "date": "2024-02-01", "title": "Karaté Adultes", "type": "groupe", "status": "fait" }),
    )
    .await
    .json()
    .await
    .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let response = post_json(
        &client,
        format!("{}/api/profiles/strict/events/{id}/status", server.base_url),
        json!({ "status": "done" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let progress = fetch_progress(&client, &server.base_url, "strict").await;
    assert_eq!(progress.snapshot.group_points, 1);
}

#[tokio::test]
async fn http_rules_accept_spaced_separator() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let url = format!("{}/api/rules", server.base_url);

    let original: serde_json::Map<String, Value> =
        client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(original.get("Blanche→Jaune"), Some(&json!(30)));

    let spaced: serde_json::Map<String, Value> = original
        .iter()
        .map(|(key, value)| (key.replace('→', " → "), value.clone()))
        .collect();
    let response = client.put(&url).json(&spaced).send().await.unwrap();
    assert!(response.status().is_success());

    let stored: serde_json::Map<String, Value> =
        client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(stored, original);
    assert!(stored.keys().all(|key| !key.contains(" → ")));
}

#[tokio::test]
async fn http_month_stats_count_done_events() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = format!("{}/api/profiles/monthly", server.base_url);

    for body in [
        json!({ "date": "2024-04-03", "title": "Karaté Adultes", "type": "groupe", "status": "fait" }),
        json!({ "date": "2024-04-10", "title": "Cours privé", "type": "privé", "status": "fait" }),
        json!({ "date": "2024-04-11", "title": "Armes 12+", "type": "arme", "status": "fait" }),
        json!({ "date": "2024-05-02", "title": "Karaté Adultes", "type": "groupe", "status": "fait" }),
    ] {
        let response = post_json(&client, format!("{base}/events"), body).await;
        assert!(response.status().is_success());
    }

    let stats: Value = client
        .get(format!("{base}/stats/month?month=2024-04"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["groupCount"], 1);
    assert_eq!(stats["privateCount"], 1);
    assert_eq!(stats["combatCount"], 1);
    assert_eq!(stats["totalPoints"], 5);

    let response = client
        .get(format!("{base}/stats/month?month=avril"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_sweep_marks_overdue_and_keeps_legacy_types() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = format!("{}/api/profiles/sweeper", server.base_url);

    post_json(
        &client,
        format!("{base}/events"),
        json!({ "date": "2020-01-02", "title": "Armes 12+", "type": "arme" }),
    )
    .await;

    let swept: Value = post_json(&client, format!("{base}/events/sweep"), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(swept["changed"], 1);

    let events: Vec<Value> = client
        .get(format!("{base}/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events[0]["status"], "non fait");
    assert_eq!(events[0]["type"], "arme");
}

#[tokio::test]
async fn http_serves_planning_and_progress_page() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let planning: Vec<Value> = client
        .get(format!("{}/api/planning", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(planning.len(), 3);
    assert_eq!(planning[0]["day"], "Lundi");

    let page = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Ceinture Blanche"));
    assert!(!page.contains("{{"));
}
