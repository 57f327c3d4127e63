use manga_vaani::endpoint::EndpointPool;
use manga_vaani::executor::{RequestSpec, RetryPolicy};
use manga_vaani::images;
use manga_vaani::requests::auth::{LoginRequest, RegisterRequest};
use manga_vaani::requests::{Error, ErrorKind, Result};
use manga_vaani::state::LoadState;
use manga_vaani::storage::{DataUsage, DeviceStore, Settings};
use manga_vaani::transport::{ApiResponse, Transport};
use manga_vaani::VaaniClient;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const LOOPBACK: &str = "http://localhost:5000/api";
const EMULATOR: &str = "http://10.0.2.2:5000/api";
const LAN: &str = "http://192.168.1.100:5000/api";

const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJpZCI6IjY1ZjBjMSJ9.sig";

/// Backend that is only reachable through one of the candidate urls
struct FakeBackend {
    reachable: &'static str,
    requests: AtomicUsize,
}

impl FakeBackend {
    fn new(reachable: &'static str) -> Self {
        Self {
            reachable,
            requests: AtomicUsize::new(0),
        }
    }

    fn route(&self, request: &RequestSpec) -> (u16, Value) {
        let user = json!({ "_id": "65f0c1", "name": "Asha", "email": "asha@example.com" });

        match (request.method().clone(), request.path()) {
            (Method::GET, "/manga/status") => (200, json!({ "success": true, "message": "API is running" })),
            (Method::GET, "/manga") => (
                200,
                json!({
                    "success": true,
                    "data": [{
                        "id": "csm",
                        "title": "Chainsaw Man",
                        "image": "https://uploads.mangadex.org/covers/csm/cover.jpg",
                        "chapter": "Chapter 170",
                        "view": "412.3K",
                        "description": "Denji has a simple dream."
                    }]
                }),
            ),
            (Method::GET, "/manga/csm") => (
                200,
                json!({
                    "success": true,
                    "data": {
                        "id": "csm",
                        "title": "Chainsaw Man",
                        "coverImageUrl": "https://uploads.mangadex.org/covers/csm/cover.jpg",
                        "author": "Fujimoto Tatsuki",
                        "status": "ongoing",
                        "year": 2018,
                        "tags": ["Action", "Gore"]
                    }
                }),
            ),
            (Method::GET, "/manga/csm/chapters") => (
                200,
                json!({
                    "success": true,
                    "data": [
                        { "id": "c1", "title": "Dog & Chainsaw", "number": "1", "publishDate": "2018-12-03", "volume": "1" },
                        { "id": "c2", "title": "The Place Where Pochita Is", "number": "2", "publishDate": "2018-12-10", "volume": "1" }
                    ]
                }),
            ),
            (Method::GET, "/manga/chapter/c2") => (
                200,
                json!({
                    "success": true,
                    "data": {
                        "chapterId": "c2",
                        "images": [
                            "https://uploads.example.org/data/HASH/page001.png",
                            "https://uploads.example.org/data/HASH/page002.png"
                        ]
                    }
                }),
            ),
            (Method::POST, "/auth/register") | (Method::POST, "/auth/login") => {
                (200, json!({ "success": true, "token": TOKEN, "user": user }))
            }
            (Method::GET, "/auth/profile") => {
                let bearer = format!("Bearer {TOKEN}");
                let authorized = request
                    .headers()
                    .iter()
                    .any(|(name, value)| name == "Authorization" && *value == bearer);

                if authorized {
                    (200, json!({ "success": true, "user": user }))
                } else {
                    (401, json!({ "success": false, "message": "Not authorized, token failed" }))
                }
            }
            _ => (404, json!({ "success": false, "message": "Manga not found" })),
        }
    }
}

impl Transport for FakeBackend {
    async fn send(&self, base_url: &str, request: &RequestSpec) -> Result<ApiResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if base_url != self.reachable {
            return Err(Error::NetworkUnavailable {
                endpoint: request.url(base_url),
                reason: "connection refused".to_owned(),
            });
        }

        let (status, body) = self.route(request);

        Ok(ApiResponse {
            endpoint: base_url.to_owned(),
            status: StatusCode::from_u16(status).expect("valid status"),
            body: Bytes::from(serde_json::to_vec(&body)?),
        })
    }
}

fn client(reachable: &'static str) -> VaaniClient<FakeBackend> {
    let pool = EndpointPool::new([LOOPBACK, EMULATOR, LAN]).unwrap();

    VaaniClient::with_transport(
        FakeBackend::new(reachable),
        Arc::new(pool),
        RetryPolicy::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_reader_flow_through_emulator_alias() {
    let client = client(EMULATOR);

    let mut list_state = LoadState::Idle;
    list_state.start();
    list_state.finish(client.list_manga(None).await);

    let list = list_state.data().expect("list loaded");
    assert_eq!(list[0].id, "csm");
    // the first call found the working endpoint, which stays selected
    assert_eq!(client.pool().current(), EMULATOR);

    let detail = client.get_manga_details(&list[0].id).await.unwrap();
    assert_eq!(detail.author, "Fujimoto Tatsuki");

    let chapters = client.get_manga_chapters("csm").await.unwrap();
    assert_eq!(chapters[0].id, "c2");

    let pages = client.get_chapter_images(&chapters[0].id).await.unwrap();
    assert_eq!(pages.page_count(), 2);

    // one refused attempt on loopback, then four calls on the emulator alias
    assert_eq!(client.executor().transport().requests.load(Ordering::SeqCst), 5);

    let settings = Settings {
        data_usage: DataUsage::Low,
        ..Settings::default()
    };
    let chain = images::fallback_chain(pages.page(1).unwrap(), settings.prefers_data_saver());
    assert_eq!(
        chain,
        [
            "https://uploads.example.org/data-saver/HASH/page001.png".to_owned(),
            images::page_placeholder(Some(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_shows_connectivity_failure() {
    let client = client("http://nowhere:5000/api");

    let mut state = LoadState::Idle;
    state.start();
    state.finish(client.get_manga_chapters("csm").await);

    let failure = state.failure().expect("call failed");
    assert!(failure.is_connectivity());
    assert_eq!(client.executor().transport().requests.load(Ordering::SeqCst), 3);
    assert_eq!(client.pool().current(), LAN);

    let (reachable, endpoint) = client.rotate_and_probe().await;
    assert!(!reachable);
    // back to loopback, then the probe rotated twice more while retrying
    assert_eq!(endpoint, LAN);
    assert_eq!(client.executor().transport().requests.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_the_pool() {
    let client = client(LAN);

    let (list, detail) = tokio::join!(client.list_manga(None), client.get_manga_details("csm"));

    // the list call fails on loopback and rotates to the emulator alias, the details call
    // then fails there and rotates again, so after the backoff both retry on the LAN address
    let list = list.unwrap();
    let detail = detail.unwrap();
    assert_eq!(list[0].id, detail.summary.id);

    assert_eq!(client.executor().transport().requests.load(Ordering::SeqCst), 4);
    assert_eq!(client.pool().index(), 2);
    assert_eq!(client.pool().current(), LAN);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_id_is_not_found_without_rotation() {
    let client = client(LOOPBACK);

    let err = client.get_manga_details("CSM").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(client.pool().index(), 0);
    assert_eq!(client.executor().transport().requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_flow_persists_session() {
    let client = client(LOOPBACK);
    let dir = tempfile::tempdir().unwrap();
    let store = DeviceStore::open(dir.path().join("device.json")).await.unwrap();

    let bad = RegisterRequest::builder()
        .name("Asha")
        .email("asha-at-example.com")
        .password("hunter22")
        .build();
    let err = client.register(&bad).await.unwrap_err();
    assert!(matches!(err, Error::ValidationError { field: "email", .. }));
    assert_eq!(client.executor().transport().requests.load(Ordering::SeqCst), 0);

    let session = client
        .register(
            &RegisterRequest::builder()
                .name("Asha")
                .email("asha@example.com")
                .password("hunter22")
                .build(),
        )
        .await
        .unwrap();
    store.save_session(&session).await.unwrap();

    let login = client
        .login(
            &LoginRequest::builder()
                .email("asha@example.com")
                .password("hunter22")
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(login.token, TOKEN);

    let restored = store.load_session().expect("session was saved");
    let user = client.profile(&restored.token).await.unwrap();
    assert_eq!(user.email, "asha@example.com");

    let err = client.profile("expired").await.unwrap_err();
    assert!(matches!(err, Error::UpstreamError { status: 401, .. }));
}
