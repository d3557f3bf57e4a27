use blindmatch_core::CiphertextHandle;
use blindmatch_server::config::Config;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct TestServer {
    pub url: String,
    #[allow(dead_code)]
    pub addr: SocketAddr,
}

impl TestServer {
    #[allow(dead_code)]
    pub async fn start() -> Self {
        Self::start_with(Config {
            port: 0, // OS assigns port
            ..Config::default()
        })
        .await
    }

    pub async fn start_with(config: Config) -> Self {
        let state = blindmatch_server::state::AppState::new(&config)
            .await
            .unwrap();
        let app = blindmatch_server::routes::router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            url: format!("http://{addr}"),
            addr,
        }
    }
}

fn handle(tag: u8, n: u8) -> String {
    let mut bytes = [n; 32];
    bytes[0] = tag;
    CiphertextHandle::from_bytes(bytes).to_base58()
}

#[allow(dead_code)]
pub fn paper_body(n: u8) -> Value {
    json!({
        "title": handle(b'T', n),
        "abstract": handle(b'A', n),
        "keywords": handle(b'K', n),
        "discipline": handle(b'D', n),
    })
}

#[allow(dead_code)]
pub fn reviewer_body(n: u8) -> Value {
    json!({
        "expertise": handle(b'E', n),
        "affiliation": handle(b'F', n),
        "publication_count": handle(b'P', n),
        "review_count": handle(b'R', n),
    })
}

/// Poll `url` until `done` accepts the JSON body of a 200 response
#[allow(dead_code)]
pub async fn wait_for(client: &reqwest::Client, url: &str, done: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..100 {
        let response = client.get(url).send().await.expect("Failed to send request");
        if response.status() == 200 {
            let body: Value = response.json().await.expect("Failed to parse JSON");
            if done(&body) {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting on {url}");
}
