//! HTTP API over a live listener.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Query;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use e2ee_core::testing::{MockHost, ScriptedStore};
use e2ee_plugin::api::USER_ID_HEADER;
use e2ee_plugin::{server, Plugin, PluginConfig};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand_core::OsRng;
use reqwest::StatusCode;
use serde_json::{json, Value};

const ARMORED: &str =
    "-----BEGIN PGP PUBLIC KEY BLOCK-----\nmQENBGAAAAAB\n-----END PGP PUBLIC KEY BLOCK-----";

fn random_point() -> Vec<u8> {
    SecretKey::random(&mut OsRng)
        .public_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec()
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn key_server() -> String {
    async fn lookup(Query(params): Query<HashMap<String, String>>) -> String {
        match params.get("op").map(String::as_str) {
            Some("index") => "info:1:1\npub:0123456789ABCDEF:1:4096:1000::\n".to_string(),
            _ => format!("<pre>{ARMORED}</pre>"),
        }
    }
    serve(Router::new().route("/pks/lookup", get(lookup))).await
}

struct TestApi {
    base: String,
    client: reqwest::Client,
    host: Arc<MockHost>,
}

impl TestApi {
    async fn start() -> Self {
        let config = PluginConfig {
            gpg_key_server: key_server().await,
            ..Default::default()
        };
        let host = Arc::new(MockHost::new());
        for user in ["alice", "bob"] {
            host.add_user(user, user);
            host.add_member("chan", user);
        }
        let store = Arc::new(ScriptedStore::new());
        let plugin = Arc::new(Plugin::new(config, store, host.clone()).unwrap());
        plugin.activate().await.unwrap();

        Self {
            base: serve(server::app(plugin)).await,
            client: reqwest::Client::new(),
            host,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base, path)
    }

    fn get(&self, user: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header(USER_ID_HEADER, user)
    }

    fn post(&self, user: &str, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header(USER_ID_HEADER, user)
    }
}

#[tokio::test]
async fn health_needs_no_auth() {
    let api = TestApi::start().await;
    let resp = api
        .client
        .get(format!("{}/health", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let api = TestApi::start().await;

    let resp = api
        .client
        .get(api.url("/channel/encryption_method?chanID=chan"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.text().await.unwrap(), "Not authorized");

    let resp = api
        .client
        .post(api.url("/pubkey/get"))
        .header(USER_ID_HEADER, "")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn push_and_fetch_keys() {
    let api = TestApi::start().await;
    let (encr, sign) = (random_point(), random_point());

    let resp = api
        .post("alice", "/pubkey/push")
        .json(&json!({
            "pubkey": { "encr": STANDARD.encode(&encr), "sign": STANDARD.encode(&sign) },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = api
        .post("bob", "/pubkey/get")
        .json(&json!({ "userIds": ["alice", "bob"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["pubKeys"]["alice"]["encr"], STANDARD.encode(&encr));
    assert_eq!(body["pubKeys"]["alice"]["sign"], STANDARD.encode(&sign));
    assert!(body["pubKeys"]["bob"].is_null());
}

#[tokio::test]
async fn bad_pushes_are_rejected() {
    let api = TestApi::start().await;

    let resp = api
        .post("alice", "/pubkey/push")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let point = STANDARD.encode(random_point());
    let resp = api
        .post("alice", "/pubkey/push")
        .json(&json!({ "pubkey": { "encr": point, "sign": point } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "invalid elliptic curve key");
}

#[tokio::test]
async fn channel_encryption_method_round_trip() {
    let api = TestApi::start().await;

    let body: Value = api
        .get("alice", "/channel/encryption_method?chanID=chan")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "method": "none" }));

    let resp = api
        .post("alice", "/channel/encryption_method?chanID=chan&method=p2p")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = api
        .get("bob", "/channel/encryption_method?chanID=chan")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "method": "p2p" }));
    assert_eq!(api.host.posts().len(), 1);

    let resp = api
        .get("mallory", "/channel/encryption_method?chanID=chan")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gpg_pub_key_from_key_server() {
    let api = TestApi::start().await;

    let body: Value = api
        .get("alice", "/gpg/get_pub_key")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["key"], ARMORED);
}
