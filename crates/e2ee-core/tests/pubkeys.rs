//! Public key and backup storage.

use std::sync::Arc;
use std::time::Duration;

use e2ee_core::pubkeys::{PubKeyError, PubKeyStore};
use e2ee_core::testing::{MockHost, ScriptedStore};
use e2ee_crypto::PubKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand_core::OsRng;

fn random_point() -> Vec<u8> {
    SecretKey::random(&mut OsRng)
        .public_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec()
}

fn valid_pubkey() -> PubKey {
    PubKey::new(random_point(), random_point())
}

fn pubkeys(store: &Arc<ScriptedStore>) -> PubKeyStore {
    PubKeyStore::new(store.clone(), Duration::from_secs(1))
}

#[tokio::test]
async fn set_then_get() {
    let store = Arc::new(ScriptedStore::new());
    let keys = pubkeys(&store);
    let pubkey = valid_pubkey();

    assert_eq!(keys.get("alice").await.unwrap(), None);
    assert!(!keys.has("alice").await.unwrap());

    keys.set("alice", &pubkey).await.unwrap();
    assert_eq!(keys.get("alice").await.unwrap(), Some(pubkey.clone()));
    assert!(keys.has("alice").await.unwrap());

    let raw = store.raw("pubkey:alice").await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert!(json.get("encr").is_some());
    assert!(json.get("sign").is_some());
}

#[tokio::test]
async fn corrupted_key_is_an_error() {
    let store = Arc::new(ScriptedStore::new());
    store.seed("pubkey:bob", b"{not json").await;
    let keys = pubkeys(&store);

    let err = keys.get("bob").await.unwrap_err();
    assert!(matches!(err, PubKeyError::Corrupted { ref user_id, .. } if user_id == "bob"));
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = Arc::new(ScriptedStore::new());
    store.fail_gets(true);
    let keys = pubkeys(&store);

    assert!(matches!(
        keys.get("alice").await,
        Err(PubKeyError::Store(_))
    ));
    assert!(keys.has("alice").await.is_err());
}

#[tokio::test]
async fn write_failure_propagates() {
    let store = Arc::new(ScriptedStore::new());
    store.fail_sets(true);
    let keys = pubkeys(&store);

    assert!(matches!(
        keys.set("alice", &valid_pubkey()).await,
        Err(PubKeyError::Store(_))
    ));
    assert_eq!(store.raw("pubkey:alice").await, None);
}

#[tokio::test]
async fn get_many_maps_missing_to_none() {
    let store = Arc::new(ScriptedStore::new());
    let keys = pubkeys(&store);
    let pubkey = valid_pubkey();
    keys.set("alice", &pubkey).await.unwrap();

    let found = keys
        .get_many(&["alice".to_string(), "bob".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["alice"], Some(pubkey));
    assert_eq!(found["bob"], None);
}

#[tokio::test]
async fn members_without_keys_in_listing_order() {
    let store = Arc::new(ScriptedStore::new());
    let keys = pubkeys(&store);
    let host = MockHost::new();
    for user in ["alice", "bob", "carol"] {
        host.add_user(user, user);
        host.add_member("chan", user);
    }
    keys.set("bob", &valid_pubkey()).await.unwrap();

    let missing = keys.members_without_keys(&host, "chan").await.unwrap();
    assert_eq!(missing, vec!["alice".to_string(), "carol".to_string()]);

    host.set_max_users_per_team(1);
    let missing = keys.members_without_keys(&host, "chan").await.unwrap();
    assert_eq!(missing, vec!["alice".to_string()]);
}
