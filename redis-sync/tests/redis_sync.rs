//! End-to-end copies between two databases of a live Redis server.
//!
//! Run with `cargo test -- --ignored` and `REDIS_URL` pointing at a server
//! whose databases 14 and 15 may be written to.

use std::time::Duration;

use redis::AsyncCommands;
use redis_sync::{
    Endpoint, ErrorPolicy, ExistingKeyPolicy, RedisStore, StoreRole, SyncConfig, SyncError, SyncOptions,
    SyncRunner, TtlPolicy,
};
use serial_test::serial;

const SOURCE_DB: i64 = 14;
const DESTINATION_DB: i64 = 15;

// ============ Helpers ============

fn endpoint(db: i64) -> Endpoint {
    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let url = url::Url::parse(&redis_url).expect("REDIS_URL should be a valid URL");
    let host = url.host_str().unwrap_or("127.0.0.1").trim_matches(['[', ']']).to_string();
    let port = url.port().unwrap_or(6379);
    let password = url.password().map(|p| p.to_string());
    Endpoint::new(host, i64::from(port), db)
        .expect("test endpoint should be valid")
        .with_credentials(None, password)
}

async fn connect(role: StoreRole, db: i64) -> RedisStore {
    RedisStore::connect(role, &endpoint(db), Duration::from_secs(5))
        .await
        .expect("Failed to connect to Redis")
}

fn prefixed_options(prefix: &str) -> SyncOptions {
    SyncOptions {
        pattern: format!("{prefix}:*"),
        ..Default::default()
    }
}

async fn cleanup(store: &mut RedisStore, prefix: &str) {
    let mut cursor: u64 = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{prefix}:*"))
            .arg("COUNT")
            .arg(1000)
            .query_async(store.conn())
            .await
            .expect("scan should succeed");
        if !keys.is_empty() {
            let _: () = store.conn().del(keys).await.expect("del should succeed");
        }
        cursor = next;
        if cursor == 0 {
            break;
        }
    }
}

async fn seed(store: &mut RedisStore, prefix: &str) {
    let conn = store.conn();
    let _: () = conn.set(format!("{prefix}:user:1"), "alice").await.unwrap();
    let _: () = conn
        .set_ex(format!("{prefix}:session"), "token", 600)
        .await
        .unwrap();
    let _: () = conn.rpush(format!("{prefix}:list"), &["a", "b", "a"]).await.unwrap();
    let _: () = conn.sadd(format!("{prefix}:set"), &["red", "blue"]).await.unwrap();
    let _: () = conn
        .hset_multiple(format!("{prefix}:hash"), &[("name", "Alice"), ("age", "30")])
        .await
        .unwrap();
    let _: () = conn
        .zadd_multiple(format!("{prefix}:zset"), &[(1.5, "bob"), (2.0, "carol")])
        .await
        .unwrap();
    let _: String = redis::cmd("XADD")
        .arg(format!("{prefix}:stream"))
        .arg("1-1")
        .arg("kind")
        .arg("login")
        .query_async(conn)
        .await
        .unwrap();
}

// ============ Tests ============

#[tokio::test]
#[serial]
#[ignore = "requires a running redis at REDIS_URL"]
async fn test_copies_all_types_between_databases() {
    let prefix = format!("redis_sync_test_{}", uuid::Uuid::new_v4());
    let mut source = connect(StoreRole::Source, SOURCE_DB).await;
    let mut destination = connect(StoreRole::Destination, DESTINATION_DB).await;
    seed(&mut source, &prefix).await;

    let options = prefixed_options(&prefix);
    let report = SyncRunner::new(&mut source, &mut destination, &options)
        .run()
        .await
        .expect("sync should succeed");

    assert!(report.is_success());
    assert_eq!(report.copied, 7);

    let conn = destination.conn();
    let user: String = conn.get(format!("{prefix}:user:1")).await.unwrap();
    assert_eq!(user, "alice");

    let list: Vec<String> = conn.lrange(format!("{prefix}:list"), 0, -1).await.unwrap();
    assert_eq!(list, vec!["a", "b", "a"]);

    let mut set: Vec<String> = conn.smembers(format!("{prefix}:set")).await.unwrap();
    set.sort();
    assert_eq!(set, vec!["blue", "red"]);

    let name: String = conn.hget(format!("{prefix}:hash"), "name").await.unwrap();
    assert_eq!(name, "Alice");

    let zset: Vec<(String, f64)> = conn.zrange_withscores(format!("{prefix}:zset"), 0, -1).await.unwrap();
    assert_eq!(zset, vec![("bob".to_string(), 1.5), ("carol".to_string(), 2.0)]);

    let stream_len: usize = conn.xlen(format!("{prefix}:stream")).await.unwrap();
    assert_eq!(stream_len, 1);

    let ttl: i64 = conn.ttl(format!("{prefix}:session")).await.unwrap();
    assert!(ttl > 0 && ttl <= 600, "ttl was {ttl}");

    let persistent: i64 = conn.ttl(format!("{prefix}:user:1")).await.unwrap();
    assert_eq!(persistent, -1);

    cleanup(&mut source, &prefix).await;
    cleanup(&mut destination, &prefix).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running redis at REDIS_URL"]
async fn test_second_run_is_idempotent_and_overwrites_stale_members() {
    let prefix = format!("redis_sync_test_{}", uuid::Uuid::new_v4());
    let mut source = connect(StoreRole::Source, SOURCE_DB).await;
    let mut destination = connect(StoreRole::Destination, DESTINATION_DB).await;
    seed(&mut source, &prefix).await;

    // A stale member that is not in the source must not survive the copy.
    let _: () = destination
        .conn()
        .sadd(format!("{prefix}:set"), "stale")
        .await
        .unwrap();

    let options = prefixed_options(&prefix);
    for _ in 0..2 {
        SyncRunner::new(&mut source, &mut destination, &options)
            .run()
            .await
            .expect("sync should succeed");
    }

    let list: Vec<String> = destination.conn().lrange(format!("{prefix}:list"), 0, -1).await.unwrap();
    assert_eq!(list, vec!["a", "b", "a"]);

    let is_member: bool = destination
        .conn()
        .sismember(format!("{prefix}:set"), "stale")
        .await
        .unwrap();
    assert!(!is_member);

    cleanup(&mut source, &prefix).await;
    cleanup(&mut destination, &prefix).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running redis at REDIS_URL"]
async fn test_policies_against_live_server() {
    let prefix = format!("redis_sync_test_{}", uuid::Uuid::new_v4());
    let mut source = connect(StoreRole::Source, SOURCE_DB).await;
    let mut destination = connect(StoreRole::Destination, DESTINATION_DB).await;
    seed(&mut source, &prefix).await;
    let _: () = destination
        .conn()
        .set(format!("{prefix}:user:1"), "mallory")
        .await
        .unwrap();

    let options = SyncOptions {
        ttl: TtlPolicy::Drop,
        existing: ExistingKeyPolicy::Skip,
        on_error: ErrorPolicy::Abort,
        ..prefixed_options(&prefix)
    };
    let report = SyncRunner::new(&mut source, &mut destination, &options)
        .run()
        .await
        .expect("sync should succeed");

    assert_eq!(report.skipped, 1);
    assert_eq!(report.copied, 6);

    let user: String = destination.conn().get(format!("{prefix}:user:1")).await.unwrap();
    assert_eq!(user, "mallory");

    let ttl: i64 = destination.conn().ttl(format!("{prefix}:session")).await.unwrap();
    assert_eq!(ttl, -1);

    cleanup(&mut source, &prefix).await;
    cleanup(&mut destination, &prefix).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running redis at REDIS_URL"]
async fn test_unreachable_destination_fails_before_reading_source() {
    let prefix = format!("redis_sync_test_{}", uuid::Uuid::new_v4());
    let mut source = connect(StoreRole::Source, SOURCE_DB).await;
    seed(&mut source, &prefix).await;
    let ttl_before: i64 = source.conn().pttl(format!("{prefix}:session")).await.unwrap();

    // Nothing listens on port 1 of the loopback interface.
    let config = SyncConfig {
        source: endpoint(SOURCE_DB),
        destination: Endpoint::new("127.0.0.1", 1, DESTINATION_DB).unwrap(),
        options: prefixed_options(&prefix),
        connect_timeout: Duration::from_secs(2),
    };

    let err = redis_sync::sync(&config).await.unwrap_err();
    assert!(
        matches!(err, SyncError::Connection { role: StoreRole::Destination, .. }),
        "unexpected error: {err}"
    );

    // The source is left exactly as seeded.
    let user: String = source.conn().get(format!("{prefix}:user:1")).await.unwrap();
    assert_eq!(user, "alice");
    let list: Vec<String> = source.conn().lrange(format!("{prefix}:list"), 0, -1).await.unwrap();
    assert_eq!(list, vec!["a", "b", "a"]);
    let ttl_after: i64 = source.conn().pttl(format!("{prefix}:session")).await.unwrap();
    assert!(ttl_after > 0 && ttl_after <= ttl_before);

    cleanup(&mut source, &prefix).await;
}
