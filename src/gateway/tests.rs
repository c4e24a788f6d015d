use super::*;
use crate::config::{CallerDriver, MailConfig, StoreConfig};
use crate::db::{audit, caller_log};
use crate::db::testing::{self, TestStores};
use crate::mail::testing::RecordingTransport;
use chrono::Duration as ChronoDuration;

struct Harness {
    stores: TestStores,
    transport: Arc<RecordingTransport>,
    gateway: Arc<MailGateway>,
}

impl Harness {
    async fn new() -> Self {
        let stores = testing::stores().await;
        testing::add_user(&stores.lookup_url, "alice", Some("alice@x.edu")).await;
        Self::build(stores, RecordingTransport::default(), None)
    }

    fn build(stores: TestStores, transport: RecordingTransport, lookup_url: Option<String>) -> Self {
        let config = config(
            lookup_url.as_deref().unwrap_or(&stores.lookup_url),
            &stores.audit_url,
        );
        Self::with_config(stores, transport, config)
    }

    /// Pools large enough for several requests in flight at once.
    async fn concurrent(pool_size: u32) -> Self {
        let stores = testing::stores().await;
        testing::add_user(&stores.lookup_url, "alice", Some("alice@x.edu")).await;
        let mut config = config(&stores.lookup_url, &stores.audit_url);
        for store in [&mut config.email_lookup, &mut config.audit_log] {
            store.max_connections = pool_size;
            store.acquire_timeout_secs = 10;
        }
        Self::with_config(stores, RecordingTransport::default(), config)
    }

    fn with_config(stores: TestStores, transport: RecordingTransport, config: Config) -> Self {
        let transport = Arc::new(transport);
        let shared = SharedStores::connect_lazy(&config.email_lookup, &config.audit_log).unwrap();
        let gateway = Arc::new(MailGateway::new(shared, &config, transport.clone()).unwrap());
        Self {
            stores,
            transport,
            gateway,
        }
    }

    fn form(&self, username: &str, password: &str) -> SendForm {
        SendForm {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            host: Some("localhost".to_string()),
            dbname: Some(self.stores.caller_path.display().to_string()),
            recipient: Some("b@x.edu".to_string()),
            subject: Some("hi".to_string()),
            body: Some("hello".to_string()),
        }
    }

    fn caller_url(&self) -> String {
        testing::url(&self.stores.caller_path, "rw")
    }

    async fn audit_rows(&self) -> i64 {
        testing::count(&self.stores.audit_url, "audit_log").await
    }

    async fn caller_rows(&self) -> i64 {
        // The table only exists once a caller has authenticated.
        let mut conn = testing::connect(&self.caller_url()).await;
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mail_message_log")
            .fetch_one(&mut conn)
            .await
            .unwrap_or(0)
    }

    async fn seed_audit(&self, username: &str, at: DateTime<Utc>, count: usize) {
        let mut conn = testing::connect(&self.stores.audit_url).await;
        for _ in 0..count {
            let record = crate::db::AuditRecord {
                username: username.to_string(),
                recipient: "old@x.edu".to_string(),
                subject: "old".to_string(),
                body: "old".to_string(),
                log_time: log_time(at),
            };
            audit::append(&mut conn, &record).await.unwrap();
        }
    }
}

fn config(lookup_url: &str, audit_url: &str) -> Config {
    let store = |url: &str| StoreConfig {
        url: url.to_string(),
        max_connections: 1,
        acquire_timeout_secs: 1,
    };
    Config {
        listen: Default::default(),
        email_lookup: store(lookup_url),
        audit_log: store(audit_url),
        caller_store: CallerStoreConfig {
            driver: CallerDriver::Sqlite,
            ..CallerStoreConfig::default()
        },
        smtp: Default::default(),
        mail: MailConfig {
            envelope_from: "bounces@x.edu".to_string(),
        },
        rate_limit: RateLimitConfig::default(),
        throttle: Default::default(),
    }
}

fn expect_err<T>(result: Result<T, GatewayError>) -> GatewayError {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    }
}

#[tokio::test]
async fn successful_send_logs_once_in_each_store() {
    let h = Harness::new().await;

    let receipt = h.gateway.handle(h.form("alice", "pw1")).await.unwrap();

    let mut audit = testing::connect(&h.stores.audit_url).await;
    let audit_rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
        "SELECT username, recipient, subject, body, log_time FROM audit_log",
    )
    .fetch_all(&mut audit)
    .await
    .unwrap();
    assert_eq!(
        audit_rows,
        vec![(
            "alice".to_string(),
            "b@x.edu".to_string(),
            "hi".to_string(),
            "hello".to_string(),
            receipt.logged_at.clone()
        )]
    );

    let mut caller = testing::connect(&h.caller_url()).await;
    let caller_rows: Vec<(String, String, String, String)> =
        sqlx::query_as("SELECT recipient, subject, body, log_time FROM mail_message_log")
            .fetch_all(&mut caller)
            .await
            .unwrap();
    assert_eq!(
        caller_rows,
        vec![(
            "b@x.edu".to_string(),
            "hi".to_string(),
            "hello".to_string(),
            receipt.logged_at
        )]
    );

    let sent = h.transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].headers().get_raw("From"), Some("alice@x.edu"));
    assert_eq!(
        sent[0].envelope().from().map(ToString::to_string).as_deref(),
        Some("bounces@x.edu")
    );
}

#[tokio::test]
async fn empty_credentials_fail_before_any_database_work() {
    let stores = testing::stores().await;
    // Any lookup attempt against this store would be a connection error.
    let unreachable = testing::url(&stores.dir.path().join("absent.db"), "rw");
    let h = Harness::build(stores, RecordingTransport::default(), Some(unreachable));

    let err = expect_err(h.gateway.handle(h.form("", "")).await);
    assert!(matches!(err, GatewayError::Authentication));

    let err = expect_err(h.gateway.handle(h.form("alice", "  ")).await);
    assert!(matches!(err, GatewayError::Authentication));

    assert_eq!(h.audit_rows().await, 0);
    assert_eq!(h.caller_rows().await, 0);
    assert_eq!(h.transport.count(), 0);
}

#[tokio::test]
async fn unreachable_caller_store_is_an_authentication_failure() {
    let h = Harness::new().await;
    let mut form = h.form("alice", "pw1");
    form.dbname = Some(h.stores.dir.path().join("nobody.db").display().to_string());

    let err = expect_err(h.gateway.begin(form).await);
    assert!(matches!(err, GatewayError::Authentication));
}

#[tokio::test]
async fn authentication_bootstraps_caller_log_table() {
    let h = Harness::new().await;
    let (identity, _) = h.form("alice", "pw1").into_parts();

    let conn = authenticate(&identity, &h.gateway.callers).await.unwrap();
    caller_log::close(conn).await;

    let mut conn = testing::connect(&h.caller_url()).await;
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'mail_message_log'",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(tables, 1);
}

#[tokio::test]
async fn missing_field_is_reported_after_authentication() {
    let h = Harness::new().await;
    let mut form = h.form("alice", "pw1");
    form.body = None;

    let err = expect_err(h.gateway.handle(form).await);
    assert!(matches!(err, GatewayError::Validation(MessageField::Body)));
    assert_eq!(h.audit_rows().await, 0);
}

#[tokio::test]
async fn unreachable_audit_store_is_a_connection_error() {
    let h = Harness::new().await;
    let missing_audit = testing::url(&h.stores.dir.path().join("absent.db"), "rw");
    let config = config(&h.stores.lookup_url, &missing_audit);
    let shared = SharedStores::connect_lazy(&config.email_lookup, &config.audit_log).unwrap();
    let gateway = MailGateway::new(shared, &config, h.transport.clone()).unwrap();

    let err = expect_err(gateway.begin(h.form("alice", "pw1")).await);
    assert!(matches!(err, GatewayError::Connection(Store::AuditLog)));
}

#[tokio::test]
async fn reachable_stores_open_a_session() {
    let h = Harness::new().await;
    let session = h.gateway.begin(h.form("alice", "pw1")).await.unwrap();
    assert_eq!(session.context().caller, "alice");
    assert_eq!(session.context().sender.to_string(), "alice@x.edu");
    assert_eq!(session.context().message.subject, "hi");
}

#[tokio::test]
async fn email_resolution_needs_exactly_one_valid_row() {
    let stores = testing::stores().await;
    testing::add_user(&stores.lookup_url, "alice", Some("alice@x.edu")).await;
    testing::add_user(&stores.lookup_url, "twin", Some("twin@x.edu")).await;
    testing::add_user(&stores.lookup_url, "twin", Some("twin2@x.edu")).await;
    testing::add_user(&stores.lookup_url, "blank", Some("")).await;
    testing::add_user(&stores.lookup_url, "null", None).await;
    testing::add_user(&stores.lookup_url, "junk", Some("not-an-email")).await;

    let mut conn = testing::connect(&stores.lookup_url).await;
    assert_eq!(
        resolve_email(&mut conn, "alice").await.unwrap().to_string(),
        "alice@x.edu"
    );
    for username in ["nobody", "twin", "blank", "null", "junk"] {
        let err = expect_err(resolve_email(&mut conn, username).await);
        assert!(
            matches!(err, GatewayError::EmailResolution),
            "{username} should not resolve"
        );
    }
}

#[tokio::test]
async fn unknown_caller_cannot_send() {
    let h = Harness::new().await;
    let err = expect_err(h.gateway.handle(h.form("mallory", "pw")).await);
    assert!(matches!(err, GatewayError::EmailResolution));
    assert_eq!(h.audit_rows().await, 0);
}

#[tokio::test]
async fn rate_limit_counts_only_the_callers_recent_sends() {
    let h = Harness::new().await;
    let now = Utc::now();
    // Outside the window, or someone else's: never counted.
    h.seed_audit("alice", now - ChronoDuration::hours(2), 100).await;
    h.seed_audit("bob", now - ChronoDuration::minutes(5), 100).await;
    // Exactly at the limit: still allowed.
    h.seed_audit("alice", now - ChronoDuration::minutes(10), 60).await;

    h.gateway.handle(h.form("alice", "pw1")).await.unwrap();

    // Now 61 inside the window: refused.
    let err = expect_err(h.gateway.handle(h.form("alice", "pw1")).await);
    assert!(matches!(
        err,
        GatewayError::RateLimited {
            max: 60,
            window_secs: 3600
        }
    ));
    assert_eq!(h.transport.count(), 1);
    assert_eq!(h.caller_rows().await, 1);
}

#[tokio::test]
async fn session_over_quota_writes_nothing() {
    let h = Harness::new().await;
    h.seed_audit("alice", Utc::now(), 61).await;

    let session = h.gateway.begin(h.form("alice", "pw1")).await.unwrap();
    let err = expect_err(session.send().await);
    assert!(matches!(err, GatewayError::RateLimited { .. }));
    assert_eq!(h.audit_rows().await, 61);
    assert_eq!(h.caller_rows().await, 0);
    assert_eq!(h.transport.count(), 0);
}

#[tokio::test]
async fn send_runs_on_a_spawned_task() {
    let h = Harness::new().await;
    let gateway = Arc::clone(&h.gateway);
    let form = h.form("alice", "pw1");

    let receipt = tokio::spawn(async move { gateway.handle(form).await })
        .await
        .unwrap()
        .unwrap();

    assert!(!receipt.logged_at.is_empty());
    assert_eq!(h.audit_rows().await, 1);
    assert_eq!(h.transport.count(), 1);
}

#[tokio::test]
async fn concurrent_sends_cannot_overrun_the_quota() {
    let h = Harness::concurrent(5).await;
    h.seed_audit("alice", Utc::now(), 60).await;

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let gateway = Arc::clone(&h.gateway);
            let form = h.form("alice", "pw1");
            tokio::spawn(async move { gateway.handle(form).await })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert!(matches!(e, GatewayError::RateLimited { .. }), "{e}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(h.audit_rows().await, 61);
    assert_eq!(h.transport.count(), 1);
    assert!(h.gateway.locks().is_idle());
}

#[tokio::test]
async fn check_rate_limit_uses_given_clock() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_audit("alice", now, 3).await;
    let policy = RateLimitConfig {
        max_messages: 2,
        window_secs: 60,
    };

    let mut conn = testing::connect(&h.stores.audit_url).await;
    assert!(check_rate_limit(&mut conn, "alice", now, &policy).await.is_err());
    // Two minutes later the same rows have left the window.
    let later = now + ChronoDuration::minutes(2);
    assert!(check_rate_limit(&mut conn, "alice", later, &policy).await.is_ok());
}

#[tokio::test]
async fn caller_log_failure_is_named_and_audit_still_written() {
    let h = Harness::new().await;
    let session = h.gateway.begin(h.form("alice", "pw1")).await.unwrap();

    // Drop the caller table out from under the session.
    let mut conn = testing::connect(&h.caller_url()).await;
    sqlx::query("DROP TABLE mail_message_log")
        .execute(&mut conn)
        .await
        .unwrap();

    let err = expect_err(session.send().await);
    assert!(matches!(
        err,
        GatewayError::Persistence(ref stores) if stores == &vec![Store::CallerLog]
    ));
    assert_eq!(h.audit_rows().await, 1);
    assert_eq!(h.transport.count(), 0);
}

#[tokio::test]
async fn audit_failure_does_not_skip_caller_log() {
    let h = Harness::new().await;
    let session = h.gateway.begin(h.form("alice", "pw1")).await.unwrap();

    // Rename the column the insert needs; the count query still works.
    let mut conn = testing::connect(&h.stores.audit_url).await;
    sqlx::query("ALTER TABLE audit_log RENAME COLUMN body TO content")
        .execute(&mut conn)
        .await
        .unwrap();

    let err = expect_err(session.send().await);
    assert!(matches!(
        err,
        GatewayError::Persistence(ref stores) if stores == &vec![Store::AuditLog]
    ));
    assert_eq!(h.caller_rows().await, 1);
    assert_eq!(h.transport.count(), 0);
}

#[tokio::test]
async fn transport_failure_is_reported_after_logging() {
    let stores = testing::stores().await;
    testing::add_user(&stores.lookup_url, "alice", Some("alice@x.edu")).await;
    let h = Harness::build(stores, RecordingTransport::failing(), None);

    let err = expect_err(h.gateway.handle(h.form("alice", "pw1")).await);
    assert!(matches!(err, GatewayError::Transport(_)));
    assert_eq!(h.audit_rows().await, 1);
    assert_eq!(h.caller_rows().await, 1);
}

#[tokio::test]
async fn undeliverable_recipient_is_not_logged() {
    let h = Harness::new().await;
    let mut form = h.form("alice", "pw1");
    form.recipient = Some("not an address".to_string());

    let err = expect_err(h.gateway.handle(form).await);
    assert!(matches!(err, GatewayError::Transport(_)));
    assert_eq!(h.audit_rows().await, 0);
    assert_eq!(h.caller_rows().await, 0);
}

#[test]
fn window_start_saturates_at_epoch() {
    let now = Utc::now();
    assert_eq!(window_start(now, 3600), now - ChronoDuration::hours(1));
    assert_eq!(window_start(now, u64::MAX), DateTime::UNIX_EPOCH);
}
