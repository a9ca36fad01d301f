mod common;

use docbridge::{
    async_trait,
    bson::doc,
    memory::{MemoryDriver, MemoryHandle},
    prelude::*,
};

use common::{DATABASE, config, drafts, posts, read_only_config, registry, users};

#[tokio::test]
async fn duplicate_identity_is_rejected_and_first_entry_survives() {
    let registry = Registry::new(MemoryDriver::new());

    registry
        .register_connection(config("default"), vec![users()])
        .await
        .unwrap();

    let duplicate = ConnectionConfig::builder("default").database("other").build();
    let err = registry
        .register_connection(duplicate, vec![posts()])
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::IdentityDuplicate(identity) if identity == "default"));
    assert_eq!(registry.driver().connect_attempts(), 1);

    let entry = registry.lookup("default").await.unwrap();
    assert_eq!(entry.target().database, DATABASE);
    assert_eq!(entry.collection_names(), vec!["users".to_string()]);
    assert!(entry.handle().await.is_ok());
}

/// Yields once before connecting so concurrent registrations interleave.
#[derive(Debug, Default)]
struct YieldingDriver {
    inner: MemoryDriver,
}

#[async_trait]
impl StoreDriver for YieldingDriver {
    type Handle = MemoryHandle;

    async fn connect(&self, target: &ConnectTarget) -> StoreResult<Self::Handle> {
        tokio::task::yield_now().await;
        self.inner.connect(target).await
    }
}

#[tokio::test]
async fn concurrent_registration_of_one_identity_keeps_a_single_connection() {
    let registry = Registry::new(YieldingDriver::default());

    let (first, second) = tokio::join!(
        registry.register_connection(config("default"), vec![users()]),
        registry.register_connection(config("default"), vec![users()]),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(AdapterError::IdentityDuplicate(identity)) if identity == "default"
    )));

    assert_eq!(registry.driver().inner.connect_attempts(), 2);
    assert_eq!(registry.driver().inner.open_handles(), 1);
    assert!(registry.lookup("default").await.unwrap().handle().await.is_ok());
}

#[tokio::test]
async fn credentials_without_database_fail_before_connecting() {
    let registry = Registry::new(MemoryDriver::new());

    let config = ConnectionConfig::builder("default")
        .credentials("admin", "s3cret")
        .build();
    let err = registry
        .register_connection(config, vec![users()])
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::Configuration(_)));
    assert_eq!(registry.driver().connect_attempts(), 0);
    assert!(!registry.contains("default").await);
}

#[tokio::test]
async fn lone_user_fails_before_connecting() {
    let registry = Registry::new(MemoryDriver::new());

    let config = ConnectionConfig::builder("default")
        .user("admin")
        .database(DATABASE)
        .build();

    assert!(matches!(
        registry.register_connection(config, vec![]).await,
        Err(AdapterError::Configuration(_))
    ));
    assert_eq!(registry.driver().connect_attempts(), 0);
}

#[tokio::test]
async fn empty_identity_is_rejected() {
    let registry = Registry::new(MemoryDriver::new());

    assert!(matches!(
        registry.register_connection(config(""), vec![]).await,
        Err(AdapterError::IdentityMissing)
    ));
    assert_eq!(registry.driver().connect_attempts(), 0);
}

#[tokio::test]
async fn duplicate_collection_names_are_rejected() {
    let registry = Registry::new(MemoryDriver::new());

    assert!(matches!(
        registry
            .register_connection(config("default"), vec![users(), users()])
            .await,
        Err(AdapterError::Configuration(_))
    ));
    assert_eq!(registry.driver().connect_attempts(), 0);
}

#[tokio::test]
async fn connection_failure_never_exposes_the_password() {
    let registry = Registry::new(MemoryDriver::builder().unreachable().build());

    let config = ConnectionConfig::builder("default")
        .host("db.internal")
        .credentials("admin", "s3cret")
        .database(DATABASE)
        .build();
    let err = registry
        .register_connection(config, vec![users()])
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, AdapterError::ConnectionFailure { .. }));
    assert!(!message.contains("s3cret"), "{message}");
    assert!(message.contains("db.internal"), "{message}");
    assert!(!message.contains("admin"), "{message}");
    assert!(!registry.contains("default").await);
}

#[tokio::test]
async fn registry_debug_output_hides_credentials() {
    let registry = Registry::new(MemoryDriver::new());

    let config = ConnectionConfig::builder("default")
        .host("db.internal")
        .credentials("admin", "s3cret")
        .database(DATABASE)
        .build();
    registry.register_connection(config, vec![users()]).await.unwrap();

    let entry = format!("{:?}", registry.lookup("default").await.unwrap());
    assert!(!entry.contains("s3cret"), "{entry}");
    assert!(entry.contains("db.internal"), "{entry}");

    let whole = format!("{:?}", registry);
    assert!(!whole.contains("s3cret"), "{whole}");
}

#[tokio::test]
async fn registration_provisions_derived_indexes() {
    let registry = registry().await;
    let driver = registry.driver();

    let users = driver.indexes(DATABASE, "users").await;
    assert_eq!(users.len(), 2);
    assert!(users.iter().any(|index| index.keys == doc! { "email": 1 } && index.is_unique()));
    assert!(users.iter().any(|index| index.keys == doc! { "name": 1 } && !index.is_unique()));

    let posts = driver.indexes(DATABASE, "posts").await;
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().any(|index| index.keys == doc! { "slug": 1 } && index.is_unique()));
    assert!(posts.iter().any(|index| index.keys == doc! { "author": 1 }));

    assert!(driver.indexes(DATABASE, "drafts").await.is_empty());
}

#[tokio::test]
async fn declared_indexes_are_provisioned() {
    let registry = Registry::new(MemoryDriver::new());

    let events = CollectionDefinition::new("events").index(IndexSpec::new(
        doc! { "kind": 1, "at": -1 },
        doc! { "name": "kind_at" },
    ));
    registry
        .register_connection(config("default"), vec![events])
        .await
        .unwrap();

    let indexes = registry.driver().indexes(DATABASE, "events").await;
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].keys, doc! { "kind": 1, "at": -1 });
    assert_eq!(indexes[0].options.get_str("name").unwrap(), "kind_at");
}

#[tokio::test]
async fn read_only_registration_provisions_nothing() {
    let registry = Registry::new(MemoryDriver::new());

    registry
        .register_connection(read_only_config("replica"), vec![users(), posts()])
        .await
        .unwrap();

    assert!(registry.driver().indexes(DATABASE, "users").await.is_empty());
    assert!(registry.driver().collection_names(DATABASE).await.is_empty());
    assert!(registry.lookup("replica").await.unwrap().is_read_only());
}

#[tokio::test]
async fn index_failure_abandons_the_connection() {
    let registry = Registry::new(MemoryDriver::builder().reject_indexes_on("posts").build());

    let err = registry
        .register_connection(config("default"), vec![users(), posts()])
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::Store(StoreError::Backend(_))));
    assert!(!registry.contains("default").await);
    assert_eq!(registry.driver().open_handles(), 0);
}

#[tokio::test]
async fn registration_accepts_json_configuration() {
    let registry = Registry::new(MemoryDriver::new());

    let config = ConnectionConfig::from_json(
        r#"{
            "identity": "analytics",
            "url": "mongodb://db.internal:27017/metrics?replicaSet=rs0",
            "readOnly": true
        }"#,
    )
    .unwrap();

    registry.register_connection(config, vec![]).await.unwrap();

    let entry = registry.lookup("analytics").await.unwrap();
    assert_eq!(entry.target().database, "metrics");
    assert_eq!(entry.target().connection_string, "mongodb://db.internal:27017/metrics");
    assert_eq!(
        entry.target().options.get("replicaSet"),
        Some(&docbridge::bson::Bson::String("rs0".to_string()))
    );
    assert!(entry.is_read_only());
}

#[tokio::test]
async fn lookup_of_unknown_identity_fails() {
    let registry = Registry::new(MemoryDriver::new());

    assert!(matches!(
        registry.lookup("ghost").await,
        Err(AdapterError::UnknownConnection(identity)) if identity == "ghost"
    ));
}

#[tokio::test]
async fn teardown_of_empty_registry_is_idempotent() {
    let registry = Registry::new(MemoryDriver::new());

    registry.teardown(None).await.unwrap();
    registry.teardown(None).await.unwrap();
    registry.teardown(Some("ghost")).await.unwrap();
}

#[tokio::test]
async fn teardown_of_one_identity_leaves_others_intact() {
    let registry = Registry::new(MemoryDriver::new());

    registry
        .register_connection(config("primary"), vec![users()])
        .await
        .unwrap();
    registry
        .register_connection(read_only_config("replica"), vec![users()])
        .await
        .unwrap();
    assert_eq!(registry.driver().open_handles(), 2);

    registry.teardown(Some("primary")).await.unwrap();

    assert_eq!(registry.identities().await, vec!["replica".to_string()]);
    assert_eq!(registry.driver().open_handles(), 1);
    assert!(matches!(
        registry.find("primary", "users", Criteria::new()).await,
        Err(AdapterError::UnknownConnection(_))
    ));
    assert!(registry.find("replica", "users", Criteria::new()).await.is_ok());
}

#[tokio::test]
async fn teardown_of_everything_closes_every_handle() {
    let registry = Registry::new(MemoryDriver::new());

    for identity in ["a", "b", "c"] {
        registry
            .register_connection(config(identity), vec![drafts()])
            .await
            .unwrap();
    }
    let retained = registry.lookup("b").await.unwrap();

    registry.teardown(None).await.unwrap();

    assert!(registry.identities().await.is_empty());
    assert_eq!(registry.driver().open_handles(), 0);
    assert!(matches!(
        retained.handle().await,
        Err(AdapterError::ConnectionClosed(identity)) if identity == "b"
    ));

    registry.teardown(None).await.unwrap();
}

#[tokio::test]
async fn identity_can_be_registered_again_after_teardown() {
    let registry = Registry::new(MemoryDriver::new());

    registry
        .register_connection(config("default"), vec![users()])
        .await
        .unwrap();
    registry.teardown(Some("default")).await.unwrap();
    registry
        .register_connection(config("default"), vec![users()])
        .await
        .unwrap();

    assert_eq!(registry.driver().connect_attempts(), 2);
    assert_eq!(registry.driver().open_handles(), 1);
}

#[tokio::test]
async fn independent_registries_do_not_share_identities() {
    let first = registry().await;
    let second = registry().await;

    first.teardown(None).await.unwrap();

    assert!(second.contains("default").await);
}

#[tokio::test]
async fn describe_reports_schema_only_for_existing_collections() {
    let registry = registry().await;

    assert_eq!(registry.describe("default", "drafts").await.unwrap(), None);

    registry
        .create("default", "drafts", doc! { "title": "Untitled" })
        .await
        .unwrap();

    assert_eq!(
        registry.describe("default", "drafts").await.unwrap(),
        Some(drafts().schema)
    );
}

#[tokio::test]
async fn describe_of_unregistered_collection_fails() {
    let registry = registry().await;

    assert!(matches!(
        registry.describe("default", "comments").await,
        Err(AdapterError::UnknownCollection(collection, connection))
            if collection == "comments" && connection == "default"
    ));
}

#[tokio::test]
async fn define_recreates_a_registered_collection_with_its_indexes() {
    let registry = registry().await;
    let driver = registry.driver();

    registry.drop("default", "users").await.unwrap();
    assert!(!driver.collection_names(DATABASE).await.contains(&"users".to_string()));

    registry.define("default", "users").await.unwrap();

    assert!(driver.collection_names(DATABASE).await.contains(&"users".to_string()));
    let indexes = driver.indexes(DATABASE, "users").await;
    assert_eq!(indexes.len(), 2);
    assert!(indexes.iter().any(|index| index.keys == doc! { "email": 1 } && index.is_unique()));

    // Defining an existing collection succeeds.
    registry.define("default", "users").await.unwrap();
    assert_eq!(driver.indexes(DATABASE, "users").await.len(), 2);
}

#[tokio::test]
async fn define_uses_the_indexes_of_the_named_collection() {
    let registry = registry().await;

    registry.define("default", "drafts").await.unwrap();

    let driver = registry.driver();
    assert!(driver.collection_names(DATABASE).await.contains(&"drafts".to_string()));
    assert!(driver.indexes(DATABASE, "drafts").await.is_empty());
}

#[tokio::test]
async fn define_of_unregistered_collection_creates_nothing() {
    let registry = registry().await;

    assert!(matches!(
        registry.define("default", "comments").await,
        Err(AdapterError::UnknownCollection(collection, connection))
            if collection == "comments" && connection == "default"
    ));
    assert!(!registry
        .driver()
        .collection_names(DATABASE)
        .await
        .contains(&"comments".to_string()));
}

#[tokio::test]
async fn define_on_read_only_connection_does_nothing() {
    let registry = Registry::new(MemoryDriver::new());
    registry
        .register_connection(read_only_config("replica"), vec![users()])
        .await
        .unwrap();

    registry.define("replica", "users").await.unwrap();

    assert!(registry.driver().collection_names(DATABASE).await.is_empty());
    assert!(registry.driver().indexes(DATABASE, "users").await.is_empty());
}

#[tokio::test]
async fn drop_of_missing_collection_succeeds() {
    let registry = registry().await;

    registry.drop("default", "comments").await.unwrap();
}

#[tokio::test]
async fn drop_removes_existing_collection() {
    let registry = registry().await;

    registry.drop("default", "users").await.unwrap();

    assert!(!registry
        .driver()
        .collection_names(DATABASE)
        .await
        .contains(&"users".to_string()));
    assert_eq!(registry.describe("default", "users").await.unwrap(), None);
}

#[tokio::test]
async fn drop_on_read_only_connection_keeps_the_collection() {
    let registry = registry().await;
    registry
        .register_connection(read_only_config("replica"), vec![users()])
        .await
        .unwrap();

    registry.drop("replica", "users").await.unwrap();

    assert!(registry
        .driver()
        .collection_names(DATABASE)
        .await
        .contains(&"users".to_string()));
}

#[tokio::test]
async fn native_exposes_the_store_collection() {
    let registry = registry().await;

    let native = registry.native("default", "users").await.unwrap();

    assert_eq!(native.name(), "users");
}
