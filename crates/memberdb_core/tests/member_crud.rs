use memberdb_core::{
    ConnectionProvider, DataSourceConfig, DirectProvider, Member, MemberRepository, MemberStore,
    PoolConfig, PooledProvider, RepoError,
};
use tempfile::TempDir;

fn direct_store() -> (TempDir, MemberStore<DirectProvider>) {
    let dir = tempfile::tempdir().unwrap();
    let provider = DirectProvider::new(&DataSourceConfig::new(dir.path().join("members.db")))
        .unwrap();
    (dir, MemberStore::new(provider))
}

fn pooled_store() -> (TempDir, MemberStore<PooledProvider>) {
    let dir = tempfile::tempdir().unwrap();
    let config = PoolConfig {
        pool_name: "MyPool".to_string(),
        max_size: 4,
        ..PoolConfig::default()
    };
    let provider =
        PooledProvider::new(&DataSourceConfig::new(dir.path().join("members.db")), &config)
            .unwrap();
    (dir, MemberStore::new(provider))
}

fn run_member_lifecycle<P: ConnectionProvider>(store: &MemberStore<P>) {
    let member = Member::new("u1", 10_000);
    let saved = store.save(&member).unwrap();
    assert_eq!(saved, member);

    let found = store.find_by_id("u1").unwrap();
    assert_eq!(found, member);

    assert_eq!(store.update_balance("u1", 9_000).unwrap(), 1);
    let updated = store.find_by_id("u1").unwrap();
    assert_eq!(updated, Member::new("u1", 9_000));

    assert_eq!(store.delete("u1").unwrap(), 1);
    let err = store.find_by_id("u1").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(ref id) if id == "u1"));
}

#[test]
fn member_lifecycle_through_direct_provider() {
    let (_dir, store) = direct_store();
    run_member_lifecycle(&store);
}

#[test]
fn member_lifecycle_through_pooled_provider() {
    let (_dir, store) = pooled_store();
    run_member_lifecycle(&store);
}

#[test]
fn saved_members_read_back_unchanged() {
    let (_dir, store) = direct_store();
    let members = [
        Member::new("zero", 0),
        Member::new("negative", -250),
        Member::new("large", i64::MAX),
        Member::new("회원", 42),
        Member::new("quote'id", 7),
    ];

    for member in &members {
        store.save(member).unwrap();
    }
    for member in &members {
        assert_eq!(&store.find_by_id(&member.member_id).unwrap(), member);
    }
}

#[test]
fn duplicate_save_is_a_constraint_violation_and_keeps_original_row() {
    let (_dir, store) = pooled_store();
    store.save(&Member::new("dup", 100)).unwrap();

    let err = store.save(&Member::new("dup", 999)).unwrap_err();
    assert!(matches!(err, RepoError::Statement(_)));
    assert!(err.is_constraint_violation());

    assert_eq!(store.find_by_id("dup").unwrap().money, 100);
}

#[test]
fn find_unknown_member_is_not_found() {
    let (_dir, store) = direct_store();
    let err = store.find_by_id("ghost").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(ref id) if id == "ghost"));
    assert_eq!(err.to_string(), "member not found: member_id=ghost");
}

#[test]
fn update_unknown_member_succeeds_without_creating_row() {
    let (_dir, store) = direct_store();
    assert_eq!(store.update_balance("ghost", 500).unwrap(), 0);
    assert!(matches!(
        store.find_by_id("ghost").unwrap_err(),
        RepoError::NotFound(_)
    ));
}

#[test]
fn delete_unknown_member_is_silent_success() {
    let (_dir, store) = pooled_store();
    assert_eq!(store.delete("ghost").unwrap(), 0);
}

#[test]
fn delete_is_idempotent() {
    let (_dir, store) = direct_store();
    store.save(&Member::new("gone", 1)).unwrap();

    assert_eq!(store.delete("gone").unwrap(), 1);
    assert_eq!(store.delete("gone").unwrap(), 0);
}

#[test]
fn pooled_store_returns_every_connection_to_the_pool() {
    let (_dir, store) = pooled_store();
    let before = store.provider().status();

    store.save(&Member::new("p1", 10)).unwrap();
    store.find_by_id("p1").unwrap();
    store.find_by_id("missing").unwrap_err();
    store.save(&Member::new("p1", 10)).unwrap_err();
    store.update_balance("p1", 20).unwrap();
    store.delete("p1").unwrap();

    let after = store.provider().status();
    assert_eq!(after.connections, before.connections);
    assert_eq!(after.idle_connections, after.connections);
}

#[test]
fn direct_provider_on_unopenable_path_reports_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("members.db");
    let provider = DirectProvider::new(&DataSourceConfig::new(&path)).unwrap();
    let store = MemberStore::new(provider);

    // Replace the database file with a directory so every new open fails.
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    let err = store.find_by_id("u1").unwrap_err();
    assert!(matches!(err, RepoError::Connection(ref conn) if conn.provider == "direct"));
    let err = store.save(&Member::new("u1", 1)).unwrap_err();
    assert!(matches!(err, RepoError::Connection(_)));
}
