use listshare_core::model::user::User;
use listshare_core::repo::list_repo::{lists_key, KvListRepository, ListRepository};
use listshare_core::repo::share_index::{KvShareIndex, ShareEntry, ShareIndex};
use listshare_core::repo::user_repo::{KvUserRepository, UserRepository};
use listshare_core::storage::{load_json, save_json};
use listshare_core::{KvStore, SqliteKvStore, StorageError, TaskList};
use uuid::Uuid;

#[test]
fn values_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("listshare.db");
    let owner = Uuid::new_v4();

    {
        let store = SqliteKvStore::open(&path).unwrap();
        let lists = KvListRepository::new(&store);
        lists
            .save_collection(owner, &[TaskList::new(owner, "Groceries", Vec::new(), 5)])
            .unwrap();
        store.set("session_token", "\"abc\"").unwrap();
    }

    let store = SqliteKvStore::open(&path).unwrap();
    let lists = KvListRepository::new(&store).load_lists(owner).unwrap();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].title, "Groceries");
    assert_eq!(
        load_json::<String, _>(&store, "session_token").unwrap().as_deref(),
        Some("abc")
    );
}

#[test]
fn partitions_are_keyed_per_owner() {
    let store = SqliteKvStore::open_in_memory().unwrap();
    let ann = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let lists = KvListRepository::new(&store);

    lists
        .save_collection(ann, &[TaskList::new(ann, "A", Vec::new(), 1)])
        .unwrap();
    lists
        .save_collection(bob, &[TaskList::new(bob, "B", Vec::new(), 1)])
        .unwrap();

    assert_eq!(lists_key(ann), format!("lists_{ann}"));
    assert_eq!(store.count_with_prefix("lists_").unwrap(), 2);
    assert_eq!(lists.load_lists(ann).unwrap()[0].title, "A");
    assert!(lists.load_collection(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn corrupt_value_reports_serialization_error_with_key() {
    let store = SqliteKvStore::open_in_memory().unwrap();
    store.set("users", "{not json").unwrap();

    let err = KvUserRepository::new(&store).list_users().unwrap_err();
    match err {
        StorageError::Serialization { key, .. } => assert_eq!(key, "users"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn share_index_drops_key_with_last_entry() {
    let store = SqliteKvStore::open_in_memory().unwrap();
    let index = KvShareIndex::new(&store);
    let entry = ShareEntry {
        owner_id: Uuid::new_v4(),
        list_id: Uuid::new_v4(),
    };

    index.add("bob@example.com", entry).unwrap();
    index.add("bob@example.com", entry).unwrap();
    assert_eq!(index.entries_for("bob@example.com").unwrap(), [entry]);

    index.remove("bob@example.com", entry.list_id).unwrap();
    assert!(index.entries_for("bob@example.com").unwrap().is_empty());
    assert_eq!(store.count_with_prefix("shared_index_").unwrap(), 0);
}

#[test]
fn users_keep_registration_order_on_disk() {
    let store = SqliteKvStore::open_in_memory().unwrap();
    let users = KvUserRepository::new(&store);
    for email in ["zed@example.com", "amy@example.com"] {
        users
            .create_user(&User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: String::new(),
                name: "x".to_string(),
                created_at: 0,
            })
            .unwrap();
    }

    let emails: Vec<String> = users
        .list_users()
        .unwrap()
        .into_iter()
        .map(|user| user.email)
        .collect();
    assert_eq!(emails, ["zed@example.com", "amy@example.com"]);

    save_json(&store, "users", &Vec::<User>::new()).unwrap();
    assert!(users.list_users().unwrap().is_empty());
}
