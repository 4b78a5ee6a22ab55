use listshare_core::model::list::ListValidationError;
use listshare_core::model::user::User;
use listshare_core::repo::user_repo::{KvUserRepository, UserRepository};
use listshare_core::service::list_service::{
    AddTaskRequest, CreateListRequest, LimitKind, ListService, ListServiceError,
    UpdateListRequest, UpdateTaskRequest, EXPORT_VERSION,
};
use listshare_core::{CoreConfig, ListFilter, ManualClock, MemoryKvStore, SortKey, SortOrder};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    store: Arc<MemoryKvStore>,
    clock: Arc<ManualClock>,
    service: ListService<Arc<MemoryKvStore>>,
}

fn fixture_with(config: CoreConfig) -> Fixture {
    let store = Arc::new(MemoryKvStore::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let service = ListService::new(store.clone(), clock.clone(), &config);
    Fixture {
        store,
        clock,
        service,
    }
}

fn fixture() -> Fixture {
    fixture_with(CoreConfig::default())
}

fn add_user(fixture: &Fixture, email: &str) -> Uuid {
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: String::new(),
        name: "Test".to_string(),
        created_at: 0,
    };
    KvUserRepository::new(fixture.store.clone())
        .create_user(&user)
        .unwrap();
    user.id
}

fn create(fixture: &Fixture, owner: Uuid, title: &str, tasks: &[&str]) -> Uuid {
    fixture
        .service
        .create_list(
            owner,
            &CreateListRequest {
                title: title.to_string(),
                initial_tasks: tasks.iter().map(|text| text.to_string()).collect(),
            },
        )
        .unwrap()
        .id()
}

#[test]
fn groceries_end_to_end() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");

    let created = f
        .service
        .create_list(
            ann,
            &CreateListRequest {
                title: "  Groceries ".to_string(),
                initial_tasks: vec!["Milk".to_string(), "Eggs".to_string()],
            },
        )
        .unwrap();
    assert_eq!(created.list.title, "Groceries");
    assert_eq!(created.stats.total_tasks, 2);
    assert_eq!(created.stats.completion_percentage, 0.0);
    assert!(created.is_owner && created.can_share && created.can_delete);

    f.clock.advance(10);
    let list_id = created.id();
    let with_bread = f
        .service
        .add_task(
            ann,
            &AddTaskRequest {
                list_id,
                text: "Bread".to_string(),
            },
        )
        .unwrap();
    assert_eq!(with_bread.list.tasks.last().unwrap().text, "Bread");
    assert!(!with_bread.list.tasks.last().unwrap().completed);

    let milk = with_bread.list.tasks[0].id;
    let toggled = f.service.toggle_task(ann, list_id, milk).unwrap();
    assert_eq!(toggled.stats.completed_tasks, 1);
    assert_eq!(toggled.stats.pending_tasks, 2);
    assert_eq!(toggled.list.tasks[0].completed_at, Some(1_010));

    let loaded = f.service.load_user_lists(ann, &ListFilter::default()).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].stats.completed_tasks, 1);

    let eggs = toggled.list.tasks[1].id;
    let trimmed = f.service.delete_task(ann, list_id, eggs).unwrap();
    assert_eq!(trimmed.stats.total_tasks, 2);
    assert_eq!(trimmed.stats.completion_percentage, 50.0);

    f.service.delete_list(ann, list_id).unwrap();
    assert!(f
        .service
        .load_user_lists(ann, &ListFilter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn statistics_stay_consistent_across_edits() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    let list_id = create(&f, ann, "Chores", &["a", "b", "c", "d"]);

    let view = f.service.get_list(ann, list_id).unwrap();
    for task in view.list.tasks.iter().take(3) {
        f.service.toggle_task(ann, list_id, task.id).unwrap();
    }
    let view = f.service.get_list(ann, list_id).unwrap();
    let stats = &view.stats;
    assert_eq!(stats.total_tasks, stats.completed_tasks + stats.pending_tasks);
    assert_eq!(stats.completion_percentage, 75.0);
    assert!(stats.last_activity >= view.list.updated_at);
}

#[test]
fn toggling_twice_restores_the_task() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    let list_id = create(&f, ann, "Errands", &["Post office"]);
    let task_id = f.service.get_list(ann, list_id).unwrap().list.tasks[0].id;

    f.service.toggle_task(ann, list_id, task_id).unwrap();
    f.clock.advance(5);
    let view = f.service.toggle_task(ann, list_id, task_id).unwrap();
    let task = &view.list.tasks[0];
    assert!(!task.completed);
    assert_eq!(task.completed_at, None);
}

#[test]
fn update_task_keeps_completion_timestamp_on_recomplete() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    let list_id = create(&f, ann, "Errands", &["Post office"]);
    let task_id = f.service.get_list(ann, list_id).unwrap().list.tasks[0].id;

    let done = UpdateTaskRequest {
        text: Some("Post office run".to_string()),
        completed: Some(true),
    };
    f.service.update_task(ann, list_id, task_id, &done).unwrap();
    f.clock.advance(100);
    let view = f
        .service
        .update_task(
            ann,
            list_id,
            task_id,
            &UpdateTaskRequest {
                text: None,
                completed: Some(true),
            },
        )
        .unwrap();
    assert_eq!(view.list.tasks[0].text, "Post office run");
    assert_eq!(view.list.tasks[0].completed_at, Some(1_000));
}

#[test]
fn fifty_first_list_is_rejected_without_touching_the_rest() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    for i in 0..50 {
        create(&f, ann, &format!("List {i}"), &[]);
    }

    let err = f
        .service
        .create_list(
            ann,
            &CreateListRequest {
                title: "One too many".to_string(),
                initial_tasks: Vec::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ListServiceError::LimitExceeded {
            kind: LimitKind::ListsPerUser,
            max: 50
        }
    ));

    let lists = f.service.load_user_lists(ann, &ListFilter::default()).unwrap();
    assert_eq!(lists.len(), 50);
    assert!(lists.iter().all(|item| item.list.title != "One too many"));
}

#[test]
fn invalid_input_is_rejected_before_any_write() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");

    let blank = f.service.create_list(
        ann,
        &CreateListRequest {
            title: "   ".to_string(),
            initial_tasks: Vec::new(),
        },
    );
    assert!(matches!(
        blank,
        Err(ListServiceError::Validation(ListValidationError::EmptyTitle))
    ));

    let long_task = "x".repeat(201);
    let too_long = f.service.create_list(
        ann,
        &CreateListRequest {
            title: "Fine".to_string(),
            initial_tasks: vec![long_task],
        },
    );
    assert!(matches!(
        too_long,
        Err(ListServiceError::Validation(ListValidationError::TaskTextTooLong { .. }))
    ));

    assert!(f
        .service
        .load_user_lists(ann, &ListFilter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn missing_list_and_task_report_not_found() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    let list_id = create(&f, ann, "Only", &[]);

    let missing_list = Uuid::new_v4();
    assert!(matches!(
        f.service.get_list(ann, missing_list),
        Err(ListServiceError::ListNotFound(id)) if id == missing_list
    ));

    let missing_task = Uuid::new_v4();
    assert!(matches!(
        f.service.toggle_task(ann, list_id, missing_task),
        Err(ListServiceError::TaskNotFound { .. })
    ));
}

#[test]
fn rename_updates_title_and_timestamp() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    let list_id = create(&f, ann, "Old", &[]);

    f.clock.advance(50);
    let renamed = f
        .service
        .update_list(
            ann,
            list_id,
            &UpdateListRequest {
                title: Some("New".to_string()),
                shared_with: None,
            },
        )
        .unwrap();
    assert_eq!(renamed.list.title, "New");
    assert_eq!(renamed.list.updated_at, 1_050);
    assert_eq!(renamed.list.created_at, 1_000);
}

#[test]
fn filter_search_and_sort_apply_to_loaded_views() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    create(&f, ann, "beta", &["buy milk"]);
    f.clock.advance(1);
    create(&f, ann, "Alpha", &["walk dog"]);

    let by_title = ListFilter {
        sort_by: SortKey::Title,
        sort_order: SortOrder::Ascending,
        ..ListFilter::default()
    };
    let titles: Vec<String> = f
        .service
        .load_user_lists(ann, &by_title)
        .unwrap()
        .into_iter()
        .map(|item| item.list.title)
        .collect();
    assert_eq!(titles, ["Alpha", "beta"]);

    let milk = ListFilter {
        search: Some("MILK".to_string()),
        ..ListFilter::default()
    };
    let found = f.service.load_user_lists(ann, &milk).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].list.title, "beta");
}

#[test]
fn export_contains_only_own_lists() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    create(&f, ann, "Mine", &["one"]);
    f.clock.set(9_999);

    let export = f.service.export_lists(ann).unwrap();
    assert_eq!(export.version, EXPORT_VERSION);
    assert_eq!(export.exported_at, 9_999);
    assert_eq!(export.user.email, "ann@example.com");
    assert_eq!(export.lists.len(), 1);

    let json = serde_json::to_value(&export).unwrap();
    assert!(json.get("exportedAt").is_some());
    assert!(json["lists"][0].get("ownerId").is_some());

    assert!(matches!(
        f.service.export_lists(Uuid::new_v4()),
        Err(ListServiceError::UserNotFound(_))
    ));
}

#[test]
fn first_load_seeds_examples_when_enabled() {
    let f = fixture_with(CoreConfig {
        seed_example_lists: true,
        ..CoreConfig::default()
    });
    let ann = add_user(&f, "ann@example.com");

    let first = f.service.load_user_lists(ann, &ListFilter::default()).unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|item| item.is_owner));

    for item in &first {
        f.service.delete_list(ann, item.id()).unwrap();
    }
    assert!(f
        .service
        .load_user_lists(ann, &ListFilter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn unknown_users_get_no_partition() {
    let f = fixture_with(CoreConfig {
        seed_example_lists: true,
        ..CoreConfig::default()
    });
    let ghost = Uuid::new_v4();

    let err = f
        .service
        .create_list(
            ghost,
            &CreateListRequest {
                title: "Orphan".to_string(),
                initial_tasks: Vec::new(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ListServiceError::UserNotFound(id) if id == ghost));

    assert!(f
        .service
        .load_user_lists(ghost, &ListFilter::default())
        .unwrap()
        .is_empty());
    assert!(f
        .store
        .keys()
        .unwrap()
        .iter()
        .all(|key| !key.starts_with("lists_")));
}

#[test]
fn seeding_is_off_by_default() {
    let f = fixture();
    let ann = add_user(&f, "ann@example.com");
    assert!(f
        .service
        .load_user_lists(ann, &ListFilter::default())
        .unwrap()
        .is_empty());
}
