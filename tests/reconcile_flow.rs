use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tempfile::tempdir;
use weekwise::{ConfiguredSession, JsonFileStore, MutationState, Reconciler, TaskStore};
use weekwise_core::{
    DropEvent, EditForm, Projection, TaskIndex, UserId, ViewMode, ViewParams, compose, parse_draft,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
}

#[tokio::test]
async fn quick_add_edit_move_and_clear_persist() {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(JsonFileStore::new(temp.path().join("data").join("tasks.json")));
    let session = Arc::new(ConfiguredSession::signed_in(UserId::new("me")));
    let reconciler = Reconciler::new(store.clone(), session);
    assert_eq!(reconciler.load().await.expect("load empty store"), 0);

    let params = ViewParams::new(ViewMode::Week).with_completed(true);
    let draft = parse_draft("Lunch tomorrow 1pm", today())
        .expect("non-blank")
        .placed(&params, today());
    let lunch = reconciler.add(draft).await.expect("add lunch");
    assert_eq!(lunch.date, NaiveDate::from_ymd_opt(2024, 5, 2));
    assert_eq!(lunch.time, NaiveTime::from_hms_opt(13, 0, 0));

    let chores = parse_draft("Laundry", today()).expect("non-blank").placed(&params, today());
    let chores = reconciler.add(chores).await.expect("add laundry");
    assert_eq!(chores.date, Some(today()));

    let mut form = EditForm::from_task(&chores);
    form.description = "whites only".to_string();
    form.is_completed = true;
    reconciler
        .edit(&chores.id, form)
        .await
        .expect("edit laundry")
        .expect("laundry present");

    let moved = reconciler
        .reschedule(DropEvent::new(lunch.id.clone(), "2024-05-03".parse().expect("day key")))
        .await
        .expect("move lunch")
        .expect("lunch present");
    assert_eq!(moved.time, NaiveTime::from_hms_opt(13, 0, 0));

    // A fresh bulk read sees exactly what the reconciler holds
    let persisted = TaskIndex::from_tasks(store.list_tasks(&UserId::new("me")).await.expect("list"));
    let local = reconciler.snapshot().await;
    for task in local.iter() {
        assert_eq!(persisted.get(&task.id), Some(task));
    }
    assert_eq!(persisted.len(), local.len());

    let index = reconciler.snapshot().await;
    match compose(index.tasks(), &params, today()) {
        Projection::Week { columns, .. } => {
            assert_eq!(columns[2].tasks.len(), 1);
            assert!(columns[2].is_today);
            assert_eq!(columns[4].tasks[0].title, "Lunch tomorrow 1pm");
        }
        other => panic!("expected week projection, got {:?}", other.kind()),
    }

    let settled = reconciler.clear_completed().await.expect("clear");
    assert_eq!(settled.state, MutationState::Committed);
    assert_eq!(settled.affected, 1);
    assert_eq!(store.list_tasks(&UserId::new("me")).await.expect("list").len(), 1);
    assert!(store.backup_exists().await);
}

#[tokio::test]
async fn failed_store_keeps_local_state_consistent() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("tasks.json");
    let store = Arc::new(JsonFileStore::new(&path));
    let session = Arc::new(ConfiguredSession::signed_in(UserId::new("me")));
    let reconciler = Reconciler::new(store.clone(), session);

    let task = reconciler
        .add(parse_draft("Call the bank", today()).expect("non-blank"))
        .await
        .expect("add");
    let before = reconciler.snapshot().await;

    // Corrupt the document so every later store call fails
    std::fs::write(&path, "{ broken").expect("write garbage");

    let settled = reconciler.toggle(&task.id).await.expect("toggle settles");
    assert_eq!(settled.state, MutationState::RolledBack);
    assert_eq!(reconciler.snapshot().await, before);

    let mut form = EditForm::from_task(&task);
    form.title = "Call the bank again".to_string();
    let rejected = reconciler.edit(&task.id, form.clone()).await.expect_err("edit fails");
    assert_eq!(rejected.input, form);
    assert_eq!(reconciler.snapshot().await, before);

    let rejected = reconciler
        .add(parse_draft("Another one", today()).expect("non-blank"))
        .await
        .expect_err("add fails");
    assert_eq!(rejected.input.title, "Another one");
    assert_eq!(reconciler.snapshot().await, before);
}
