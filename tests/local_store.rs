//! Local adapter behavior through the public store API: slot layout on
//! disk, reopening, and cascade semantics.

use chrono::{DateTime, TimeZone, Utc};
use kanri::model::{Profile, Project, Task, TaskDraft, TaskStatus};
use kanri::store::local::{LocalStore, PROJECTS_SLOT};
use kanri::store::{ProfileStore, ProjectStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use uuid::Uuid;

fn at(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, d, 9, 0, 0).unwrap()
}

/// A fully deterministic collection, for pinning the slot layout
fn fixed_collection() -> Vec<Project> {
    let project_id = Uuid::from_u128(1);
    let task = Task {
        id: Uuid::from_u128(2),
        project_id,
        title: "Draft outline".to_string(),
        description: None,
        notes: None,
        deadline: Some(at(10)),
        status: TaskStatus::Todo,
        xp_reward: 10,
        focus_time: 0,
        created_at: at(1),
        updated_at: at(1),
    };
    vec![Project {
        id: project_id,
        user_id: Uuid::nil(),
        name: "Thesis".to_string(),
        description: Some("final paper".to_string()),
        tasks: vec![task],
        created_at: at(1),
        updated_at: at(1),
    }]
}

// ============================================================================
// Slot layout
// ============================================================================

#[test]
fn test_projects_slot_layout() {
    let collection = fixed_collection();
    let json = serde_json::to_string_pretty(&collection).unwrap();
    insta::assert_snapshot!(json);

    // the slot is the serde encoding and nothing else: writing it by hand
    // and reading through the adapter yields the same collection
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(PROJECTS_SLOT), &json).unwrap();
    let mut store = LocalStore::open(tmp.path()).unwrap();
    assert_eq!(store.list_projects(Uuid::nil()).unwrap(), collection);
}

#[test]
fn test_mutations_are_readable_after_reopen() {
    let tmp = TempDir::new().unwrap();
    let project_id;
    let kept;
    {
        let mut store = LocalStore::open(tmp.path()).unwrap();
        let project = store
            .create_project(Uuid::nil(), "Thesis", Some("final paper"))
            .unwrap();
        project_id = project.id;
        kept = store.add_task(project.id, &TaskDraft::new("keep")).unwrap();
        let gone = store.add_task(project.id, &TaskDraft::new("drop")).unwrap();
        store.delete_task(gone.id).unwrap();
    }

    let mut store = LocalStore::open(tmp.path()).unwrap();
    let projects = store.list_projects(Uuid::nil()).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project_id);
    assert_eq!(projects[0].tasks, vec![kept]);
}

// ============================================================================
// Cascades and error shapes
// ============================================================================

#[test]
fn test_project_delete_cascades_to_every_task() {
    let tmp = TempDir::new().unwrap();
    let mut store = LocalStore::open(tmp.path()).unwrap();
    let project = store.create_project(Uuid::nil(), "Thesis", None).unwrap();
    let task_ids: Vec<Uuid> = (0..3)
        .map(|i| {
            store
                .add_task(project.id, &TaskDraft::new(format!("task {i}")))
                .unwrap()
                .id
        })
        .collect();

    store.delete_project(project.id).unwrap();
    assert!(store.list_projects(Uuid::nil()).unwrap().is_empty());
    for task_id in task_ids {
        // the tasks went with the project: updates now miss
        assert!(store
            .update_task(task_id, &Default::default())
            .is_err());
    }
    // deleting the project again is a no-op
    store.delete_project(project.id).unwrap();
}

#[test]
fn test_malformed_slot_is_an_error_not_a_panic() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(PROJECTS_SLOT), "[{\"id\":").unwrap();
    assert!(LocalStore::open(tmp.path()).is_err());
}

#[test]
fn test_profile_slot_is_independent_of_projects() {
    let tmp = TempDir::new().unwrap();
    let profile = Profile::new(Uuid::nil(), "Developer", at(1));
    {
        let mut store = LocalStore::open(tmp.path()).unwrap();
        store.create_project(Uuid::nil(), "Thesis", None).unwrap();
        store.save_profile(&profile).unwrap();
    }
    let mut store = LocalStore::open(tmp.path()).unwrap();
    assert_eq!(store.load_profile(Uuid::nil()).unwrap(), Some(profile));
    assert_eq!(store.list_projects(Uuid::nil()).unwrap().len(), 1);
}
