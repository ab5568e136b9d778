use std::time::{Duration, SystemTime, UNIX_EPOCH};

use taskhub_core::models::{CoreErrorKind, SourceType, Task, TaskStatus};
use taskhub_core::persistence::{SortColumn, TaskFilter, TaskStore};
use taskhub_core::sqlite::SqliteStore;

fn at(seconds: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds)
}

fn task(source_id: &str, item: &str, title: &str) -> Task {
    Task {
        id: format!("{source_id}:{item}"),
        source_type: SourceType::GitHub,
        source_item_id: item.to_string(),
        source_id: source_id.to_string(),
        title: title.to_string(),
        description: String::new(),
        status: TaskStatus::Open,
        priority: Task::DEFAULT_PRIORITY,
        assignee: None,
        author: Some("octocat".to_string()),
        source_url: Some(format!("https://github.com/acme/repo/issues/{item}")),
        created_at: at(1_700_000_000),
        updated_at: at(1_700_000_000),
        fetched_at: at(1_700_000_100),
        raw_data: "{}".to_string(),
        cross_refs: Vec::new(),
    }
}

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("in-memory store should open")
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.id.as_str()).collect()
}

#[test]
fn upserting_the_same_task_twice_keeps_one_row_with_latest_values() {
    let store = store();
    let mut first = task("gh", "1", "Fix login");
    first.cross_refs = vec!["PROJ-12".to_string()];
    store.upsert_tasks(&[first.clone()]).unwrap();

    let mut second = first.clone();
    second.title = "Fix login redirect".to_string();
    second.status = TaskStatus::InProgress;
    second.assignee = Some("dev".to_string());
    store.upsert_tasks(&[second.clone()]).unwrap();

    let all = store.get_tasks(&TaskFilter::new()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], second);
    assert_eq!(store.get_task_by_id("gh:1").unwrap(), Some(second));
    assert_eq!(store.get_task_by_id("gh:404").unwrap(), None);
}

#[test]
fn empty_batch_is_accepted() {
    let store = store();
    store.upsert_tasks(&[]).unwrap();
    assert!(store.get_tasks(&TaskFilter::new()).unwrap().is_empty());
}

#[test]
fn batch_with_an_invalid_row_writes_nothing() {
    let store = store();
    let valid = task("gh", "1", "valid");
    let mut clashing = task("gh", "2", "same remote item under another id");
    clashing.source_item_id = "1".to_string();

    let error = store.upsert_tasks(&[valid, clashing]).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::Storage);
    assert_eq!(error.operation, Some("upsert_tasks"));
    assert!(store.get_tasks(&TaskFilter::new()).unwrap().is_empty());
}

#[test]
fn sub_second_timestamps_round_trip_exactly() {
    let store = store();
    let now = SystemTime::now();
    let mut fresh = task("gh", "1", "fetched just now");
    fresh.created_at = now - Duration::from_nanos(1_234_567);
    fresh.updated_at = now - Duration::from_nanos(89);
    fresh.fetched_at = now;

    store.upsert_tasks(&[fresh.clone()]).unwrap();
    store.upsert_tasks(&[fresh.clone()]).unwrap();

    assert_eq!(store.get_task_by_id("gh:1").unwrap(), Some(fresh.clone()));
    assert_eq!(store.get_tasks(&TaskFilter::new()).unwrap(), vec![fresh]);
}

#[test]
fn fetched_before_compares_below_one_second() {
    let store = store();
    let now = SystemTime::now();
    let mut earlier = task("gh", "1", "earlier");
    earlier.fetched_at = now;
    let mut later = task("gh", "2", "later");
    later.fetched_at = now + Duration::from_millis(300);
    store.upsert_tasks(&[earlier, later]).unwrap();

    let stale = store
        .stale_tasks("gh", now + Duration::from_millis(100), 10)
        .unwrap();
    assert_eq!(ids(&stale), vec!["gh:1"]);
}

#[test]
fn out_of_range_priorities_are_clamped_instead_of_failing_the_batch() {
    let store = store();
    let normal = task("gh", "1", "normal");
    let mut unset = task("gh", "2", "no priority");
    unset.priority = 0;
    let mut overflow = task("gh", "3", "too high");
    overflow.priority = 200;

    store.upsert_tasks(&[normal, unset, overflow]).unwrap();

    let stored = |id: &str| store.get_task_by_id(id).unwrap().unwrap().priority;
    assert_eq!(stored("gh:1"), Task::DEFAULT_PRIORITY);
    assert_eq!(stored("gh:2"), Task::MIN_PRIORITY);
    assert_eq!(stored("gh:3"), Task::MAX_PRIORITY);
}

#[test]
fn filters_are_combined() {
    let store = store();
    let mut done = task("gh", "1", "Ship release");
    done.status = TaskStatus::Done;
    done.priority = 1;
    let open = task("gh", "2", "Write docs");
    let mut other_source = task("jira", "PROJ-1", "Ship release notes");
    other_source.source_type = SourceType::Jira;
    other_source.priority = 1;
    store.upsert_tasks(&[done, open, other_source]).unwrap();

    let by_source = store.get_tasks(&TaskFilter::new().source("gh")).unwrap();
    assert_eq!(by_source.len(), 2);

    let by_type = store
        .get_tasks(&TaskFilter::new().source_type(SourceType::Jira))
        .unwrap();
    assert_eq!(ids(&by_type), vec!["jira:PROJ-1"]);

    let by_status = store
        .get_tasks(&TaskFilter::new().status(TaskStatus::Done))
        .unwrap();
    assert_eq!(ids(&by_status), vec!["gh:1"]);

    let urgent_in_gh = store
        .get_tasks(&TaskFilter::new().source("gh").priority(1))
        .unwrap();
    assert_eq!(ids(&urgent_in_gh), vec!["gh:1"]);
}

#[test]
fn query_matches_title_or_description_case_insensitively() {
    let store = store();
    let title_hit = task("gh", "1", "Crash on STARTUP");
    let mut description_hit = task("gh", "2", "Unrelated");
    description_hit.description = "happens during startup only".to_string();
    let miss = task("gh", "3", "Something else");
    store.upsert_tasks(&[title_hit, description_hit, miss]).unwrap();

    let mut matched = ids(&store.get_tasks(&TaskFilter::new().query("startup")).unwrap())
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    matched.sort();
    assert_eq!(matched, vec!["gh:1", "gh:2"]);

    let blank = store.get_tasks(&TaskFilter::new().query("   ")).unwrap();
    assert_eq!(blank.len(), 3);
}

#[test]
fn query_wildcards_are_matched_literally() {
    let store = store();
    let percent = task("gh", "1", "Coverage at 100% now");
    let plain = task("gh", "2", "Coverage at 1000 lines");
    store.upsert_tasks(&[percent, plain]).unwrap();

    let matched = store.get_tasks(&TaskFilter::new().query("100%")).unwrap();
    assert_eq!(ids(&matched), vec!["gh:1"]);

    let underscore = store.get_tasks(&TaskFilter::new().query("at_1")).unwrap();
    assert!(underscore.is_empty());
}

#[test]
fn query_text_is_never_spliced_into_sql() {
    let store = store();
    store.upsert_tasks(&[task("gh", "1", "harmless")]).unwrap();

    let hostile = store
        .get_tasks(&TaskFilter::new().query("'; DROP TABLE tasks; --"))
        .unwrap();
    assert!(hostile.is_empty());
    assert_eq!(store.get_tasks(&TaskFilter::new()).unwrap().len(), 1);
}

#[test]
fn default_order_is_most_recently_updated_first() {
    let store = store();
    let mut older = task("gh", "1", "older");
    older.updated_at = at(1_700_000_000);
    let mut newer = task("gh", "2", "newer");
    newer.updated_at = at(1_700_050_000);
    store.upsert_tasks(&[older, newer]).unwrap();

    let listed = store.get_tasks(&TaskFilter::new()).unwrap();
    assert_eq!(ids(&listed), vec!["gh:2", "gh:1"]);
}

#[test]
fn sort_and_pagination_follow_the_filter() {
    let store = store();
    let batch = (1..=5)
        .map(|n| {
            let mut item = task("gh", &n.to_string(), &format!("task {n}"));
            item.priority = n as u8;
            item
        })
        .collect::<Vec<_>>();
    store.upsert_tasks(&batch).unwrap();

    let ascending = store
        .get_tasks(&TaskFilter::new().sort_by(SortColumn::Priority, false))
        .unwrap();
    assert_eq!(ids(&ascending), vec!["gh:1", "gh:2", "gh:3", "gh:4", "gh:5"]);

    let second_page = store
        .get_tasks(
            &TaskFilter::new()
                .sort_by(SortColumn::Priority, true)
                .page(2, 2),
        )
        .unwrap();
    assert_eq!(ids(&second_page), vec!["gh:3", "gh:2"]);

    let past_the_end = store
        .get_tasks(&TaskFilter::new().page(10, 50))
        .unwrap();
    assert!(past_the_end.is_empty());
}

#[test]
fn sort_column_names_come_from_a_fixed_set() {
    assert_eq!("priority".parse::<SortColumn>(), Ok(SortColumn::Priority));
    assert!("title; DROP TABLE tasks".parse::<SortColumn>().is_err());
}

#[test]
fn known_task_ids_reports_only_stored_ids() {
    let store = store();
    store
        .upsert_tasks(&[task("gh", "1", "a"), task("gh", "2", "b")])
        .unwrap();

    let known = store
        .known_task_ids(&["gh:1".to_string(), "gh:3".to_string()])
        .unwrap();
    assert!(known.contains("gh:1"));
    assert!(!known.contains("gh:3"));
    assert_eq!(known.len(), 1);
    assert!(store.known_task_ids(&[]).unwrap().is_empty());
}

#[test]
fn known_task_ids_handles_lookups_larger_than_one_statement() {
    let store = store();
    let batch = (0..1200)
        .map(|n| task("gh", &n.to_string(), "bulk"))
        .collect::<Vec<_>>();
    store.upsert_tasks(&batch).unwrap();

    let lookup = batch.iter().map(|task| task.id.clone()).collect::<Vec<_>>();
    assert_eq!(store.known_task_ids(&lookup).unwrap().len(), 1200);
}

#[test]
fn stale_tasks_are_listed_oldest_first_per_source() {
    let store = store();
    let mut oldest = task("gh", "1", "oldest");
    oldest.fetched_at = at(1_000);
    let mut old = task("gh", "2", "old");
    old.fetched_at = at(2_000);
    let mut fresh = task("gh", "3", "fresh");
    fresh.fetched_at = at(9_000);
    let mut other = task("jira", "X-1", "other source");
    other.fetched_at = at(500);
    store.upsert_tasks(&[fresh, old, oldest, other]).unwrap();

    let stale = store.stale_tasks("gh", at(5_000), 10).unwrap();
    assert_eq!(ids(&stale), vec!["gh:1", "gh:2"]);

    let limited = store.stale_tasks("gh", at(5_000), 1).unwrap();
    assert_eq!(ids(&limited), vec!["gh:1"]);
}
