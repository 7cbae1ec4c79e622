use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use sevench::confirm::{AlwaysConfirm, ConfirmPrompt};
use sevench::error::BoardError;
use sevench::gateway::{
    inmem::InMemGateway, DataGateway, Filter, GatewayError, GatewayResult, SelectQuery, Table,
};
use sevench::models::{Post, Thread};
use sevench::thread_list::ThreadListController;
use sevench::thread_view::ThreadViewController;

/// Gateway wrapper that counts calls and can inject failures, so tests can
/// assert which operations actually hit the backend.
#[derive(Default)]
struct Harness {
    inner: InMemGateway,
    selects: AtomicUsize,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
    fail_all: AtomicBool,
    fail_post_insert: AtomicBool,
}

impl Harness {
    fn unavailable() -> GatewayError {
        GatewayError::Status { status: 503, body: "unavailable".into() }
    }
}

#[async_trait::async_trait]
impl DataGateway for Harness {
    async fn select(&self, table: Table, query: SelectQuery) -> GatewayResult<Vec<Value>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.select(table, query).await
    }

    async fn select_count(&self, table: Table, filter: Option<Filter>) -> GatewayResult<u64> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.select_count(table, filter).await
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> GatewayResult<Vec<Value>> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst)
            || (table == Table::Posts && self.fail_post_insert.load(Ordering::SeqCst))
        {
            return Err(Self::unavailable());
        }
        self.inner.insert(table, rows).await
    }

    async fn delete(&self, table: Table, filter: Filter) -> GatewayResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.delete(table, filter).await
    }
}

struct Decline;

impl ConfirmPrompt for Decline {
    fn confirm(&self, _message: &str) -> bool {
        false
    }
}

fn harness() -> Arc<Harness> {
    Arc::new(Harness::default())
}

async fn posts_of(gw: &dyn DataGateway, thread_id: i64) -> Vec<Post> {
    let rows = gw
        .select(
            Table::Posts,
            SelectQuery { filter: Some(Filter::eq("thread_id", thread_id)), ..Default::default() },
        )
        .await
        .unwrap();
    sevench::gateway::decode_rows(rows).unwrap()
}

/// Creates a thread through the collection controller and returns it.
async fn seed_thread(ctrl: &mut ThreadListController, title: &str, description: &str) -> Thread {
    // keep created_at strictly increasing for ordering assertions
    tokio::time::sleep(Duration::from_millis(2)).await;
    ctrl.create(title, description).await.unwrap().unwrap()
}

#[tokio::test]
async fn create_mirrors_description_as_first_post() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);

    let thread = list.create("Hello", "World").await.unwrap().unwrap();
    assert_eq!(thread.title, "Hello");
    assert_eq!(thread.description, "World");

    let posts = posts_of(gw.as_ref(), thread.id).await;
    assert_eq!(posts.len(), 1, "exactly one first post");
    assert_eq!(posts[0].content, "World");
    assert_eq!(posts[0].thread_id, thread.id);
}

#[tokio::test]
async fn create_with_empty_title_never_reaches_the_gateway() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);

    assert!(list.create("   ", "body").await.unwrap().is_none());
    assert_eq!(gw.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn first_post_failure_surfaces_partial_creation_and_leaves_orphan() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    gw.fail_post_insert.store(true, Ordering::SeqCst);

    let err = list.create("Hello", "World").await.unwrap_err();
    let thread_id = match err {
        BoardError::PartialCreation { thread_id, .. } => thread_id,
        other => panic!("expected PartialCreation, got {other}"),
    };

    // the thread row stays behind with zero posts; nothing rolls it back
    let count = gw.select_count(Table::Threads, None).await.unwrap();
    assert_eq!(count, 1);
    assert!(posts_of(gw.as_ref(), thread_id).await.is_empty());
}

#[tokio::test]
async fn thread_list_pages_newest_first() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    for i in 1..=7 {
        seed_thread(&mut list, &format!("t{i}"), "").await;
    }

    list.load(1).await.unwrap();
    let s = list.state();
    assert_eq!(s.total_count, 7);
    let titles: Vec<&str> = s.threads.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["t7", "t6", "t5", "t4", "t3"]);
    let w = s.window();
    assert_eq!(w.total_pages(), 2);
    assert!(!w.has_previous());
    assert!(w.has_next());

    list.next_page().await.unwrap();
    let s = list.state();
    assert_eq!(s.page_index, 2);
    let titles: Vec<&str> = s.threads.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["t2", "t1"]);
    assert!(s.window().has_previous());
    assert!(!s.window().has_next());

    // past the last page: clamped no-op
    list.next_page().await.unwrap();
    assert_eq!(list.state().page_index, 2);
    list.goto_page(99).await.unwrap();
    assert_eq!(list.state().page_index, 2);
}

#[tokio::test]
async fn reload_with_unchanged_data_is_idempotent() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "stable", "first").await;

    list.load(1).await.unwrap();
    let before = list.state().clone();
    list.load(1).await.unwrap();
    assert_eq!(list.state().threads, before.threads);
    assert_eq!(list.state().total_count, before.total_count);
    assert_eq!(list.state().page_index, before.page_index);

    let mut view = ThreadViewController::new(gw, 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let before = view.state().clone();
    view.load(Some(thread.id), 1).await.unwrap();
    assert_eq!(view.state().thread, before.thread);
    assert_eq!(view.state().posts, before.posts);
    assert_eq!(view.state().comments, before.comments);
}

#[tokio::test]
async fn declined_confirmation_issues_no_delete_call() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    seed_thread(&mut list, "keep me", "").await;
    list.load(1).await.unwrap();

    let deleted = list.delete(list.state().threads[0].id, &Decline).await.unwrap();
    assert!(!deleted);
    assert_eq!(gw.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(list.state().threads.len(), 1);
}

#[tokio::test]
async fn confirmed_thread_delete_reloads_but_leaves_posts_behind() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "doomed", "orphan-to-be").await;
    list.load(1).await.unwrap();

    assert!(list.delete(thread.id, &AlwaysConfirm).await.unwrap());
    assert_eq!(list.state().total_count, 0);
    assert!(list.state().threads.is_empty());

    // no cascade: the first post survives its thread
    assert_eq!(posts_of(gw.as_ref(), thread.id).await.len(), 1);
}

#[tokio::test]
async fn view_loads_thread_posts_and_scoped_comments() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let ours = seed_thread(&mut list, "ours", "op").await;
    let other = seed_thread(&mut list, "other", "other-op").await;

    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(Some(ours.id), 1).await.unwrap();
    view.add_post("reply").await.unwrap();

    // a comment on the other thread's post must not leak into our view
    let other_post = posts_of(gw.as_ref(), other.id).await.remove(0);
    let our_post = view.state().posts[0].clone();
    view.add_comment(our_post.id, "on ours").await.unwrap();
    gw.insert(
        Table::Comments,
        vec![serde_json::json!({ "post_id": other_post.id, "content": "elsewhere" })],
    )
    .await
    .unwrap();

    view.reload().await.unwrap();
    let s = view.state();
    assert_eq!(s.thread.as_ref().unwrap().id, ours.id);
    assert_eq!(s.total_post_count, 2);
    // posts come back oldest first
    let contents: Vec<&str> = s.posts.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, ["op", "reply"]);
    assert_eq!(s.comments.len(), 1);
    assert_eq!(s.comments[0].content, "on ours");
    assert!(!s.loading);
}

#[tokio::test]
async fn missing_thread_is_rendered_not_raised() {
    let gw = harness();
    let mut view = ThreadViewController::new(gw, 5);
    view.load(Some(999), 1).await.unwrap();
    assert!(view.state().thread.is_none());
    assert!(view.state().posts.is_empty());
    assert!(!view.state().loading);
}

#[tokio::test]
async fn absent_thread_id_fails_fast_without_fetching() {
    let gw = harness();
    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(None, 1).await.unwrap();
    assert_eq!(gw.selects.load(Ordering::SeqCst), 0);
    assert!(!view.state().loading);
}

#[tokio::test]
async fn empty_post_submit_is_a_noop() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "t", "op").await;

    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let inserts_before = gw.inserts.load(Ordering::SeqCst);
    view.add_post("   ").await.unwrap();
    assert_eq!(gw.inserts.load(Ordering::SeqCst), inserts_before);
    assert_eq!(view.state().total_post_count, 1);
}

#[tokio::test]
async fn empty_comment_submit_closes_the_form_without_inserting() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "t", "op").await;

    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let post_id = view.state().posts[0].id;

    view.select_post_for_comment(post_id);
    assert_eq!(view.state().selected_post_id, Some(post_id));

    let inserts_before = gw.inserts.load(Ordering::SeqCst);
    view.add_comment(post_id, "").await.unwrap();
    assert_eq!(view.state().selected_post_id, None);
    assert_eq!(gw.inserts.load(Ordering::SeqCst), inserts_before);
    assert!(view.state().comments.is_empty());
}

#[tokio::test]
async fn comment_form_toggles_and_is_exclusive() {
    let gw = harness();
    let mut view = ThreadViewController::new(gw, 5);

    view.select_post_for_comment(1);
    assert_eq!(view.state().selected_post_id, Some(1));
    view.select_post_for_comment(2);
    assert_eq!(view.state().selected_post_id, Some(2));
    view.select_post_for_comment(2);
    assert_eq!(view.state().selected_post_id, None);
}

#[tokio::test]
async fn successful_comment_closes_form_and_reloads() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "t", "op").await;

    let mut view = ThreadViewController::new(gw, 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let post_id = view.state().posts[0].id;

    view.select_post_for_comment(post_id);
    view.add_comment(post_id, "nice post").await.unwrap();
    assert_eq!(view.state().selected_post_id, None);
    let comments: Vec<&str> = view
        .state()
        .comments_for(post_id)
        .map(|c| c.content.as_str())
        .collect();
    assert_eq!(comments, ["nice post"]);
}

#[tokio::test]
async fn declined_post_delete_changes_nothing() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "t", "op").await;

    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let post_id = view.state().posts[0].id;

    assert!(!view.delete_post(post_id, &Decline).await.unwrap());
    assert_eq!(gw.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(view.state().posts.len(), 1);
}

#[tokio::test]
async fn deleting_a_post_leaves_its_comments_dangling() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "t", "op").await;

    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let post_id = view.state().posts[0].id;
    view.add_comment(post_id, "soon invisible").await.unwrap();

    assert!(view.delete_post(post_id, &AlwaysConfirm).await.unwrap());
    assert!(view.state().posts.is_empty());
    assert!(view.state().comments.is_empty());

    // the comment row survives server-side, just unreachable from the view
    let dangling = gw
        .select_count(Table::Comments, Some(Filter::eq("post_id", post_id)))
        .await
        .unwrap();
    assert_eq!(dangling, 1);
}

#[tokio::test]
async fn stale_load_completion_is_discarded() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    for i in 1..=7 {
        seed_thread(&mut list, &format!("t{i}"), "").await;
    }

    // simulate two overlapping loads completing out of order
    let slow_token = list.begin_load();
    let slow_page = list.fetch_page(1).await.unwrap();
    let fast_token = list.begin_load();
    let fast_page = list.fetch_page(2).await.unwrap();

    assert!(list.apply(fast_token, fast_page));
    assert!(!list.apply(slow_token, slow_page), "stale page must be dropped");
    assert_eq!(list.state().page_index, 2);
    let titles: Vec<&str> = list.state().threads.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["t2", "t1"]);
}

#[tokio::test]
async fn stale_view_completion_is_discarded() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let first = seed_thread(&mut list, "first", "op1").await;
    let second = seed_thread(&mut list, "second", "op2").await;

    // user opens one thread, then navigates to another before the first
    // response lands
    let mut view = ThreadViewController::new(gw, 5);
    let slow_token = view.begin_load();
    let slow_snapshot = view.fetch(first.id, 1).await.unwrap();
    let fast_token = view.begin_load();
    let fast_snapshot = view.fetch(second.id, 1).await.unwrap();

    assert!(view.apply(fast_token, fast_snapshot));
    assert!(!view.apply(slow_token, slow_snapshot), "stale view must be dropped");
    let s = view.state();
    assert_eq!(s.thread.as_ref().unwrap().id, second.id);
    let contents: Vec<&str> = s.posts.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, ["op2"]);
}

#[tokio::test]
async fn gateway_failure_keeps_prior_state_and_clears_loading() {
    let gw = harness();
    let mut list = ThreadListController::new(gw.clone(), 5);
    let thread = seed_thread(&mut list, "t", "op").await;

    let mut view = ThreadViewController::new(gw.clone(), 5);
    view.load(Some(thread.id), 1).await.unwrap();
    let posts_before = view.state().posts.clone();

    gw.fail_all.store(true, Ordering::SeqCst);
    let err = view.add_post("lost").await.unwrap_err();
    assert!(matches!(err, BoardError::Gateway(GatewayError::Status { status: 503, .. })));
    assert!(view.reload().await.is_err());

    // prior state stays displayed, loading indicator is not stuck
    assert_eq!(view.state().posts, posts_before);
    assert!(!view.state().loading);
}
