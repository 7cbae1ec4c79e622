use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::confirm::ConfirmPrompt;
use crate::error::BoardResult;
use crate::gateway::{
    decode_row, decode_rows, encode_row, DataGateway, Filter, Order, SelectQuery, Table,
};
use crate::models::{Comment, Id, NewComment, NewPost, Post, Thread};
use crate::pager::{page_range, PageWindow};
use crate::thread_list::LoadToken;

/// Render state for a single thread: the thread itself (absent when the id
/// matched nothing), one page of its posts, and the comments of those posts.
#[derive(Debug, Clone)]
pub struct ThreadViewState {
    pub thread: Option<Thread>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub page_index: u64,
    pub page_size: u64,
    pub total_post_count: u64,
    pub loading: bool,
    /// The post whose inline comment form is open. At most one at a time.
    pub selected_post_id: Option<Id>,
}

impl ThreadViewState {
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page_index, self.page_size, self.total_post_count)
    }

    /// Comments of one post, in loaded order.
    pub fn comments_for(&self, post_id: Id) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(move |c| c.post_id == post_id)
    }
}

/// Fetched view contents, applied to state only while still current.
#[derive(Debug, Clone)]
pub struct ThreadViewSnapshot {
    pub page_index: u64,
    pub thread: Option<Thread>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub total_post_count: u64,
}

pub struct ThreadViewController {
    gateway: Arc<dyn DataGateway>,
    thread_id: Option<Id>,
    state: ThreadViewState,
    load_generation: u64,
}

impl ThreadViewController {
    pub fn new(gateway: Arc<dyn DataGateway>, page_size: u64) -> Self {
        Self {
            gateway,
            thread_id: None,
            state: ThreadViewState {
                thread: None,
                posts: Vec::new(),
                comments: Vec::new(),
                page_index: 1,
                page_size: page_size.max(1),
                total_post_count: 0,
                loading: false,
                selected_post_id: None,
            },
            load_generation: 0,
        }
    }

    pub fn state(&self) -> &ThreadViewState {
        &self.state
    }

    pub fn begin_load(&mut self) -> LoadToken {
        self.load_generation += 1;
        LoadToken(self.load_generation)
    }

    /// Side-effect-free fetch: the thread by exact id, one page of its posts
    /// oldest first, the exact post count, and the comments belonging to the
    /// loaded posts. A missing thread is reported in the snapshot as `None`,
    /// not as an error; the view still renders.
    pub async fn fetch(&self, thread_id: Id, page_index: u64) -> BoardResult<ThreadViewSnapshot> {
        let page_index = page_index.max(1);
        let thread_rows = self
            .gateway
            .select(
                Table::Threads,
                SelectQuery {
                    filter: Some(Filter::eq("id", thread_id)),
                    ..Default::default()
                },
            )
            .await?;
        let thread = match thread_rows.into_iter().next() {
            Some(row) => Some(decode_row::<Thread>(row)?),
            None => {
                warn!(thread_id, "thread not found");
                None
            }
        };

        let post_rows = self
            .gateway
            .select(
                Table::Posts,
                SelectQuery {
                    filter: Some(Filter::eq("thread_id", thread_id)),
                    order: Some(Order::asc("created_at")),
                    range: Some(page_range(page_index, self.state.page_size)),
                },
            )
            .await?;
        let posts: Vec<Post> = decode_rows(post_rows)?;
        let total_post_count = self
            .gateway
            .select_count(Table::Posts, Some(Filter::eq("thread_id", thread_id)))
            .await?;

        let comments = if posts.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<Id> = posts.iter().map(|p| p.id).collect();
            let rows = self
                .gateway
                .select(
                    Table::Comments,
                    SelectQuery {
                        filter: Some(Filter::any_of("post_id", ids)),
                        order: Some(Order::asc("created_at")),
                        ..Default::default()
                    },
                )
                .await?;
            decode_rows(rows)?
        };

        Ok(ThreadViewSnapshot { page_index, thread, posts, comments, total_post_count })
    }

    /// Returns false when the token is stale and the snapshot was dropped.
    pub fn apply(&mut self, token: LoadToken, snapshot: ThreadViewSnapshot) -> bool {
        if token != LoadToken(self.load_generation) {
            debug!(
                token = token.0,
                current = self.load_generation,
                "discarding stale thread view"
            );
            return false;
        }
        self.state.thread = snapshot.thread;
        self.state.posts = snapshot.posts;
        self.state.comments = snapshot.comments;
        self.state.page_index = snapshot.page_index;
        self.state.total_post_count = snapshot.total_post_count;
        true
    }

    /// Loads the view for `thread_id`. An absent id fails fast: logged, no
    /// fetch, no state change. `loading` is cleared on success and failure
    /// alike so the indicator never sticks.
    pub async fn load(&mut self, thread_id: Option<Id>, page_index: u64) -> BoardResult<()> {
        let Some(id) = thread_id else {
            warn!("thread id missing; cannot load thread view");
            return Ok(());
        };
        self.thread_id = Some(id);
        let token = self.begin_load();
        self.state.loading = true;
        let result = self.fetch(id, page_index).await;
        self.state.loading = false;
        match result {
            Ok(snapshot) => {
                self.apply(token, snapshot);
                Ok(())
            }
            Err(e) => {
                error!(thread_id = id, error = %e, "thread view load failed");
                Err(e)
            }
        }
    }

    /// Reload-after-mutation policy: every successful write refetches the
    /// whole current page instead of patching state incrementally, so posts,
    /// comments and counts can never go stale.
    pub async fn reload(&mut self) -> BoardResult<()> {
        self.load(self.thread_id, self.state.page_index).await
    }

    /// No-op on empty content.
    pub async fn add_post(&mut self, content: &str) -> BoardResult<()> {
        if content.trim().is_empty() {
            return Ok(());
        }
        let Some(thread_id) = self.thread_id else {
            warn!("no thread loaded; dropping post");
            return Ok(());
        };
        let new_post = NewPost { thread_id, content: content.to_string() };
        self.gateway
            .insert(Table::Posts, vec![encode_row(&new_post)?])
            .await?;
        info!(thread_id, "added post");
        self.reload().await
    }

    /// Submitting the form empty closes it without inserting anything
    /// (cancel-by-empty-submit). Otherwise the comment is inserted, the form
    /// closes, and the page reloads.
    pub async fn add_comment(&mut self, post_id: Id, content: &str) -> BoardResult<()> {
        if content.trim().is_empty() {
            self.state.selected_post_id = None;
            return Ok(());
        }
        let new_comment = NewComment { post_id, content: content.to_string() };
        self.gateway
            .insert(Table::Comments, vec![encode_row(&new_comment)?])
            .await?;
        info!(post_id, "added comment");
        self.state.selected_post_id = None;
        self.reload().await
    }

    /// Deletes a post behind the confirmation gate. Its comments are left
    /// in place server-side (no cascade) and simply stop being listed once
    /// their parent post is gone.
    pub async fn delete_post(&mut self, post_id: Id, confirm: &dyn ConfirmPrompt) -> BoardResult<bool> {
        if !confirm.confirm("Delete this post? This cannot be undone.") {
            return Ok(false);
        }
        self.gateway
            .delete(Table::Posts, Filter::eq("id", post_id))
            .await?;
        info!(post_id, "deleted post");
        self.reload().await?;
        Ok(true)
    }

    /// Toggles the inline comment form for `post_id`; opening one post's
    /// form closes any other.
    pub fn select_post_for_comment(&mut self, post_id: Id) {
        self.state.selected_post_id = if self.state.selected_post_id == Some(post_id) {
            None
        } else {
            Some(post_id)
        };
    }

    /// No-op when the target page is outside `[1, total_pages]`.
    pub async fn goto_page(&mut self, page_index: u64) -> BoardResult<()> {
        if !self.state.window().contains_page(page_index) {
            return Ok(());
        }
        self.load(self.thread_id, page_index).await
    }

    pub async fn next_page(&mut self) -> BoardResult<()> {
        self.goto_page(self.state.page_index + 1).await
    }

    pub async fn prev_page(&mut self) -> BoardResult<()> {
        if self.state.page_index <= 1 {
            return Ok(());
        }
        self.goto_page(self.state.page_index - 1).await
    }
}
