use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::confirm::ConfirmPrompt;
use crate::error::{BoardError, BoardResult};
use crate::gateway::{
    decode_row, decode_rows, encode_row, DataGateway, Filter, Order, SelectQuery, Table,
};
use crate::models::{Id, NewPost, NewThread, Thread};
use crate::pager::{page_range, PageWindow};

/// Everything the presentation layer needs to render the thread index.
/// Owned by the controller; there is no ambient view state.
#[derive(Debug, Clone)]
pub struct ThreadListState {
    pub threads: Vec<Thread>,
    pub page_index: u64,
    pub page_size: u64,
    pub total_count: u64,
}

impl ThreadListState {
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page_index, self.page_size, self.total_count)
    }
}

/// Identifies one issued load. A completion whose token is no longer the
/// latest issued is discarded, so a slow early response can never clobber
/// the result of a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(pub(crate) u64);

/// Fetched page contents, held apart from controller state until applied.
#[derive(Debug, Clone)]
pub struct ThreadPage {
    pub page_index: u64,
    pub threads: Vec<Thread>,
    pub total_count: u64,
}

pub struct ThreadListController {
    gateway: Arc<dyn DataGateway>,
    state: ThreadListState,
    load_generation: u64,
}

impl ThreadListController {
    pub fn new(gateway: Arc<dyn DataGateway>, page_size: u64) -> Self {
        Self {
            gateway,
            state: ThreadListState {
                threads: Vec::new(),
                page_index: 1,
                page_size: page_size.max(1),
                total_count: 0,
            },
            load_generation: 0,
        }
    }

    pub fn state(&self) -> &ThreadListState {
        &self.state
    }

    /// Issues the token for a new load; every load begun earlier is stale
    /// from this point on.
    pub fn begin_load(&mut self) -> LoadToken {
        self.load_generation += 1;
        LoadToken(self.load_generation)
    }

    /// Side-effect-free fetch of one page: rows in the page range, newest
    /// first, plus the exact total.
    pub async fn fetch_page(&self, page_index: u64) -> BoardResult<ThreadPage> {
        let page_index = page_index.max(1);
        let rows = self
            .gateway
            .select(
                Table::Threads,
                SelectQuery {
                    filter: None,
                    order: Some(Order::desc("created_at")),
                    range: Some(page_range(page_index, self.state.page_size)),
                },
            )
            .await?;
        let threads = decode_rows(rows)?;
        let total_count = self.gateway.select_count(Table::Threads, None).await?;
        Ok(ThreadPage { page_index, threads, total_count })
    }

    /// Returns false when the token is stale and the page was dropped.
    pub fn apply(&mut self, token: LoadToken, page: ThreadPage) -> bool {
        if token != LoadToken(self.load_generation) {
            debug!(
                token = token.0,
                current = self.load_generation,
                "discarding stale thread page"
            );
            return false;
        }
        self.state.threads = page.threads;
        self.state.page_index = page.page_index;
        self.state.total_count = page.total_count;
        true
    }

    /// Replaces `threads` and `total_count` with the given page. On failure
    /// the prior state stays displayed.
    pub async fn load(&mut self, page_index: u64) -> BoardResult<()> {
        let token = self.begin_load();
        match self.fetch_page(page_index).await {
            Ok(page) => {
                self.apply(token, page);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "thread list load failed");
                Err(e)
            }
        }
    }

    /// Creates the thread and mirrors its description as the thread's first
    /// post. An empty title never reaches the network (returns `None`).
    ///
    /// The two inserts are not atomic: if the post insert fails the thread
    /// is left behind with zero posts and `PartialCreation` is surfaced, no
    /// compensating rollback runs. On success callers get the new thread so
    /// they can navigate to its view.
    pub async fn create(&mut self, title: &str, description: &str) -> BoardResult<Option<Thread>> {
        if title.trim().is_empty() {
            warn!("ignoring thread creation with empty title");
            return Ok(None);
        }
        let new_thread = NewThread {
            title: title.to_string(),
            description: description.to_string(),
        };
        let rows = self
            .gateway
            .insert(Table::Threads, vec![encode_row(&new_thread)?])
            .await?;
        let row = rows.into_iter().next().ok_or(BoardError::NotFound)?;
        let thread: Thread = decode_row(row)?;
        let first_post = NewPost {
            thread_id: thread.id,
            content: description.to_string(),
        };
        if let Err(source) = self
            .gateway
            .insert(Table::Posts, vec![encode_row(&first_post)?])
            .await
        {
            error!(
                thread_id = thread.id,
                error = %source,
                "first post insert failed after thread insert; thread is orphaned"
            );
            return Err(BoardError::PartialCreation { thread_id: thread.id, source });
        }
        info!(thread_id = thread.id, "created thread");
        Ok(Some(thread))
    }

    /// Deletes a thread behind the confirmation gate, then reloads the
    /// current page. Declined confirmation means no gateway call at all.
    /// Posts and comments under the thread are left in place (no cascade).
    pub async fn delete(&mut self, thread_id: Id, confirm: &dyn ConfirmPrompt) -> BoardResult<bool> {
        if !confirm.confirm("Delete this thread? This cannot be undone.") {
            return Ok(false);
        }
        self.gateway
            .delete(Table::Threads, Filter::eq("id", thread_id))
            .await?;
        info!(thread_id, "deleted thread");
        self.load(self.state.page_index).await?;
        Ok(true)
    }

    /// No-op when the target page is outside `[1, total_pages]`.
    pub async fn goto_page(&mut self, page_index: u64) -> BoardResult<()> {
        if !self.state.window().contains_page(page_index) {
            return Ok(());
        }
        self.load(page_index).await
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
