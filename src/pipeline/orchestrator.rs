// src/pipeline/orchestrator.rs

//! Crawl orchestrator.
//!
//! Walks leaf categories on a category-level pool, fans every match link
//! out to a match-level pool and streams results back over a channel. Each
//! spawned task owns its [`TaskContext`]; nothing is looked up from shared
//! state to find out which category a task belongs to.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{AppError, Result};
use crate::models::{
    CategoryPath, Config, CrawlerConfig, LeafCategory, Match, NoInfoEntry, NoInfoReason,
};
use crate::services::{
    ListingPageParser, MatchLink, MatchPageParser, PageFetcher, ParseOutcome,
};
use crate::utils::url::normalize;

/// Category path and display order carried by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub path: CategoryPath,
    pub order: usize,
}

impl From<&LeafCategory> for TaskContext {
    fn from(leaf: &LeafCategory) -> Self {
        Self {
            path: leaf.path.clone(),
            order: leaf.order,
        }
    }
}

/// Terminal state of a crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStatus {
    Completed,
    /// Stopped by the external cancellation signal
    Interrupted,
    /// First unexpected error; partial results stay valid
    Failed(String),
}

impl CrawlStatus {
    /// Short label stored next to the results.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed(_) => "failed",
        }
    }
}

/// Progress reported while a crawl runs.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Match(Match),
    NoInfo(NoInfoEntry),
    /// Always the last event of a run
    Finished(CrawlStatus),
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub matches: Vec<Match>,
    pub no_info: Vec<NoInfoEntry>,
    pub status: CrawlStatus,
}

/// Append-only record of "no information" URLs, keyed by category and order.
#[derive(Debug, Default)]
pub struct NoInfoLedger {
    entries: Mutex<BTreeMap<(CategoryPath, usize), Vec<NoInfoEntry>>>,
}

impl NoInfoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(CategoryPath, usize), Vec<NoInfoEntry>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: NoInfoEntry) {
        self.lock()
            .entry((entry.path.clone(), entry.order))
            .or_default()
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot ordered by category path, then order.
    pub fn entries(&self) -> Vec<NoInfoEntry> {
        self.lock().values().flatten().cloned().collect()
    }
}

/// Semaphore-bounded task group.
///
/// Submission waits for a free slot; when the token fires, waiting
/// submissions give up so queued work is abandoned instead of drained.
pub struct TaskPool {
    name: &'static str,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    token: CancellationToken,
}

impl TaskPool {
    pub fn new(name: &'static str, size: usize, token: CancellationToken) -> Self {
        Self {
            name,
            slots: Arc::new(Semaphore::new(size.max(1))),
            tracker: TaskTracker::new(),
            token,
        }
    }

    /// Run `task` once a slot frees up. Returns `false` if cancelled first.
    pub async fn submit<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = tokio::select! {
            permit = Arc::clone(&self.slots).acquire_owned() => permit,
            _ = self.token.cancelled() => return false,
        };
        let Ok(permit) = permit else {
            return false;
        };
        self.tracker.spawn(async move {
            let _permit = permit;
            task.await;
        });
        true
    }

    /// Close the pool and wait for running tasks, up to `ceiling`.
    pub async fn drain(&self, ceiling: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(ceiling, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            log::error!(
                "{} pool still has {} tasks after {:?}",
                self.name,
                self.tracker.len(),
                ceiling
            );
        }
        drained
    }
}

/// Errors that only cost the task they happened in.
fn is_task_local(error: &AppError) -> bool {
    matches!(
        error,
        AppError::Parse { .. }
            | AppError::Crawl { .. }
            | AppError::Http(_)
            | AppError::Url(_)
            | AppError::Transport { .. }
            | AppError::Blocked { .. }
            | AppError::Timeout(_)
    )
}

/// Per-run shared state handed to every task.
struct RunState {
    crawler: CrawlerConfig,
    fetcher: Arc<dyn PageFetcher>,
    match_parser: Arc<MatchPageParser>,
    listing_parser: Arc<ListingPageParser>,
    ledger: Arc<NoInfoLedger>,
    events: mpsc::UnboundedSender<CrawlEvent>,
    matches: TaskPool,
    failure: Mutex<Option<String>>,
    token: CancellationToken,
}

impl RunState {
    fn emit(&self, event: CrawlEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.events.send(event);
    }

    fn fail(&self, message: String) {
        {
            let mut failure = self
                .failure
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if failure.is_none() {
                log::error!("Crawl failed: {}", message);
                *failure = Some(message);
            }
        }
        self.token.cancel();
    }

    fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wrap a task so its error or panic is handled at the run boundary.
    fn supervise<F>(self: &Arc<Self>, what: String, work: F) -> impl Future<Output = ()> + Send + 'static
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let state = Arc::clone(self);
        async move {
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => log::debug!("{} stopped", what),
                Ok(Err(e)) if is_task_local(&e) => log::warn!("Dropped {}: {}", what, e),
                Ok(Err(e)) => state.fail(format!("{what}: {e}")),
                Err(_) => state.fail(format!("{what}: task panicked")),
            }
        }
    }

    fn record_no_info(&self, ctx: &TaskContext, url: &str, reason: NoInfoReason) {
        let entry = NoInfoEntry {
            path: ctx.path.clone(),
            order: ctx.order,
            url: url.to_string(),
            reason,
        };
        self.ledger.record(entry.clone());
        self.emit(CrawlEvent::NoInfo(entry));
    }
}

async fn category_task(state: Arc<RunState>, ctx: TaskContext, url: String) -> Result<()> {
    let delay = Duration::from_millis(state.crawler.listing_delay_ms);
    let mut visited = HashSet::new();
    let mut next = Some(url);
    let mut link_count = 0;

    while let Some(page_url) = next.take() {
        if !visited.insert(normalize(&page_url)) {
            log::warn!("Pagination loop at {} in {}", page_url, ctx.path);
            break;
        }

        let html = state.fetcher.fetch(&page_url, &[], &state.token).await?;
        let links = state.listing_parser.match_links(&html, &page_url)?;
        next = state.listing_parser.next_page(&html, &page_url)?;
        link_count += links.len();

        for link in links {
            let task = match_task(Arc::clone(&state), ctx.clone(), link.clone());
            let guarded = state.supervise(format!("match {}", link.url), task);
            if !state.matches.submit(guarded).await {
                return Err(AppError::Cancelled);
            }
        }

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = state.token.cancelled() => return Err(AppError::Cancelled),
            }
        }
    }

    log::info!("{}: {} match links", ctx.path, link_count);
    Ok(())
}

async fn match_task(state: Arc<RunState>, ctx: TaskContext, link: MatchLink) -> Result<()> {
    if link.is_postponed(&state.crawler.postponed_markers) {
        state.record_no_info(&ctx, &link.url, NoInfoReason::Postponed);
        return Ok(());
    }

    let html = state.fetcher.fetch(&link.url, &[], &state.token).await?;
    match state
        .match_parser
        .parse_match(&html, &link.url, &ctx.path, ctx.order)?
    {
        ParseOutcome::Match(found) => state.emit(CrawlEvent::Match(found)),
        ParseOutcome::NoInfo(reason) => state.record_no_info(&ctx, &link.url, reason),
    }
    Ok(())
}

/// Runs crawls over leaf categories.
pub struct CrawlOrchestrator {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    match_parser: Arc<MatchPageParser>,
    listing_parser: Arc<ListingPageParser>,
}

impl CrawlOrchestrator {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let selectors = &config.site.selectors;
        let match_parser = Arc::new(MatchPageParser::new(selectors)?);
        let listing_parser = Arc::new(ListingPageParser::new(selectors)?);
        Ok(Self {
            config,
            fetcher,
            match_parser,
            listing_parser,
        })
    }

    /// Crawl `leaves`, streaming events to `events`.
    ///
    /// The last event is always [`CrawlEvent::Finished`] with the returned
    /// status. `token` is the external stop signal.
    pub async fn run(
        &self,
        leaves: Vec<LeafCategory>,
        token: &CancellationToken,
        events: mpsc::UnboundedSender<CrawlEvent>,
        ledger: Arc<NoInfoLedger>,
    ) -> CrawlStatus {
        let crawler = &self.config.crawler;
        let ceiling = Duration::from_secs(crawler.drain_ceiling_secs);
        let run_token = token.child_token();

        let state = Arc::new(RunState {
            crawler: crawler.clone(),
            fetcher: Arc::clone(&self.fetcher),
            match_parser: Arc::clone(&self.match_parser),
            listing_parser: Arc::clone(&self.listing_parser),
            ledger,
            events: events.clone(),
            matches: TaskPool::new("match", crawler.match_workers, run_token.clone()),
            failure: Mutex::new(None),
            token: run_token.clone(),
        });
        let categories = TaskPool::new("category", crawler.category_workers, run_token.clone());

        log::info!("Crawling {} categories", leaves.len());
        for leaf in &leaves {
            let task = category_task(Arc::clone(&state), TaskContext::from(leaf), leaf.url.clone());
            let guarded = state.supervise(format!("category {}", leaf.path), task);
            if !categories.submit(guarded).await {
                log::warn!("Stopping before all categories were submitted");
                break;
            }
        }

        // Category tasks feed the match pool, so they drain first.
        let mut drained = categories.drain(ceiling).await;
        drained &= state.matches.drain(ceiling).await;

        let status = if let Some(message) = state.failure() {
            CrawlStatus::Failed(message)
        } else if token.is_cancelled() {
            CrawlStatus::Interrupted
        } else if !drained {
            CrawlStatus::Failed(format!("worker pools did not drain within {ceiling:?}"))
        } else {
            CrawlStatus::Completed
        };

        let _ = events.send(CrawlEvent::Finished(status.clone()));
        status
    }

    /// Run to completion and gather every result.
    pub async fn collect(&self, leaves: Vec<LeafCategory>, token: &CancellationToken) -> CrawlSummary {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ledger = Arc::new(NoInfoLedger::new());

        let consume = async {
            let mut matches = Vec::new();
            while let Some(event) = rx.recv().await {
                match event {
                    CrawlEvent::Match(found) => {
                        log::debug!("Parsed {} - {} ({})", found.home, found.guest, found.url);
                        matches.push(found);
                    }
                    CrawlEvent::NoInfo(entry) => {
                        log::debug!("No information: {} ({})", entry.url, entry.reason);
                    }
                    CrawlEvent::Finished(_) => break,
                }
            }
            matches
        };

        let (status, matches) = tokio::join!(self.run(leaves, token, tx, Arc::clone(&ledger)), consume);

        CrawlSummary {
            matches,
            no_info: ledger.entries(),
            status,
        }
    }
}
