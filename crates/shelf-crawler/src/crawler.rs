use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future;

use crate::budget::{CrawlBudget, CrawlClock, StopHandle};
use crate::config::{Backend, CrawlerConfig};
use crate::fetch::{Fetch, FetchStatus, HttpFetcher};
use crate::pacing::{Pacing, RandomDelay};
use crate::planner::{Plan, QueryPlanner, QuerySpec};
use crate::render::{ChromeRenderer, RenderedFetcher, WaitCondition};
use crate::scrapable::{Scrapable, ScrapingContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Planning,
    Fetching,
    Extracting,
    Completed,
    BudgetExhausted,
    Cancelled,
}

/// Records accumulated by a crawl, append-only
#[derive(Debug, Clone)]
pub struct Dataset<R> {
    records: Vec<R>,
}

impl<R> Dataset<R> {
    pub fn new() -> Self {
        Self { records: vec![] }
    }

    pub fn append(&mut self, records: Vec<R>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R> Default for Dataset<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R> IntoIterator for &'a Dataset<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug)]
pub struct CrawlReport<R> {
    pub state: CrawlState,
    pub dataset: Dataset<R>,
    pub queries_planned: usize,
    pub requests_issued: usize,
    /// Queries whose fetch didn't succeed
    pub queries_skipped: usize,
    /// Fetched pages without any item container
    pub empty_pages: usize,
    pub items_skipped: usize,
    pub records_dropped: usize,
    pub elapsed: Duration,
}

impl<R> CrawlReport<R> {
    pub fn average_request_time(&self) -> Duration {
        match u32::try_from(self.requests_issued) {
            Ok(n) if n > 0 => self.elapsed / n,
            _ => Duration::ZERO,
        }
    }

    pub fn frequency(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests_issued as f64 / secs
        } else {
            0.0
        }
    }

    fn log_summary(&self) {
        log::info!("Crawl finished: {:?}", self.state);
        log::info!(
            "Total requests: {}/{} planned ({} skipped)",
            self.requests_issued,
            self.queries_planned,
            self.queries_skipped
        );
        log::info!(
            "Total records: {} ({} items skipped, {} dropped, {} empty pages)",
            self.dataset.len(),
            self.items_skipped,
            self.records_dropped,
            self.empty_pages
        );
        log::info!(
            "Total time: {:.2?}, average per request: {:.2?}",
            self.elapsed,
            self.average_request_time()
        );
    }
}

#[derive(Debug, Default)]
struct Tally {
    queries_skipped: usize,
    empty_pages: usize,
    items_skipped: usize,
    records_dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Drained,
    Exhausted,
    Stopped,
}

struct Crawl<'a, T: Scrapable> {
    planner: &'a QueryPlanner,
    queue: Mutex<Plan<'a>>,
    scraper: &'a T,
    fetcher: &'a dyn Fetch,
    pacing: &'a dyn Pacing,
    stop: &'a StopHandle,
    budget: CrawlBudget,
    clock: CrawlClock,
    state: Mutex<CrawlState>,
    tally: Mutex<Tally>,
    dataset: Mutex<Dataset<T::Record>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn shorten(url: &str) -> &str {
    match url.char_indices().nth(80) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

impl<'a, T: Scrapable> Crawl<'a, T> {
    fn set_state(&self, next: CrawlState) {
        let mut state = lock(&self.state);
        if *state != next {
            log::trace!("Crawl state {:?} -> {next:?}", *state);
            *state = next;
        }
    }

    fn next_query(&self) -> Option<QuerySpec> {
        lock(&self.queue).next()
    }

    async fn worker(&self, id: usize) -> WorkerExit {
        let mut issued_here = 0;
        loop {
            if self.stop.is_stopped() {
                log::info!("Worker {id} stopping on request");
                return WorkerExit::Stopped;
            }
            if self.budget.is_exhausted() {
                return WorkerExit::Exhausted;
            }
            let Some(query) = self.next_query() else {
                return WorkerExit::Drained;
            };

            if issued_here > 0 {
                let delay = self.pacing.next_delay();
                if !delay.is_zero() {
                    log::debug!("Worker {id} sleeping for {:.1}s", delay.as_secs_f32());
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => (),
                        _ = self.stop.stopped() => return WorkerExit::Stopped,
                    }
                }
            }

            let Some(request) = self.budget.try_issue() else {
                return WorkerExit::Exhausted;
            };
            issued_here += 1;
            self.visit(request, query).await;

            if self.budget.is_exhausted() {
                log::warn!(
                    "Reached maximum requests limit ({}), stopping",
                    self.budget.max()
                );
                return WorkerExit::Exhausted;
            }
        }
    }

    async fn visit(&self, request: usize, query: QuerySpec) {
        let url = self.planner.render(&query);

        self.set_state(CrawlState::Fetching);
        let fetched = self.fetcher.fetch(&query, &url).await;
        log::info!(
            "Request #{request} | Frequency: {:.2} req/s | {:.2?} | URL: {}...",
            self.clock.frequency(self.budget.issued()),
            fetched.elapsed,
            shorten(&url)
        );

        let page = match (fetched.status, fetched.body) {
            (FetchStatus::Ok, Some(page)) => page,
            (status, _) => {
                log::warn!("Request #{request} | Skipping {query}: {status}");
                lock(&self.tally).queries_skipped += 1;
                return;
            }
        };

        self.set_state(CrawlState::Extracting);
        let ctx = ScrapingContext::for_query(query.clone(), request, &url);
        let scraped = self.scraper.scrap(&page, &ctx);

        if scraped.containers == 0 {
            log::warn!(
                "Request #{request} | No product containers for {query}, \
                 markup changed or page not fully rendered"
            );
        } else {
            log::info!(
                "Request #{request} | Extracted {} records from {} containers \
                 ({} skipped, {} dropped)",
                scraped.records.len(),
                scraped.containers,
                scraped.skipped,
                scraped.dropped
            );
        }

        {
            let mut tally = lock(&self.tally);
            if scraped.containers == 0 {
                tally.empty_pages += 1;
            }
            tally.items_skipped += scraped.skipped;
            tally.records_dropped += scraped.dropped;
        }
        lock(&self.dataset).append(scraped.records);
    }

    fn into_report(self, state: CrawlState) -> CrawlReport<T::Record> {
        let tally = self.tally.into_inner().unwrap_or_else(PoisonError::into_inner);
        let dataset = self
            .dataset
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        CrawlReport {
            state,
            dataset,
            queries_planned: self.planner.len(),
            requests_issued: self.budget.issued(),
            queries_skipped: tally.queries_skipped,
            empty_pages: tally.empty_pages,
            items_skipped: tally.items_skipped,
            records_dropped: tally.records_dropped,
            elapsed: self.clock.elapsed(),
        }
    }
}

/// Runs one crawl over the sweep described by `config`.
///
/// Failed fetches and unmatched markup only shrink the dataset. The only error
/// besides an invalid config is a fetcher that cannot be set up.
pub async fn crawl_catalog<T>(
    config: &CrawlerConfig,
    scraper: &T,
    fetcher: &dyn Fetch,
    pacing: &dyn Pacing,
    stop: &StopHandle,
) -> Result<CrawlReport<T::Record>>
where
    T: Scrapable,
{
    config.validate()?;
    fetcher.setup().await.context("Couldn't set up fetcher")?;

    let clock = CrawlClock::start();
    let state = Mutex::new(CrawlState::Idle);

    let planner = QueryPlanner::from_config(config);
    let crawl = Crawl {
        planner: &planner,
        queue: Mutex::new(planner.plan()),
        scraper,
        fetcher,
        pacing,
        stop,
        budget: CrawlBudget::new(config.max_requests),
        clock,
        state,
        tally: Mutex::new(Tally::default()),
        dataset: Mutex::new(Dataset::new()),
    };

    crawl.set_state(CrawlState::Planning);
    log::info!(
        "Planned {} queries ({} facet values x {} pages), budget of {} requests",
        planner.len(),
        config.facet_values.len(),
        config.pages.len(),
        config.max_requests
    );

    let exits = future::join_all((0..config.concurrency).map(|id| crawl.worker(id))).await;

    let state = if exits.contains(&WorkerExit::Stopped) {
        CrawlState::Cancelled
    } else if exits.contains(&WorkerExit::Exhausted) {
        CrawlState::BudgetExhausted
    } else {
        CrawlState::Completed
    };
    crawl.set_state(state);

    let report = crawl.into_report(state);
    report.log_summary();
    Ok(report)
}

pub fn fetcher_for(config: &CrawlerConfig, ready: Option<WaitCondition>) -> Result<Box<dyn Fetch>> {
    match &config.backend {
        Backend::Http => Ok(Box::new(HttpFetcher::new(&config.fetch_config())?)),
        Backend::Chrome { binary, wait } => {
            let ready = ready.context("Scraper defines no readiness check, cannot render pages")?;
            let renderer = ChromeRenderer::new(binary, &config.user_agent);
            Ok(Box::new(RenderedFetcher::new(
                renderer,
                ready,
                config.timeout(),
                Duration::from_secs(*wait),
            )))
        }
    }
}

/// Crawls with the configured backend and random pacing, SIGINT stops the
/// crawl gracefully unless `handle_sigint` is off
pub async fn crawl_site<T>(
    crawler_conf: &CrawlerConfig,
    scraper_conf: &T::Config,
) -> Result<CrawlReport<T::Record>>
where
    T: Scrapable,
{
    crawler_conf.validate()?;
    let scraper = <T as Scrapable>::new(scraper_conf)?;
    let fetcher = fetcher_for(crawler_conf, scraper.ready_check())?;
    let pacing = RandomDelay::from_secs(crawler_conf.sleep_min, crawler_conf.sleep_max);

    let stop = StopHandle::new();
    if crawler_conf.handle_sigint {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, keeping records collected so far");
                stop.stop();
            }
        });
    }

    crawl_catalog(crawler_conf, &scraper, fetcher.as_ref(), &pacing, &stop).await
}
