use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use shelf_crawler::{
    crawl_catalog, ChromeRenderer, CrawlState, CrawlerConfig, Fetch, FetchResult, FetchStatus,
    FixedDelay, NoDelay, Pacing, QuerySpec, RenderedFetcher, Renderer, Scrapable, Scraped,
    ScrapingContext, StopHandle, WaitCondition,
};

/// Each non-empty line of a page is one record
struct LineScraper;

impl Scrapable for LineScraper {
    type Config = ();
    type Record = String;

    fn new(_config: &Self::Config) -> anyhow::Result<Self> {
        Ok(Self)
    }

    fn scrap(&self, page: &str, _ctx: &ScrapingContext) -> Scraped<String> {
        let records = page
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect::<Vec<_>>();
        Scraped {
            containers: records.len(),
            records,
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct StubFetcher {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    stop_after: Option<(usize, StopHandle)>,
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, query: &QuerySpec, _url: &str) -> FetchResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, stop)) = &self.stop_after {
            if call >= *after {
                stop.stop();
            }
        }
        if self.fail_on == Some(call) {
            return FetchResult::failed(query.clone(), FetchStatus::HttpError(503), Duration::ZERO);
        }
        let page = format!("{}-{}\n", query.facet_value, query.page_index);
        FetchResult::ok(query.clone(), page, Duration::ZERO)
    }
}

impl StubFetcher {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct CountingPacing(AtomicUsize);

impl Pacing for CountingPacing {
    fn next_delay(&self) -> Duration {
        self.0.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    }
}

fn config(facets: &[&str], pages: u32, max_requests: usize) -> CrawlerConfig {
    CrawlerConfig {
        facet_values: facets.iter().map(|s| s.to_string()).collect(),
        pages: (1..=pages).collect(),
        max_requests,
        ..Default::default()
    }
}

#[tokio::test]
async fn failed_fetch_is_skipped() {
    let conf = config(&["8", "16"], 3, 100);
    let fetcher = StubFetcher {
        fail_on: Some(3),
        ..Default::default()
    };

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap();

    assert_eq!(CrawlState::Completed, report.state);
    assert_eq!(6, report.requests_issued);
    assert_eq!(1, report.queries_skipped);
    assert_eq!(
        vec!["8-1", "8-2", "16-1", "16-2", "16-3"],
        report.dataset.into_records()
    );
}

#[tokio::test]
async fn budget_stops_the_crawl() {
    let conf = config(&["2", "4", "8", "16"], 5, 5);
    let fetcher = StubFetcher::default();

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap();

    assert_eq!(5, fetcher.calls());
    assert_eq!(CrawlState::BudgetExhausted, report.state);
    assert_eq!(20, report.queries_planned);
    assert_eq!(5, report.requests_issued);
    assert_eq!(
        vec!["2-1", "2-2", "2-3", "2-4", "2-5"],
        report.dataset.into_records()
    );
}

#[tokio::test]
async fn no_delay_before_first_request() {
    let conf = config(&["8", "16"], 3, 100);
    let fetcher = StubFetcher::default();
    let pacing = CountingPacing::default();

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &pacing, &StopHandle::new())
        .await
        .unwrap();

    assert_eq!(6, report.requests_issued);
    assert_eq!(5, pacing.0.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stop_before_start_returns_empty() {
    let conf = config(&["8"], 3, 100);
    let fetcher = StubFetcher::default();
    let stop = StopHandle::new();
    stop.stop();

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &stop)
        .await
        .unwrap();

    assert_eq!(0, fetcher.calls());
    assert_eq!(CrawlState::Cancelled, report.state);
    assert!(report.dataset.is_empty());
}

#[tokio::test]
async fn stop_keeps_collected_records() {
    let conf = config(&["8", "16"], 5, 100);
    let stop = StopHandle::new();
    let fetcher = StubFetcher {
        stop_after: Some((2, stop.clone())),
        ..Default::default()
    };

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &stop)
        .await
        .unwrap();

    assert_eq!(2, fetcher.calls());
    assert_eq!(CrawlState::Cancelled, report.state);
    assert_eq!(vec!["8-1", "8-2"], report.dataset.into_records());
}

#[tokio::test]
async fn stop_interrupts_pacing_delay() {
    let conf = config(&["8"], 3, 100);
    let fetcher = StubFetcher::default();
    let stop = StopHandle::new();

    let stopper = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();
    });

    let pacing = FixedDelay(Duration::from_secs(60));
    let crawl = crawl_catalog(&conf, &LineScraper, &fetcher, &pacing, &stop);
    let report = tokio::time::timeout(Duration::from_secs(5), crawl)
        .await
        .expect("crawl kept sleeping after stop")
        .unwrap();

    assert_eq!(1, fetcher.calls());
    assert_eq!(CrawlState::Cancelled, report.state);
    assert_eq!(vec!["8-1"], report.dataset.into_records());
}

#[tokio::test]
async fn concurrent_workers_share_the_budget() {
    let mut conf = config(&["2", "4", "8", "16"], 5, 7);
    conf.concurrency = 4;
    let fetcher = StubFetcher::default();

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap();

    assert_eq!(7, fetcher.calls());
    assert_eq!(7, report.requests_issued);
    assert_eq!(7, report.dataset.len());
    assert_eq!(CrawlState::BudgetExhausted, report.state);
}

#[tokio::test]
async fn concurrent_workers_visit_every_query() {
    let mut conf = config(&["8", "16"], 3, 100);
    conf.concurrency = 3;
    let fetcher = StubFetcher::default();

    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap();

    let mut records = report.dataset.into_records();
    records.sort();
    assert_eq!(
        vec!["16-1", "16-2", "16-3", "8-1", "8-2", "8-3"],
        records
    );
    assert_eq!(CrawlState::Completed, report.state);
}

#[tokio::test]
async fn empty_pages_are_counted() {
    struct EmptyFetcher;

    #[async_trait]
    impl Fetch for EmptyFetcher {
        async fn fetch(&self, query: &QuerySpec, _url: &str) -> FetchResult {
            FetchResult::ok(query.clone(), String::new(), Duration::ZERO)
        }
    }

    let conf = config(&["8"], 4, 100);
    let report = crawl_catalog(&conf, &LineScraper, &EmptyFetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap();

    assert_eq!(CrawlState::Completed, report.state);
    assert_eq!(4, report.empty_pages);
    assert_eq!(0, report.queries_skipped);
    assert!(report.dataset.is_empty());
}

struct StubRenderer {
    launches: bool,
    page: &'static str,
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn launch(&self) -> anyhow::Result<()> {
        if self.launches {
            Ok(())
        } else {
            anyhow::bail!("no browser")
        }
    }

    async fn render(
        &self,
        _url: &str,
        _wait: &WaitCondition,
        _timeout: Duration,
    ) -> anyhow::Result<String> {
        Ok(self.page.to_string())
    }
}

fn items_present() -> WaitCondition {
    WaitCondition::new("item", |page| page.contains("item"))
}

#[tokio::test]
async fn renderer_setup_failure_aborts() {
    let conf = config(&["8"], 2, 100);
    let fetcher = RenderedFetcher::new(
        StubRenderer {
            launches: false,
            page: "item",
        },
        items_present(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );

    let err = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Rendering backend could not be initialized"));
}

#[tokio::test]
async fn missing_chrome_binary_fails_setup() {
    let fetcher = RenderedFetcher::new(
        ChromeRenderer::new("/nonexistent/chromium", "shelf-test"),
        items_present(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );

    let err = fetcher.setup().await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("Rendering backend could not be initialized"));
    assert!(msg.contains("/nonexistent/chromium"));
}

#[tokio::test]
async fn rendered_page_not_ready_is_timeout() {
    let fetcher = RenderedFetcher::new(
        StubRenderer {
            launches: true,
            page: "<html>loading</html>",
        },
        items_present(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );

    let result = fetcher.fetch(&QuerySpec::new("8", 1), "http://localhost/").await;
    assert_eq!(FetchStatus::Timeout, result.status);
    assert!(result.body.is_none());

    let conf = config(&["8"], 2, 100);
    let report = crawl_catalog(&conf, &LineScraper, &fetcher, &NoDelay, &StopHandle::new())
        .await
        .unwrap();
    assert_eq!(2, report.queries_skipped);
    assert_eq!(CrawlState::Completed, report.state);
}

#[tokio::test]
async fn rendered_page_ready_is_ok() {
    let fetcher = RenderedFetcher::new(
        StubRenderer {
            launches: true,
            page: "item one\nitem two\n",
        },
        items_present(),
        Duration::from_secs(1),
        Duration::from_secs(1),
    );

    let result = fetcher.fetch(&QuerySpec::new("8", 1), "http://localhost/").await;
    assert!(result.is_ok());
    assert_eq!(Some("item one\nitem two\n"), result.body.as_deref());
}
