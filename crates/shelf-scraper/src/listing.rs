use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use crossbeam_channel::unbounded;
use scraper::Html;
use serde::{Deserialize, Serialize};
use shelf_crawler::{PageLocation, Scrapable, Scraped, ScrapingContext, WaitCondition};

use crate::fields::FieldExtractor;
use crate::locator::{ContainerLocator, StrategyMatch};
use crate::normalize::normalize_record;
use crate::profile::{ListingSelectors, MarkupProfile};
use crate::record::CleanRecord;
use crate::writer::CsvWriterConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperConfig {
    #[serde(default)]
    pub profile: MarkupProfile,

    /// Replaces the profile's selectors entirely
    #[serde(default)]
    pub selectors: Option<ListingSelectors>,

    #[serde(default)]
    pub csv: CsvWriterConfig,
}

impl ScraperConfig {
    pub fn with_profile(profile: MarkupProfile) -> Self {
        Self {
            profile,
            ..Default::default()
        }
    }

    pub fn selectors(&self) -> ListingSelectors {
        self.selectors
            .clone()
            .unwrap_or_else(|| self.profile.selectors())
    }
}

/// Extracts clean listing records out of catalog pages
#[derive(Debug, Clone)]
pub struct ListingScraper {
    locator: Arc<ContainerLocator>,
    extractor: FieldExtractor,
}

impl ListingScraper {
    /// Match counts of every container strategy, for markup debugging
    pub fn inspect(&self, page: &str) -> Vec<StrategyMatch> {
        self.locator.inspect(&Html::parse_document(page))
    }
}

impl Scrapable for ListingScraper {
    type Config = ScraperConfig;
    type Record = CleanRecord;

    fn new(config: &ScraperConfig) -> anyhow::Result<Self> {
        let selectors = config.selectors();
        let locator = ContainerLocator::new(&selectors.containers)
            .with_context(|| format!("Couldn't build {:?} container locator", config.profile))?;
        let extractor = FieldExtractor::new(&selectors)
            .with_context(|| format!("Couldn't build {:?} field extractor", config.profile))?;
        Ok(Self {
            locator: Arc::new(locator),
            extractor,
        })
    }

    fn ready_check(&self) -> Option<WaitCondition> {
        let locator = Arc::clone(&self.locator);
        Some(WaitCondition::new(
            format!("item containers `{}`", locator.primary()),
            move |page| locator.is_present(page),
        ))
    }

    fn scrap(&self, page: &str, ctx: &ScrapingContext) -> Scraped<CleanRecord> {
        let document = Html::parse_document(page);
        let fragments = self.locator.locate(&document);

        let mut scraped = Scraped {
            containers: fragments.len(),
            ..Default::default()
        };
        for fragment in &fragments {
            let Some(raw) = self.extractor.extract(fragment) else {
                scraped.skipped += 1;
                continue;
            };
            match normalize_record(raw) {
                Ok(record) => scraped.records.push(record),
                Err(e) => {
                    log::debug!("Dropping record from {}: {e}", ctx.location());
                    scraped.dropped += 1;
                }
            }
        }
        scraped
    }
}

pub fn scrap_page(
    config: &ScraperConfig,
    page: &str,
    location: PageLocation,
) -> anyhow::Result<Scraped<CleanRecord>> {
    let scraper = ListingScraper::new(config)?;
    Ok(scraper.scrap(page, &ScrapingContext::with_location(location)))
}

/// Scraps every file matching `pattern` with `num_workers` threads.
///
/// Unreadable files are logged and skipped, records come out in path order.
pub fn scrap_glob(
    config: &ScraperConfig,
    pattern: &str,
    num_workers: usize,
) -> anyhow::Result<Vec<CleanRecord>> {
    let (tx_path, rx_path) = unbounded::<PathBuf>();
    let (tx_records, rx_records) = unbounded::<(PathBuf, Vec<CleanRecord>)>();

    let mut workers = vec![];
    for id in 0..num_workers.max(1) {
        let rx_path = rx_path.clone();
        let tx_records = tx_records.clone();
        let config = config.clone();
        let worker = thread::Builder::new()
            .name(format!("{id}"))
            .spawn(move || {
                let scraper = ListingScraper::new(&config)?;
                for path in rx_path.into_iter() {
                    let page = match fs_err::read_to_string(&path) {
                        Ok(page) => page,
                        Err(e) => {
                            log::error!("Skipping page scrap: {e}");
                            continue;
                        }
                    };
                    let ctx = ScrapingContext::with_location(PageLocation::Path(path.clone()));
                    let scraped = scraper.scrap(&page, &ctx);
                    if scraped.containers == 0 {
                        log::warn!("No product containers in {}", path.display());
                    }
                    tx_records.send((path, scraped.records)).ok();
                }
                Ok::<(), anyhow::Error>(())
            })?;
        workers.push(worker);
    }
    drop(tx_records);

    for path in glob::glob(pattern)? {
        tx_path.send(path?).ok();
    }
    drop(tx_path);

    let mut pages = rx_records.into_iter().collect::<Vec<_>>();
    for w in workers {
        w.join()
            .map_err(|_| anyhow::anyhow!("Scraping worker panicked"))??;
    }

    pages.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(pages.into_iter().flat_map(|(_, records)| records).collect())
}
