use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use shelf_crawler::{
    crawl_site, default_render_wait, Backend, CatalogTarget, CrawlerConfig, PageLocation,
    Scrapable, SiteGeneration,
};
use shelf_scraper::writer::{write_dataset, write_records};
use shelf_scraper::{scrap_glob, scrap_page, CleanRecord, ListingScraper, MarkupProfile, ScraperConfig};
use tokio::runtime;

/// Paginated catalog listing crawler
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "crawl")]
    Crawl(CrawlArgs),
    #[command(name = "scrap")]
    Scrap(ScrapArgs),
    #[command(hide = true)]
    Completion,
}

/// Sweep facet values and result pages, write extracted records as CSV
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Override crawler's output CSV file
    #[arg(long, short)]
    pub output_file: Option<PathBuf>,
    /// Optional default crawler yaml configuration file
    #[arg(env = "SHELF_CRAWLER_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Optional scraper yaml configuration file (markup profile, selectors, csv)
    #[arg(env = "SHELF_SCRAPER_CONFIG", long)]
    pub scraper_config: Option<PathBuf>,
    /// Override the catalog URL generation, also selects the matching markup profile
    #[arg(value_enum, long)]
    pub generation: Option<SiteGeneration>,
    /// Override the markup profile used to extract records
    #[arg(value_enum, long)]
    pub profile: Option<MarkupProfile>,
    /// Override crawler's facet values, repeat for several values
    #[arg(long = "facet")]
    pub facets: Vec<String>,
    /// Override crawler's pages, crawls pages 1 to N
    #[arg(long)]
    pub pages: Option<u32>,
    /// Override crawler's maximum number of requests
    #[arg(long)]
    pub max_requests: Option<usize>,
    /// Override crawler's minimum delay between requests (seconds)
    #[arg(long)]
    pub sleep_min: Option<u64>,
    /// Override crawler's maximum delay between requests (seconds)
    #[arg(long)]
    pub sleep_max: Option<u64>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override crawler's request timeout (seconds)
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Override crawler's number of concurrent workers
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Render pages with this headless Chromium binary instead of plain HTTP
    #[arg(long)]
    pub chrome: Option<PathBuf>,
    /// No SIGINT handling, records collected so far are lost on interrupt
    #[arg(long)]
    pub no_sigint: bool,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf: CrawlerConfig = match &args.crawler_config {
            Some(path) => serde_yaml::from_reader(File::open(path)?)?,
            None => CrawlerConfig::default(),
        };
        if let Some(output_file) = &args.output_file {
            conf.output_path = output_file.clone();
        }
        if let Some(generation) = args.generation {
            conf.target = CatalogTarget::for_generation(generation);
        }
        if !args.facets.is_empty() {
            conf.facet_values = args.facets.clone();
        }
        if let Some(pages) = args.pages {
            conf.pages = (1..=pages).collect();
        }
        if let Some(max_requests) = args.max_requests {
            conf.max_requests = max_requests;
        }
        if let Some(sleep_min) = args.sleep_min {
            conf.sleep_min = sleep_min;
        }
        if let Some(sleep_max) = args.sleep_max {
            conf.sleep_max = sleep_max;
        }
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(timeout) = args.timeout {
            conf.timeout = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            conf.concurrency = concurrency;
        }
        if let Some(binary) = &args.chrome {
            let wait = match conf.backend {
                Backend::Chrome { wait, .. } => wait,
                Backend::Http => default_render_wait(),
            };
            conf.backend = Backend::Chrome {
                binary: binary.clone(),
                wait,
            };
        }
        if args.no_sigint {
            conf.handle_sigint = false;
        }
        Ok(conf)
    }
}

/// Profile flag first, then the config file, then the crawled generation
fn scraper_config(
    path: Option<&Path>,
    profile: Option<MarkupProfile>,
    generation: SiteGeneration,
) -> anyhow::Result<ScraperConfig> {
    let mut conf = match path {
        Some(path) => serde_yaml::from_reader(File::open(path)?)?,
        None => ScraperConfig::with_profile(generation.into()),
    };
    if let Some(profile) = profile {
        conf.profile = profile;
    }
    Ok(conf)
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let crawler_conf: CrawlerConfig = (&args).try_into()?;
    let scraper_conf = scraper_config(
        args.scraper_config.as_deref(),
        args.profile,
        crawler_conf.target.generation,
    )?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let report = rt.block_on(crawl_site::<ListingScraper>(&crawler_conf, &scraper_conf))?;

    if report.dataset.is_empty() {
        log::warn!("No records collected, writing an empty dataset");
    }
    write_dataset(&crawler_conf.output_path, &report.dataset, &scraper_conf.csv)?;
    Ok(())
}

/// Scrap local or distant pages and print the records as CSV
#[derive(Debug, clap::Args)]
#[command(group = clap::ArgGroup::new("page").required(true))]
pub struct ScrapArgs {
    /// A local html page to scrap
    #[arg(group = "page", long)]
    pub file: Option<PathBuf>,
    /// A distant html page to scrap
    #[arg(group = "page", long)]
    pub url: Option<String>,
    /// A glob pattern of local html pages to scrap
    #[arg(group = "page", long)]
    pub glob: Option<String>,
    /// Markup profile used to extract records
    #[arg(value_enum, long)]
    pub profile: Option<MarkupProfile>,
    /// Optional scraper yaml configuration file
    #[arg(env = "SHELF_SCRAPER_CONFIG", long)]
    pub scraper_config: Option<PathBuf>,
    /// Custom user agent to download the page
    #[arg(long, conflicts_with_all = ["file", "glob"])]
    pub ua: Option<String>,
    /// Print how many nodes each container selector matches
    #[arg(long, conflicts_with = "glob")]
    pub inspect: bool,
    /// Number of threads scraping glob matches
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,
    /// Write the records to this CSV file instead of stdout
    #[arg(long, short)]
    pub output_file: Option<PathBuf>,
}

fn print_records(
    records: &[CleanRecord],
    output: Option<&Path>,
    conf: &ScraperConfig,
) -> anyhow::Result<()> {
    match output {
        Some(path) => write_dataset(path, records, &conf.csv)?,
        None => write_records(io::stdout().lock(), records, &conf.csv)?,
    };
    Ok(())
}

pub fn scrap(args: ScrapArgs) -> anyhow::Result<()> {
    let conf = scraper_config(
        args.scraper_config.as_deref(),
        args.profile,
        SiteGeneration::Current,
    )?;

    if let Some(pattern) = &args.glob {
        let records = scrap_glob(&conf, pattern, args.num_workers)?;
        return print_records(&records, args.output_file.as_deref(), &conf);
    }

    let (page, location) = if let Some(url) = args.url {
        let ua = args.ua.unwrap_or_else(|| CrawlerConfig::default().user_agent);
        let client = reqwest::blocking::ClientBuilder::new()
            .user_agent(ua)
            .build()?;
        let page = client.get(&url).send()?.error_for_status()?.text()?;
        (page, PageLocation::Url(url))
    } else if let Some(path) = args.file {
        let page = fs::read_to_string(&path)?;
        (page, PageLocation::Path(path))
    } else {
        anyhow::bail!("Missing `url`, `file` or `glob`");
    };

    if args.inspect {
        let scraper = <ListingScraper as Scrapable>::new(&conf)?;
        eprintln!("Container selectors ({:?} profile):", conf.profile);
        for m in scraper.inspect(&page) {
            eprintln!("  {:>5}  {}", m.count, m.selector);
        }
    }

    let scraped = scrap_page(&conf, &page, location)?;
    if args.inspect {
        eprintln!(
            "{} containers, {} records, {} skipped, {} dropped",
            scraped.containers,
            scraped.records.len(),
            scraped.skipped,
            scraped.dropped
        );
    }
    print_records(&scraped.records, args.output_file.as_deref(), &conf)
}

fn init_logger(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Crawl(args) => {
            if !args.quiet {
                init_logger("shelf_crawler=info,shelf_scraper=warn");
            }
            crawl(args)
        }
        SubCommand::Scrap(args) => {
            init_logger("shelf_scraper=warn");
            scrap(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "shelf", &mut io::stdout());
            Ok(())
        }
    }
}
