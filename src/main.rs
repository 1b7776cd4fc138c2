//! # Harvest-Oxide 命令行入口
//!
//! 驱动单个浏览器会话，分页采集职位详情的原始 HTML。
//!
//! ## 主要功能
//! - `harvest`: 登录、逐页发现并导出记录到输出目录，结束时打印运行摘要
//! - `inspect`: 打开页面、定位元素并打印其全部定位方式与属性快照
//! - 收到 Ctrl-C / SIGTERM 时协作式取消，并始终关闭浏览器会话
//!
//! ## 环境变量
//! - `HARVEST_CONFIG`: 配置文件路径
//! - `HARVEST_EMAIL` / `HARVEST_PASSWORD`: 登录凭据
//! - `HARVEST_<SECTION>__<KEY>`: 覆盖任意配置项，例如 `HARVEST_HARVEST__PAGE_COUNT=2`
//! - `RUST_LOG`: 日志过滤（默认使用配置中的 `log_level`）

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use harvest_oxide::{
    config::Config,
    element::ElementLocator,
    harvest::{FileSink, HarvestSummary, PaginationHarvester},
    locator::{LocatorDescriptor, LocatorResolver},
    session::SessionManager,
    webdriver::LocatorStrategy,
    Error,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "harvest-oxide", version, about = "Harvest job listings from a paginated job board")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one harvest into the output directory
    Harvest(HarvestArgs),
    /// Print every locator for one element
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct BrowserArgs {
    /// chromedriver binary
    #[arg(long)]
    driver: Option<PathBuf>,

    /// Attach to a running WebDriver endpoint instead of spawning a driver
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Run Chrome headless
    #[arg(long)]
    headless: bool,
}

#[derive(Debug, Args)]
struct HarvestArgs {
    /// Number of pages to harvest
    #[arg(long)]
    pages: Option<u32>,

    /// First page index
    #[arg(long)]
    start_page: Option<u32>,

    /// Keyword filter
    #[arg(long)]
    keywords: Option<String>,

    /// Output directory for record files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Cookie jar to log in with and refresh
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Where to write the run summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Resume from an earlier run summary
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Stop after a page yields no new listings
    #[arg(long)]
    stop_on_empty_page: bool,

    #[command(flatten)]
    browser: BrowserArgs,

    #[arg(long, env = "HARVEST_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "HARVEST_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Page to open
    #[arg(long)]
    url: String,

    /// Locator strategy (id, class, tag, name, xpath, css, link text)
    #[arg(long, default_value = "css")]
    strategy: LocatorStrategy,

    /// Locator value
    #[arg(long)]
    value: String,

    #[command(flatten)]
    browser: BrowserArgs,
}

impl BrowserArgs {
    fn apply(self, config: &mut Config) {
        if let Some(driver) = self.driver {
            config.browser.driver_path = Some(driver);
        }
        if let Some(url) = self.webdriver_url {
            config.browser.webdriver_url = Some(url);
        }
        if self.headless {
            config.browser.headless = true;
        }
    }
}

impl HarvestArgs {
    fn apply(self, config: &mut Config) -> Option<PathBuf> {
        let harvest = &mut config.harvest;
        if let Some(pages) = self.pages {
            harvest.page_count = pages;
        }
        if let Some(start) = self.start_page {
            harvest.start_page = start;
        }
        if let Some(keywords) = self.keywords {
            harvest.keywords = keywords;
        }
        if let Some(output) = self.output {
            harvest.output_dir = Some(output);
        }
        if let Some(cookies) = self.cookies {
            harvest.cookie_file = Some(cookies);
        }
        if let Some(summary) = self.summary {
            harvest.summary_file = Some(summary);
        }
        if let Some(resume) = self.resume {
            harvest.resume_from = Some(resume);
        }
        if self.stop_on_empty_page {
            harvest.stop_on_empty_page = true;
        }
        if self.email.is_some() {
            harvest.email = self.email;
        }
        if self.password.is_some() {
            harvest.password = self.password;
        }
        self.browser.apply(config);
        config.harvest.resume_from.clone()
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Cancel `token` on Ctrl-C or SIGTERM
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Cannot listen for SIGTERM: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    token.cancel();
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM signal"),
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C signal"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C signal");
        }

        info!("Cancelling harvest, finishing current step...");
        token.cancel();
    });
}

async fn run_harvest(mut config: Config, args: HarvestArgs) -> anyhow::Result<()> {
    let resume_from = args.apply(&mut config);
    config.validate()?;

    let previous = match resume_from {
        Some(path) => Some(
            HarvestSummary::load(&path)
                .await
                .with_context(|| format!("Cannot read resume summary {}", path.display()))?,
        ),
        None => None,
    };

    let output_dir = config.harvest.output_dir();
    let mut sink = FileSink::new(&output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;

    let session = Arc::new(SessionManager::open(&config.browser, config.timeouts.navigation_settle()).await?);
    info!("Browser session {} ready", session.session_id());

    let mut harvester = PaginationHarvester::new(session, &config);
    if let Some(previous) = &previous {
        harvester = harvester.resume(previous);
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    match harvester.run(&mut sink, &cancel).await {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            info!("{}", summary);
            Ok(())
        }
        Err(Error::Harvest(failure)) => {
            println!("{}", serde_json::to_string_pretty(&failure.summary)?);
            error!("{}", failure);
            Err(Error::Harvest(failure).into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_inspect(mut config: Config, args: InspectArgs) -> anyhow::Result<()> {
    args.browser.apply(&mut config);

    let session = Arc::new(SessionManager::open(&config.browser, config.timeouts.navigation_settle()).await?);
    let outcome = inspect(&session, &config, &args.url, LocatorDescriptor::new(args.strategy, args.value)).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }
    outcome
}

async fn inspect(
    session: &Arc<SessionManager>,
    config: &Config,
    url: &str,
    target: LocatorDescriptor,
) -> anyhow::Result<()> {
    session.navigate(url).await?;

    let mut locator = ElementLocator::new(
        session.clone(),
        config.timeouts.poll_interval(),
        config.timeouts.default_wait(),
        config.timeouts.action_settle(),
    );
    let handle = locator
        .find(&target, config.timeouts.default_wait())
        .await?
        .with_context(|| format!("No element matches {}", target))?;

    let report = LocatorResolver::report(session.as_ref(), &handle).await;
    println!("{}", report);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    init_tracing(&config.log_level);
    info!("Harvest-Oxide v{}", harvest_oxide::VERSION);

    match cli.command {
        Command::Harvest(args) => run_harvest(config, args).await,
        Command::Inspect(args) => run_inspect(config, args).await,
    }
}
