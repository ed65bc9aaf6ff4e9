//! Main application entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sd_core::events::events::FetchFailed;
use sd_core::events::handler_from_fn;
use sd_core::{EventBus, MemoryHistory, NavigableAddress};
use sd_data::sources::memory::Dataset;
use sd_data::{
    ClientConfig, CollectionSource, HttpCollectionSource, Keyed, MemorySource, Sort, SortDir,
    SortKey,
};
use sd_views::{Dashboard, DashboardConfig, ListController};

mod render;

/// Browse provider and procedure spending from the terminal
#[derive(Parser, Debug)]
#[command(name = "spendview", version, about)]
struct Cli {
    /// Dashboard address, e.g. `/provider/1234567890?state=TX`
    #[arg(default_value = "/")]
    address: String,

    /// Base URL of the collection service (overrides SPENDING_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Serve a built-in synthetic dataset instead of the service
    #[arg(long)]
    demo: bool,

    /// Sort the main list by this key (paid, claims, beneficiaries)
    #[arg(long)]
    sort: Option<SortKey>,

    /// Sort ascending instead of descending
    #[arg(long, requires = "sort")]
    asc: bool,

    /// Load this many additional pages of the main list
    #[arg(long, default_value_t = 0)]
    more: usize,

    /// Rank only providers on the exclusion list
    #[arg(long)]
    flagged: bool,

    /// Search providers by name or NPI and print the matches
    #[arg(long, conflicts_with = "procedure")]
    provider: Option<String>,

    /// Search procedures by code or description and print the matches
    #[arg(long)]
    procedure: Option<String>,

    /// Chart average reimbursement per claim for this procedure code
    #[arg(long, value_name = "CODE")]
    reimbursement: Option<String>,

    /// Chart the lowest averages instead of the highest
    #[arg(long, requires = "reimbursement")]
    lowest: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn source(cli: &Cli) -> Result<Arc<dyn CollectionSource>> {
    if cli.demo {
        info!("using the built-in demo dataset");
        return Ok(Arc::new(MemorySource::new(Dataset::demo())));
    }

    let mut config = ClientConfig::from_env();
    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url.clone());
    }
    info!(base_url = %config.base_url, "using collection service");
    let source = HttpCollectionSource::new(&config).context("failed to create the service client")?;
    Ok(Arc::new(source))
}

async fn wait(view: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(view, error = %e, "load task did not complete");
    }
}

/// Re-sort and page the list the current selection shows first
async fn drive<R>(view: &str, list: &ListController<R>, sort: Option<Sort>, more: usize)
where
    R: Keyed + Clone + Send + Sync + 'static,
{
    if let Some(sort) = sort {
        if let Some(task) = list.set_sort(sort) {
            wait(view, task).await;
        }
    }
    for _ in 0..more {
        match list.load_more() {
            Some(task) => wait(view, task).await,
            None => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let events = Arc::new(EventBus::new());
    let failures = Arc::new(Mutex::new(0usize));
    let counter = failures.clone();
    events.subscribe::<FetchFailed>(handler_from_fn(move |event| {
        if let Some(failed) = event.as_any().downcast_ref::<FetchFailed>() {
            warn!(view = %failed.view_name, endpoint = %failed.endpoint, "{}", failed.message);
            *counter.lock() += 1;
        }
    }));

    let history = MemoryHistory::new(NavigableAddress::parse(&cli.address));
    let dashboard = Dashboard::new(
        source(&cli)?,
        history,
        DashboardConfig::default(),
        events,
        Handle::current(),
    );
    if cli.flagged {
        dashboard.store().set_aux_filter(true);
    }
    dashboard.settled().await;

    let sort = cli.sort.map(|key| {
        let dir = if cli.asc { SortDir::Asc } else { SortDir::Desc };
        Sort::new(key, dir)
    });
    let selection = dashboard.store().get();
    if selection.focused_entity().is_some() {
        drive("provider procedures", dashboard.provider_panel().procedures(), sort, cli.more).await;
    } else if selection.focused_category().is_some() {
        drive("procedure providers", dashboard.procedure_panel().providers(), sort, cli.more).await;
    } else {
        drive("top providers", dashboard.top_providers(), sort, cli.more).await;
    }

    if let Some(code) = &cli.reimbursement {
        let chart = dashboard.reimbursement();
        chart.search().input(code);
        dashboard.settled().await;
        chart.select(code);
        if cli.lowest {
            if let Some(task) = chart.set_sort(SortDir::Asc) {
                wait("reimbursement chart", task).await;
            }
        }
        dashboard.settled().await;
    }

    if let Some(query) = &cli.provider {
        dashboard.provider_search().input(query);
        dashboard.settled().await;
        for hit in dashboard.provider_search().snapshot().results {
            println!("{:<11} {}", hit.npi, hit.name);
        }
        return Ok(());
    }
    if let Some(query) = &cli.procedure {
        dashboard.procedure_search().input(query);
        dashboard.settled().await;
        for hit in dashboard.procedure_search().snapshot().results {
            println!("{:<8} {}", hit.hcpcs_code, hit.description.unwrap_or_default());
        }
        return Ok(());
    }

    print!("{}", render::render(&dashboard).context("failed to render the dashboard")?);

    // Per-view failures are already shown in their panels.
    let failed = *failures.lock();
    if failed > 0 {
        info!(failed, "some views could not be loaded");
    }
    Ok(())
}
