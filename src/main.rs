use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use follow_rank::config::{CrawlConfig, OutputPaths, RankConfig};
use follow_rank::crawl::{CrawlOutcome, GraphCrawler, LimitMode, RetryPolicy, SystemClock};
use follow_rank::events::LogSink;
use follow_rank::graph::algorithms;
use follow_rank::graph::builder::{IndexMap, MatrixBuilder};
use follow_rank::graph::dataset::Visited;
use follow_rank::graph::matrix::{DenseMatrix, LinkMatrix, SparseMatrix};
use follow_rank::rank::RankEngine;
use follow_rank::storage::{self, StoredMatrix};
use follow_rank::StaticDirectory;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(
    name = "follow-rank",
    about = "Crawl a social follow graph and rank its users with PageRank or HITS"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, global = true, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the follow graph breadth first from a seed account
    Crawl(CrawlArgs),

    /// Build the link matrix and index map from a saved adjacency list
    Convert(ConvertArgs),

    /// Rank users over a saved link matrix
    Rank(RankArgs),

    /// Check saved files against each other and summarize the graph
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct CrawlArgs {
    /// JSON export of the directory to crawl
    #[clap(long)]
    directory: PathBuf,

    /// Seed account, by numeric id or screen name
    #[clap(long)]
    seed: String,

    /// Maximum friends fetched per user
    #[clap(long, default_value = "200")]
    friends_limit: usize,

    /// Maximum followers fetched per user
    #[clap(long, default_value = "200")]
    followers_limit: usize,

    /// Stop once this many users are explored (or visited)
    #[clap(long, default_value = "40")]
    limit: usize,

    /// Count the limit applies to
    #[clap(long, value_enum, default_value = "explored")]
    limit_on: LimitMode,

    /// Save a snapshot to alternating slots after every explored user
    #[clap(long)]
    live_save: bool,

    /// Give up on a call after this many sleeps (default: wait forever)
    #[clap(long)]
    max_attempts: Option<u32>,

    /// Give up on a call after waiting this many seconds in total
    #[clap(long)]
    max_wait_secs: Option<u64>,

    #[clap(long, default_value = "data/users")]
    users: PathBuf,

    #[clap(long, default_value = "data/adj_list")]
    adj_list: PathBuf,

    #[clap(long, default_value = "data/temp/users_")]
    users_temp: PathBuf,

    #[clap(long, default_value = "data/temp/adj_list_")]
    adj_list_temp: PathBuf,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    #[clap(long, default_value = "data/adj_list")]
    adj_list: PathBuf,

    #[clap(long, default_value = "data/map")]
    map: PathBuf,

    #[clap(long, default_value = "data/link_matrix")]
    link_matrix: PathBuf,

    /// Store the matrix in compressed sparse row form
    #[clap(long)]
    sparse: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Algorithm {
    Pagerank,
    Hits,
}

#[derive(Parser, Debug)]
struct RankArgs {
    #[clap(long, default_value = "data/link_matrix")]
    link_matrix: PathBuf,

    #[clap(long, default_value = "data/map")]
    map: PathBuf,

    /// Saved users, used to print screen names
    #[clap(long)]
    users: Option<PathBuf>,

    #[clap(long, value_enum, default_value = "pagerank")]
    algorithm: Algorithm,

    /// Multiplier applied to every PageRank product
    #[clap(long, default_value = "1.0")]
    damping: f64,

    /// Per-entry convergence threshold
    #[clap(long, default_value = "0.001")]
    epsilon: f64,

    /// Stop after this many iterations even without convergence
    #[clap(long)]
    max_iterations: Option<usize>,

    #[clap(long, default_value = "ranks.json")]
    output: PathBuf,

    /// Number of top users to report
    #[clap(long, default_value = "20")]
    top: usize,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[clap(long, default_value = "data/users")]
    users: PathBuf,

    #[clap(long, default_value = "data/adj_list")]
    adj_list: PathBuf,

    #[clap(long, default_value = "data/map")]
    map: PathBuf,

    #[clap(long, default_value = "data/link_matrix")]
    link_matrix: PathBuf,

    #[clap(long, default_value = "summary.json")]
    output: PathBuf,
}

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(args: Cli) -> Result<ExitCode> {
    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        // If threads = 0, use all available cores
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    match args.command {
        Command::Crawl(crawl) => run_crawl(crawl),
        Command::Convert(convert) => run_convert(convert).map(|_| ExitCode::SUCCESS),
        Command::Rank(rank) => run_rank(rank).map(|_| ExitCode::SUCCESS),
        Command::Inspect(inspect) => run_inspect(inspect).map(|_| ExitCode::SUCCESS),
    }
}

fn run_crawl(args: CrawlArgs) -> Result<ExitCode> {
    let directory = StaticDirectory::load(&args.directory)
        .with_context(|| format!("Failed to load directory {}", args.directory.display()))?;

    let mut retry = RetryPolicy::unbounded();
    if let Some(max) = args.max_attempts {
        retry = retry.with_max_attempts(max);
    }
    if let Some(secs) = args.max_wait_secs {
        retry = retry.with_max_total_wait(Duration::from_secs(secs));
    }

    let mut config = CrawlConfig::new(args.seed)
        .with_caps(args.friends_limit, args.followers_limit)
        .with_limit(args.limit, args.limit_on)
        .with_retry(retry);
    if args.live_save {
        config = config.with_live_save(args.users_temp, args.adj_list_temp);
    }

    log::info!(
        "Crawling from {} until {} {} users",
        config.seed,
        config.limit,
        match config.limit_on {
            LimitMode::Explored => "explored",
            LimitMode::Visited => "visited",
        }
    );

    let mut crawler = GraphCrawler::new(config, directory, SystemClock, LogSink);
    let report = crawler.crawl().context("Crawl failed")?;

    storage::save_dataset(&args.users, &args.adj_list, &report.dataset)
        .context("Failed to save crawl results")?;
    log::info!(
        "Saved {} users to {} and {}",
        report.dataset.len(),
        args.users.display(),
        args.adj_list.display()
    );

    Ok(match report.outcome {
        CrawlOutcome::LimitReached => ExitCode::SUCCESS,
        CrawlOutcome::FrontierExhausted => {
            log::warn!("Frontier exhausted after {} explored users", report.explored);
            ExitCode::from(2)
        }
    })
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let adjacency = storage::load_adjacency(&args.adj_list)
        .with_context(|| format!("Failed to load adjacency list {}", args.adj_list.display()))?;
    log::info!("Loaded adjacency list with {} users", adjacency.len());

    let builder = MatrixBuilder::new(&adjacency);
    let (matrix, index): (StoredMatrix, IndexMap) = if args.sparse {
        let (m, index) = builder.build::<SparseMatrix>()?;
        log::debug!("Sparse matrix uses {} bytes", m.memory_usage());
        (m.into(), index)
    } else {
        let (m, index) = builder.build::<DenseMatrix>()?;
        (m.into(), index)
    };

    storage::save_matrix(&args.link_matrix, &matrix).context("Failed to save link matrix")?;
    storage::save_index_map(&args.map, &index).context("Failed to save index map")?;
    log::info!(
        "Saved {} matrix to {} and index map to {}",
        if matrix.is_sparse() { "sparse" } else { "dense" },
        args.link_matrix.display(),
        args.map.display()
    );
    Ok(())
}

fn run_rank(args: RankArgs) -> Result<()> {
    let matrix = storage::load_matrix(&args.link_matrix)
        .with_context(|| format!("Failed to load link matrix {}", args.link_matrix.display()))?;
    let index = storage::load_index_map(&args.map)
        .with_context(|| format!("Failed to load index map {}", args.map.display()))?;
    let users = args
        .users
        .as_ref()
        .map(storage::load_users)
        .transpose()
        .context("Failed to load users")?;

    if index.len() != matrix.dim() {
        bail!(
            "Index map has {} entries but the matrix is {}x{}",
            index.len(),
            matrix.dim(),
            matrix.dim()
        );
    }

    let mut config = RankConfig::default()
        .with_damping(args.damping)
        .with_epsilon(args.epsilon);
    config.max_iterations = args.max_iterations;
    let engine = RankEngine::new(config);

    match &matrix {
        StoredMatrix::Dense(m) => rank_with(&engine, m, &args, &index, users.as_ref()),
        StoredMatrix::Sparse(m) => rank_with(&engine, m, &args, &index, users.as_ref()),
    }
}

fn rank_with<M: LinkMatrix>(
    engine: &RankEngine,
    matrix: &M,
    args: &RankArgs,
    index: &IndexMap,
    users: Option<&Visited>,
) -> Result<()> {
    match args.algorithm {
        Algorithm::Pagerank => {
            let result = engine.page_rank(matrix);
            report_top("PageRank", &storage::ranked_users(&result.top_n(args.top), index, users));
            storage::save_page_rank(&args.output, &result, index, users, args.top)?;
        }
        Algorithm::Hits => {
            let result = engine.hits(matrix);
            report_top("Hub", &storage::ranked_users(&result.top_hubs(args.top), index, users));
            report_top(
                "Authority",
                &storage::ranked_users(&result.top_auths(args.top), index, users),
            );
            storage::save_hits(&args.output, &result, index, users, args.top)?;
        }
    }
    log::info!("Scores saved to {}", args.output.display());
    Ok(())
}

fn report_top(label: &str, ranked: &[storage::RankedUser]) {
    for (place, user) in ranked.iter().enumerate() {
        let who = match (&user.screen_name, user.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => format!("#{}", user.index),
        };
        log::info!("{} #{}: {} ({:.6})", label, place + 1, who, user.score);
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let paths = OutputPaths {
        users: args.users,
        adj_list: args.adj_list,
        map: args.map,
        link_matrix: args.link_matrix,
    };

    let dataset = storage::load_dataset(&paths.users, &paths.adj_list).context("Failed to load crawl data")?;
    let index = storage::load_index_map(&paths.map).context("Failed to load index map")?;
    let matrix = storage::load_matrix(&paths.link_matrix).context("Failed to load link matrix")?;

    if !dataset.is_consistent() {
        log::warn!("Users and adjacency list disagree or reference unknown ids");
    }
    if !index.ids().iter().copied().eq(dataset.adjacency.keys()) {
        log::warn!("Index map does not match the adjacency list order");
    }

    let summary = match &matrix {
        StoredMatrix::Dense(m) => algorithms::summarize(m),
        StoredMatrix::Sparse(m) => algorithms::summarize(m),
    };
    log::info!(
        "{} users, {} links ({} mutual), {} dangling, {} strongly connected components (largest {})",
        summary.node_count,
        summary.link_count,
        summary.mutual_links,
        summary.dangling_nodes,
        summary.component_count,
        summary.largest_component
    );

    storage::save_summary(&args.output, &summary, Some(&dataset))?;
    log::info!("Summary saved to {}", args.output.display());
    Ok(())
}
