use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use paper_scraper::config::{find_config_file, load_config, Config};
use paper_scraper::models::{IdKind, RawPaper, SearchMode, SearchRequest};
use paper_scraper::search::{fetch_paper, search_papers};
use paper_scraper::sources::CrossRefClient;
use paper_scraper::utils::{encode_id, HttpClient};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Scraper - find scholarly papers, reconcile their metadata and download their PDFs
#[derive(Parser, Debug)]
#[command(name = "paper-scraper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find scholarly papers and download their PDFs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a provider and download the PDFs of the results
    #[command(alias = "s")]
    Search {
        /// Free text, paper id or DOI depending on the mode
        query: String,

        /// Number of papers to save
        #[arg(long, short)]
        limit: Option<usize>,

        /// Directory for the PDFs
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Year filter (e.g., "2020" or "2018-2022")
        #[arg(long)]
        year: Option<String>,

        /// Search mode: default, paper, doi, recommendations, future_citations,
        /// past_references or google
        #[arg(long, short)]
        mode: Option<SearchMode>,

        /// Papers downloaded concurrently
        #[arg(long)]
        batch_size: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download the PDF of one paper
    #[command(alias = "f")]
    Fetch {
        #[command(flatten)]
        id: FetchId,

        /// Directory for the PDF
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },

    /// Find the DOI of a title through Crossref
    Doi {
        /// Paper title
        title: String,

        /// Author names (repeatable)
        #[arg(long, short)]
        author: Vec<String>,
    },

    /// Fetch Crossref BibTeX for a DOI
    Bibtex {
        /// The DOI
        doi: String,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct FetchId {
    /// Paper DOI
    #[arg(long)]
    doi: Option<String>,

    /// arXiv id
    #[arg(long)]
    arxiv: Option<String>,

    /// PubMed Central id
    #[arg(long)]
    pmc: Option<String>,

    /// PubMed id
    #[arg(long)]
    pubmed: Option<String>,

    /// Landing page or PDF URL
    #[arg(long)]
    url: Option<String>,
}

impl FetchId {
    fn into_paper(self) -> RawPaper {
        let mut paper = RawPaper::default();
        let mut key = String::new();
        for (kind, value) in [
            (IdKind::Doi, self.doi),
            (IdKind::ArXiv, self.arxiv),
            (IdKind::PubMedCentral, self.pmc),
            (IdKind::PubMed, self.pubmed),
        ] {
            if let Some(value) = value {
                key = value.clone();
                paper.external_ids.insert(kind, value);
            }
        }
        if let Some(url) = self.url {
            key = url.clone();
            paper.set_open_access_url(url);
        }
        paper.paper_id = Some(encode_id(&key));
        paper
    }
}

fn load(cli_config: Option<&PathBuf>) -> Result<Config> {
    let config = if let Some(path) = cli_config {
        load_config(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else if let Some(path) = find_config_file() {
        tracing::info!("Using config file: {}", path.display());
        load_config(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

fn crossref(config: &Config) -> Result<CrossRefClient> {
    let http = HttpClient::new()?;
    Ok(CrossRefClient::new(
        http.rate_limited(config.rate_limits.crossref_budget())?,
        config.api_keys.crossref_mailto.clone(),
    )
    .with_base_url(&config.endpoints.crossref)
    .with_plus_token(config.api_keys.crossref_plus_token.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_scraper={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load(cli.config.as_ref())?;

    match cli.command {
        Commands::Search {
            query,
            limit,
            dir,
            year,
            mode,
            batch_size,
            json,
        } => {
            let mut request = SearchRequest::new(query)
                .limit(limit.unwrap_or(config.search.default_limit))
                .dump_dir(dir.unwrap_or_else(|| config.downloads.default_path.clone()))
                .mode(mode.unwrap_or(config.search.default_mode))
                .batch_size(batch_size.unwrap_or(config.downloads.batch_size));
            if let Some(year) = year {
                request = request.year(year);
            }

            let papers = search_papers(&request, &config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&papers)?);
            } else if !cli.quiet {
                for (path, record) in &papers {
                    println!("{}", path.display());
                    println!("  [{}] {}", record.key, record.citation);
                }
                println!("{} papers saved to {}", papers.len(), request.dump_dir.display());
            }
        }

        Commands::Fetch { id, dir } => {
            let dir = dir.unwrap_or_else(|| config.downloads.default_path.clone());
            let paper = id.into_paper();
            let path = fetch_paper(&paper, &dir, &config).await?;
            if !cli.quiet {
                println!("{}", path.display());
            }
        }

        Commands::Doi { title, author } => {
            if title.trim().is_empty() {
                bail!("Title must not be empty");
            }
            let doi = crossref(&config)?.reconcile_doi(&title, &author).await?;
            println!("{}", doi);
        }

        Commands::Bibtex { doi } => {
            let bibtex = crossref(&config)?.doi_to_bibtex(doi.trim()).await?;
            println!("{}", bibtex);
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
