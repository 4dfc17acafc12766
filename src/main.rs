use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser};

use substrings::{system, Miner, Params, ResultEntry};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "substrings",
    about = "Find the most frequently recurring byte sequences in a file"
)]
struct Cli {
    /// Input file to mine
    input: PathBuf,
    /// JSON file with parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    overrides: Overrides,
    /// Read and scan the whole file on one thread
    #[arg(long)]
    sequential: bool,
    /// Output as JSON format
    #[arg(long)]
    json: bool,
    /// Log plan decisions and timing
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Clone)]
struct Overrides {
    /// Number of results to print [default: 30]
    #[arg(short, long)]
    top: Option<usize>,
    /// Minimum substring length [default: 15]
    #[arg(short = 'm', long = "min")]
    min_len: Option<usize>,
    /// Maximum substring length [default: 30]
    #[arg(short = 'x', long = "max")]
    max_len: Option<usize>,
    /// Probe only lengths divisible by this [default: 3]
    #[arg(short = 'k', long)]
    stride: Option<usize>,
    /// Skip per-chunk counts at or below this [default: 1]
    #[arg(short, long)]
    drop: Option<usize>,
    /// Only consider ASCII substrings
    #[arg(short, long)]
    ascii: bool,
    /// Disable the entropy filter
    #[arg(short = 'f', long)]
    nofilter: bool,
    /// Chunks per worker, 0 for automatic [default: 0]
    #[arg(short, long)]
    scale: Option<usize>,
}

impl Overrides {
    fn apply(&self, params: &mut Params) {
        if let Some(top) = self.top {
            params.top = top;
        }
        if let Some(min_len) = self.min_len {
            params.min_len = min_len;
        }
        if let Some(max_len) = self.max_len {
            params.max_len = max_len;
        }
        if let Some(stride) = self.stride {
            params.stride = stride;
        }
        if let Some(drop) = self.drop {
            params.drop = drop;
        }
        if let Some(scale) = self.scale {
            params.scale = scale;
        }
        params.ascii_only |= self.ascii;
        if self.nofilter {
            params.entropy_filter = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_text(results: impl Iterator<Item = ResultEntry>) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for e in results {
        writeln!(out, "{} \t{}", e.count, e.content.escape_ascii())?;
    }
    out.flush()
}

fn print_json(results: impl Iterator<Item = ResultEntry>) -> anyhow::Result<()> {
    let entries: Vec<serde_json::Value> = results
        .map(|e| {
            serde_json::json!({
                "count": e.count,
                "length": e.content.len(),
                "content": e.content.escape_ascii().to_string(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", if cli.verbose { "debug" } else { "info" });
    }
    env_logger::init();

    let mut params = match &cli.config {
        Some(path) => Params::read_from_file(path)?,
        None => Params::default(),
    };
    cli.overrides.apply(&mut params);
    params.validate()?;
    log::debug!("{params:?}");

    let ram_size = system::total_ram();
    log::debug!("total RAM: {ram_size} bytes");
    let mut miner = Miner::new(params, ram_size);

    let t0 = Instant::now();
    if cli.sequential {
        miner.process_file(&cli.input)
    } else {
        miner.process_concurrent(&cli.input, params.ascii_only, params.entropy_filter, params.scale)
    }
    .with_context(|| format!("failed to mine {}", cli.input.display()))?;
    log::info!(
        "calculated in {:.3}s, {} candidates",
        t0.elapsed().as_secs_f64(),
        miner.table().len()
    );

    let t1 = Instant::now();
    let results = miner.top(params.top);
    if cli.json {
        print_json(results)?;
    } else {
        print_text(results)?;
    }
    log::info!("ranked in {:.3}s", t1.elapsed().as_secs_f64());
    Ok(())
}
