//! Command-line front-end.

use std::collections::BTreeSet;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use abi_fuzzgen::{generate, Config, GenerateError, Tunables};

/// Generate self-checking Go programs that stress the calling convention.
///
/// Each generated test package is a pile of function pairs: `Caller{N}`
/// builds randomly shaped arguments and checks the returned values, while
/// `{pkg}.Test{N}` checks the arguments and builds the returns. Build the
/// output with the compiler (or pair of compilers) under test and run it;
/// a clean run prints "finished N tests".
#[derive(Parser)]
struct Cli {
    /// number of test functions to generate per package
    #[clap(long, short = 'n', default_value_t = 1000)]
    num_fcns: usize,

    /// number of test packages to generate
    #[clap(long, short = 'q', default_value_t = 1)]
    num_pkgs: usize,

    /// random seed
    #[clap(long, short = 's', default_value_t = 10101)]
    seed: u64,

    /// prefix name of go files/pkgs to generate
    #[clap(long, short = 't', default_value = "gen")]
    tag: String,

    /// output directory for generated files
    #[clap(long, short = 'o')]
    outdir: Utf8PathBuf,

    /// base package path for generated files
    #[clap(long, short = 'p', default_value = "gen")]
    pkgpath: String,

    /// emit only these function numbers (e.g. "5" or "1:3:10-20")
    #[clap(long, short = 'M')]
    fcn_mask: Option<String>,

    /// emit only these package numbers (same syntax as --fcn-mask)
    #[clap(long, short = 'P')]
    pkg_mask: Option<String>,

    /// tag generated test routines with //go:<value>
    #[clap(long, default_value = "")]
    pragma: String,

    /// maximum runtime failures before the generated program self-terminates
    #[clap(long, default_value_t = 10)]
    max_fail: usize,

    /// use runtime hooks to force stack growth before calls
    #[clap(long)]
    force_stack_growth: bool,

    /// record per-draw labels for localizing stream divergence
    #[clap(long)]
    rand_debug: bool,

    /// skip testing of the reflect.Call path
    #[clap(long)]
    no_reflect: bool,

    /// skip testing of defer statements
    #[clap(long)]
    no_defer: bool,

    /// skip testing of recursive calls
    #[clap(long)]
    no_recur: bool,

    /// skip functions that take the address of their params and results
    #[clap(long)]
    no_takeaddr: bool,

    /// skip testing of method calls
    #[clap(long)]
    no_method: bool,

    /// max number of input params
    #[clap(long)]
    in_max: Option<u8>,

    /// max number of return values
    #[clap(long)]
    out_max: Option<u8>,
}

/// Masks are colon-separated entries, each either a single index or a
/// half-open range `lo-hi`.
fn parse_mask(arg: &str) -> Result<BTreeSet<usize>, GenerateError> {
    let mut mask = BTreeSet::new();
    for entry in arg.split(':') {
        if let Some((lo, hi)) = entry.split_once('-') {
            let lo: usize = lo
                .parse()
                .map_err(|_| GenerateError::Mask(format!("malformed range {entry:?}")))?;
            let hi: usize = hi
                .parse()
                .map_err(|_| GenerateError::Mask(format!("malformed range {entry:?}")))?;
            if hi < lo {
                return Err(GenerateError::Mask(format!("empty range {entry:?}")));
            }
            mask.extend(lo..hi);
        } else {
            let idx: usize = entry
                .parse()
                .map_err(|_| GenerateError::Mask(format!("malformed entry {entry:?}")))?;
            mask.insert(idx);
        }
    }
    Ok(mask)
}

fn run() -> Result<usize, GenerateError> {
    let cli = Cli::parse();

    let mut tunables = Tunables::default();
    if cli.no_reflect {
        tunables.disable_reflect_call();
    }
    if cli.no_defer {
        tunables.disable_defer();
    }
    if cli.no_recur {
        tunables.disable_recursive_calls();
    }
    if cli.no_takeaddr {
        tunables.disable_take_addr();
    }
    if cli.no_method {
        tunables.disable_method_calls();
    }
    if let Some(n) = cli.in_max {
        tunables.limit_inputs(n)?;
    }
    if let Some(n) = cli.out_max {
        tunables.limit_outputs(n)?;
    }

    let fcn_mask = cli.fcn_mask.as_deref().map(parse_mask).transpose()?;
    let pkg_mask = cli.pkg_mask.as_deref().map(parse_mask).transpose()?;

    let cfg = Config {
        tag: cli.tag,
        out_dir: cli.outdir,
        pkg_path: cli.pkgpath,
        num_functions: cli.num_fcns,
        num_packages: cli.num_pkgs,
        seed: cli.seed,
        pragma: cli.pragma,
        fcn_mask: fcn_mask.unwrap_or_default(),
        pkg_mask: pkg_mask.unwrap_or_default(),
        max_fail: cli.max_fail,
        force_stack_growth: cli.force_stack_growth,
        rand_debug: cli.rand_debug,
        tunables,
    };
    generate(&cfg)
}

fn main() -> ExitCode {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to initialize logger");
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(errs) => {
            error!("{errs} errors during generation");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
