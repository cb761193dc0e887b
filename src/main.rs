use {
    clap::{ArgAction, Parser, ValueEnum},
    pkmeans::{
        CLUSTER_COUNT, DisplayMode, ExecutionModel, ITERATION_COUNT, Kmeans, KmeansOpts,
        PartitionScheme, PointSet, Reporter, Seeding,
    },
    std::ffi::OsString,
    tracing_subscriber::{EnvFilter, fmt},
};

const USAGE: &str = "Usage: pkmeans 1,3 4,5 -2,4.43 42.3,2";

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum SeedingArg {
    #[default]
    First,
    Random,
    PlusPlus,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Points to cluster, each as `x,y`. Any argument holding a comma is a
    /// point, so options may come before, between or after them.
    points: Vec<String>,

    #[arg(short = 'k', long, default_value_t = CLUSTER_COUNT)]
    clusters: usize,

    #[arg(short = 'n', long, default_value_t = ITERATION_COUNT)]
    iterations: usize,

    /// Defaults to the available parallelism
    #[arg(short, long)]
    workers: Option<usize>,

    #[clap(short, long, default_value_t, value_enum)]
    model: ExecutionModel,

    #[clap(short, long, default_value_t, value_enum)]
    partition: PartitionScheme,

    #[clap(short, long, default_value_t, value_enum)]
    seeding: SeedingArg,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[clap(short, long, default_value_t, value_enum)]
    display_mode: DisplayMode,

    /// Also report the centroids at the start of every iteration
    #[arg(long)]
    print_iterations: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Every `x,y` token is lifted out before clap sees the rest: a pair like
    /// `-2,4.43` would otherwise be taken for a short flag.
    fn from_argv<I, T>(argv: I) -> Result<Args, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let bin = argv.next();
        let (pairs, rest): (Vec<OsString>, Vec<OsString>) =
            argv.partition(|arg| arg.to_str().is_some_and(|s| s.contains(',')));

        let mut args = Args::try_parse_from(bin.into_iter().chain(rest))?;
        // comma-free leftovers stay behind the pairs and fail to parse later
        let stray = std::mem::take(&mut args.points);
        args.points = pairs
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .chain(stray)
            .collect();
        Ok(args)
    }

    fn opts(&self) -> KmeansOpts {
        let defaults = KmeansOpts::default();
        KmeansOpts {
            clusters: self.clusters,
            iterations: self.iterations,
            workers: self.workers.unwrap_or(defaults.workers),
            model: self.model,
            partition: self.partition,
            seeding: match self.seeding {
                SeedingArg::First => Seeding::FirstPoints,
                SeedingArg::Random => Seeding::Random { seed: self.seed },
                SeedingArg::PlusPlus => Seeding::PlusPlus { seed: self.seed },
            },
            record_history: self.print_iterations,
        }
    }
}

fn main() -> Result<(), String> {
    let args = Args::from_argv(std::env::args_os()).unwrap_or_else(|e| e.exit());

    let filter = match args.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let points = PointSet::parse(&args.points).and_then(|p| {
        p.require_clusters(args.clusters)?;
        Ok(p)
    });
    let points = match points {
        Ok(points) => points,
        Err(e) => {
            // bad input is a usage problem, not a failure
            println!("\n{e}\n{USAGE}");
            return Ok(());
        }
    };

    let result = Kmeans::new(args.opts())
        .run(&points)
        .map_err(|e| e.to_string())?;

    Reporter::stdout(args.display_mode)
        .report(&points, &result)
        .map_err(|e| format!("{:?}", e))?;

    Ok(())
}
