use crate::fs::RealFileSystem;
use crate::graph::{self, Graph, NodeSet};
use crate::marker::Store;
use crate::regen::{self, CommandInvoker, Config, RegenResult};
use crate::stale::{Freshness, Tracker};
use crate::{load, trace, watch};
use argh::FromArgs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Build graph liveness and regeneration tracking.
#[derive(FromArgs)]
struct Args {
    /// write a chrome trace of the run to FILE
    #[argh(option)]
    trace: Option<String>,

    /// log filter, e.g. "debug" [default from RUST_LOG, else info]
    #[argh(option)]
    log: Option<String>,

    #[argh(subcommand)]
    cmd: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Unreachable(UnreachableArgs),
    Reachable(ReachableArgs),
    Status(StatusArgs),
    Regen(RegenArgs),
    Watch(WatchArgs),
}

/// Print targets not reachable from the known ones, sorted.
#[derive(FromArgs)]
#[argh(subcommand, name = "unreachable")]
struct UnreachableArgs {
    /// JSON file from gn gen with --ide=json
    #[argh(option)]
    json_file: PathBuf,

    /// target known to be reachable; repeatable
    #[argh(option)]
    known: Vec<String>,

    /// show only targets without incoming edges from other unreachable targets
    #[argh(switch)]
    only_source: bool,
}

/// Print targets reachable from the known ones, sorted.
#[derive(FromArgs)]
#[argh(subcommand, name = "reachable")]
struct ReachableArgs {
    /// JSON file from gn gen with --ide=json
    #[argh(option)]
    json_file: PathBuf,

    /// target known to be reachable; repeatable
    #[argh(option)]
    known: Vec<String>,
}

/// Print whether the generated build files are fresh.
#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
struct StatusArgs {
    /// directory holding the staleness marker
    #[argh(option)]
    marker_dir: PathBuf,

    /// configuration fingerprint [default: absolute --out-dir]
    #[argh(option)]
    fingerprint: Option<String>,

    /// generator output directory [default=out]
    #[argh(option, default = "PathBuf::from(\"out\")")]
    out_dir: PathBuf,
}

/// Run the generator command if the marker is stale, record success, then
/// run the --then command if given.
#[derive(FromArgs)]
#[argh(subcommand, name = "regen")]
struct RegenArgs {
    /// directory holding the staleness marker
    #[argh(option)]
    marker_dir: PathBuf,

    /// configuration fingerprint [default: absolute --out-dir]
    #[argh(option)]
    fingerprint: Option<String>,

    /// generator output directory [default=out]
    #[argh(option, default = "PathBuf::from(\"out\")")]
    out_dir: PathBuf,

    /// dependency dump the generator writes; checked after regenerating
    #[argh(option)]
    json_file: Option<PathBuf>,

    /// word of a command to run once the build files are fresh, e.g. the
    /// build tool itself; repeat for each word.  Its exit code is returned.
    #[argh(option)]
    then: Vec<String>,

    /// generator command line, after --
    #[argh(positional)]
    command: Vec<String>,
}

/// Watch inputs and mark the generated build stale when they change.
#[derive(FromArgs)]
#[argh(subcommand, name = "watch")]
struct WatchArgs {
    /// directory holding the staleness marker
    #[argh(option)]
    marker_dir: PathBuf,

    /// file or directory to watch; repeatable
    #[argh(option)]
    root: Vec<PathBuf>,

    /// file name that affects generation [default=BUILD.gn]; repeatable
    #[argh(option)]
    name: Vec<String>,

    /// file extension that affects generation [default=gni]; repeatable
    #[argh(option)]
    ext: Vec<String>,

    /// milliseconds between polls [default=500]
    #[argh(option, default = "500")]
    interval_ms: u64,

    /// stop after N polls [default: run until interrupted]
    #[argh(option)]
    polls: Option<usize>,
}

fn fingerprint(explicit: Option<String>, out_dir: &Path) -> anyhow::Result<Vec<u8>> {
    match explicit {
        Some(fp) => Ok(fp.into_bytes()),
        None => regen::default_fingerprint(out_dir),
    }
}

fn load_with_roots(json_file: &Path, known: &[String]) -> anyhow::Result<(Graph, NodeSet)> {
    let mut graph = load::read(json_file)?;
    // Unknown roots are interned as leaves, like dangling deps.
    let roots = known.iter().map(|name| graph.node_id(name)).collect();
    Ok((graph, roots))
}

fn print_sorted(graph: &Graph, set: &NodeSet) {
    for name in graph.names(set) {
        println!("{}", name);
    }
}

fn unreachable(args: UnreachableArgs) -> anyhow::Result<i32> {
    let (graph, roots) = load_with_roots(&args.json_file, &args.known)?;
    let dead = trace::scope("unreachable", || graph::unreachable(roots, &graph));
    let result = if args.only_source {
        graph::source_targets(&dead, &graph)
    } else {
        dead
    };
    print_sorted(&graph, &result);
    Ok(0)
}

fn reachable(args: ReachableArgs) -> anyhow::Result<i32> {
    let (graph, roots) = load_with_roots(&args.json_file, &args.known)?;
    let live = trace::scope("reachable", || graph::reachable(roots, &graph));
    print_sorted(&graph, &live);
    Ok(0)
}

fn status(args: StatusArgs) -> anyhow::Result<i32> {
    let fp = fingerprint(args.fingerprint, &args.out_dir)?;
    let tracker = Tracker::open(Store::new(args.marker_dir));
    match tracker.freshness(&fp) {
        Freshness::Fresh => println!("fresh"),
        Freshness::Stale(reason) => println!("stale: {}", reason),
    }
    Ok(0)
}

fn regen(args: RegenArgs) -> anyhow::Result<i32> {
    let fp = fingerprint(args.fingerprint, &args.out_dir)?;
    let mut config = Config::new(args.marker_dir, fp);
    config.graph = args.json_file;
    config.command = args.command;
    let mut invoker = CommandInvoker::new(config.command.clone())?;
    let then = if args.then.is_empty() {
        None
    } else {
        Some(CommandInvoker::new(args.then)?)
    };
    match regen::ensure_fresh(&config, &mut invoker)? {
        RegenResult::UpToDate => println!("gnfresh: build files up to date"),
        RegenResult::Regenerated => println!("gnfresh: build files regenerated"),
        RegenResult::Failed => return Ok(1),
    }
    match then {
        Some(cmd) => cmd.run(),
        None => Ok(0),
    }
}

fn watch(args: WatchArgs) -> anyhow::Result<i32> {
    let mut config = Config::new(args.marker_dir, Vec::new());
    let roots = if args.root.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.root
    };
    // Resolve symlinked roots up front; links below a root are not followed.
    config.watch_roots = roots
        .into_iter()
        .map(|root| std::fs::canonicalize(&root).unwrap_or(root))
        .collect();
    if !args.name.is_empty() {
        config.filter.names = args.name;
    }
    if !args.ext.is_empty() {
        config.filter.extensions = args.ext;
    }
    config.poll_interval = Duration::from_millis(args.interval_ms);

    let fs = RealFileSystem::new();
    let mut watcher =
        watch::Watcher::new(&fs, config.watch_roots.clone(), config.filter.clone());
    let mut tracker = Tracker::open(config.store());
    watch::run(&mut watcher, &mut tracker, config.poll_interval, args.polls);
    Ok(0)
}

fn init_logging(filter: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    builder.format_timestamp(None).format_target(false).init();
}

fn run_impl(args: Args) -> anyhow::Result<i32> {
    match args.cmd {
        Command::Unreachable(a) => unreachable(a),
        Command::Reachable(a) => reachable(a),
        Command::Status(a) => status(a),
        Command::Regen(a) => regen(a),
        Command::Watch(a) => watch(a),
    }
}

pub fn run() -> anyhow::Result<i32> {
    let args: Args = argh::from_env();
    init_logging(args.log.as_deref());
    if let Some(path) = &args.trace {
        trace::open(path)?;
    }
    let res = run_impl(args);
    trace::close()?;
    res
}
