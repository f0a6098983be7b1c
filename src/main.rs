use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use colored::Colorize;
use local_judger::config::{self, ConfigLayer, RealFs};
use local_judger::{Judge, JudgeError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "local-judger")]
#[command(author, version, about = "Compile a solution and judge it against local test data")]
struct Cli {
    /// Problem name: the test data subdirectory and the `<name>.in`/`<name>.out` files
    problem: Option<String>,

    /// Source file [default: <problem>.cpp]
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// TOML configuration file [default: judge.toml when present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compiler command [default: $CXX or g++]
    #[arg(long)]
    compiler: Option<String>,

    /// Compiler flag, repeatable [default: $CXXFLAGS or -O2 -std=c++14]
    #[arg(long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
    flags: Vec<String>,

    /// CPU time limit per case in seconds [default: 1]
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Kill a case after this many wall-clock seconds even if it is idle
    #[arg(long)]
    wall_limit: Option<f64>,

    /// Test data root, repeatable, searched in order [default: sample, data]
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// Directory for the executable and the staged I/O files [default: a temporary directory]
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            problem: self.problem.clone(),
            source: self.source.clone(),
            compiler: self.compiler.clone(),
            flags: (!self.flags.is_empty()).then(|| self.flags.clone()),
            time_limit: self.time_limit,
            wall_limit: self.wall_limit,
            roots: (!self.roots.is_empty()).then(|| self.roots.clone()),
            work_dir: self.work_dir.clone(),
            input_suffix: None,
            answer_suffix: None,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "local_judger=info",
        1 => "local_judger=debug",
        _ => "local_judger=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<bool, JudgeError> {
    let file = config::discover_config_file(cli.config.as_deref(), &RealFs)
        .map(|path| ConfigLayer::load(&path))
        .transpose()?;
    let env = |key: &str| std::env::var(key).ok();
    let config = config::resolve_configuration(cli.layer(), file, &env, &RealFs)?;

    let judge = Judge::new(config);
    let report = judge.run(&mut io::stdout().lock())?;
    if let Some(path) = &cli.report_json {
        report.write_json(path)?;
    }
    Ok(report.success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            if let JudgeError::Compile { diagnostics, .. } = &e {
                eprint!("{diagnostics}");
            }
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::from(2)
        }
    }
}
