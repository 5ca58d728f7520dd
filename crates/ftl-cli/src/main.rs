use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ftl_runner::scenario::{check_expected, load_expected, simulate};
use ftl_runner::{write_report, Config};

#[derive(Parser)]
#[command(name = "ftl", version)]
struct Cli {
    /// Config file (default: .ftl/ftl.toml in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config to .ftl/ftl.toml
    Init,

    /// Load the config and print the effective settings
    Check,

    /// Replay a scripted run through the relay and print forwarded events
    Replay {
        /// Scenario directory containing script.yaml (and optionally expected.yaml)
        #[arg(long)]
        scenario: PathBuf,

        /// Also write a JSON report to the configured report dir
        #[arg(long, default_value_t = false)]
        report: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let cfg_path = cli.config.clone().unwrap_or_else(|| Config::config_path(&cwd));
    let cfg = Config::load_or_default(&cfg_path)?;

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.cmd {
        Command::Init => {
            if cfg_path.exists() {
                println!("Config already present at {}", cfg_path.display());
            } else {
                Config::default_config().save_to(&cfg_path)?;
                println!("Wrote default config to {}", cfg_path.display());
            }
        }
        Command::Check => {
            println!("config: {}", cfg_path.display());
            println!("analysis timeout: {} ms", cfg.analysis.timeout_ms);
            let rules = cfg.skip_rules();
            if rules.is_empty() {
                println!("skip rules: none");
            } else {
                println!(
                    "skip rules: {} classes, {} tests, {} method prefixes",
                    cfg.skip.classes.len(),
                    cfg.skip.tests.len(),
                    cfg.skip.method_prefixes.len()
                );
            }
            println!("report dir: {}", cfg.report_dir().display());
        }
        Command::Replay { scenario, report } => {
            let result = simulate(&scenario).with_context(|| format!("replay {}", scenario.display()))?;
            for ev in &result.forwarded {
                println!("{}", serde_json::to_string(ev)?);
            }
            tracing::info!(
                forwarded = result.forwarded.len(),
                synthetic_failures = result.synthetic_failures.len(),
                "replay complete"
            );

            if report {
                let name = scenario
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("scenario");
                let path = write_report(&cfg.report_dir(), name, &result)?;
                println!("report written to {}", path.display());
            }

            if scenario.join("expected.yaml").exists() {
                let exp = load_expected(&scenario)?;
                let problems = check_expected(&result, &exp);
                if !problems.is_empty() {
                    for p in &problems {
                        eprintln!("mismatch: {}", p);
                    }
                    return Err(anyhow!("{} does not match expected.yaml", exp.scenario_id));
                }
                println!("{}: matches expected", exp.scenario_id);
            }
        }
    }

    Ok(())
}
