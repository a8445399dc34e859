//! contrafuzz CLI - contract-driven API fuzzing with verdict clustering

mod storage;

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use contrafuzz_core::{Config, cluster};
use contrafuzz_runner::{FuzzRunner, RunOutcome};

#[derive(Parser)]
#[command(name = "contrafuzz")]
#[command(about = "Contract-driven API fuzzing with verdict clustering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (warnings affect the exit code). Use --no-strict to disable.
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run contract fuzzing
    Fuzz {
        /// Config file (default: .contrafuzz.toml)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize config file
    Init,

    /// Show version and check configuration
    Doctor,

    /// Export JSON Schema for the clustered failure report
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Fuzz { config } => {
            let cfg = if let Some(path) = config {
                Config::load(std::path::Path::new(&path))?
            } else {
                Config::load_default()?
            };

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  spec:     {}", cfg.spec.display());
                eprintln!("  base_url: {}", cfg.base_url);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                eprintln!();
            }

            let fuzz_start = Instant::now();
            let outcome = FuzzRunner::from_config(cfg.clone()).run()?;
            let duration_secs = fuzz_start.elapsed().as_secs_f64();

            // Safety check: no tests ran → tool error
            if outcome.stats.total() == 0 {
                eprintln!("Error: No tests were executed. Check spec and base_url.");
                return Ok(3);
            }

            let exit_code = exit_code_for(&outcome, cli.strict);

            match cli.output {
                OutputFormat::Terminal => print_terminal(&outcome, exit_code),
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "exit_code": exit_code,
                        "stats": outcome.stats,
                        "clusters": outcome.report,
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
                OutputFormat::Silent => {}
            }

            // Persist report to ~/.contrafuzz/reports/
            let report_data = storage::ReportData {
                config: &cfg,
                outcome: &outcome,
                exit_code,
                duration_secs,
            };
            match storage::save_report(&report_data) {
                Ok(path) => {
                    if cli.output != OutputFormat::Silent {
                        eprintln!("Report saved: {}", path.display());
                    }
                }
                Err(e) => eprintln!("Warning: failed to save report: {e}"),
            }

            Ok(exit_code)
        }

        Commands::Init => {
            let config_path = ".contrafuzz.toml";
            if std::path::Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI contract");
            println!("  - base_url: server to test");
            println!("  - headers: auth tokens, API keys");
            println!("  - policy: ignored codes, hidden verdicts, leak keywords");
            Ok(0)
        }

        Commands::Doctor => {
            println!("contrafuzz doctor");
            println!("=================\n");

            let config_ok = Config::load_default().is_ok();
            println!(
                "[{}] Config file (.contrafuzz.toml)",
                if config_ok { "OK" } else { "--" }
            );

            if let Ok(cfg) = Config::load_default() {
                let spec_ok = cfg.spec.exists();
                println!(
                    "[{}] Contract file ({})",
                    if spec_ok { "OK" } else { "NG" },
                    cfg.spec.display()
                );
            }

            if !config_ok {
                println!("\nCreate config file:");
                println!("  contrafuzz init");
            }

            println!("\nReady to fuzz!");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", cluster::report_schema());
            Ok(0)
        }
    }
}

/// 0 pass; 1 warnings under strict; 2 errors; 3 tool error (elsewhere).
fn exit_code_for(outcome: &RunOutcome, strict: bool) -> i32 {
    if outcome.stats.errors > 0 {
        2
    } else if strict && outcome.stats.warnings > 0 {
        1
    } else {
        0
    }
}

fn print_terminal(outcome: &RunOutcome, exit_code: i32) {
    let verdict = if exit_code == 0 { "PASS".green() } else { "FAIL".red() };
    println!("\n{verdict}: {}", outcome.stats.summary_line());
    if outcome.stats.auth_errors > 0 {
        println!("  auth errors: {}", outcome.stats.auth_errors);
    }
    if outcome.stats.io_errors > 0 {
        println!("  i/o errors:  {}", outcome.stats.io_errors);
    }

    for group in &outcome.report {
        let header = format!(
            "\n{} — {} tests in {} buckets",
            group.result_reason,
            group.total_tests,
            group.buckets.len()
        );
        if group.status == "error" {
            println!("{}", header.red());
        } else {
            println!("{}", header.yellow());
        }

        for bucket in &group.buckets {
            println!("  [{}] {}", bucket.bucket_id, first_line(&bucket.error_message));
            for path_group in &bucket.paths {
                println!("      {} -> {}", path_group.path, path_group.test_cases);
            }
        }
    }
}

/// First line of a body, truncated for one-line console display.
fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.len() > 120 {
        let mut end = 120;
        while end > 0 && !line.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &line[..end])
    } else {
        line.to_string()
    }
}
