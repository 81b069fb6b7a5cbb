// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use hireboard_db::Store;
use hireboard_tui::AppState;
use runtime::{DemoRuntime, HttpRuntime};
use simplelog::WriteLogger;
use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const DEMO_SCORE_TYPES: usize = 24;

fn main() {
    if let Err(error) = run() {
        log::error!("{error:#}");
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `hireboard --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    init_logging(&config, &db_path)?;
    log::info!(
        "starting hireboard (config {}, database {})",
        options.config_path.display(),
        db_path.display()
    );

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or HIREBOARD_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    let removed = store.evict_stale_entries(config.draft_ttl_days())?;
    if removed > 0 {
        log::info!("dropped {removed} stale drafts and settings");
    }

    let page_size = config.page_size();
    if options.demo {
        if options.check_only {
            return Ok(());
        }
        let mut state = AppState::new(&store, &store, page_size);
        let mut runtime = DemoRuntime::new(DEMO_SCORE_TYPES);
        return hireboard_tui::run_app(&mut state, &mut runtime);
    }

    let client = hireboard_api::Client::new(config.api_base_url(), config.api_timeout()?)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    if options.check_only {
        return Ok(());
    }

    let mut state = AppState::new(&store, &store, page_size);
    let mut runtime = HttpRuntime::new(&client);
    hireboard_tui::run_app(&mut state, &mut runtime)
}

/// The terminal belongs to the UI, so log records go to a file.
fn init_logging(config: &Config, db_path: &Path) -> Result<()> {
    let log_path = config.log_path(db_path);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].path to a writable file",
                log_path.display()
            )
        })?;
    WriteLogger::init(config.log_level()?, simplelog::Config::default(), log_file)
        .context("install logger")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("hireboard");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Run against an in-memory demo backend");
    println!("  --check                  Validate config, database and API settings, then exit");
    println!("  --help                   Show this help");
}
