mod common;
mod resize;
mod ui;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use common::process::DuctRunner;
use resize::config::{ResizeConfig, parse_document, read_document};
use resize::dispatch::ResizeCommand;
use resize::executor::{self, ReexecDetacher, ThreadDetacher};
use resize::rootdev::rootdev_from_cmdline;
use resize::host::{Host, SystemHost};
use resize::{MODULE_NAME, Resizer, schema};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ui::prelude::*;
use ui::Console;

/// Grow the root filesystem to fill its partition
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit machine readable JSON events
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resize the root filesystem once
    Run {
        /// cloud-config file to read resize options from
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override resize_rootfs_tmp
        #[arg(long)]
        tmp: Option<PathBuf>,

        /// Run a noblock resize on a thread and wait for it before exiting
        #[arg(long)]
        thread_worker: bool,

        /// First argument overrides resize_rootfs (true, false, noblock)
        args: Vec<String>,
    },

    /// Strictly validate a cloud-config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the module documentation
    Doc,

    /// Print the root device named on the kernel command line
    Rootdev {
        /// Command line to inspect instead of /proc/cmdline
        #[arg(long)]
        cmdline: Option<String>,
    },

    /// Run a resize command in the background
    #[command(hide = true)]
    Worker {
        #[arg(last = true, required = true)]
        argv: Vec<String>,
    },
}

fn load_config(path: Option<&Path>, tmp: Option<PathBuf>) -> Result<ResizeConfig> {
    let mut config = match path {
        Some(path) => {
            let document = parse_document(&read_document(path)?)?;
            schema::validate_config(&document, false, &Console)?;
            ResizeConfig::from_value(&document)
        }
        None => ResizeConfig::default(),
    };
    if tmp.is_some() {
        config.resize_rootfs_tmp = tmp;
    }
    Ok(config)
}

fn run(config: Option<&Path>, tmp: Option<PathBuf>, thread_worker: bool, args: &[String]) -> Result<()> {
    let config = load_config(config, tmp)?;

    if thread_worker {
        let detacher = Arc::new(ThreadDetacher::default());
        let outcome = Resizer::system(detacher.clone()).handle(MODULE_NAME, &config, args);
        detacher.wait();
        outcome?;
    } else {
        Resizer::system(Arc::new(ReexecDetacher)).handle(MODULE_NAME, &config, args)?;
    }
    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    schema::validate_config_file(path, &Console)?;
    emit(
        Level::Success,
        "resizefs.config_valid",
        &format!("Valid cloud-config file {}", path.display()),
        None,
    );
    Ok(())
}

fn rootdev(cmdline: Option<String>) -> Result<()> {
    let cmdline = cmdline.unwrap_or_else(|| SystemHost.cmdline());
    match rootdev_from_cmdline(&cmdline) {
        Some(device) => {
            emit(
                Level::Info,
                "resizefs.rootdev",
                &device,
                Some(json!({ "device": device, "cmdline": cmdline })),
            );
            Ok(())
        }
        None => bail!("No root= entry on kernel command line"),
    }
}

fn worker(argv: Vec<String>) -> Result<()> {
    let command = ResizeCommand::new(argv);
    executor::run_timed(&command, &DuctRunner, &Console, executor::BACKGROUND_LABEL)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    ui::set_debug_mode(cli.debug);
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    ui::init(format, !cli.no_color);

    let result = match cli.command {
        Commands::Run {
            config,
            tmp,
            thread_worker,
            args,
        } => run(config.as_deref(), tmp, thread_worker, &args),
        Commands::Validate { config } => validate(&config),
        Commands::Doc => {
            print!("{}", schema::render_doc());
            Ok(())
        }
        Commands::Rootdev { cmdline } => rootdev(cmdline),
        Commands::Worker { argv } => worker(argv),
    };

    // Error messages already embed their causes
    if let Err(e) = result {
        emit(Level::Error, "resizefs.error", &e.to_string(), None);
        std::process::exit(1);
    }
}
