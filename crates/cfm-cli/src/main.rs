use std::{env, fs, io::ErrorKind};

use artifact::{inspect_file, show_artifact_info};
use cfm_config::config::{self, config_path, generate_default_config, set_config_path, Config};
use cfm_dl::http_client::{configure_http_client, parse_headers};
use cfm_registry::MetadataClient;
use cfm_utils::path::resolve_path;
use clap::Parser;
use cli::{Args, Commands};
use error::{CliError, CliResult, ErrorContext};
use logging::setup_logging;
use names::{show_feedstocks, show_hints, show_imports, show_pypi, show_shard_path};
use repodata::handle_repodata;
use tracing::{debug, warn};
use ureq::Proxy;
use utils::{print_line, set_color};

mod artifact;
mod cli;
mod error;
mod logging;
mod names;
mod repodata;
mod utils;

fn apply_config_path(path: &str) -> CliResult<()> {
    let path = resolve_path(path)?;
    let path = if path.is_absolute() {
        path
    } else {
        env::current_dir()
            .with_context(|| "retrieving current directory".into())?
            .join(path)
    };
    debug!("using config file {}", path.display());
    set_config_path(path);
    Ok(())
}

fn apply_http_settings(args: &Args) -> CliResult<()> {
    let proxy = args
        .proxy
        .as_deref()
        .map(|proxy| {
            Proxy::new(proxy)
                .map_err(|err| CliError::InvalidArgument(format!("invalid proxy `{proxy}`: {err}")))
        })
        .transpose()?;
    let headers = args.header.as_deref().map(parse_headers).transpose()?;
    let user_agent = args.user_agent.clone();

    if proxy.is_none() && headers.is_none() && user_agent.is_none() {
        return Ok(());
    }

    configure_http_client(|config| {
        if proxy.is_some() {
            config.proxy = proxy;
        }
        if user_agent.is_some() {
            config.user_agent = user_agent;
        }
        if headers.is_some() {
            config.headers = headers;
        }
    });
    Ok(())
}

/// Prints the config file, or the annotated defaults when there is none.
fn print_config() -> CliResult<()> {
    let path = config_path();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("Config file {} not found", path.display());
            Config::default_config().to_annotated_document()?.to_string()
        }
        Err(source) => {
            return Err(CliError::IoError {
                action: format!("reading {}", path.display()),
                source,
            });
        }
    };
    print_line(content.trim_end())
}

fn handle_cli() -> CliResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        set_color(false);
    }

    if let Some(ref path) = args.config {
        apply_config_path(path)?;
    }

    apply_http_settings(&args)?;

    match args.command {
        Commands::DefConfig => {
            generate_default_config()?;
        }
        Commands::Config => print_config()?,
        command => {
            config::init()?;
            let client = MetadataClient::new()?;

            match command {
                Commands::Info {
                    channel,
                    subdir,
                    artifact,
                    backend,
                    skip_suffix,
                } => {
                    show_artifact_info(
                        client,
                        &channel,
                        &subdir,
                        &artifact,
                        backend.as_deref(),
                        skip_suffix,
                    )?;
                }
                Commands::Inspect {
                    path,
                } => inspect_file(&client, &path)?,
                Commands::Feedstock {
                    names,
                } => show_feedstocks(&client, &names)?,
                Commands::ShardPath {
                    name,
                    level,
                    fill,
                    base,
                } => show_shard_path(&client, &name, level, fill, base)?,
                Commands::Import {
                    names,
                    all,
                    libcfgraph,
                } => show_imports(&client, &names, all, libcfgraph)?,
                Commands::Pypi {
                    names,
                } => show_pypi(&client, &names)?,
                Commands::Hints => show_hints(&client)?,
                Commands::Repodata {
                    action,
                } => handle_repodata(&client, action)?,
                Commands::DefConfig | Commands::Config => unreachable!(),
            }
        }
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
