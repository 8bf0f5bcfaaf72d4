mod auth;
mod cli;
mod config;
mod contents;
mod control;
mod fetch;
mod pool;
mod repo;
mod solver;
mod types;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{FindFile, Opts, ResolvePkg, SubCmd};
use lazy_static::lazy_static;

// Initialize writer
lazy_static! {
    static ref WRITER: cli::Writer = cli::Writer::new();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = try_main().await {
        error!("{}", err.to_string());
        err.chain().skip(1).for_each(|cause| {
            due_to!("{}", cause);
        });
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let mut opts = Opts::parse();
    WRITER.set_verbose(opts.verbose);
    if let Some(path) = opts.config.clone() {
        opts.merge_config(config::ConfigFile::load(&path)?);
    }

    let mut manager = repo::RepoManager::new();
    for entry in &opts.entry {
        if let Some(entry) = repo::parse_source_entry(entry) {
            manager.add(entry);
        }
    }
    for file in &opts.entry_file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to open sources list {}", file.display()))?;
        for entry in repo::parse_source_list(&text) {
            manager.add(entry);
        }
    }
    if manager.is_empty() {
        bail!("No valid APT entry was found. Specify one with --entry or --entry-file");
    }

    let auth = match &opts.auth_conf {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open auth configuration {}", path.display()))?;
            auth::AuthStore::parse(&text)
        }
        None => auth::AuthStore::new(),
    };
    let fetcher = fetch::Fetcher::new(opts.cache_dir.clone(), auth, opts.quiet);

    // "any" leaves resolution without a global architecture preference
    let default_arch = match opts.arch.as_str() {
        "any" => None,
        arch => Some(arch.to_string()),
    };

    match opts.subcmd {
        SubCmd::Resolve(resolve) => run_resolve(manager, fetcher, default_arch, resolve).await,
        SubCmd::Find(find) => run_find(manager, fetcher, find).await,
    }
}

async fn run_resolve(
    mut manager: repo::RepoManager,
    fetcher: fetch::Fetcher,
    default_arch: Option<String>,
    cmd: ResolvePkg,
) -> Result<()> {
    info!("Synchronizing repository metadata...");
    let mut pool = pool::PkgPool::new();
    manager
        .load(&fetcher, &mut pool)
        .await
        .context("Failed to load package indexes")?;
    debug!("Loaded {} package records", pool.len());

    let solver = solver::Solver::new(&pool, default_arch);
    let resolve_opts = solver::ResolveOpts {
        recursive: cmd.recursive,
        missing: cmd.missing,
    };
    let print_opts = solver::format::PrintOpts {
        format: expand_newline(cmd.format, cmd.newline.as_deref()),
        indent: cmd.indent,
        unique: !cmd.no_unique,
    };
    for selector in &cmd.selectors {
        match solver.resolve(selector, resolve_opts) {
            Some(root) => solver::format::print_tree(&pool, &root, &print_opts),
            None => {
                error!("Package {selector:?} not found");
            }
        }
    }
    Ok(())
}

async fn run_find(
    mut manager: repo::RepoManager,
    fetcher: fetch::Fetcher,
    cmd: FindFile,
) -> Result<()> {
    info!("Synchronizing repository metadata...");
    manager
        .load_releases(&fetcher)
        .await
        .context("Failed to load repository metadata")?;
    let db = contents::ContentsDb::load(manager.repos(), &fetcher)
        .await
        .context("Failed to load Contents indexes")?;

    let format = expand_newline(cmd.format, cmd.newline.as_deref());
    for pattern in &cmd.patterns {
        for hit in db.find(pattern)? {
            println!("{}", contents::format_hit(&hit, &format));
        }
    }
    Ok(())
}

fn expand_newline(format: String, newline: Option<&str>) -> String {
    match newline {
        Some(marker) if !marker.is_empty() => format.replace(marker, "\n"),
        _ => format,
    }
}
