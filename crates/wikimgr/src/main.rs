use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wikimgr_core::bulk::{
    BulkMoveRequest, BulkRedirectRequest, BulkRelinkRequest, MoveItem, RedirectItem, bulk_move,
    bulk_redirect, bulk_relink, inventory,
};
use wikimgr_core::config::{WikiConfig, load_config};
use wikimgr_core::gateway::GraphQlGateway;
use wikimgr_core::index::PathIndex;
use wikimgr_core::pages::{
    DeletePageRequest, GetPageRequest, UpsertPageRequest, delete_page, get_page,
    refresh_path_index, upsert_page,
};
use wikimgr_core::paths::preflight_analysis;

#[derive(Debug, Parser)]
#[command(
    name = "wikimgr",
    version,
    about = "Management facade over a Wiki.js content store"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "wikimgr.toml",
        help = "Config file with the [upstream] connection settings"
    )]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Fetch one page by path or id")]
    Get(GetArgs),
    #[command(about = "Create or update a page at a normalized path")]
    Upsert(UpsertArgs),
    #[command(about = "Delete a page, reporting soft failure when refused")]
    Delete(DeleteArgs),
    #[command(about = "Check a path against the allowed-root taxonomy")]
    Preflight(PreflightArgs),
    #[command(about = "List every page the upstream knows about")]
    Inventory(InventoryArgs),
    #[command(subcommand, about = "Bulk structural operations")]
    Bulk(BulkCommands),
}

#[derive(Debug, Args)]
struct GetArgs {
    #[arg(long)]
    path: Option<String>,
    #[arg(long)]
    id: Option<i64>,
}

#[derive(Debug, Args)]
struct UpsertArgs {
    #[arg(long)]
    path: String,
    #[arg(long)]
    title: String,
    #[arg(long, conflicts_with = "content_file")]
    content: Option<String>,
    #[arg(long, value_name = "FILE")]
    content_file: Option<PathBuf>,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,
    #[arg(long)]
    private: bool,
    #[arg(long, value_name = "KEY")]
    idempotency_key: Option<String>,
    #[arg(long, value_name = "KEY", help = "Legacy idempotency key alias")]
    legacy_idempotency_key: Option<String>,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(long)]
    path: Option<String>,
    #[arg(long)]
    id: Option<i64>,
}

#[derive(Debug, Args)]
struct PreflightArgs {
    path: String,
    #[arg(long, help = "Skip listing existing paths from the upstream")]
    offline: bool,
}

#[derive(Debug, Args)]
struct InventoryArgs {
    #[arg(long)]
    include_content: bool,
}

#[derive(Debug, Subcommand)]
enum BulkCommands {
    #[command(about = "Move pages, leaving stubs or deleting sources")]
    Move(BulkMoveArgs),
    #[command(about = "Create moved-stub pages pointing at new paths")]
    Redirect(BulkRedirectArgs),
    #[command(about = "Rewrite markdown links across the whole wiki")]
    Relink(BulkRelinkArgs),
}

#[derive(Debug, Args)]
struct BulkMoveArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON array of {from_path, to_path, merge}"
    )]
    file: PathBuf,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct BulkRedirectArgs {
    #[arg(long, value_name = "FILE", help = "JSON array of {from_path, to_path}")]
    file: PathBuf,
}

#[derive(Debug, Args)]
struct BulkRelinkArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON object mapping old paths to new paths"
    )]
    file: PathBuf,
    #[arg(long = "scope", value_name = "PATH", help = "Restrict to these paths")]
    scope: Vec<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Get(args) => run_get(&config, args),
        Commands::Upsert(args) => run_upsert(&config, args),
        Commands::Delete(args) => run_delete(&config, args),
        Commands::Preflight(args) => run_preflight(&config, args),
        Commands::Inventory(args) => run_inventory(&config, args),
        Commands::Bulk(BulkCommands::Move(args)) => run_bulk_move(&config, args),
        Commands::Bulk(BulkCommands::Redirect(args)) => run_bulk_redirect(&config, args),
        Commands::Bulk(BulkCommands::Relink(args)) => run_bulk_relink(&config, args),
    }
}

fn run_get(config: &WikiConfig, args: GetArgs) -> Result<()> {
    let index = PathIndex::new();
    let page = get_page(
        config,
        &index,
        &GetPageRequest {
            path: args.path,
            id: args.id,
        },
    )?;
    print_json(&page)
}

fn run_upsert(config: &WikiConfig, args: UpsertArgs) -> Result<()> {
    let content = match (args.content, args.content_file) {
        (Some(content), _) => content,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => bail!("upsert requires --content or --content-file"),
    };

    let index = PathIndex::new();
    let response = upsert_page(
        config,
        &index,
        &UpsertPageRequest {
            path: args.path,
            title: args.title,
            content,
            description: args.description,
            tags: args.tags,
            is_private: args.private,
        },
        args.idempotency_key.as_deref(),
        args.legacy_idempotency_key.as_deref(),
    )?;
    print_json(&response)
}

fn run_delete(config: &WikiConfig, args: DeleteArgs) -> Result<()> {
    let index = PathIndex::new();
    let response = delete_page(
        config,
        &index,
        &DeletePageRequest {
            path: args.path,
            id: args.id,
        },
    )?;
    print_json(&response)
}

fn run_preflight(config: &WikiConfig, args: PreflightArgs) -> Result<()> {
    let allowed_roots = config.allowed_roots();
    let existing_paths = if args.offline {
        Vec::new()
    } else {
        list_existing_paths(config)
    };

    let report = preflight_analysis(&args.path, &allowed_roots, &existing_paths);
    print_json(&report)
}

/// Best-effort listing for preflight suggestions: an unreachable upstream
/// degrades to no suggestions rather than failing the analysis.
fn list_existing_paths(config: &WikiConfig) -> Vec<String> {
    let resolved = match config.resolved() {
        Ok(resolved) => resolved,
        Err(error) => {
            eprintln!("warning: {error}; preflighting without existing paths");
            return Vec::new();
        }
    };
    let mut gateway = match GraphQlGateway::new(resolved) {
        Ok(gateway) => gateway,
        Err(error) => {
            eprintln!("warning: {error}; preflighting without existing paths");
            return Vec::new();
        }
    };

    let index = PathIndex::new();
    if let Err(error) = refresh_path_index(&mut gateway, &index) {
        eprintln!("warning: failed to list existing paths: {error}");
        return Vec::new();
    }
    index.entries().into_iter().map(|(path, _)| path).collect()
}

fn run_inventory(config: &WikiConfig, args: InventoryArgs) -> Result<()> {
    let index = PathIndex::new();
    let report = inventory(config, &index, args.include_content)?;
    print_json(&report)
}

fn run_bulk_move(config: &WikiConfig, args: BulkMoveArgs) -> Result<()> {
    let moves: Vec<MoveItem> = read_json_file(&args.file)?;
    let index = PathIndex::new();
    let report = bulk_move(
        config,
        &index,
        &BulkMoveRequest {
            moves,
            dry_run: args.dry_run,
        },
    )?;
    print_json(&report)
}

fn run_bulk_redirect(config: &WikiConfig, args: BulkRedirectArgs) -> Result<()> {
    let redirects: Vec<RedirectItem> = read_json_file(&args.file)?;
    let index = PathIndex::new();
    let report = bulk_redirect(config, &index, &BulkRedirectRequest { redirects })?;
    print_json(&report)
}

fn run_bulk_relink(config: &WikiConfig, args: BulkRelinkArgs) -> Result<()> {
    let mapping = read_json_file(&args.file)?;
    let scope = if args.scope.is_empty() {
        None
    } else {
        Some(args.scope)
    };
    let index = PathIndex::new();
    let report = bulk_relink(config, &index, &BulkRelinkRequest { mapping, scope })?;
    print_json(&report)
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
