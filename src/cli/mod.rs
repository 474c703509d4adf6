//! CLI module for the Kilat admin client.
//!
//! Provides subcommands that drive the client state layer from a terminal:
//! - `login` / `register` / `logout` / `whoami` - session lifecycle
//! - `collections` - List registered collections
//! - `browse <slug>` - Page through a collection's entries
//! - `navigate <path>` - Show where the navigation guard sends a path
//! - `workspaces` - List workspaces
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::collections::{FieldDescriptor, ListingState, SortDirection};
use crate::config::Config;
use crate::router::{return_path_from, GuardOutcome, HOME_PATH};
use crate::AppContext;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "kilat")]
#[command(author, version, about = "Admin client for the Kilat CMS", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "kilat.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Admin backend URL, overrides `api.base_url`
    #[arg(long, env = "KILAT_API_URL")]
    pub api_url: Option<String>,

    /// Use the built-in identity service and generated entries
    #[arg(long)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and persist the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "KILAT_PASSWORD")]
        password: String,
        /// Login URL query (e.g. `redirect=%2Fcollections%2Fproducts`) to resume after sign-in
        #[arg(long)]
        redirect: Option<String>,
    },

    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "KILAT_PASSWORD")]
        password: String,
    },

    /// Sign out and forget the persisted session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List registered collections
    Collections,

    /// Page through a collection's entries
    Browse {
        /// Collection slug
        collection: String,
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Entries per page (default: listing.page_size)
        #[arg(long)]
        page_size: Option<usize>,
        /// Case-insensitive search
        #[arg(short, long)]
        search: Option<String>,
        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort direction: asc or desc
        #[arg(long, default_value = "asc")]
        order: SortDirection,
    },

    /// Evaluate the navigation guard for a path
    Navigate {
        /// Path such as /collections/products
        path: String,
    },

    /// List workspaces
    Workspaces,

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Check,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
        if self.mock {
            config.auth.mock_mode = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli);
    }

    let ctx = AppContext::new(config)?;
    match &cli.command {
        Commands::Login {
            email,
            password,
            redirect,
        } => cmd_login(&ctx, email, password, redirect.as_deref()).await,
        Commands::Register {
            name,
            email,
            password,
        } => cmd_register(&ctx, name, email, password).await,
        Commands::Logout => cmd_logout(&ctx).await,
        Commands::Whoami => cmd_whoami(&ctx).await,
        Commands::Collections => cmd_collections(&ctx),
        Commands::Browse {
            collection,
            page,
            page_size,
            search,
            sort,
            order,
        } => {
            let query = BrowseQuery {
                page: *page,
                page_size: *page_size,
                search: search.as_deref(),
                sort: sort.as_deref(),
                order: *order,
            };
            cmd_browse(&ctx, collection, query).await
        }
        Commands::Navigate { path } => cmd_navigate(&ctx, path).await,
        Commands::Workspaces => cmd_workspaces(&ctx),
        Commands::Config(ConfigCommands::Check) => Ok(()),
    }
}

async fn cmd_login(
    ctx: &AppContext,
    email: &str,
    password: &str,
    redirect: Option<&str>,
) -> Result<()> {
    ctx.session
        .login(email, password)
        .await
        .context("Sign-in failed")?;
    print_signed_in(ctx);

    let next = redirect
        .and_then(return_path_from)
        .unwrap_or_else(|| HOME_PATH.to_string());
    println!("Continue to:  {}", next);
    println!();
    Ok(())
}

async fn cmd_register(ctx: &AppContext, name: &str, email: &str, password: &str) -> Result<()> {
    ctx.session
        .register(name, email, password)
        .await
        .context("Registration failed")?;
    print_signed_in(ctx);
    Ok(())
}

fn print_signed_in(ctx: &AppContext) {
    println!();
    println!("[OK] Signed in");
    println!();
    if let Some(session) = ctx.session.session() {
        println!("User:         {} <{}>", session.user.name, session.user.email);
        println!("Expires:      {}", session.expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
}

async fn cmd_logout(ctx: &AppContext) -> Result<()> {
    if !ctx.session.check_auth().await {
        println!("Not signed in.");
        return Ok(());
    }
    ctx.session.logout().await;
    println!("[OK] Signed out");
    Ok(())
}

async fn cmd_whoami(ctx: &AppContext) -> Result<()> {
    if !ctx.session.check_auth().await {
        println!("Not signed in.");
        return Ok(());
    }
    let Some(session) = ctx.session.session() else {
        println!("Not signed in.");
        return Ok(());
    };

    println!();
    println!("ID:       {}", session.user.id);
    println!("Name:     {}", session.user.name);
    println!("Email:    {}", session.user.email);
    println!("Avatar:   {}", session.user.avatar.as_deref().unwrap_or("-"));
    println!(
        "Expires:  {} ({})",
        session.expires_at.format("%Y-%m-%d %H:%M UTC"),
        format_remaining((session.expires_at - chrono::Utc::now()).num_seconds())
    );
    println!();
    Ok(())
}

fn cmd_collections(ctx: &AppContext) -> Result<()> {
    let collections = ctx.collections.list();
    if collections.is_empty() {
        println!("No collections found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<16}  {:<16}  {:>8}  {:<36}  {:<10}",
        "SLUG", "LABEL", "ENTRIES", "DESCRIPTION", "CREATED"
    );
    println!("{}", "-".repeat(96));

    for c in collections {
        println!(
            "{:<16}  {:<16}  {:>8}  {:<36}  {:<10}",
            truncate(&c.slug, 16),
            truncate(&c.label, 16),
            c.entry_count,
            truncate(c.description.as_deref().unwrap_or("-"), 36),
            c.created_at
        );
    }

    println!();
    Ok(())
}

struct BrowseQuery<'a> {
    page: usize,
    page_size: Option<usize>,
    search: Option<&'a str>,
    sort: Option<&'a str>,
    order: SortDirection,
}

async fn cmd_browse(ctx: &AppContext, collection: &str, query: BrowseQuery<'_>) -> Result<()> {
    let path = format!("/collections/{}", urlencoding::encode(collection));
    let outcome = ctx.guard.before_each(&path).await;
    if outcome != GuardOutcome::Allow {
        anyhow::bail!(
            "Not signed in. Run `kilat login` first (navigation redirected to {})",
            outcome.location(&path)
        );
    }

    let listing = &ctx.listing;
    listing.select_collection(collection).await?;
    if let Some(size) = query.page_size {
        listing.set_page_size(size).await?;
    }
    if let Some(search) = query.search {
        listing.set_search(search).await?;
    }
    if let Some(field) = query.sort {
        listing.set_sort(field, query.order).await?;
    }
    if query.page != 1 {
        listing.set_page(query.page).await?;
    }

    print_listing(&listing.state());
    Ok(())
}

fn print_listing(state: &ListingState) {
    println!();
    println!("=== {} ===", state.active_collection);
    println!();

    if state.items.is_empty() {
        println!("No entries on this page.");
    } else {
        let header: Vec<String> = state
            .visible_fields
            .iter()
            .map(|f| pad(&f.label.to_uppercase(), column_width(f)))
            .collect();
        println!("{}", header.join("  "));
        let total_width: usize = state
            .visible_fields
            .iter()
            .map(|f| column_width(f) + 2)
            .sum();
        println!("{}", "-".repeat(total_width.saturating_sub(2)));

        for item in &state.items {
            let row: Vec<String> = state
                .visible_fields
                .iter()
                .map(|f| pad(&format_cell(item.get(&f.key)), column_width(f)))
                .collect();
            println!("{}", row.join("  "));
        }
    }

    println!();
    match state.visible_range() {
        Some((first, last)) => println!(
            "Showing {}-{} of {}  (page {} of {})",
            first,
            last,
            state.total_records,
            state.page_index,
            state.total_pages()
        ),
        None => println!(
            "{} entries  (page {} of {})",
            state.total_records,
            state.page_index,
            state.total_pages()
        ),
    }
    if !state.search_query.is_empty() {
        println!("Search: \"{}\"", state.search_query);
    }
    if !state.sort.is_unsorted() {
        println!("Sorted by {} {}", state.sort.field, state.sort.direction);
    }
    println!();
}

async fn cmd_navigate(ctx: &AppContext, path: &str) -> Result<()> {
    let outcome = ctx.guard.before_each(path).await;
    let route = ctx
        .guard
        .router()
        .resolve(path)
        .map(|m| m.name)
        .unwrap_or("-");

    let verdict = match &outcome {
        GuardOutcome::Allow => "allow",
        GuardOutcome::RedirectToLogin { .. } => "redirect (sign-in required)",
        GuardOutcome::RedirectToHome => "redirect (already signed in)",
    };

    println!("Route:     {}", route);
    println!("Decision:  {}", verdict);
    println!("Location:  {}", outcome.location(path));
    Ok(())
}

fn cmd_workspaces(ctx: &AppContext) -> Result<()> {
    let current = ctx.workspaces.current().map(|w| w.id);

    println!();
    println!(
        "{:<2} {:<4}  {:<24}  {:<8}  {:>7}  {:<10}",
        "", "ID", "NAME", "ROLE", "MEMBERS", "CREATED"
    );
    println!("{}", "-".repeat(64));
    for w in ctx.workspaces.list() {
        let marker = if current.as_deref() == Some(w.id.as_str()) {
            "*"
        } else {
            ""
        };
        println!(
            "{:<2} {:<4}  {:<24}  {:<8}  {:>7}  {:<10}",
            marker,
            w.id,
            truncate(&w.name, 24),
            w.role.to_string(),
            w.member_count,
            w.created_at
        );
    }
    println!();
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("The built-in defaults will be used.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(mut config) => {
            cli.apply_overrides(&mut config);

            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("API:");
            println!("  Base URL:     {}", config.api.base_url);
            println!("  Timeout:      {}s", config.api.timeout_secs);
            println!();
            println!("Auth:");
            println!(
                "  Mode:         {}",
                if config.auth.mock_mode { "Mock" } else { "Remote" }
            );
            println!("  Session Key:  {}", config.auth.session_key);
            println!("  Session TTL:  {}h", config.auth.session_ttl_hours);
            println!();
            println!("Storage:");
            println!("  Data Dir:     {}", config.storage.data_dir.display());
            println!();
            println!("Listing:");
            println!("  Page Size:    {}", config.listing.page_size);
            println!("  Initial:      {}", config.listing.initial_collection);
            println!(
                "  Unknown Slugs: {}",
                if config.listing.strict_collections {
                    "Rejected"
                } else {
                    "Fallback"
                }
            );
            println!();

            let warnings = config_warnings(&config);
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}

fn config_warnings(config: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if crate::storage::validate_key(&config.auth.session_key).is_err() {
        warnings.push("auth.session_key is not a valid file name - sessions cannot be saved");
    }
    if config.auth.session_ttl_hours <= 0 {
        warnings.push("auth.session_ttl_hours is not positive - sessions without an expiry are expired immediately");
    }
    if !config.auth.mock_mode && !config.api.base_url.starts_with("https://") {
        warnings.push("api.base_url is not HTTPS - bearer tokens are sent in plaintext");
    }
    if config.auth.mock_mode {
        warnings.push("Mock mode is enabled - sign-in is not checked against the backend");
    }
    warnings
}

fn column_width(field: &FieldDescriptor) -> usize {
    (field.min_width_hint as usize / 8).clamp(6, 32)
}

fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", truncate(s, width), width = width)
}

/// Format seconds left until expiry
fn format_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "expired".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("in {}h {}m", hours, minutes)
    } else {
        format!("in {}m", minutes.max(1))
    }
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_browse() {
        let cli = Cli::try_parse_from([
            "kilat", "--mock", "browse", "products", "--page", "2", "--sort", "price", "--order",
            "desc",
        ])
        .unwrap();

        assert!(cli.mock);
        match cli.command {
            Commands::Browse {
                collection,
                page,
                sort,
                order,
                ..
            } => {
                assert_eq!(collection, "products");
                assert_eq!(page, 2);
                assert_eq!(sort.as_deref(), Some("price"));
                assert_eq!(order, SortDirection::Descending);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "kilat",
            "--api-url",
            "https://cms.example.com/api",
            "--log-level",
            "debug",
            "whoami",
        ])
        .unwrap();
        let mut config = Config::default();
        config.auth.mock_mode = false;
        cli.apply_overrides(&mut config);

        assert_eq!(config.api.base_url, "https://cms.example.com/api");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.auth.mock_mode);
    }

    #[test]
    fn test_config_warnings() {
        let mut config = Config::default();
        config.auth.mock_mode = false;
        config.api.base_url = "https://cms.example.com/api".to_string();
        assert!(config_warnings(&config).is_empty());

        config.auth.session_key = "kilat session".to_string();
        let warnings = config_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("auth.session_key"));
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(None), "-");
        assert_eq!(format_cell(Some(&json!(42))), "42");
        assert_eq!(format_cell(Some(&json!("Draft"))), "Draft");
        assert_eq!(format_cell(Some(&json!(["Vegan", "Delivery"]))), "Vegan, Delivery");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Introduction to Web Development", 12), "Introduct...");
        assert_eq!(truncate("Équipe éditoriale", 8), "Équip...");
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(-5), "expired");
        assert_eq!(format_remaining(30), "in 1m");
        assert_eq!(format_remaining(3 * 3600 + 120), "in 3h 2m");
    }
}
