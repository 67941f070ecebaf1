//! refvault - Metadata registry for secrets
//!
//! Commands:
//! - store <NAME>: Register a secret, print its reference
//! - retrieve <NAME>: Show metadata and the placeholder value
//! - list: List active secrets
//! - update <NAME>: Replace description or tags
//! - delete <NAME>: Soft delete
//! - rotate <NAME>: Issue a new reference
//! - stats: Aggregate counters
//! - audit: Recent audit entries
//! - config: Show effective configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use refvault::{SecretRegistry, SecretView};
use refvault_core::RegistryConfig;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refvault")]
#[command(about = "Metadata registry for secrets - references, tags and access history in one encrypted store")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    refvault store my_api_key -d "Production API key" -t api,production
    refvault retrieve my_api_key
    refvault list --tag production
    refvault rotate my_api_key
    refvault stats

KEYS:
    Without --master-key the store is sealed with a generated key kept in
    <storage>.key. Back that file up: losing it makes the store unreadable."#)]
struct Cli {
    /// Store file (overrides the configured path)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Configuration file (default: ~/.config/refvault/refvault.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prompt for a master key and derive the store key from it
    #[arg(long, global = true)]
    master_key: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new secret
    Store {
        /// Secret name
        name: String,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Show a secret's metadata (counts as an access)
    Retrieve {
        /// Secret name
        name: String,
        /// Don't show the placeholder value
        #[arg(long)]
        no_value: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List active secrets
    List {
        /// Only secrets carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a secret's description and/or tags
    Update {
        /// Secret name
        name: String,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New comma-separated tags (replaces all tags)
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Mark a secret as deleted
    Delete {
        /// Secret name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Issue a new reference for a secret
    Rotate {
        /// Secret name
        name: String,
    },

    /// Show statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries (default from config)
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RegistryConfig::load_from(path)?,
        None => RegistryConfig::load()?,
    };
    if let Some(storage) = cli.storage {
        config.storage = storage;
    }

    if let Some(Commands::Config) = cli.command {
        return cmd_config(&config);
    }

    let master_key = if cli.master_key {
        let key = rpassword::prompt_password("Enter master key: ")
            .context("Failed to read master key")?;
        if key.is_empty() {
            bail!("Empty master key not allowed");
        }
        Some(key)
    } else {
        None
    };

    let registry = SecretRegistry::open(&config, master_key.as_deref())
        .with_context(|| format!("Failed to open registry at {}", config.storage.display()))?;

    match cli.command {
        Some(Commands::Store {
            name,
            description,
            tags,
        }) => cmd_store(&registry, &name, &description, tags.as_deref()),
        Some(Commands::Retrieve {
            name,
            no_value,
            json,
        }) => cmd_retrieve(&registry, &name, no_value, json),
        Some(Commands::List { tag, json }) => cmd_list(&registry, tag.as_deref(), json),
        Some(Commands::Update {
            name,
            description,
            tags,
        }) => cmd_update(&registry, &name, description.as_deref(), tags.as_deref()),
        Some(Commands::Delete { name, force }) => cmd_delete(&registry, &name, force),
        Some(Commands::Rotate { name }) => cmd_rotate(&registry, &name),
        Some(Commands::Stats { json }) => cmd_stats(&registry, json),
        Some(Commands::Audit { limit, json }) => cmd_audit(&registry, limit, json),
        Some(Commands::Config) => cmd_config(&config),
        None => {
            // Default to listing secrets
            cmd_list(&registry, None, false)
        }
    }
}

/// Split a comma-separated tag list, dropping blanks
fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn join_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        "None".to_string()
    } else {
        tags.join(", ")
    }
}

/// Register a secret
fn cmd_store(
    registry: &SecretRegistry,
    name: &str,
    description: &str,
    tags: Option<&str>,
) -> Result<()> {
    let tags = tags.map(parse_tags).unwrap_or_default();
    let reference = registry.create(name, description, tags)?;

    println!("success: Secret '{}' stored", name);
    println!("Reference ID: {}", reference);

    Ok(())
}

/// Show a secret
fn cmd_retrieve(registry: &SecretRegistry, name: &str, no_value: bool, json: bool) -> Result<()> {
    let view = registry.retrieve(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_view(&view, no_value);
    Ok(())
}

fn print_view(view: &SecretView, no_value: bool) {
    let description = if view.description.is_empty() {
        "No description"
    } else {
        view.description.as_str()
    };
    let last_accessed = view
        .last_accessed
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "Never".to_string());

    println!("Name:          {}", view.name);
    println!("ID:            {}", view.id);
    println!("Description:   {}", description);
    println!("Tags:          {}", join_tags(&view.tags));
    println!("Status:        {}", view.status.as_str());
    println!("Reference:     {}", view.reference);
    println!("Created:       {}", view.created_at.to_rfc3339());
    println!("Last Accessed: {}", last_accessed);
    println!("Access Count:  {}", view.access_count);
    if let Some(deleted_at) = view.deleted_at {
        println!("Deleted:       {}", deleted_at.to_rfc3339());
    }
    if !view.rotation_history.is_empty() {
        println!("Rotations:     {}", view.rotation_history.len());
    }
    if !no_value {
        println!("Value:         {}", view.simulated_value);
    }
}

/// List secrets
fn cmd_list(registry: &SecretRegistry, tag: Option<&str>, json: bool) -> Result<()> {
    let secrets = registry.list(tag);

    if json {
        println!("{}", serde_json::to_string_pretty(&secrets)?);
        return Ok(());
    }

    if secrets.is_empty() {
        match tag {
            Some(tag) => println!("No secrets found with tag: {}", tag),
            None => println!("No secrets stored. Add one with: refvault store <name>"),
        }
        return Ok(());
    }

    println!("Found {} secrets", secrets.len());
    println!();

    for secret in &secrets {
        println!("  {}", secret.name);
        if !secret.description.is_empty() {
            println!("    Description: {}", secret.description);
        }
        println!("    Tags:        {}", join_tags(&secret.tags));
        println!("    Created:     {}", secret.created_at.format("%Y-%m-%d"));
        println!("    Accesses:    {}", secret.access_count);
    }

    Ok(())
}

/// Update a secret
fn cmd_update(
    registry: &SecretRegistry,
    name: &str,
    description: Option<&str>,
    tags: Option<&str>,
) -> Result<()> {
    if description.is_none() && tags.is_none() {
        bail!("Nothing to update. Pass --description and/or --tags");
    }

    if !registry.update(name, description, tags.map(parse_tags))? {
        bail!("Secret '{}' not found", name);
    }

    println!("success: Secret '{}' updated", name);
    Ok(())
}

/// Soft delete a secret
fn cmd_delete(registry: &SecretRegistry, name: &str, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete secret '{}'? (y/N): ", name);
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Deletion cancelled");
            return Ok(());
        }
    }

    if !registry.delete(name)? {
        bail!("Secret '{}' not found", name);
    }

    println!("success: Secret '{}' deleted", name);
    Ok(())
}

/// Rotate a secret's reference
fn cmd_rotate(registry: &SecretRegistry, name: &str) -> Result<()> {
    match registry.rotate(name)? {
        Some(reference) => {
            println!("success: Secret '{}' rotated", name);
            println!("New reference ID: {}", reference);
            Ok(())
        }
        None => bail!("Secret '{}' not found", name),
    }
}

/// Show statistics
fn cmd_stats(registry: &SecretRegistry, json: bool) -> Result<()> {
    let stats = registry.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Registry Statistics");
    println!();
    println!("  Total Secrets:         {}", stats.total_secrets);
    println!("  Total Accesses:        {}", stats.total_accesses);
    println!("  Recent Activity (24h): {}", stats.recent_activity);
    if let Some(most) = &stats.most_accessed {
        println!("  Most Accessed:         {} ({} times)", most.name, most.access_count);
    }
    if let Some(least) = &stats.least_accessed {
        println!("  Least Accessed:        {} ({} times)", least.name, least.access_count);
    }

    Ok(())
}

/// Show the audit log
fn cmd_audit(registry: &SecretRegistry, limit: Option<usize>, json: bool) -> Result<()> {
    let entries = match limit {
        Some(limit) => registry.audit_log(limit),
        None => registry.recent_audit(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No audit log entries found");
        return Ok(());
    }

    println!("Last {} audit log entries", entries.len());
    println!();

    for entry in &entries {
        println!(
            "  {}  {:<8}  {:<24}  {:<4}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.as_str(),
            entry.secret_name,
            if entry.success { "ok" } else { "FAIL" },
            entry.session_id
        );
    }

    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &RegistryConfig) -> Result<()> {
    println!("Storage:      {}", config.storage.display());
    println!("Key file:     {}", config.key_path().display());
    println!("Salt mode:    {}", config.salt_mode.as_str());
    println!("Load policy:  {}", config.load_policy.as_str());
    match &config.audit.sink {
        Some(sink) => println!("Audit sink:   {}", sink.display()),
        None => println!("Audit sink:   (memory only)"),
    }
    println!("Audit limit:  {}", config.audit.default_limit);
    Ok(())
}
