use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;

use adsense_gateway::{AccountStatus, AccountStore, AccountUpdate, GatewayConfig, NewAccount};

#[derive(Parser)]
#[command(name = "adsense-gateway-cli")]
#[command(about = "AdSense Gateway account database administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path (defaults to $ACCOUNTS_DB_PATH or accounts.json)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Directory relative credential paths are resolved against
    #[arg(long)]
    credentials_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all accounts
    List,

    /// Show one account in full
    Show {
        account_key: String,
    },

    /// Add a new account
    Add {
        /// Unique key (letters, numbers, underscores, hyphens)
        account_key: String,

        /// AdSense publisher ID, e.g. pub-1234567890
        account_id: String,

        /// Human readable name
        display_name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        client_secrets: Option<String>,

        #[arg(long)]
        credentials_file: Option<String>,

        #[arg(long)]
        website_url: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Update fields of an existing account
    Update {
        account_key: String,

        #[arg(long)]
        account_id: Option<String>,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// active, inactive or error
        #[arg(long)]
        status: Option<AccountStatus>,

        #[arg(long)]
        website_url: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Remove an account
    Remove {
        account_key: String,

        /// Keep its client secrets and credentials files on disk
        #[arg(long)]
        keep_files: bool,
    },

    /// Search accounts by name, description, website, notes or key
    Search {
        query: String,
    },

    /// Back up the database file
    Backup {
        /// Destination (defaults to a timestamped file next to the database)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Replace the database with a backup
    Restore {
        backup_path: PathBuf,
    },

    /// Check database integrity
    Validate,

    /// Show database statistics
    Stats,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env();

    let db_path = cli.db.unwrap_or(config.db_path);
    let credentials_dir = match (cli.credentials_dir, std::env::var_os("CREDENTIALS_DIR")) {
        (Some(dir), _) => Some(dir),
        (None, Some(_)) => Some(config.credentials_dir),
        (None, None) => None,
    };

    let mut store = AccountStore::open(&db_path)?;
    if let Some(dir) = credentials_dir {
        store = store.with_credentials_dir(dir);
    }

    match cli.command {
        Commands::List => {
            let accounts = store.account_list();
            println!("{} account(s) in {}", accounts.len(), store.path().display());
            for account in accounts {
                println!(
                    "  {:<20} {:<22} {:<9} {}",
                    account.account_key,
                    account.account_id,
                    account.status.as_str(),
                    account.display_name
                );
            }
        }

        Commands::Show { account_key } => match store.get_account(&account_key) {
            Some(account) => println!("{}", serde_json::to_string_pretty(account)?),
            None => anyhow::bail!("Account '{}' not found", account_key),
        },

        Commands::Add {
            account_key,
            account_id,
            display_name,
            description,
            client_secrets,
            credentials_file,
            website_url,
            category,
            notes,
        } => {
            let new = NewAccount {
                account_key,
                account_id,
                display_name,
                description,
                client_secrets,
                credentials_file,
                website_url,
                category,
                notes,
            };
            let account = store.add_account(new)?;
            println!("Added account '{}' ({})", account.account_key, account.status);
            println!("   Client secrets: {}", account.client_secrets);
            println!("   Credentials: {}", account.credentials_file);
        }

        Commands::Update {
            account_key,
            account_id,
            display_name,
            description,
            status,
            website_url,
            category,
            notes,
        } => {
            let mut metadata = Map::new();
            for (field, value) in [("website_url", website_url), ("category", category), ("notes", notes)] {
                if let Some(value) = value {
                    metadata.insert(field.to_string(), Value::String(value));
                }
            }

            let updates = AccountUpdate {
                account_id,
                display_name,
                description,
                status,
                metadata: (!metadata.is_empty()).then_some(metadata),
                ..AccountUpdate::default()
            };
            let account = store.update_account(&account_key, &updates)?;
            println!("Updated account '{}'", account.account_key);
        }

        Commands::Remove { account_key, keep_files } => {
            if store.remove_account(&account_key, !keep_files)? {
                println!("Removed account '{}'", account_key);
            } else {
                anyhow::bail!("Account '{}' not found", account_key);
            }
        }

        Commands::Search { query } => {
            let results = store.search_accounts(&query);
            println!("{} match(es) for '{}'", results.len(), query);
            for account in results {
                println!("  {:<20} {}", account.account_key, account.display_name);
            }
        }

        Commands::Backup { path } => {
            let backup = store.create_backup(path.as_deref())?;
            println!("Backup written to {}", backup.display());
        }

        Commands::Restore { backup_path } => {
            let safety = store.restore_from_backup(&backup_path)?;
            println!("Restored from {}", backup_path.display());
            println!("   Previous version saved to {}", safety.display());
        }

        Commands::Validate => {
            let errors = store.validate_database();
            if errors.is_empty() {
                println!("Database is valid");
            } else {
                println!("{} problem(s) found:", errors.len());
                for error in &errors {
                    println!("  - {}", error);
                }
                std::process::exit(1);
            }
        }

        Commands::Stats => {
            let stats = store.statistics();
            let metadata = store.metadata();

            println!("Database: {}", store.path().display());
            println!("   Version: {}", metadata.version);
            println!("   Last modified: {}", metadata.last_modified.format("%Y-%m-%d %H:%M:%S"));
            println!("   Total accounts: {}", stats.total_accounts);
            println!("   Active: {}", stats.active_accounts);
            println!("   Inactive: {}", stats.inactive_accounts);
            match stats.last_backup {
                Some(at) => println!("   Last backup: {}", at.format("%Y-%m-%d %H:%M:%S")),
                None => println!("   Last backup: never"),
            }
        }
    }

    Ok(())
}
