use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use conncred_core::{
    ensure_required_properties_set, AuthenticationType, ConnectionCredentials, ConnectionProfile,
    ProfileStore, Prompter, Question, QuestionKind, ResolveError, ResolveRequest, SavePassword,
};
use conncred_secrets::{KeychainStore, MemoryStore, SecretStore};
use conncred_store::{ConnectionStore, Settings};
use conncred_tui::TerminalPrompter;

mod diagnostics;

/// conncred - database connection profiles with passwords kept in the OS keychain
#[derive(Parser, Debug)]
#[command(name = "conncred")]
#[command(about = "Manage database connection profiles and resolve their credentials")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to ~/.config/conncred/settings.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Profile list file (overrides the settings file)
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    /// Keep saved passwords in memory for this run only
    #[arg(long, global = true)]
    no_keychain: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save a new connection profile
    Add(AddArgs),

    /// List saved profiles
    List,

    /// Resolve credentials for a profile (or an ad-hoc connection)
    Connect(ConnectArgs),

    /// Show recently used connections
    Recent,

    /// Rename a saved profile, moving its saved password
    Rename {
        /// Current profile name
        name: String,
        /// New profile name
        new_name: String,
    },

    /// Delete a saved profile and its saved password
    Remove {
        /// Profile name
        name: String,
        /// Skip the confirmation question
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete the saved password of a profile and stop saving it
    ForgetPassword {
        /// Profile name
        name: String,
    },

    /// Empty the recently used list
    ClearRecent,
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Server host name (host or host\instance)
    #[arg(long)]
    server: Option<String>,

    /// Database name
    #[arg(short, long)]
    database: Option<String>,

    /// Authentication type: SqlLogin, Integrated or AzureMFA
    #[arg(short, long)]
    auth: Option<AuthenticationType>,

    /// Login name
    #[arg(short, long)]
    user: Option<String>,

    /// TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable transport encryption
    #[arg(long)]
    no_encrypt: bool,

    /// Connect timeout in seconds
    #[arg(long)]
    timeout: Option<u32>,

    /// Application name reported to the server
    #[arg(long)]
    application_name: Option<String>,
}

impl TargetArgs {
    fn credentials(&self) -> ConnectionCredentials {
        let mut credentials = ConnectionCredentials::new(self.server.clone().unwrap_or_default());
        if let Some(database) = &self.database {
            credentials.database = database.clone();
        }
        if let Some(auth) = self.auth {
            credentials.authentication_type = auth;
        }
        if let Some(user) = &self.user {
            credentials.user = user.clone();
        }
        if let Some(timeout) = self.timeout {
            credentials.connect_timeout = timeout;
        }
        credentials.port = self.port;
        credentials.encrypt = !self.no_encrypt;
        credentials.application_name = self.application_name.clone();
        credentials
    }
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Profile name
    name: String,

    #[command(flatten)]
    target: TargetArgs,

    /// Save the password in the keychain (asked on first connect when omitted)
    #[arg(long, conflicts_with = "no_save_password")]
    save_password: bool,

    /// Never save the password
    #[arg(long)]
    no_save_password: bool,

    /// Ask for the password now instead of on first connect
    #[arg(long)]
    ask_password: bool,
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Saved profile name; omit for an ad-hoc connection
    #[arg(conflicts_with_all = [
        "server", "database", "auth", "user", "port", "no_encrypt", "timeout", "application_name",
    ])]
    name: Option<String>,

    #[command(flatten)]
    target: TargetArgs,

    /// Accept an empty password
    #[arg(long)]
    allow_empty_password: bool,

    /// Print the resolved driver options as JSON
    #[arg(long)]
    json: bool,

    /// Include the password in the printed options
    #[arg(long, requires = "json")]
    show_password: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("conncred={}", default_level).parse()?)
                .add_directive(format!("conncred_core={}", default_level).parse()?)
                .add_directive(format!("conncred_store={}", default_level).parse()?)
                .add_directive(format!("conncred_secrets={}", default_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<ResolveError>() {
            Some(resolve_error) => {
                diagnostics::display_resolve_error(resolve_error);
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(cli.settings.as_deref()).context("Failed to load settings")?;
    if let Err(errors) = settings.validate() {
        anyhow::bail!("Invalid settings: {}", errors.join("; "));
    }

    let store = open_store(&settings, &cli).await?;

    match cli.command {
        Commands::Add(args) => run_add(&store, args).await,
        Commands::List => run_list(&store),
        Commands::Connect(args) => run_connect(&store, args).await,
        Commands::Recent => run_recent(&store),
        Commands::Rename { name, new_name } => run_rename(&store, &name, &new_name).await,
        Commands::Remove { name, yes } => run_remove(&store, &name, yes).await,
        Commands::ForgetPassword { name } => run_forget_password(&store, &name).await,
        Commands::ClearRecent => {
            store.clear_recently_used().await?;
            println!("Recently used list cleared.");
            Ok(())
        }
    }
}

async fn open_store(settings: &Settings, cli: &Cli) -> Result<ConnectionStore> {
    let secrets: Arc<dyn SecretStore> = if settings.use_keychain && !cli.no_keychain {
        Arc::new(KeychainStore::new(settings.keychain_service.clone()))
    } else {
        tracing::warn!("keychain disabled, saved passwords last for this run only");
        Arc::new(MemoryStore::new())
    };

    let path = cli
        .profiles
        .clone()
        .unwrap_or_else(|| settings.profiles_file());

    ConnectionStore::open(path.clone(), secrets, settings.max_recent_connections)
        .await
        .with_context(|| format!("Failed to open profile list {}", path.display()))
}

fn find_profile(store: &ConnectionStore, name: &str) -> Result<ConnectionProfile> {
    store
        .find_by_name(name)
        .with_context(|| format!("No profile named '{}'. Run 'conncred list'", name))
}

async fn run_add(store: &ConnectionStore, args: AddArgs) -> Result<()> {
    if store.find_by_name(&args.name).is_some() {
        anyhow::bail!(
            "A profile named '{}' already exists. Use 'conncred rename' or 'conncred remove' first",
            args.name
        );
    }

    let save_password = match (args.save_password, args.no_save_password) {
        (true, _) => SavePassword::Persist,
        (_, true) => SavePassword::DoNotPersist,
        _ => SavePassword::Unspecified,
    };
    let mut profile = ConnectionProfile::new(args.target.credentials())
        .with_name(&args.name)
        .with_save_password(save_password);

    if args.ask_password {
        let request = ResolveRequest::for_profile(&profile);
        let prompter = TerminalPrompter::new().with_header(format!("New profile {}", args.name));
        profile = ensure_required_properties_set(&profile, request, &prompter, store).await?;
    } else if profile.credentials.server.is_empty() {
        anyhow::bail!("Server required. Use --server or --ask-password to be asked for it");
    }

    let saved = store.save_profile(&profile).await?;
    println!("Saved profile {}: {}", args.name, saved.credentials.display_string());
    Ok(())
}

fn run_list(store: &ConnectionStore) -> Result<()> {
    let profiles = store.profiles();
    if profiles.is_empty() {
        println!("No saved profiles. Add one with 'conncred add <name> --server <host>'");
        return Ok(());
    }

    for profile in profiles {
        let saving = match profile.save_password {
            SavePassword::Persist => "password saved",
            SavePassword::DoNotPersist => "password not saved",
            SavePassword::Unspecified => "ask to save password",
        };
        println!(
            "{:<20} {}  ({})",
            profile.display_name(),
            profile.credentials.display_string(),
            saving
        );
    }
    Ok(())
}

async fn run_connect(store: &ConnectionStore, args: ConnectArgs) -> Result<()> {
    let (profile, request) = match &args.name {
        Some(name) => {
            let profile = find_profile(store, name)?;
            let request = ResolveRequest::for_profile(&profile);
            (profile, request)
        }
        None => {
            let profile = ConnectionProfile::new(args.target.credentials());
            let request = ResolveRequest::ad_hoc(&profile);
            (profile, request)
        }
    };
    let request =
        request.password_required(profile.is_password_based() && !args.allow_empty_password);

    let prompter =
        TerminalPrompter::new().with_header(format!("Connect to {}", profile.display_name()));
    let credentials = store.connect(&profile, request, &prompter).await?;
    tracing::info!(profile = %profile.display_name(), "credentials resolved");

    if args.json {
        let details: serde_json::Map<String, serde_json::Value> = credentials
            .connection_details()
            .into_iter()
            .map(|(key, value)| {
                let value = if key == "password" && !args.show_password {
                    "********".to_string()
                } else {
                    value
                };
                (key.to_string(), serde_json::Value::String(value))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        println!("{}", credentials.display_string());
    }
    Ok(())
}

fn run_recent(store: &ConnectionStore) -> Result<()> {
    let recent = store.recently_used();
    if recent.is_empty() {
        println!("No recent connections.");
        return Ok(());
    }

    for entry in recent {
        println!(
            "{}  {:<20} {}",
            entry.last_used.format("%Y-%m-%d %H:%M"),
            entry.profile.display_name(),
            entry.profile.credentials.display_string()
        );
    }
    Ok(())
}

async fn run_rename(store: &ConnectionStore, name: &str, new_name: &str) -> Result<()> {
    let profile = find_profile(store, name)?;
    store
        .rename_profile(&profile, new_name)
        .await
        .with_context(|| format!("Failed to rename '{}'", name))?;
    println!("Renamed {} to {}.", name, new_name);
    Ok(())
}

async fn run_remove(store: &ConnectionStore, name: &str, yes: bool) -> Result<()> {
    let profile = find_profile(store, name)?;

    if !yes && !confirm(&format!("Remove profile {}?", name)).await? {
        println!("Cancelled.");
        return Ok(());
    }

    store.remove_profile(&profile).await?;
    store.remove_recently_used(&profile).await?;
    println!("Removed {}.", name);
    Ok(())
}

async fn confirm(message: &str) -> Result<bool> {
    let question = Question::new(QuestionKind::Confirm, "confirm", message).with_default("n");
    let answers = TerminalPrompter::new()
        .prompt(&[question])
        .await
        .map_err(ResolveError::from)?;
    Ok(answers.bool("confirm").unwrap_or(false))
}

async fn run_forget_password(store: &ConnectionStore, name: &str) -> Result<()> {
    let profile = find_profile(store, name)?.with_save_password(SavePassword::DoNotPersist);

    let removed = match store.saved_password(&profile).await? {
        Some(_) => store.remove_profile(&profile).await?,
        None => false,
    };
    store.save_profile(&profile).await?;

    if removed {
        println!("Saved password for {} deleted.", name);
    } else {
        println!("No saved password for {}; it won't be saved in future.", name);
    }
    Ok(())
}
