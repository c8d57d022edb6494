use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use steep::{
    config::AppConfig,
    db,
    models::user::parse_digest_day,
    services::{create_email_service, create_llm_client, digest_service::preview, render_markdown},
    AppState,
};

#[derive(Parser)]
#[command(name = "steep-cli")]
#[command(about = "CLI tool for operating a Steep deployment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Weekly digest commands
    Digest {
        #[command(subcommand)]
        command: DigestCommands,
    },

    /// Magic link maintenance
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Render a digest markdown file to HTML on stdout
    Render {
        /// Markdown file to render
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Show one user
    Show {
        /// Email address of the user
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum DigestCommands {
    /// Generate a digest for one user now
    Generate {
        #[arg(short, long)]
        user_id: i64,

        /// Email the digest after generating it
        #[arg(long)]
        send: bool,
    },

    /// Run the scheduled send for today's (or the given) digest day
    SendDue {
        /// Override the weekday, e.g. `monday`
        #[arg(short, long)]
        day: Option<String>,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Delete expired magic links
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steep=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    if let Commands::Render { file } = &cli.command {
        let markdown = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        println!("{}", render_markdown(&markdown));
        return Ok(());
    }

    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool().await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let llm = create_llm_client(&config);
    let state = AppState::build(pool, Arc::new(config), llm, create_email_service());

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::List { limit, offset } => {
                let users = state.user_service.list_users(Some(limit), Some(offset)).await?;
                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<5} {:<35} {:<32} {:<10} {:<10}",
                        "ID", "Email", "Inbound", "Plan", "Day"
                    );
                    println!("{}", "-".repeat(96));
                    for user in users {
                        println!(
                            "{:<5} {:<35} {:<32} {:<10} {:<10}",
                            user.id, user.email, user.inbound_email, user.plan, user.digest_day
                        );
                    }
                }
            }

            UserCommands::Show { email } => match state.user_service.find_user_by_email(&email).await? {
                Some(user) => {
                    println!("  ID: {}", user.id);
                    println!("  Name: {}", user.name);
                    println!("  Email: {}", user.email);
                    println!("  Inbound: {}", user.inbound_email);
                    println!("  Plan: {}", user.plan);
                    println!(
                        "  Plan expires: {}",
                        user.plan_expires_at.as_deref().unwrap_or("N/A")
                    );
                    println!("  Digest day: {}", user.digest_day);
                    println!("  Created: {}", user.created_at);
                }
                None => {
                    eprintln!("❌ User '{}' not found", email);
                    std::process::exit(1);
                }
            },
        },

        Commands::Digest { command } => match command {
            DigestCommands::Generate { user_id, send } => {
                let user = state
                    .user_service
                    .find_user_by_id(user_id)
                    .await?
                    .with_context(|| format!("user {} not found", user_id))?;
                let digest = state
                    .digest_service
                    .generate_at(&user, chrono::Utc::now())
                    .await?;

                println!("✅ Digest {} generated ({} posts)", digest.id, digest.post_count);
                println!("{}", preview(&digest.digest_content));

                if send {
                    let result = state.digest_dispatcher.send_digest(&user, &digest).await;
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
            }

            DigestCommands::SendDue { day } => {
                let summary = match day {
                    Some(day) => {
                        let day = parse_digest_day(&day)
                            .with_context(|| format!("'{}' is not a day of the week", day))?;
                        state.digest_dispatcher.dispatch_for_day(day).await?
                    }
                    None => state.digest_dispatcher.dispatch_due().await?,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        },

        Commands::Tokens { command } => match command {
            TokenCommands::Cleanup => {
                let removed = state.magic_link_service.cleanup_expired().await?;
                println!("✅ Removed {} expired magic links", removed);
            }
        },

        Commands::Render { .. } => {}
    }

    Ok(())
}
