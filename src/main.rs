use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dx_discussions::config::Config;
use dx_discussions::events::EventBus;
use dx_discussions::model::{EntityReference, StoreConfiguration};
use dx_discussions::reference::{DefaultReferenceResolver, ReferenceResolver};
use dx_discussions::store::{CreateMessage, Stores};
use dx_discussions::{server, storage};

#[derive(Parser)]
#[command(name = "discussions")]
#[command(about = "Threaded discussions tagged by the entities they talk about", version)]
#[command(after_help = "Discussions Features:
- Discussions holding ordered, threaded messages
- Discussion contexts tagging discussions with users, pages or groups
- Livetable listing of discussions by tagged entity
- REST API for creating discussions and posting messages
- Follower-based audiences for message streams")]
struct Cli {
    /// Directory holding the database and discussions.toml
    #[arg(long, global = true, env = "DISCUSSIONS_DATA_DIR", default_value = ".discussions")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database and default configuration
    Init,

    /// Start the REST server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create a discussion
    CreateDiscussion {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(long, default_value = "discussions")]
        hint: String,

        /// Tag with `type:entity` contexts, e.g. `user:alice`
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Post a message to a discussion
    Post {
        discussion: String,
        content: String,

        #[arg(short, long)]
        author: Option<String>,

        #[arg(long)]
        reply_to: Option<String>,
    },

    /// Show a discussion and its messages
    Show {
        discussion: String,

        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Make FOLLOWER follow USER
    Follow { follower: String, user: String },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.data_dir)?;
    let _guard = init_tracing(&config);

    match cli.command {
        Commands::Init => {
            println!("{}", "🚀 Initializing discussion store...".cyan().bold());
            storage::init(&cli.data_dir).await?;
            println!("{}", "✓ Store initialized successfully!".green());
            println!("\n{}", "Next steps:".yellow());
            println!(
                "  1. {} - Start a discussion",
                "discussions create-discussion \"<title>\"".bright_white()
            );
            println!("  2. {} - Serve the REST API", "discussions serve".bright_white());
        }

        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            println!(
                "{}",
                format!("🌐 Starting server on port {}...", port)
                    .cyan()
                    .bold()
            );
            server::start(port, cli.data_dir).await?;
        }

        Commands::CreateDiscussion {
            title,
            description,
            hint,
            tag,
        } => {
            let stores = open_stores(&cli.data_dir, config)?;
            let Some(reference) =
                stores
                    .discussions
                    .create(&hint, &title, &description, &StoreConfiguration::new())?
            else {
                bail!("Fail to create a discussion with title=[{}]", title);
            };

            for tag in tag {
                let Some((reference_type, entity)) = tag.split_once(':') else {
                    bail!("Invalid tag [{}], expected type:entity", tag);
                };
                let entity = EntityReference::new(reference_type, entity);
                let Some(context) = stores.contexts.get_or_create(&hint, &tag, "", &entity)? else {
                    bail!("Invalid tag [{}]", tag);
                };
                stores.discussions.link(&reference, &context.reference)?;
                println!("  {} {}", "tagged".bright_black(), tag.bright_white());
            }

            println!(
                "{} Created discussion: {}",
                "✓".green(),
                reference.to_string().bright_yellow()
            );
        }

        Commands::Post {
            discussion,
            content,
            author,
            reply_to,
        } => {
            let stores = open_stores(&cli.data_dir, config)?;
            let resolver = DefaultReferenceResolver;
            let discussion = resolver.resolve_discussion(&discussion)?;
            let reply_to = reply_to
                .map(|value| resolver.resolve_message(&value))
                .transpose()?;
            let author = author.unwrap_or_else(whoami::username);

            let request = CreateMessage {
                reply_to,
                ..CreateMessage::new(content, author, discussion.clone())
            };
            let Some(reference) = stores.messages.create(request)? else {
                bail!("Discussion with reference=[{}] not found.", discussion);
            };
            println!(
                "{} Posted message: {}",
                "✓".green(),
                reference.to_string().bright_yellow()
            );
        }

        Commands::Show { discussion, limit } => {
            let stores = open_stores(&cli.data_dir, config)?;
            let reference = DefaultReferenceResolver.resolve_discussion(&discussion)?;
            let Some(discussion) = stores.discussions.get(&reference)? else {
                bail!("Discussion with reference=[{}] not found.", reference);
            };

            println!("{}", discussion.title.bold());
            if !discussion.description.is_empty() {
                println!("{}", discussion.description);
            }
            println!(
                "{}",
                format!(
                    "{} · updated {}",
                    discussion.reference,
                    discussion.update_date.format("%Y-%m-%d %H:%M:%S")
                )
                .bright_black()
            );

            let contexts = stores.contexts.find_by_discussion(&reference)?;
            for context in contexts {
                println!(
                    "  {} {}:{}",
                    "#".bright_blue(),
                    context.entity_reference.reference_type,
                    context.entity_reference.entity_reference
                );
            }

            println!();
            for message in stores.messages.find_by_discussion(&reference, 0, limit)? {
                println!(
                    "{} {} {}",
                    message.author.bright_yellow(),
                    message
                        .creation_date
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                        .bright_black(),
                    message.reference.to_string().bright_black()
                );
                if let Some(reply_to) = &message.reply_to {
                    println!("  {} {}", "↳".bright_black(), reply_to);
                }
                println!("  {}", message.content);
            }
        }

        Commands::Follow { follower, user } => {
            let db = storage::open(&cli.data_dir)?;
            db.add_follow_preference(&follower, &user)?;
            println!(
                "{} {} now follows {}",
                "✓".green(),
                follower.bright_white(),
                user.bright_white()
            );
        }
    }

    Ok(())
}

fn open_stores(data_dir: &Path, config: Config) -> Result<Stores> {
    let db = storage::open(data_dir)?;
    Ok(Stores::new(Arc::new(db), Arc::new(config), EventBus::new()))
}

/// Console logging filtered by `RUST_LOG`, plus a daily file when `log_dir` is set.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dx_discussions=info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "discussions.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
