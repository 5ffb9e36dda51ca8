//! CLI entry point for amiablog

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amiablog::AmiaBlog;

#[derive(Parser)]
#[command(name = "amiablog")]
#[command(version)]
#[command(about = "A personal blog engine serving Markdown posts live or as a static site", long_about = None)]
struct Cli {
    /// Set the site directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the blog
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Reload posts when the posts directory changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Generate a static site
    #[command(alias = "g")]
    Generate {
        /// Destination directory
        #[arg(long, default_value = "dist")]
        destination: PathBuf,

        /// Remove an existing destination without asking
        #[arg(long)]
        remove_existing: bool,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: String,

        /// Tags, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// File name (without extension), derived from the title by default
        #[arg(short, long)]
        slug: Option<String>,
    },

    /// List posts or tags
    List {
        /// Type of content to list (post, tag)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "amiablog=debug,info"
    } else {
        "amiablog=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read the current directory")?,
    };

    match cli.command {
        Commands::Serve { port, ip, watch } => {
            let blog = AmiaBlog::new(&base_dir)?;
            tracing::info!("Starting server at http://{}:{}", ip, port);
            amiablog::server::start(&blog, &ip, port, watch).await?;
        }

        Commands::Generate {
            destination,
            remove_existing,
        } => {
            let blog = AmiaBlog::new(&base_dir)?;
            let destination = if destination.is_absolute() {
                destination
            } else {
                base_dir.join(destination)
            };
            blog.generate(&destination, remove_existing).await?;
            println!("Generated successfully!");
        }

        Commands::New { title, tags, slug } => {
            let blog = AmiaBlog::new(&base_dir)?;
            tracing::info!("Creating new post with title: {}", title);
            blog.new_post(&title, &tags, slug.as_deref())?;
        }

        Commands::List { r#type } => {
            let blog = AmiaBlog::new(&base_dir)?;
            amiablog::commands::list::run(&blog, &r#type)?;
        }

        Commands::Version => {
            println!("{} version {}", amiablog::SOFTWARE, amiablog::VERSION);
        }
    }

    Ok(())
}
