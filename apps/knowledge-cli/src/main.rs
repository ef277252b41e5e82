//! Knowledge workspace command-line front end.
//!
//! Drives a [`KnowledgeWorkspace`] against either an in-memory store seeded
//! from a JSON file or a live host reached over JSON-RPC.

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use article_store::{ArticleStore, MemoryArticleStore, RpcArticleStore, StoreSeed};
use clap::{Parser, Subcommand};
use entities::{ArticleId, SortOrder, TagId, UserContext};
use knowledge_workspace::{
    text::html_to_text, tree::Crumb, versions::VersionKey, FilePreferenceStore,
    KnowledgeWorkspace, LogNotifier, SectionKind, WorkspaceConfig,
};
use tracing::info;

mod render;

#[derive(Debug, Parser)]
#[command(name = "knowledge", version, about = "Browse and edit knowledge articles")]
struct Cli {
    /// JSON seed for an in-memory store; without it the configured server is used
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the sidebar tree
    Tree {
        /// Include archived articles
        #[arg(long)]
        archived: bool,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Toggle a tag filter (repeatable)
        #[arg(long = "tag")]
        tags: Vec<TagId>,
        /// Sort order, e.g. `name`, `updated_desc`, `likes_desc`
        #[arg(long)]
        sort: Option<SortOrder>,
        /// Expand every node before printing
        #[arg(long)]
        expand_all: bool,
    },
    /// Search article names and, with --content, their text
    Search {
        query: String,
        #[arg(long)]
        content: bool,
    },
    /// Show one article
    Open { id: ArticleId },
    /// Replace the content of an article
    Edit {
        id: ArticleId,
        /// New HTML content
        content: String,
    },
    /// List the version history of an article
    History { id: ArticleId },
    /// List the comment threads of an article
    Comments { id: ArticleId },
    /// Print the public share link of an article
    Share { id: ArticleId },
    /// Export an article as a standalone HTML file
    Export {
        id: ArticleId,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn connect(config: &WorkspaceConfig, seed: Option<&PathBuf>) -> anyhow::Result<Arc<dyn ArticleStore>> {
    let user = UserContext::new(config.user_id, config.user_name.clone());

    if let Some(path) = seed {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed {}", path.display()))?;
        let seed: StoreSeed = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid seed {}", path.display()))?;
        info!(path = %path.display(), articles = seed.articles.len(), "Using seeded memory store");
        return Ok(Arc::new(MemoryArticleStore::from_seed(user, seed).await));
    }

    let Some(url) = &config.server_url else {
        bail!("No store configured: pass --seed or set KNOWLEDGE_SERVER_URL");
    };
    info!(url = %url, "Using remote store");
    let mut store = RpcArticleStore::new(url);
    if let Some(session) = &config.session_id {
        store = store.with_session(session.clone());
    }
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WorkspaceConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log_level);

    let store = connect(&config, cli.seed.as_ref()).await?;
    let preferences = Arc::new(FilePreferenceStore::new(config.preferences_path.clone()));
    let user = UserContext::new(config.user_id, config.user_name.clone());
    let workspace = KnowledgeWorkspace::new(config, user, store, Arc::new(LogNotifier), preferences);

    workspace.load().await.context("Failed to load articles")?;
    run(&workspace, cli.command, cli.json).await?;

    // Pending edits must reach the store before the process exits.
    workspace.flush().await?;
    Ok(())
}

async fn run(workspace: &KnowledgeWorkspace, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Tree {
            archived,
            favorites,
            tags,
            sort,
            expand_all,
        } => {
            workspace.set_show_archived(archived).await?;
            workspace.set_favorites_only(favorites).await?;
            // Tag selection is persisted; make it match the arguments exactly.
            let selected = workspace.filter().tag_ids;
            for tag in selected.iter().filter(|t| !tags.contains(t)) {
                workspace.toggle_tag(*tag).await?;
            }
            for tag in tags.iter().filter(|t| !selected.contains(t)) {
                workspace.toggle_tag(*tag).await?;
            }
            if let Some(sort) = sort {
                workspace.set_sort(sort).await?;
            }
            if expand_all {
                workspace.expand_all();
            }

            let kinds = [SectionKind::Favorites, SectionKind::Workspace, SectionKind::Private];
            if json {
                let sections: Vec<_> = kinds
                    .into_iter()
                    .map(|kind| serde_json::json!({ "section": kind, "rows": workspace.rows(kind) }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&sections)?);
            } else {
                for kind in kinds {
                    let rows = workspace.rows(kind);
                    if !rows.is_empty() {
                        print!("{}", render::section(kind, &rows));
                    }
                }
            }
        }
        Command::Search { query, content } => {
            workspace.set_search_in_content(content).await?;
            let hits = workspace.search(&query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No results for \"{}\"", query);
            } else {
                for hit in hits {
                    println!("{}", render::hit(&hit));
                }
            }
        }
        Command::Open { id } => {
            workspace.open(id).await?;
            let view = workspace.document();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }
            let Some(article) = view.article else {
                bail!("Article {} is not available", id);
            };
            let path: Vec<String> = workspace
                .breadcrumbs(id)
                .into_iter()
                .map(|crumb| match crumb {
                    Crumb::Article { name, .. } => name,
                    Crumb::Ellipsis { .. } => "...".to_string(),
                })
                .collect();
            println!("{}", path.join(" / "));
            println!("{}", render::metadata(&article));
            println!();
            println!("{}", html_to_text(view.content.as_deref().unwrap_or_default()));
        }
        Command::Edit { id, content } => {
            workspace.open(id).await?;
            workspace.edit(content)?;
            workspace.save().await?;
            println!("Saved ({:?})", workspace.save_status());
        }
        Command::History { id } => {
            workspace.open(id).await?;
            let entries = workspace.version_history().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    let marker = if entry.key == VersionKey::Current { "*" } else { " " };
                    println!(
                        "{} {:<16} {}",
                        marker,
                        entry.label(),
                        entry.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        Command::Comments { id } => {
            let threads = workspace.comments(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&threads)?);
            } else {
                for thread in &threads {
                    print!("{}", render::thread(thread, 0));
                }
            }
        }
        Command::Share { id } => {
            println!("{}", workspace.share_link(id).await?);
        }
        Command::Export { id, out } => {
            let exported = workspace.export_html(id).await?;
            let path = out.join(&exported.file_name);
            std::fs::write(&path, exported.html)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
    }
    Ok(())
}
