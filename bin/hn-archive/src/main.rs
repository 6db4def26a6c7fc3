//! # hn-archive
//!
//! Administration entry point: builds the SQLite index and inspects records
//! through whichever backend the settings select.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use configs::Settings;
use hn_core::models::{Forum, ForumEntry, Message, Person};
use hn_core::parser::parse_record;
use hn_core::{CachedStore, ForumStore};
use hn_store_fs::FsForumStore;

// Feature-gated imports
#[cfg(feature = "db-sqlite")]
use hn_db_sqlite::{IndexBuilder, SqliteForumStore};

#[derive(Parser)]
#[command(name = "hn-archive", about = "Inspect and index a HyperNews archive")]
struct Cli {
    /// Archive root (overrides HNFILES and the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// SQLite index; queries use it instead of the files (overrides HNDATABASE)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the SQLite index from the archive files
    Populate {
        /// Replace an existing index
        #[arg(long)]
        overwrite: bool,
    },
    /// Show all forums
    Forums,
    /// List the replies directly below an address (like hnTest/6)
    List { address: String },
    /// Show the reply tree below an address (always read from the files)
    Tree { address: String },
    /// Show one forum or message and its body text
    Show {
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// Show one member
    Member { user_id: String },
    /// List members
    Members {
        /// Only members whose id, name or email contains this text
        #[arg(long)]
        find: Option<String>,
    },
    /// Show the forum categories
    Categories,
    /// Parse record files directly and print them
    Parse {
        #[arg(long, value_enum)]
        kind: Kind,
        files: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Main,
    Msg,
    Person,
}

/// Split `hnTest/6/1` into `("hnTest", "6/1")`.
fn split_address(address: &str) -> (&str, &str) {
    let address = address.trim_matches('/');
    address.split_once('/').unwrap_or((address, ""))
}

fn with_cache<S: ForumStore + 'static>(store: S, capacity: usize) -> Box<dyn ForumStore> {
    if capacity == 0 {
        Box::new(store)
    } else {
        Box::new(CachedStore::new(store, capacity))
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Box<dyn ForumStore>> {
    let layout = settings.archive.layout();
    let capacity = settings.cache.capacity;

    match &settings.database.path {
        #[cfg(feature = "db-sqlite")]
        Some(db) => {
            let store = SqliteForumStore::open(db, layout, settings.database.max_connections)
                .await
                .with_context(|| format!("opening index {}", db.display()))?;
            Ok(with_cache(store, capacity))
        }
        #[cfg(not(feature = "db-sqlite"))]
        Some(_) => bail!("built without the db-sqlite feature"),
        None => Ok(with_cache(FsForumStore::new(layout), capacity)),
    }
}

#[cfg(feature = "db-sqlite")]
async fn populate(settings: &Settings, overwrite: bool) -> anyhow::Result<()> {
    let Some(db) = &settings.database.path else {
        bail!("populate needs --db or HNDATABASE");
    };
    let source = FsForumStore::new(settings.archive.layout());
    let report = IndexBuilder::new(db)
        .overwrite(overwrite)
        .build(&source)
        .await?;
    println!(
        "{} forums, {} messages, {} people ({} skipped)",
        report.forums, report.messages, report.people, report.skipped
    );
    Ok(())
}

#[cfg(not(feature = "db-sqlite"))]
async fn populate(_settings: &Settings, _overwrite: bool) -> anyhow::Result<()> {
    bail!("built without the db-sqlite feature")
}

async fn forums(store: &dyn ForumStore) -> anyhow::Result<()> {
    let categories = store.get_categories().await?;
    for entry in store.get_forums_iter().await? {
        match entry {
            ForumEntry::Parsed(forum) => {
                let category = forum
                    .categories
                    .and_then(|id| categories.get(&id))
                    .map(String::as_str)
                    .unwrap_or("-");
                println!("{}\t{}\t{}", forum.name(), category, forum.base.title);
            }
            ForumEntry::Unparseable { name, reason } => {
                eprintln!("{name}: unparseable ({reason})");
            }
        }
    }
    Ok(())
}

async fn list(store: &dyn ForumStore, address: &str) -> anyhow::Result<()> {
    let (forum, path) = split_address(address);
    for msg in store.get_msgs(forum, path, false).await? {
        let replies = store.get_num_msgs(forum, &msg.msg, false).await?;
        println!("{}\t{}\t{}", msg.num, replies, msg.base.title);
    }
    Ok(())
}

async fn tree(settings: &Settings, address: &str) -> anyhow::Result<()> {
    let (forum, path) = split_address(address);
    let store = FsForumStore::new(settings.archive.layout());
    let title = if path.is_empty() {
        store.get_forum(forum).await?.base.title
    } else {
        store.get_msg(forum, path).await?.base.title
    };
    println!("{forum}/{path}: {title}");

    let lines = store
        .walk_tree(
            forum,
            path,
            |_, msg: &Message, parent: &(usize, String)| {
                let depth = parent.0 + 1;
                (depth, format!("{}{} {}", "  ".repeat(depth), msg.num, msg.base.title))
            },
            (0, String::new()),
        )
        .await?;
    for (_, line) in lines {
        println!("{line}");
    }
    Ok(())
}

async fn show(store: &dyn ForumStore, address: &str, json: bool) -> anyhow::Result<()> {
    let (forum, path) = split_address(address);
    if path.is_empty() {
        print_record(&store.get_forum(forum).await?, json)?;
    } else {
        print_record(&store.get_msg(forum, path).await?, json)?;
    }
    if let Some(html) = store.get_html(forum, path).await? {
        println!("{html}");
    }
    Ok(())
}

fn print_record<T: serde::Serialize + std::fmt::Debug>(record: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("{record:#?}");
    }
    Ok(())
}

async fn members(store: &dyn ForumStore, find: Option<&str>) -> anyhow::Result<()> {
    let mut shown = 0;
    for person in store.get_member_iter().await? {
        let matches = find.is_none_or(|text| {
            person.user_id.contains(text) || person.name.contains(text) || person.email.contains(text)
        });
        if matches {
            println!("{}\t{}\t{}", person.user_id, person.name, person.email);
            shown += 1;
        }
    }
    println!("{shown} of {} members", store.get_num_members().await?);
    Ok(())
}

async fn parse_files(kind: Kind, files: &[PathBuf]) -> anyhow::Result<()> {
    for file in files {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let source = file.display().to_string();
        let rendered = match kind {
            Kind::Main => serde_json::to_string_pretty(&parse_record::<Forum>(&bytes, &source)?)?,
            Kind::Msg => serde_json::to_string_pretty(&parse_record::<Message>(&bytes, &source)?)?,
            Kind::Person => serde_json::to_string_pretty(&parse_record::<Person>(&bytes, &source)?)?,
        };
        println!("{rendered}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(root) = cli.root {
        settings.archive.root = root;
    }
    if let Some(db) = cli.db {
        settings.database.path = Some(db);
    }
    log::debug!("Using {settings:?}");

    match cli.command {
        Command::Populate { overwrite } => populate(&settings, overwrite).await,
        Command::Tree { address } => tree(&settings, &address).await,
        Command::Parse { kind, files } => parse_files(kind, &files).await,
        Command::Forums => forums(open_store(&settings).await?.as_ref()).await,
        Command::List { address } => list(open_store(&settings).await?.as_ref(), &address).await,
        Command::Show { address, json } => {
            show(open_store(&settings).await?.as_ref(), &address, json).await
        }
        Command::Member { user_id } => {
            let store = open_store(&settings).await?;
            print_record(&store.get_member(&user_id).await?, true)
        }
        Command::Members { find } => {
            members(open_store(&settings).await?.as_ref(), find.as_deref()).await
        }
        Command::Categories => {
            let store = open_store(&settings).await?;
            for (id, name) in store.get_categories().await? {
                println!("{id}\t{name}");
            }
            Ok(())
        }
    }
}
