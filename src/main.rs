use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};

use roost::config::Config;
use roost::skin::SkinFactory;
use roost::storage::ReadStatus;
use roost::tree::{EventBus, FeedsModel, FeedsProxy, ItemId, ItemKind};
use roost::CoreContext;

/// Get the config directory path (~/.config/roost/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("roost"))
}

/// System skins first, user skins second.
fn skin_factory(config_dir: &std::path::Path) -> SkinFactory {
    SkinFactory::new(
        PathBuf::from("/usr/share/roost/skins"),
        config_dir.join("skins"),
    )
}

#[derive(Parser, Debug)]
#[command(name = "roost", about = "Feed tree manager over a shared SQLite store")]
struct Cli {
    /// Config file path (default: ~/.config/roost/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Selects a subtree: whole tree when no account is given, one account,
/// or one category/feed within it.
#[derive(ClapArgs, Debug)]
struct Target {
    /// Account ID; omit to address every account
    #[arg(long)]
    account: Option<i64>,

    /// Category ID within the account
    #[arg(long, conflicts_with = "feed")]
    category: Option<i64>,

    /// Feed ID within the account
    #[arg(long)]
    feed: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the feed tree with unread counts
    Tree {
        /// Hide feeds and categories with no unread messages
        #[arg(long)]
        hide_read: bool,
    },

    /// Create an account
    AddAccount { name: String },

    /// Create a category under an account
    AddCategory {
        #[arg(long)]
        account: i64,
        title: String,
        /// Parent category ID; omit for a top-level category
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Subscribe a feed under an account
    AddFeed {
        #[arg(long)]
        account: i64,
        title: String,
        url: String,
        #[arg(long)]
        category: Option<i64>,
    },

    /// Mark a subtree's messages read
    MarkRead {
        #[command(flatten)]
        target: Target,
    },

    /// Mark a subtree's messages unread
    MarkUnread {
        #[command(flatten)]
        target: Target,
    },

    /// Permanently delete all messages of a subtree's feeds
    Clear {
        #[command(flatten)]
        target: Target,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Delete an account and everything under it
    DeleteAccount {
        #[arg(long)]
        account: i64,
        #[arg(long)]
        yes: bool,
    },

    /// List installed skins and show which one loads
    Skins,

    /// Select the skin to load on the next start
    SetSkin { name: String },

    /// Move a feed into a category (or to the account root)
    MoveFeed {
        #[arg(long)]
        account: i64,
        #[arg(long)]
        feed: i64,
        /// Destination category ID; omit for the account root
        #[arg(long)]
        category: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = cli
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)?;
    let db_path = config_dir.join("roost.db");
    let db_path = db_path.to_string_lossy();

    let mut ctx = CoreContext::init(&config, &db_path).await?;

    match cli.command {
        Command::Tree { hide_read } => {
            let model = FeedsModel::load(&ctx.db, EventBus::new()).await?;
            let mut proxy = FeedsProxy::new(model.events(), hide_read || config.hide_read_feeds);
            let states = roost::tree::restore_view_state(&model, &mut proxy, &ctx.settings);
            print_tree(&model, &proxy, &states);
        }

        Command::AddAccount { name } => {
            let id = ctx.db.create_account(&name).await?;
            println!("Created account {id}");
        }

        Command::AddCategory {
            account,
            title,
            parent,
        } => {
            let id = ctx.db.create_category(account, parent, &title).await?;
            println!("Created category {id}");
        }

        Command::AddFeed {
            account,
            title,
            url,
            category,
        } => {
            let id = ctx.db.insert_feed(account, category, &title, &url).await?;
            println!("Created feed {id}");
        }

        Command::MarkRead { target } => {
            let mut model = FeedsModel::load(&ctx.db, EventBus::new()).await?;
            let id = resolve_target(&model, &target)?;
            model.mark_item_read(&ctx.db, id, ReadStatus::Read).await?;
            println!("Marked read.");
        }

        Command::MarkUnread { target } => {
            let mut model = FeedsModel::load(&ctx.db, EventBus::new()).await?;
            let id = resolve_target(&model, &target)?;
            model
                .mark_item_read(&ctx.db, id, ReadStatus::Unread)
                .await?;
            println!("Marked unread.");
        }

        Command::Clear { target, yes } => {
            // Refuse to clear while a feed update holds the lock
            let _guard = ctx.update_lock.try_acquire()?;
            if !confirmed(&config, yes, "Permanently delete all messages in this subtree?")? {
                return Ok(());
            }
            let mut model = FeedsModel::load(&ctx.db, EventBus::new()).await?;
            let id = resolve_target(&model, &target)?;
            let purged = model.mark_item_cleared(&ctx.db, id).await?;
            println!("Purged {purged} messages.");
        }

        Command::DeleteAccount { account, yes } => {
            let _guard = ctx.update_lock.try_acquire()?;
            if !confirmed(&config, yes, "Delete the account and all its data?")? {
                return Ok(());
            }
            let mut model = FeedsModel::load(&ctx.db, EventBus::new()).await?;
            let id = model
                .find(account, ItemKind::ServiceRoot, account)
                .with_context(|| format!("No account with ID {account}"))?;
            model.delete_account(&ctx.db, id).await?;
            println!("Deleted account {account}.");
        }

        Command::Skins => {
            let factory = skin_factory(&config_dir);
            for skin in factory.installed_skins() {
                println!(
                    "{}: {} {} by {}",
                    skin.folder_name, skin.visible_name, skin.version, skin.author
                );
            }
            match factory.load_current(&ctx.settings, &config.default_skin) {
                Ok(skin) => println!("Active: {}", skin.folder_name),
                Err(e) => println!("No loadable skin: {e}"),
            }
        }

        Command::SetSkin { name } => {
            SkinFactory::set_current(&mut ctx.settings, &ctx.db, &name).await?;
            println!("Selected skin {name}.");
        }

        Command::MoveFeed {
            account,
            feed,
            category,
        } => {
            let _guard = ctx.update_lock.try_acquire()?;
            let mut model = FeedsModel::load(&ctx.db, EventBus::new()).await?;
            let feed_id = model
                .find(account, ItemKind::Feed, feed)
                .with_context(|| format!("No feed with ID {feed} in account {account}"))?;
            let parent = match category {
                Some(cat) => model
                    .find(account, ItemKind::Category, cat)
                    .with_context(|| format!("No category with ID {cat} in account {account}"))?,
                None => model
                    .find(account, ItemKind::ServiceRoot, account)
                    .with_context(|| format!("No account with ID {account}"))?,
            };
            model.reassign(&ctx.db, feed_id, parent).await?;
            println!("Moved feed {feed}.");
        }
    }

    Ok(())
}

/// Map target flags to a model handle. No account means the whole tree.
fn resolve_target(model: &FeedsModel, target: &Target) -> Result<ItemId> {
    let Some(account) = target.account else {
        return Ok(model.root());
    };
    if let Some(feed) = target.feed {
        return model
            .find(account, ItemKind::Feed, feed)
            .with_context(|| format!("No feed with ID {feed} in account {account}"));
    }
    if let Some(category) = target.category {
        return model
            .find(account, ItemKind::Category, category)
            .with_context(|| format!("No category with ID {category} in account {account}"));
    }
    model
        .find(account, ItemKind::ServiceRoot, account)
        .with_context(|| format!("No account with ID {account}"))
}

fn confirmed(config: &Config, yes: bool, prompt: &str) -> Result<bool> {
    if yes || !config.confirm_destructive {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");
    if !confirmed {
        println!("Aborted.");
    }
    Ok(confirmed)
}

fn print_tree(model: &FeedsModel, proxy: &FeedsProxy, states: &roost::tree::ExpandStates) {
    for &id in proxy.rows() {
        let Some(item) = model.item(id) else { continue };
        let indent = "  ".repeat(depth(model, id));
        let marker = if item.children().is_empty() {
            "  "
        } else if states.is_expanded(id) {
            "- "
        } else {
            "+ "
        };
        match item.kind {
            ItemKind::Feed => println!(
                "{indent}{marker}{} ({}/{}) [feed {}]",
                item.title, item.unread, item.total, item.storage_id
            ),
            ItemKind::Category => println!(
                "{indent}{marker}{} ({}/{}) [category {}]",
                item.title, item.unread, item.total, item.storage_id
            ),
            ItemKind::ServiceRoot => println!(
                "{indent}{marker}{} ({}/{}) [account {}]",
                item.title, item.unread, item.total, item.account_id
            ),
            ItemKind::Bin => println!("{indent}{marker}{}", item.title),
            ItemKind::Root => {}
        }
    }
}

fn depth(model: &FeedsModel, id: ItemId) -> usize {
    let mut depth = 0;
    let mut current = model.item(id).and_then(|i| i.parent());
    while let Some(node) = current {
        if node == model.root() {
            break;
        }
        depth += 1;
        current = model.item(node).and_then(|i| i.parent());
    }
    depth
}
