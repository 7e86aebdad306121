// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use paradise_core::covers::OpenLibraryClient;
use paradise_core::{
    Api, AppConfig, DbMode, ItemKey, ItemType, LibraryUpdate, LocalBackend, NewBook, NewUser, ReadingStatus,
    SqliteStore, StatusSet,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paradise-cli")]
#[command(about = "Readers Paradise CLI - manage the local book store", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shared book catalog
    Books {
        #[command(subcommand)]
        action: BookAction,
    },
    /// A user's personal library
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },
    /// Notes on a book or author
    Notes {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Dashboard counts and reading challenge
    Stats {
        #[arg(short, long)]
        user: i64,
    },
    /// Accounts
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Check a username and password
    Login { username: String, password: String },
    /// Local store maintenance
    Repair {
        #[command(subcommand)]
        action: RepairAction,
    },
    /// Search Open Library
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum BookAction {
    List,
    Add {
        title: String,
        author: String,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        pages: Option<u32>,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        year: Option<i32>,
    },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum LibraryAction {
    List {
        #[arg(short, long)]
        user: i64,
    },
    /// Add a book or add a status to an existing entry
    Add {
        #[arg(short, long)]
        user: i64,
        book: i64,
        /// owned, want, reading or read
        #[arg(short, long, default_value = "owned")]
        status: String,
    },
    /// Edit statuses, rating, review or reading progress
    Update {
        #[arg(short, long)]
        user: i64,
        book: i64,
        /// Comma separated, replaces the current set
        #[arg(long, value_delimiter = ',')]
        statuses: Option<Vec<String>>,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        review: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Remove {
        #[arg(short, long)]
        user: i64,
        book: i64,
    },
}

#[derive(Subcommand)]
enum NoteAction {
    /// Your notes plus everyone's public ones
    List {
        #[arg(short, long)]
        user: i64,
        /// book or author
        item_type: String,
        item: String,
    },
    Add {
        #[arg(short, long)]
        user: i64,
        item_type: String,
        item: String,
        content: String,
        #[arg(long)]
        public: bool,
    },
    /// Replace the text and visibility of one of your notes
    Edit {
        #[arg(short, long)]
        user: i64,
        id: i64,
        content: String,
        #[arg(long)]
        public: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    List,
    Create {
        username: String,
        display_name: String,
        password: String,
        #[arg(long)]
        admin: bool,
    },
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum RepairAction {
    /// Collection sizes and store file health
    Status,
    /// Copy statuses from a user's legacy data blob into their library
    Migrate {
        #[arg(short, long)]
        user: i64,
    },
    /// Rebuild the catalog from every library
    Rebuild,
    /// Remove duplicate library entries for a user
    Dedupe {
        #[arg(short, long)]
        user: i64,
    },
    /// Rebuild the public note index
    Index,
    /// Migrate, rebuild, dedupe and reindex for a user, then compact
    Full {
        #[arg(short, long)]
        user: i64,
    },
    /// Vacuum free pages if worthwhile and checkpoint the WAL
    Compact,
    /// Copy the store file
    Backup { path: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_status(status: &str) -> anyhow::Result<ReadingStatus> {
    status.parse().map_err(|_| anyhow!("unknown status '{}'", status))
}

fn parse_item(item_type: &str, item: &str) -> anyhow::Result<(ItemType, ItemKey)> {
    match item_type.to_ascii_lowercase().as_str() {
        "book" => {
            let id: i64 = item.parse().with_context(|| format!("book id '{}' is not a number", item))?;
            Ok((ItemType::Book, ItemKey::Id(id)))
        }
        "author" => Ok((ItemType::Author, ItemKey::Name(item.to_string()))),
        other => bail!("unknown item type '{}', expected book or author", other),
    }
}

async fn open_local(config: &AppConfig) -> anyhow::Result<LocalBackend<SqliteStore>> {
    if config.effective_mode() != DbMode::Local {
        bail!("repair only works on the local store");
    }
    let store = SqliteStore::open(&config.data_path)
        .await
        .with_context(|| format!("opening {}", config.data_path.display()))?;
    Ok(LocalBackend::new(store))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_ref()).context("loading configuration")?;

    if let Commands::Repair { action } = &cli.command {
        let backend = open_local(&config).await?;
        return match action {
            RepairAction::Status => {
                print_json(&backend.status().await?)?;
                print_json(&backend.store_health().await?)
            }
            RepairAction::Migrate { user } => {
                println!("Migrated {} library entries", backend.migrate_legacy_user_data(*user).await?);
                Ok(())
            }
            RepairAction::Rebuild => {
                println!("Catalog rebuilt with {} books", backend.rebuild_catalog().await?);
                Ok(())
            }
            RepairAction::Dedupe { user } => {
                println!("Removed {} duplicates", backend.remove_duplicates(*user).await?);
                Ok(())
            }
            RepairAction::Index => {
                println!("Indexed {} public notes", backend.rebuild_public_note_index().await?);
                Ok(())
            }
            RepairAction::Full { user } => {
                print_json(&backend.full_repair(*user).await?)?;
                backend.compact().await?;
                Ok(())
            }
            RepairAction::Compact => {
                if backend.compact().await? {
                    println!("Vacuumed and checkpointed");
                } else {
                    println!("Checkpointed; not enough free space to vacuum");
                }
                Ok(())
            }
            RepairAction::Backup { path } => {
                backend.backup(path).await?;
                println!("Backed up to {}", path.display());
                Ok(())
            }
        };
    }

    if let Commands::Search { query, limit } = &cli.command {
        let results = OpenLibraryClient::new()?.search(query, Some(*limit)).await?;
        let books: Vec<NewBook> = results.into_iter().map(NewBook::from).collect();
        return print_json(&books);
    }

    let api = Api::open(&config).await?;
    api.ensure_default_admin().await?;

    match cli.command {
        Commands::Books { action } => match action {
            BookAction::List => print_json(&api.list_books().await?)?,
            BookAction::Add {
                title,
                author,
                genre,
                pages,
                isbn,
                year,
            } => {
                let book = NewBook {
                    genre,
                    pages,
                    isbn,
                    publish_year: year,
                    ..NewBook::new(title, author)
                };
                match api.add_book(book).await? {
                    Some(book) => print_json(&book)?,
                    None => bail!("book was not added"),
                }
            }
            BookAction::Delete { id } => {
                if !api.delete_book(id).await? {
                    bail!("no book with id {}", id);
                }
                println!("Deleted book {}", id);
            }
        },
        Commands::Library { action } => match action {
            LibraryAction::List { user } => print_json(&api.list_user_books(user).await?)?,
            LibraryAction::Add { user, book, status } => {
                let status = parse_status(&status)?;
                match api.add_to_user_library(user, book, status).await? {
                    Some(entry) => print_json(&entry)?,
                    None => bail!("no book with id {}", book),
                }
            }
            LibraryAction::Update {
                user,
                book,
                statuses,
                rating,
                review,
                page,
            } => {
                let statuses = statuses
                    .map(|list| list.iter().map(|s| parse_status(s)).collect::<anyhow::Result<StatusSet>>())
                    .transpose()?;
                let update = LibraryUpdate {
                    statuses,
                    rating,
                    review,
                    current_page: page,
                };
                match api.update_library_entry(user, book, update).await? {
                    Some(entry) => print_json(&entry)?,
                    None => bail!("book {} was not updated", book),
                }
            }
            LibraryAction::Remove { user, book } => {
                if !api.remove_from_user_library(user, book).await? {
                    bail!("book {} is not in the library", book);
                }
                println!("Removed book {}", book);
            }
        },
        Commands::Notes { action } => match action {
            NoteAction::List { user, item_type, item } => {
                let (item_type, key) = parse_item(&item_type, &item)?;
                let mut notes = api.get_notes(item_type, &key, user).await?;
                notes.extend(
                    api.get_public_notes(item_type, &key)
                        .await?
                        .into_iter()
                        .filter(|n| n.user_id != user),
                );
                print_json(&notes)?;
            }
            NoteAction::Add {
                user,
                item_type,
                item,
                content,
                public,
            } => {
                let (item_type, key) = parse_item(&item_type, &item)?;
                match api.save_note(user, item_type, key, content, public).await? {
                    Some(note) => print_json(&note)?,
                    None => bail!("note was not saved"),
                }
            }
            NoteAction::Edit {
                user,
                id,
                content,
                public,
            } => match api.update_note(user, id, content, public).await? {
                Some(note) => print_json(&note)?,
                None => bail!("no note {} for user {}", id, user),
            },
        },
        Commands::Stats { user } => {
            print_json(&api.get_user_stats(user).await?)?;
            print_json(&api.reading_challenge(user).await?)?;
        }
        Commands::Users { action } => match action {
            UserAction::List => {
                for user in api.list_users().await? {
                    println!(
                        "{:>16} {:<20} {}{}",
                        user.id,
                        user.username,
                        user.display_name,
                        if user.is_admin { " (admin)" } else { "" }
                    );
                }
            }
            UserAction::Create {
                username,
                display_name,
                password,
                admin,
            } => {
                let user = api
                    .create_user(NewUser {
                        username,
                        display_name,
                        password,
                        is_admin: admin,
                        must_change_password: true,
                    })
                    .await?;
                println!("Created {} ({})", user.username, user.id);
            }
            UserAction::Delete { id } => {
                if !api.delete_user(id).await? {
                    bail!("no user with id {}", id);
                }
                println!("Deleted user {}", id);
            }
        },
        Commands::Login { username, password } => {
            let session = api.login(&username, &password).await?;
            print_json(&session)?;
            if session.must_change_password {
                println!("Password must be changed before continuing");
            }
        }
        Commands::Repair { .. } | Commands::Search { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
