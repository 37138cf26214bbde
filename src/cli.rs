// Command-line front end: thin I/O around the store
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use crate::api_types::{generate_backup_schema, generate_typescript_bindings, Link};
use crate::backup::{backup_file_name, to_pretty_json};
use crate::errors::{AppError, AppResult};
use crate::query::{build_query, filter_links};
use crate::repositories::SlotRepository;
use crate::store::LinkStore;
use crate::AppState;

#[derive(Parser, Debug)]
#[command(
    name = "ao3-filter",
    version,
    about = "Turn AO3 tag feed URLs into a combined filter_ids search query"
)]
pub struct Cli {
    /// Slot database path (defaults to $AO3_FILTER_DB or the user data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a tag feed URL
    Add {
        url: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Set a link's label; an empty label unsets it
    Label { link_id: String, text: String },
    /// Remove a link
    Remove { link_id: String },
    /// Remove every link
    Clear,
    /// Show links, optionally narrowed to a list and a search text
    Show {
        /// List id or name
        #[arg(long)]
        list: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Print the combined filter query for the selected links
    Query {
        /// List id or name
        #[arg(long)]
        list: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Manage lists
    #[command(subcommand)]
    List(ListCommand),
    /// Write a backup file
    Export {
        /// Target directory (defaults to the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace all links and lists with a backup file
    Import { file: PathBuf },
    /// Print the JSON Schema of the backup format
    Schema,
    /// Write TypeScript bindings for the front end
    Bindings,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Create a list
    Create { name: String },
    /// Delete a list; its links stay
    Delete { list_id: String },
    /// Add links to a list
    Add {
        list_id: String,
        #[arg(required = true)]
        link_ids: Vec<String>,
    },
    /// Take one link out of a list
    Remove { list_id: String, link_id: String },
    /// Show all lists
    Show,
}

pub fn execute<W: Write>(command: Command, state: &mut AppState, out: &mut W) -> AppResult<()> {
    let store = &mut state.store;

    match command {
        Command::Add { url, label } => {
            let link = store.add_link(&url, label.as_deref())?;
            writeln!(out, "Added tag {} ({})", link.numeric_id, link.id)?;
        }
        Command::Label { link_id, text } => {
            if !store.update_label(&link_id, &text) {
                return Err(unknown_link(&link_id));
            }
            writeln!(out, "Updated label for {link_id}")?;
        }
        Command::Remove { link_id } => {
            if !store.remove_link(&link_id) {
                return Err(unknown_link(&link_id));
            }
            writeln!(out, "Removed {link_id}")?;
        }
        Command::Clear => {
            let count = store.links().len();
            store.clear_all_links();
            writeln!(out, "Removed {count} link(s)")?;
        }
        Command::Show { list, search } => {
            let list_id = resolve_list(store, list.as_deref())?;
            let links = filter_links(store.links(), list_id.as_deref(), search.as_deref());
            if links.is_empty() {
                writeln!(out, "No links.")?;
            }
            for link in links {
                write_link(out, store, link)?;
            }
        }
        Command::Query { list, search } => {
            let list_id = resolve_list(store, list.as_deref())?;
            let links = filter_links(store.links(), list_id.as_deref(), search.as_deref());
            writeln!(out, "{}", build_query(links))?;
        }
        Command::List(list_command) => execute_list(list_command, store, out)?,
        Command::Export { out: dir } => {
            let data = store.export_backup();
            let file_name = backup_file_name(data.timestamp);
            let path = dir.unwrap_or_else(|| PathBuf::from(".")).join(file_name);

            std::fs::write(&path, to_pretty_json(&data)?)?;
            writeln!(out, "Exported backup to {}", path.display())?;
        }
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)?;
            store.import_backup_str(&text)?;
            writeln!(out, "Backup restored successfully!")?;
        }
        Command::Schema => {
            writeln!(out, "{}", generate_backup_schema()?)?;
        }
        Command::Bindings => {
            generate_typescript_bindings()?;
            writeln!(out, "TypeScript bindings written")?;
        }
    }

    Ok(())
}

fn execute_list<R: SlotRepository, W: Write>(
    command: ListCommand,
    store: &mut LinkStore<R>,
    out: &mut W,
) -> AppResult<()> {
    match command {
        ListCommand::Create { name } => {
            let list = store
                .create_list(&name)
                .ok_or_else(|| AppError::validation("name", "List name cannot be empty."))?;
            writeln!(out, "Created list {} ({})", list.name, list.id)?;
        }
        ListCommand::Delete { list_id } => {
            let list_id = require_list(store, &list_id)?;
            store.delete_list(&list_id);
            writeln!(out, "Deleted list {list_id}")?;
        }
        ListCommand::Add { list_id, link_ids } => {
            let list_id = require_list(store, &list_id)?;
            let joined = store.add_links_to_list(&link_ids, &list_id);
            writeln!(out, "Added {joined} link(s) to {list_id}")?;
        }
        ListCommand::Remove { list_id, link_id } => {
            let list_id = require_list(store, &list_id)?;
            if store.remove_link_from_list(&link_id, &list_id) {
                writeln!(out, "Removed {link_id} from {list_id}")?;
            } else {
                writeln!(out, "{link_id} is not in {list_id}")?;
            }
        }
        ListCommand::Show => {
            if store.lists().is_empty() {
                writeln!(out, "No lists.")?;
            }
            for list in store.lists() {
                let count = store
                    .links()
                    .iter()
                    .filter(|link| link.is_in_list(&list.id))
                    .count();
                writeln!(out, "{}\t{}\t{count} link(s)", list.id, list.name)?;
            }
        }
    }

    Ok(())
}

/// Accepts a list id or a list name
fn resolve_list<R: SlotRepository>(
    store: &LinkStore<R>,
    list: Option<&str>,
) -> AppResult<Option<String>> {
    list.map(|list| require_list(store, list)).transpose()
}

fn require_list<R: SlotRepository>(store: &LinkStore<R>, list: &str) -> AppResult<String> {
    store
        .list(list)
        .or_else(|| store.list_by_name(list))
        .map(|found| found.id.clone())
        .ok_or_else(|| AppError::validation("list", format!("No list named or with id {list}.")))
}

fn unknown_link(link_id: &str) -> AppError {
    AppError::validation("link", format!("No link with id {link_id}."))
}

fn write_link<R: SlotRepository, W: Write>(
    out: &mut W,
    store: &LinkStore<R>,
    link: &Link,
) -> AppResult<()> {
    let lists: Vec<&str> = link
        .list_ids
        .iter()
        .filter_map(|id| store.list(id))
        .map(|list| list.name.as_str())
        .collect();

    writeln!(
        out,
        "{}\t{}\t{}\t{}",
        link.id,
        link.numeric_id,
        link.label.as_deref().unwrap_or("-"),
        link.original_url
    )?;
    if !lists.is_empty() {
        writeln!(out, "\tlists: {}", lists.join(", "))?;
    }
    Ok(())
}
