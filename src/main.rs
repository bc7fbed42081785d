mod config;
mod contact;
mod error;
mod logging;
mod mutation;
mod query;
mod remote;
mod render;
mod search;
mod session;
mod store;
mod ui;
mod worker;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use config::Config;
use contact::{ContactId, FormField};
use query::{Query, SortMode};
use remote::RestRepository;
use session::{Action, Overlay, Session};

#[derive(Parser, Debug)]
#[command(name = "rldesk", version, about = "Terminal client for a REST contacts service")]
struct Cli {
    /// Configuration file (default: <config dir>/rldesk/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL of the contacts resource, overrides `api_url`
    #[arg(long, global = true, value_name = "URL")]
    api: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the contact listing
    List(ListArgs),
    /// Print one contact
    Show(ShowArgs),
    /// Create a contact
    Add(AddArgs),
    /// Change fields of an existing contact
    Update(UpdateArgs),
    /// Delete a contact
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive filter over name, email and phone
    #[arg(long, default_value = "")]
    search: String,

    #[arg(long, value_enum, default_value_t = SortMode::Default)]
    sort: SortMode,

    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ShowArgs {
    id: ContactId,

    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Plain,
    Html,
    Json,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    fname: String,
    #[arg(long)]
    lname: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: ContactId,
    #[arg(long)]
    fname: Option<String>,
    #[arg(long)]
    lname: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    id: ContactId,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(api) = cli.api.as_deref() {
        config = config.with_api_url(api)?;
    }

    let repo = RestRepository::new(&config.api_url, config.request_timeout)
        .context("failed to build HTTP client")?;

    let Some(command) = cli.command else {
        return run_interactive(&config, repo);
    };

    logging::init_for_cli();
    match command {
        Command::List(args) => handle_list(args, &repo),
        Command::Show(args) => handle_show(args, &repo),
        Command::Add(args) => handle_add(args, &repo),
        Command::Update(args) => handle_update(args, &repo),
        Command::Delete(args) => handle_delete(args, &repo),
    }
}

fn run_interactive(config: &Config, repo: RestRepository) -> Result<()> {
    let log_path = logging::init_for_tui(&config.log)?;
    if let Some(path) = &config.config_path {
        tracing::info!(path = %path.display(), "configuration loaded");
    }
    tracing::info!(api = %repo.base_url(), log = %log_path.display(), "starting");

    let mut app = ui::App::new(config, Arc::new(repo))?;
    app.run()
}

/// Session with the contact set fetched, or the load failure as an error.
fn loaded_session(repo: &RestRepository, query: Query) -> Result<Session> {
    let mut session = Session::new(query);
    let effects = session.bootstrap();
    session.settle(repo, effects);
    if let Some(status) = session.status().filter(|status| status.is_error) {
        bail!("{}", status.text);
    }
    Ok(session)
}

/// Turn an error notice left by the last operation into a failure.
fn check_notice(session: &Session) -> Result<()> {
    match session.notice() {
        Some(notice) if notice.is_error() => bail!("{}", notice.message),
        _ => Ok(()),
    }
}

/// Like [`check_notice`], but a refetch failing after the change went
/// through only warns: the change itself is reported as done.
fn check_mutation(session: &Session) -> Result<()> {
    match session.notice() {
        Some(notice) if notice.is_load_failure() => {
            eprintln!("warning: change applied. {}", notice.message);
            Ok(())
        }
        _ => check_notice(session),
    }
}

fn handle_list(args: ListArgs, repo: &RestRepository) -> Result<()> {
    let session = loaded_session(repo, Query::new(args.search, args.sort))?;
    let listing = session.listing();

    match args.format {
        OutputFormat::Plain => {
            if listing.is_empty() {
                eprintln!("No contacts found.");
            }
            print!("{}", render::plain(&listing));
        }
        OutputFormat::Html => println!("{}", render::html_tbody(&listing)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(session.store().view())
                .context("failed to encode contacts")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn handle_show(args: ShowArgs, repo: &RestRepository) -> Result<()> {
    let mut session = loaded_session(repo, Query::default())?;

    session.dispatch(Action::Show(args.id));
    let Overlay::Viewing(contact) = session.overlay() else {
        bail!("contact {} not found", args.id);
    };

    match args.format {
        OutputFormat::Plain => {
            for (label, value) in render::detail_fields(contact) {
                println!("{}: {}", label, render::sanitize_terminal(value));
            }
        }
        OutputFormat::Html => print!("{}", render::html_detail(contact)),
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(contact).context("failed to encode contact")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn handle_add(args: AddArgs, repo: &RestRepository) -> Result<()> {
    let mut session = Session::new(Query::default());
    session.dispatch(Action::OpenCreate);
    for (field, value) in [
        (FormField::FirstName, args.fname),
        (FormField::LastName, args.lname),
        (FormField::Email, args.email),
        (FormField::Phone, args.phone),
    ] {
        session.dispatch(Action::SetField(field, value));
    }

    let effects = session.dispatch(Action::Submit);
    session.settle(repo, effects);
    check_notice(&session)?;

    if let Some(notice) = session.notice() {
        println!("{}", notice.message);
    }
    Ok(())
}

fn handle_update(args: UpdateArgs, repo: &RestRepository) -> Result<()> {
    let mut session = loaded_session(repo, Query::default())?;

    session.dispatch(Action::Edit(args.id));
    if !matches!(session.overlay(), Overlay::Editing(_)) {
        bail!("contact {} not found", args.id);
    }

    for (field, value) in [
        (FormField::FirstName, args.fname),
        (FormField::LastName, args.lname),
        (FormField::Email, args.email),
        (FormField::Phone, args.phone),
    ] {
        if let Some(value) = value {
            session.dispatch(Action::SetField(field, value));
        }
    }

    let effects = session.dispatch(Action::Submit);
    session.settle(repo, effects);
    check_mutation(&session)?;

    println!("Contact {} updated", args.id);
    Ok(())
}

fn handle_delete(args: DeleteArgs, repo: &RestRepository) -> Result<()> {
    let mut session = loaded_session(repo, Query::default())?;

    session.dispatch(Action::Delete(args.id));
    let name = match session.overlay() {
        Overlay::ConfirmDelete(contact) => contact.display_name(),
        _ => bail!("contact {} not found", args.id),
    };

    if !args.yes && !confirm(&format!(
        "Are you sure you want to delete this contact? ({}) [y/N] ",
        render::sanitize_terminal(&name)
    ))? {
        session.dispatch(Action::Cancel);
        println!("Aborted");
        return Ok(());
    }

    let effects = session.dispatch(Action::Confirm);
    session.settle(repo, effects);
    check_mutation(&session)?;

    println!("Contact {} deleted", args.id);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{}", prompt);
    io::stderr().flush().ok();

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
