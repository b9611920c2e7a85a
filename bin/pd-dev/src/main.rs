//! Pipedeck Developer Console
//!
//! Terminal front end for the CRM client, for poking at a backend
//! during development:
//! - Log in, log out, and inspect the persisted session
//! - Check resolved role access for a component
//! - List and progressively search leads
//! - Browse the user directory

use anyhow::Result;
use clap::{Parser, Subcommand};
use pd_client::{Client, Config, Lead, RoleKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Pipedeck Development Console
#[derive(Parser, Debug)]
#[command(name = "pd-dev")]
#[command(about = "Pipedeck developer console - exercise the CRM client from a terminal")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "PD_API_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Where the session is persisted between runs
    #[arg(long, env = "PD_SESSION_FILE", default_value = ".pipedeck/session.json")]
    session_file: String,

    /// Request timeout in seconds
    #[arg(long, env = "PD_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Page size for listings and scans
    #[arg(long, env = "PD_PAGE_SIZE", default_value = "20")]
    page_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session
    Login { email: String, password: String },
    /// Drop the persisted session
    Logout,
    /// Show the current session
    Whoami,
    /// Show resolved role access, or check a single component
    Access { component: Option<String> },
    /// List leads, or progressively search them
    Leads {
        /// Search term; matches names, emails, companies, visa labels,
        /// and creation dates
        #[arg(default_value = "")]
        query: String,
    },
    /// Browse the user directory
    Users,
}

#[tokio::main]
async fn main() -> Result<()> {
    pd_common::logging::init_logging("pd-dev");

    let args = Args::parse();
    debug!(base_url = %args.base_url, "Dev console starting");

    let config = Config::new(&args.base_url)
        .with_session_file(&args.session_file)
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_page_size(args.page_size);
    let client = Client::new(config).await?;

    match args.command {
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            println!("Logged in as {} <{}>", session.user.name, session.user.email);
        }
        Command::Logout => {
            client.logout().await;
            println!("Logged out");
        }
        Command::Whoami => match client.current_user() {
            Some(user) => {
                let role = RoleKey::from_id(user.role_id)
                    .map(|key| key.as_str())
                    .unwrap_or("unknown");
                println!("{} <{}>", user.name, user.email);
                println!("user id {}, role {role}", user.user_id);
            }
            None => println!("Not logged in"),
        },
        Command::Access { component } => match component {
            Some(component) => {
                let allowed = client.access().is_allowed(&component);
                println!("{component}: {}", if allowed { "allow" } else { "deny" });
            }
            None => {
                let mut entries: Vec<_> = client.access().snapshot().into_iter().collect();
                if entries.is_empty() {
                    println!("Access map is empty; log in first");
                }
                entries.sort();
                for (component, allowed) in entries {
                    println!("{component:<24} {}", if allowed { "allow" } else { "deny" });
                }
            }
        },
        Command::Leads { query } => {
            let leads = client.leads();
            let narrowed = if query.is_empty() {
                None
            } else {
                Some(query.as_str())
            };
            let first = leads.list(args.page_size, None, narrowed).await?;

            if query.is_empty() {
                let more = first.next_cursor.is_some();
                print_leads(&first.items);
                if more {
                    println!("(more pages available)");
                }
            } else {
                let scanner = client.lead_scanner();
                let term = query.clone();
                let handle = scanner.start_scan(
                    query,
                    Arc::new(move |lead: &Lead| lead.matches_term(&term)),
                    first,
                );
                handle.await?;

                let matches = scanner.matches();
                print_leads(&matches);
                println!("{} match(es)", matches.len());
            }
        }
        Command::Users => {
            let users = client.users().list().await?;
            let roles = client.users().roles().await?;
            let role_names: HashMap<i64, String> =
                roles.into_iter().map(|role| (role.id, role.name)).collect();
            for user in users {
                let role = role_names
                    .get(&user.role_id)
                    .map(String::as_str)
                    .unwrap_or("?");
                println!(
                    "{:>6}  {:<24}  {:<28}  {role}",
                    user.user_id, user.name, user.email
                );
            }
        }
    }

    Ok(())
}

fn print_leads(leads: &[Lead]) {
    for lead in leads {
        println!(
            "{:>6}  {:<24}  {:<28}  {:<16}  {:<10}  {}",
            lead.id,
            lead.full_name(),
            lead.email,
            lead.company,
            lead.visa_status_label().unwrap_or("-"),
            lead.created_label().unwrap_or_default()
        );
    }
}
