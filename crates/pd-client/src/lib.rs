//! # Pipedeck Client for Rust
//!
//! Typed client for the Pipedeck CRM backend:
//!
//! - **Sessions**: login, logout, and a persisted session that survives
//!   restarts
//! - **Auth plumbing**: bearer injection with transparent
//!   refresh-and-retry on token expiry
//! - **Role access**: the server permission matrix flattened into a
//!   fail-closed per-user map
//! - **Progressive search**: cursor-paginated scans with client-side
//!   predicates over derived display data
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pd_client::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> pd_client::Result<()> {
//!     let config = Config::new("https://crm.example.com/api");
//!     let client = Client::new(config).await?;
//!
//!     client.login("agent@example.com", "secret").await?;
//!     if client.access().is_allowed("leads") {
//!         let page = client.leads().list(20, None, None).await?;
//!         println!("{} leads on the first page", page.items.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod leads;
pub mod scan;
pub mod session;
pub mod users;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};

pub use pd_common::{Lead, LeadDraft, NewUser, Page, RoleInfo, RoleKey, Session, UserProfile};
