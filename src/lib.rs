//! # scopusfetch
//!
//! Scopus literature search client: citation and date filtered article metadata.
//!
//! ## Modules
//!
//! - [`scopus`] - Scopus Search API client and pagination
//! - [`query`] - Search parameters and client-side filters
//! - [`config`] - API key and endpoint resolution
//! - [`output`] - CSV / JSON / table rendering
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scopusfetch::{scopus, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = SearchQuery::new("machine learning")
//!         .with_min_citations(100)
//!         .with_limit(20)
//!         .with_date_range(Some("2018-01-01"), None)?;
//!     let articles = scopus::fetch(&query).await?;
//!     println!("Found {} articles", articles.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod query;
pub mod scopus;

pub use config::ScopusConfig;
pub use error::{Result, ScopusError};
pub use query::{SearchQuery, View};
pub use scopus::{ArticleRecord, ScopusClient};
