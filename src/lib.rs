//! Export a researcher's profile data from the [researchmap](https://researchmap.jp) API.
//!
//! The export fetches `published_papers`, `research_projects` and `awards` for one
//! researcher permalink, one blocking request after another, and writes them to a
//! single pretty-printed JSON file. Any failed request aborts the run before the
//! file is written.
//!
//! ## Quick start
//! - Pick the researcher via `RESEARCHMAP_PERMALINK` or a `.researchmaprc` file
//!   (current directory or home directory), or pass it explicitly.
//! - Call [`export`] with a [`Client`].
//! - Optionally turn a saved snapshot into a publication listing with
//!   [`Listing::from_snapshot`].
//!
//! ```no_run
//! use anyhow::Result;
//! use researchmap_export::{Client, QueryParams, export};
//!
//! fn main() -> Result<()> {
//!     let client = Client::new(None, Some("t_yamane".to_string()), None)?;
//!     let overrides = QueryParams::new().with("from_date", "2015");
//!     let snapshot = export(&client, &overrides, std::path::Path::new("researchmap_data.json"))?;
//!     println!("{} papers", snapshot.published_papers.len());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod export;
mod extract;
mod query;
pub mod render;

pub use client::{Client, ClientConfig};
pub use export::{DEFAULT_OUTPUT, Endpoint, Snapshot, export, fetch_snapshot};
pub use extract::{Extracted, ResponseShape, extract_items};
pub use query::QueryParams;
pub use render::{Format, Listing};
