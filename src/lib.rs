// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Builds a persistent, compressed index over a MediaWiki category graph
//! and serves uniformly-random article picks from it.
//!
//! ##### About
//!
//! Three SQL dumps go in (the `category` catalog, the `page` catalog and
//! the `categorylinks` edge table) and a RocksDB-backed index comes out
//! that can answer, interactively:
//!
//! > give me a random article reachable from category `C` by at most `d`
//! > nested subcategory traversals.
//!
//! Alongside picks, the index serves prefix autocompletion of category
//! names, the traversal path ("derivation") behind a pick, and full record
//! lookups for diagnostics.
//!
//! The dumps are parsed by a byte-level lexer that can split a file into
//! statement-aligned ranges and chew through them on parallel threads. Per
//! category the store keeps its member article page ids, its subcategory
//! ids and a depth-indexed weight vector; concurrent ingest writes are
//! reconciled by an associative merge operator registered with the store.
//! A second pass prunes dangling subcategory references and materializes
//! the weight vectors that make picks O(path length).
//!
//! # Example usage
//!
//! ```no_run
//! use catdice::{IndexReader, Session};
//!
//! // query a built index
//! let mut session = Session::open("/data/wikidb/en")?;
//! if let Some(page_id) = session.pick_random_article("Physics", 3)? {
//!     println!("https://en.wikipedia.org/?curid={page_id}");
//! }
//!
//! // or drive the reader directly with your own RNG
//! let reader = IndexReader::open("/data/wikidb/en")?;
//! let mut rng = rand::rng();
//! let pick = reader.pick_at_depth("Physics", 3, &mut rng)?;
//!
//! for name in reader.search_categories("Phys", 10)? {
//!     println!("{name}");
//! }
//! #
//! # Ok::<(), catdice::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![warn(missing_docs)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]

pub mod category_table;
pub mod coding;
pub mod dump;
pub mod entities;

mod error;

pub mod index;
pub mod languages;
pub mod page_table;
pub mod ring;
pub mod session;

pub use category_table::InMemoryCategoryTable;
pub use entities::{
    CategoryId, CategoryLinkRecord, CategoryLinkType, CategoryLinksRow, CategoryRow,
    CategoryWeight, PageId, PageRow,
};
pub use error::{Error, Result};
pub use index::{IndexReader, IndexWriter, DEPTH_END};
pub use languages::is_valid_language;
pub use page_table::WikiPageTable;
pub use ring::BoundedRing;
pub use session::Session;
