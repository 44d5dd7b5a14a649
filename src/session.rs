// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    entities::{CategoryLinkRecord, PageId},
    index::IndexReader,
    Error, Result,
};
use rand::{rngs::StdRng, SeedableRng};
use std::path::Path;

/// Binding-facing façade over a built index: one object per database path,
/// carrying its own RNG.
pub struct Session {
    reader: IndexReader,
    rng: StdRng,
}

impl Session {
    /// Opens the built index at `db_path`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` if the path does not exist or is not a
    /// directory.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if !db_path.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a directory",
                db_path.display(),
            )));
        }
        Ok(Self {
            reader: IndexReader::open(db_path)?,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Random article reachable from `category_name` within `depth`.
    pub fn pick_random_article(&mut self, category_name: &str, depth: u8) -> Result<Option<PageId>> {
        self.reader.pick_at_depth(category_name, depth, &mut self.rng)
    }

    /// Random article plus the traversal path that reached it.
    pub fn pick_random_article_with_derivation(
        &mut self,
        category_name: &str,
        depth: u8,
    ) -> Result<Option<(PageId, Vec<String>)>> {
        self.reader
            .pick_at_depth_and_show_derivation(category_name, depth, &mut self.rng)
    }

    /// Category names starting with `prefix`, in storage order.
    pub fn autocomplete_category_name(&self, prefix: &str) -> Result<Vec<String>> {
        self.reader.search_categories(prefix, 10)
    }

    /// Full record lookup.
    pub fn get(&self, category_name: &str) -> Result<Option<CategoryLinkRecord>> {
        self.reader.get(category_name)
    }

    /// First `n` records in key order.
    pub fn take(&self, n: usize) -> Result<Vec<(String, CategoryLinkRecord)>> {
        self.reader.take(n)
    }

    /// Visits every record in key order until `visitor` returns `false`.
    pub fn for_each<F>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(&str, &CategoryLinkRecord) -> bool,
    {
        self.reader.for_each(visitor)
    }

    /// The underlying reader.
    #[must_use]
    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }
}
