// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::Decode,
    entities::{CategoryId, CategoryLinkRecord, PageId},
    index::{Store, CATEGORYLINKS_CF},
    Result,
};
use rand::Rng;
use rocksdb::{Direction, IteratorMode, ReadOptions};
use std::path::Path;

/// Most results ever returned by [`IndexReader::search_categories`].
const MAX_AUTOCOMPLETIONS: usize = 100;

/// Longest accepted autocomplete prefix, in bytes.
const MAX_PREFIX_LEN: usize = 1000;

/// Serves random picks, derivations, prefix autocomplete and record lookup
/// over a built index.
///
/// The reader performs no writes and is safe to share across request
/// threads.
pub struct IndexReader {
    store: Store,
}

impl IndexReader {
    /// Opens the built index at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
        })
    }

    /// Record stored for `category_name`, if any.
    pub fn get(&self, category_name: &str) -> Result<Option<CategoryLinkRecord>> {
        self.store.get(category_name)
    }

    /// Name of `category_id`, if known.
    pub fn category_name_of(&self, category_id: CategoryId) -> Result<Option<String>> {
        self.store.category_name_of(category_id)
    }

    /// Picks a uniformly-random article page reachable from
    /// `category_name` by at most `depth` nested subcategory traversals.
    ///
    /// Returns `None` for unknown categories and for categories with no
    /// article reachable within the bound (in particular, at depth 0 the
    /// pick is uniform over the category's own pages and `None` iff it has
    /// none).
    pub fn pick_at_depth<R: Rng>(
        &self,
        category_name: &str,
        depth: u8,
        rng: &mut R,
    ) -> Result<Option<PageId>> {
        let Some(record) = self.store.get(category_name)? else {
            return Ok(None);
        };
        let weight = record.weight_at_depth(depth);
        if weight == 0 {
            return Ok(None);
        }
        let index = rng.random_range(0..weight);
        self.store.descend(category_name, index, depth, None)
    }

    /// Like [`IndexReader::pick_at_depth`], also returning the derivation:
    /// the category names the descent passed through, starting with
    /// `category_name`.
    pub fn pick_at_depth_and_show_derivation<R: Rng>(
        &self,
        category_name: &str,
        depth: u8,
        rng: &mut R,
    ) -> Result<Option<(PageId, Vec<String>)>> {
        let Some(record) = self.store.get(category_name)? else {
            return Ok(None);
        };
        let weight = record.weight_at_depth(depth);
        if weight == 0 {
            return Ok(None);
        }
        let index = rng.random_range(0..weight);

        let mut derivation = Vec::new();
        let page = self
            .store
            .descend(category_name, index, depth, Some(&mut derivation))?;
        Ok(page.map(|page_id| (page_id, derivation)))
    }

    /// Up to `min(requested_count, 100)` category names starting with
    /// `prefix`, in storage byte order. Prefixes longer than 1000 bytes
    /// yield an empty result.
    pub fn search_categories(&self, prefix: &str, requested_count: usize) -> Result<Vec<String>> {
        let mut completions = Vec::new();
        if prefix.len() > MAX_PREFIX_LEN {
            return Ok(completions);
        }
        let cap = requested_count.min(MAX_AUTOCOMPLETIONS);
        if cap == 0 {
            return Ok(completions);
        }

        let cf = self.store.cf(CATEGORYLINKS_CF)?;
        let mut read_opts = ReadOptions::default();
        read_opts.set_total_order_seek(true);

        let iter = self.store.db().iterator_cf_opt(
            cf,
            read_opts,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );
        for item in iter {
            let (key, _value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            completions.push(String::from_utf8_lossy(&key).into_owned());
            if completions.len() >= cap {
                break;
            }
        }
        Ok(completions)
    }

    /// Visits every record in key order until `visitor` returns `false`.
    pub fn for_each<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&str, &CategoryLinkRecord) -> bool,
    {
        let cf = self.store.cf(CATEGORYLINKS_CF)?;
        let mut read_opts = ReadOptions::default();
        read_opts.set_total_order_seek(true);

        let iter = self
            .store
            .db()
            .iterator_cf_opt(cf, read_opts, IteratorMode::Start);
        for item in iter {
            let (key, value) = item?;
            let record = CategoryLinkRecord::decode_from(&mut &value[..])?;
            let name = String::from_utf8_lossy(&key);
            if !visitor(&name, &record) {
                break;
            }
        }
        Ok(())
    }

    /// First `n` records in key order.
    pub fn take(&self, n: usize) -> Result<Vec<(String, CategoryLinkRecord)>> {
        let mut out = Vec::with_capacity(n.min(1024));
        if n == 0 {
            return Ok(out);
        }
        self.for_each(|name, record| {
            out.push((name.to_owned(), record.clone()));
            out.len() < n
        })?;
        Ok(out)
    }

    /// Diagnostic rendering of a record: the raw record plus resolved
    /// subcategory names.
    pub fn describe(&self, category_name: &str) -> Result<Option<String>> {
        let Some(record) = self.store.get(category_name)? else {
            return Ok(None);
        };
        let mut subcategory_names = Vec::with_capacity(record.subcategories.len());
        for sub_id in &record.subcategories {
            if let Some(name) = self.store.category_name_of(*sub_id)? {
                subcategory_names.push(name);
            }
        }
        Ok(Some(format!(
            "{category_name}: {record}, subcategory names={subcategory_names:?}",
        )))
    }
}
