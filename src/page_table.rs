// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    entities::{PageId, PageRow},
    Result,
};
use std::path::{Path, PathBuf};

/// Ephemeral on-disk mapping `page id -> page title`.
///
/// Built by (possibly parallel) ingest of the `page` dump and consulted
/// while ingesting `categorylinks` to translate a subcategory's page id
/// into its title. The store only lives for the duration of a build; call
/// [`WikiPageTable::destroy`] after dropping it.
pub struct WikiPageTable {
    db: rocksdb::DB,
}

impl WikiPageTable {
    /// Opens (creating if missing) the page table at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut options = rocksdb::Options::default();
        options.create_if_missing(true);
        let db = rocksdb::DB::open(&options, path)?;
        Ok(Self { db })
    }

    /// Stores one `page` row. Redirects, zero ids and empty titles are
    /// skipped.
    pub fn add_page(&self, row: &PageRow) -> Result<()> {
        if row.is_redirect || row.page_id == 0 || row.page_title.is_empty() {
            return Ok(());
        }
        self.db
            .put(row.page_id.to_le_bytes(), row.page_title.as_bytes())?;
        Ok(())
    }

    /// Title of `page_id`, if present.
    pub fn find(&self, page_id: PageId) -> Result<Option<String>> {
        let value = self.db.get_pinned(page_id.to_le_bytes())?;
        Ok(value.map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// Removes the store's files and directory. The table must already be
    /// dropped.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        let path: PathBuf = path.as_ref().into();
        rocksdb::DB::destroy(&rocksdb::Options::default(), &path)?;
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}
