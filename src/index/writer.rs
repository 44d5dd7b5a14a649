// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    category_table::InMemoryCategoryTable,
    coding::{Decode, Encode},
    entities::{CategoryLinkRecord, CategoryLinkType, CategoryLinksRow, CategoryRow, PageId},
    index::{Store, CATEGORYLINKS_CF, CATEGORY_ID_TO_NAME_CF},
    page_table::WikiPageTable,
    Result,
};
use rocksdb::{
    BottommostLevelCompaction, CompactOptions, FlushOptions, IteratorMode, ReadOptions, WriteBatch,
};
use std::{path::Path, sync::mpsc, sync::Arc};

/// Keys per write batch in the second-pass writer loop.
const SECOND_PASS_BATCH: usize = 1024;

/// Progress log interval, in records.
const PROGRESS_EVERY: u64 = 100_000;

/// Builds the persistent category-graph index.
///
/// Owns the store exclusively for the duration of a build; ingest may be
/// driven from many parser threads concurrently, with per-key conflicts
/// resolved by the store's merge operator.
pub struct IndexWriter {
    store: Store,
    category_table: Arc<InMemoryCategoryTable>,
    page_table: Arc<WikiPageTable>,
    n_threads: usize,
}

impl IndexWriter {
    /// Opens (creating if missing) the index at `path` and populates the
    /// `category_id_to_name` column family from `category_table`, compacting
    /// it before ingest begins.
    pub fn open<P: AsRef<Path>>(
        path: P,
        category_table: Arc<InMemoryCategoryTable>,
        page_table: Arc<WikiPageTable>,
        n_threads: usize,
    ) -> Result<Self> {
        let writer = Self {
            store: Store::open(path)?,
            category_table,
            page_table,
            n_threads: n_threads.max(1),
        };
        writer.import_category_table()?;
        Ok(writer)
    }

    fn import_category_table(&self) -> Result<()> {
        let mut first_error = None;
        self.category_table.for_each(|row| {
            if first_error.is_none() {
                if let Err(e) = self.import_category_row(row) {
                    first_error = Some(e);
                }
            }
        });
        if let Some(e) = first_error {
            return Err(e);
        }

        log::info!(
            "imported {} category id/name pairs, compacting `{CATEGORY_ID_TO_NAME_CF}`",
            self.category_table.len(),
        );
        self.store.db().compact_range_cf(
            self.store.cf(CATEGORY_ID_TO_NAME_CF)?,
            None::<&[u8]>,
            None::<&[u8]>,
        );
        Ok(())
    }

    /// Puts a single `category id -> name` pair.
    pub fn import_category_row(&self, row: &CategoryRow) -> Result<()> {
        let cf = self.store.cf(CATEGORY_ID_TO_NAME_CF)?;
        self.store
            .db()
            .put_cf(cf, row.category_id.to_le_bytes(), row.category_name.as_bytes())?;
        Ok(())
    }

    /// Applies a batch of `categorylinks` rows as one write batch.
    ///
    /// Safe to call from many parser threads concurrently. Duplicate rows
    /// duplicate their page id; ingest is not idempotent.
    pub fn import_categorylinks_rows(&self, rows: &[CategoryLinksRow]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for row in rows {
            self.import_categorylinks_row(&mut batch, row)?;
        }
        self.store.db().write(batch)?;
        Ok(())
    }

    /// Stages one `categorylinks` row into `batch`.
    ///
    /// `FILE` links are dropped. `SUBCAT` links resolve the child's page id
    /// to a category id through the page table and the category table;
    /// unresolvable links are dropped with a warning (the dumps are not
    /// referentially consistent with each other).
    pub fn import_categorylinks_row(
        &self,
        batch: &mut WriteBatch,
        row: &CategoryLinksRow,
    ) -> Result<()> {
        match row.link_type {
            CategoryLinkType::File => {}
            CategoryLinkType::Page => {
                self.add_page(batch, &row.category_name, row.page_id)?;
            }
            CategoryLinkType::Subcat => {
                let Some(subcategory_id) = self.resolve_subcategory(row.page_id)? else {
                    log::warn!(
                        "dropping subcat link under {:?}: page id {} does not resolve \
                         to a known category",
                        row.category_name,
                        row.page_id,
                    );
                    return Ok(());
                };
                self.add_subcategory(batch, &row.category_name, subcategory_id)?;
            }
        }
        Ok(())
    }

    /// `page id -> page title -> category id`, either step may miss.
    fn resolve_subcategory(&self, page_id: PageId) -> Result<Option<u64>> {
        let Some(title) = self.page_table.find(page_id)? else {
            return Ok(None);
        };
        Ok(self
            .category_table
            .find_by_name(&title)
            .map(|row| row.category_id))
    }

    /// Stages a merge contributing a single page id. Not idempotent.
    pub fn add_page(
        &self,
        batch: &mut WriteBatch,
        category_name: &str,
        page_id: PageId,
    ) -> Result<()> {
        let cf = self.store.cf(CATEGORYLINKS_CF)?;
        batch.merge_cf(
            cf,
            category_name.as_bytes(),
            CategoryLinkRecord::of_page(page_id).encode_into_vec(),
        );
        Ok(())
    }

    /// Stages a merge contributing a single (already resolved) subcategory
    /// id.
    pub fn add_subcategory(
        &self,
        batch: &mut WriteBatch,
        category_name: &str,
        subcategory_id: u64,
    ) -> Result<()> {
        let cf = self.store.cf(CATEGORYLINKS_CF)?;
        batch.merge_cf(
            cf,
            category_name.as_bytes(),
            CategoryLinkRecord::of_subcategory(subcategory_id).encode_into_vec(),
        );
        Ok(())
    }

    /// Finishes the build: prunes dangling subcategories, materializes the
    /// depth-indexed weight vectors, flushes the write buffers and forces a
    /// bottommost compaction of `categorylinks`.
    ///
    /// Running this twice on the same store yields the same record
    /// contents, since weights are replaced rather than re-merged.
    pub fn run_second_pass(&self) -> Result<()> {
        log::info!("second pass: pruning dangling subcategories");
        self.prune_dangling_subcategories()?;

        log::info!("second pass: building depth-indexed weights");
        self.build_weights()?;

        log::info!("second pass: flushing write buffers");
        let mut flush_opts = FlushOptions::default();
        flush_opts.set_wait(true);
        self.store
            .db()
            .flush_cf_opt(self.store.cf(CATEGORYLINKS_CF)?, &flush_opts)?;
        self.store
            .db()
            .flush_cf_opt(self.store.cf(CATEGORY_ID_TO_NAME_CF)?, &flush_opts)?;

        log::info!("second pass: compacting `{CATEGORYLINKS_CF}`");
        let mut compact_opts = CompactOptions::default();
        compact_opts.set_change_level(true);
        compact_opts.set_target_level(0);
        compact_opts.set_bottommost_level_compaction(BottommostLevelCompaction::Force);
        self.store.db().compact_range_cf_opt(
            self.store.cf(CATEGORYLINKS_CF)?,
            None::<&[u8]>,
            None::<&[u8]>,
            &compact_opts,
        );

        Ok(())
    }

    /// Drops every stored subcategory id whose name does not resolve or
    /// whose own record is absent (e.g. all-file subcategories that never
    /// got a record of their own).
    fn prune_dangling_subcategories(&self) -> Result<()> {
        let cf = self.store.cf(CATEGORYLINKS_CF)?;
        let mut read_opts = ReadOptions::default();
        read_opts.set_total_order_seek(true);

        let mut scanned = 0u64;
        let mut pruned = 0u64;
        let iter = self
            .store
            .db()
            .iterator_cf_opt(cf, read_opts, IteratorMode::Start);
        for item in iter {
            let (key, value) = item?;
            let mut record = CategoryLinkRecord::decode_from(&mut &value[..])?;
            let name = String::from_utf8_lossy(&key).into_owned();

            let before = record.subcategories.len();
            let mut retained = Vec::with_capacity(before);
            for sub_id in &record.subcategories {
                let resolved = self
                    .category_table
                    .find_by_id(*sub_id)
                    .map(|row| row.category_name.as_str());
                let Some(sub_name) = resolved else {
                    continue;
                };
                if self.store.get(sub_name)?.is_some() {
                    retained.push(*sub_id);
                }
            }

            if retained.len() != before {
                pruned += (before - retained.len()) as u64;
                record.subcategories = retained;
                self.store.put_record(&name, &record)?;
            }

            scanned += 1;
            if scanned % PROGRESS_EVERY == 0 {
                log::info!("pruned {scanned} records so far");
            }
        }

        log::info!("prune pass scanned {scanned} records, dropped {pruned} dangling references");
        Ok(())
    }

    /// Computes and stores the weight vector of every record.
    ///
    /// Compute workers ((threads - 1), at least one) read the immutable
    /// pages/subcategories data and send finished records through a bounded
    /// channel to this thread, which is the only one writing. Weight
    /// vectors are replaced wholesale, so the observable result equals the
    /// sequential pass.
    fn build_weights(&self) -> Result<()> {
        let keys = self.collect_categorylinks_keys()?;
        log::info!("building weights for {} records", keys.len());

        let n_workers = self.n_threads.saturating_sub(1).max(1);
        let chunk_size = keys.len().div_ceil(n_workers).max(1);

        std::thread::scope(|scope| -> Result<()> {
            let (tx, rx) = mpsc::sync_channel::<(String, CategoryLinkRecord)>(SECOND_PASS_BATCH);

            let mut handles = Vec::new();
            for chunk in keys.chunks(chunk_size) {
                let tx = tx.clone();
                handles.push(scope.spawn(move || -> Result<()> {
                    for name in chunk {
                        let Some(mut record) = self.store.get(name)? else {
                            continue;
                        };
                        record.weights = self.store.weight_profile(name)?;
                        if tx.send((name.clone(), record)).is_err() {
                            // receiver bailed out on a store error
                            break;
                        }
                    }
                    Ok(())
                }));
            }
            drop(tx);

            let mut written = 0u64;
            let mut batch = WriteBatch::default();
            let mut in_batch = 0usize;
            for (name, record) in rx {
                let cf = self.store.cf(CATEGORYLINKS_CF)?;
                batch.put_cf(cf, name.as_bytes(), record.encode_into_vec());
                in_batch += 1;
                if in_batch >= SECOND_PASS_BATCH {
                    self.store.db().write(std::mem::take(&mut batch))?;
                    in_batch = 0;
                }
                written += 1;
                if written % PROGRESS_EVERY == 0 {
                    log::info!("built weights for {written} records so far");
                }
            }
            if in_batch > 0 {
                self.store.db().write(batch)?;
            }

            for handle in handles {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
            }
            Ok(())
        })?;

        Ok(())
    }

    fn collect_categorylinks_keys(&self) -> Result<Vec<String>> {
        let cf = self.store.cf(CATEGORYLINKS_CF)?;
        let mut read_opts = ReadOptions::default();
        read_opts.set_total_order_seek(true);

        let mut keys = Vec::new();
        let iter = self
            .store
            .db()
            .iterator_cf_opt(cf, read_opts, IteratorMode::Start);
        for item in iter {
            let (key, _value) = item?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}
