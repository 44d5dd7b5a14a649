// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Builder driver: ingests the three SQL dumps and builds the index.

use catdice::{
    dump::{CategoryLinksRowStrategy, PageRowStrategy, ParallelDumpProcessor},
    is_valid_language, Error, IndexWriter, InMemoryCategoryTable, WikiPageTable,
};
use clap::Parser;
use std::{
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing_subscriber::filter::EnvFilter;

/// Rows staged per write batch during categorylinks ingest.
const INGEST_BATCH: usize = 8192;

#[derive(Parser)]
#[command(
    name = "catdice-build",
    about = "Builds the category-graph index from MediaWiki SQL dumps"
)]
struct Args {
    /// Input `category` table dump
    #[arg(long)]
    category_dump: PathBuf,

    /// Input `categorylinks` table dump
    #[arg(long)]
    categorylinks_dump: PathBuf,

    /// Input `page` table dump
    #[arg(long)]
    page_dump: PathBuf,

    /// Parent directory for the built store (and the ephemeral page store)
    #[arg(long)]
    db_path: PathBuf,

    /// Wikipedia language code; names the store subdirectory
    #[arg(long, default_value = "en")]
    wikipedia_language_code: String,

    /// Worker threads; 0 means hardware concurrency
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Skip dump import and run only the second pass (stores must exist)
    #[arg(long)]
    skip_import: bool,
}

fn init_tracing() {
    tracing_log::LogTracer::init().expect("failed to set log tracer");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
}

fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!("build failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> catdice::Result<()> {
    let started = Instant::now();

    if !is_valid_language(&args.wikipedia_language_code) {
        return Err(Error::InvalidArgument(format!(
            "unknown wikipedia language code: {:?}",
            args.wikipedia_language_code,
        )));
    }

    let threads = if args.threads == 0 {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    } else {
        args.threads
    };
    tracing::info!("building with {threads} thread(s)");

    let index_dir = args.db_path.join(&args.wikipedia_language_code);
    let pages_dir = args
        .db_path
        .join(format!("{}_pages_tmp", args.wikipedia_language_code));
    std::fs::create_dir_all(&args.db_path)?;

    let category_table = Arc::new(read_category_table(&args.category_dump)?);
    let page_table = Arc::new(WikiPageTable::open(&pages_dir)?);

    if !args.skip_import {
        import_page_dump(&args.page_dump, &page_table, threads)?;
    }

    let writer = IndexWriter::open(
        &index_dir,
        Arc::clone(&category_table),
        Arc::clone(&page_table),
        threads,
    )?;

    if !args.skip_import {
        import_categorylinks_dump(&args.categorylinks_dump, &writer, threads)?;
    }

    writer.run_second_pass()?;
    drop(writer);

    drop(page_table);
    if let Err(e) = WikiPageTable::destroy(&pages_dir) {
        tracing::warn!("failed to remove ephemeral page table: {e}");
    }

    tracing::info!(
        "build finished in {:.1?}, store at {}",
        started.elapsed(),
        index_dir.display(),
    );
    Ok(())
}

fn read_category_table(dump: &Path) -> catdice::Result<InMemoryCategoryTable> {
    tracing::info!("reading category table from {}", dump.display());
    let file = std::fs::File::open(dump)?;
    InMemoryCategoryTable::read_from(BufReader::with_capacity(1 << 20, file))
}

fn import_page_dump(
    dump: &Path,
    page_table: &Arc<WikiPageTable>,
    threads: usize,
) -> catdice::Result<()> {
    tracing::info!("importing page table from {}", dump.display());
    ParallelDumpProcessor::new(threads)?.run::<PageRowStrategy, _>(dump, |parser| {
        while let Some(row) = parser.next_row()? {
            page_table.add_page(&row)?;
        }
        Ok(())
    })
}

fn import_categorylinks_dump(
    dump: &Path,
    writer: &IndexWriter,
    threads: usize,
) -> catdice::Result<()> {
    tracing::info!("importing categorylinks from {}", dump.display());
    ParallelDumpProcessor::new(threads)?.run::<CategoryLinksRowStrategy, _>(dump, |parser| {
        let mut rows = Vec::with_capacity(INGEST_BATCH);
        while let Some(row) = parser.next_row()? {
            rows.push(row);
            if rows.len() >= INGEST_BATCH {
                writer.import_categorylinks_rows(&rows)?;
                rows.clear();
            }
        }
        if !rows.is_empty() {
            writer.import_categorylinks_rows(&rows)?;
        }
        Ok(())
    })
}
