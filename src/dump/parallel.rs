// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    dump::{
        lexer::split_offsets,
        stream::RangedByteStream,
        typed::{RowStrategy, TypedRowParser},
    },
    Error, Result,
};
use std::{io::BufReader, path::Path};

/// Typed parser over one byte range of a dump file.
pub type RangedRowParser<S> = TypedRowParser<S, BufReader<RangedByteStream>>;

/// Fans a dump file out over parallel OS threads.
///
/// The file is split into up to `n_workers` byte ranges aligned on statement
/// boundaries; each worker gets its own [`RangedRowParser`] positioned at
/// its first row. Workers share nothing through the processor; cross-thread
/// communication is the worker function's business.
#[derive(Clone, Copy, Debug)]
pub struct ParallelDumpProcessor {
    n_workers: usize,
}

impl ParallelDumpProcessor {
    /// Creates a processor using up to `n_workers` threads.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for a zero worker count.
    pub fn new(n_workers: usize) -> Result<Self> {
        if n_workers == 0 {
            return Err(Error::InvalidArgument(
                "worker count must be non-zero".into(),
            ));
        }
        Ok(Self { n_workers })
    }

    /// Parses `dump_path` with `worker` invoked once per byte range.
    ///
    /// Joins all workers before returning; the first worker error is
    /// propagated. There is no cancellation: a fatal error in one worker
    /// does not interrupt the others, it only fails the overall run.
    pub fn run<S, F>(&self, dump_path: &Path, worker: F) -> Result<()>
    where
        S: RowStrategy,
        F: Fn(&mut RangedRowParser<S>) -> Result<()> + Sync,
    {
        let partitions = split_offsets(dump_path, S::TABLE_NAME, self.n_workers)?;
        log::debug!(
            "parsing {} across {} partition(s)",
            dump_path.display(),
            partitions.len(),
        );

        let worker = &worker;
        let outcomes = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(partitions.len());

            for (idx, (begin, end)) in partitions.iter().copied().enumerate() {
                handles.push(scope.spawn(move || -> Result<()> {
                    let stream = RangedByteStream::open_buffered(dump_path, begin, end)?;
                    let mut parser = TypedRowParser::<S, _>::new(stream);
                    // Partition 0 starts just past the first header; later
                    // partitions start at a header boundary.
                    if idx > 0 && !parser.skip_header()? {
                        return Ok(());
                    }
                    worker(&mut parser)
                }));
            }

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Vec<_>>()
        });

        for outcome in outcomes {
            outcome?;
        }
        Ok(())
    }
}
