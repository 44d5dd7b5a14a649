// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Streaming decomposition of `INSERT INTO ... VALUES` SQL dumps into typed
//! rows, single-threaded or fanned out over byte ranges.

pub mod lexer;
pub mod parallel;
pub mod stream;
pub mod typed;

pub use lexer::{split_offsets, DumpLexer};
pub use parallel::{ParallelDumpProcessor, RangedRowParser};
pub use stream::RangedByteStream;
pub use typed::{
    CategoryLinksRowStrategy, CategoryRowStrategy, PageRowStrategy, RowStrategy, TypedRowParser,
};
