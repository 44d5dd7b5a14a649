// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    dump::lexer::DumpLexer,
    entities::{CategoryLinkType, CategoryLinksRow, CategoryRow, PageRow},
    Error, Result,
};
use std::io::Read;

/// Decomposition of an untyped row tuple into a domain row.
///
/// A strategy names the table it reads and turns each column tuple into one
/// typed row. Shape mismatches are fatal: the builder is an offline batch
/// and must not silently skew the index.
pub trait RowStrategy {
    /// Domain row type this strategy produces.
    type Row;

    /// Dump table this strategy reads.
    const TABLE_NAME: &'static str;

    /// Decomposes one untyped tuple.
    fn decompose(columns: Vec<String>) -> Result<Self::Row>;
}

fn parse_u64(columns: &[String], idx: usize, what: &str) -> Result<u64> {
    let raw = columns
        .get(idx)
        .ok_or_else(|| Error::MalformedRow(format!("missing column {idx} ({what})")))?;
    raw.parse::<u64>()
        .map_err(|_| Error::MalformedRow(format!("unparseable {what}: {raw:?}")))
}

fn parse_i32(columns: &[String], idx: usize, what: &str) -> Result<i32> {
    let raw = columns
        .get(idx)
        .ok_or_else(|| Error::MalformedRow(format!("missing column {idx} ({what})")))?;
    raw.parse::<i32>()
        .map_err(|_| Error::MalformedRow(format!("unparseable {what}: {raw:?}")))
}

fn take_column(columns: &mut Vec<String>, idx: usize) -> String {
    columns.get_mut(idx).map(std::mem::take).unwrap_or_default()
}

fn expect_columns(columns: &[String], expected: usize) -> Result<()> {
    if columns.len() != expected {
        return Err(Error::MalformedRow(format!(
            "expected {expected} columns, got {}: {columns:?}",
            columns.len(),
        )));
    }
    Ok(())
}

/// Strategy for the 5-column `category` table.
pub struct CategoryRowStrategy;

impl RowStrategy for CategoryRowStrategy {
    type Row = CategoryRow;

    const TABLE_NAME: &'static str = "category";

    fn decompose(mut columns: Vec<String>) -> Result<CategoryRow> {
        expect_columns(&columns, 5)?;
        Ok(CategoryRow {
            category_id: parse_u64(&columns, 0, "category id")?,
            page_count: parse_i32(&columns, 2, "page count")?,
            subcategory_count: parse_i32(&columns, 3, "subcategory count")?,
            category_name: take_column(&mut columns, 1),
        })
    }
}

/// Strategy for the 7-column `categorylinks` table.
pub struct CategoryLinksRowStrategy;

impl RowStrategy for CategoryLinksRowStrategy {
    type Row = CategoryLinksRow;

    const TABLE_NAME: &'static str = "categorylinks";

    fn decompose(mut columns: Vec<String>) -> Result<CategoryLinksRow> {
        expect_columns(&columns, 7)?;
        let link_type = columns
            .last()
            .map(|s| CategoryLinkType::parse(s))
            .transpose()?
            .ok_or_else(|| Error::MalformedRow("missing link type column".into()))?;
        Ok(CategoryLinksRow {
            page_id: parse_u64(&columns, 0, "page id")?,
            category_name: take_column(&mut columns, 1),
            link_type,
        })
    }
}

/// Strategy for the 12-column `page` table.
pub struct PageRowStrategy;

impl RowStrategy for PageRowStrategy {
    type Row = PageRow;

    const TABLE_NAME: &'static str = "page";

    fn decompose(mut columns: Vec<String>) -> Result<PageRow> {
        expect_columns(&columns, 12)?;
        let is_redirect = match columns.get(3).map(String::as_str) {
            Some("0") => false,
            Some("1") => true,
            other => {
                return Err(Error::MalformedRow(format!(
                    "redirect flag must be 0 or 1, got {other:?}",
                )));
            }
        };
        Ok(PageRow {
            page_id: parse_u64(&columns, 0, "page id")?,
            page_title: take_column(&mut columns, 2),
            is_redirect,
        })
    }
}

/// A [`DumpLexer`] with a [`RowStrategy`] applied to every tuple.
pub struct TypedRowParser<S: RowStrategy, R: Read> {
    lexer: DumpLexer<R>,
    _strategy: std::marker::PhantomData<S>,
}

impl<S: RowStrategy, R: Read> TypedRowParser<S, R> {
    /// Wraps `reader`, lexing rows of the strategy's table.
    pub fn new(reader: R) -> Self {
        Self {
            lexer: DumpLexer::new(reader, S::TABLE_NAME),
            _strategy: std::marker::PhantomData,
        }
    }

    /// See [`DumpLexer::skip_header`].
    pub fn skip_header(&mut self) -> Result<bool> {
        self.lexer.skip_header()
    }

    /// Parses the next typed row; `Ok(None)` at end-of-input.
    pub fn next_row(&mut self) -> Result<Option<S::Row>> {
        match self.lexer.next_row()? {
            Some(columns) => S::decompose(columns).map(Some),
            None => Ok(None),
        }
    }
}
