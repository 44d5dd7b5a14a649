// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    dump::{CategoryRowStrategy, TypedRowParser},
    entities::{CategoryId, CategoryRow},
    Result,
};
use rustc_hash::FxHashMap;
use std::io::Read;

/// Dual-keyed in-memory mapping `category id <-> category row`.
///
/// Populated once from the `category` dump, read-only afterwards. This is
/// the dominant in-RAM structure of a build; it is shared by reference
/// across all ingest workers.
#[derive(Debug, Default)]
pub struct InMemoryCategoryTable {
    by_id: FxHashMap<CategoryId, CategoryRow>,
    id_by_name: FxHashMap<String, CategoryId>,
}

impl InMemoryCategoryTable {
    /// Reads the whole `category` dump from `reader`.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut table = Self::default();
        let mut parser: TypedRowParser<CategoryRowStrategy, _> = TypedRowParser::new(reader);
        parser.skip_header()?;
        while let Some(row) = parser.next_row()? {
            table.insert(row);
        }
        log::info!("category table holds {} categories", table.len());
        Ok(table)
    }

    /// Adds one row. Duplicate ids or names keep the first insertion.
    pub fn insert(&mut self, row: CategoryRow) {
        self.id_by_name
            .entry(row.category_name.clone())
            .or_insert(row.category_id);
        self.by_id.entry(row.category_id).or_insert(row);
    }

    /// Row for `category_id`, if known.
    #[must_use]
    pub fn find_by_id(&self, category_id: CategoryId) -> Option<&CategoryRow> {
        self.by_id.get(&category_id)
    }

    /// Row for `category_name`, if known.
    #[must_use]
    pub fn find_by_name(&self, category_name: &str) -> Option<&CategoryRow> {
        self.id_by_name
            .get(category_name)
            .and_then(|id| self.by_id.get(id))
    }

    /// Visits every row in unspecified order.
    pub fn for_each<F: FnMut(&CategoryRow)>(&self, mut f: F) {
        for row in self.by_id.values() {
            f(row);
        }
    }

    /// Number of categories held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryCategoryTable;
    use std::io::Cursor;

    #[test]
    fn reads_dump_and_serves_both_keys() {
        let text = "INSERT INTO `category` VALUES \
                    (2,'Animals',14,3,0),(3,'Plants',7,1,0),(9,'Fungi',0,0,0);\n";
        let table =
            InMemoryCategoryTable::read_from(Cursor::new(text.as_bytes().to_vec())).expect("read");

        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());

        let animals = table.find_by_id(2).expect("known id");
        assert_eq!(animals.category_name, "Animals");
        assert_eq!(animals.page_count, 14);

        let plants = table.find_by_name("Plants").expect("known name");
        assert_eq!(plants.category_id, 3);

        assert!(table.find_by_id(4).is_none());
        assert!(table.find_by_name("Bacteria").is_none());
    }

    #[test]
    fn for_each_visits_every_row() {
        let text = "INSERT INTO `category` VALUES (1,'A',0,0,0),(2,'B',0,0,0);\n";
        let table =
            InMemoryCategoryTable::read_from(Cursor::new(text.as_bytes().to_vec())).expect("read");

        let mut names = Vec::new();
        table.for_each(|row| names.push(row.category_name.clone()));
        names.sort();
        assert_eq!(names, vec!["A", "B"]);
    }
}
