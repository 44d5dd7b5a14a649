// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    Error,
};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// Opaque identifier of a category
pub type CategoryId = u64;

/// Opaque identifier of an article page
pub type PageId = u64;

/// Kind of a `categorylinks` edge
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CategoryLinkType {
    /// Membership of an article page in a category
    Page,

    /// Membership of a subcategory in a category
    Subcat,

    /// Membership of a file page in a category (never indexed)
    File,
}

impl CategoryLinkType {
    /// Parses the literal found in the last `categorylinks` column.
    ///
    /// # Errors
    ///
    /// Anything other than `page`, `subcat` or `file` is a malformed row.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "page" => Ok(Self::Page),
            "subcat" => Ok(Self::Subcat),
            "file" => Ok(Self::File),
            other => Err(Error::MalformedRow(format!(
                "unknown category link type literal: {other:?}",
            ))),
        }
    }

    /// The dump literal for this link type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Subcat => "subcat",
            Self::File => "file",
        }
    }
}

/// One row of the `category` dump
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CategoryRow {
    /// Category id
    pub category_id: CategoryId,

    /// Category name (stripped of newlines, otherwise opaque)
    pub category_name: String,

    /// Member page count as reported by the dump
    pub page_count: i32,

    /// Member subcategory count as reported by the dump
    pub subcategory_count: i32,
}

/// One row of the `page` dump
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageRow {
    /// Page id
    pub page_id: PageId,

    /// Page title
    pub page_title: String,

    /// Whether this page is a redirect
    pub is_redirect: bool,
}

/// One row of the `categorylinks` dump
///
/// `page_id` identifies the *child*: the page or subcategory whose parent
/// is `category_name`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CategoryLinksRow {
    /// Child page id
    pub page_id: PageId,

    /// Parent category name
    pub category_name: String,

    /// Edge kind
    pub link_type: CategoryLinkType,
}

/// Number of distinct article pages reachable at a given traversal radius
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CategoryWeight {
    /// Traversal radius
    pub depth: u8,

    /// Count of distinct reachable article pages
    pub weight: u64,
}

/// Merges `rhs` into `lhs`, summing weights pointwise by depth.
///
/// Each input is deduplicated by depth (first entry wins) and sorted before
/// the two-pointer walk. The result is sorted by depth with no duplicate
/// depths, which makes the operation commutative and associative on the
/// sparse function `depth -> weight`.
pub fn merge_by_depth(lhs: &mut Vec<CategoryWeight>, mut rhs: Vec<CategoryWeight>) {
    dedup_sort_by_depth(lhs);
    dedup_sort_by_depth(&mut rhs);

    if rhs.is_empty() {
        return;
    }

    let mut merged = Vec::with_capacity(lhs.len() + rhs.len());
    let mut a = lhs.iter().copied().peekable();
    let mut b = rhs.iter().copied().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (Some(x), Some(y)) => {
                if x.depth == y.depth {
                    merged.push(CategoryWeight {
                        depth: x.depth,
                        weight: x.weight + y.weight,
                    });
                    a.next();
                    b.next();
                } else if x.depth < y.depth {
                    merged.push(x);
                    a.next();
                } else {
                    merged.push(y);
                    b.next();
                }
            }
            (Some(x), None) => {
                merged.push(x);
                a.next();
            }
            (None, Some(y)) => {
                merged.push(y);
                b.next();
            }
            (None, None) => break,
        }
    }

    *lhs = merged;
}

fn dedup_sort_by_depth(weights: &mut Vec<CategoryWeight>) {
    weights.sort_by_key(|w| w.depth);
    weights.dedup_by_key(|w| w.depth);
}

/// Per-category value stored in the `categorylinks` column family.
///
/// `weights` is kept strictly sorted by depth with at most one entry per
/// depth; `pages` and `subcategories` preserve insertion order.
///
/// The wire encoding is a length-prefixed triple, stable across processes
/// and architectures: each list is a u64 varint count followed by its
/// elements, ids as u64 varints and weights as a raw depth byte plus a u64
/// varint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CategoryLinkRecord {
    /// Member article page ids, insertion order
    pub pages: Vec<PageId>,

    /// Member subcategory ids, insertion order
    pub subcategories: Vec<CategoryId>,

    /// Depth-indexed weight vector, sorted by depth, no duplicate depths
    pub weights: Vec<CategoryWeight>,
}

impl CategoryLinkRecord {
    /// Record contributing a single page id.
    #[must_use]
    pub fn of_page(page_id: PageId) -> Self {
        Self {
            pages: vec![page_id],
            ..Self::default()
        }
    }

    /// Record contributing a single subcategory id.
    #[must_use]
    pub fn of_subcategory(subcategory_id: CategoryId) -> Self {
        Self {
            subcategories: vec![subcategory_id],
            ..Self::default()
        }
    }

    /// Weight at traversal radius `depth`.
    ///
    /// Exact matches return the stored weight. A depth with no entry
    /// returns the weight of the *last* (largest-depth) entry, so picks at
    /// depths beyond the computed ceiling see the saturated weight. An
    /// empty vector returns 0.
    #[must_use]
    pub fn weight_at_depth(&self, depth: u8) -> u64 {
        match self.weights.binary_search_by_key(&depth, |w| w.depth) {
            Ok(idx) => self.weights.get(idx).map_or(0, |w| w.weight),
            Err(_) => self.weights.last().map_or(0, |w| w.weight),
        }
    }

    /// Merges `other` into `self`: pages and subcategories concatenate,
    /// weights sum pointwise by depth.
    pub fn merge_with(&mut self, other: Self) {
        self.pages.extend(other.pages);
        self.subcategories.extend(other.subcategories);
        merge_by_depth(&mut self.weights, other.weights);
    }
}

impl std::fmt::Display for CategoryLinkRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pages={:?}, subcategories={:?}, weights=[",
            self.pages, self.subcategories,
        )?;
        for (i, w) in self.weights.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}@{}", w.weight, w.depth)?;
        }
        write!(f, "]")
    }
}

impl Encode for CategoryLinkRecord {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64_varint(self.pages.len() as u64)?;
        for page_id in &self.pages {
            writer.write_u64_varint(*page_id)?;
        }

        writer.write_u64_varint(self.subcategories.len() as u64)?;
        for category_id in &self.subcategories {
            writer.write_u64_varint(*category_id)?;
        }

        writer.write_u64_varint(self.weights.len() as u64)?;
        for w in &self.weights {
            writer.write_u8(w.depth)?;
            writer.write_u64_varint(w.weight)?;
        }

        Ok(())
    }
}

impl Decode for CategoryLinkRecord {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let page_count = checked_len(reader.read_u64_varint()?)?;
        let mut pages = Vec::with_capacity(page_count);
        for _ in 0..page_count {
            pages.push(reader.read_u64_varint()?);
        }

        let subcat_count = checked_len(reader.read_u64_varint()?)?;
        let mut subcategories = Vec::with_capacity(subcat_count);
        for _ in 0..subcat_count {
            subcategories.push(reader.read_u64_varint()?);
        }

        let weight_count = checked_len(reader.read_u64_varint()?)?;
        let mut weights = Vec::with_capacity(weight_count);
        for _ in 0..weight_count {
            let depth = reader.read_u8()?;
            let weight = reader.read_u64_varint()?;
            weights.push(CategoryWeight { depth, weight });
        }

        Ok(Self {
            pages,
            subcategories,
            weights,
        })
    }
}

// Guards Vec::with_capacity against absurd length prefixes from a corrupt
// value. Real records never get near this.
const MAX_LIST_LEN: u64 = 1 << 32;

fn checked_len(len: u64) -> Result<usize, DecodeError> {
    if len >= MAX_LIST_LEN {
        return Err(DecodeError::InvalidLength(len));
    }
    usize::try_from(len).map_err(|_| DecodeError::InvalidLength(len))
}

#[cfg(test)]
mod tests {
    use super::{merge_by_depth, CategoryLinkRecord, CategoryLinkType, CategoryWeight};
    use crate::coding::{Decode, Encode};

    fn w(depth: u8, weight: u64) -> CategoryWeight {
        CategoryWeight { depth, weight }
    }

    #[test]
    fn link_type_literals() {
        assert_eq!(
            CategoryLinkType::parse("page").expect("valid"),
            CategoryLinkType::Page,
        );
        assert_eq!(
            CategoryLinkType::parse("subcat").expect("valid"),
            CategoryLinkType::Subcat,
        );
        assert_eq!(
            CategoryLinkType::parse("file").expect("valid"),
            CategoryLinkType::File,
        );
        assert!(CategoryLinkType::parse("template").is_err());
        assert!(CategoryLinkType::parse("").is_err());
        assert_eq!(CategoryLinkType::Subcat.as_str(), "subcat");
    }

    #[test]
    fn weight_at_depth_exact_match() {
        let rec = CategoryLinkRecord {
            weights: vec![w(0, 2), w(1, 5), w(2, 9)],
            ..CategoryLinkRecord::default()
        };
        assert_eq!(rec.weight_at_depth(0), 2);
        assert_eq!(rec.weight_at_depth(1), 5);
        assert_eq!(rec.weight_at_depth(2), 9);
    }

    #[test]
    fn weight_at_depth_miss_returns_last() {
        // Picks at depths beyond the computed ceiling must see the
        // saturated weight.
        let rec = CategoryLinkRecord {
            weights: vec![w(0, 2), w(1, 5)],
            ..CategoryLinkRecord::default()
        };
        assert_eq!(rec.weight_at_depth(3), 5);
        assert_eq!(rec.weight_at_depth(255), 5);
    }

    #[test]
    fn weight_at_depth_below_smallest_returns_last() {
        let rec = CategoryLinkRecord {
            weights: vec![w(2, 7)],
            ..CategoryLinkRecord::default()
        };
        assert_eq!(rec.weight_at_depth(0), 7);
    }

    #[test]
    fn weight_at_depth_empty_is_zero() {
        let rec = CategoryLinkRecord::default();
        assert_eq!(rec.weight_at_depth(0), 0);
        assert_eq!(rec.weight_at_depth(100), 0);
    }

    #[test]
    fn merge_sums_equal_depths() {
        let mut lhs = vec![w(0, 1), w(1, 4)];
        merge_by_depth(&mut lhs, vec![w(0, 2), w(1, 6)]);
        assert_eq!(lhs, vec![w(0, 3), w(1, 10)]);
    }

    #[test]
    fn merge_inserts_missing_depths() {
        let mut lhs = vec![w(0, 1), w(3, 4)];
        merge_by_depth(&mut lhs, vec![w(1, 2), w(5, 8)]);
        assert_eq!(lhs, vec![w(0, 1), w(1, 2), w(3, 4), w(5, 8)]);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut lhs = vec![w(0, 1), w(2, 4)];
        merge_by_depth(&mut lhs, vec![]);
        assert_eq!(lhs, vec![w(0, 1), w(2, 4)]);

        let mut empty = vec![];
        merge_by_depth(&mut empty, vec![w(0, 1), w(2, 4)]);
        assert_eq!(empty, vec![w(0, 1), w(2, 4)]);
    }

    #[test]
    fn merge_handles_unsorted_and_duplicated_inputs() {
        let mut lhs = vec![w(4, 9), w(0, 1), w(4, 50)];
        merge_by_depth(&mut lhs, vec![w(2, 3), w(0, 2)]);
        assert_eq!(lhs, vec![w(0, 3), w(2, 3), w(4, 9)]);
    }

    #[test]
    fn merge_is_commutative() {
        let a = vec![w(0, 1), w(2, 5)];
        let b = vec![w(1, 3), w(2, 2), w(7, 8)];

        let mut ab = a.clone();
        merge_by_depth(&mut ab, b.clone());
        let mut ba = b;
        merge_by_depth(&mut ba, a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_associative() {
        let a = vec![w(0, 1), w(2, 5)];
        let b = vec![w(1, 3), w(2, 2)];
        let c = vec![w(0, 7), w(3, 4)];

        // (a + b) + c
        let mut left = a.clone();
        merge_by_depth(&mut left, b.clone());
        merge_by_depth(&mut left, c.clone());

        // a + (b + c)
        let mut bc = b;
        merge_by_depth(&mut bc, c);
        let mut right = a;
        merge_by_depth(&mut right, bc);

        assert_eq!(left, right);
    }

    #[test]
    fn record_merge_concatenates_and_sums() {
        let mut rec = CategoryLinkRecord {
            pages: vec![10, 11],
            subcategories: vec![3],
            weights: vec![w(0, 2)],
        };
        rec.merge_with(CategoryLinkRecord {
            pages: vec![12],
            subcategories: vec![4, 5],
            weights: vec![w(0, 1), w(1, 6)],
        });

        assert_eq!(rec.pages, vec![10, 11, 12]);
        assert_eq!(rec.subcategories, vec![3, 4, 5]);
        assert_eq!(rec.weights, vec![w(0, 3), w(1, 6)]);
    }

    #[test]
    fn record_merge_with_empty_is_identity_both_sides() {
        let rec = CategoryLinkRecord {
            pages: vec![1, 2],
            subcategories: vec![9],
            weights: vec![w(0, 2), w(1, 3)],
        };

        let mut lhs = rec.clone();
        lhs.merge_with(CategoryLinkRecord::default());
        assert_eq!(lhs, rec);

        let mut rhs = CategoryLinkRecord::default();
        rhs.merge_with(rec.clone());
        assert_eq!(rhs, rec);
    }

    #[test]
    fn record_roundtrip() {
        let rec = CategoryLinkRecord {
            pages: vec![0, 1, u64::MAX, 123_456_789],
            subcategories: vec![42],
            weights: vec![w(0, 0), w(1, 300), w(100, u64::MAX)],
        };

        let bytes = rec.encode_into_vec();
        let mut reader = &bytes[..];
        let decoded = CategoryLinkRecord::decode_from(&mut reader).expect("roundtrip");

        assert_eq!(decoded, rec);
        assert!(reader.is_empty(), "no trailing bytes");
    }

    #[test]
    fn empty_record_roundtrip() {
        let rec = CategoryLinkRecord::default();
        let bytes = rec.encode_into_vec();
        assert_eq!(bytes, vec![0, 0, 0]);

        let mut reader = &bytes[..];
        let decoded = CategoryLinkRecord::decode_from(&mut reader).expect("roundtrip");
        assert_eq!(decoded, rec);
    }

    #[test]
    fn decode_rejects_truncated_value() {
        let rec = CategoryLinkRecord::of_page(77);
        let bytes = rec.encode_into_vec();
        let truncated = bytes.get(..bytes.len() - 1).expect("non-empty");
        assert!(CategoryLinkRecord::decode_from(&mut &truncated[..]).is_err());
    }

    #[test]
    fn display_is_compact() {
        let rec = CategoryLinkRecord {
            pages: vec![10],
            subcategories: vec![3],
            weights: vec![w(0, 1), w(1, 4)],
        };
        assert_eq!(
            rec.to_string(),
            "pages=[10], subcategories=[3], weights=[1@0, 4@1]",
        );
    }
}
