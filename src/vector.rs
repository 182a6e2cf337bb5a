//! Sparse score vectors.
//!
//! Field vectors and query vectors are sparse: a document-field only has
//! scores for the handful of terms it actually contains, keyed by the
//! term's global index in the term space. Entries are kept sorted by term
//! index so that `dot` is a linear merge of two sorted streams.

use std::sync::OnceLock;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LunariaError, Result};

/// A sparse numeric vector of `(term index, score)` entries sorted by
/// term index ascending.
///
/// Serialises to the flat alternating form `[index, value, index, value, …]`
/// used by the portable index format.
#[derive(Debug, Default)]
pub struct SparseVector {
    entries: Vec<(u32, f64)>,
    magnitude: OnceLock<f64>,
}

impl Clone for SparseVector {
    fn clone(&self) -> Self {
        SparseVector {
            entries: self.entries.clone(),
            magnitude: self.magnitude.clone(),
        }
    }
}

impl SparseVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        SparseVector::default()
    }

    /// Create a vector from entries. The entries are sorted by index.
    pub fn from_entries(mut entries: Vec<(u32, f64)>) -> Self {
        entries.sort_by_key(|(index, _)| *index);
        SparseVector {
            entries,
            magnitude: OnceLock::new(),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the vector has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(index, value)` entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &(u32, f64)> {
        self.entries.iter()
    }

    /// The slot at which `index` lives, or would live on insertion.
    ///
    /// Binary search over the sorted entries, pivot starting at the
    /// midpoint of the logical length.
    pub fn position_for_index(&self, index: u32) -> usize {
        let mut start = 0;
        let mut end = self.entries.len();

        while start < end {
            let pivot = (start + end) / 2;
            match self.entries[pivot].0 {
                found if found == index => return pivot,
                found if found < index => start = pivot + 1,
                _ => end = pivot,
            }
        }

        start
    }

    /// Insert a value at `index`, failing if the index is already present.
    pub fn insert(&mut self, index: u32, value: f64) -> Result<()> {
        self.upsert(index, value, |_, _| {
            Err(LunariaError::config(format!(
                "duplicate index {index} in sparse vector"
            )))
        })
    }

    /// Insert a value at `index`, resolving a collision with `merge`.
    ///
    /// Invalidates the cached magnitude.
    pub fn upsert<F>(&mut self, index: u32, value: f64, merge: F) -> Result<()>
    where
        F: FnOnce(f64, f64) -> Result<f64>,
    {
        self.magnitude = OnceLock::new();
        let position = self.position_for_index(index);

        if position < self.entries.len() && self.entries[position].0 == index {
            let merged = merge(self.entries[position].1, value)?;
            self.entries[position].1 = merged;
        } else {
            self.entries.insert(position, (index, value));
        }

        Ok(())
    }

    /// The magnitude √Σv² of this vector, computed lazily and cached.
    pub fn magnitude(&self) -> f64 {
        *self.magnitude.get_or_init(|| {
            self.entries
                .iter()
                .map(|(_, value)| value * value)
                .sum::<f64>()
                .sqrt()
        })
    }

    /// Dot product with another sparse vector: a linear merge of the two
    /// sorted entry streams, summing products at matching indices.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut product = 0.0;
        let (a, b) = (&self.entries, &other.entries);
        let (mut i, mut j) = (0, 0);

        while i < a.len() && j < b.len() {
            let (a_index, a_value) = a[i];
            let (b_index, b_value) = b[j];
            match a_index.cmp(&b_index) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    product += a_value * b_value;
                    i += 1;
                    j += 1;
                }
            }
        }

        product
    }

    /// Cosine similarity against `other`, using this vector's magnitude.
    ///
    /// Returns 0 when this vector has magnitude 0.
    pub fn similarity(&self, other: &SparseVector) -> f64 {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            return 0.0;
        }
        self.dot(other) / magnitude
    }
}

impl Serialize for SparseVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len() * 2))?;
        for (index, value) in &self.entries {
            seq.serialize_element(&(*index as f64))?;
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SparseVector {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct FlatVisitor;

        impl<'de> Visitor<'de> for FlatVisitor {
            type Value = SparseVector;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a flat sequence of alternating indexes and values")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<SparseVector, A::Error> {
                let mut entries = Vec::new();
                while let Some(index) = seq.next_element::<f64>()? {
                    let value = seq.next_element::<f64>()?.ok_or_else(|| {
                        serde::de::Error::custom("dangling index without a value")
                    })?;
                    entries.push((index as u32, value));
                }
                Ok(SparseVector::from_entries(entries))
            }
        }

        deserializer.deserialize_seq(FlatVisitor)
    }
}
