//! # Residual partition schemes
//!
//! The low 32 bits of an [`AwemeId`](crate::AwemeId) have no published
//! layout. A [`Scheme`] is one hypothesis about that layout: an ordered list
//! of named fields whose widths add up to exactly 32 bits, read from the most
//! significant bit down.
//!
//! ```text
//!  simplified_16_16:
//!  Bit Index:  31            16 15            0
//!              +---------------+---------------+
//!  Field:      | shard_id (16) | sequence (16) |
//!              +---------------+---------------+
//! ```
//!
//! No scheme is treated as correct. [`SchemeCatalog`] ships several
//! competing ones and [`analyze`] simply describes a residual under any of
//! them.
//!
//! ```
//! use aweme_id::{SchemeCatalog, analyze};
//!
//! let catalog = SchemeCatalog::builtin();
//! let scheme = catalog.get("simplified_16_16").unwrap();
//! let breakdown = analyze(0x7481_0d23, scheme);
//! assert_eq!(breakdown.get("shard_id"), Some(0x7481));
//! assert_eq!(breakdown.get("sequence"), Some(0x0d23));
//! ```

mod catalog;

pub use catalog::*;

use crate::SchemeError;
use crate::id::{LayoutColumn, write_layout_table};
use core::fmt;

/// Number of bits every scheme must account for.
pub const RESIDUAL_BITS: u32 = 32;

/// One named field of a [`Scheme`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    pub name: String,
    pub width: u8,
}

/// A validated partition of the 32 residual bits.
///
/// Fields are stored most significant first. Optionally one field carries
/// the "shard" role and one the "sequence" role; pattern detection uses
/// these to build its shard distribution and per-source summaries.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scheme {
    name: String,
    fields: Vec<FieldSpec>,
    shard: Option<usize>,
    sequence: Option<usize>,
}

impl Scheme {
    /// Builds a scheme from `(name, width)` pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemeError`] naming the scheme (and field, where one is
    /// at fault) if the list is empty, a width is zero or above 32, a name
    /// repeats, or the widths do not sum to exactly 32.
    pub fn new<F>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (F, u8)>,
    ) -> Result<Self, SchemeError>
    where
        F: Into<String>,
    {
        let name = name.into();
        let fields: Vec<FieldSpec> = fields
            .into_iter()
            .map(|(field, width)| FieldSpec {
                name: field.into(),
                width,
            })
            .collect();

        if fields.is_empty() {
            return Err(SchemeError::Empty { scheme: name });
        }

        for (i, field) in fields.iter().enumerate() {
            if field.width == 0 || u32::from(field.width) > RESIDUAL_BITS {
                return Err(SchemeError::InvalidWidth {
                    scheme: name,
                    field: field.name.clone(),
                    width: field.width,
                });
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemeError::DuplicateField {
                    scheme: name,
                    field: field.name.clone(),
                });
            }
        }

        let total: u32 = fields.iter().map(|f| u32::from(f.width)).sum();
        if total != RESIDUAL_BITS {
            return Err(SchemeError::WidthMismatch {
                scheme: name,
                total,
            });
        }

        Ok(Self {
            name,
            fields,
            shard: None,
            sequence: None,
        })
    }

    /// Designates `field` as the shard field.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::UnknownField`] if the scheme has no such field.
    pub fn with_shard(mut self, field: &str) -> Result<Self, SchemeError> {
        self.shard = Some(self.position(field)?);
        Ok(self)
    }

    /// Designates `field` as the sequence field.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::UnknownField`] if the scheme has no such field.
    pub fn with_sequence(mut self, field: &str) -> Result<Self, SchemeError> {
        self.sequence = Some(self.position(field)?);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The widths joined with `+`, e.g. `10+10+12`.
    pub fn label(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.width.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }

    pub fn shard_field(&self) -> Option<&str> {
        self.shard.map(|i| self.fields[i].name.as_str())
    }

    pub fn sequence_field(&self) -> Option<&str> {
        self.sequence.map(|i| self.fields[i].name.as_str())
    }

    /// Returns true if the scheme has a field called `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }

    /// Extracts a single field from `residual` without building a full
    /// breakdown.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::UnknownField`] if the scheme has no such field.
    pub fn extract(&self, residual: u32, field: &str) -> Result<u32, SchemeError> {
        let index = self.position(field)?;
        Ok(self.extract_at(residual, index))
    }

    /// Describes `residual` under this scheme.
    pub fn analyze(&self, residual: u32) -> SchemeBreakdown {
        let mut shift = RESIDUAL_BITS;
        let fields = self
            .fields
            .iter()
            .map(|spec| {
                shift -= u32::from(spec.width);
                SubField {
                    name: spec.name.clone(),
                    width: spec.width,
                    shift: shift as u8,
                    value: field_value(residual, shift, spec.width),
                }
            })
            .collect();

        SchemeBreakdown {
            scheme: self.name.clone(),
            residual,
            fields,
        }
    }

    pub(crate) fn extract_at(&self, residual: u32, index: usize) -> u32 {
        let below: u32 = self.fields[index + 1..]
            .iter()
            .map(|f| u32::from(f.width))
            .sum();
        field_value(residual, below, self.fields[index].width)
    }

    pub(crate) fn position(&self, field: &str) -> Result<usize, SchemeError> {
        self.fields
            .iter()
            .position(|f| f.name == field)
            .ok_or_else(|| SchemeError::UnknownField {
                scheme: self.name.clone(),
                field: field.to_owned(),
            })
    }

    pub(crate) fn shard_index(&self) -> Option<usize> {
        self.shard
    }

    pub(crate) fn sequence_index(&self) -> Option<usize> {
        self.sequence
    }
}

/// Widths are at most 32, so the shift and mask stay inside `u64`.
const fn field_value(residual: u32, shift: u32, width: u8) -> u32 {
    let mask = (1u64 << width) - 1;
    (((residual as u64) >> shift) & mask) as u32
}

/// Describes `residual` under `scheme`, most significant field first.
pub fn analyze(residual: u32, scheme: &Scheme) -> SchemeBreakdown {
    scheme.analyze(residual)
}

/// A single extracted field.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubField {
    pub name: String,
    pub width: u8,
    /// Position of the field's least significant bit within the residual.
    pub shift: u8,
    pub value: u32,
}

/// One residual described under one scheme.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemeBreakdown {
    pub scheme: String,
    pub residual: u32,
    pub fields: Vec<SubField>,
}

impl SchemeBreakdown {
    /// Looks up a field value by name.
    pub fn get(&self, field: &str) -> Option<u32> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.value)
    }

    /// Concatenates the fields back into a residual.
    pub fn reconstruct(&self) -> u32 {
        self.fields
            .iter()
            .fold(0u64, |acc, f| (acc << f.width) | u64::from(f.value)) as u32
    }
}

impl LayoutColumn for SubField {
    fn label(&self) -> &str {
        &self.name
    }

    fn bits(&self) -> u8 {
        self.width
    }

    fn value(&self) -> u64 {
        u64::from(self.value)
    }
}

impl fmt::Display for SchemeBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (residual 0x{:08x}):", self.scheme, self.residual)?;
        write_layout_table(f, &self.fields, "    ")
    }
}
