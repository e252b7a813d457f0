use crate::{DecodedRecord, ValueError};
use core::fmt;
use core::str::FromStr;

/// A 64-bit Douyin/TikTok video identifier (`aweme_id`).
///
/// - 32 bits timestamp (seconds since the Unix epoch)
/// - 32 bits residual (undisclosed; hypothesized shard + sequence)
///
/// ```text
///  Bit Index:  63             32 31             0
///              +----------------+---------------+
///  Field:      | timestamp (32) | residual (32) |
///              +----------------+---------------+
///              |<--- MSB --- 64 bits -- LSB --->|
/// ```
///
/// The value is always handled as unsigned: the top bit of either half is
/// data, never a sign.
///
/// # Example
///
/// ```
/// use aweme_id::AwemeId;
///
/// let id: AwemeId = "7350810998023949599".parse().unwrap();
/// assert_eq!(id.timestamp(), 1_711_494_056);
/// assert_eq!(id.residual(), 0x0c40_8d1f);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AwemeId {
    id: u64,
}

impl AwemeId {
    /// Bitmask for extracting the 32-bit timestamp field. Occupies bits 32
    /// through 63.
    pub const TIMESTAMP_MASK: u64 = (1 << 32) - 1;

    /// Bitmask for extracting the 32-bit residual field. Occupies bits 0
    /// through 31.
    pub const RESIDUAL_MASK: u64 = (1 << 32) - 1;

    /// Number of bits to shift the timestamp to its correct position (bit 32).
    pub const TIMESTAMP_SHIFT: u64 = 32;

    /// Number of bits to shift the residual field (bit 0).
    pub const RESIDUAL_SHIFT: u64 = 0;

    /// Packs a timestamp and a residual into an id.
    pub const fn from_parts(timestamp: u32, residual: u32) -> Self {
        let timestamp = (timestamp as u64 & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let residual = (residual as u64 & Self::RESIDUAL_MASK) << Self::RESIDUAL_SHIFT;
        Self {
            id: timestamp | residual,
        }
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Extracts the timestamp (Unix seconds) from the packed ID.
    pub const fn timestamp(&self) -> u32 {
        ((self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK) as u32
    }

    /// Extracts the residual bits from the packed ID.
    pub const fn residual(&self) -> u32 {
        ((self.id >> Self::RESIDUAL_SHIFT) & Self::RESIDUAL_MASK) as u32
    }

    /// Splits the id into its timestamp and residual halves.
    pub const fn decode(&self) -> DecodedRecord {
        DecodedRecord::new(self.timestamp(), self.residual())
    }

    /// Returns the ID as a zero-padded 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }

    /// Returns the full 64-bit binary representation, grouped by byte with
    /// the timestamp and residual halves separated by `|`.
    ///
    /// ```
    /// use aweme_id::AwemeId;
    ///
    /// let id = AwemeId::from_parts(1, 0x8000_0000);
    /// assert_eq!(
    ///     id.to_bit_string(),
    ///     "00000000 00000000 00000000 00000001 | 10000000 00000000 00000000 00000000"
    /// );
    /// ```
    pub fn to_bit_string(&self) -> String {
        let bytes = self.id.to_be_bytes();
        let group = |half: &[u8]| {
            half.iter()
                .map(|b| format!("{b:08b}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!("{} | {}", group(&bytes[..4]), group(&bytes[4..]))
    }

    fn fields(&self) -> [FieldLayout; 2] {
        [
            FieldLayout {
                name: "timestamp",
                bits: 32,
                value: u64::from(self.timestamp()),
            },
            FieldLayout {
                name: "residual",
                bits: 32,
                value: u64::from(self.residual()),
            },
        ]
    }
}

impl From<u64> for AwemeId {
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<AwemeId> for u64 {
    fn from(id: AwemeId) -> Self {
        id.to_raw()
    }
}

impl FromStr for AwemeId {
    type Err = ValueError;

    /// Parses an unsigned decimal id.
    ///
    /// Surrounding whitespace is ignored. Signs, separators and anything
    /// beyond `u64::MAX` are rejected instead of being truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(ValueError::EmptyId);
        }

        let mut id: u64 = 0;
        for (offset, c) in input.char_indices() {
            let digit = c.to_digit(10).ok_or_else(|| ValueError::InvalidDigit {
                input: input.to_owned(),
                found: c,
                offset,
            })?;
            id = id
                .checked_mul(10)
                .and_then(|n| n.checked_add(u64::from(digit)))
                .ok_or_else(|| ValueError::IdOverflow {
                    input: input.to_owned(),
                })?;
        }
        Ok(Self { id })
    }
}

impl fmt::Display for AwemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for AwemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AwemeId {{")?;
        writeln!(f, "    raw id     : 0x{:016x} ({})", self.id, self.id)?;
        writeln!(f, "    padded     : {}", self.to_padded_string())?;
        writeln!(f, "    layout     :")?;
        write_layout_table(f, &self.fields(), "        ")?;
        write!(f, "}}")
    }
}

/// One column of a rendered bit-layout table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FieldLayout {
    pub name: &'static str,
    pub bits: u8,
    pub value: u64,
}

/// Draws fields as a boxed table with the field label, the decimal value and
/// the hex value stacked in each column.
pub(crate) fn write_layout_table<L>(
    f: &mut fmt::Formatter<'_>,
    fields: &[L],
    indent: &str,
) -> fmt::Result
where
    L: LayoutColumn,
{
    fn center(s: impl ToString, width: usize) -> String {
        let s = s.to_string();
        let len = s.len();
        if len >= width {
            return s;
        }
        let pad = width - len;
        let left = pad / 2;
        let right = pad - left;
        format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))
    }

    let rows: Vec<[String; 3]> = fields
        .iter()
        .map(|field| {
            [
                format!("{} ({})", field.label(), field.bits()),
                field.value().to_string(),
                format!("0x{:x}", field.value()),
            ]
        })
        .collect();

    // +2 for padding
    let columns: Vec<usize> = rows
        .iter()
        .map(|cells| cells.iter().map(String::len).max().unwrap_or(0) + 2)
        .collect();

    fn border(f: &mut fmt::Formatter<'_>, indent: &str, columns: &[usize]) -> fmt::Result {
        write!(f, "{indent}+")?;
        for &w in columns {
            write!(f, "{}+", "-".repeat(w))?;
        }
        writeln!(f)
    }

    border(f, indent, &columns)?;
    for line in 0..3 {
        write!(f, "{indent}|")?;
        for (cells, &w) in rows.iter().zip(&columns) {
            write!(f, "{}|", center(&cells[line], w))?;
        }
        writeln!(f)?;
        if line == 0 {
            border(f, indent, &columns)?;
        }
    }
    border(f, indent, &columns)
}

/// Anything that can be drawn as a column of [`write_layout_table`].
pub(crate) trait LayoutColumn {
    fn label(&self) -> &str;
    fn bits(&self) -> u8;
    fn value(&self) -> u64;
}

impl LayoutColumn for FieldLayout {
    fn label(&self) -> &str {
        self.name
    }

    fn bits(&self) -> u8 {
        self.bits
    }

    fn value(&self) -> u64 {
        self.value
    }
}
