use crate::{AwemeId, ValueError};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Timezone used for the secondary calendar rendering of a decoded
/// timestamp.
pub const SECONDARY_TZ: Tz = chrono_tz::America::Los_Angeles;

/// The two halves of a decoded [`AwemeId`].
///
/// `timestamp_seconds` is the high 32 bits read as Unix epoch seconds and
/// `residual` is the low 32 bits. Hex, binary and calendar renderings are
/// derived on demand and never stored.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecodedRecord {
    timestamp_seconds: u32,
    residual: u32,
}

impl DecodedRecord {
    pub const fn new(timestamp_seconds: u32, residual: u32) -> Self {
        Self {
            timestamp_seconds,
            residual,
        }
    }

    pub const fn timestamp_seconds(&self) -> u32 {
        self.timestamp_seconds
    }

    pub const fn residual(&self) -> u32 {
        self.residual
    }

    /// Repacks the halves into the original id.
    pub const fn to_id(&self) -> AwemeId {
        AwemeId::from_parts(self.timestamp_seconds, self.residual)
    }

    /// The residual as `0x`-prefixed lowercase hex, without zero padding.
    pub fn residual_hex(&self) -> String {
        format!("{:#x}", self.residual)
    }

    /// The residual as `0b`-prefixed binary, without zero padding.
    pub fn residual_binary(&self) -> String {
        format!("{:#b}", self.residual)
    }

    /// The timestamp as a UTC instant.
    ///
    /// Every `u32` second count lies well inside chrono's range, so this
    /// conversion cannot fail.
    pub fn datetime_utc(&self) -> DateTime<Utc> {
        // `DateTime<Utc>::default()` is the Unix epoch.
        DateTime::<Utc>::default() + TimeDelta::seconds(i64::from(self.timestamp_seconds))
    }

    /// The same instant rendered in [`SECONDARY_TZ`].
    pub fn datetime_secondary(&self) -> DateTime<Tz> {
        self.datetime_in(&SECONDARY_TZ)
    }

    pub fn datetime_in<T: TimeZone>(&self, tz: &T) -> DateTime<T> {
        self.datetime_utc().with_timezone(tz)
    }
}

impl From<AwemeId> for DecodedRecord {
    fn from(id: AwemeId) -> Self {
        id.decode()
    }
}

/// Splits a raw 64-bit id into its timestamp and residual halves.
///
/// # Example
///
/// ```
/// let record = aweme_id::decode(7350810998023949599);
/// assert_eq!(record.timestamp_seconds(), 1_711_494_056);
/// assert_eq!(record.residual_hex(), "0xc408d1f");
/// ```
pub const fn decode(raw_id: u64) -> DecodedRecord {
    AwemeId::from_raw(raw_id).decode()
}

/// Parses a decimal id and decodes it.
///
/// # Errors
///
/// Returns a [`ValueError`] naming the input if it is not an unsigned decimal
/// number or does not fit in 64 bits.
pub fn decode_str(raw_id: &str) -> Result<DecodedRecord, ValueError> {
    raw_id.parse::<AwemeId>().map(|id| id.decode())
}
