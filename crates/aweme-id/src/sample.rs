use crate::{AwemeId, Source, ValueError};

/// One labeled corpus entry: an id as it arrived, its platform and the
/// published create time.
///
/// The id stays textual so that a malformed one can be reported instead of
/// rejected at load time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleRecord {
    pub aweme_id: String,
    pub source: Source,
    /// Ground-truth Unix timestamp in seconds.
    pub create_time: Option<i64>,
    /// Display only.
    #[cfg_attr(feature = "serde", serde(default))]
    pub create_datetime: Option<String>,
}

impl SampleRecord {
    pub fn new(aweme_id: impl Into<String>, source: Source, create_time: i64) -> Self {
        Self {
            aweme_id: aweme_id.into(),
            source,
            create_time: Some(create_time),
            create_datetime: None,
        }
    }

    pub fn with_datetime(mut self, datetime: impl Into<String>) -> Self {
        self.create_datetime = Some(datetime.into());
        self
    }

    /// Parses the textual id.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] naming the id if it is not a valid unsigned
    /// 64-bit decimal.
    pub fn id(&self) -> Result<AwemeId, ValueError> {
        self.aweme_id.parse()
    }
}
