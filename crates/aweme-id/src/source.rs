use core::fmt;
use core::str::FromStr;

/// The platform that issued an id.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    Douyin,
    TikTok,
}

impl Source {
    pub const ALL: [Self; 2] = [Self::Douyin, Self::TikTok];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Douyin => "Douyin",
            Self::TikTok => "TikTok",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform label that is neither Douyin nor TikTok.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown source {0:?}, expected Douyin or TikTok")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    /// Case-insensitive; also accepts the platforms' usual aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "douyin" | "dy" => Ok(Self::Douyin),
            "tiktok" | "tt" => Ok(Self::TikTok),
            _ => Err(UnknownSource(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        assert_eq!("Douyin".parse(), Ok(Source::Douyin));
        assert_eq!(" tiktok ".parse(), Ok(Source::TikTok));
        assert_eq!("TT".parse(), Ok(Source::TikTok));
        assert_eq!(
            "Kuaishou".parse::<Source>(),
            Err(UnknownSource("Kuaishou".into()))
        );
        assert_eq!(Source::TikTok.to_string(), "TikTok");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_label() {
        assert_eq!(serde_json::to_string(&Source::Douyin).unwrap(), r#""Douyin""#);
        let source: Source = serde_json::from_str(r#""TikTok""#).unwrap();
        assert_eq!(source, Source::TikTok);
    }
}
