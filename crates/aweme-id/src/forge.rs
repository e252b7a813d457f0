//! Synthetic id construction for tests and fixtures.
//!
//! Forged ids have the right shape but were never issued by either
//! platform; they must not be passed off as real.

use crate::{AwemeId, ValueError};
use rand::Rng;

/// Packs a timestamp and residual into an id.
///
/// The inputs are taken as `u64` so that out-of-range values coming from
/// wider sources are reported rather than truncated. Use
/// [`AwemeId::from_parts`] when the halves are already `u32`.
///
/// # Errors
///
/// Returns [`ValueError::FieldOverflow`] naming `timestamp_seconds` or
/// `residual` if either does not fit in 32 bits.
///
/// # Example
///
/// ```
/// use aweme_id::{decode, forge};
///
/// let id = forge(1_711_494_056, 0x0c40_8d1f).unwrap();
/// assert_eq!(id.to_raw(), 7350810998023949599);
///
/// let record = decode(id.to_raw());
/// assert_eq!(record.timestamp_seconds(), 1_711_494_056);
/// assert!(forge(1 << 32, 0).is_err());
/// ```
pub fn forge(timestamp_seconds: u64, residual: u64) -> Result<AwemeId, ValueError> {
    let timestamp = narrow("timestamp_seconds", timestamp_seconds)?;
    let residual = narrow("residual", residual)?;
    Ok(AwemeId::from_parts(timestamp, residual))
}

/// Forges an id for `timestamp_seconds` with a random residual.
pub fn forge_random<R: Rng>(timestamp_seconds: u32, rng: &mut R) -> AwemeId {
    AwemeId::from_parts(timestamp_seconds, rng.random())
}

fn narrow(field: &'static str, value: u64) -> Result<u32, ValueError> {
    u32::try_from(value).map_err(|_| ValueError::FieldOverflow { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn rejects_out_of_range_fields() {
        assert_eq!(
            forge(u64::from(u32::MAX) + 1, 0),
            Err(ValueError::FieldOverflow {
                field: "timestamp_seconds",
                value: 1 << 32
            })
        );
        assert_eq!(
            forge(0, u64::MAX),
            Err(ValueError::FieldOverflow {
                field: "residual",
                value: u64::MAX
            })
        );
    }

    #[test]
    fn accepts_bounds() {
        let max = u64::from(u32::MAX);
        assert_eq!(forge(max, max).unwrap().to_raw(), u64::MAX);
        assert_eq!(forge(0, 0).unwrap().to_raw(), 0);
    }

    #[test]
    fn random_residual_keeps_timestamp() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = forge_random(1_760_126_310, &mut rng);
        let b = forge_random(1_760_126_310, &mut rng);
        assert_eq!(a.timestamp(), 1_760_126_310);
        assert_eq!(b.timestamp(), 1_760_126_310);
        assert_ne!(a.residual(), b.residual());

        let mut again = StdRng::seed_from_u64(7);
        assert_eq!(forge_random(1_760_126_310, &mut again), a);
    }

    proptest! {
        #[test]
        fn decode_inverts_forge(t in any::<u32>(), r in any::<u32>()) {
            let id = forge(u64::from(t), u64::from(r)).unwrap();
            let record = decode(id.to_raw());
            prop_assert_eq!(record.timestamp_seconds(), t);
            prop_assert_eq!(record.residual(), r);
            prop_assert_eq!(id, AwemeId::from_parts(t, r));
        }
    }
}
