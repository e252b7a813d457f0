use super::{FieldSpec, RESIDUAL_BITS, Scheme};
use crate::SchemeError;

/// A scheme described entirely by `'static` data.
///
/// Built-in schemes are declared with [`define_scheme!`], which checks the
/// layout at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemeDef {
    pub name: &'static str,
    pub fields: &'static [(&'static str, u8)],
    pub shard: Option<&'static str>,
    pub sequence: Option<&'static str>,
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

impl SchemeDef {
    const fn has_field(&self, name: &str) -> bool {
        let mut i = 0;
        while i < self.fields.len() {
            if str_eq(self.fields[i].0, name) {
                return true;
            }
            i += 1;
        }
        false
    }

    /// Mirrors the runtime checks of [`Scheme::new`] so that built-ins can be
    /// verified in a `const` context.
    pub const fn is_well_formed(&self) -> bool {
        if self.fields.is_empty() {
            return false;
        }
        let mut total = 0u32;
        let mut i = 0;
        while i < self.fields.len() {
            let width = self.fields[i].1;
            if width == 0 || width as u32 > RESIDUAL_BITS {
                return false;
            }
            let mut j = 0;
            while j < i {
                if str_eq(self.fields[i].0, self.fields[j].0) {
                    return false;
                }
                j += 1;
            }
            total += width as u32;
            i += 1;
        }
        if total != RESIDUAL_BITS {
            return false;
        }
        if let Some(shard) = self.shard {
            if !self.has_field(shard) {
                return false;
            }
        }
        if let Some(sequence) = self.sequence {
            if !self.has_field(sequence) {
                return false;
            }
        }
        true
    }
}

impl TryFrom<&SchemeDef> for Scheme {
    type Error = SchemeError;

    /// Runs the same checks as [`Scheme::new`], so a hand-built definition
    /// that bypassed [`define_scheme!`] is rejected rather than trusted.
    fn try_from(def: &SchemeDef) -> Result<Self, Self::Error> {
        let mut scheme = Self::new(def.name, def.fields.iter().copied())?;
        if let Some(shard) = def.shard {
            scheme = scheme.with_shard(shard)?;
        }
        if let Some(sequence) = def.sequence {
            scheme = scheme.with_sequence(sequence)?;
        }
        Ok(scheme)
    }
}

/// Conversion for the built-ins only, whose layouts [`define_scheme!`] has
/// already verified at compile time.
fn from_builtin(def: &SchemeDef) -> Scheme {
    let position =
        |field: Option<&str>| field.and_then(|name| def.fields.iter().position(|(f, _)| *f == name));
    Scheme {
        name: def.name.to_owned(),
        fields: def
            .fields
            .iter()
            .map(|&(name, width)| FieldSpec {
                name: name.to_owned(),
                width,
            })
            .collect(),
        shard: position(def.shard),
        sequence: position(def.sequence),
    }
}

/// Declares a `'static` [`SchemeDef`] whose layout is verified at compile
/// time.
///
/// All 32 residual bits must be accounted for and any designated shard or
/// sequence field must exist; otherwise a compile-time assertion fails.
///
/// ## Example
///
/// ```
/// use aweme_id::{Scheme, define_scheme};
///
/// define_scheme!(
///     /// Two halves, the upper one treated as a shard.
///     HALVES = "halves" {
///         upper: 16,
///         lower: 16,
///     },
///     shard: "upper"
/// );
///
/// let scheme = Scheme::try_from(&HALVES).unwrap();
/// assert_eq!(scheme.label(), "16+16");
/// assert_eq!(scheme.shard_field(), Some("upper"));
/// ```
#[macro_export]
macro_rules! define_scheme {
    (@opt) => { None };
    (@opt $value:literal) => { Some($value) };
    (
        $(#[$meta:meta])*
        $const_name:ident = $name:literal {
            $($field:ident : $width:expr),+ $(,)?
        }
        $(, shard: $shard:literal)?
        $(, sequence: $sequence:literal)?
    ) => {
        $(#[$meta])*
        pub const $const_name: $crate::SchemeDef = $crate::SchemeDef {
            name: $name,
            fields: &[$((stringify!($field), $width)),+],
            shard: $crate::define_scheme!(@opt $($shard)?),
            sequence: $crate::define_scheme!(@opt $($sequence)?),
        };

        const _: () = {
            // Compile-time check: the fields _must_ partition all 32 residual
            // bits and every role must name a declared field.
            assert!(
                $const_name.is_well_formed(),
                "scheme layout does not partition the 32 residual bits"
            );
        };
    };
}

define_scheme!(
    /// Standard Snowflake split: 10 bits datacenter, 10 bits worker, 12 bits
    /// sequence.
    SNOWFLAKE_10_10_12 = "snowflake_10_10_12" {
        datacenter_id: 10,
        worker_id: 10,
        sequence: 12,
    },
    shard: "worker_id",
    sequence: "sequence"
);

define_scheme!(
    /// Modified Snowflake split with a wider sequence.
    MODIFIED_8_8_16 = "modified_8_8_16" {
        datacenter_id: 8,
        worker_id: 8,
        sequence: 16,
    },
    shard: "worker_id",
    sequence: "sequence"
);

define_scheme!(
    /// Upper half shard, lower half sequence.
    SIMPLIFIED_16_16 = "simplified_16_16" {
        shard_id: 16,
        sequence: 16,
    },
    shard: "shard_id",
    sequence: "sequence"
);

define_scheme!(
    /// Plain bytes, most significant first.
    BYTES_8_8_8_8 = "bytes_8_8_8_8" {
        byte3: 8,
        byte2: 8,
        byte1: 8,
        byte0: 8,
    }
);

/// The built-in schemes, in catalog order.
pub const BUILTIN_SCHEMES: [SchemeDef; 4] = [
    SNOWFLAKE_10_10_12,
    MODIFIED_8_8_16,
    SIMPLIFIED_16_16,
    BYTES_8_8_8_8,
];

/// Name of the scheme used when the caller does not pick one.
pub const DEFAULT_SCHEME: &str = SIMPLIFIED_16_16.name;

/// An ordered, name-addressed set of schemes.
///
/// The catalog always contains the built-ins; more can be registered but none
/// can be removed, so the default scheme is always available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeCatalog {
    schemes: Vec<Scheme>,
}

impl Default for SchemeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemeCatalog {
    pub fn builtin() -> Self {
        Self {
            schemes: BUILTIN_SCHEMES.iter().map(from_builtin).collect(),
        }
    }

    /// Adds a scheme after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::AlreadyRegistered`] if a scheme with the same
    /// name exists.
    pub fn register(&mut self, scheme: Scheme) -> Result<(), SchemeError> {
        if self.schemes.iter().any(|s| s.name() == scheme.name()) {
            return Err(SchemeError::AlreadyRegistered {
                scheme: scheme.name().to_owned(),
            });
        }
        self.schemes.push(scheme);
        Ok(())
    }

    /// Looks a scheme up by name, or by its width label (e.g. `16+16`).
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::UnknownScheme`] if nothing matches.
    pub fn get(&self, key: &str) -> Result<&Scheme, SchemeError> {
        self.schemes
            .iter()
            .find(|s| s.name() == key)
            .or_else(|| self.schemes.iter().find(|s| s.label() == key))
            .ok_or_else(|| SchemeError::UnknownScheme {
                scheme: key.to_owned(),
            })
    }

    /// The 16+16 scheme.
    pub fn default_scheme(&self) -> &Scheme {
        // Built-ins are registered first and can never be removed.
        let index = BUILTIN_SCHEMES
            .iter()
            .position(|def| def.name == DEFAULT_SCHEME)
            .unwrap_or(0);
        &self.schemes[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scheme> {
        self.schemes.iter()
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Describes `residual` under every scheme in catalog order.
    pub fn analyze_all(&self, residual: u32) -> Vec<super::SchemeBreakdown> {
        self.schemes.iter().map(|s| s.analyze(residual)).collect()
    }
}

impl<'a> IntoIterator for &'a SchemeCatalog {
    type Item = &'a Scheme;
    type IntoIter = core::slice::Iter<'a, Scheme>;

    fn into_iter(self) -> Self::IntoIter {
        self.schemes.iter()
    }
}
