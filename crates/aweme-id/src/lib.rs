mod calibrate;
mod decode;
mod error;
mod forge;
mod id;
mod pattern;
mod sample;
mod scheme;
mod source;
mod validate;

pub use crate::calibrate::*;
pub use crate::decode::*;
pub use crate::error::*;
pub use crate::forge::*;
pub use crate::id::*;
pub use crate::pattern::*;
pub use crate::sample::*;
pub use crate::scheme::*;
pub use crate::source::*;
pub use crate::validate::*;
