//! Concrete wire dialects.

pub mod helpers;
pub mod json_call;
pub mod morph;
pub mod strict;

pub use json_call::JsonCallFormat;
pub use morph::MorphTagFormat;
pub use strict::StrictTagFormat;
