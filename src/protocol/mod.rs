//! Wire dialects for tool calling: shared types, the dialect trait, the
//! built-in dialects, and a registry to pick one by name.

pub mod factory;
pub mod formats;
pub mod traits;
pub mod types;

pub use factory::{FormatFactory, FormatRegistry};
pub use formats::{JsonCallFormat, MorphTagFormat, StrictTagFormat};
pub use traits::ToolCallFormat;
pub use types::{
    Arguments, ContentPart, ParseOptions, ParsedPart, Tool, ToolCallRequest, ToolResponse,
};
