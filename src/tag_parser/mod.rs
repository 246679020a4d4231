//! Incremental tag scanning, tree assembly, lazy stream queries, and
//! schema-guided argument extraction.

pub mod extractor;
pub mod stream_query;
pub mod tokenizer;
pub mod tree;

pub use extractor::{extract_arguments, Extraction};
pub use stream_query::StreamQuery;
pub use tokenizer::{safe_flush_index, tokenize, SpannedToken, Token, Tokenizer};
pub use tree::{parse_document, Node, NodeContent, NodePredicate, ScanMode, TreeBuilder, MAX_DEPTH};
