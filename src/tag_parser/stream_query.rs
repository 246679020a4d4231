use super::tokenizer::Tokenizer;
use super::tree::{Node, NodePredicate, ScanMode, TreeBuilder};

/// Lazy, restartable query over a live tag stream.
///
/// Feed chunks of arbitrary size; each matching subtree is yielded the
/// moment its element closes, without materializing the rest of the
/// document and without ever backtracking into a yielded subtree. Results
/// are identical for any chunking of the same total text.
///
/// ```
/// use tool_call_middleware::tag_parser::StreamQuery;
///
/// let mut query = StreamQuery::by_id("beta");
/// let mut found = query.push("<tools><x id=\"beta\">v</x>");
/// found.extend(query.finish());
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].text_content(), "v");
/// ```
pub struct StreamQuery {
    tokenizer: Tokenizer,
    builder: TreeBuilder,
}

impl StreamQuery {
    /// Match elements whose `id` attribute equals `id`.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::with_predicate(NodePredicate::Id(id.into()))
    }

    /// Match elements whose `class` attribute contains `class_name` among
    /// its space-separated values.
    pub fn by_class(class_name: impl Into<String>) -> Self {
        Self::with_predicate(NodePredicate::Class(class_name.into()))
    }

    pub fn with_predicate(predicate: NodePredicate) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            builder: TreeBuilder::with_watcher(ScanMode::Recover, predicate),
        }
    }

    /// Feed the next chunk; returns matches fully closed by it, in document
    /// order.
    pub fn push(&mut self, chunk: &str) -> Vec<Node> {
        for token in self.tokenizer.push(chunk) {
            if let Err(error) = self.builder.push_token(token) {
                tracing::warn!(%error, "stream query skipped unbuildable markup");
            }
        }
        self.builder.drain_matches()
    }

    /// Signal end of input; matches among implicitly closed elements are
    /// yielded last.
    pub fn finish(mut self) -> Vec<Node> {
        for token in self.tokenizer.finish() {
            if let Err(error) = self.builder.push_token(token) {
                tracing::warn!(%error, "stream query skipped unbuildable markup");
            }
        }
        let end = self.tokenizer.total_fed();
        let _ = self.builder.finish(end);
        self.builder.drain_matches()
    }
}
