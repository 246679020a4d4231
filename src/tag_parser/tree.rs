use std::collections::HashMap;
use std::ops::Range;

use crate::errors::{ParserError, ParserResult};

use super::tokenizer::{SpannedToken, Token};

/// Guard against pathological nesting.
pub const MAX_DEPTH: usize = 32;

/// How the builder treats markup the grammar does not account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Mismatched closers or an open stack at end of input are structural
    /// failures.
    Strict,
    /// Missing and mismatched closers are repaired: a closer matching any
    /// open ancestor implicitly closes everything above it, a repeated start
    /// tag implicitly closes its open same-name ancestor, stray closers are
    /// dropped, and end of input closes whatever is left, innermost first.
    Recover,
}

/// An element assembled from scanner tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag_name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<NodeContent>,
    /// True when the element was closed by its own matching close tag;
    /// false when the close was implied by recovery or end of input.
    pub closed: bool,
    /// Byte span of the whole element in the scanned input.
    pub span: Range<usize>,
    /// Byte span of the content between the start and close tags.
    pub inner_span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Element(Node),
    Text(String),
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the space-separated `class` attribute contains `class_name`.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }

    /// Concatenated text content of the subtree, in document order.
    pub fn text_content(&self) -> String {
        fn walk(children: &[NodeContent], out: &mut String) {
            for child in children {
                match child {
                    NodeContent::Text(t) => out.push_str(t),
                    NodeContent::Element(el) => walk(&el.children, out),
                }
            }
        }
        let mut out = String::new();
        walk(&self.children, &mut out);
        out
    }
}

/// Predicate for [`StreamQuery`](super::stream_query::StreamQuery) matching.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePredicate {
    /// `id` attribute equality.
    Id(String),
    /// Token membership in the space-separated `class` attribute.
    Class(String),
}

impl NodePredicate {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            NodePredicate::Id(id) => node.attr("id") == Some(id.as_str()),
            NodePredicate::Class(class) => node.has_class(class),
        }
    }
}

/// Assembles scanner tokens into a node tree with an explicit open-element
/// stack. An optional watcher predicate collects matching subtrees the moment
/// they close, which is what makes lazy stream queries possible.
pub struct TreeBuilder {
    mode: ScanMode,
    stack: Vec<Node>,
    roots: Vec<NodeContent>,
    watcher: Option<NodePredicate>,
    matches: Vec<Node>,
}

impl TreeBuilder {
    pub fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            stack: Vec::new(),
            roots: Vec::new(),
            watcher: None,
            matches: Vec::new(),
        }
    }

    pub fn with_watcher(mode: ScanMode, predicate: NodePredicate) -> Self {
        let mut builder = Self::new(mode);
        builder.watcher = Some(predicate);
        builder
    }

    /// Subtrees that matched the watcher since the last drain, in the order
    /// they closed.
    pub fn drain_matches(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.matches)
    }

    pub fn push_token(&mut self, token: SpannedToken) -> ParserResult<()> {
        let span = token.span;
        match token.token {
            Token::Text(text) => {
                self.append_text(text);
                Ok(())
            }
            Token::TagOpen { name, attributes } => {
                if self.mode == ScanMode::Recover {
                    // Sibling-implies-close: a repeated start tag for an open
                    // ancestor closes it just before the new start tag.
                    if let Some(idx) = self.stack.iter().rposition(|n| n.tag_name == name) {
                        while self.stack.len() > idx {
                            self.close_top(span.start, span.start, false);
                        }
                    }
                }
                if self.stack.len() >= MAX_DEPTH {
                    return Err(ParserError::DepthExceeded(MAX_DEPTH));
                }
                self.stack.push(Node {
                    tag_name: name,
                    attributes: attributes.into_iter().collect(),
                    children: Vec::new(),
                    closed: false,
                    span: span.start..span.end,
                    inner_span: span.end..span.end,
                });
                Ok(())
            }
            Token::TagClose { name } => match self.mode {
                ScanMode::Strict => {
                    let matches_top = self
                        .stack
                        .last()
                        .map(|top| top.tag_name == name)
                        .unwrap_or(false);
                    if !matches_top {
                        return Err(ParserError::Structural(format!(
                            "unexpected close tag </{}>",
                            name
                        )));
                    }
                    self.close_top(span.start, span.end, true);
                    Ok(())
                }
                ScanMode::Recover => {
                    if let Some(idx) = self.stack.iter().rposition(|n| n.tag_name == name) {
                        while self.stack.len() > idx + 1 {
                            self.close_top(span.start, span.start, false);
                        }
                        self.close_top(span.start, span.end, true);
                    } else {
                        tracing::debug!(tag = %name, "dropping close tag with no open element");
                    }
                    Ok(())
                }
            },
        }
    }

    /// Finalize at total input length `end`, returning the root content list.
    pub fn finish(&mut self, end: usize) -> ParserResult<Vec<NodeContent>> {
        if !self.stack.is_empty() {
            match self.mode {
                ScanMode::Strict => {
                    let open = self.stack.last().map(|n| n.tag_name.clone()).unwrap_or_default();
                    return Err(ParserError::Structural(format!(
                        "unclosed tag <{}> at end of input",
                        open
                    )));
                }
                ScanMode::Recover => {
                    while !self.stack.is_empty() {
                        self.close_top(end, end, false);
                    }
                }
            }
        }
        Ok(std::mem::take(&mut self.roots))
    }

    fn append_text(&mut self, text: String) {
        let children = match self.stack.last_mut() {
            Some(top) => &mut top.children,
            None => &mut self.roots,
        };
        // Adjacent text runs coalesce; chunk boundaries carry no meaning.
        if let Some(NodeContent::Text(prev)) = children.last_mut() {
            prev.push_str(&text);
        } else {
            children.push(NodeContent::Text(text));
        }
    }

    fn close_top(&mut self, inner_end: usize, outer_end: usize, explicit: bool) {
        let mut node = match self.stack.pop() {
            Some(node) => node,
            None => return,
        };
        node.inner_span.end = inner_end.max(node.inner_span.start);
        node.span.end = outer_end.max(node.span.start);
        node.closed = explicit;
        if let Some(watcher) = &self.watcher {
            if watcher.matches(&node) {
                self.matches.push(node.clone());
            }
        }
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(NodeContent::Element(node)),
            None => self.roots.push(NodeContent::Element(node)),
        }
    }
}

/// Materializing parse of a complete text.
pub fn parse_document(text: &str, mode: ScanMode) -> ParserResult<Vec<NodeContent>> {
    let mut tokenizer = super::tokenizer::Tokenizer::new();
    let mut builder = TreeBuilder::new(mode);
    for token in tokenizer.push(text) {
        builder.push_token(token)?;
    }
    for token in tokenizer.finish() {
        builder.push_token(token)?;
    }
    builder.finish(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(content: &NodeContent) -> &Node {
        match content {
            NodeContent::Element(node) => node,
            NodeContent::Text(t) => panic!("expected element, got text {:?}", t),
        }
    }

    #[test]
    fn test_materializing_parse() {
        let roots = parse_document("a<x><y>inner</y></x>b", ScanMode::Strict).unwrap();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0], NodeContent::Text("a".into()));
        let x = element(&roots[1]);
        assert_eq!(x.tag_name, "x");
        assert!(x.closed);
        assert_eq!(x.span, 1..20);
        assert_eq!(x.inner_span, 4..16);
        let y = element(&x.children[0]);
        assert_eq!(y.text_content(), "inner");
    }

    #[test]
    fn test_strict_rejects_mismatched_close() {
        let err = parse_document("<x><y>v</x>", ScanMode::Strict).unwrap_err();
        assert!(matches!(err, ParserError::Structural(_)));
    }

    #[test]
    fn test_strict_rejects_unclosed_at_end() {
        let err = parse_document("<x>v", ScanMode::Strict).unwrap_err();
        assert!(matches!(err, ParserError::Structural(_)));
    }

    #[test]
    fn test_recovery_closes_ancestors() {
        // </x> implicitly closes <y> first.
        let roots = parse_document("<x><y>v</x>", ScanMode::Recover).unwrap();
        let x = element(&roots[0]);
        assert!(x.closed);
        let y = element(&x.children[0]);
        assert_eq!(y.tag_name, "y");
        assert!(!y.closed);
        assert_eq!(y.text_content(), "v");
    }

    #[test]
    fn test_recovery_drops_stray_close() {
        let roots = parse_document("a</nope>b", ScanMode::Recover).unwrap();
        assert_eq!(roots, vec![NodeContent::Text("ab".into())]);
    }

    #[test]
    fn test_recovery_sibling_implies_close() {
        let roots = parse_document("<x>1<x>2</x>", ScanMode::Recover).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(element(&roots[0]).text_content(), "1");
        assert_eq!(element(&roots[1]).text_content(), "2");
        assert!(!element(&roots[0]).closed);
        assert!(element(&roots[1]).closed);
    }

    #[test]
    fn test_recovery_auto_close_at_end() {
        let roots = parse_document("<x><y>v", ScanMode::Recover).unwrap();
        let x = element(&roots[0]);
        assert!(!x.closed);
        assert_eq!(x.text_content(), "v");
    }

    #[test]
    fn test_class_matching() {
        let roots =
            parse_document("<d class=\"secondary primary\"></d>", ScanMode::Strict).unwrap();
        let d = element(&roots[0]);
        assert!(d.has_class("primary"));
        assert!(d.has_class("secondary"));
        assert!(!d.has_class("prim"));
    }
}
