//! Stylesheet token tree.
//!
//! `cssparser` tokenizes (and drops comments); we fold its nested blocks
//! into a small tagged tree and walk it depth-first for references.

use cssparser::{ParseError, Parser, ParserInput, Token};

/// Functions whose quoted-string arguments are resource references.
const URL_FUNCTIONS: &[&str] = &["url", "src", "image-set", "-webkit-image-set"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssNode {
    /// `url(foo.png)` without quotes.
    Url(String),
    /// A quoted string.
    Str(String),
    /// `@import`, `@font-face`, `@media`, ...
    AtKeyword(String),
    Function { name: String, args: Vec<CssNode> },
    /// `{...}`, `(...)` or `[...]`.
    Block(Vec<CssNode>),
    Other,
}

/// Tokenize a stylesheet or an inline declaration list.
pub fn parse_css(text: &str) -> Vec<CssNode> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    read_nodes(&mut parser)
}

fn read_nodes<'i>(parser: &mut Parser<'i, '_>) -> Vec<CssNode> {
    let mut nodes = Vec::new();
    loop {
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let node = match token {
            Token::UnquotedUrl(url) => CssNode::Url(url.to_string()),
            Token::QuotedString(s) => CssNode::Str(s.to_string()),
            Token::AtKeyword(keyword) => CssNode::AtKeyword(keyword.to_string()),
            Token::Function(name) => CssNode::Function {
                name: name.to_string(),
                args: read_nested(parser),
            },
            Token::CurlyBracketBlock | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                CssNode::Block(read_nested(parser))
            }
            _ => CssNode::Other,
        };
        nodes.push(node);
    }
    nodes
}

fn read_nested<'i>(parser: &mut Parser<'i, '_>) -> Vec<CssNode> {
    parser
        .parse_nested_block(|inner| Ok::<_, ParseError<'i, ()>>(read_nodes(inner)))
        .unwrap_or_default()
}

/// Every reference in the tree: `url()` arguments at any depth, quoted
/// `@import` targets, and strings inside url-like functions.
pub fn css_references(nodes: &[CssNode]) -> Vec<String> {
    let mut out = Vec::new();
    collect(nodes, false, &mut out);
    out
}

fn collect(nodes: &[CssNode], in_url_function: bool, out: &mut Vec<String>) {
    let mut after_import = false;
    for node in nodes {
        match node {
            CssNode::Url(url) => out.push(url.clone()),
            CssNode::Str(s) if after_import || in_url_function => out.push(s.clone()),
            CssNode::Function { name, args } => {
                let url_like = URL_FUNCTIONS.iter().any(|f| name.eq_ignore_ascii_case(f));
                collect(args, url_like, out);
            }
            CssNode::Block(children) => collect(children, false, out),
            _ => {}
        }
        after_import = matches!(node, CssNode::AtKeyword(k) if k.eq_ignore_ascii_case("import"));
    }
}
