//! Owned XML tree with stable node ids.
//!
//! Nodes live in an arena and never move; removing an element only drops
//! its id from the parent's child list, so every other id stays valid and
//! nothing needs re-indexing. Events the tree does not interpret (text,
//! comments, declarations, entity references) are kept verbatim so that
//! unrelated structure round-trips.

use anyhow::{Result, bail};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

pub type NodeId = usize;

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element { start: BytesStart<'static>, empty: bool },
    Leaf(Event<'static>),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
}

/// Strip a namespace prefix: `opf:item` -> `item`.
fn local(name: &[u8]) -> &[u8] {
    name.iter()
        .position(|&b| b == b':')
        .map_or(name, |i| &name[i + 1..])
}

impl XmlTree {
    pub const ROOT: NodeId = 0;

    pub fn parse(content: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(content);
        let mut tree = XmlTree {
            nodes: vec![Node {
                kind: NodeKind::Document,
                children: Vec::new(),
            }],
        };
        let mut stack = vec![Self::ROOT];

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => bail!("XML parse error at position {}: {}", reader.error_position(), e),
            };
            let parent = *stack.last().unwrap_or(&Self::ROOT);
            match event {
                Event::Start(start) => {
                    let id = tree.push(parent, NodeKind::Element {
                        start: start.into_owned(),
                        empty: false,
                    });
                    stack.push(id);
                }
                Event::Empty(start) => {
                    tree.push(parent, NodeKind::Element {
                        start: start.into_owned(),
                        empty: true,
                    });
                }
                Event::End(_) => {
                    if stack.len() <= 1 {
                        bail!("unbalanced closing tag at position {}", reader.buffer_position());
                    }
                    stack.pop();
                }
                Event::Eof => break,
                other => {
                    tree.push(parent, NodeKind::Leaf(other.into_owned()));
                }
            }
        }

        if stack.len() != 1 {
            bail!("unclosed element at end of document");
        }
        Ok(tree)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Local element name, `None` for non-element nodes.
    pub fn local_name(&self, id: NodeId) -> Option<&[u8]> {
        match &self.nodes[id].kind {
            NodeKind::Element { start, .. } => Some(local(start.name().into_inner())),
            _ => None,
        }
    }

    /// Attribute value matched by local name, entity-decoded.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        let NodeKind::Element { start, .. } = &self.nodes[id].kind else {
            return None;
        };
        start.attributes().flatten().find_map(|attr| {
            if local(attr.key.as_ref()) != name.as_bytes() {
                return None;
            }
            let raw = std::str::from_utf8(&attr.value).ok()?;
            Some(
                quick_xml::escape::unescape(raw)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| raw.to_string()),
            )
        })
    }

    /// Element children of `id` with the given local name.
    pub fn child_elements<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.local_name(c) == Some(name.as_bytes()))
    }

    /// Depth-first search for the first element with the given local name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            if self.local_name(id) == Some(name.as_bytes()) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        None
    }

    /// Detach `child` from `parent`, along with the whitespace text that
    /// indented it. Returns false when `child` is not a child of `parent`.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(pos) = self.nodes[parent].children.iter().position(|&c| c == child) else {
            return false;
        };
        self.nodes[parent].children.remove(pos);

        if pos > 0 {
            let before = self.nodes[parent].children[pos - 1];
            if self.is_whitespace(before) {
                self.nodes[parent].children.remove(pos - 1);
            }
        }
        true
    }

    fn is_whitespace(&self, id: NodeId) -> bool {
        match &self.nodes[id].kind {
            NodeKind::Leaf(Event::Text(text)) => text.iter().all(u8::is_ascii_whitespace),
            _ => false,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        self.write_node(Self::ROOT, &mut writer)?;
        Ok(writer.into_inner())
    }

    fn write_node(&self, id: NodeId, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.write_node(child, writer)?;
                }
            }
            NodeKind::Element { start, empty } if *empty && node.children.is_empty() => {
                writer.write_event(Event::Empty(start.borrow()))?;
            }
            NodeKind::Element { start, .. } => {
                writer.write_event(Event::Start(start.borrow()))?;
                for &child in &node.children {
                    self.write_node(child, writer)?;
                }
                let name = String::from_utf8_lossy(start.name().into_inner()).into_owned();
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            NodeKind::Leaf(event) => writer.write_event(event.borrow())?,
        }
        Ok(())
    }
}
