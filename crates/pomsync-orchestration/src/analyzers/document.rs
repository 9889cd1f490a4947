//! Lossless, path-addressed XML documents
//!
//! The document model keeps every piece of markup it does not understand as
//! raw text: whitespace, comments, processing instructions, CDATA sections and
//! the doctype are sibling nodes of the elements around them, and each element
//! remembers its start and end tag verbatim. Re-emitting an untouched document
//! therefore reproduces the input byte for byte, and an edit only rewrites the
//! content of the element it addresses.
//!
//! Paths are slash separated element names. The first segment names the root
//! element and every further segment selects the first child with that name,
//! e.g. `project/parent/version`.

use std::path::PathBuf;

use crate::analyzers::encoding::{self, Encoding};
use crate::error::{PomSyncError, Result};

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data exactly as written, entities still escaped
    Text(String),
    /// A CDATA section including its `<![CDATA[` and `]]>` markers
    CData(String),
    /// Comments, processing instructions and doctype declarations
    Markup(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_to(out),
            Node::Text(raw) | Node::CData(raw) | Node::Markup(raw) => out.push_str(raw),
        }
    }
}

/// An element with its raw tags and child nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    start_tag: String,
    /// `None` for self-closing elements such as `<version/>`
    end_tag: Option<String>,
    children: Vec<Node>,
}

impl Element {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start_tag: format!("<{}>", name),
            end_tag: Some(format!("</{}>", name)),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All child nodes, including whitespace, comments and CDATA sections
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Mutable child elements in document order
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// First child element called `name`, for editing
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Follows a relative path of child names, e.g. `dependencies/dependency`
    pub fn descendant(&self, path: &str) -> Option<&Element> {
        segments(path).try_fold(self, |current, segment| current.child(segment))
    }

    /// Mutable counterpart of [`Element::descendant`]
    pub fn descendant_mut(&mut self, path: &str) -> Option<&mut Element> {
        segments(path).try_fold(self, |current, segment| current.child_mut(segment))
    }

    /// Decoded character data of this element, ignoring nested elements
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(raw) => text.push_str(&unescape(raw)),
                Node::CData(raw) => text.push_str(cdata_content(raw)),
                _ => {}
            }
        }
        text
    }

    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }

    /// Replaces the whole content of this element with `text`
    pub fn set_text(&mut self, text: &str) {
        self.open_up();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(escape(text)));
        }
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.name == name))
    }

    /// Turns `<x/>` into `<x></x>` so that it can hold content
    fn open_up(&mut self) {
        if self.end_tag.is_none() {
            let head = self
                .start_tag
                .strip_suffix("/>")
                .unwrap_or(&self.start_tag)
                .trim_end();
            self.start_tag = format!("{}>", head);
            self.end_tag = Some(format!("</{}>", self.name));
        }
    }

    /// Appends a new empty child element after the last existing element child,
    /// indented like its siblings. Returns the index of the new node.
    fn append_element(&mut self, name: &str, own_indent: &str, layout: &Layout) -> usize {
        self.open_up();

        if let Some(last) = self.children.iter().rposition(|n| n.as_element().is_some()) {
            let indent = last
                .checked_sub(1)
                .and_then(|i| match &self.children[i] {
                    Node::Text(raw) => line_indent(raw),
                    _ => None,
                })
                .map(|indent| format!("{}{}", layout.newline, indent))
                .unwrap_or_else(|| format!("{}{}{}", layout.newline, own_indent, layout.unit));
            self.children.insert(last + 1, Node::Text(indent));
            self.children.insert(last + 2, Node::Element(Element::empty(name)));
            return last + 2;
        }

        let child_indent = format!("{}{}{}", layout.newline, own_indent, layout.unit);
        if self.children.iter().all(Node::is_blank_text) {
            self.children = vec![
                Node::Text(child_indent),
                Node::Element(Element::empty(name)),
                Node::Text(format!("{}{}", layout.newline, own_indent)),
            ];
            1
        } else {
            self.children.push(Node::Text(child_indent));
            self.children.push(Node::Element(Element::empty(name)));
            self.children.len() - 1
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.start_tag);
        for child in &self.children {
            child.write_to(out);
        }
        if let Some(end_tag) = &self.end_tag {
            out.push_str(end_tag);
        }
    }
}

/// Whitespace conventions used when new elements have to be created
#[derive(Debug, Clone)]
struct Layout {
    newline: &'static str,
    unit: String,
}

/// A parsed descriptor document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
    encoding: Encoding,
    bom: bool,
}

impl XmlDocument {
    /// Parses a document from text
    pub fn parse(source: &str) -> Result<Self> {
        let (prolog, root, epilog) = Parser::new(source).parse()?;
        Ok(Self {
            prolog,
            root,
            epilog,
            encoding: Encoding::Utf8,
            bom: false,
        })
    }

    /// Decodes and parses raw descriptor bytes
    ///
    /// An encoding declared in the XML prologue takes precedence over
    /// `default_encoding`.
    pub fn from_bytes(bytes: &[u8], default_encoding: Encoding) -> Result<Self> {
        let sniffed = encoding::sniff(bytes);
        let encoding = match &sniffed.declared {
            Some(label) => Encoding::from_label(label).ok_or_else(|| {
                PomSyncError::unreadable("", format!("unsupported encoding {}", label))
            })?,
            None if sniffed.bom => Encoding::Utf8,
            None => default_encoding,
        };
        let text = encoding
            .decode(sniffed.body)
            .map_err(|reason| PomSyncError::unreadable("", reason))?;

        let mut document = Self::parse(&text)?;
        document.encoding = encoding;
        document.bom = sniffed.bom;
        Ok(document)
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Element addressed by an absolute path such as `project/parent`
    pub fn element(&self, path: &str) -> Option<&Element> {
        let mut segments = segments(path);
        if segments.next()? != self.root.name {
            return None;
        }
        segments.try_fold(&self.root, |current, segment| current.child(segment))
    }

    /// Mutable counterpart of [`XmlDocument::element`]
    pub fn element_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut segments = segments(path);
        if segments.next()? != self.root.name {
            return None;
        }
        segments.try_fold(&mut self.root, |current, segment| current.child_mut(segment))
    }

    /// Trimmed text of the addressed element, or `None` if it does not exist
    pub fn read_text(&self, path: &str) -> Option<String> {
        self.element(path).map(Element::trimmed_text)
    }

    /// Replaces the text of the addressed element, creating missing elements
    ///
    /// Created elements are appended after the last element sibling and take
    /// over its indentation and line ending.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute element path starting at the root, e.g. `project/version`
    /// * `text` - New character data; markup characters are escaped
    ///
    /// # Returns
    ///
    /// [`PomSyncError::DescriptorMalformed`] if the path does not start at the
    /// root element
    pub fn write_text(&mut self, path: &str, text: &str) -> Result<()> {
        let segments: Vec<&str> = segments(path).collect();
        match segments.first() {
            Some(first) if *first == self.root.name => {}
            Some(first) => {
                return Err(PomSyncError::malformed(
                    "",
                    format!("path {} does not start at root element <{}>", first, self.root.name),
                ))
            }
            None => return Err(PomSyncError::malformed("", "empty element path")),
        }

        let layout = self.layout();
        let mut indent = String::new();
        let mut current = &mut self.root;
        for segment in &segments[1..] {
            let index = match current.position_of(segment) {
                Some(index) => index,
                None => current.append_element(segment, &indent, &layout),
            };
            if let Some(Node::Text(raw)) = index.checked_sub(1).map(|i| &current.children[i]) {
                if let Some(found) = line_indent(raw) {
                    indent = found;
                }
            }
            current = current
                .children
                .get_mut(index)
                .and_then(Node::as_element_mut)
                .ok_or_else(|| PomSyncError::malformed("", format!("lost element <{}>", segment)))?;
        }

        current.set_text(text);
        Ok(())
    }

    /// Document text; untouched regions are identical to the input
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            node.write_to(&mut out);
        }
        self.root.write_to(&mut out);
        for node in &self.epilog {
            node.write_to(&mut out);
        }
        out
    }

    /// Document bytes in the document's own encoding
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        if self.bom {
            bytes.extend_from_slice(encoding::bom_bytes());
        }
        let body = self
            .encoding
            .encode(&self.to_xml())
            .map_err(|reason| PomSyncError::unreadable(PathBuf::new(), reason))?;
        bytes.extend(body);
        Ok(bytes)
    }

    fn layout(&self) -> Layout {
        let newline = if self.to_xml().contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        };
        let unit = self
            .root
            .children
            .iter()
            .zip(self.root.children.iter().skip(1))
            .find_map(|(before, node)| match (before, node) {
                (Node::Text(raw), Node::Element(_)) => line_indent(raw),
                _ => None,
            })
            .filter(|indent| !indent.is_empty())
            .unwrap_or_else(|| "    ".to_string());
        Layout { newline, unit }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Whitespace after the last line break of `raw`, if that tail is blank
fn line_indent(raw: &str) -> Option<String> {
    let (_, tail) = raw.rsplit_once('\n')?;
    tail.chars()
        .all(|c| c == ' ' || c == '\t')
        .then(|| tail.to_string())
}

fn cdata_content(raw: &str) -> &str {
    raw.strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(raw)
}

/// Escapes character data for use as element content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolves predefined and numeric character references
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let resolved = after.find(';').and_then(|semi| {
            let entity = &after[1..semi];
            let c = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>()))
                    .and_then(|n| n.ok())
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi + 1))
        });
        match resolved {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Hand-written scanner producing the lossless node tree
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, reason: impl ToString) -> PomSyncError {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        PomSyncError::malformed("", format!("line {}: {}", line, reason.to_string()))
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Consumes input up to and including `terminator`
    fn take_through(&mut self, skip: usize, terminator: &str, what: &str) -> Result<&'a str> {
        let start = self.pos;
        match self.src[start + skip..].find(terminator) {
            Some(offset) => {
                self.pos = start + skip + offset + terminator.len();
                Ok(&self.src[start..self.pos])
            }
            None => Err(self.error(format!("unterminated {}", what))),
        }
    }

    /// Consumes a tag up to its closing `>`, skipping quoted attribute values
    fn take_tag(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let mut quote: Option<char> = None;
        for (offset, c) in self.src[start..].char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(c),
                (None, '>') => {
                    self.pos = start + offset + 1;
                    return Ok(&self.src[start..self.pos]);
                }
                _ => {}
            }
        }
        Err(self.error("unterminated tag"))
    }

    /// Consumes a doctype declaration, including an internal subset
    fn take_doctype(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        for (offset, c) in self.src[start..].char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => depth = depth.saturating_sub(1),
                (None, '>') if depth == 0 => {
                    self.pos = start + offset + 1;
                    return Ok(&self.src[start..self.pos]);
                }
                _ => {}
            }
        }
        Err(self.error("unterminated doctype"))
    }

    fn parse(mut self) -> Result<(Vec<Node>, Element, Vec<Node>)> {
        let mut top: Vec<Node> = Vec::new();
        let mut open: Vec<Element> = Vec::new();

        fn attach(node: Node, open: &mut [Element], top: &mut Vec<Node>) {
            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => top.push(node),
            }
        }

        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                let raw = self.take_through(4, "-->", "comment")?;
                attach(Node::Markup(raw.to_string()), &mut open, &mut top);
            } else if rest.starts_with("<![CDATA[") {
                if open.is_empty() {
                    return Err(self.error("CDATA section outside the root element"));
                }
                let raw = self.take_through(9, "]]>", "CDATA section")?;
                attach(Node::CData(raw.to_string()), &mut open, &mut top);
            } else if rest.starts_with("<?") {
                let raw = self.take_through(2, "?>", "processing instruction")?;
                attach(Node::Markup(raw.to_string()), &mut open, &mut top);
            } else if rest.starts_with("<!") {
                let raw = self.take_doctype()?;
                attach(Node::Markup(raw.to_string()), &mut open, &mut top);
            } else if rest.starts_with("</") {
                let raw = self.take_tag()?;
                let name = raw[2..raw.len() - 1].trim();
                let mut element = match open.pop() {
                    Some(element) if element.name == name => element,
                    Some(element) => {
                        return Err(self.error(format!(
                            "</{}> does not close <{}>",
                            name, element.name
                        )))
                    }
                    None => return Err(self.error(format!("unexpected </{}>", name))),
                };
                element.end_tag = Some(raw.to_string());
                attach(Node::Element(element), &mut open, &mut top);
            } else if rest.starts_with('<') {
                let raw = self.take_tag()?;
                let name: String = raw[1..]
                    .chars()
                    .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
                    .collect();
                if name.is_empty() {
                    return Err(self.error("element without a name"));
                }
                if open.is_empty() && top.iter().any(|n| n.as_element().is_some()) {
                    return Err(self.error(format!("second root element <{}>", name)));
                }
                let element = Element {
                    name,
                    start_tag: raw.to_string(),
                    end_tag: None,
                    children: Vec::new(),
                };
                if raw.ends_with("/>") {
                    attach(Node::Element(element), &mut open, &mut top);
                } else {
                    open.push(element);
                }
            } else {
                let end = rest.find('<').map_or(self.src.len(), |i| self.pos + i);
                let raw = &self.src[self.pos..end];
                if open.is_empty() && !raw.trim().is_empty() {
                    return Err(self.error("text outside the root element"));
                }
                self.pos = end;
                attach(Node::Text(raw.to_string()), &mut open, &mut top);
            }
        }

        if let Some(element) = open.last() {
            return Err(self.error(format!("unclosed element <{}>", element.name)));
        }

        let root_index = top
            .iter()
            .position(|n| n.as_element().is_some())
            .ok_or_else(|| self.error("no root element"))?;
        let epilog = top.split_off(root_index + 1);
        let root = match top.pop() {
            Some(Node::Element(root)) => root,
            _ => return Err(self.error("no root element")),
        };
        Ok((top, root, epilog))
    }
}
