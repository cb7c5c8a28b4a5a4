use quick_xml::events::Event;
use std::collections::HashMap;
use tracing::{debug, trace};

use super::package::{Package, PackageError};
use super::xml::{attribute, is_element, is_local, SegmentBuilder, TextRun, XmlPart};
use super::{DocumentError, DocumentFormat, StructuredDocument, TextNodes};

const MAIN_PART: &str = "word/document.xml";
const HYPERLINK_TYPE: &str = "/relationships/hyperlink";

/// What a hierarchical node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Paragraph,
    TableCell,
    /// Field instructions of one paragraph, e.g. `HYPERLINK "mailto:..."`.
    FieldCode,
    /// URL of an external hyperlink relationship.
    LinkTarget,
}

impl NodeKind {
    /// Whether the node is part of the text a reader sees.
    pub fn is_visible(self) -> bool {
        matches!(self, NodeKind::Paragraph | NodeKind::TableCell)
    }
}

#[derive(Debug)]
enum Content {
    // One run per paragraph; a table cell may hold several.
    Runs(Vec<TextRun>),
    Attribute { event: usize, value: String },
}

#[derive(Debug)]
struct DocxNode {
    part: usize,
    kind: NodeKind,
    content: Content,
}

impl DocxNode {
    fn runs(part: usize, kind: NodeKind, runs: Vec<TextRun>) -> Self {
        Self {
            part,
            kind,
            content: Content::Runs(runs),
        }
    }

    fn text(&self) -> String {
        match &self.content {
            Content::Runs(runs) => runs.iter().map(TextRun::text).collect::<Vec<_>>().join("\n"),
            Content::Attribute { value, .. } => value.clone(),
        }
    }
}

/// A word-processing document viewed as paragraphs and table cells.
///
/// The body, headers and footers are scanned. Field instructions and
/// hyperlink targets are nodes too, so an address cannot survive behind
/// its redacted display text, but they stay out of the plain-text view.
/// Everything else (run properties, styles, media) is carried through
/// untouched.
#[derive(Debug)]
pub struct DocxDocument {
    package: Package,
    parts: Vec<XmlPart>,
    dirty: Vec<bool>,
    nodes: Vec<DocxNode>,
}

impl DocxDocument {
    fn open(bytes: &[u8]) -> Result<Self, PackageError> {
        let package = Package::open(bytes)?;

        let mut names = vec![MAIN_PART.to_string()];
        let mut extras: Vec<String> = package
            .part_names()
            .filter(|name| is_header_or_footer(name))
            .map(str::to_string)
            .collect();
        extras.sort_by_key(|name| part_order(name));
        names.extend(extras);

        let mut parts = Vec::with_capacity(names.len());
        let mut nodes = Vec::new();
        for (index, name) in names.iter().enumerate() {
            let part = XmlPart::parse(name, package.require_part(name)?)?;
            let before = nodes.len();
            Scanner::new(index, &mut nodes).run(&part)?;
            debug!("Found {} text node(s) in {}", nodes.len() - before, name);
            parts.push(part);
        }

        for name in &names {
            let rels = rels_part_name(name);
            if let Some(bytes) = package.part(&rels) {
                let xml = XmlPart::parse(&rels, bytes)?;
                let before = nodes.len();
                scan_link_targets(parts.len(), &xml, &mut nodes)?;
                debug!("Found {} hyperlink target(s) in {}", nodes.len() - before, rels);
                parts.push(xml);
            }
        }

        Ok(Self {
            dirty: vec![false; parts.len()],
            package,
            parts,
            nodes,
        })
    }

    pub fn node_kind(&self, index: usize) -> NodeKind {
        self.nodes[index].kind
    }

    /// Text of every node of the given kind, in document order.
    pub fn texts_of(&self, kind: NodeKind) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| node.kind == kind)
            .map(DocxNode::text)
            .collect()
    }
}

fn is_header_or_footer(name: &str) -> bool {
    name.strip_prefix("word/")
        .map(|rest| {
            !rest.contains('/')
                && (rest.starts_with("header") || rest.starts_with("footer"))
                && rest.ends_with(".xml")
        })
        .unwrap_or(false)
}

/// Headers before footers, each by number: `header2.xml` precedes
/// `header10.xml`.
fn part_order(name: &str) -> (bool, u32, String) {
    let stem = name.strip_suffix(".xml").unwrap_or(name);
    let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = stem[prefix.len()..].parse().unwrap_or(0);
    (prefix.ends_with("footer"), number, name.to_string())
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`
fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Adds a node for the target of every external hyperlink relationship.
fn scan_link_targets(part: usize, xml: &XmlPart, nodes: &mut Vec<DocxNode>) -> Result<(), PackageError> {
    for (index, event) in xml.events().iter().enumerate() {
        let (Event::Empty(start) | Event::Start(start)) = event else {
            continue;
        };
        if !is_local(start, b"Relationship") {
            continue;
        }
        let external = attribute(start, b"TargetMode")?.as_deref() == Some("External");
        let hyperlink = attribute(start, b"Type")?.map_or(false, |kind| kind.ends_with(HYPERLINK_TYPE));
        if let (true, true, Some(target)) = (external, hyperlink, attribute(start, b"Target")?) {
            nodes.push(DocxNode {
                part,
                kind: NodeKind::LinkTarget,
                content: Content::Attribute {
                    event: index,
                    value: target,
                },
            });
        }
    }
    Ok(())
}

/// Walks one part's events and appends its paragraph and table-cell nodes.
///
/// Paragraphs inside a `w:tc` belong to the innermost open cell; any other
/// paragraph is a node of its own. Nodes are emitted when their element
/// closes. A paragraph's `w:instrText` segments form a separate field-code
/// node.
struct Scanner<'a> {
    part: usize,
    nodes: &'a mut Vec<DocxNode>,
    paragraphs: Vec<TextRun>,
    codes: Vec<TextRun>,
    cells: Vec<Vec<TextRun>>,
    segment: Option<SegmentBuilder>,
    instruction: Option<SegmentBuilder>,
}

impl<'a> Scanner<'a> {
    fn new(part: usize, nodes: &'a mut Vec<DocxNode>) -> Self {
        Self {
            part,
            nodes,
            paragraphs: Vec::new(),
            codes: Vec::new(),
            cells: Vec::new(),
            segment: None,
            instruction: None,
        }
    }

    fn run(mut self, xml: &XmlPart) -> Result<(), PackageError> {
        for (index, event) in xml.events().iter().enumerate() {
            match event {
                Event::Start(start) if is_element(start, b"w:p") => {
                    self.paragraphs.push(TextRun::new());
                    self.codes.push(TextRun::new());
                }
                Event::Empty(start) if is_element(start, b"w:p") => self.close_paragraph(TextRun::new()),
                Event::End(end) if end.name().as_ref() == b"w:p" => {
                    let (Some(run), Some(code)) = (self.paragraphs.pop(), self.codes.pop()) else {
                        return Err(PackageError::invalid(xml.name(), "unbalanced paragraph"));
                    };
                    self.close_paragraph(run);
                    if code.is_writable() {
                        self.nodes.push(DocxNode::runs(self.part, NodeKind::FieldCode, vec![code]));
                    }
                }
                Event::Start(start) if is_element(start, b"w:tc") => self.cells.push(Vec::new()),
                Event::End(end) if end.name().as_ref() == b"w:tc" => self.close_cell(),
                Event::Start(start) if is_element(start, b"w:t") && !self.paragraphs.is_empty() => {
                    self.segment = Some(SegmentBuilder::new(index));
                }
                Event::End(end) if end.name().as_ref() == b"w:t" => {
                    if let Some(finished) = self.segment.take().and_then(SegmentBuilder::finish) {
                        if let Some(run) = self.paragraphs.last_mut() {
                            run.push(finished);
                        }
                    }
                }
                Event::Start(start) if is_element(start, b"w:instrText") && !self.codes.is_empty() => {
                    self.instruction = Some(SegmentBuilder::new(index));
                }
                Event::End(end) if end.name().as_ref() == b"w:instrText" => {
                    if let Some(finished) = self.instruction.take().and_then(SegmentBuilder::finish) {
                        if let Some(code) = self.codes.last_mut() {
                            code.push(finished);
                        }
                    }
                }
                other => {
                    if let Some(builder) = self.segment.as_mut().or(self.instruction.as_mut()) {
                        builder.push(index, other)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn close_paragraph(&mut self, run: TextRun) {
        match self.cells.last_mut() {
            Some(cell) => cell.push(run),
            None => self
                .nodes
                .push(DocxNode::runs(self.part, NodeKind::Paragraph, vec![run])),
        }
    }

    fn close_cell(&mut self) {
        if let Some(paragraphs) = self.cells.pop() {
            trace!("Closing table cell with {} paragraph(s)", paragraphs.len());
            self.nodes
                .push(DocxNode::runs(self.part, NodeKind::TableCell, paragraphs));
        }
    }
}

impl TextNodes for DocxDocument {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_text(&self, index: usize) -> String {
        self.nodes[index].text()
    }

    /// Writes one line per paragraph when the line count still matches the
    /// node's paragraphs; otherwise the whole text goes to the first
    /// paragraph that has character data.
    fn set_node_text(&mut self, index: usize, text: &str) {
        let node = &mut self.nodes[index];
        let part = &mut self.parts[node.part];

        match &mut node.content {
            Content::Attribute { event, value } => {
                part.set_attribute(*event, "Target", text);
                *value = text.to_string();
            }
            Content::Runs(runs) => {
                let lines: Vec<&str> = text.split('\n').collect();
                if lines.len() == runs.len() {
                    for (run, line) in runs.iter_mut().zip(lines) {
                        if run.text() != line {
                            part.write_run(run, line);
                        }
                    }
                } else {
                    let mut remaining = Some(text);
                    for run in runs.iter_mut().filter(|run| run.is_writable()) {
                        part.write_run(run, remaining.take().unwrap_or(""));
                    }
                }
            }
        }

        self.dirty[node.part] = true;
    }
}

impl StructuredDocument for DocxDocument {
    const FORMAT: DocumentFormat = DocumentFormat::Docx;

    fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::open(bytes).map_err(|e| e.into_document_error(Self::FORMAT))
    }

    fn plain_text(&self) -> String {
        self.nodes
            .iter()
            .filter(|node| node.kind.is_visible())
            .map(DocxNode::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut replacements = HashMap::new();
        for (part, dirty) in self.parts.iter().zip(&self.dirty) {
            if *dirty {
                let bytes = part
                    .to_bytes()
                    .map_err(|e| e.into_document_error(Self::FORMAT))?;
                replacements.insert(part.name().to_string(), bytes);
            }
        }

        self.package
            .write(&replacements)
            .map_err(|e| e.into_document_error(Self::FORMAT))
    }
}
