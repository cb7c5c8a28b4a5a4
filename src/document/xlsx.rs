use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::package::{Package, PackageError};
use super::xml::{attribute, is_local, Segment, SegmentBuilder, TextRun, XmlPart};
use super::{DocumentError, DocumentFormat, StructuredDocument, TextNodes};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Typed value of a spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    /// Numbers keep their stored lexical form; dates are numbers too.
    Number(String),
    Boolean(bool),
    /// ISO 8601 value of a `t="d"` cell.
    Date(String),
    Error(String),
    Formula { formula: String, cached: Option<String> },
    Empty,
}

impl CellValue {
    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(_))
    }

    /// How the value reads in the plain-text view; `None` for blank cells.
    pub fn display(&self) -> Option<String> {
        match self {
            CellValue::Text(text) => Some(text.clone()),
            CellValue::Number(raw) | CellValue::Date(raw) | CellValue::Error(raw) => Some(raw.clone()),
            CellValue::Boolean(true) => Some("TRUE".to_string()),
            CellValue::Boolean(false) => Some("FALSE".to_string()),
            CellValue::Formula { cached, .. } => cached.clone(),
            CellValue::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub reference: Option<String>,
    pub value: CellValue,
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn cell(&self, reference: &str) -> Option<&Cell> {
        self.cells().find(|cell| cell.reference.as_deref() == Some(reference))
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flatten()
    }
}

/// A redactable string: one shared-string item (however many cells use
/// it, possibly none), one inline string, or one formula-less `t="str"`
/// value.
#[derive(Debug)]
struct GridNode {
    part: usize,
    run: TextRun,
    // (sheet, row, column) of every cell showing this text.
    cells: Vec<(usize, usize, usize)>,
}

/// A spreadsheet workbook viewed as sheets of typed cells.
///
/// Only string cells become text nodes. Numbers, booleans, dates, errors
/// and formulas are never exposed for rewriting.
#[derive(Debug)]
pub struct Workbook {
    package: Package,
    parts: Vec<XmlPart>,
    dirty: Vec<bool>,
    sheets: Vec<Sheet>,
    nodes: Vec<GridNode>,
}

impl Workbook {
    fn open(bytes: &[u8]) -> Result<Self, PackageError> {
        let package = Package::open(bytes)?;
        let sheet_parts = sheet_parts(&package)?;

        let mut parts = Vec::with_capacity(sheet_parts.len() + 1);
        let mut shared = Vec::new();
        let mut shared_part = None;
        if let Some(bytes) = package.part(SHARED_STRINGS_PART) {
            let xml = XmlPart::parse(SHARED_STRINGS_PART, bytes)?;
            shared = scan_shared_strings(&xml)?;
            debug!("Loaded {} shared string(s)", shared.len());
            shared_part = Some(parts.len());
            parts.push(xml);
        }

        let mut sheets = Vec::with_capacity(sheet_parts.len());
        let mut nodes = Vec::new();
        let mut shared_nodes = HashMap::new();
        for (sheet_index, (name, path)) in sheet_parts.into_iter().enumerate() {
            let xml = XmlPart::parse(&path, package.require_part(&path)?)?;
            let scanner = SheetScanner {
                sheet: sheet_index,
                part: parts.len(),
                part_name: &path,
                shared: &shared,
                shared_part,
                shared_nodes: &mut shared_nodes,
                nodes: &mut nodes,
                rows: Vec::new(),
                row: None,
                cell: None,
                field: None,
                in_inline: false,
                phonetic: 0,
            };
            let rows = scanner.run(&xml)?;
            debug!("Sheet '{}' ({}) has {} row(s)", name, path, rows.len());
            sheets.push(Sheet { name, rows });
            parts.push(xml);
        }

        // Items no cell points at are still shipped in the package.
        if let Some(part) = shared_part {
            for (index, run) in shared.iter().enumerate() {
                if run.is_writable() && !shared_nodes.contains_key(&index) {
                    trace!("Shared string {} is not referenced by any cell", index);
                    nodes.push(GridNode {
                        part,
                        run: run.clone(),
                        cells: Vec::new(),
                    });
                }
            }
        }

        Ok(Self {
            dirty: vec![false; parts.len()],
            package,
            parts,
            sheets,
            nodes,
        })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Sheet names and part paths in workbook order.
fn sheet_parts(package: &Package) -> Result<Vec<(String, String)>, PackageError> {
    let rels = XmlPart::parse(WORKBOOK_RELS, package.require_part(WORKBOOK_RELS)?)?;
    let mut targets = HashMap::new();
    for event in rels.events() {
        if let Event::Empty(start) | Event::Start(start) = event {
            if is_local(start, b"Relationship") {
                if let (Some(id), Some(target)) = (attribute(start, b"Id")?, attribute(start, b"Target")?) {
                    targets.insert(id, resolve_target(&target));
                }
            }
        }
    }

    let workbook = XmlPart::parse(WORKBOOK_PART, package.require_part(WORKBOOK_PART)?)?;
    let mut sheets = Vec::new();
    for event in workbook.events() {
        if let Event::Empty(start) | Event::Start(start) = event {
            if is_local(start, b"sheet") {
                let name = attribute(start, b"name")?.unwrap_or_default();
                let id = attribute(start, b"id")?
                    .ok_or_else(|| PackageError::invalid(WORKBOOK_PART, format!("sheet '{}' has no relationship", name)))?;
                let path = targets
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| PackageError::invalid(WORKBOOK_RELS, format!("unknown relationship {}", id)))?;
                sheets.push((name, path));
            }
        }
    }
    Ok(sheets)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn end_is(event: &Event<'_>, local: &[u8]) -> bool {
    matches!(event, Event::End(end) if end.local_name().as_ref() == local)
}

/// One text run per `si` item. Phonetic hints (`rPh`) are not part of the
/// cell text and are skipped.
fn scan_shared_strings(xml: &XmlPart) -> Result<Vec<TextRun>, PackageError> {
    let mut items = Vec::new();
    let mut current: Option<TextRun> = None;
    let mut segment: Option<SegmentBuilder> = None;
    let mut phonetic = 0usize;

    for (index, event) in xml.events().iter().enumerate() {
        match event {
            Event::Start(start) if is_local(start, b"si") => current = Some(TextRun::new()),
            Event::Empty(start) if is_local(start, b"si") => items.push(TextRun::new()),
            Event::Start(start) if is_local(start, b"rPh") => phonetic += 1,
            Event::Start(start) if is_local(start, b"t") && current.is_some() && phonetic == 0 => {
                segment = Some(SegmentBuilder::new(index));
            }
            e if end_is(e, b"si") => items.push(current.take().unwrap_or_default()),
            e if end_is(e, b"rPh") => phonetic = phonetic.saturating_sub(1),
            e if end_is(e, b"t") => {
                if let Some(finished) = segment.take().and_then(SegmentBuilder::finish) {
                    if let Some(run) = current.as_mut() {
                        run.push(finished);
                    }
                }
            }
            other => {
                if let Some(builder) = segment.as_mut() {
                    builder.push(index, other)?;
                }
            }
        }
    }

    Ok(items)
}

#[derive(Debug, Default)]
struct CellBuilder {
    reference: Option<String>,
    kind: Option<String>,
    value: Option<String>,
    value_segment: Option<Segment>,
    formula: Option<String>,
    inline: Option<TextRun>,
}

impl CellBuilder {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, PackageError> {
        Ok(Self {
            reference: attribute(start, b"r")?,
            kind: attribute(start, b"t")?,
            ..Self::default()
        })
    }
}

enum Field {
    Value(SegmentBuilder),
    Formula(SegmentBuilder),
    InlineText(SegmentBuilder),
}

struct SheetScanner<'a> {
    sheet: usize,
    part: usize,
    part_name: &'a str,
    shared: &'a [TextRun],
    shared_part: Option<usize>,
    shared_nodes: &'a mut HashMap<usize, usize>,
    nodes: &'a mut Vec<GridNode>,
    rows: Vec<Vec<Cell>>,
    row: Option<Vec<Cell>>,
    cell: Option<CellBuilder>,
    field: Option<Field>,
    in_inline: bool,
    phonetic: usize,
}

impl<'a> SheetScanner<'a> {
    fn run(mut self, xml: &XmlPart) -> Result<Vec<Vec<Cell>>, PackageError> {
        for (index, event) in xml.events().iter().enumerate() {
            match event {
                Event::Start(start) if is_local(start, b"row") => self.row = Some(Vec::new()),
                Event::Empty(start) if is_local(start, b"row") => self.rows.push(Vec::new()),
                e if end_is(e, b"row") => {
                    let row = self.row.take().unwrap_or_default();
                    self.rows.push(row);
                }
                Event::Start(start) if is_local(start, b"c") => self.cell = Some(CellBuilder::from_start(start)?),
                Event::Empty(start) if is_local(start, b"c") => {
                    let builder = CellBuilder::from_start(start)?;
                    self.finish_cell(builder)?;
                }
                e if end_is(e, b"c") => {
                    if let Some(builder) = self.cell.take() {
                        self.finish_cell(builder)?;
                    }
                }
                Event::Start(start) if self.cell.is_some() && is_local(start, b"v") => {
                    self.field = Some(Field::Value(SegmentBuilder::new(index)));
                }
                Event::Start(start) if self.cell.is_some() && is_local(start, b"f") => {
                    self.field = Some(Field::Formula(SegmentBuilder::new(index)));
                }
                // Shared-formula followers carry only a reference to the master.
                Event::Empty(start) if is_local(start, b"f") => {
                    if let Some(cell) = self.cell.as_mut() {
                        cell.formula.get_or_insert_with(String::new);
                    }
                }
                Event::Start(start) if self.cell.is_some() && is_local(start, b"is") => {
                    self.in_inline = true;
                    if let Some(cell) = self.cell.as_mut() {
                        cell.inline = Some(TextRun::new());
                    }
                }
                e if end_is(e, b"is") => self.in_inline = false,
                Event::Start(start) if is_local(start, b"rPh") => self.phonetic += 1,
                e if end_is(e, b"rPh") => self.phonetic = self.phonetic.saturating_sub(1),
                Event::Start(start) if self.in_inline && self.phonetic == 0 && is_local(start, b"t") => {
                    self.field = Some(Field::InlineText(SegmentBuilder::new(index)));
                }
                e if end_is(e, b"v") || end_is(e, b"f") || end_is(e, b"t") => self.finish_field(),
                other => {
                    if let Some(Field::Value(builder) | Field::Formula(builder) | Field::InlineText(builder)) =
                        self.field.as_mut()
                    {
                        builder.push(index, other)?;
                    }
                }
            }
        }

        Ok(self.rows)
    }

    fn finish_field(&mut self) {
        let (Some(field), Some(cell)) = (self.field.take(), self.cell.as_mut()) else {
            return;
        };
        match field {
            Field::Value(builder) => {
                let segment = builder.finish();
                cell.value = Some(segment.as_ref().map(|s| s.value().to_string()).unwrap_or_default());
                cell.value_segment = segment;
            }
            Field::Formula(builder) => {
                cell.formula = Some(builder.finish().map(|s| s.value().to_string()).unwrap_or_default());
            }
            Field::InlineText(builder) => {
                if let (Some(segment), Some(run)) = (builder.finish(), cell.inline.as_mut()) {
                    run.push(segment);
                }
            }
        }
    }

    fn register(&mut self, part: usize, run: TextRun, position: (usize, usize, usize)) {
        self.nodes.push(GridNode {
            part,
            run,
            cells: vec![position],
        });
    }

    fn finish_cell(&mut self, builder: CellBuilder) -> Result<(), PackageError> {
        let column = self.row.as_ref().map_or(0, Vec::len);
        let position = (self.sheet, self.rows.len(), column);

        let value = match (builder.kind.as_deref(), builder.formula) {
            (_, Some(formula)) => CellValue::Formula {
                formula,
                cached: builder.value,
            },
            (Some("s"), None) => {
                let raw = builder.value.unwrap_or_default();
                let index: usize = raw.trim().parse().map_err(|_| {
                    PackageError::invalid(self.part_name, format!("bad shared string index {:?}", raw))
                })?;
                let shared = self.shared;
                let (run, part) = match (shared.get(index), self.shared_part) {
                    (Some(run), Some(part)) => (run, part),
                    _ => {
                        return Err(PackageError::invalid(
                            self.part_name,
                            format!("shared string {} does not exist", index),
                        ))
                    }
                };
                let text = run.text();
                match self.shared_nodes.get(&index) {
                    Some(&node) => self.nodes[node].cells.push(position),
                    None => {
                        self.shared_nodes.insert(index, self.nodes.len());
                        self.register(part, run.clone(), position);
                    }
                }
                CellValue::Text(text)
            }
            (Some("inlineStr"), None) => {
                let run = builder.inline.unwrap_or_default();
                let text = run.text();
                if run.is_writable() {
                    self.register(self.part, run, position);
                }
                CellValue::Text(text)
            }
            (Some("str"), None) => {
                if let Some(segment) = builder.value_segment {
                    let mut run = TextRun::new();
                    run.push(segment);
                    self.register(self.part, run, position);
                }
                CellValue::Text(builder.value.unwrap_or_default())
            }
            (Some("b"), None) => CellValue::Boolean(builder.value.as_deref().map(str::trim) == Some("1")),
            (Some("e"), None) => CellValue::Error(builder.value.unwrap_or_default()),
            (Some("d"), None) => CellValue::Date(builder.value.unwrap_or_default()),
            (_, None) => builder.value.map(CellValue::Number).unwrap_or(CellValue::Empty),
        };

        trace!("Cell {:?} on sheet {} -> {:?}", builder.reference, self.sheet, value);
        let cell = Cell {
            reference: builder.reference,
            value,
        };
        match self.row.as_mut() {
            Some(row) => row.push(cell),
            None => self.rows.push(vec![cell]),
        }
        Ok(())
    }
}

impl TextNodes for Workbook {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_text(&self, index: usize) -> String {
        self.nodes[index].run.text()
    }

    fn set_node_text(&mut self, index: usize, text: &str) {
        let node = &mut self.nodes[index];
        self.parts[node.part].write_run(&mut node.run, text);
        self.dirty[node.part] = true;

        for &(sheet, row, column) in &node.cells {
            if let Some(cell) = self.sheets[sheet].rows.get_mut(row).and_then(|r| r.get_mut(column)) {
                cell.value = CellValue::Text(text.to_string());
            }
        }
    }
}

impl StructuredDocument for Workbook {
    const FORMAT: DocumentFormat = DocumentFormat::Xlsx;

    fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        Self::open(bytes).map_err(|e| e.into_document_error(Self::FORMAT))
    }

    /// Non-blank values of each row joined by spaces, one line per row,
    /// sheets in workbook order.
    fn plain_text(&self) -> String {
        self.sheets
            .iter()
            .flat_map(|sheet| sheet.rows.iter())
            .map(|row| {
                row.iter()
                    .filter_map(|cell| cell.value.display())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
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
