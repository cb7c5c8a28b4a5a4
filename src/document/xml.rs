use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::package::PackageError;

/// One XML part kept as an owned event stream.
///
/// Serializing an untouched stream reproduces the markup event for event,
/// so edits stay confined to the text events a caller rewrites.
#[derive(Debug)]
pub struct XmlPart {
    name: String,
    events: Vec<Event<'static>>,
}

impl XmlPart {
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self, PackageError> {
        let text = std::str::from_utf8(bytes).map_err(|_| PackageError::Encoding(name.to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = Reader::from_str(text);
        let mut events = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Eof => break,
                event => events.push(event.into_owned()),
            }
        }

        Ok(Self {
            name: name.to_string(),
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event<'static>] {
        &self.events
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut writer = Writer::new(Vec::new());
        for event in &self.events {
            writer
                .write_event(event)
                .map_err(|e| PackageError::invalid(&self.name, e.to_string()))?;
        }
        Ok(writer.into_inner())
    }

    /// Rewrites a run of text so the whole of `text` lands in its first
    /// segment and every later segment becomes empty. Formatting attached to
    /// the segments' enclosing elements is left as is.
    pub fn write_run(&mut self, run: &mut TextRun, text: &str) {
        let mut remaining = Some(text);
        for segment in run.segments.iter_mut() {
            let value = remaining.take().unwrap_or("");
            self.write_segment(segment, value);
        }
    }

    fn write_segment(&mut self, segment: &mut Segment, value: &str) {
        if segment.value == value {
            return;
        }

        if let Some((head, rest)) = segment.texts.split_first() {
            self.events[*head] = Event::Text(BytesText::new(value).into_owned());
            for index in rest {
                self.events[*index] = Event::Text(BytesText::new("").into_owned());
            }
        }

        if value.trim() != value {
            self.preserve_space(segment.open);
        }
        segment.value = value.to_string();
    }

    /// Replaces the value of attribute `key` on the tag at `index`, keeping
    /// the other attributes in order.
    pub fn set_attribute(&mut self, index: usize, key: &str, value: &str) {
        let updated = match &self.events[index] {
            Event::Start(start) => Event::Start(with_attribute(start, key, value)),
            Event::Empty(start) => Event::Empty(with_attribute(start, key, value)),
            _ => return,
        };
        self.events[index] = updated;
    }

    fn preserve_space(&mut self, index: usize) {
        if let Event::Start(start) = &mut self.events[index] {
            let present = start
                .attributes()
                .flatten()
                .any(|attr| attr.key.as_ref() == b"xml:space");
            if !present {
                start.push_attribute(("xml:space", "preserve"));
            }
        }
    }
}

/// A single text element (`w:t`, `t`, `v`) and the text events inside it.
#[derive(Debug, Clone)]
pub struct Segment {
    open: usize,
    texts: Vec<usize>,
    value: String,
}

impl Segment {
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Accumulates a segment while the scanner is inside a text element.
#[derive(Debug)]
pub struct SegmentBuilder {
    open: usize,
    texts: Vec<usize>,
    value: String,
}

impl SegmentBuilder {
    pub fn new(open: usize) -> Self {
        Self {
            open,
            texts: Vec::new(),
            value: String::new(),
        }
    }

    /// Records `event` if it carries character data.
    pub fn push(&mut self, index: usize, event: &Event<'_>) -> Result<(), PackageError> {
        match event {
            Event::Text(text) => {
                self.value.push_str(&text.unescape()?);
                self.texts.push(index);
            }
            Event::CData(data) => {
                let raw = std::str::from_utf8(&**data)
                    .map_err(|_| PackageError::Encoding("CDATA section".to_string()))?;
                self.value.push_str(raw);
                self.texts.push(index);
            }
            _ => {}
        }
        Ok(())
    }

    /// Segments with no character data cannot be rewritten in place and are
    /// dropped.
    pub fn finish(self) -> Option<Segment> {
        if self.texts.is_empty() {
            return None;
        }
        Some(Segment {
            open: self.open,
            texts: self.texts,
            value: self.value,
        })
    }
}

/// Ordered segments whose concatenation forms one logical line of text,
/// e.g. a word-processing paragraph or a spreadsheet string.
#[derive(Debug, Clone, Default)]
pub struct TextRun {
    segments: Vec<Segment>,
}

impl TextRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn is_writable(&self) -> bool {
        !self.segments.is_empty()
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(Segment::value).collect()
    }
}

fn with_attribute(start: &BytesStart<'_>, key: &str, value: &str) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut updated = BytesStart::new(name);
    for attr in start.attributes().flatten() {
        if attr.key.as_ref() == key.as_bytes() {
            updated.push_attribute((key, value));
        } else {
            updated.push_attribute(attr);
        }
    }
    updated
}

pub fn is_element(start: &BytesStart<'_>, name: &[u8]) -> bool {
    start.name().as_ref() == name
}

pub fn is_local(start: &BytesStart<'_>, local: &[u8]) -> bool {
    start.local_name().as_ref() == local
}

/// Reads an attribute by its local name, ignoring any namespace prefix.
pub fn attribute(start: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, PackageError> {
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
