//! Editor capability interface.
//!
//! The composer never touches an editor widget directly. It reads the body
//! markup, asks for the cursor, and inserts image embeds through
//! [`RichTextEditor`]. A browser binding would implement this over the DOM;
//! [`HtmlEditor`] is an in-memory implementation used by the CLI and tests.

/// Markup a WYSIWYG editor produces for an empty document.
pub const EMPTY_MARKUP: &str = "<p><br></p>";

/// Callback invoked with the full body markup after every change.
pub type ChangeCallback = Box<dyn FnMut(&str)>;

/// Operations the composer needs from a rich-text editor.
///
/// Positions are editor positions: every text character counts as one, every
/// embed counts as one.
pub trait RichTextEditor {
    /// Current body as HTML markup.
    fn content(&self) -> String;

    /// Current cursor position, if the editor has focus.
    fn cursor(&self) -> Option<usize>;

    /// Insert an image embed with the given `src` at `position`.
    ///
    /// Positions past the end are clamped to the end.
    fn insert_image(&mut self, position: usize, src: &str);

    /// Register a change listener.
    fn on_change(&mut self, callback: ChangeCallback);

    /// Drop all content.
    fn clear(&mut self);

    /// Editor length in positions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// True when `markup` has no user content.
///
/// Matches what a WYSIWYG editor leaves behind after everything is deleted.
pub fn is_blank_markup(markup: &str) -> bool {
    let trimmed = markup.trim();
    trimmed.is_empty() || trimmed == EMPTY_MARKUP || trimmed == "<p></p>"
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Text(String),
    Image(String),
}

impl Segment {
    fn len(&self) -> usize {
        match self {
            Segment::Text(text) => text.chars().count(),
            Segment::Image(_) => 1,
        }
    }
}

/// In-memory editor holding paragraphs of text and image embeds.
///
/// Newlines in inserted text start a new paragraph. The rendered markup has
/// one `<p>` per paragraph, matching the shape browser editors emit.
#[derive(Default)]
pub struct HtmlEditor {
    segments: Vec<Segment>,
    cursor: Option<usize>,
    listeners: Vec<ChangeCallback>,
}

impl HtmlEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an editor containing `text`, with the cursor at the end.
    pub fn with_text(text: &str) -> Self {
        let mut editor = Self::new();
        editor.insert_text(0, text);
        editor
    }

    /// Insert plain text at `position`. Moves the cursor past the insertion.
    pub fn insert_text(&mut self, position: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let position = position.min(self.len());
        let (index, offset) = self.split_at(position);
        match self.segments.get_mut(index) {
            Some(Segment::Text(existing)) if offset > 0 || index == 0 => {
                let byte = char_to_byte(existing, offset);
                existing.insert_str(byte, text);
            }
            _ => self.segments.insert(index, Segment::Text(text.to_string())),
        }
        self.coalesce();
        self.cursor = Some(position + text.chars().count());
        self.notify();
    }

    /// Place the cursor. `None` means the editor has no selection.
    pub fn set_cursor(&mut self, position: Option<usize>) {
        self.cursor = position.map(|p| p.min(self.len()));
    }

    /// Image sources in document order.
    pub fn image_sources(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Image(src) => Some(src.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Whether the placeholder should be shown.
    pub fn shows_placeholder(&self) -> bool {
        is_blank_markup(&self.content())
    }

    /// Split so that a segment boundary falls at `position`, returning the
    /// index of the segment starting there and the char offset inside a text
    /// segment when no split was needed.
    fn split_at(&self, position: usize) -> (usize, usize) {
        let mut start = 0;
        for index in 0..self.segments.len() {
            let len = self.segments[index].len();
            if position == start {
                return (index, 0);
            }
            if position < start + len {
                // Only text segments are longer than one position.
                return (index, position - start);
            }
            start += len;
        }
        (self.segments.len(), 0)
    }

    fn split_text(&mut self, index: usize, offset: usize) -> usize {
        if offset == 0 {
            return index;
        }
        if let Some(Segment::Text(text)) = self.segments.get_mut(index) {
            let byte = char_to_byte(text, offset);
            let tail = text.split_off(byte);
            self.segments.insert(index + 1, Segment::Text(tail));
        }
        index + 1
    }

    fn coalesce(&mut self) {
        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            if let Segment::Text(text) = &segment {
                if text.is_empty() {
                    continue;
                }
                if let Some(Segment::Text(prev)) = merged.last_mut() {
                    prev.push_str(text);
                    continue;
                }
            }
            merged.push(segment);
        }
        self.segments = merged;
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let markup = self.content();
        for listener in self.listeners.iter_mut() {
            listener(&markup);
        }
    }
}

impl RichTextEditor for HtmlEditor {
    fn content(&self) -> String {
        if self.segments.is_empty() {
            return EMPTY_MARKUP.to_string();
        }

        let mut out = String::from("<p>");
        let mut paragraph_empty = true;
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => {
                    for (i, line) in text.split('\n').enumerate() {
                        if i > 0 {
                            if paragraph_empty {
                                out.push_str("<br>");
                            }
                            out.push_str("</p><p>");
                            paragraph_empty = true;
                        }
                        if !line.is_empty() {
                            escape_text(line, &mut out);
                            paragraph_empty = false;
                        }
                    }
                }
                Segment::Image(src) => {
                    out.push_str("<img src=\"");
                    escape_attr(src, &mut out);
                    out.push_str("\">");
                    paragraph_empty = false;
                }
            }
        }
        if paragraph_empty {
            out.push_str("<br>");
        }
        out.push_str("</p>");
        out
    }

    fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn insert_image(&mut self, position: usize, src: &str) {
        let position = position.min(self.len());
        let (index, offset) = self.split_at(position);
        let index = self.split_text(index, offset);
        self.segments.insert(index, Segment::Image(src.to_string()));
        self.coalesce();
        self.cursor = Some(position + 1);
        self.notify();
    }

    fn on_change(&mut self, callback: ChangeCallback) {
        self.listeners.push(callback);
    }

    fn clear(&mut self) {
        self.segments.clear();
        self.cursor = None;
        self.notify();
    }

    fn len(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }
}

fn char_to_byte(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
