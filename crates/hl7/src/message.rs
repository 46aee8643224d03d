//! Segment message model, decoder and renderer.
//!
//! A segment message is an ordered list of segments. Each segment starts with a
//! three-character identifier followed by fields separated by the field separator
//! declared in the `MSH` header. Fields may hold components, repetitions and
//! sub-components, separated by the encoding characters in MSH-2.
//!
//! Field numbering follows the wire convention:
//! - for `MSH`, field 1 is the field separator itself and field 2 the encoding characters
//! - for every other segment, field 1 is the first value after the identifier
//!
//! Empty fields and components are reported as absent.
//!
//! Segments hold wire text. Free text goes in through [`Segment::set_text`] or
//! [`Segment::set_components`], which apply escape sequences (`\F\`, `\S\`, `\T\`,
//! `\R\`, `\E\`, and `\X0D\`/`\X0A\` for line breaks), and comes out decoded through
//! [`Segment::text`] and [`Segment::component`].

use crate::{Hl7Error, Hl7Result};
use chrono::NaiveDateTime;
use std::borrow::Cow;

/// Separator written between segments when rendering.
pub const SEGMENT_SEPARATOR: char = '\r';

/// Timestamp layout used in MSH-7 and EVN-2.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const HEADER_ID: &str = "MSH";
const PROCESSING_ID: &str = "P";
const VERSION_ID: &str = "2.3";

// ============================================================================
// Delimiters
// ============================================================================

/// Separator characters declared by a message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Encoding characters in MSH-2 order.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    /// Replace delimiter characters and line breaks in `text` with escape sequences.
    pub fn encode_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.chars().any(|c| self.needs_escape(c)) {
            return Cow::Borrowed(text);
        }

        let mut out = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            let code = match c {
                c if c == self.field => "F",
                c if c == self.component => "S",
                c if c == self.subcomponent => "T",
                c if c == self.repetition => "R",
                c if c == self.escape => "E",
                '\r' => "X0D",
                '\n' => "X0A",
                _ => {
                    out.push(c);
                    continue;
                }
            };
            out.push(self.escape);
            out.push_str(code);
            out.push(self.escape);
        }
        Cow::Owned(out)
    }

    /// Decode escape sequences in wire text.
    ///
    /// Unknown or unterminated sequences are kept as written.
    pub fn decode_text<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        if !raw.contains(self.escape) {
            return Cow::Borrowed(raw);
        }

        let width = self.escape.len_utf8();
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(start) = rest.find(self.escape) {
            out.push_str(&rest[..start]);
            let after = &rest[start + width..];
            let Some(end) = after.find(self.escape) else {
                out.push_str(&rest[start..]);
                return Cow::Owned(out);
            };

            let code = &after[..end];
            match self.decode_sequence(code) {
                Some(text) => out.push_str(&text),
                None => out.push_str(&rest[start..start + width + end + width]),
            }
            rest = &after[end + width..];
        }
        out.push_str(rest);
        Cow::Owned(out)
    }

    fn needs_escape(&self, c: char) -> bool {
        c == self.field
            || c == self.component
            || c == self.repetition
            || c == self.escape
            || c == self.subcomponent
            || c == '\r'
            || c == '\n'
    }

    fn decode_sequence(&self, code: &str) -> Option<String> {
        match code {
            "F" => Some(self.field.to_string()),
            "S" => Some(self.component.to_string()),
            "T" => Some(self.subcomponent.to_string()),
            "R" => Some(self.repetition.to_string()),
            "E" => Some(self.escape.to_string()),
            _ => code.strip_prefix('X').and_then(decode_hex),
        }
    }

    /// Read the delimiters from the start of an `MSH` line.
    fn from_header_line(line: &str) -> Hl7Result<Self> {
        let mut chars = line.chars().skip(HEADER_ID.len());
        let field = chars.next().ok_or(Hl7Error::MissingHeader)?;
        if field.is_alphanumeric() || field.is_whitespace() {
            return Err(Hl7Error::InvalidEncoding(format!(
                "field separator '{field}' is not a delimiter"
            )));
        }

        let encoding: Vec<char> = chars.take_while(|c| *c != field).collect();
        if encoding.is_empty() || encoding.len() > 4 {
            return Err(Hl7Error::InvalidEncoding(encoding.iter().collect()));
        }

        let defaults = Self::default();
        let delimiters = Self {
            field,
            component: encoding[0],
            repetition: encoding.get(1).copied().unwrap_or(defaults.repetition),
            escape: encoding.get(2).copied().unwrap_or(defaults.escape),
            subcomponent: encoding.get(3).copied().unwrap_or(defaults.subcomponent),
        };

        let all = [
            delimiters.field,
            delimiters.component,
            delimiters.repetition,
            delimiters.escape,
            delimiters.subcomponent,
        ];
        for (i, c) in all.iter().enumerate() {
            if c.is_alphanumeric() || all[i + 1..].contains(c) {
                return Err(Hl7Error::InvalidEncoding(encoding.iter().collect()));
            }
        }

        Ok(delimiters)
    }
}

/// `X` sequences carry hex-encoded UTF-8 bytes.
fn decode_hex(hex: &str) -> Option<String> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

// ============================================================================
// Segment
// ============================================================================

/// A single labelled field group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    id: String,
    /// `fields[n - 1]` holds field `n`.
    fields: Vec<String>,
}

impl Segment {
    /// Create an empty segment with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Segment identifier, for example `PID`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wire value of field `n`, escape sequences included, or `None` when absent or empty.
    pub fn field(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Decoded text of field `n`.
    pub fn text(&self, n: usize, delimiters: &Delimiters) -> Option<Cow<'_, str>> {
        self.field(n).map(|raw| delimiters.decode_text(raw))
    }

    /// Decoded component `c` of the first repetition of field `n`.
    pub fn component(&self, n: usize, c: usize, delimiters: &Delimiters) -> Option<Cow<'_, str>> {
        let first_repetition = self.field(n)?.split(delimiters.repetition).next()?;
        c.checked_sub(1)
            .and_then(|i| first_repetition.split(delimiters.component).nth(i))
            .filter(|v| !v.is_empty())
            .map(|raw| delimiters.decode_text(raw))
    }

    /// Set field `n` to wire text, padding intermediate fields with empty values.
    ///
    /// The value is written as is. Use [`Segment::set_text`] for free text.
    pub fn set_field(&mut self, n: usize, value: impl Into<String>) {
        let Some(index) = n.checked_sub(1) else {
            return;
        };
        if self.fields.len() <= index {
            self.fields.resize(index + 1, String::new());
        }
        self.fields[index] = value.into();
    }

    /// Set field `n` to free text, escaping delimiters and line breaks.
    pub fn set_text(&mut self, n: usize, text: &str, delimiters: &Delimiters) {
        self.set_field(n, delimiters.encode_text(text));
    }

    /// Set field `n` from a list of free-text components.
    pub fn set_components(&mut self, n: usize, components: &[&str], delimiters: &Delimiters) {
        let joined = components
            .iter()
            .map(|c| delimiters.encode_text(c))
            .collect::<Vec<_>>()
            .join(&delimiters.component.to_string());
        self.set_field(n, joined.trim_end_matches(delimiters.component));
    }

    /// Builder-style variant of [`Segment::set_field`].
    pub fn with_field(mut self, n: usize, value: impl Into<String>) -> Self {
        self.set_field(n, value);
        self
    }

    fn parse(line: &str, line_no: usize, delimiters: &Delimiters) -> Hl7Result<Self> {
        let mut parts = line.split(delimiters.field);
        let id = parts.next().unwrap_or_default();

        let valid_id = id.len() == 3
            && id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid_id {
            return Err(Hl7Error::InvalidSegment {
                line: line_no,
                reason: format!("invalid segment identifier '{id}'"),
            });
        }

        let mut fields: Vec<String> = Vec::new();
        if id == HEADER_ID {
            fields.push(delimiters.field.to_string());
        }
        fields.extend(parts.map(str::to_string));

        Ok(Self {
            id: id.to_string(),
            fields,
        })
    }

    fn render(&self, delimiters: &Delimiters) -> String {
        let separator = delimiters.field.to_string();
        // MSH-1 is the separator itself and is not written as a separate field.
        let fields = if self.id == HEADER_ID {
            self.fields.get(1..).unwrap_or_default()
        } else {
            &self.fields[..]
        };

        let mut out = self.id.clone();
        for field in fields {
            out.push_str(&separator);
            out.push_str(field);
        }
        out
    }
}

// ============================================================================
// Trigger events
// ============================================================================

/// Event code carried in the second component of MSH-9.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// `A01`, register a patient.
    Admit,
    /// `A23`, remove a patient record. `A03` is accepted as an alias.
    Discharge,
    /// Any other code. Decodes fine but is not handled.
    Other(String),
}

impl TriggerEvent {
    /// Parse a trigger code.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "A01" => TriggerEvent::Admit,
            "A23" | "A03" => TriggerEvent::Discharge,
            other => TriggerEvent::Other(other.to_string()),
        }
    }

    /// Wire code written on render.
    pub fn code(&self) -> &str {
        match self {
            TriggerEvent::Admit => "A01",
            TriggerEvent::Discharge => "A23",
            TriggerEvent::Other(code) => code,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, TriggerEvent::Other(_))
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Message
// ============================================================================

/// Values written into a freshly built `MSH` segment.
#[derive(Clone, Debug)]
pub struct Header {
    pub sending_application: String,
    pub sending_facility: String,
    pub timestamp: NaiveDateTime,
    /// Generated when `None`.
    pub control_id: Option<String>,
}

impl Header {
    pub fn new(
        sending_application: impl Into<String>,
        sending_facility: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            sending_application: sending_application.into(),
            sending_facility: sending_facility.into(),
            timestamp,
            control_id: None,
        }
    }
}

/// A decoded segment message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentMessage {
    delimiters: Delimiters,
    trigger: TriggerEvent,
    segments: Vec<Segment>,
}

impl SegmentMessage {
    /// Decode raw segment text.
    ///
    /// Segments may be separated by `\r`, `\n` or `\r\n`. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Hl7Error`] if:
    /// - the message is empty,
    /// - the first segment is not `MSH` or declares unusable delimiters,
    /// - any segment identifier is malformed,
    /// - MSH-9 carries no trigger event.
    pub fn parse(raw: &str) -> Hl7Result<Self> {
        let mut lines = raw
            .split(['\r', '\n'])
            .map(str::trim)
            .enumerate()
            .filter(|(_, line)| !line.is_empty());

        let (first_no, first) = lines.next().ok_or(Hl7Error::Empty)?;
        if !first.starts_with(HEADER_ID) {
            return Err(Hl7Error::MissingHeader);
        }
        let delimiters = Delimiters::from_header_line(first)?;

        let mut segments = vec![Segment::parse(first, first_no + 1, &delimiters)?];
        for (line_no, line) in lines {
            segments.push(Segment::parse(line, line_no + 1, &delimiters)?);
        }

        let trigger = segments[0]
            .component(9, 2, &delimiters)
            .map(|code| TriggerEvent::from_code(&code))
            .ok_or(Hl7Error::MissingTrigger)?;

        Ok(Self {
            delimiters,
            trigger,
            segments,
        })
    }

    /// Start a new `ADT` message with an `MSH` and `EVN` segment.
    pub fn new(trigger: TriggerEvent, header: &Header) -> Self {
        let delimiters = Delimiters::default();
        let timestamp = header.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let control_id = header
            .control_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let mut msh = Segment::new(HEADER_ID)
            .with_field(1, delimiters.field.to_string())
            .with_field(2, delimiters.encoding_characters())
            .with_field(3, header.sending_application.clone())
            .with_field(4, header.sending_facility.clone())
            .with_field(7, timestamp.clone());
        msh.set_components(9, &["ADT", trigger.code()], &delimiters);
        msh.set_field(10, control_id);
        msh.set_field(11, PROCESSING_ID);
        msh.set_field(12, VERSION_ID);

        let evn = Segment::new("EVN")
            .with_field(1, trigger.code())
            .with_field(2, timestamp);

        Self {
            delimiters,
            trigger,
            segments: vec![msh, evn],
        }
    }

    /// Append a segment.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn trigger(&self) -> &TriggerEvent {
        &self.trigger
    }

    /// `true` when the trigger is not one this system handles.
    pub fn is_unsupported(&self) -> bool {
        !self.trigger.is_supported()
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First segment with the given identifier.
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// MSH-10 message control id.
    pub fn control_id(&self) -> Option<&str> {
        self.segments[0].field(10)
    }

    /// Render the message with `\r` between segments.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.render(&self.delimiters))
            .collect::<Vec<_>>()
            .join(&SEGMENT_SEPARATOR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ADMIT: &str = "MSH|^~\\&|ReceptionApp|Reception|||20240501101500||ADT^A01|MSG0001|P|2.3\rEVN|A01|20240501101500\rPID|1||||Ivanova^Anna||19900501";

    #[test]
    fn parses_header_and_trigger() {
        let msg = SegmentMessage::parse(ADMIT).expect("parse admit");
        assert_eq!(msg.trigger(), &TriggerEvent::Admit);
        assert!(!msg.is_unsupported());
        assert_eq!(msg.control_id(), Some("MSG0001"));
        assert_eq!(msg.segments().len(), 3);

        let msh = msg.segment("MSH").expect("msh");
        assert_eq!(msh.field(1), Some("|"));
        assert_eq!(msh.field(2), Some("^~\\&"));
        assert_eq!(msh.field(3), Some("ReceptionApp"));
    }

    #[test]
    fn reads_components() {
        let msg = SegmentMessage::parse(ADMIT).expect("parse admit");
        let pid = msg.segment("PID").expect("pid");
        assert_eq!(pid.component(5, 1, msg.delimiters()).as_deref(), Some("Ivanova"));
        assert_eq!(pid.component(5, 2, msg.delimiters()).as_deref(), Some("Anna"));
        assert_eq!(pid.component(5, 3, msg.delimiters()), None);
        assert_eq!(pid.field(7), Some("19900501"));
        assert_eq!(pid.field(3), None);
    }

    #[test]
    fn accepts_newline_separated_segments() {
        let raw = ADMIT.replace('\r', "\r\n");
        let msg = SegmentMessage::parse(&raw).expect("parse crlf");
        assert_eq!(msg.segments().len(), 3);

        let raw = format!("\n{}\n\n", ADMIT.replace('\r', "\n"));
        let msg = SegmentMessage::parse(&raw).expect("parse lf");
        assert_eq!(msg.segments().len(), 3);
    }

    #[test]
    fn honours_declared_delimiters() {
        let raw = "MSH#*~\\&#App#Fac#####ADT*A23#1\rPID#1#42";
        let msg = SegmentMessage::parse(raw).expect("parse custom delimiters");
        assert_eq!(msg.delimiters().field, '#');
        assert_eq!(msg.delimiters().component, '*');
        assert_eq!(msg.trigger(), &TriggerEvent::Discharge);
        assert_eq!(msg.segment("PID").and_then(|s| s.field(2)), Some("42"));
    }

    #[test]
    fn unknown_trigger_is_flagged_not_rejected() {
        let raw = "MSH|^~\\&|App|Fac|||20240101||ADT^A08|1|P|2.3\rPID|1";
        let msg = SegmentMessage::parse(raw).expect("parse unknown trigger");
        assert_eq!(msg.trigger(), &TriggerEvent::Other("A08".into()));
        assert!(msg.is_unsupported());
    }

    #[test]
    fn rejects_missing_trigger() {
        let raw = "MSH|^~\\&|App|Fac|||20240101||ADT|1|P|2.3\rPID|1";
        assert_eq!(SegmentMessage::parse(raw), Err(Hl7Error::MissingTrigger));

        let short = "MSH|^~\\&|App";
        assert_eq!(SegmentMessage::parse(short), Err(Hl7Error::MissingTrigger));
    }

    #[test]
    fn rejects_missing_header() {
        assert_eq!(
            SegmentMessage::parse("PID|1||||Doe^John"),
            Err(Hl7Error::MissingHeader)
        );
        assert_eq!(SegmentMessage::parse("  \r\n "), Err(Hl7Error::Empty));
        assert_eq!(
            SegmentMessage::parse("not an hl7 message"),
            Err(Hl7Error::MissingHeader)
        );
    }

    #[test]
    fn rejects_bad_delimiters_and_segments() {
        assert!(matches!(
            SegmentMessage::parse("MSHA^~\\&A"),
            Err(Hl7Error::InvalidEncoding(_))
        ));
        assert!(matches!(
            SegmentMessage::parse("MSH||"),
            Err(Hl7Error::InvalidEncoding(_))
        ));

        let raw = format!("{ADMIT}\rgarbage line");
        assert!(matches!(
            SegmentMessage::parse(&raw),
            Err(Hl7Error::InvalidSegment { line: 4, .. })
        ));
    }

    #[test]
    fn escapes_every_delimiter_and_line_breaks() {
        let delimiters = Delimiters::default();
        let encoded = delimiters.encode_text("a|b^c~d\\e&f\r\ng");
        assert_eq!(encoded, "a\\F\\b\\S\\c\\R\\d\\E\\e\\T\\f\\X0D\\\\X0A\\g");
        assert!(!encoded.contains(['|', '^', '~', '&', '\r', '\n']));
        assert_eq!(delimiters.decode_text(&encoded), "a|b^c~d\\e&f\r\ng");
    }

    #[test]
    fn plain_text_is_not_copied() {
        let delimiters = Delimiters::default();
        assert!(matches!(delimiters.encode_text("Anna"), Cow::Borrowed("Anna")));
        assert!(matches!(delimiters.decode_text("Anna"), Cow::Borrowed("Anna")));
    }

    #[test]
    fn decodes_inbound_escape_sequences() {
        let raw = "MSH|^~\\&|App|Fac|||20240501||ADT^A01|1|P|2.3\rPID|1||||O\\F\\Brien^Anna\\S\\Maria||19900501\rNTE|1||caf\\XC3A9\\ \\H\\bold\\N\\ \\E";
        let msg = SegmentMessage::parse(raw).expect("parse");
        let pid = msg.segment("PID").expect("pid");
        assert_eq!(pid.component(5, 1, msg.delimiters()).as_deref(), Some("O|Brien"));
        assert_eq!(pid.component(5, 2, msg.delimiters()).as_deref(), Some("Anna^Maria"));
        assert_eq!(pid.field(7), Some("19900501"));

        let note = msg.segment("NTE").expect("nte");
        assert_eq!(
            note.text(3, msg.delimiters()).as_deref(),
            Some("café \\H\\bold\\N\\ \\E")
        );
    }

    #[test]
    fn free_text_round_trips_through_render() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        let mut msg = SegmentMessage::new(TriggerEvent::Admit, &Header::new("App", "Fac", timestamp));
        let delimiters = *msg.delimiters();
        let mut nte = Segment::new("NTE").with_field(1, "1");
        nte.set_text(3, "line one\nline|two", &delimiters);
        msg.push(nte);

        let reparsed = SegmentMessage::parse(&msg.render()).expect("reparse");
        assert_eq!(reparsed.segments().len(), 3);
        let note = reparsed.segment("NTE").expect("nte");
        assert_eq!(note.text(3, reparsed.delimiters()).as_deref(), Some("line one\nline|two"));
    }

    #[test]
    fn renders_what_it_parsed() {
        let msg = SegmentMessage::parse(ADMIT).expect("parse admit");
        assert_eq!(msg.render(), ADMIT);
    }

    #[test]
    fn builds_header_for_new_messages() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(10, 15, 0))
            .expect("valid timestamp");
        let mut header = Header::new("ReceptionApp", "Reception", timestamp);
        header.control_id = Some("CTRL1".into());

        let msg = SegmentMessage::new(TriggerEvent::Discharge, &header);
        assert_eq!(
            msg.render(),
            "MSH|^~\\&|ReceptionApp|Reception|||20240501101500||ADT^A23|CTRL1|P|2.3\rEVN|A23|20240501101500"
        );
    }

    #[test]
    fn generates_control_id_when_missing() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        let header = Header::new("App", "Fac", timestamp);

        let msg = SegmentMessage::new(TriggerEvent::Admit, &header);
        let control_id = msg.control_id().expect("control id");
        assert_eq!(control_id.len(), 32);

        let reparsed = SegmentMessage::parse(&msg.render()).expect("reparse");
        assert_eq!(reparsed.control_id(), Some(control_id));
    }
}
