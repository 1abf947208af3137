//! Streaming well-formedness check over quick-xml events.

use super::WellFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read the whole document and fail on the first well-formedness violation.
///
/// quick-xml checks tag nesting, attribute syntax and entity references as
/// they are read. Everything else is tracked here:
/// - exactly one root, with nothing but whitespace, comments and processing
///   instructions outside it;
/// - no dangling open elements at EOF;
/// - the XML declaration only as the very first thing in the document;
/// - valid names for elements, attributes and PI targets;
/// - no raw `<` in attribute values and no `--` inside comments.
pub fn check_well_formed<R: BufRead>(source: R) -> Result<(), WellFormedError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().check_end_names = true;

    let mut buf = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut roots = 0u32;
    let mut seen_any = false;

    loop {
        let position = reader.buffer_position() as u64;
        let syntax = |source| WellFormedError::Syntax { position, source };
        let event = reader.read_event_into(&mut buf).map_err(syntax)?;
        let is_start = matches!(event, Event::Start(_));
        let mut leading_bom = false;
        match event {
            Event::Decl(d) => {
                if seen_any {
                    return Err(WellFormedError::MisplacedDeclaration { position });
                }
                d.version().map_err(syntax)?;
            }
            Event::Start(e) | Event::Empty(e) => {
                if open.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        return Err(WellFormedError::MultipleRoots { position });
                    }
                }
                check_name(e.name().as_ref(), position)?;
                check_attributes(&e, position)?;
                if is_start {
                    open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(t) => {
                let raw: &[u8] = &t;
                if !seen_any && raw == BOM {
                    leading_bom = true;
                }
                let text = t.unescape().map_err(syntax)?;
                if open.is_empty() && !leading_bom && !text.trim().is_empty() {
                    return Err(WellFormedError::OutsideRoot { position });
                }
            }
            Event::CData(_) if open.is_empty() => {
                return Err(WellFormedError::OutsideRoot { position });
            }
            Event::DocType(_) if roots > 0 => {
                return Err(WellFormedError::OutsideRoot { position });
            }
            Event::Comment(c) => {
                let body: &[u8] = &c;
                if body.windows(2).any(|w| w == b"--") || body.ends_with(b"-") {
                    return Err(WellFormedError::BadComment { position });
                }
            }
            Event::PI(pi) => {
                let target = pi.target();
                if target.eq_ignore_ascii_case(b"xml") {
                    return Err(WellFormedError::MisplacedDeclaration { position });
                }
                check_name(target, position)?;
            }
            Event::Eof => break,
            _ => {}
        }
        seen_any |= !leading_bom;
        buf.clear();
    }

    if let Some(name) = open.pop() {
        return Err(WellFormedError::Unclosed { name });
    }
    if roots == 0 {
        return Err(WellFormedError::NoRoot);
    }
    Ok(())
}

fn check_attributes(e: &BytesStart<'_>, position: u64) -> Result<(), WellFormedError> {
    let syntax = |source| WellFormedError::Syntax { position, source };
    for attr in e.attributes() {
        let attr = attr.map_err(|err| syntax(err.into()))?;
        let key = attr.key.as_ref();
        check_name(key, position)?;
        if attr.value.contains(&b'<') {
            return Err(WellFormedError::LtInAttribute {
                name: String::from_utf8_lossy(key).into_owned(),
                position,
            });
        }
        attr.unescape_value().map_err(syntax)?;
    }
    Ok(())
}

fn check_name(raw: &[u8], position: u64) -> Result<(), WellFormedError> {
    let invalid = || WellFormedError::InvalidName {
        name: String::from_utf8_lossy(raw).into_owned(),
        position,
    };
    let name = std::str::from_utf8(raw).map_err(|_| invalid())?;
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start(c) => {}
        _ => return Err(invalid()),
    }
    if chars.all(is_name_char) {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// `NameStartChar` from XML 1.0 (fifth edition).
fn is_name_start(c: char) -> bool {
    matches!(c,
        ':' | '_' | 'A'..='Z' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}
