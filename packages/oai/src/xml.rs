//! Small helpers over the quick-xml writer.
//!
//! All provider output goes through these so that text and attribute
//! escaping is handled in exactly one place.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Write `<tag>text</tag>` with escaped text content.
pub(crate) fn text_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Write `<tag a="v" ...>text</tag>` with escaped attributes and text.
pub(crate) fn text_element_with_attrs(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(tag);
    for (name, value) in attrs {
        start.push_attribute((*name, *value));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Start an element with attributes.
pub(crate) fn open_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    attrs: &[(&str, &str)],
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(tag);
    for (name, value) in attrs {
        start.push_attribute((*name, *value));
    }
    writer.write_event(Event::Start(start))
}

/// Close an element previously opened with [`open_element`].
pub(crate) fn close_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

/// Insert an already-serialized XML fragment verbatim.
///
/// The fragment must be well-formed on its own; it is not re-escaped.
pub(crate) fn raw_fragment(
    writer: &mut Writer<Vec<u8>>,
    fragment: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Text(BytesText::from_escaped(fragment)))
}

/// Finish a writer and return the produced document as a string.
pub(crate) fn into_string(writer: Writer<Vec<u8>>) -> String {
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}
