//! Debug-name table codec.
//!
//! The `ResourceStringTable` is a small XML document mapping hex resource
//! IDs to their authoring-time name and type name. It rides along inside
//! bundles purely for tooling: parse failures never fail a load, and a
//! handful of shipped bundles need text-level repair before they parse at
//! all (see [`repair_writer_quirks`]).

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::types::DebugInfo;

/// Serialize a debug-name table.
///
/// Matches the emission of the game's own tooling: tab indent, no XML
/// declaration, lowercase 8-digit hex IDs, attribute order `id, type, name`,
/// and self-closing entries without a space before `/>`.
pub(crate) fn to_xml(entries: &BTreeMap<u32, DebugInfo>) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);

    if entries.is_empty() {
        writer
            .write_event(Event::Empty(BytesStart::new("ResourceStringTable")))
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    } else {
        writer
            .write_event(Event::Start(BytesStart::new("ResourceStringTable")))
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        for (id, info) in entries {
            let mut elem = BytesStart::new("Resource");
            elem.push_attribute(("id", format!("{id:08x}").as_str()));
            elem.push_attribute(("type", info.type_name.as_str()));
            elem.push_attribute(("name", info.name.as_str()));
            writer
                .write_event(Event::Empty(elem))
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("ResourceStringTable")))
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Parse a debug-name table, keeping whatever entries survive.
///
/// Deliberately tolerant: the table is advisory, and the repaired form of a
/// buggy shipped table can be left without its closing root tag. Every
/// well-formed `<Resource>` element seen before the first parse error is
/// kept.
pub(crate) fn from_xml(xml: &str) -> BTreeMap<u32, DebugInfo> {
    let mut reader = Reader::from_str(xml);
    let mut entries = BTreeMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() != b"Resource" {
                    continue;
                }
                let mut id = None;
                let mut name = String::new();
                let mut type_name = String::new();
                for attr in e.attributes().flatten() {
                    let value = match attr.unescape_value() {
                        Ok(v) => v.into_owned(),
                        Err(_) => continue,
                    };
                    match attr.key.as_ref() {
                        b"id" => id = u32::from_str_radix(&value, 16).ok(),
                        b"type" => type_name = value,
                        b"name" => name = value,
                        _ => {}
                    }
                }
                if let Some(id) = id {
                    entries.insert(id, DebugInfo { name, type_name });
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }

    entries
}

/// Undo two known bugs in the string tables written by the game's tooling.
///
/// Some shipped legacy bundles open the table with `</ResourceStringTable>`
/// instead of `<ResourceStringTable>`, and some carry a stray
/// `</ResourceStringTable>\n\t` fragment in the body.
pub(crate) fn repair_writer_quirks(table: &str) -> String {
    let mut s = table.to_owned();
    if s.starts_with("</ResourceStringTable>") {
        s.remove(1);
    }
    if let Some(at) = s.find("</ResourceStringTable>\n\t") {
        s.replace_range(at..at + "</ResourceStringTable>\n\t".len(), "");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_tooling_format() {
        let mut entries = BTreeMap::new();
        entries.insert(
            0x1234,
            DebugInfo {
                name: "wheel".to_owned(),
                type_name: "Model".to_owned(),
            },
        );
        assert_eq!(
            to_xml(&entries).unwrap(),
            "<ResourceStringTable>\n\t<Resource id=\"00001234\" type=\"Model\" name=\"wheel\"/>\n</ResourceStringTable>"
        );
        assert_eq!(to_xml(&BTreeMap::new()).unwrap(), "<ResourceStringTable/>");
    }

    #[test]
    fn parses_own_output() {
        let mut entries = BTreeMap::new();
        entries.insert(
            0xFF,
            DebugInfo {
                name: "a&b".to_owned(),
                type_name: "TextFile".to_owned(),
            },
        );
        entries.insert(
            0xC0FFEE,
            DebugInfo {
                name: "coffee".to_owned(),
                type_name: "Raster".to_owned(),
            },
        );
        let xml = to_xml(&entries).unwrap();
        assert_eq!(from_xml(&xml), entries);
    }

    #[test]
    fn repairs_broken_opening_tag() {
        let broken = "</ResourceStringTable>\n\t<Resource id=\"000000ff\" type=\"T\" name=\"N\"/></ResourceStringTable>\n\t";
        let repaired = repair_writer_quirks(broken);
        assert_eq!(
            repaired,
            "<ResourceStringTable>\n\t<Resource id=\"000000ff\" type=\"T\" name=\"N\"/>"
        );
        let entries = from_xml(&repaired);
        assert_eq!(entries[&0xFF].name, "N");
        assert_eq!(entries[&0xFF].type_name, "T");
    }

    #[test]
    fn parse_failure_yields_entries_seen_so_far() {
        let xml = "<ResourceStringTable>\n\t<Resource id=\"00000001\" type=\"T\" name=\"first\"/><Broken <<";
        let entries = from_xml(xml);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&1].name, "first");
    }
}
