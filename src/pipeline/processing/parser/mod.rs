//! Generic XML tree for the registry extract.
//!
//! The extract mixes attributes and inline text freely, and repeats elements a
//! variable number of times. Rather than binding it to fixed structs, the whole
//! document is read into an `XmlValue` tree shaped the way loosely-typed XML
//! readers shape it:
//!
//! - an element with only text becomes `Scalar(text)`
//! - an element with attributes or child elements becomes `Node`, attributes
//!   merged in as scalar children and any inline text kept in the text slot
//! - an element name that occurs more than once under the same parent becomes
//!   a `List` in document order
//!
//! The accessors in [`extract`] hide those shape differences from callers.

pub mod extract;

use crate::error::{IngestError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XmlValue {
    Scalar(String),
    List(Vec<XmlValue>),
    Node(XmlNode),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct XmlNode {
    #[serde(flatten)]
    pub children: BTreeMap<String, XmlValue>,
    #[serde(rename = "_", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl XmlNode {
    /// Adds a child, promoting repeated names to a list.
    fn insert(&mut self, name: String, value: XmlValue) {
        match self.children.remove(&name) {
            None => {
                self.children.insert(name, value);
            }
            Some(XmlValue::List(mut items)) => {
                items.push(value);
                self.children.insert(name, XmlValue::List(items));
            }
            Some(existing) => {
                self.children.insert(name, XmlValue::List(vec![existing, value]));
            }
        }
    }
}

/// A fully parsed document: the root element's name and its content.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root_name: String,
    pub root: XmlValue,
}

impl XmlDocument {
    /// The per-entity nodes, in document order.
    ///
    /// A document whose root is itself the record element is treated as a single record.
    pub fn records(&self, element: &str) -> Vec<&XmlValue> {
        if self.root_name == element {
            return vec![&self.root];
        }
        extract::list_of(self.root.get(element))
    }
}

/// Trait for turning raw source bytes into a document tree
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<XmlDocument>;
}

/// Full-tree parser over quick-xml's pull reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlTreeParser;

/// An element that has been opened but not yet closed.
struct OpenElement {
    name: String,
    node: XmlNode,
    has_children: bool,
    text: String,
}

impl OpenElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let mut node = XmlNode::default();
        let mut has_children = false;
        for attr in start.attributes() {
            let attr = attr.map_err(|e| IngestError::Parse(format!("bad attribute on <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr.unescape_value()?.trim().to_string();
            node.insert(key, XmlValue::Scalar(value));
            has_children = true;
        }
        Ok(Self {
            name,
            node,
            has_children,
            text: String::new(),
        })
    }

    fn finish(self) -> (String, XmlValue) {
        let text = self.text.trim().to_string();
        if !self.has_children {
            return (self.name, XmlValue::Scalar(text));
        }
        let mut node = self.node;
        if !text.is_empty() {
            node.text = Some(text);
        }
        (self.name, XmlValue::Node(node))
    }
}

impl DocumentParser for XmlTreeParser {
    fn parse(&self, bytes: &[u8]) -> Result<XmlDocument> {
        debug!("XmlTreeParser: start bytes_len={}", bytes.len());
        // Invalid UTF-8 becomes U+FFFD so one bad byte only affects its own field
        let decoded = String::from_utf8_lossy(bytes);
        let mut reader = Reader::from_reader(decoded.as_bytes());
        let mut buf = Vec::with_capacity(8192);
        let mut stack: Vec<OpenElement> = Vec::new();
        let mut document: Option<XmlDocument> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                IngestError::Parse(format!("{} (at byte {})", e, reader.buffer_position()))
            })?;

            match event {
                Event::Start(ref e) => {
                    if document.is_some() {
                        return Err(IngestError::Parse(
                            "content found after the root element".to_string(),
                        ));
                    }
                    stack.push(OpenElement::from_start(e)?);
                }
                Event::Empty(ref e) => {
                    let (name, value) = OpenElement::from_start(e)?.finish();
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.node.insert(name, value);
                            parent.has_children = true;
                        }
                        None if document.is_none() => {
                            document = Some(XmlDocument {
                                root_name: name,
                                root: value,
                            });
                        }
                        None => {
                            return Err(IngestError::Parse(
                                "content found after the root element".to_string(),
                            ));
                        }
                    }
                }
                Event::Text(ref e) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(ref e) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(&e.to_vec()));
                    }
                }
                Event::End(_) => {
                    let open = stack.pop().ok_or_else(|| {
                        IngestError::Parse("closing tag without a matching opening tag".to_string())
                    })?;
                    let (name, value) = open.finish();
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.node.insert(name, value);
                            parent.has_children = true;
                        }
                        None => {
                            document = Some(XmlDocument {
                                root_name: name,
                                root: value,
                            });
                        }
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and doctypes carry no data
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(IngestError::Parse(format!(
                "unexpected end of document: <{}> is never closed",
                open.name
            )));
        }

        let document = document
            .ok_or_else(|| IngestError::Parse("document has no root element".to_string()))?;
        debug!("XmlTreeParser: parsed root <{}>", document.root_name);
        Ok(document)
    }
}

/// Parses a complete document held in memory.
pub fn parse_document(xml: &str) -> Result<XmlDocument> {
    XmlTreeParser.parse(xml.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_element_is_scalar() {
        let doc = parse_document("<Root><Name>ACME</Name></Root>").unwrap();
        assert_eq!(doc.root_name, "Root");
        assert_eq!(doc.root.get("Name"), Some(&XmlValue::Scalar("ACME".into())));
    }

    #[test]
    fn test_attributes_merge_with_text_slot() {
        let doc = parse_document(r#"<Root><ABN status="ACT">51824753556</ABN></Root>"#).unwrap();
        let abn = doc.root.get("ABN").unwrap();
        match abn {
            XmlValue::Node(node) => {
                assert_eq!(node.text.as_deref(), Some("51824753556"));
                assert_eq!(node.children.get("status"), Some(&XmlValue::Scalar("ACT".into())));
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_elements_become_list() {
        let doc = parse_document("<Root><ABR><A>1</A></ABR><ABR><A>2</A></ABR><ABR><A>3</A></ABR></Root>")
            .unwrap();
        assert_eq!(doc.records("ABR").len(), 3);
    }

    #[test]
    fn test_single_record_document() {
        let doc = parse_document(r#"<?xml version="1.0"?><ABR><ABN>1</ABN></ABR>"#).unwrap();
        assert_eq!(doc.records("ABR").len(), 1);
    }

    #[test]
    fn test_empty_element_without_attributes_is_empty_scalar() {
        let doc = parse_document("<Root><GST/></Root>").unwrap();
        assert_eq!(doc.root.get("GST"), Some(&XmlValue::Scalar(String::new())));
    }

    #[test]
    fn test_entities_are_unescaped() {
        let doc = parse_document("<Root><Name>SMITH &amp; SONS</Name></Root>").unwrap();
        assert_eq!(doc.root.text_at(&["Name"]), Some("SMITH & SONS"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_fatal() {
        let bytes = b"<Root><A>CAF\xE9 PTY LTD</A><B t=\"x\xFFy\">OK</B></Root>";
        let doc = XmlTreeParser.parse(bytes).unwrap();
        assert_eq!(doc.root.text_at(&["A"]), Some("CAF\u{FFFD} PTY LTD"));
        assert_eq!(doc.root.text_at(&["B", "t"]), Some("x\u{FFFD}y"));
        assert_eq!(doc.root.text_at(&["B"]), Some("OK"));
    }

    #[test]
    fn test_malformed_documents_fail() {
        assert!(parse_document("<Root><A></B></Root>").is_err());
        assert!(parse_document("<Root><A>").is_err());
        assert!(parse_document("").is_err());
        assert!(parse_document("<Root/><Other/>").is_err());
    }
}
