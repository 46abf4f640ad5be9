use quick_xml::{
    events::{BytesStart, Event},
    name::ResolveResult,
    reader::NsReader,
};

use crate::error::PageSourceError;

/// Owned, namespace-resolved XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
    DocType(String),
}

impl XmlNode {
    pub fn kind(&self) -> &'static str {
        match self {
            XmlNode::Element(_) => "element",
            XmlNode::Text(_) => "text",
            XmlNode::CData(_) => "cdata",
            XmlNode::Comment(_) => "comment",
            XmlNode::ProcessingInstruction { .. } => "processing instruction",
            XmlNode::DocType(_) => "doctype",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: XmlName,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceBinding {
    /// No prefix and no default namespace in scope.
    None,
    Uri(String),
    /// A prefix the document never declared.
    Undeclared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlName {
    pub prefix: Option<String>,
    pub local: String,
    pub binding: NamespaceBinding,
}

impl XmlName {
    pub fn plain(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            binding: NamespaceBinding::None,
        }
    }

    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: XmlName,
    pub value: String,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, PageSourceError> {
        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut top_level: Vec<XmlNode> = Vec::new();
        let mut open: Vec<XmlElement> = Vec::new();
        let mut seen_root = false;

        loop {
            let position = reader.buffer_position() as u64;
            let malformed = |message: String| PageSourceError::Malformed { position, message };
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|err| malformed(err.to_string()))?;
            let binding = binding_of(resolved);

            let node = match event {
                Event::Start(start) => {
                    let element = element_from(&reader, &start, binding)?;
                    open.push(element);
                    continue;
                }
                Event::Empty(start) => XmlNode::Element(element_from(&reader, &start, binding)?),
                Event::End(_) => match open.pop() {
                    Some(element) => XmlNode::Element(element),
                    None => return Err(malformed("unexpected closing tag".to_string())),
                },
                Event::Text(text) => XmlNode::Text(
                    text.unescape()
                        .map_err(|err| malformed(err.to_string()))?
                        .into_owned(),
                ),
                Event::CData(data) => XmlNode::CData(utf8(&data, position)?),
                Event::Comment(comment) => XmlNode::Comment(utf8(&comment, position)?),
                Event::PI(instruction) => {
                    let content = utf8(&instruction, position)?;
                    let content = content.trim();
                    let (target, data) = content
                        .split_once(char::is_whitespace)
                        .unwrap_or((content, ""));
                    XmlNode::ProcessingInstruction {
                        target: target.to_string(),
                        data: data.trim().to_string(),
                    }
                }
                Event::DocType(doctype) => XmlNode::DocType(utf8(&doctype, position)?),
                Event::Decl(_) => continue,
                Event::Eof => break,
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => {
                    match &node {
                        XmlNode::Element(_) if seen_root => {
                            return Err(malformed("multiple root elements".to_string()))
                        }
                        XmlNode::Element(_) => seen_root = true,
                        XmlNode::Text(text) if !text.trim().is_empty() => {
                            return Err(malformed("text outside the root element".to_string()))
                        }
                        XmlNode::Text(_) => continue,
                        _ => {}
                    }
                    top_level.push(node);
                }
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(PageSourceError::Malformed {
                position: reader.buffer_position() as u64,
                message: format!("unclosed element `{}`", unclosed.name.qualified()),
            });
        }
        if !seen_root {
            return Err(PageSourceError::Malformed {
                position: reader.buffer_position() as u64,
                message: "document has no root element".to_string(),
            });
        }

        Ok(Self { nodes: top_level })
    }

    pub fn nodes(&self) -> &[XmlNode] {
        &self.nodes
    }

    pub fn root_element(&self) -> Option<&XmlElement> {
        self.nodes.iter().find_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }
}

fn binding_of(resolved: ResolveResult<'_>) -> NamespaceBinding {
    match resolved {
        ResolveResult::Bound(namespace) => {
            NamespaceBinding::Uri(String::from_utf8_lossy(namespace.into_inner()).into_owned())
        }
        ResolveResult::Unbound => NamespaceBinding::None,
        ResolveResult::Unknown(_) => NamespaceBinding::Undeclared,
    }
}

fn utf8(bytes: &[u8], position: u64) -> Result<String, PageSourceError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| PageSourceError::Malformed {
            position,
            message: err.to_string(),
        })
}

fn element_from(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    binding: NamespaceBinding,
) -> Result<XmlElement, PageSourceError> {
    let position = reader.buffer_position() as u64;
    let malformed = |message: String| PageSourceError::Malformed { position, message };

    let name = XmlName {
        prefix: start
            .name()
            .prefix()
            .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned()),
        local: utf8(start.local_name().as_ref(), position)?,
        binding,
    };

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| malformed(err.to_string()))?;
        let key = attribute.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attribute.key);
        let attribute_binding = binding_of(resolved);
        let value = attribute
            .unescape_value()
            .map_err(|err| malformed(err.to_string()))?
            .into_owned();
        attributes.push(XmlAttribute {
            name: XmlName {
                prefix: attribute
                    .key
                    .prefix()
                    .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned()),
                local: utf8(local.as_ref(), position)?,
                binding: attribute_binding,
            },
            value,
        });
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}
