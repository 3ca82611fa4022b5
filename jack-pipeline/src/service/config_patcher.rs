//! Job configuration patching
//!
//! A job's `config.xml` is owned by the server and mostly opaque to us. The
//! document is kept as a lossless tree of the parser's events: tags,
//! attributes, text, comments and the declaration are written back exactly
//! as read. Only two fields are typed and writable: the first
//! `definition/script` of the root `flow-definition`, and its top-level
//! `quietPeriod`.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{PipelineError, Result};

const ROOT_ELEMENT: &[u8] = b"flow-definition";
const DEFINITION_ELEMENT: &[u8] = b"definition";
const SCRIPT_ELEMENT: &str = "script";
const QUIET_PERIOD_ELEMENT: &str = "quietPeriod";

/// Configuration used when the job does not exist yet
pub const PIPELINE_TEMPLATE: &str = r#"<?xml version='1.1' encoding='UTF-8'?>
<flow-definition plugin="workflow-job">
  <actions/>
  <description></description>
  <keepDependencies>false</keepDependencies>
  <properties/>
  <definition class="org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition" plugin="workflow-cps">
    <script></script>
    <sandbox>true</sandbox>
  </definition>
  <triggers/>
  <disabled>false</disabled>
</flow-definition>
"#;

/// Injects `script` into a configuration document and zeroes its quiet period
///
/// Every other part of the document is preserved. Malformed input fails with
/// [`PipelineError::ConfigParse`] before anything is produced.
pub fn patch_config(xml: &str, script: &str) -> Result<String> {
    let mut document = JobConfigDocument::parse(xml)?;
    document.set_script(script)?;
    document.set_quiet_period(0)?;
    document.to_xml()
}

/// A parsed job configuration
#[derive(Debug, Clone)]
pub struct JobConfigDocument {
    nodes: Vec<XmlNode>,
}

#[derive(Debug, Clone)]
enum XmlNode {
    Element(XmlElement),
    /// Text, CDATA, comments, declarations, processing instructions
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
struct XmlElement {
    start: BytesStart<'static>,
    children: Vec<XmlNode>,
    self_closing: bool,
}

impl XmlElement {
    fn new(name: &'static str) -> Self {
        Self {
            start: BytesStart::new(name),
            children: Vec::new(),
            self_closing: false,
        }
    }

    fn is(&self, name: &[u8]) -> bool {
        self.start.name().as_ref() == name
    }

    fn child(&self, name: &[u8]) -> Option<&XmlElement> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    fn child_mut(&mut self, name: &[u8]) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    /// Returns the named child, appending an empty one if absent
    fn child_or_insert(&mut self, name: &'static str) -> &mut XmlElement {
        let position = self
            .children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(el) if el.is(name.as_bytes())));

        let index = match position {
            Some(index) => index,
            None => {
                self.self_closing = false;
                self.children.push(XmlNode::Element(XmlElement::new(name)));
                self.children.len() - 1
            }
        };

        match &mut self.children[index] {
            XmlNode::Element(el) => el,
            XmlNode::Other(_) => unreachable!("position only matches elements"),
        }
    }

    /// Concatenated text and CDATA content
    fn text(&self) -> Result<String> {
        let mut text = String::new();
        for node in &self.children {
            match node {
                XmlNode::Other(Event::Text(t)) => {
                    let unescaped = t.unescape().map_err(|e| {
                        PipelineError::ConfigParse(format!("Invalid text content: {}", e))
                    })?;
                    text.push_str(&unescaped);
                }
                XmlNode::Other(Event::CData(c)) => {
                    text.push_str(&String::from_utf8_lossy(c));
                }
                _ => {}
            }
        }
        Ok(text)
    }

    /// Replaces all content with a single escaped text node
    fn set_text(&mut self, value: &str) {
        self.self_closing = false;
        self.children = vec![XmlNode::Other(Event::Text(BytesText::new(value).into_owned()))];
    }
}

impl JobConfigDocument {
    /// Parses a configuration document
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut top_level: Vec<XmlNode> = Vec::new();
        let mut open: Vec<XmlElement> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                PipelineError::ConfigParse(format!(
                    "Malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            let node = match event {
                Event::Eof => break,
                Event::Start(start) => {
                    open.push(XmlElement {
                        start: start.into_owned(),
                        children: Vec::new(),
                        self_closing: false,
                    });
                    continue;
                }
                Event::End(_) => match open.pop() {
                    Some(element) => XmlNode::Element(element),
                    None => {
                        return Err(PipelineError::ConfigParse(
                            "Unexpected closing tag".to_string(),
                        ));
                    }
                },
                Event::Empty(start) => XmlNode::Element(XmlElement {
                    start: start.into_owned(),
                    children: Vec::new(),
                    self_closing: true,
                }),
                other => XmlNode::Other(other.into_owned()),
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => top_level.push(node),
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(PipelineError::ConfigParse(format!(
                "Unclosed element <{}>",
                String::from_utf8_lossy(unclosed.start.name().as_ref())
            )));
        }

        let document = Self { nodes: top_level };
        document.root()?;
        Ok(document)
    }

    /// The pipeline script, if the definition carries one
    pub fn script(&self) -> Result<Option<String>> {
        let root = self.root()?;
        match root.child(DEFINITION_ELEMENT).and_then(|d| d.child(SCRIPT_ELEMENT.as_bytes())) {
            Some(script) => script.text().map(Some),
            None => Ok(None),
        }
    }

    /// Sets the pipeline script of the first `definition`
    pub fn set_script(&mut self, script: &str) -> Result<()> {
        let definition = self.root_mut()?.child_mut(DEFINITION_ELEMENT).ok_or_else(|| {
            PipelineError::ConfigParse("Job configuration has no pipeline definition".to_string())
        })?;

        definition.child_or_insert(SCRIPT_ELEMENT).set_text(script);
        Ok(())
    }

    /// The quiet period in seconds, if set
    pub fn quiet_period(&self) -> Result<Option<u64>> {
        let root = self.root()?;
        let Some(element) = root.child(QUIET_PERIOD_ELEMENT.as_bytes()) else {
            return Ok(None);
        };

        let text = element.text()?;
        text.trim().parse::<u64>().map(Some).map_err(|_| {
            PipelineError::ConfigParse(format!("Invalid quietPeriod value: {:?}", text))
        })
    }

    /// Sets the top-level quiet period, adding the field if absent
    pub fn set_quiet_period(&mut self, seconds: u64) -> Result<()> {
        self.root_mut()?
            .child_or_insert(QUIET_PERIOD_ELEMENT)
            .set_text(&seconds.to_string());
        Ok(())
    }

    /// Serializes the document
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }

        String::from_utf8(writer.into_inner())
            .map_err(|e| PipelineError::ConfigParse(format!("Serialized XML is not UTF-8: {}", e)))
    }

    fn root(&self) -> Result<&XmlElement> {
        let root = self
            .nodes
            .iter()
            .find_map(|node| match node {
                XmlNode::Element(el) => Some(el),
                XmlNode::Other(_) => None,
            })
            .ok_or_else(|| PipelineError::ConfigParse("Document has no root element".to_string()))?;

        if !root.is(ROOT_ELEMENT) {
            return Err(PipelineError::ConfigParse(format!(
                "Expected <flow-definition> root, found <{}>",
                String::from_utf8_lossy(root.start.name().as_ref())
            )));
        }

        Ok(root)
    }

    fn root_mut(&mut self) -> Result<&mut XmlElement> {
        // Validates the root before handing out a mutable borrow
        self.root()?;

        self.nodes
            .iter_mut()
            .find_map(|node| match node {
                XmlNode::Element(el) => Some(el),
                XmlNode::Other(_) => None,
            })
            .ok_or_else(|| PipelineError::ConfigParse("Document has no root element".to_string()))
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Other(event) => write_event(writer, event.clone()),
        XmlNode::Element(el) if el.self_closing && el.children.is_empty() => {
            write_event(writer, Event::Empty(el.start.clone()))
        }
        XmlNode::Element(el) => {
            write_event(writer, Event::Start(el.start.clone()))?;
            for child in &el.children {
                write_node(writer, child)?;
            }
            write_event(writer, Event::End(el.start.to_end().into_owned()))
        }
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| PipelineError::ConfigParse(format!("Failed to serialize XML: {}", e)))
}
