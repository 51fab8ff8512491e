use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::cut::{OsmSink, OsmSource};
use crate::data::osm::{Member, MemberType, Meta, Node, OsmId, Relation, Way};
use crate::errors::Result;

/// Streaming reader for .osm/.osh XML files, optionally xz-compressed.
/// Every `stream` call opens the file afresh, which is what makes the
/// source re-readable for the two-pass cut.
pub struct XmlSource {
    path: PathBuf,
}

impl XmlSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> XmlSource {
        XmlSource { path: path.into() }
    }

    fn create_osm_reader(&self) -> Result<Reader<Box<dyn BufRead>>> {
        let file = fs::File::open(&self.path)?;
        let file_reader = BufReader::new(file);
        let buffered: Box<dyn BufRead> = if self.path.extension().map_or(false, |ext| ext == "xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        let mut reader = Reader::from_reader(buffered);
        reader.trim_text(true);
        Ok(reader)
    }
}

impl OsmSource for XmlSource {
    fn stream<S: OsmSink>(&self, sink: &mut S) -> Result<()> {
        let mut reader = self.create_osm_reader()?;
        parse_into(&mut reader, sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Nodes,
    Ways,
    Relations,
    Done,
}

impl Phase {
    fn next(self) -> Phase {
        match self {
            Phase::Nodes => Phase::Ways,
            Phase::Ways => Phase::Relations,
            Phase::Relations | Phase::Done => Phase::Done,
        }
    }
}

/// Monotonic (id, version) check within one object type.
#[derive(Default)]
struct OrderCheck {
    last: Option<(OsmId, u32)>,
}

impl OrderCheck {
    fn check(&mut self, kind: &str, id: OsmId, version: u32) -> Result<()> {
        if let Some((last_id, last_version)) = self.last {
            if id < last_id || (id == last_id && version <= last_version) {
                return Err(format!(
                    "input not sorted: {} {} v{} after {} v{}",
                    kind, id, version, last_id, last_version
                )
                .into());
            }
        }
        self.last = Some((id, version));
        Ok(())
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

enum Current {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

struct Parser<'a, S> {
    sink: &'a mut S,
    initialized: bool,
    phase: Phase,
    order: OrderCheck,
    current: Option<Current>,
}

impl<'a, S: OsmSink> Parser<'a, S> {
    fn new(sink: &'a mut S) -> Parser<'a, S> {
        Parser {
            sink,
            initialized: false,
            phase: Phase::Nodes,
            order: OrderCheck::default(),
            current: None,
        }
    }

    /// Fires the boundary callbacks between the current phase and `target`.
    /// An element of an already-closed phase is an ordering violation.
    fn advance(&mut self, target: Phase) -> Result<()> {
        if self.phase > target {
            return Err(
                "input not sorted: object types must arrive as nodes, ways, relations".into(),
            );
        }
        while self.phase < target {
            match self.phase {
                Phase::Nodes => self.sink.after_nodes()?,
                Phase::Ways => self.sink.after_ways()?,
                Phase::Relations => self.sink.after_relations()?,
                Phase::Done => unreachable!(),
            }
            self.phase = self.phase.next();
            self.order.reset();
        }
        Ok(())
    }

    fn check_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err("missing <osm> root element".into())
        }
    }

    /// Handles an opening or self-closing element. Self-closing object
    /// elements dispatch immediately; opened ones wait for their end tag
    /// while tag/nd/member children accumulate.
    fn element(&mut self, el: &BytesStart, self_closing: bool) -> Result<()> {
        match el.name().as_ref() {
            b"osm" => {
                if !self.initialized {
                    self.sink.init(&parse_meta(el)?)?;
                    self.initialized = true;
                }
            }
            b"node" => {
                self.check_initialized()?;
                self.advance(Phase::Nodes)?;
                let node = parse_node(el)?;
                self.order.check("node", node.id, node.version)?;
                if self_closing {
                    self.sink.node(&node)?;
                } else {
                    self.current = Some(Current::Node(node));
                }
            }
            b"way" => {
                self.check_initialized()?;
                self.advance(Phase::Ways)?;
                let way = parse_way(el)?;
                self.order.check("way", way.id, way.version)?;
                if self_closing {
                    self.sink.way(&way)?;
                } else {
                    self.current = Some(Current::Way(way));
                }
            }
            b"relation" => {
                self.check_initialized()?;
                self.advance(Phase::Relations)?;
                let relation = parse_relation(el)?;
                self.order.check("relation", relation.id, relation.version)?;
                if self_closing {
                    self.sink.relation(&relation)?;
                } else {
                    self.current = Some(Current::Relation(relation));
                }
            }
            b"tag" => {
                let tag = parse_tag(el)?;
                match self.current.as_mut() {
                    Some(Current::Node(node)) => node.tags.push(tag),
                    Some(Current::Way(way)) => way.tags.push(tag),
                    Some(Current::Relation(relation)) => relation.tags.push(tag),
                    None => (),
                }
            }
            b"nd" => {
                if let Some(Current::Way(way)) = self.current.as_mut() {
                    way.node_refs.push(parse_nd(el)?);
                }
            }
            b"member" => {
                if let Some(Current::Relation(relation)) = self.current.as_mut() {
                    relation.members.push(parse_member(el)?);
                }
            }
            // <bounds> and anything else carries no objects.
            _ => (),
        }
        Ok(())
    }

    fn end_element(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"node" | b"way" | b"relation" => match self.current.take() {
                Some(Current::Node(node)) => self.sink.node(&node),
                Some(Current::Way(way)) => self.sink.way(&way),
                Some(Current::Relation(relation)) => self.sink.relation(&relation),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Closes the stream: boundaries for phases the file never reached
    /// still fire, then `finish`.
    fn end_of_file(&mut self) -> Result<()> {
        self.check_initialized()?;
        self.advance(Phase::Done)?;
        self.sink.finish()
    }
}

/// Walks the XML event stream and replays it as sink callbacks: `init`
/// from the `<osm>` root, one call per object version, boundaries on type
/// transitions, the trailing boundaries and `finish` at end of file.
pub fn parse_into<R: BufRead, S: OsmSink>(reader: &mut Reader<R>, sink: &mut S) -> Result<()> {
    let mut parser = Parser::new(sink);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(e.into()),
            Ok(Event::Eof) => break,
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::DocType(_)) => (),
            Ok(Event::Start(el)) => parser.element(&el, false)?,
            Ok(Event::Empty(el)) => parser.element(&el, true)?,
            Ok(Event::End(el)) => parser.end_element(el.name().as_ref())?,
            Ok(Event::Text(_)) => return Err("Didn't expect to see Text in OSM file.".into()),
            Ok(event) => return Err(format!("unexpected XML event {:?}", event).into()),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    }

    parser.end_of_file()
}

fn parse_meta(el: &BytesStart) -> Result<Meta> {
    let mut meta = Meta::default();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = str::from_utf8(&attribute.value)?;
        match attribute.key.as_ref() {
            b"version" => meta.version = Some(value.to_string()),
            b"generator" => meta.generator = Some(value.to_string()),
            _ => (),
        }
    }
    Ok(meta)
}

fn parse_node(el: &BytesStart) -> Result<Node> {
    let mut node = Node {
        visible: true,
        ..Node::default()
    };
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = str::from_utf8(&attribute.value)?;
        match attribute.key.as_ref() {
            b"id" => node.id = value.parse()?,
            b"version" => node.version = value.parse()?,
            b"timestamp" => node.timestamp = Some(value.to_string()),
            b"changeset" => node.changeset = Some(value.parse()?),
            b"uid" => node.uid = Some(value.parse()?),
            b"user" => node.user = Some(attribute.unescape_value()?.into_owned()),
            b"visible" => node.visible = value == "true",
            b"lon" => node.lon = Some(value.parse()?),
            b"lat" => node.lat = Some(value.parse()?),
            _ => (),
        }
    }
    Ok(node)
}

fn parse_way(el: &BytesStart) -> Result<Way> {
    let mut way = Way {
        visible: true,
        ..Way::default()
    };
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = str::from_utf8(&attribute.value)?;
        match attribute.key.as_ref() {
            b"id" => way.id = value.parse()?,
            b"version" => way.version = value.parse()?,
            b"timestamp" => way.timestamp = Some(value.to_string()),
            b"changeset" => way.changeset = Some(value.parse()?),
            b"uid" => way.uid = Some(value.parse()?),
            b"user" => way.user = Some(attribute.unescape_value()?.into_owned()),
            b"visible" => way.visible = value == "true",
            _ => (),
        }
    }
    Ok(way)
}

fn parse_relation(el: &BytesStart) -> Result<Relation> {
    let mut relation = Relation {
        visible: true,
        ..Relation::default()
    };
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = str::from_utf8(&attribute.value)?;
        match attribute.key.as_ref() {
            b"id" => relation.id = value.parse()?,
            b"version" => relation.version = value.parse()?,
            b"timestamp" => relation.timestamp = Some(value.to_string()),
            b"changeset" => relation.changeset = Some(value.parse()?),
            b"uid" => relation.uid = Some(value.parse()?),
            b"user" => relation.user = Some(attribute.unescape_value()?.into_owned()),
            b"visible" => relation.visible = value == "true",
            _ => (),
        }
    }
    Ok(relation)
}

fn parse_tag(el: &BytesStart) -> Result<(String, String)> {
    let mut key = None;
    let mut value = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        match attribute.key.as_ref() {
            b"k" => key = Some(attribute.unescape_value()?.into_owned()),
            b"v" => value = Some(attribute.unescape_value()?.into_owned()),
            _ => (),
        }
    }
    match (key, value) {
        (Some(key), Some(value)) => Ok((key, value)),
        _ => Err("tag element without k/v attributes".into()),
    }
}

fn parse_nd(el: &BytesStart) -> Result<OsmId> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == b"ref" {
            return Ok(str::from_utf8(&attribute.value)?.parse()?);
        }
    }
    Err("nd element without ref attribute".into())
}

fn parse_member(el: &BytesStart) -> Result<Member> {
    let mut kind = None;
    let mut id = None;
    let mut role = String::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = str::from_utf8(&attribute.value)?;
        match attribute.key.as_ref() {
            b"type" => kind = MemberType::parse(value),
            b"ref" => id = Some(value.parse()?),
            b"role" => role = attribute.unescape_value()?.into_owned(),
            _ => (),
        }
    }
    match (kind, id) {
        (Some(kind), Some(id)) => Ok(Member { kind, id, role }),
        _ => Err("member element without type/ref attributes".into()),
    }
}
