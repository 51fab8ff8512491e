use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;

use crate::cut::OsmSink;
use crate::data::osm::{Meta, Node, OsmId, Relation, Tags, Way};
use crate::errors::Result;

/// Writes one extract as .osm XML. The output file is created on `init`
/// and closed on `finish`, so its lifetime is exactly the second pass.
/// Objects are written as received; nothing is altered or reordered.
pub struct XmlWriter {
    path: PathBuf,
    out: Option<Writer<BufWriter<File>>>,
}

impl XmlWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> XmlWriter {
        XmlWriter {
            path: path.into(),
            out: None,
        }
    }

    fn out(&mut self) -> Result<&mut Writer<BufWriter<File>>> {
        self.out.as_mut().ok_or_else(|| "output file not open".into())
    }

    fn write_element(&mut self, el: BytesStart<'static>, name: &str, tags: &Tags) -> Result<()> {
        let out = self.out()?;
        if tags.is_empty() {
            out.write_event(Event::Empty(el))?;
        } else {
            out.write_event(Event::Start(el))?;
            for (key, value) in tags {
                let mut tag = BytesStart::new("tag");
                tag.push_attribute(("k", key.as_str()));
                tag.push_attribute(("v", value.as_str()));
                out.write_event(Event::Empty(tag))?;
            }
            out.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }
}

fn push_info(
    el: &mut BytesStart,
    id: OsmId,
    version: u32,
    timestamp: &Option<String>,
    changeset: &Option<u64>,
    uid: &Option<u64>,
    user: &Option<String>,
    visible: bool,
) {
    el.push_attribute(("id", id.to_string().as_str()));
    el.push_attribute(("version", version.to_string().as_str()));
    if let Some(timestamp) = timestamp {
        el.push_attribute(("timestamp", timestamp.as_str()));
    }
    if let Some(changeset) = changeset {
        el.push_attribute(("changeset", changeset.to_string().as_str()));
    }
    if let Some(uid) = uid {
        el.push_attribute(("uid", uid.to_string().as_str()));
    }
    if let Some(user) = user {
        el.push_attribute(("user", user.as_str()));
    }
    el.push_attribute(("visible", if visible { "true" } else { "false" }));
}

impl OsmSink for XmlWriter {
    fn init(&mut self, meta: &Meta) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut out = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
        out.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut osm = BytesStart::new("osm");
        osm.push_attribute(("version", meta.version.as_deref().unwrap_or("0.6")));
        if let Some(generator) = &meta.generator {
            osm.push_attribute(("generator", generator.as_str()));
        }
        out.write_event(Event::Start(osm))?;

        self.out = Some(out);
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        let mut el = BytesStart::new("node");
        push_info(
            &mut el,
            node.id,
            node.version,
            &node.timestamp,
            &node.changeset,
            &node.uid,
            &node.user,
            node.visible,
        );
        // Deleted versions have no coordinate to write.
        if let Some(lon) = node.lon {
            el.push_attribute(("lon", format!("{:.7}", lon).as_str()));
        }
        if let Some(lat) = node.lat {
            el.push_attribute(("lat", format!("{:.7}", lat).as_str()));
        }
        self.write_element(el, "node", &node.tags)
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        let mut el = BytesStart::new("way");
        push_info(
            &mut el,
            way.id,
            way.version,
            &way.timestamp,
            &way.changeset,
            &way.uid,
            &way.user,
            way.visible,
        );

        let out = self.out()?;
        if way.node_refs.is_empty() && way.tags.is_empty() {
            out.write_event(Event::Empty(el))?;
            return Ok(());
        }
        out.write_event(Event::Start(el))?;
        for node_ref in &way.node_refs {
            let mut nd = BytesStart::new("nd");
            nd.push_attribute(("ref", node_ref.to_string().as_str()));
            out.write_event(Event::Empty(nd))?;
        }
        for (key, value) in &way.tags {
            let mut tag = BytesStart::new("tag");
            tag.push_attribute(("k", key.as_str()));
            tag.push_attribute(("v", value.as_str()));
            out.write_event(Event::Empty(tag))?;
        }
        out.write_event(Event::End(BytesEnd::new("way")))?;
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        let mut el = BytesStart::new("relation");
        push_info(
            &mut el,
            relation.id,
            relation.version,
            &relation.timestamp,
            &relation.changeset,
            &relation.uid,
            &relation.user,
            relation.visible,
        );

        let out = self.out()?;
        if relation.members.is_empty() && relation.tags.is_empty() {
            out.write_event(Event::Empty(el))?;
            return Ok(());
        }
        out.write_event(Event::Start(el))?;
        for member in &relation.members {
            let mut member_el = BytesStart::new("member");
            member_el.push_attribute(("type", member.kind.as_str()));
            member_el.push_attribute(("ref", member.id.to_string().as_str()));
            member_el.push_attribute(("role", member.role.as_str()));
            out.write_event(Event::Empty(member_el))?;
        }
        for (key, value) in &relation.tags {
            let mut tag = BytesStart::new("tag");
            tag.push_attribute(("k", key.as_str()));
            tag.push_attribute(("v", value.as_str()));
            out.write_event(Event::Empty(tag))?;
        }
        out.write_event(Event::End(BytesEnd::new("relation")))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut out = self.out.take().ok_or("output file not open")?;
        out.write_event(Event::End(BytesEnd::new("osm")))?;
        out.into_inner().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{Member, MemberType};
    use std::fs;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("osm-softcut-{}-{}", std::process::id(), name))
    }

    #[test]
    fn writes_a_complete_document() {
        let path = scratch_path("writer.osm");
        let mut writer = XmlWriter::new(&path);

        let meta = Meta {
            version: Some("0.6".to_string()),
            generator: Some("osm-softcut".to_string()),
        };
        writer.init(&meta).unwrap();
        writer
            .node(&Node {
                id: 1,
                version: 2,
                timestamp: Some("2020-01-01T00:00:00Z".to_string()),
                visible: true,
                lon: Some(0.5),
                lat: Some(-0.25),
                tags: vec![("name".to_string(), "A & B".to_string())],
                ..Node::default()
            })
            .unwrap();
        writer.after_nodes().unwrap();
        writer
            .way(&Way {
                id: 100,
                version: 1,
                visible: true,
                node_refs: vec![1, 2],
                ..Way::default()
            })
            .unwrap();
        writer.after_ways().unwrap();
        writer
            .relation(&Relation {
                id: 500,
                version: 1,
                visible: true,
                members: vec![Member {
                    kind: MemberType::Way,
                    id: 100,
                    role: "outer".to_string(),
                }],
                ..Relation::default()
            })
            .unwrap();
        writer.after_relations().unwrap();
        writer.finish().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(written.starts_with("<?xml"));
        assert!(written.contains(r#"<osm version="0.6" generator="osm-softcut">"#));
        assert!(written.contains(r#"id="1""#));
        assert!(written.contains(r#"lon="0.5000000""#));
        assert!(written.contains(r#"v="A &amp; B""#));
        assert!(written.contains(r#"<nd ref="1"/>"#));
        assert!(written.contains(r#"<member type="way" ref="100" role="outer"/>"#));
        assert!(written.trim_end().ends_with("</osm>"));
    }

    #[test]
    fn deleted_node_gets_no_coordinates() {
        let path = scratch_path("deleted.osm");
        let mut writer = XmlWriter::new(&path);

        writer.init(&Meta::default()).unwrap();
        writer
            .node(&Node {
                id: 9,
                version: 3,
                visible: false,
                ..Node::default()
            })
            .unwrap();
        writer.finish().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(written.contains(r#"visible="false""#));
        assert!(!written.contains("lon="));
        assert!(!written.contains("lat="));
    }

    #[test]
    fn writing_before_init_fails() {
        let mut writer = XmlWriter::new(scratch_path("uninit.osm"));
        assert!(writer.node(&Node::default()).is_err());
    }
}
