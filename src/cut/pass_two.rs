use log::info;

use crate::cut::extract::Extract;
use crate::cut::OsmSink;
use crate::data::osm::{Meta, Node, Relation, Way};
use crate::errors::Result;

/// Second pass over the stream. Selection is by id: every version of a
/// tracked object goes to the writer, in input order. Boundary callbacks
/// are forwarded to every writer so output files open, section and close
/// in step with the stream.
pub struct PassTwo<'a, W> {
    extracts: &'a mut [Extract<W>],
}

impl<'a, W: OsmSink> PassTwo<'a, W> {
    pub fn new(extracts: &'a mut [Extract<W>]) -> PassTwo<'a, W> {
        PassTwo { extracts }
    }
}

impl<W: OsmSink> OsmSink for PassTwo<'_, W> {
    fn init(&mut self, meta: &Meta) -> Result<()> {
        info!(pass = "second"; "softcut second pass starting");
        for extract in self.extracts.iter_mut() {
            extract.writer.init(meta)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.node_tracker.get(node.id) || extract.extra_node_tracker.get(node.id) {
                extract.writer.node(node)?;
            }
        }
        Ok(())
    }

    fn after_nodes(&mut self) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            extract.writer.after_nodes()?;
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.way_tracker.get(way.id) {
                extract.writer.way(way)?;
            }
        }
        Ok(())
    }

    fn after_ways(&mut self) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            extract.writer.after_ways()?;
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.relation_tracker.get(relation.id) {
                extract.writer.relation(relation)?;
            }
        }
        Ok(())
    }

    fn after_relations(&mut self) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            extract.writer.after_relations()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            extract.writer.finish()?;
        }
        info!(pass = "second"; "softcut second pass finished");
        Ok(())
    }
}
