pub mod bitset;
pub mod extract;
pub mod pass_one;
pub mod pass_two;

use log::info;

use crate::cut::extract::Extract;
use crate::cut::pass_one::{CascadingRelations, PassOne};
use crate::cut::pass_two::PassTwo;
use crate::data::osm::{Meta, Node, Relation, Way};
use crate::errors::Result;

/// Receiver side of an OSM object stream. Producers call `init` once, then
/// every node, way and relation version in that order with a boundary call
/// between the types, then `finish`. Both cut passes and every output
/// writer are sinks.
pub trait OsmSink {
    fn init(&mut self, _meta: &Meta) -> Result<()> {
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()>;

    fn after_nodes(&mut self) -> Result<()> {
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()>;

    fn after_ways(&mut self) -> Result<()> {
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()>;

    fn after_relations(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An input that can be streamed into a sink more than once. The cut reads
/// its source twice, so one-shot streams do not qualify.
pub trait OsmSource {
    fn stream<S: OsmSink>(&self, sink: &mut S) -> Result<()>;
}

/// Runs the two-pass cut: the first pass fills every extract's trackers,
/// the second routes each object version to the extracts that selected it.
/// Writers see their `init` at the start of the second pass and their
/// `finish` at its end.
pub fn softcut<I: OsmSource, W: OsmSink>(source: &I, extracts: &mut [Extract<W>]) -> Result<()> {
    for extract in extracts.iter() {
        info!(extract = extract.name.as_str(); "cutting extract");
    }

    let mut cascading = CascadingRelations::default();
    {
        let mut pass = PassOne::new(extracts, &mut cascading);
        source.stream(&mut pass)?;
    }
    // Only the first pass reads the relation parent index.
    drop(cascading);

    let mut pass = PassTwo::new(extracts);
    source.stream(&mut pass)?;

    info!(extracts = extracts.len(); "softcut finished");
    Ok(())
}
