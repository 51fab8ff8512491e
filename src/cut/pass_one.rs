use std::collections::HashMap;

use log::{debug, info};

use crate::cut::extract::Extract;
use crate::cut::OsmSink;
use crate::data::osm::{Meta, MemberType, Node, OsmId, Relation, Way};
use crate::errors::Result;

/// Run-scoped index of relation-of-relation membership: for each relation
/// id, the relations that have it as a member. Filled while relation
/// members are scanned, read by the cascade.
#[derive(Debug, Default)]
pub struct CascadingRelations {
    parents: HashMap<OsmId, Vec<OsmId>>,
}

impl CascadingRelations {
    pub fn record(&mut self, child: OsmId, parent: OsmId) {
        self.parents.entry(child).or_default().push(parent);
    }

    pub fn parents_of(&self, id: OsmId) -> &[OsmId] {
        self.parents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// First pass over the stream. Records per extract which node versions lie
/// inside the region, which ways touch those nodes (plus the nodes those
/// ways drag in), and which relations depend on any of it, transitively
/// through relations-of-relations.
pub struct PassOne<'a, W> {
    extracts: &'a mut [Extract<W>],
    cascading: &'a mut CascadingRelations,
}

impl<'a, W> PassOne<'a, W> {
    pub fn new(
        extracts: &'a mut [Extract<W>],
        cascading: &'a mut CascadingRelations,
    ) -> PassOne<'a, W> {
        PassOne {
            extracts,
            cascading,
        }
    }
}

/// Marks every untracked parent of `id` as tracked, repeatedly, until the
/// chain dries up. The already-tracked guard makes relation cycles
/// terminate.
fn cascade<W>(extract: &mut Extract<W>, id: OsmId, cascading: &CascadingRelations) {
    let mut pending = vec![id];
    while let Some(current) = pending.pop() {
        for &parent in cascading.parents_of(current) {
            if extract.relation_tracker.get(parent) {
                continue;
            }
            extract.relation_tracker.set(parent);
            pending.push(parent);
        }
    }
}

impl<W> OsmSink for PassOne<'_, W> {
    fn init(&mut self, _meta: &Meta) -> Result<()> {
        info!(pass = "first"; "softcut first pass starting");
        Ok(())
    }

    fn node(&mut self, node: &Node) -> Result<()> {
        // Deleted versions have no coordinate and land in no region.
        let Some((lon, lat)) = node.position() else {
            return Ok(());
        };
        for extract in self.extracts.iter_mut() {
            if extract.region.contains(lon, lat) {
                extract.node_tracker.set(node.id);
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            let hit = way
                .node_refs
                .iter()
                .any(|&node_ref| extract.node_tracker.get(node_ref));
            if !hit {
                continue;
            }
            extract.way_tracker.set(way.id);

            // Reference completeness for this version: every node the way
            // touches is pulled into the extract, inside the region or not.
            // Nodes referenced only by earlier, non-hit versions of the way
            // are not revisited; those versions can keep dangling refs in
            // the output.
            for &node_ref in &way.node_refs {
                extract.extra_node_tracker.set(node_ref);
            }
            debug!(extract = extract.name.as_str(), way = way.id; "way tracked");
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        // Parent edges are global, identical for every extract; record them
        // once before the per-extract scan.
        for member in &relation.members {
            if member.kind == MemberType::Relation {
                self.cascading.record(member.id, relation.id);
            }
        }

        for extract in self.extracts.iter_mut() {
            let mut hit = false;
            for member in &relation.members {
                // The tracker is read as the scan reaches each member; a
                // hit is not applied back to members already passed.
                if !hit
                    && match member.kind {
                        MemberType::Node => extract.node_tracker.get(member.id),
                        MemberType::Way => extract.way_tracker.get(member.id),
                        MemberType::Relation => extract.relation_tracker.get(member.id),
                    }
                {
                    hit = true;
                    extract.relation_tracker.set(relation.id);
                }
            }

            if hit {
                debug!(extract = extract.name.as_str(), relation = relation.id; "relation tracked");
                cascade(extract, relation.id, self.cascading);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!(pass = "first"; "softcut first pass finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::testing::{node, relation, way, MemorySource, RecordingSink};
    use crate::cut::OsmSource;
    use crate::data::region::Region;

    fn run_pass_one(
        source: &MemorySource,
        extracts: &mut [Extract<RecordingSink>],
    ) -> CascadingRelations {
        let mut cascading = CascadingRelations::default();
        let mut pass = PassOne::new(extracts, &mut cascading);
        source.stream(&mut pass).unwrap();
        cascading
    }

    fn unit_extract() -> Extract<RecordingSink> {
        Extract::new(
            "unit",
            Region::bbox(-1.0, -1.0, 1.0, 1.0),
            RecordingSink::default(),
        )
    }

    #[test]
    fn node_inside_region_is_tracked() {
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0), node(2, 1, 10.0, 10.0)],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        assert!(extracts[0].node_tracker.get(1));
        assert!(!extracts[0].node_tracker.get(2));
    }

    #[test]
    fn any_version_inside_tracks_the_id() {
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0), node(1, 2, 100.0, 50.0)],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        assert!(extracts[0].node_tracker.get(1));
    }

    #[test]
    fn deleted_node_version_is_not_tracked() {
        let mut deleted = node(3, 2, 0.0, 0.0);
        deleted.visible = false;
        deleted.lon = None;
        deleted.lat = None;
        let source = MemorySource {
            nodes: vec![deleted],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        assert!(!extracts[0].node_tracker.get(3));
    }

    #[test]
    fn way_touching_region_pulls_in_all_its_nodes() {
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0), node(2, 1, 10.0, 10.0)],
            ways: vec![way(100, 1, &[1, 2])],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        let extract = &extracts[0];
        assert!(extract.way_tracker.get(100));
        assert!(extract.extra_node_tracker.get(1));
        assert!(extract.extra_node_tracker.get(2));
        assert!(!extract.node_tracker.get(2));
    }

    #[test]
    fn way_outside_region_is_ignored() {
        let source = MemorySource {
            nodes: vec![node(2, 1, 10.0, 10.0)],
            ways: vec![way(100, 1, &[2])],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        let extract = &extracts[0];
        assert!(!extract.way_tracker.get(100));
        assert!(!extract.extra_node_tracker.get(2));
    }

    #[test]
    fn relation_hits_through_node_way_and_relation_members() {
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0), node(2, 1, 10.0, 10.0)],
            ways: vec![way(100, 1, &[1, 2])],
            relations: vec![
                relation(500, 1, &[(MemberType::Way, 100)]),
                relation(501, 1, &[(MemberType::Node, 1)]),
                relation(502, 1, &[(MemberType::Relation, 500)]),
                relation(503, 1, &[(MemberType::Node, 2)]),
            ],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        let extract = &extracts[0];
        assert!(extract.relation_tracker.get(500));
        assert!(extract.relation_tracker.get(501));
        assert!(extract.relation_tracker.get(502));
        assert!(!extract.relation_tracker.get(503));
    }

    #[test]
    fn cascade_reaches_parent_seen_before_child() {
        // Relation 600 (the parent) is streamed before 500 (the child that
        // hits); the parent edge recorded while scanning 600 must still
        // drag 600 in when 500 becomes tracked.
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0)],
            relations: vec![
                relation(600, 1, &[(MemberType::Relation, 500)]),
                relation(700, 1, &[(MemberType::Relation, 600)]),
                relation(500, 1, &[(MemberType::Node, 1)]),
            ],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        let extract = &extracts[0];
        assert!(extract.relation_tracker.get(500));
        assert!(extract.relation_tracker.get(600));
        assert!(extract.relation_tracker.get(700));
    }

    #[test]
    fn relation_cycle_terminates_and_tracks_both() {
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0)],
            relations: vec![
                relation(700, 1, &[(MemberType::Relation, 800), (MemberType::Node, 1)]),
                relation(800, 1, &[(MemberType::Relation, 700)]),
            ],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        run_pass_one(&source, &mut extracts);

        let extract = &extracts[0];
        assert!(extract.relation_tracker.get(700));
        assert!(extract.relation_tracker.get(800));
    }

    #[test]
    fn parent_edges_recorded_even_without_a_hit() {
        let source = MemorySource {
            relations: vec![relation(900, 1, &[(MemberType::Relation, 901)])],
            ..MemorySource::default()
        };
        let mut extracts = vec![unit_extract()];
        let cascading = run_pass_one(&source, &mut extracts);

        assert_eq!(cascading.parents_of(901), &[900]);
        assert!(!extracts[0].relation_tracker.get(900));
    }

    #[test]
    fn disjoint_regions_track_independently() {
        let source = MemorySource {
            nodes: vec![node(1, 1, 0.0, 0.0), node(2, 1, 10.0, 10.0)],
            ways: vec![way(100, 1, &[1, 2])],
            ..MemorySource::default()
        };
        let mut extracts = vec![
            unit_extract(),
            Extract::new(
                "east",
                Region::bbox(9.0, 9.0, 11.0, 11.0),
                RecordingSink::default(),
            ),
        ];
        run_pass_one(&source, &mut extracts);

        assert!(extracts[0].node_tracker.get(1));
        assert!(!extracts[0].node_tracker.get(2));
        assert!(extracts[1].node_tracker.get(2));
        assert!(!extracts[1].node_tracker.get(1));
        // The shared way lands in both, dragging the far node into each.
        assert!(extracts[0].way_tracker.get(100));
        assert!(extracts[1].way_tracker.get(100));
        assert!(extracts[0].extra_node_tracker.get(2));
        assert!(extracts[1].extra_node_tracker.get(1));
    }
}
