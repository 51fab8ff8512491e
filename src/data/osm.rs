pub type OsmId = u64;

pub type Tags = Vec<(String, String)>;

/// File-level metadata from the stream header, replayed into each output.
#[derive(Debug, Default, Clone)]
pub struct Meta {
    pub version: Option<String>,
    pub generator: Option<String>,
}

/// One historical version of a node. Deleted versions carry no coordinate.
#[derive(Debug, Default, Clone)]
pub struct Node {
    pub id: OsmId,
    pub version: u32,
    pub timestamp: Option<String>,
    pub changeset: Option<u64>,
    pub uid: Option<u64>,
    pub user: Option<String>,
    pub visible: bool,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub tags: Tags,
}

impl Node {
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Way {
    pub id: OsmId,
    pub version: u32,
    pub timestamp: Option<String>,
    pub changeset: Option<u64>,
    pub uid: Option<u64>,
    pub user: Option<String>,
    pub visible: bool,
    pub node_refs: Vec<OsmId>,
    pub tags: Tags,
}

#[derive(Debug, Default, Clone)]
pub struct Relation {
    pub id: OsmId,
    pub version: u32,
    pub timestamp: Option<String>,
    pub changeset: Option<u64>,
    pub uid: Option<u64>,
    pub user: Option<String>,
    pub visible: bool,
    pub members: Vec<Member>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl MemberType {
    pub fn parse(value: &str) -> Option<MemberType> {
        match value {
            "node" => Some(MemberType::Node),
            "way" => Some(MemberType::Way),
            "relation" => Some(MemberType::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberType::Node => "node",
            MemberType::Way => "way",
            MemberType::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub kind: MemberType,
    pub id: OsmId,
    pub role: String,
}
