/// Map data as it appears in the .osm/.osh history file, and the region
/// geometries extracts are cut with. Elements are kept without any processing.

pub mod osm;
pub mod region;
