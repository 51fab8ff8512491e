/// Reading and writing of the OSM XML container. The reader turns a file
/// into sink callbacks; the writer is a sink that turns callbacks back
/// into a file, one per extract.

pub mod reader;
pub mod writer;
