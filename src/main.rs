mod cut;
mod data;
mod errors;
mod osm_xml;

use std::env;
use std::fs::{create_dir_all, File};
use std::io;
use std::path::{Path, PathBuf};

use log::error;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::cut::extract::Extract;
use crate::data::region::Region;
use crate::errors::Result;
use crate::osm_xml::reader::XmlSource;
use crate::osm_xml::writer::XmlWriter;

#[derive(Deserialize)]
pub struct UserConfig {
    pub data_path: String,
    pub extracts: Vec<ExtractConfig>,
}

/// One extract to cut: a name, an optional output file name (defaults to
/// `<name>.osm`), and exactly one of `bbox` (minlon, minlat, maxlon,
/// maxlat) or `polygon` (list of [lon, lat] points).
#[derive(Deserialize)]
pub struct ExtractConfig {
    pub name: String,
    pub output_file: Option<String>,
    pub bbox: Option<[f64; 4]>,
    pub polygon: Option<Vec<[f64; 2]>>,
}

impl ExtractConfig {
    fn region(&self) -> Result<Region> {
        match (&self.bbox, &self.polygon) {
            (Some(bbox), None) => Ok(Region::bbox(bbox[0], bbox[1], bbox[2], bbox[3])),
            (None, Some(points)) if points.len() >= 3 => Ok(Region::polygon(points)),
            (None, Some(_)) => {
                Err(format!("extract {}: polygon needs at least 3 points", self.name).into())
            }
            _ => Err(format!(
                "extract {}: specify exactly one of bbox or polygon",
                self.name
            )
            .into()),
        }
    }

    fn output_file(&self) -> String {
        match &self.output_file {
            Some(output_file) => output_file.clone(),
            None => format!("{}.osm", self.name),
        }
    }
}

fn load_user_config(path: &str) -> UserConfig {
    let file = File::open(path).expect("Could not open config file.");
    serde_json::from_reader(file).expect("Could not parse config.")
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new("output").join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| "softcut.json".to_string());
    let user_config = load_user_config(&config_path);
    let output_dir = create_output_dir(&user_config)?;

    let mut extracts = Vec::new();
    for extract_config in &user_config.extracts {
        let writer = XmlWriter::new(output_dir.join(extract_config.output_file()));
        extracts.push(Extract::new(
            &extract_config.name,
            extract_config.region()?,
            writer,
        ));
    }
    if extracts.is_empty() {
        return Err("no extracts configured".into());
    }

    let source = XmlSource::new(user_config.data_path.as_str());
    match cut::softcut(&source, &mut extracts) {
        Ok(()) => Ok(()),
        Err(err) => {
            error!(err = err.message.as_str(); "softcut failed, extracts are incomplete");
            Err(err)
        }
    }
}
