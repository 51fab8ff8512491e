use geo::prelude::Contains;
use geo::{LineString, Point, Polygon};

/// Geographic membership test for one extract. Bounding boxes include their
/// edges; polygon containment follows `geo` and excludes the boundary.
#[derive(Debug, Clone)]
pub enum Region {
    Bbox {
        minlon: f64,
        minlat: f64,
        maxlon: f64,
        maxlat: f64,
    },
    Polygon(Polygon<f64>),
}

impl Region {
    pub fn bbox(minlon: f64, minlat: f64, maxlon: f64, maxlat: f64) -> Region {
        Region::Bbox {
            minlon,
            minlat,
            maxlon,
            maxlat,
        }
    }

    pub fn polygon(points: &[[f64; 2]]) -> Region {
        let ring: Vec<(f64, f64)> = points.iter().map(|p| (p[0], p[1])).collect();
        Region::Polygon(Polygon::new(LineString::from(ring), Vec::new()))
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Region::Bbox {
                minlon,
                minlat,
                maxlon,
                maxlat,
            } => lon >= *minlon && lon <= *maxlon && lat >= *minlat && lat <= *maxlat,
            Region::Polygon(polygon) => polygon.contains(&Point::new(lon, lat)),
        }
    }
}
