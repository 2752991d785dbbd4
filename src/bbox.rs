use std::fmt::Display;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Geographic bounding box in the scene's georeferenced coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl Bbox {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> std::result::Result<Self, String> {
        if !(-180.0..=180.0).contains(&xmin) || !(-180.0..=180.0).contains(&xmax) {
            return Err("Longitude values must be between -180 and 180".to_string());
        }

        if !(-90.0..=90.0).contains(&ymin) || !(-90.0..=90.0).contains(&ymax) {
            return Err("Latitude values must be between -90 and 90".to_string());
        }

        if xmin > xmax || ymin > ymax {
            return Err("Min values must be <= max values".to_string());
        }

        Ok(Bbox {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Converts the box to a pixel window using a GDAL geotransform
    /// `[top_left_x, pixel_width, 0, top_left_y, 0, -pixel_height]`, clipped
    /// to the raster size.
    pub fn to_window(&self, geotransform: &[f64; 6], width: usize, height: usize) -> Result<Window> {
        let pixel_min_x = ((self.xmin - geotransform[0]) / geotransform[1]).floor() as i64;
        let pixel_max_x = ((self.xmax - geotransform[0]) / geotransform[1]).ceil() as i64;
        let pixel_min_y = ((self.ymax - geotransform[3]) / geotransform[5]).floor() as i64;
        let pixel_max_y = ((self.ymin - geotransform[3]) / geotransform[5]).ceil() as i64;

        let start_x = pixel_min_x.max(0) as usize;
        let end_x = pixel_max_x.max(0).min(width as i64) as usize;
        let start_y = pixel_min_y.max(0) as usize;
        let end_y = pixel_max_y.max(0).min(height as i64) as usize;

        if end_x <= start_x || end_y <= start_y {
            return Err(Error::Subset(format!("{} does not intersect the scene", self)));
        }

        Ok(Window {
            x_off: start_x,
            y_off: start_y,
            width: end_x - start_x,
            height: end_y - start_y,
        })
    }
}

impl Display for Bbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bbox [{}, {}] x [{}, {}]",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// Pixel window, offsets from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Window {
    pub x_off: usize,
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.width > 0
            && self.height > 0
            && self.x_off + self.width <= width
            && self.y_off + self.height <= height
    }

    /// Geotransform of the window, `geotransform` being the full raster's.
    pub fn geotransform(&self, geotransform: &[f64; 6]) -> [f64; 6] {
        let (x, y) = (self.x_off as f64, self.y_off as f64);
        let mut shifted = *geotransform;
        shifted[0] += x * geotransform[1] + y * geotransform[2];
        shifted[3] += x * geotransform[4] + y * geotransform[5];
        shifted
    }
}

/// Spatial subset requested for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Subset {
    Pixels(Window),
    Geographic(Bbox),
}

impl Subset {
    /// Resolves the subset to a pixel window for a raster of the given size.
    pub fn resolve(&self, geotransform: &[f64; 6], width: usize, height: usize) -> Result<Window> {
        match self {
            Subset::Pixels(window) if window.fits(width, height) => Ok(*window),
            Subset::Pixels(window) => Err(Error::Subset(format!(
                "{:?} outside {}x{} raster",
                window, width, height
            ))),
            Subset::Geographic(bbox) => bbox.to_window(geotransform, width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_coords_are_within_ranges() {
        assert!(Bbox::new(-67.2, -58.7, 70.9, 73.3).is_ok());
        assert!(Bbox::new(-200.0, 0.0, 0.0, 10.0).is_err());
        assert!(Bbox::new(0.0, 200.0, 0.0, 10.0).is_err());
        assert!(Bbox::new(0.0, 10.0, -100.0, 0.0).is_err());
        assert!(Bbox::new(0.0, 10.0, 0.0, 100.0).is_err());
        assert!(Bbox::new(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(Bbox::new(0.0, 10.0, 10.0, 0.0).is_err());
    }

    #[test]
    fn test_bbox_to_window() {
        // Half degree pixels starting at (0, 10)
        let geotransform = [0.0, 0.5, 0.0, 10.0, 0.0, -0.5];
        let bbox = Bbox::new(1.0, 2.0, 8.0, 9.0).unwrap();

        let window = bbox.to_window(&geotransform, 100, 100).unwrap();

        assert_eq!(window.x_off, 2);
        assert_eq!(window.width, 2);
        assert_eq!(window.y_off, 2);
        assert_eq!(window.height, 2);
    }

    #[test]
    fn test_window_geotransform() {
        let geotransform = [0.0, 0.5, 0.0, 10.0, 0.0, -0.5];
        let window = Window {
            x_off: 2,
            y_off: 4,
            width: 2,
            height: 2,
        };

        assert_eq!(
            window.geotransform(&geotransform),
            [1.0, 0.5, 0.0, 8.0, 0.0, -0.5]
        );
    }

    #[test]
    fn test_bbox_outside_scene() {
        let geotransform = [0.0, 0.5, 0.0, 10.0, 0.0, -0.5];
        let bbox = Bbox::new(80.0, 90.0, 8.0, 9.0).unwrap();

        assert!(bbox.to_window(&geotransform, 100, 100).is_err());
    }

    #[test]
    fn test_pixel_subset_must_fit() {
        let window = Window {
            x_off: 90,
            y_off: 0,
            width: 20,
            height: 5,
        };
        let geotransform = [0.0, 1.0, 0.0, 0.0, 0.0, -1.0];

        assert!(Subset::Pixels(window).resolve(&geotransform, 100, 100).is_err());
        assert!(Subset::Pixels(window).resolve(&geotransform, 110, 100).is_ok());
    }
}
