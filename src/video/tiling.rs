//! Cropping a field-of-view stack into per-well stacks.

use std::collections::HashMap;

use ndarray::Array3;

use super::ImageStack;
use super::error::VideoError;
use crate::model::WellGeometry;

fn clamp_index(value: i64, len: usize) -> usize {
    value.clamp(0, len as i64 - 1) as usize
}

/// Crop every well of `wells` out of `stack` (frames x height x width).
///
/// Bounds reaching past the field of view are filled by replicating the
/// nearest edge pixel, so every well stack has exactly the geometry's size.
pub fn split_into_wells(
    stack: &ImageStack,
    wells: &[WellGeometry],
) -> Result<HashMap<String, ImageStack>, VideoError> {
    let (frames, height, width) = stack.dim();
    let mut tiles = HashMap::with_capacity(wells.len());

    for well in wells {
        if well.width() <= 0 || well.height() <= 0 {
            return Err(VideoError::InvalidGeometry {
                well: well.well_name.clone(),
                reason: format!(
                    "x {}..{}, y {}..{}",
                    well.x_min, well.x_max, well.y_min, well.y_max
                ),
            });
        }
        if height == 0 || width == 0 {
            return Err(VideoError::InvalidGeometry {
                well: well.well_name.clone(),
                reason: "field of view is empty".to_string(),
            });
        }

        let x0 = i64::from(well.x_min);
        let y0 = i64::from(well.y_min);
        let shape = (frames, well.height() as usize, well.width() as usize);
        let tile = Array3::from_shape_fn(shape, |(f, y, x)| {
            let row = clamp_index(y0 + y as i64, height);
            let col = clamp_index(x0 + x as i64, width);
            stack[[f, row, col]]
        });
        tiles.insert(well.well_name.clone(), tile);
    }

    Ok(tiles)
}
