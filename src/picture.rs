use super::binary_reader::*;
use super::common::*;
use std::io;
use std::sync::Arc;

/// An original 4:2:0 picture plus the picture it is predicted from.
#[derive(Clone, Debug)]
pub struct Picture {
    pub picture_order_count: usize,
    pub width: usize,
    pub height: usize,
    pub bit_depth: usize,
    pub pixels: Vec<Vec2d<u16>>,
    pub reference: Option<Arc<Picture>>,
}

impl Picture {
    pub fn new(width: usize, height: usize, bit_depth: usize) -> Picture {
        #[cfg(debug_assertions)]
        {
            assert!(width > 0, "width must be greater than 0.");
            assert!(height > 0, "height must be greater than 0.");
        }

        Picture {
            picture_order_count: 0,
            width,
            height,
            bit_depth,
            pixels: vec![
                vec2d![0; height; width],
                vec2d![0; (height + 1) / 2; (width + 1) / 2],
                vec2d![0; (height + 1) / 2; (width + 1) / 2],
            ],
            reference: None,
        }
    }

    /// Reads one planar Y, Cb, Cr picture.
    pub fn read(
        reader: &mut BinaryReader,
        width: usize,
        height: usize,
        bit_depth: usize,
    ) -> io::Result<Picture> {
        let mut picture = Picture::new(width, height, bit_depth);
        for c in 0..3 {
            let (w, h) = (picture.pixels[c].width, picture.pixels[c].height);
            let samples = reader.read_samples(w * h, bit_depth)?;
            for y in 0..h {
                picture.pixels[c][y].copy_from_slice(&samples[y * w..(y + 1) * w]);
            }
        }
        Ok(picture)
    }

    /// Luma sample with coordinates clamped into the picture.
    #[inline(always)]
    pub fn luma(&self, x: isize, y: isize) -> i32 {
        let x = clip3(0, self.width as isize - 1, x) as usize;
        let y = clip3(0, self.height as isize - 1, y) as usize;
        self.pixels[0][y][x] as i32
    }

    pub fn luma_area(&self) -> Area {
        Area::new(0, 0, self.width, self.height)
    }

    /// The part of `area` that lies inside the picture.
    pub fn clip_area(&self, area: &Area) -> Area {
        let x1 = (area.x + area.width).min(self.width);
        let y1 = (area.y + area.height).min(self.height);
        Area::new(
            area.x,
            area.y,
            x1.saturating_sub(area.x),
            y1.saturating_sub(area.y),
        )
    }

    pub fn max_sample(&self) -> i32 {
        (1 << self.bit_depth) - 1
    }
}
