//! CPU raster surface.

use crate::surface::{Blend, RenderError, RenderResult, StrokeParams, Surface};
use kurbo::{Affine, BezPath, PathEl, Point, Shape as _, StrokeOpts};
use peniko::color::Rgba8;
use plansketch_core::shapes::Rgb;
use std::fs;
use std::path::Path;

/// Curve flattening tolerance in pixels.
const FLATTEN_TOLERANCE: f64 = 0.25;
/// Stroke expansion tolerance in pixels.
const STROKE_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawState {
    transform: Affine,
    alpha: f64,
    blend: Blend,
}

impl Default for DrawState {
    fn default() -> Self {
        Self { transform: Affine::IDENTITY, alpha: 1.0, blend: Blend::SourceOver }
    }
}

/// RGBA8 raster surface (straight alpha).
///
/// Coverage is sampled once at each pixel center with the nonzero winding
/// rule; strokes are expanded to outlines first. Text is not rasterized.
#[derive(Debug, Clone)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
    background: Option<Rgb>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Pixmap {
    /// Create a transparent pixmap.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
            background: None,
            state: DrawState::default(),
            stack: Vec::new(),
        })
    }

    /// Clear to an opaque background instead of transparency.
    pub fn with_background(mut self, background: Rgb) -> Self {
        self.background = Some(background);
        self.clear();
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 rows, top to bottom.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    /// Encode RGBA pixel data to PNG bytes.
    pub fn encode_png(&self) -> RenderResult<Vec<u8>> {
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.data)?;
        }
        Ok(png_data)
    }

    pub fn save_png(&self, path: &Path) -> RenderResult<()> {
        let png_data = self.encode_png()?;
        fs::write(path, &png_data)?;
        log::info!("Wrote {} ({} bytes)", path.display(), png_data.len());
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Fill an outline (in local coordinates) with the nonzero rule.
    fn fill_outline(&mut self, outline: &BezPath, color: Rgb) {
        let paint = color.with_alpha(self.state.alpha).to_rgba8();
        if paint.a == 0 {
            return;
        }
        let device = self.state.transform * outline.clone();
        let edges = flatten_edges(&device);
        if edges.is_empty() {
            return;
        }

        let bounds = device.bounding_box();
        let y_start = bounds.y0.floor().max(0.0) as u32;
        let y_end = bounds.y1.ceil().min(self.height as f64).max(0.0) as u32;
        let mut crossings: Vec<(f64, i32)> = Vec::new();

        for y in y_start..y_end {
            let sample_y = y as f64 + 0.5;
            crossings.clear();
            for &(a, b) in &edges {
                let upward = a.y <= sample_y && b.y > sample_y;
                let downward = b.y <= sample_y && a.y > sample_y;
                if upward || downward {
                    let t = (sample_y - a.y) / (b.y - a.y);
                    crossings.push((a.x + t * (b.x - a.x), if upward { 1 } else { -1 }));
                }
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding == 0 {
                    continue;
                }
                // Pixels whose centers fall in [start, end).
                let x_start = (pair[0].0 - 0.5).ceil().max(0.0) as u32;
                let x_end = (pair[1].0 - 0.5).ceil().min(self.width as f64).max(0.0) as u32;
                for x in x_start..x_end {
                    self.blend_pixel(x, y, paint);
                }
            }
        }
    }

    fn blend_pixel(&mut self, x: u32, y: u32, paint: Rgba8) {
        let i = self.index(x, y);
        let src_a = paint.a as f64 / 255.0;
        let dst_a = self.data[i + 3] as f64 / 255.0;
        match self.state.blend {
            Blend::SourceOver => {
                let out_a = src_a + dst_a * (1.0 - src_a);
                if out_a <= 0.0 {
                    return;
                }
                for (channel, src) in [paint.r, paint.g, paint.b].into_iter().enumerate() {
                    let dst = self.data[i + channel] as f64;
                    let value = (src as f64 * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
                    self.data[i + channel] = value.round().clamp(0.0, 255.0) as u8;
                }
                self.data[i + 3] = (out_a * 255.0).round() as u8;
            }
            Blend::DestinationOut => {
                self.data[i + 3] = (dst_a * (1.0 - src_a) * 255.0).round() as u8;
            }
        }
    }
}

/// Flatten a path into closed line edges.
fn flatten_edges(path: &BezPath) -> Vec<(Point, Point)> {
    let mut edges = Vec::new();
    let mut start: Option<Point> = None;
    let mut last: Option<Point> = None;
    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            if let (Some(s), Some(l)) = (start, last) {
                if s != l {
                    edges.push((l, s));
                }
            }
            start = Some(p);
            last = Some(p);
        }
        PathEl::LineTo(p) => {
            if let Some(l) = last {
                edges.push((l, p));
            }
            last = Some(p);
        }
        PathEl::ClosePath => {
            if let (Some(s), Some(l)) = (start, last) {
                if s != l {
                    edges.push((l, s));
                }
            }
            last = start;
        }
        _ => {}
    });
    if let (Some(s), Some(l)) = (start, last) {
        if s != l {
            edges.push((l, s));
        }
    }
    edges
}

impl Surface for Pixmap {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        let fill = match self.background {
            Some(bg) => [bg.r, bg.g, bg.b, 255],
            None => [0; 4],
        };
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&fill);
        }
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        match self.stack.pop() {
            Some(state) => self.state = state,
            None => log::warn!("restore without matching save"),
        }
    }

    fn transform(&mut self, affine: Affine) {
        self.state.transform = self.state.transform * affine;
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_blend(&mut self, blend: Blend) {
        self.state.blend = blend;
    }

    fn fill_path(&mut self, path: &BezPath, color: Rgb) {
        self.fill_outline(path, color);
    }

    fn stroke_path(&mut self, path: &BezPath, color: Rgb, stroke: &StrokeParams) {
        let outline = kurbo::stroke(
            path.iter(),
            &stroke.to_kurbo(),
            &StrokeOpts::default(),
            STROKE_TOLERANCE,
        );
        self.fill_outline(&outline, color);
    }

    fn fill_text(&mut self, text: &str, origin: Point, _font_size: f64, _color: Rgb) {
        log::trace!("text {:?} at {:?} not rasterized", text, origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape as _};

    const RED: Rgb = Rgb::new(255, 0, 0);

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(Pixmap::new(0, 10), Err(RenderError::InvalidSize { .. })));
    }

    #[test]
    fn test_fill_rect_covers_pixel_centers() {
        let mut pixmap = Pixmap::new(10, 10).unwrap();
        pixmap.fill_path(&Rect::new(2.0, 2.0, 5.0, 5.0).to_path(0.1), RED);
        assert_eq!(pixmap.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(pixmap.pixel(4, 4), Some([255, 0, 0, 255]));
        assert_eq!(pixmap.pixel(5, 5), Some([0, 0, 0, 0]));
        assert_eq!(pixmap.pixel(1, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_global_alpha_and_restore() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.save();
        pixmap.set_global_alpha(0.5);
        pixmap.fill_path(&Rect::new(0.0, 0.0, 2.0, 4.0).to_path(0.1), RED);
        pixmap.restore();
        pixmap.fill_path(&Rect::new(2.0, 0.0, 4.0, 4.0).to_path(0.1), RED);
        assert_eq!(pixmap.pixel(0, 0).unwrap()[3], 128);
        assert_eq!(pixmap.pixel(3, 0).unwrap()[3], 255);
    }

    #[test]
    fn test_destination_out_erases() {
        let mut pixmap = Pixmap::new(4, 4).unwrap().with_background(Rgb::white());
        pixmap.set_blend(Blend::DestinationOut);
        pixmap.fill_path(&Rect::new(0.0, 0.0, 4.0, 4.0).to_path(0.1), RED);
        assert_eq!(pixmap.pixel(1, 1).unwrap()[3], 0);
    }

    #[test]
    fn test_stroke_is_widened() {
        let mut pixmap = Pixmap::new(20, 20).unwrap();
        let mut line = BezPath::new();
        line.move_to((2.0, 10.0));
        line.line_to((18.0, 10.0));
        pixmap.stroke_path(&line, RED, &StrokeParams::round(4.0));
        assert_eq!(pixmap.pixel(10, 9).unwrap()[3], 255);
        assert_eq!(pixmap.pixel(10, 11).unwrap()[3], 255);
        assert_eq!(pixmap.pixel(10, 14).unwrap()[3], 0);
    }

    #[test]
    fn test_encode_png_signature() {
        let pixmap = Pixmap::new(3, 2).unwrap().with_background(Rgb::white());
        let bytes = pixmap.encode_png().unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }
}
