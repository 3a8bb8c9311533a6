//! Spectrum drawing geometry.
//!
//! Converts one frame of byte bins into bars or a polyline in surface
//! coordinates (origin top-left, y grows downward). The host surface only
//! has to paint what it is given.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    #[default]
    Bars,
    Line,
}

/// Gap left between adjacent bars, in surface units.
pub const BAR_GAP: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumFrame {
    Bars(Vec<Bar>),
    Line(Vec<Point>),
}

/// Anything the analyzer loop can paint on.
pub trait VisualizationSurface {
    /// Width and height in surface units.
    fn size(&self) -> (f32, f32);

    fn draw(&mut self, frame: &SpectrumFrame);

    /// Called once when the loop stops, so the surface can show its idle state.
    fn idle(&mut self) {}
}

impl SpectrumFrame {
    pub fn build(style: VisualStyle, bins: &[u8], width: f32, height: f32) -> Self {
        match style {
            VisualStyle::Bars => SpectrumFrame::Bars(bars(bins, width, height)),
            VisualStyle::Line => SpectrumFrame::Line(line(bins, width, height)),
        }
    }
}

/// Bars rise from the bottom edge; a full-scale bin fills 80% of the height.
/// Bars are 2.5x the even share of the width, so the upper (mostly empty)
/// bins run off the right edge.
pub fn bars(bins: &[u8], width: f32, height: f32) -> Vec<Bar> {
    if bins.is_empty() {
        return Vec::new();
    }
    let step = width / bins.len() as f32 * 2.5;
    bins.iter()
        .enumerate()
        .map(|(i, &v)| {
            let bar_height = v as f32 / 255.0 * height * 0.8;
            Bar {
                x: i as f32 * step,
                y: height - bar_height,
                width: (step - BAR_GAP).max(0.0),
                height: bar_height,
            }
        })
        .collect()
}

/// One point per bin, `v / 128 * height / 2` from the top, closed with a
/// point at the right edge on the center line.
pub fn line(bins: &[u8], width: f32, height: f32) -> Vec<Point> {
    if bins.is_empty() {
        return Vec::new();
    }
    let step = width / bins.len() as f32;
    let mut points: Vec<Point> = bins
        .iter()
        .enumerate()
        .map(|(i, &v)| Point {
            x: i as f32 * step,
            y: v as f32 / 128.0 * height / 2.0,
        })
        .collect();
    points.push(Point {
        x: width,
        y: height / 2.0,
    });
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_geometry() {
        let b = bars(&[255, 0, 51, 102], 800.0, 200.0);
        assert_eq!(b.len(), 4);
        // 800 / 4 * 2.5 = 500
        assert_eq!(b[1].x, 500.0);
        assert_eq!(b[0].width, 498.0);
        assert_eq!(b[0].height, 160.0);
        assert_eq!(b[0].y, 40.0);
        assert_eq!(b[1].height, 0.0);
        assert_eq!(b[1].y, 200.0);
        assert!((b[2].height - 32.0).abs() < 1e-4);
    }

    #[test]
    fn line_geometry() {
        let pts = line(&[0, 128, 255], 300.0, 200.0);
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], Point { x: 0.0, y: 0.0 });
        assert_eq!(pts[1], Point { x: 100.0, y: 100.0 });
        assert_eq!(pts[3], Point { x: 300.0, y: 100.0 });
    }

    #[test]
    fn empty_bins_draw_nothing() {
        assert!(bars(&[], 10.0, 10.0).is_empty());
        assert!(line(&[], 10.0, 10.0).is_empty());
    }

    #[test]
    fn style_parses_lowercase() {
        let s: VisualStyle = serde_json::from_str("\"line\"").unwrap();
        assert_eq!(s, VisualStyle::Line);
    }
}
