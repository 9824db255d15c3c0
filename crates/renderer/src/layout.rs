//! Letterbox placement of the fixed-aspect internal image inside an
//! arbitrary output surface.

/// Destination rectangle for the final blit, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

/// Centers an `aspect_ratio` image inside a `width` x `height` output.
///
/// A wider-than-internal output gets pillarboxed left/right (full height);
/// otherwise the band is letterboxed top/bottom (full width). Centering is
/// integer-exact with the remainder favoring the top/left edge.
pub fn letterbox(aspect_ratio: f64, width: i32, height: i32) -> OutputRect {
    if f64::from(width) / f64::from(height) > aspect_ratio {
        let adjusted = f64::from(height) * aspect_ratio;
        let remainder = ((f64::from(width) - adjusted) / 2.0) as i32;
        OutputRect {
            x0: remainder,
            y0: 0,
            x1: remainder + adjusted as i32,
            y1: height,
        }
    } else {
        let adjusted = f64::from(width) / aspect_ratio;
        let remainder = ((f64::from(height) - adjusted) / 2.0) as i32;
        OutputRect {
            x0: 0,
            y0: remainder,
            x1: width,
            y1: remainder + adjusted as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: f64 = 1920.0 / 720.0;

    #[test]
    fn narrower_output_is_banded_vertically() {
        let rect = letterbox(WIDE, 1000, 500);
        assert_eq!(
            rect,
            OutputRect {
                x0: 0,
                y0: 62,
                x1: 1000,
                y1: 437,
            }
        );
    }

    #[test]
    fn wider_output_is_banded_horizontally() {
        let rect = letterbox(WIDE, 4000, 500);
        assert_eq!(rect.y0, 0);
        assert_eq!(rect.y1, 500);
        assert_eq!(rect.x0, 1333);
        assert_eq!(rect.x1, 1333 + 1333);
    }

    #[test]
    fn matching_aspect_fills_output() {
        let rect = letterbox(WIDE, 1920, 720);
        assert_eq!(
            rect,
            OutputRect {
                x0: 0,
                y0: 0,
                x1: 1920,
                y1: 720,
            }
        );
    }

    #[test]
    fn remainder_favors_top_left() {
        // 99 wide at square aspect inside 100x99: one spare column, placed
        // so the left edge gets the smaller half.
        let rect = letterbox(1.0, 100, 99);
        assert_eq!(rect.y0, 0);
        assert_eq!(rect.y1, 99);
        assert_eq!(rect.x0, 0);
        assert_eq!(rect.x1, 99);
    }
}
