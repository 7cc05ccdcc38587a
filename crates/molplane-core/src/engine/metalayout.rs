use nalgebra::{Point2, Vector2};
use tracing::trace;

/// A rectangular fragment to be positioned; `offset` is the computed result.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub bbox_min: Point2<f64>,
    pub bbox_max: Point2<f64>,
    pub offset: Vector2<f64>,
}

impl LayoutItem {
    pub fn new(bbox_min: Point2<f64>, bbox_max: Point2<f64>) -> Self {
        Self {
            bbox_min,
            bbox_max,
            offset: Vector2::zeros(),
        }
    }

    pub fn width(&self) -> f64 {
        self.bbox_max.x - self.bbox_min.x
    }

    pub fn height(&self) -> f64 {
        self.bbox_max.y - self.bbox_min.y
    }

    fn center_y(&self) -> f64 {
        (self.bbox_min.y + self.bbox_max.y) / 2.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutLine {
    pub items: Vec<LayoutItem>,
}

impl LayoutLine {
    pub fn height(&self) -> f64 {
        self.items.iter().map(LayoutItem::height).fold(0.0, f64::max)
    }
}

/// Arranges fragment bounding boxes in rows.
///
/// Items run left to right inside a line, each centred on the line's axis;
/// lines are stacked downwards. The first item of the first non-empty line
/// stays where it is.
#[derive(Debug, Clone, Default)]
pub struct Metalayout {
    pub lines: Vec<LayoutLine>,
    pub horizontal_interval: f64,
    pub vertical_interval: f64,
}

impl Metalayout {
    pub fn new(horizontal_interval: f64, vertical_interval: f64) -> Self {
        Self {
            lines: Vec::new(),
            horizontal_interval,
            vertical_interval,
        }
    }

    /// Starts a new line and returns its index.
    pub fn new_line(&mut self) -> usize {
        self.lines.push(LayoutLine::default());
        self.lines.len() - 1
    }

    /// Appends an item to the last line, opening one if needed, and returns
    /// its `(line, position)` address.
    pub fn push_item(&mut self, item: LayoutItem) -> (usize, usize) {
        if self.lines.is_empty() {
            self.new_line();
        }
        let line = self.lines.len() - 1;
        self.lines[line].items.push(item);
        (line, self.lines[line].items.len() - 1)
    }

    pub fn offset(&self, line: usize, position: usize) -> Option<Vector2<f64>> {
        self.lines.get(line)?.items.get(position).map(|i| i.offset)
    }

    pub fn process(&mut self) {
        let Some(anchor) = self.lines.iter().find_map(|l| l.items.first()) else {
            return;
        };
        let origin_x = anchor.bbox_min.x;
        let mut axis = anchor.center_y();
        let mut previous_half_height: Option<f64> = None;

        for line in self.lines.iter_mut().filter(|l| !l.items.is_empty()) {
            let half_height = line.height() / 2.0;
            if let Some(previous) = previous_half_height {
                axis -= previous + self.vertical_interval + half_height;
            }
            previous_half_height = Some(half_height);

            let mut cursor = origin_x;
            for item in &mut line.items {
                item.offset = Vector2::new(cursor - item.bbox_min.x, axis - item.center_y());
                cursor += item.width() + self.horizontal_interval;
            }
            trace!(items = line.items.len(), axis, "Metalayout line placed.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(x0: f64, y0: f64, x1: f64, y1: f64) -> LayoutItem {
        LayoutItem::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[test]
    fn first_item_keeps_its_position() {
        let mut layout = Metalayout::new(1.0, 1.0);
        layout.push_item(item(5.0, 5.0, 7.0, 6.0));
        layout.process();
        assert_eq!(layout.offset(0, 0), Some(Vector2::zeros()));
    }

    #[test]
    fn items_in_a_line_are_spaced_and_centred() {
        let mut layout = Metalayout::new(0.5, 1.0);
        layout.push_item(item(0.0, 0.0, 2.0, 2.0));
        layout.push_item(item(10.0, 10.0, 11.0, 14.0));
        layout.process();

        let offset = layout.offset(0, 1).unwrap();
        let moved_min_x = 10.0 + offset.x;
        let moved_center_y = 12.0 + offset.y;
        assert!((moved_min_x - 2.5).abs() < 1e-12);
        assert!((moved_center_y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn lines_stack_downwards() {
        let mut layout = Metalayout::new(1.0, 1.0);
        layout.push_item(item(0.0, 0.0, 2.0, 2.0));
        layout.new_line();
        layout.push_item(item(0.0, 0.0, 3.0, 4.0));
        layout.process();

        let offset = layout.offset(1, 0).unwrap();
        // First axis at y = 1; second axis 1 + 1 + 2 below it.
        assert!((offset.x).abs() < 1e-12);
        assert!((2.0 + offset.y - (-3.0)).abs() < 1e-12);
        let moved_top = 4.0 + offset.y;
        assert!(moved_top <= 0.0 - 1.0 + 1e-12);
    }

    #[test]
    fn empty_layout_is_a_no_op() {
        let mut layout = Metalayout::new(1.0, 1.0);
        layout.new_line();
        layout.process();
        assert!(layout.offset(0, 0).is_none());
    }
}
