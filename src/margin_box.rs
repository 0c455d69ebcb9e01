use crate::types::{Margins, Pt, Rect, Size};
use std::collections::BTreeMap;

pub const MAX_DISTRIBUTION_PASSES: usize = 4;

const DEGENERATE_EXTENT_MILLI: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarginBoxSlot {
    TopLeftCorner,
    TopLeft,
    TopCenter,
    TopRight,
    TopRightCorner,
    RightTop,
    RightMiddle,
    RightBottom,
    BottomRightCorner,
    BottomRight,
    BottomCenter,
    BottomLeft,
    BottomLeftCorner,
    LeftBottom,
    LeftMiddle,
    LeftTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Top | Edge::Bottom)
    }

    pub fn slots(self) -> [MarginBoxSlot; 3] {
        match self {
            Edge::Top => [
                MarginBoxSlot::TopLeft,
                MarginBoxSlot::TopCenter,
                MarginBoxSlot::TopRight,
            ],
            Edge::Bottom => [
                MarginBoxSlot::BottomLeft,
                MarginBoxSlot::BottomCenter,
                MarginBoxSlot::BottomRight,
            ],
            Edge::Left => [
                MarginBoxSlot::LeftTop,
                MarginBoxSlot::LeftMiddle,
                MarginBoxSlot::LeftBottom,
            ],
            Edge::Right => [
                MarginBoxSlot::RightTop,
                MarginBoxSlot::RightMiddle,
                MarginBoxSlot::RightBottom,
            ],
        }
    }
}

impl MarginBoxSlot {
    pub const ALL: [MarginBoxSlot; 16] = [
        MarginBoxSlot::TopLeftCorner,
        MarginBoxSlot::TopLeft,
        MarginBoxSlot::TopCenter,
        MarginBoxSlot::TopRight,
        MarginBoxSlot::TopRightCorner,
        MarginBoxSlot::RightTop,
        MarginBoxSlot::RightMiddle,
        MarginBoxSlot::RightBottom,
        MarginBoxSlot::BottomRightCorner,
        MarginBoxSlot::BottomRight,
        MarginBoxSlot::BottomCenter,
        MarginBoxSlot::BottomLeft,
        MarginBoxSlot::BottomLeftCorner,
        MarginBoxSlot::LeftBottom,
        MarginBoxSlot::LeftMiddle,
        MarginBoxSlot::LeftTop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarginBoxSlot::TopLeftCorner => "top-left-corner",
            MarginBoxSlot::TopLeft => "top-left",
            MarginBoxSlot::TopCenter => "top-center",
            MarginBoxSlot::TopRight => "top-right",
            MarginBoxSlot::TopRightCorner => "top-right-corner",
            MarginBoxSlot::RightTop => "right-top",
            MarginBoxSlot::RightMiddle => "right-middle",
            MarginBoxSlot::RightBottom => "right-bottom",
            MarginBoxSlot::BottomRightCorner => "bottom-right-corner",
            MarginBoxSlot::BottomRight => "bottom-right",
            MarginBoxSlot::BottomCenter => "bottom-center",
            MarginBoxSlot::BottomLeft => "bottom-left",
            MarginBoxSlot::BottomLeftCorner => "bottom-left-corner",
            MarginBoxSlot::LeftBottom => "left-bottom",
            MarginBoxSlot::LeftMiddle => "left-middle",
            MarginBoxSlot::LeftTop => "left-top",
        }
    }

    pub fn edge(self) -> Option<Edge> {
        match self {
            MarginBoxSlot::TopLeft | MarginBoxSlot::TopCenter | MarginBoxSlot::TopRight => {
                Some(Edge::Top)
            }
            MarginBoxSlot::RightTop | MarginBoxSlot::RightMiddle | MarginBoxSlot::RightBottom => {
                Some(Edge::Right)
            }
            MarginBoxSlot::BottomLeft
            | MarginBoxSlot::BottomCenter
            | MarginBoxSlot::BottomRight => Some(Edge::Bottom),
            MarginBoxSlot::LeftTop | MarginBoxSlot::LeftMiddle | MarginBoxSlot::LeftBottom => {
                Some(Edge::Left)
            }
            _ => None,
        }
    }

    pub fn default_text_align(self) -> &'static str {
        match self {
            MarginBoxSlot::TopLeft | MarginBoxSlot::BottomLeft => "left",
            MarginBoxSlot::TopRight | MarginBoxSlot::BottomRight => "right",
            MarginBoxSlot::TopLeftCorner | MarginBoxSlot::BottomLeftCorner => "right",
            MarginBoxSlot::TopRightCorner | MarginBoxSlot::BottomRightCorner => "left",
            _ => "center",
        }
    }

    pub fn default_vertical_align(self) -> &'static str {
        match self {
            MarginBoxSlot::LeftTop | MarginBoxSlot::RightTop => "top",
            MarginBoxSlot::LeftBottom | MarginBoxSlot::RightBottom => "bottom",
            _ => "middle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarginBoxInput {
    pub present: bool,
    pub extent: Option<Pt>,
    pub min_extent: Option<Pt>,
    pub max_extent: Option<Pt>,
    pub min_content: Pt,
    pub max_content: Pt,
}

impl MarginBoxInput {
    pub fn with_content(min_content: Pt, max_content: Pt) -> Self {
        Self {
            present: true,
            min_content,
            max_content: max_content.max(min_content),
            ..Self::default()
        }
    }

    fn clamp(&self, value: Pt) -> Pt {
        let mut value = value;
        if let Some(max) = self.max_extent {
            value = value.min(max);
        }
        if let Some(min) = self.min_extent {
            value = value.max(min);
        }
        value
    }
}

// Distributes `available` among the start, center and end boxes of one
// edge. Boxes whose resolved extent violates their own min/max are pinned
// and the distribution re-runs, up to `MAX_DISTRIBUTION_PASSES` rounds.
pub fn distribute(boxes: &[MarginBoxInput; 3], available: Pt) -> [Pt; 3] {
    let available = available.max(Pt::ZERO);
    let mut pinned = [boxes[0].extent, boxes[1].extent, boxes[2].extent];
    let mut sizes = [Pt::ZERO; 3];
    for pass in 0..MAX_DISTRIBUTION_PASSES {
        sizes = distribute_once(boxes, &pinned, available);
        let mut violated = false;
        for index in 0..3 {
            if !boxes[index].present {
                continue;
            }
            let clamped = boxes[index].clamp(sizes[index]);
            if clamped != sizes[index] {
                pinned[index] = Some(clamped);
                violated = true;
            }
        }
        if !violated {
            return fit(sizes, available);
        }
        log::debug!("margin box distribution pass {} re-run with pinned sizes", pass + 1);
    }
    log::warn!(
        "margin box distribution did not settle after {MAX_DISTRIBUTION_PASSES} passes"
    );
    fit(sizes, available)
}

fn fit(mut sizes: [Pt; 3], available: Pt) -> [Pt; 3] {
    for size in sizes.iter_mut() {
        *size = size.max(Pt::ZERO);
    }
    let total: Pt = sizes.iter().copied().sum();
    if total > available && total > Pt::ZERO {
        let ratio = available.to_f32() / total.to_f32();
        sizes = sizes.map(|size| size * ratio);
        let adjusted: Pt = sizes.iter().copied().sum();
        if adjusted > available {
            sizes[1] = (sizes[1] - (adjusted - available)).max(Pt::ZERO);
        }
    }
    sizes
}

fn distribute_once(boxes: &[MarginBoxInput; 3], fixed: &[Option<Pt>; 3], available: Pt) -> [Pt; 3] {
    let [start, center, end] = boxes;
    if !center.present {
        return match (start.present, end.present) {
            (false, false) => [Pt::ZERO; 3],
            (true, false) => [fixed[0].unwrap_or(available), Pt::ZERO, Pt::ZERO],
            (false, true) => [Pt::ZERO, Pt::ZERO, fixed[2].unwrap_or(available)],
            (true, true) => match (fixed[0], fixed[2]) {
                (Some(a), Some(c)) => [a, Pt::ZERO, c.min((available - a).max(Pt::ZERO))],
                (Some(a), None) => [a, Pt::ZERO, (available - a).max(Pt::ZERO)],
                (None, Some(c)) => [(available - c).max(Pt::ZERO), Pt::ZERO, c],
                (None, None) => {
                    let (a, c) = flex_split(start, end, available);
                    [a, Pt::ZERO, c]
                }
            },
        };
    }

    let outer_want = |input: &MarginBoxInput, fixed: Option<Pt>| -> Pt {
        if !input.present {
            return Pt::ZERO;
        }
        fixed.unwrap_or(input.max_content)
    };
    let (side, b) = match fixed[1] {
        Some(b) => {
            let b = b.min(available);
            ((available - b) / 2, b)
        }
        None => {
            let remaining = (available - center.min_content).max(Pt::ZERO);
            let want = outer_want(start, fixed[0]).max(outer_want(end, fixed[2]));
            let mut side = want.min(remaining / 2);
            if side > Pt::ZERO {
                // Ties between outer and center content go to the outer boxes.
                side = (side + Pt::from_milli_i64(1)).min(available / 2);
            }
            (side, (available - side * 2).max(Pt::ZERO))
        }
    };
    // The center stays centered; an outer box only fills its own share of
    // the space reserved on either side.
    let outer = |input: &MarginBoxInput, fixed: Option<Pt>| -> Pt {
        if !input.present {
            return Pt::ZERO;
        }
        fixed.map_or(side, |extent| extent.min(side))
    };
    [outer(start, fixed[0]), b, outer(end, fixed[2])]
}

fn flex_split(start: &MarginBoxInput, end: &MarginBoxInput, available: Pt) -> (Pt, Pt) {
    let max_a = start.max_content;
    let max_c = end.max_content;
    let sum_max = max_a + max_c;
    if sum_max <= Pt::ZERO {
        let a = available / 2;
        return (a, available - a);
    }
    if sum_max <= available {
        let extra = available - sum_max;
        let a = max_a + extra * (max_a.to_f32() / sum_max.to_f32());
        return (a, (available - a).max(Pt::ZERO));
    }
    let min_a = start.min_content;
    let min_c = end.min_content;
    let sum_min = min_a + min_c;
    if sum_min <= available {
        let flex_a = (max_a - min_a).max(Pt::ZERO);
        let flex_c = (max_c - min_c).max(Pt::ZERO);
        let flexible = flex_a + flex_c;
        let spare = available - sum_min;
        let a = if flexible > Pt::ZERO {
            min_a + spare * (flex_a.to_f32() / flexible.to_f32())
        } else {
            min_a + spare / 2
        };
        return (a, (available - a).max(Pt::ZERO));
    }
    let a = available * (min_a.to_f32() / sum_min.to_f32());
    (a, (available - a).max(Pt::ZERO))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginBoxGeometry {
    pub slot: MarginBoxSlot,
    pub rect: Rect,
}

fn is_degenerate(rect: &Rect) -> bool {
    rect.width.to_milli_i64() <= DEGENERATE_EXTENT_MILLI
        || rect.height.to_milli_i64() <= DEGENERATE_EXTENT_MILLI
}

pub fn layout_margin_boxes(
    page: Size,
    margins: Margins,
    inputs: &BTreeMap<MarginBoxSlot, MarginBoxInput>,
) -> Vec<MarginBoxGeometry> {
    let mut out = Vec::new();
    let input = |slot: MarginBoxSlot| inputs.get(&slot).copied().unwrap_or_default();

    let corners = [
        (
            MarginBoxSlot::TopLeftCorner,
            Rect::new(Pt::ZERO, Pt::ZERO, margins.left, margins.top),
        ),
        (
            MarginBoxSlot::TopRightCorner,
            Rect::new(page.width - margins.right, Pt::ZERO, margins.right, margins.top),
        ),
        (
            MarginBoxSlot::BottomRightCorner,
            Rect::new(
                page.width - margins.right,
                page.height - margins.bottom,
                margins.right,
                margins.bottom,
            ),
        ),
        (
            MarginBoxSlot::BottomLeftCorner,
            Rect::new(
                Pt::ZERO,
                page.height - margins.bottom,
                margins.left,
                margins.bottom,
            ),
        ),
    ];
    let mut corner_rects: BTreeMap<MarginBoxSlot, Rect> = corners.into_iter().collect();

    for edge in [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left] {
        let slots = edge.slots();
        let boxes = [input(slots[0]), input(slots[1]), input(slots[2])];
        if !boxes.iter().any(|b| b.present) {
            continue;
        }
        let (origin, available) = if edge.is_horizontal() {
            (margins.left, page.width - margins.horizontal())
        } else {
            (margins.top, page.height - margins.vertical())
        };
        let available = available.max(Pt::ZERO);
        let sizes = distribute(&boxes, available);
        let offsets = [
            origin,
            origin + (available - sizes[1]) / 2,
            origin + available - sizes[2],
        ];
        for index in 0..3 {
            let rect = match edge {
                Edge::Top => Rect::new(offsets[index], Pt::ZERO, sizes[index], margins.top),
                Edge::Bottom => Rect::new(
                    offsets[index],
                    page.height - margins.bottom,
                    sizes[index],
                    margins.bottom,
                ),
                Edge::Left => Rect::new(Pt::ZERO, offsets[index], margins.left, sizes[index]),
                Edge::Right => Rect::new(
                    page.width - margins.right,
                    offsets[index],
                    margins.right,
                    sizes[index],
                ),
            };
            corner_rects.insert(slots[index], rect);
        }
    }

    for slot in MarginBoxSlot::ALL {
        if !input(slot).present {
            continue;
        }
        let Some(rect) = corner_rects.get(&slot).copied() else {
            continue;
        };
        if is_degenerate(&rect) {
            log::warn!(
                "margin box {} suppressed: degenerate size {}x{}",
                slot.name(),
                rect.width.to_f32(),
                rect.height.to_f32()
            );
            continue;
        }
        out.push(MarginBoxGeometry { slot, rect });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(v: f32) -> Pt {
        Pt::from_f32(v)
    }

    #[test]
    fn lone_auto_box_takes_full_length() {
        let boxes = [
            MarginBoxInput::default(),
            MarginBoxInput::default(),
            MarginBoxInput::with_content(pt(10.0), pt(40.0)),
        ];
        let sizes = distribute(&boxes, pt(500.0));
        assert_eq!(sizes[2], pt(500.0));
        assert_eq!(sizes[0], Pt::ZERO);
    }

    #[test]
    fn outer_boxes_split_by_max_content_ratio() {
        let boxes = [
            MarginBoxInput::with_content(pt(10.0), pt(100.0)),
            MarginBoxInput::default(),
            MarginBoxInput::with_content(pt(10.0), pt(300.0)),
        ];
        let sizes = distribute(&boxes, pt(800.0));
        assert_eq!(sizes[0], pt(200.0));
        assert_eq!(sizes[2], pt(600.0));
    }

    #[test]
    fn center_box_keeps_outer_boxes_symmetric() {
        let boxes = [
            MarginBoxInput::with_content(pt(20.0), pt(80.0)),
            MarginBoxInput::with_content(pt(30.0), pt(120.0)),
            MarginBoxInput::with_content(pt(10.0), pt(40.0)),
        ];
        let available = pt(500.0);
        let sizes = distribute(&boxes, available);
        assert_eq!(sizes[0], sizes[2]);
        assert!(sizes[0] >= pt(80.0));
        let total: Pt = sizes.iter().copied().sum();
        assert!(total <= available);
    }

    #[test]
    fn max_constraint_pins_and_reruns() {
        let mut start = MarginBoxInput::with_content(pt(10.0), pt(100.0));
        start.max_extent = Some(pt(50.0));
        let boxes = [
            start,
            MarginBoxInput::default(),
            MarginBoxInput::with_content(pt(10.0), pt(100.0)),
        ];
        let sizes = distribute(&boxes, pt(400.0));
        assert_eq!(sizes[0], pt(50.0));
        assert_eq!(sizes[2], pt(350.0));
    }

    #[test]
    fn outer_max_width_holds_beside_auto_center() {
        let mut start = MarginBoxInput::with_content(pt(10.0), pt(100.0));
        start.max_extent = Some(pt(50.0));
        let boxes = [
            start,
            MarginBoxInput::with_content(pt(10.0), pt(20.0)),
            MarginBoxInput::with_content(pt(10.0), pt(100.0)),
        ];
        let available = pt(400.0);
        let sizes = distribute(&boxes, available);
        assert_eq!(sizes[0], pt(50.0));
        assert!(sizes[2] >= pt(100.0));
        // Center stays centered between equal side reservations.
        assert_eq!(sizes[1], available - sizes[2] * 2);
    }

    #[test]
    fn outer_width_holds_beside_fixed_center() {
        let mut start = MarginBoxInput::with_content(pt(5.0), pt(30.0));
        start.extent = Some(pt(50.0));
        let mut center = MarginBoxInput::with_content(pt(5.0), pt(30.0));
        center.extent = Some(pt(100.0));
        let boxes = [start, center, MarginBoxInput::with_content(pt(5.0), pt(30.0))];
        let sizes = distribute(&boxes, pt(500.0));
        assert_eq!(sizes, [pt(50.0), pt(100.0), pt(200.0)]);

        let page = Size::new(pt(600.0), pt(800.0));
        let mut inputs = BTreeMap::new();
        inputs.insert(MarginBoxSlot::TopLeft, boxes[0]);
        inputs.insert(MarginBoxSlot::TopCenter, boxes[1]);
        let geometry = layout_margin_boxes(page, Margins::all(50.0), &inputs);
        let left = geometry
            .iter()
            .find(|g| g.slot == MarginBoxSlot::TopLeft)
            .expect("top-left");
        assert_eq!(left.rect.x, pt(50.0));
        assert_eq!(left.rect.width, pt(50.0));
        let center = geometry
            .iter()
            .find(|g| g.slot == MarginBoxSlot::TopCenter)
            .expect("top-center");
        assert_eq!(center.rect.x, pt(250.0));
    }

    #[test]
    fn sums_never_exceed_available() {
        let mut fixed = MarginBoxInput::with_content(pt(5.0), pt(5.0));
        fixed.extent = Some(pt(400.0));
        let boxes = [fixed, MarginBoxInput::default(), fixed];
        let sizes = distribute(&boxes, pt(300.0));
        let total: Pt = sizes.iter().copied().sum();
        assert!(total <= pt(300.0));
    }

    #[test]
    fn rectangles_follow_page_edges() {
        let page = Size::new(pt(600.0), pt(800.0));
        let margins = Margins::all(50.0);
        let mut inputs = BTreeMap::new();
        inputs.insert(
            MarginBoxSlot::TopCenter,
            MarginBoxInput::with_content(pt(30.0), pt(60.0)),
        );
        inputs.insert(
            MarginBoxSlot::BottomRightCorner,
            MarginBoxInput::with_content(pt(5.0), pt(10.0)),
        );
        let geometry = layout_margin_boxes(page, margins, &inputs);
        assert_eq!(geometry.len(), 2);
        let top = geometry
            .iter()
            .find(|g| g.slot == MarginBoxSlot::TopCenter)
            .expect("top-center");
        assert_eq!(top.rect.y, Pt::ZERO);
        assert_eq!(top.rect.height, pt(50.0));
        assert_eq!(top.rect.width, pt(500.0));
        let corner = geometry
            .iter()
            .find(|g| g.slot == MarginBoxSlot::BottomRightCorner)
            .expect("corner");
        assert_eq!(corner.rect.x, pt(550.0));
    }

    #[test]
    fn degenerate_boxes_are_suppressed() {
        let page = Size::new(pt(600.0), pt(800.0));
        let margins = Margins {
            top: Pt::ZERO,
            ..Margins::all(50.0)
        };
        let mut inputs = BTreeMap::new();
        inputs.insert(
            MarginBoxSlot::TopLeft,
            MarginBoxInput::with_content(pt(10.0), pt(10.0)),
        );
        assert!(layout_margin_boxes(page, margins, &inputs).is_empty());
    }
}
