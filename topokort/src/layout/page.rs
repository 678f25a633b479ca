//! Pages and the editable page set.
//!
//! A [`PageSet`] is what the layout engine produces and what an interactive
//! editor mutates. Every operation keeps a page's bbox exactly as large as
//! the ground span of its paper/scale/dpi/orientation, and ids stay stable
//! across edits.

use std::fmt;

use super::paper::{Orientation, PageMetrics, Paper};
use crate::coord::Point;
use crate::geometry::BBox;

/// Stable page identifier, unique within one [`PageSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One printed page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: PageId,
    /// Planar bbox in the track's projection
    pub bbox: BBox,
    pub metrics: PageMetrics,
    /// Locked pages are kept by editors when the layout is recomputed
    pub locked: bool,
}

impl Page {
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.metrics.orientation
    }

    /// Index of the first track point inside the page, if any.
    pub fn first_track_index(&self, points: &[Point]) -> Option<usize> {
        points.iter().position(|p| self.bbox.contains(*p))
    }
}

/// Page geometry as produced by a layout algorithm, before ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub bbox: BBox,
    pub metrics: PageMetrics,
}

/// Parameters that fix the size of every page in a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub paper: Paper,
    pub scale: u32,
    pub dpi: u32,
}

impl PageFormat {
    pub fn metrics(&self, orientation: Orientation) -> PageMetrics {
        PageMetrics::new(self.scale, self.dpi, self.paper, orientation)
    }
}

/// Ordered, editable collection of pages.
#[derive(Debug, Clone)]
pub struct PageSet {
    format: PageFormat,
    pages: Vec<Page>,
    next_id: u64,
}

impl PageSet {
    /// Empty set for a page format.
    pub fn new(format: PageFormat) -> Self {
        Self {
            format,
            pages: Vec::new(),
            next_id: 1,
        }
    }

    /// Builds a set from layout output, assigning ids in order.
    pub fn from_placements(format: PageFormat, placements: Vec<PagePlacement>) -> Self {
        let mut set = Self::new(format);
        for placement in placements {
            let id = set.allocate_id();
            set.pages.push(Page {
                id,
                bbox: placement.bbox,
                metrics: placement.metrics,
                locked: false,
            });
        }
        set
    }

    pub fn format(&self) -> PageFormat {
        self.format
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn index_of(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    fn allocate_id(&mut self) -> PageId {
        let id = PageId(self.next_id);
        self.next_id += 1;
        id
    }

    fn new_page(&mut self, center: Point, orientation: Orientation) -> Page {
        let metrics = self.format.metrics(orientation);
        Page {
            id: self.allocate_id(),
            bbox: BBox::from_center(center.x, center.y, metrics.w_m, metrics.h_m),
            metrics,
            locked: false,
        }
    }

    /// Inserts a portrait page centered on `center`, in the middle of the set.
    pub fn add_page_at(&mut self, center: Point) -> PageId {
        let page = self.new_page(center, Orientation::Portrait);
        let id = page.id;
        let index = self.pages.len() / 2;
        self.pages.insert(index, page);
        id
    }

    /// Inserts a copy of `source` shifted right by one overlap-adjusted page
    /// width, directly after it.
    pub fn add_page_right_of(&mut self, source: PageId, overlap: f64) -> Option<PageId> {
        let index = self.index_of(source)?;
        let src = &self.pages[index];
        let center = src.bbox.center();
        let shift = src.metrics.w_m * (1.0 - crate::geometry::clamp_overlap(overlap));
        let orientation = src.orientation();
        let page = self.new_page(Point::new(center.x + shift, center.y), orientation);
        let id = page.id;
        self.pages.insert(index + 1, page);
        Some(id)
    }

    /// Removes a page; returns it if it existed.
    pub fn remove(&mut self, id: PageId) -> Option<Page> {
        let index = self.index_of(id)?;
        Some(self.pages.remove(index))
    }

    /// Moves a page to a new position in the print order (clamped).
    pub fn move_to(&mut self, id: PageId, index: usize) -> bool {
        let Some(current) = self.index_of(id) else {
            return false;
        };
        let target = index.min(self.pages.len() - 1);
        if target == current {
            return false;
        }
        let page = self.pages.remove(current);
        self.pages.insert(target, page);
        true
    }

    /// Re-centers a page on a new planar position. Locked pages don't move.
    pub fn translate_to(&mut self, id: PageId, center: Point) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if page.locked {
            return false;
        }
        page.bbox = BBox::from_center(center.x, center.y, page.metrics.w_m, page.metrics.h_m);
        true
    }

    /// Flips a page between portrait and landscape around its center.
    pub fn toggle_orientation(&mut self, id: PageId) -> bool {
        let format = self.format;
        let Some(page) = self.pages.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        let metrics = format.metrics(page.orientation().toggled());
        let c = page.bbox.center();
        page.bbox = BBox::from_center(c.x, c.y, metrics.w_m, metrics.h_m);
        page.metrics = metrics;
        true
    }

    /// Applies a new paper/scale/dpi to every page, keeping centers and
    /// orientations.
    pub fn resize_all(&mut self, format: PageFormat) {
        self.format = format;
        for page in &mut self.pages {
            let metrics = format.metrics(page.orientation());
            let c = page.bbox.center();
            page.bbox = BBox::from_center(c.x, c.y, metrics.w_m, metrics.h_m);
            page.metrics = metrics;
        }
    }

    /// Flips the lock flag of one page and returns the new state.
    pub fn toggle_lock(&mut self, id: PageId) -> Option<bool> {
        let page = self.pages.iter_mut().find(|p| p.id == id)?;
        page.locked = !page.locked;
        Some(page.locked)
    }

    pub fn set_all_locked(&mut self, locked: bool) {
        for page in &mut self.pages {
            page.locked = locked;
        }
    }

    /// Stable-sorts pages by the first track point they contain; pages
    /// without any track point go last.
    pub fn reorder_by_track(&mut self, points: &[Point]) {
        self.pages
            .sort_by_key(|p| p.first_track_index(points).unwrap_or(usize::MAX));
    }

    /// Drops every page.
    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> PageFormat {
        PageFormat {
            paper: Paper::A4,
            scale: 50_000,
            dpi: 300,
        }
    }

    fn assert_ground_span(page: &Page) {
        assert!((page.bbox.width() - page.metrics.w_m).abs() < 1e-6);
        assert!((page.bbox.height() - page.metrics.h_m).abs() < 1e-6);
    }

    #[test]
    fn test_ids_are_incremental() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        let b = set.add_page_at(Point::new(1000.0, 0.0));
        assert_eq!(a, PageId(1));
        assert_eq!(b, PageId(2));
        set.remove(a);
        let c = set.add_page_at(Point::new(0.0, 0.0));
        assert_eq!(c, PageId(3));
    }

    #[test]
    fn test_add_page_at_inserts_in_middle() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        let b = set.add_page_at(Point::new(0.0, 0.0));
        let c = set.add_page_at(Point::new(0.0, 0.0));
        // [a] -> [b, a] -> [b, c, a]
        let order: Vec<_> = set.pages().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn test_add_page_right_of_shifts_by_overlap_adjusted_width() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        let b = set.add_page_right_of(a, 0.05).unwrap();
        let pa = set.get(a).unwrap().clone();
        let pb = set.get(b).unwrap();
        let expected = pa.metrics.w_m * 0.95;
        assert!((pb.bbox.center().x - pa.bbox.center().x - expected).abs() < 1e-6);
        assert_eq!(set.index_of(b), Some(1));
        assert_ground_span(pb);
    }

    #[test]
    fn test_toggle_orientation_keeps_center() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(500.0, 700.0));
        assert!(set.toggle_orientation(a));
        let page = set.get(a).unwrap();
        assert_eq!(page.orientation(), Orientation::Landscape);
        assert!((page.bbox.center().x - 500.0).abs() < 1e-6);
        assert!((page.bbox.center().y - 700.0).abs() < 1e-6);
        assert!(page.bbox.width() > page.bbox.height());
        assert_ground_span(page);
    }

    #[test]
    fn test_resize_all_updates_span() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        set.resize_all(PageFormat {
            paper: Paper::A3,
            scale: 25_000,
            dpi: 300,
        });
        assert_ground_span(set.get(a).unwrap());
        assert_eq!(set.format().paper, Paper::A3);
    }

    #[test]
    fn test_locked_page_does_not_translate() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        assert_eq!(set.toggle_lock(a), Some(true));
        assert!(!set.translate_to(a, Point::new(100.0, 100.0)));
        assert_eq!(set.toggle_lock(a), Some(false));
        assert!(set.translate_to(a, Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_move_to_clamps() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        let _b = set.add_page_right_of(a, 0.0).unwrap();
        assert!(set.move_to(a, 99));
        assert_eq!(set.index_of(a), Some(1));
        assert!(!set.move_to(a, 5));
    }

    #[test]
    fn test_reorder_by_track() {
        let mut set = PageSet::new(format());
        let a = set.add_page_at(Point::new(0.0, 0.0));
        let far = set.add_page_right_of(a, 0.0).unwrap();
        let empty = set.add_page_at(Point::new(1.0e7, 1.0e7));
        let w = set.get(a).unwrap().metrics.w_m;
        // The track visits the right page first, then the left one.
        let points = [Point::new(w, 0.0), Point::new(0.0, 0.0)];
        set.reorder_by_track(&points);
        let order: Vec<_> = set.pages().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![far, a, empty]);
    }
}
