//! Detection and removal of redundant overlapping regions.
//!
//! Overlap is measured with the coverage ratio: the intersection area
//! divided by the smaller of the two box areas. A pair whose ratio is
//! strictly greater than the threshold is an overlap edge. Regions are only
//! ever compared against regions on the same page.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::TextmapError;
use crate::model::{BBox, Region};

pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.5;

/// Rule used to pick the survivor of an overlapping pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapStrategy {
    /// Remove the smaller box; on an exact area tie remove the later one.
    #[default]
    KeepLargest,
    /// Remove the later box regardless of area.
    KeepFirst,
    /// Reserved name. Not implemented.
    Merge,
}

impl OverlapStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapStrategy::KeepLargest => "keep_largest",
            OverlapStrategy::KeepFirst => "keep_first",
            OverlapStrategy::Merge => "merge",
        }
    }
}

impl fmt::Display for OverlapStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An overlapping pair found during resolution.
///
/// `first` and `second` index into the slice passed to the resolver, with
/// `first < second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEdge {
    pub first: usize,
    pub second: usize,
    pub coverage: f64,
}

/// Intersection area over the smaller box area, in `[0, 1]`.
pub fn coverage_ratio(a: &BBox, b: &BBox) -> f64 {
    let intersection = a.intersection_area(b);
    if intersection <= 0.0 {
        return 0.0;
    }
    let min_area = a.area().min(b.area());
    if min_area <= 0.0 {
        return 0.0;
    }
    (intersection / min_area).min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapResolver {
    strategy: OverlapStrategy,
    threshold: f64,
}

impl Default for OverlapResolver {
    fn default() -> Self {
        OverlapResolver {
            strategy: OverlapStrategy::default(),
            threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

impl OverlapResolver {
    /// Thresholds of 1 or more are accepted; no pair can exceed them, so
    /// filtering keeps every region.
    pub fn new(strategy: OverlapStrategy, threshold: f64) -> Result<Self, TextmapError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(TextmapError::InvalidThreshold(threshold));
        }
        Ok(OverlapResolver {
            strategy,
            threshold,
        })
    }

    pub fn strategy(&self) -> OverlapStrategy {
        self.strategy
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find every same-page pair whose coverage ratio exceeds the threshold.
    pub fn detect_overlaps(&self, regions: &[Region]) -> Vec<OverlapEdge> {
        let mut by_page: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, region) in regions.iter().enumerate() {
            by_page.entry(region.page_number()).or_default().push(idx);
        }

        let mut edges = Vec::new();
        for (page, indices) in &by_page {
            for (pos, &i) in indices.iter().enumerate() {
                for &j in &indices[pos + 1..] {
                    let coverage = coverage_ratio(regions[i].bbox(), regions[j].bbox());
                    if coverage > self.threshold {
                        log::debug!(
                            "page {page}: regions {i} and {j} overlap (coverage {coverage:.3})"
                        );
                        edges.push(OverlapEdge {
                            first: i,
                            second: j,
                            coverage,
                        });
                    }
                }
            }
        }
        edges
    }

    /// Indices of the regions that survive filtering, ascending.
    pub fn kept_indices(&self, regions: &[Region]) -> Result<Vec<usize>, TextmapError> {
        let loser: fn(&[Region], &OverlapEdge) -> usize = match self.strategy {
            OverlapStrategy::KeepLargest => smaller_of,
            OverlapStrategy::KeepFirst => |_, edge| edge.second,
            OverlapStrategy::Merge => {
                return Err(TextmapError::UnsupportedStrategy(
                    self.strategy.to_string(),
                ))
            }
        };

        let mut removed = vec![false; regions.len()];
        for edge in &self.detect_overlaps(regions) {
            removed[loser(regions, edge)] = true;
        }

        Ok((0..regions.len()).filter(|&i| !removed[i]).collect())
    }

    /// Drop redundant regions, keeping survivors in their original order.
    pub fn filter_overlapping(&self, regions: Vec<Region>) -> Result<Vec<Region>, TextmapError> {
        let kept = self.kept_indices(&regions)?;
        if kept.len() == regions.len() {
            return Ok(regions);
        }

        let total = regions.len();
        let mut keep = kept.into_iter().peekable();
        let survivors: Vec<Region> = regions
            .into_iter()
            .enumerate()
            .filter_map(|(i, region)| {
                if keep.peek() == Some(&i) {
                    keep.next();
                    Some(region)
                } else {
                    None
                }
            })
            .collect();

        log::debug!(
            "filtered {} of {} region(s) (strategy: {}, threshold: {})",
            total - survivors.len(),
            total,
            self.strategy,
            self.threshold
        );
        Ok(survivors)
    }
}

fn smaller_of(regions: &[Region], edge: &OverlapEdge) -> usize {
    let first = regions[edge.first].area();
    let second = regions[edge.second].area();
    if first < second {
        edge.first
    } else {
        edge.second
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageGeometry;
    use std::sync::Arc;

    fn region(text: &str, page: usize, x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
        let geometry = PageGeometry {
            page_number: page,
            width: 612.0,
            height: 792.0,
        };
        Region::new(text, BBox::new(x0, y0, x1, y1), &geometry, Arc::from("t.pdf")).unwrap()
    }

    fn texts(regions: &[Region]) -> Vec<&str> {
        regions.iter().map(|r| r.text()).collect()
    }

    fn resolver(strategy: OverlapStrategy, threshold: f64) -> OverlapResolver {
        OverlapResolver::new(strategy, threshold).unwrap()
    }

    #[test]
    fn test_coverage_uses_smaller_area() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(coverage_ratio(&a, &b), 0.25);

        let inner = BBox::new(2.0, 2.0, 4.0, 4.0);
        assert_eq!(coverage_ratio(&a, &inner), 1.0);
        assert_eq!(coverage_ratio(&a, &BBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let regions = vec![
            region("A", 1, 0.0, 0.0, 10.0, 10.0),
            region("B", 1, 5.0, 5.0, 15.0, 15.0),
        ];
        assert!(resolver(OverlapStrategy::KeepLargest, 0.5)
            .detect_overlaps(&regions)
            .is_empty());
        assert!(resolver(OverlapStrategy::KeepLargest, 0.25)
            .detect_overlaps(&regions)
            .is_empty());

        let edges = resolver(OverlapStrategy::KeepLargest, 0.2).detect_overlaps(&regions);
        assert_eq!(
            edges,
            vec![OverlapEdge {
                first: 0,
                second: 1,
                coverage: 0.25
            }]
        );
    }

    #[test]
    fn test_different_pages_are_never_compared() {
        let regions = vec![
            region("A", 1, 0.0, 0.0, 10.0, 10.0),
            region("A", 2, 0.0, 0.0, 10.0, 10.0),
        ];
        let r = resolver(OverlapStrategy::KeepFirst, 0.0);
        assert!(r.detect_overlaps(&regions).is_empty());
        assert_eq!(r.filter_overlapping(regions).unwrap().len(), 2);
    }

    #[test]
    fn test_keep_largest_removes_smaller_box() {
        let regions = vec![
            region("small", 1, 0.0, 0.0, 5.0, 10.0),
            region("large", 1, 0.0, 0.0, 10.0, 10.0),
        ];
        let out = resolver(OverlapStrategy::KeepLargest, 0.5)
            .filter_overlapping(regions)
            .unwrap();
        assert_eq!(texts(&out), vec!["large"]);
    }

    #[test]
    fn test_keep_largest_tie_removes_later_box() {
        let regions = vec![
            region("first", 1, 0.0, 0.0, 10.0, 10.0),
            region("second", 1, 1.0, 0.0, 11.0, 10.0),
        ];
        let out = resolver(OverlapStrategy::KeepLargest, 0.5)
            .filter_overlapping(regions)
            .unwrap();
        assert_eq!(texts(&out), vec!["first"]);
    }

    #[test]
    fn test_keep_first_keeps_only_earliest_of_mutual_overlaps() {
        let regions = vec![
            region("A", 1, 0.0, 0.0, 10.0, 10.0),
            region("B", 1, 1.0, 0.0, 11.0, 10.0),
            region("C", 1, 0.0, 0.0, 30.0, 30.0),
        ];
        let out = resolver(OverlapStrategy::KeepFirst, 0.5)
            .filter_overlapping(regions)
            .unwrap();
        assert_eq!(texts(&out), vec!["A"]);
    }

    #[test]
    fn test_removal_is_not_cascaded() {
        // C overlaps only B. It is still removed even though B itself
        // does not survive.
        let regions = vec![
            region("A", 1, 0.0, 0.0, 10.0, 10.0),
            region("B", 1, 6.0, 0.0, 14.0, 10.0),
            region("C", 1, 12.0, 0.0, 20.0, 10.0),
        ];
        let r = resolver(OverlapStrategy::KeepFirst, 0.2);
        let edges = r.detect_overlaps(&regions);
        assert_eq!(edges.len(), 2);
        let out = r.filter_overlapping(regions).unwrap();
        assert_eq!(texts(&out), vec!["A"]);
    }

    #[test]
    fn test_survivors_keep_extraction_order() {
        let regions = vec![
            region("a", 1, 0.0, 0.0, 5.0, 5.0),
            region("big", 1, 0.0, 0.0, 10.0, 10.0),
            region("far", 1, 100.0, 100.0, 110.0, 110.0),
            region("p2", 2, 0.0, 0.0, 5.0, 5.0),
        ];
        let out = resolver(OverlapStrategy::KeepLargest, 0.5)
            .filter_overlapping(regions)
            .unwrap();
        assert_eq!(texts(&out), vec!["big", "far", "p2"]);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let regions = vec![
            region("a", 1, 0.0, 0.0, 10.0, 10.0),
            region("b", 1, 2.0, 2.0, 9.0, 9.0),
            region("c", 1, 8.0, 8.0, 20.0, 20.0),
            region("d", 1, 19.0, 19.0, 25.0, 25.0),
            region("e", 2, 0.0, 0.0, 10.0, 10.0),
            region("f", 2, 0.0, 0.0, 10.0, 10.0),
        ];
        for strategy in [OverlapStrategy::KeepLargest, OverlapStrategy::KeepFirst] {
            for threshold in [0.0, 0.1, 0.5, 0.9] {
                let r = resolver(strategy, threshold);
                let once = r.filter_overlapping(regions.clone()).unwrap();
                let twice = r.filter_overlapping(once.clone()).unwrap();
                assert_eq!(once, twice, "{strategy} @ {threshold}");
            }
        }
    }

    #[test]
    fn test_threshold_of_one_or_more_keeps_everything() {
        let regions = vec![
            region("a", 1, 0.0, 0.0, 10.0, 10.0),
            region("a", 1, 0.0, 0.0, 10.0, 10.0),
            region("b", 1, 2.0, 2.0, 3.0, 3.0),
        ];
        for threshold in [1.0, 1.5, 100.0] {
            let out = resolver(OverlapStrategy::KeepLargest, threshold)
                .filter_overlapping(regions.clone())
                .unwrap();
            assert_eq!(out, regions);
        }
    }

    #[test]
    fn test_zero_threshold_flags_any_intersection_but_not_touching() {
        let regions = vec![
            region("a", 1, 0.0, 0.0, 10.0, 10.0),
            region("b", 1, 9.9, 9.9, 20.0, 20.0),
            region("c", 1, 20.0, 0.0, 30.0, 9.0),
        ];
        let edges = resolver(OverlapStrategy::KeepFirst, 0.0).detect_overlaps(&regions);
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].first, edges[0].second), (0, 1));
    }

    #[test]
    fn test_empty_and_single_inputs_are_untouched() {
        let r = OverlapResolver::default();
        assert!(r.filter_overlapping(Vec::new()).unwrap().is_empty());
        let one = vec![region("solo", 1, 0.0, 0.0, 1.0, 1.0)];
        assert_eq!(r.filter_overlapping(one.clone()).unwrap(), one);
    }

    #[test]
    fn test_merge_is_unsupported() {
        let r = resolver(OverlapStrategy::Merge, 0.5);
        let err = r.filter_overlapping(Vec::new()).unwrap_err();
        assert!(matches!(err, TextmapError::UnsupportedStrategy(ref s) if s == "merge"));
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        for t in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                OverlapResolver::new(OverlapStrategy::KeepFirst, t),
                Err(TextmapError::InvalidThreshold(_))
            ));
        }
    }

    #[test]
    fn test_strategy_display_names() {
        assert_eq!(OverlapStrategy::KeepLargest.to_string(), "keep_largest");
        assert_eq!(OverlapStrategy::KeepFirst.to_string(), "keep_first");
        let err = OverlapResolver::new(OverlapStrategy::Merge, 0.5)
            .unwrap()
            .filter_overlapping(Vec::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported overlap strategy 'merge'");
    }
}
