//! Box matching utilities shared by detection backends.

use std::collections::HashSet;

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy IoU matching: pairs sorted by descending IoU, each side used at
/// most once. Inputs are `(index, bbox)`; output is `(left, right)` indices.
pub fn greedy_match(
    left: &[(usize, [f64; 4])],
    right: &[(usize, [f64; 4])],
    thresh: f64,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (li, lbox) in left {
        for (ri, rbox) in right {
            let score = bbox_iou(lbox, rbox);
            if score >= thresh && score > 0.0 {
                pairs.push((*li, *ri, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_left = HashSet::new();
    let mut used_right = HashSet::new();
    let mut matches = Vec::new();

    for (li, ri, _) in &pairs {
        if !used_left.contains(li) && !used_right.contains(ri) {
            used_left.insert(*li);
            used_right.insert(*ri);
            matches.push((*li, *ri));
        }
    }
    matches
}
