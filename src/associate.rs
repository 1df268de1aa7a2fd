use std::collections::HashSet;

use itertools::iproduct;
use pathfinding::prelude::{Matrix, kuhn_munkres};

use crate::{bbox::BBox, detection::Detection};

// used to convert the float gains into integers since
// the weight matrix of the hungarian algorithm only
// accepts integers.
const COST_MULTIPLIER: f64 = 10000.0;

/// Outcome of one association pass. Indices refer to the slices handed to
/// [`associate`] or [`linear_assignment`], all lists ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Matching {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl Matching {
    /// Nothing matched, every track and detection left over.
    pub fn unmatched(tracks: usize, detections: usize) -> Self {
        Self {
            matches: Vec::new(),
            unmatched_tracks: (0..tracks).collect(),
            unmatched_detections: (0..detections).collect(),
        }
    }
}

/// Matches track boxes against detections with a `1 - IoU` cost, optionally
/// fused with the detection score.
///
/// Either side may be empty, in which case no cost matrix is built.
pub fn associate(
    track_bboxes: &[BBox],
    detections: &[Detection],
    thresh: f64,
    fuse: bool,
) -> Matching {
    if track_bboxes.is_empty() || detections.is_empty() {
        return Matching::unmatched(track_bboxes.len(), detections.len());
    }

    let detection_bboxes: Vec<BBox> = detections.iter().map(|detection| detection.bbox).collect();
    let mut cost_matrix = iou_distance(track_bboxes, &detection_bboxes);
    if fuse {
        fuse_score(&mut cost_matrix, detections);
    }

    linear_assignment(&cost_matrix, thresh)
}

/// Builds the `1 - IoU` cost matrix with one row per track box and one column
/// per detection box.
///
/// `pathfinding` cannot hold rows without columns, so callers with tracks but
/// no detections go through [`associate`] instead.
pub fn iou_distance(track_bboxes: &[BBox], detection_bboxes: &[BBox]) -> Matrix<f64> {
    let mut matrix = Matrix::new(track_bboxes.len(), detection_bboxes.len(), 1.0);

    for ((i, track_bbox), (j, detection_bbox)) in iproduct!(
        track_bboxes.iter().enumerate(),
        detection_bboxes.iter().enumerate()
    ) {
        matrix[(i, j)] = 1.0 - track_bbox.iou(detection_bbox);
    }

    matrix
}

/// Folds the detection confidence into an IoU cost matrix so that, among
/// equally overlapping boxes, the more confident detection is cheaper.
pub fn fuse_score(cost_matrix: &mut Matrix<f64>, detections: &[Detection]) {
    for (i, (j, detection)) in iproduct!(0..cost_matrix.rows, detections.iter().enumerate()) {
        let similarity = 1.0 - cost_matrix[(i, j)];
        cost_matrix[(i, j)] = 1.0 - similarity * detection.score;
    }
}

/// Solves the track/detection assignment over `cost_matrix`.
///
/// A pair is admissible only when its cost is strictly below `thresh`.
/// Among admissible pairs the solver maximises `sum(thresh - cost)`, the
/// same optimum as a minimum cost assignment where leaving a row or a column
/// unmatched costs `thresh / 2`. Inadmissible pairs are never forced.
pub fn linear_assignment(cost_matrix: &Matrix<f64>, thresh: f64) -> Matching {
    let (rows, columns) = (cost_matrix.rows, cost_matrix.columns);
    if rows == 0 || columns == 0 {
        return Matching::unmatched(rows, columns);
    }

    let mut weights = Matrix::new(rows, columns, 0_i64);
    for (i, j) in iproduct!(0..rows, 0..columns) {
        let cost = cost_matrix[(i, j)];
        if cost < thresh {
            weights[(i, j)] = ((thresh - cost) * COST_MULTIPLIER).round() as i64;
        }
    }

    // the hungarian solver requires rows <= columns
    let transpose = rows > columns;
    let weights = if transpose {
        weights.transposed()
    } else {
        weights
    };
    let assignment_vector = kuhn_munkres(&weights).1;

    let mut matches: Vec<(usize, usize)> = assignment_vector
        .iter()
        .enumerate()
        .map(|(i, &j)| if transpose { (j, i) } else { (i, j) })
        .filter(|&(track, detection)| cost_matrix[(track, detection)] < thresh)
        .collect();
    matches.sort_unstable();

    let matched_tracks: HashSet<usize> = matches.iter().map(|&(track, _)| track).collect();
    let matched_detections: HashSet<usize> =
        matches.iter().map(|&(_, detection)| detection).collect();

    Matching {
        unmatched_tracks: (0..rows).filter(|i| !matched_tracks.contains(i)).collect(),
        unmatched_detections: (0..columns)
            .filter(|j| !matched_detections.contains(j))
            .collect(),
        matches,
    }
}
