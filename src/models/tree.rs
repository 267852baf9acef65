//! Depth-limited regression tree grown on gradient statistics.
//!
//! Each tree is fitted to first/second order gradients of the squared-error
//! loss (exact greedy split search), in the XGBoost formulation:
//!
//! - leaf weight: `w = -G / (H + λ)`
//! - split gain: `G_L²/(H_L+λ) + G_R²/(H_R+λ) - G²/(H+λ)`, kept only if it
//!   exceeds `γ`
//! - a child must carry at least `min_child_weight` hessian mass
//!
//! Rows go left when `x[feature] < threshold`; thresholds sit halfway between
//! consecutive distinct feature values.

use nalgebra::DMatrix;

/// Gains at or below this are treated as numerical noise.
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on `rows` of `x`, considering only `features`.
    ///
    /// `grad` and `hess` are indexed by row id (same length as `x.nrows()`).
    pub fn fit(
        x: &DMatrix<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, grad, hess, rows.to_vec(), features, params, 0);
        tree
    }

    fn grow(
        &mut self,
        x: &DMatrix<f64>,
        grad: &[f64],
        hess: &[f64],
        rows: Vec<usize>,
        features: &[usize],
        params: &TreeParams,
        depth: usize,
    ) -> usize {
        let g: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| hess[i]).sum();

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf(leaf_weight(g, h, params.reg_lambda)));

        if depth >= params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(split) = best_split(x, grad, hess, &rows, features, g, h, params) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| x[(i, split.feature)] < split.threshold);

        let left = self.grow(x, grad, hess, left_rows, features, params, depth + 1);
        let right = self.grow(x, grad, hess, right_rows, features, params, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Predict for a dense feature row.
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.walk(|feature| row[feature])
    }

    /// Predict for row `i` of a design matrix.
    pub fn predict_at(&self, x: &DMatrix<f64>, i: usize) -> f64 {
        self.walk(|feature| x[(i, feature)])
    }

    fn walk(&self, value: impl Fn(usize) -> f64) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Leaf(w) => return *w,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if value(*feature) < *threshold { *left } else { *right };
                }
            }
        }
    }

    #[cfg(test)]
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf(_))).count()
    }
}

fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 { 0.0 } else { -g / denom }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 { 0.0 } else { g * g / denom }
}

#[allow(clippy::too_many_arguments)]
fn best_split(
    x: &DMatrix<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    features: &[usize],
    g_total: f64,
    h_total: f64,
    params: &TreeParams,
) -> Option<BestSplit> {
    let lambda = params.reg_lambda;
    let parent = score(g_total, h_total, lambda);
    let mut best: Option<BestSplit> = None;
    let mut sorted = rows.to_vec();

    for &feature in features {
        sorted.sort_by(|&a, &b| x[(a, feature)].total_cmp(&x[(b, feature)]));

        let mut gl = 0.0;
        let mut hl = 0.0;
        for k in 0..sorted.len() - 1 {
            let i = sorted[k];
            gl += grad[i];
            hl += hess[i];

            let v = x[(i, feature)];
            let v_next = x[(sorted[k + 1], feature)];
            if v == v_next {
                continue;
            }

            let gr = g_total - gl;
            let hr = h_total - hl;
            if hl < params.min_child_weight || hr < params.min_child_weight {
                continue;
            }

            let gain = score(gl, hl, lambda) + score(gr, hr, lambda) - parent;
            if gain <= params.gamma || gain <= MIN_SPLIT_GAIN {
                continue;
            }
            // Strict improvement keeps the first (feature, position) on ties.
            if best.is_none_or(|b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: 0.5 * (v + v_next),
                    gain,
                });
            }
        }
    }

    best
}
