pub mod partition;
pub mod solver;

use nalgebra::DMatrix;
use rand::Rng;

use crate::linalg::SparseMatrix;
use crate::models::ScoredCandidate;

/// The latent-factor model: confidence and preference matrices derived once
/// from the interaction data, plus the two factor matrices being alternated.
///
/// Rows of the interaction matrix are users, columns are items. X is aligned
/// to users, Y to items. During training the coordinator's control flow is
/// the sole mutator; once frozen, client handlers only read it through a
/// read-locked accessor.
pub struct Model {
    /// C[u][i] = 1 + alpha * R[u][i], users x items.
    pub confidence: DMatrix<f64>,
    /// P[u][i] = 1 if R[u][i] > 0 else 0, users x items.
    pub preference: DMatrix<f64>,
    /// User factors, users x k.
    pub x: DMatrix<f64>,
    /// Item factors, items x k.
    pub y: DMatrix<f64>,
    pub lambda: f64,
    pub last_cost: f64,
}

impl Model {
    pub fn new(interactions: &SparseMatrix, alpha: f64, lambda: f64) -> Self {
        let (users, items) = (interactions.rows(), interactions.cols());

        let mut confidence = DMatrix::from_element(users, items, 1.0);
        let mut preference = DMatrix::zeros(users, items);
        for &(u, i, value) in interactions.entries() {
            confidence[(u as usize, i as usize)] = 1.0 + alpha * value;
            preference[(u as usize, i as usize)] = if value > 0.0 { 1.0 } else { 0.0 };
        }

        // Factor rank: a quarter of the longer dimension, at least 1.
        let k = (users.max(items) / 4).max(1);

        let mut rng = rand::thread_rng();
        let x = DMatrix::from_fn(users, k, |_, _| rng.gen::<f64>());
        let y = DMatrix::from_fn(items, k, |_, _| rng.gen::<f64>());

        let mut model = Self {
            confidence,
            preference,
            x,
            y,
            lambda,
            last_cost: 0.0,
        };
        model.last_cost = model.cost();
        model
    }

    pub fn user_count(&self) -> usize {
        self.x.nrows()
    }

    pub fn item_count(&self) -> usize {
        self.y.nrows()
    }

    pub fn factor_rank(&self) -> usize {
        self.x.ncols()
    }

    /// Confidence and preference slices aligned with one partition: rows
    /// [start, end) when solving X, columns [start, end) when solving Y.
    pub fn slice_for(&self, solving_x: bool, start: usize, end: usize) -> (DMatrix<f64>, DMatrix<f64>) {
        let len = end - start;
        if solving_x {
            (
                self.confidence.rows(start, len).into_owned(),
                self.preference.rows(start, len).into_owned(),
            )
        } else {
            (
                self.confidence.columns(start, len).into_owned(),
                self.preference.columns(start, len).into_owned(),
            )
        }
    }

    /// Regularized weighted squared-error cost:
    /// sum of C * (P - Y_i . X_u)^2 plus lambda * (sum ||X_u||^2 + sum ||Y_i||^2).
    pub fn cost(&self) -> f64 {
        let mut sum = 0.0;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;

        for u in 0..self.x.nrows() {
            sum_x += self.x.row(u).norm_squared();
        }
        for i in 0..self.y.nrows() {
            sum_y += self.y.row(i).norm_squared();
        }

        for u in 0..self.x.nrows() {
            let xu = self.x.row(u);
            for i in 0..self.y.nrows() {
                let residual = self.preference[(u, i)] - self.y.row(i).dot(&xu);
                sum += self.confidence[(u, i)] * residual * residual;
            }
        }

        sum + self.lambda * (sum_x + sum_y)
    }

    /// Recomputes the cost, stores it, and returns the absolute delta from
    /// the previous value.
    pub fn update_cost(&mut self) -> f64 {
        let cost = self.cost();
        let delta = (cost - self.last_cost).abs();
        self.last_cost = cost;
        delta
    }

    pub fn score(&self, user: usize, item: usize) -> f64 {
        self.y.row(item).dot(&self.x.row(user))
    }

    /// Top-`count` item ids for `user`, never recommending `exclude`.
    ///
    /// Returns `None` (the out-of-bounds marker, not an error and not an
    /// empty list) when the user id or count exceeds the model dimensions.
    /// Ranking is a stable ascending sort by score read off from the top,
    /// so among equal scores the higher item id wins.
    pub fn recommend(&self, user: usize, count: usize, exclude: u64) -> Option<Vec<u64>> {
        if user >= self.user_count() || count > self.item_count() {
            return None;
        }

        let mut candidates: Vec<ScoredCandidate> = (0..self.item_count())
            .filter(|&item| item as u64 != exclude)
            .map(|item| ScoredCandidate {
                item,
                score: self.score(user, item),
            })
            .collect();

        candidates.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));

        Some(
            candidates
                .iter()
                .rev()
                .take(count)
                .map(|c| c.item as u64)
                .collect(),
        )
    }
}
