use crate::wire::protocol::{PartialRecResponse, PartialUserFactors, Prediction};

use std::fmt;

/// Count-weighted mean of the partial gradients. With no observations at all the seed is
/// returned unchanged.
pub fn aggregate_user_factors(seed: &[f64], partials: &[PartialUserFactors]) -> Vec<f64> {
    let total: usize = partials.iter().map(|partial| partial.count).sum();
    if total == 0 {
        return seed.to_vec();
    }

    let mut global = vec![0.0; seed.len()];
    for partial in partials {
        for (sum, grad) in global.iter_mut().zip(partial.weighted_grad.iter()) {
            *sum += grad;
        }
    }
    for component in global.iter_mut() {
        *component /= total as f64;
    }
    global
}

/// Running merge of per-batch phase-2 results into one top-`quantity` list.
#[derive(Debug)]
pub struct ResultMerger {
    quantity: usize,
    predictions: Vec<Prediction>,
    merged: usize,
    sum: f64,
    count: usize,
    max: Option<f64>,
    min: Option<f64>,
}

/// Candidate statistics over every merged result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingStats {
    pub sum: f64,
    pub count: usize,
    pub max: f64,
    pub min: f64,
}

impl RatingStats {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

impl ResultMerger {
    pub fn new(quantity: usize) -> Self {
        Self {
            quantity,
            predictions: Vec::new(),
            merged: 0,
            sum: 0.0,
            count: 0,
            max: None,
            min: None,
        }
    }

    /// Folds in one batch result. Results without candidates carry no statistics.
    pub fn merge(&mut self, result: PartialRecResponse) {
        if result.count == 0 {
            return;
        }

        self.sum += result.sum;
        self.count += result.count;
        self.max = Some(self.max.map_or(result.max, |max| max.max(result.max)));
        self.min = Some(self.min.map_or(result.min, |min| min.min(result.min)));

        self.predictions.extend(result.predictions);
        self.merged += 1;
        if self.merged > 1 {
            self.sort_and_truncate();
        }
    }

    fn sort_and_truncate(&mut self) {
        self.predictions.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        self.predictions.truncate(self.quantity);
    }

    pub fn stats(&self) -> RatingStats {
        RatingStats {
            sum: self.sum,
            count: self.count,
            max: self.max.unwrap_or(0.0),
            min: self.min.unwrap_or(0.0),
        }
    }

    /// Final ranking, best first, at most `quantity` long.
    pub fn finish(mut self) -> (Vec<Prediction>, RatingStats) {
        if self.count == 0 {
            return (Vec::new(), self.stats());
        }
        self.sort_and_truncate();
        let stats = self.stats();
        (self.predictions, stats)
    }
}

/// Qualitative label attached to each recommendation, relative to the request's candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comment {
    HighlyRecommended,
    Recommended,
    SlightlyRecommended,
    SlightlyBelowAverage,
    BarelyRecommended,
    WeaklyRecommended,
}

impl Comment {
    pub fn for_rating(rating: f64, stats: &RatingStats) -> Self {
        let mean = stats.mean();
        let upper = stats.max - mean;
        let lower = mean - stats.min;

        if rating > mean + 0.9 * upper {
            Comment::HighlyRecommended
        } else if rating > mean + 0.6 * upper {
            Comment::Recommended
        } else if rating > mean {
            Comment::SlightlyRecommended
        } else if rating > mean - 0.6 * lower {
            Comment::SlightlyBelowAverage
        } else if rating > mean - 0.9 * lower {
            Comment::BarelyRecommended
        } else {
            Comment::WeaklyRecommended
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Comment::HighlyRecommended => "Highly recommended. Well above average",
            Comment::Recommended => "Recommended. Clearly above average",
            Comment::SlightlyRecommended => "Slightly recommended. Above average",
            Comment::SlightlyBelowAverage => "Not quite recommended. Just below average",
            Comment::BarelyRecommended => "Barely recommended. Clearly below average",
            Comment::WeaklyRecommended => "Weakly recommended. Well below average",
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
