//! Bayesian adaptive staircase pool: one independent QUEST-family threshold
//! estimator per accuracy level, driving the response-target display duration.
//!
//! Each staircase keeps a discrete posterior over a candidate-threshold grid
//! and a fixed-slope Weibull psychometric function. `next_intensity` inverts
//! the function at the posterior mode to propose the intensity expected to
//! produce the level's target hit rate; `add_response` folds in the observed
//! hit/miss as a Bayesian update over the grid.

use std::collections::HashMap;

use crate::model::AccuracyLevel;

/// Weibull slope. Fixed rather than estimated: a single free parameter
/// (threshold) keeps the posterior well-identified with per-level trial
/// budgets in the tens, not hundreds.
const BETA: f64 = 3.5;
const GRID_POINTS: usize = 120;

/// Probability of a hit at intensity `x` given threshold parameter `t`.
fn weibull_p(x: f64, t: f64, guess_rate: f64) -> f64 {
    if t <= 0.0 {
        return 1.0;
    }
    let shape = (x / t).powf(BETA);
    guess_rate + (1.0 - guess_rate) * (1.0 - (-shape).exp())
}

/// Invert `weibull_p` at threshold `t` for a desired probability `target_p`.
fn weibull_inverse(t: f64, target_p: f64, guess_rate: f64) -> f64 {
    let p = target_p.clamp(guess_rate + 1e-6, 1.0 - 1e-6);
    let inner = 1.0 - (p - guess_rate) / (1.0 - guess_rate);
    t * (-inner.ln()).powf(1.0 / BETA)
}

/// One accuracy level's discrete-posterior threshold estimator.
pub struct Staircase {
    lo: f64,
    hi: f64,
    grid: Vec<f64>,
    log_posterior: Vec<f64>,
    target_p: f64,
    guess_rate: f64,
    trial_n: u32,
    last_intensity: Option<f64>,
}

impl Staircase {
    pub fn new(starting_intensity_s: f64, starting_sd_s: f64, target_p: f64, guess_rate: f64, lo: f64, hi: f64) -> Self {
        let hi = hi.max(lo + 1e-6);
        let grid: Vec<f64> = (0..GRID_POINTS)
            .map(|i| lo + (hi - lo) * (i as f64) / ((GRID_POINTS - 1) as f64))
            .map(|v| v.max(1e-6))
            .collect();

        let sd = starting_sd_s.max(1e-6);
        let log_prior: Vec<f64> = grid
            .iter()
            .map(|&t| {
                let z = (t - starting_intensity_s) / sd;
                -0.5 * z * z
            })
            .collect();

        Self {
            lo,
            hi,
            grid,
            log_posterior: normalize_log(log_prior),
            target_p,
            guess_rate,
            trial_n: 0,
            last_intensity: None,
        }
    }

    /// Posterior-weighted mean threshold estimate.
    fn posterior_mean(&self) -> f64 {
        self.grid
            .iter()
            .zip(self.log_posterior.iter())
            .map(|(&t, &lp)| t * lp.exp())
            .sum()
    }

    /// Posterior standard deviation of the threshold estimate.
    pub fn posterior_sd(&self) -> f64 {
        let mean = self.posterior_mean();
        let var: f64 = self
            .grid
            .iter()
            .zip(self.log_posterior.iter())
            .map(|(&t, &lp)| {
                let d = t - mean;
                d * d * lp.exp()
            })
            .sum();
        var.max(0.0).sqrt()
    }

    /// Propose the next target-display intensity, clipped into bounds.
    pub fn next_intensity(&mut self) -> f64 {
        let mean = self.posterior_mean().max(1e-6);
        let x = weibull_inverse(mean, self.target_p, self.guess_rate);
        let x = x.clamp(self.lo, self.hi);
        self.last_intensity = Some(x);
        x
    }

    /// Fold a hit/miss observation at the most recently proposed intensity
    /// into the posterior. Calling this without a prior `next_intensity` call
    /// is a logic error and is a no-op.
    pub fn add_response(&mut self, hit: bool) {
        let Some(x) = self.last_intensity else {
            return;
        };
        for (lp, &t) in self.log_posterior.iter_mut().zip(self.grid.iter()) {
            let p = weibull_p(x, t, self.guess_rate).clamp(1e-9, 1.0 - 1e-9);
            *lp += if hit { p.ln() } else { (1.0 - p).ln() };
        }
        self.log_posterior = normalize_log(std::mem::take(&mut self.log_posterior));
        self.trial_n += 1;
    }

    pub fn trial_n(&self) -> u32 {
        self.trial_n
    }

    /// Most recently proposed intensity, or `None` before the first call to
    /// `next_intensity`.
    pub fn last_intensity(&self) -> Option<f64> {
        self.last_intensity
    }
}

fn normalize_log(mut log_weights: Vec<f64>) -> Vec<f64> {
    let max = log_weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = log_weights.iter().map(|&w| (w - max).exp()).sum();
    let log_sum = max + sum.ln();
    for w in &mut log_weights {
        *w -= log_sum;
    }
    log_weights
}

/// One independent staircase per accuracy level. `next_intensity`/`add_response`
/// for a level never observe or mutate another level's state.
pub struct StaircasePool {
    staircases: HashMap<AccuracyLevel, Staircase>,
    /// Trial budget per level, sized at pool construction from the sequence's
    /// row counts. `None` means unbounded (no budget was supplied).
    budgets: HashMap<AccuracyLevel, u32>,
}

impl StaircasePool {
    pub fn new(levels: impl IntoIterator<Item = (AccuracyLevel, Staircase)>) -> Self {
        Self {
            staircases: levels.into_iter().collect(),
            budgets: HashMap::new(),
        }
    }

    /// Set the trial budget for `level`: the count of sequence rows
    /// targeting it. Exceeding this budget does not error; `next_intensity`
    /// logs a warning and reuses the last sampled intensity instead.
    pub fn set_budget(&mut self, level: AccuracyLevel, budget: u32) {
        self.budgets.insert(level, budget);
    }

    pub fn next_intensity(&mut self, level: AccuracyLevel) -> f64 {
        let staircase = self
            .staircases
            .get_mut(&level)
            .expect("staircase pool missing configured accuracy level");
        if let Some(&budget) = self.budgets.get(&level) {
            if staircase.trial_n() >= budget {
                if let Some(reused) = staircase.last_intensity() {
                    tracing::warn!(?level, budget, "staircase exhausted, reusing last intensity");
                    return reused;
                }
            }
        }
        staircase.next_intensity()
    }

    pub fn add_response(&mut self, level: AccuracyLevel, hit: bool) {
        if let Some(s) = self.staircases.get_mut(&level) {
            s.add_response(hit);
        }
    }

    pub fn posterior_sd(&self, level: AccuracyLevel) -> f64 {
        self.staircases
            .get(&level)
            .map(Staircase::posterior_sd)
            .unwrap_or(0.0)
    }

    pub fn trial_n(&self, level: AccuracyLevel) -> u32 {
        self.staircases.get(&level).map(Staircase::trial_n).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_intensity_stays_in_bounds() {
        let mut s = Staircase::new(0.135, 0.067, 0.8, 0.01, 0.0, 0.370);
        for _ in 0..20 {
            let x = s.next_intensity();
            assert!((0.0..=0.370).contains(&x));
            s.add_response(true);
        }
    }

    #[test]
    fn repeated_misses_drive_intensity_up() {
        let mut s = Staircase::new(0.135, 0.067, 0.8, 0.01, 0.0, 0.370);
        let first = s.next_intensity();
        s.add_response(false);
        for _ in 0..10 {
            let x = s.next_intensity();
            s.add_response(false);
            if x > first {
                return;
            }
        }
        panic!("intensity never increased after repeated misses");
    }

    #[test]
    fn posterior_sd_shrinks_as_evidence_accumulates() {
        let mut s = Staircase::new(0.135, 0.067, 0.5, 0.01, 0.0, 0.370);
        let sd0 = s.posterior_sd();
        for i in 0..30 {
            s.next_intensity();
            s.add_response(i % 2 == 0);
        }
        assert!(s.posterior_sd() < sd0);
    }

    #[test]
    fn exhausted_budget_reuses_last_intensity_instead_of_resampling() {
        let mut pool = StaircasePool::new(vec![(
            AccuracyLevel::High,
            Staircase::new(0.135, 0.067, 0.8, 0.01, 0.0, 0.370),
        )]);
        pool.set_budget(AccuracyLevel::High, 2);
        let first = pool.next_intensity(AccuracyLevel::High);
        pool.add_response(AccuracyLevel::High, true);
        let second = pool.next_intensity(AccuracyLevel::High);
        pool.add_response(AccuracyLevel::High, true);
        assert_eq!(pool.trial_n(AccuracyLevel::High), 2);
        let third = pool.next_intensity(AccuracyLevel::High);
        assert!((third - second).abs() < f64::EPSILON);
        let _ = first;
    }

    #[test]
    fn staircases_in_pool_are_independent() {
        let pool_levels = vec![
            (AccuracyLevel::High, Staircase::new(0.135, 0.067, 0.8, 0.01, 0.0, 0.370)),
            (AccuracyLevel::Low, Staircase::new(0.135, 0.067, 0.2, 0.01, 0.0, 0.370)),
        ];
        let mut pool = StaircasePool::new(pool_levels);
        let before = pool.next_intensity(AccuracyLevel::Low);
        pool.next_intensity(AccuracyLevel::High);
        pool.add_response(AccuracyLevel::High, true);
        assert_eq!(pool.trial_n(AccuracyLevel::Low), 0);
        let after = pool.next_intensity(AccuracyLevel::Low);
        assert!((before - after).abs() < f64::EPSILON);
    }
}
