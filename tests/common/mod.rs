//! Common test utilities and data generators.

use twostage_regression::core::{Column, Dataset};

/// Simple deterministic "random" generator for reproducible data.
pub struct Lcg {
    state: u64,
}

#[allow(dead_code)]
impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        ((self.state >> 33) as f64) / ((1u64 << 31) as f64)
    }

    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Uniform integer in `0..n`.
    pub fn below(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n - 1)
    }
}

/// `Y` uniform in [1, 5], `X` uniform in [-1, 1] and independent of `Y`,
/// two binary factors `A` and `B`.
#[allow(dead_code)]
pub fn uncorrelated_scenario(n: usize, seed: u64) -> Dataset {
    let mut rng = Lcg::new(seed);
    let (mut y, mut x, mut a, mut b) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for _ in 0..n {
        y.push(rng.uniform(1.0, 5.0));
        x.push(rng.uniform(-1.0, 1.0));
        a.push(rng.below(2) as f64);
        b.push(rng.below(2) as f64);
    }
    Dataset::new(vec![
        Column::from_f64("Y", y),
        Column::from_f64("X", x),
        Column::from_f64("A", a),
        Column::from_f64("B", b),
    ])
    .expect("scenario columns are consistent")
}

pub const OUTLIER_ROW: usize = 5;

/// Survey-like data with awkward column names:
///
/// - `life satisfaction`: outcome, `2 + 0.05·age + region + school effect + noise`,
///   with a large shock at [`OUTLIER_ROW`]
/// - `age`, `household income` (missing every 10th row)
/// - `region` (text), `school id` (8 groups), `treatment` (0/1), `wave` (text)
#[allow(dead_code)]
pub fn survey_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = Lcg::new(seed);
    let regions = ["north", "south", "east"];
    let waves = ["wave 1", "wave 2", "wave 3"];

    let mut outcome = Vec::with_capacity(n);
    let mut age = Vec::with_capacity(n);
    let mut income = Vec::with_capacity(n);
    let mut region = Vec::with_capacity(n);
    let mut school = Vec::with_capacity(n);
    let mut treatment = Vec::with_capacity(n);
    let mut wave = Vec::with_capacity(n);

    for i in 0..n {
        let a = rng.uniform(18.0, 80.0);
        let r = rng.below(3);
        let s = rng.below(8);
        let t = rng.below(2);
        let w = rng.below(3);
        let inc = rng.uniform(10.0, 90.0);
        let noise = rng.uniform(-1.0, 1.0);

        let mut y = 2.0 + 0.05 * a + 0.5 * r as f64 + 0.3 * s as f64 + 0.4 * t as f64 + noise;
        if i == OUTLIER_ROW {
            y += 25.0;
        }
        outcome.push(y);
        age.push(a);
        income.push(if i % 10 == 9 { None } else { Some(inc) });
        region.push(Some(regions[r].to_string()));
        school.push(s as f64);
        treatment.push(t as f64);
        wave.push(Some(waves[w].to_string()));
    }

    Dataset::new(vec![
        Column::from_f64("life satisfaction", outcome),
        Column::from_f64("age", age),
        Column::numeric("household income", income),
        Column::text("region", region),
        Column::from_f64("school id", school),
        Column::from_f64("treatment", treatment),
        Column::text("wave", wave),
    ])
    .expect("survey columns are consistent")
}
