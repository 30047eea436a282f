use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use std::collections::BTreeMap;
use std::ops::Range;

const AR_RANGE: Range<f64> = 0.1..0.6;
const LEVEL_RANGE: Range<f64> = 1000.0..2000.0;
const STD_DEV: f64 = 1.0;

/// Column-keyed numeric series
pub type SeriesFrame = BTreeMap<String, Vec<f64>>;

/// Parameters drawn for one generated column
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesParams {
    pub column: String,
    pub ar_coefficient: f64,
    pub level: f64,
}

/// Output of one `generate` call
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedData {
    pub train: SeriesFrame,
    pub test: SeriesFrame,
    pub params: Vec<SeriesParams>,
}

/// Synthetic integrated AR(1) series for cold starts and tests.
///
/// Values are reproducible only through the injected random source; seed it
/// with `SeriesGenerator::seeded` when the output must be stable.
pub struct SeriesGenerator<R: Rng = StdRng> {
    rng: R,
}

impl SeriesGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SeriesGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generate `x_size + y_size` points per column and split them into train/test frames
    pub fn generate(&mut self, cols: &[String], x_size: usize, y_size: usize) -> GeneratedData {
        let ar_coefficients: Vec<f64> = cols
            .iter()
            .map(|_| self.rng.random_range(AR_RANGE))
            .collect();
        let levels: Vec<f64> = cols
            .iter()
            .map(|_| self.rng.random_range(LEVEL_RANGE))
            .collect();

        let mut train = SeriesFrame::new();
        let mut test = SeriesFrame::new();
        let mut params = Vec::with_capacity(cols.len());

        for ((column, &ar_coefficient), &level) in cols.iter().zip(&ar_coefficients).zip(&levels) {
            let mut series = self.integrated_series(ar_coefficient, level, x_size + y_size);
            let tail = series.split_off(x_size);
            train.insert(column.clone(), series);
            test.insert(column.clone(), tail);
            params.push(SeriesParams {
                column: column.clone(),
                ar_coefficient,
                level,
            });
        }

        GeneratedData { train, test, params }
    }

    /// Cumulative sum of an AR(1) path started at zero, shifted by `level`
    fn integrated_series(&mut self, ar_coefficient: f64, level: f64, length: usize) -> Vec<f64> {
        let mut x = 0.0;
        let mut total = 0.0;
        (0..length)
            .map(|_| {
                let noise: f64 = StandardNormal.sample(&mut self.rng);
                x = ar_coefficient * x + noise;
                total += x * STD_DEV;
                total + level
            })
            .collect()
    }
}
