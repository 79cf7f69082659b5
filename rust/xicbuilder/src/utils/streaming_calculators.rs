// Streaming aggregators that see each value exactly once, used while a
// trace is still being built and the full point list is not final yet.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamingAggregatorError {
    NotEnoughData,
}

type Result<T> = std::result::Result<T, StreamingAggregatorError>;

/// Incremental arithmetic mean of a stream of values.
///
/// Updated as `mean = (mean * n + value) / (n + 1)`, so two runs over the
/// same stream produce bit-identical means.
///
/// # Example
///
/// ```
/// use xicbuilder::utils::streaming_calculators::RunningMean;
///
/// let mut calc = RunningMean::default();
/// assert!(calc.mean().is_err());
/// calc.add(10.0);
/// calc.add(0.0);
/// calc.add(10.0);
/// calc.add(0.0);
/// assert_eq!(calc.mean().unwrap(), 5.0);
/// assert_eq!(calc.count(), 4);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    count: u64,
    mean: f64,
}

impl RunningMean {
    pub fn add(&mut self, value: f64) {
        let n = self.count as f64;
        self.mean = (self.mean * n + value) / (n + 1.0);
        self.count += 1;
    }

    pub fn mean(&self) -> Result<f64> {
        if self.count == 0 {
            return Err(StreamingAggregatorError::NotEnoughData);
        }
        Ok(self.mean)
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // https://www.kaggle.com/datasets/carlmcbrideellis/data-anscombes-quartet?resource=download
    // Both have real mean of 7.5
    const ASCOMBES_3: [f64; 11] = [
        7.46, 6.77, 12.74, 7.11, 7.81, 8.84, 6.08, 5.39, 8.15, 6.42, 5.73,
    ];
    const ASCOMBES_4: [f64; 11] = [
        6.58, 5.76, 7.71, 8.84, 8.47, 7.04, 5.25, 12.5, 5.56, 7.91, 6.89,
    ];

    #[test]
    fn test_running_mean_ascombes() {
        for data in [ASCOMBES_3, ASCOMBES_4] {
            let mut calc = RunningMean::default();
            for val in data.iter() {
                calc.add(*val);
            }
            let mean = calc.mean().unwrap();
            assert!(mean < 7.51, "{calc:#?}");
            assert!(mean > 7.49, "{calc:#?}");
        }
    }

    #[test]
    fn test_running_mean_single_value() {
        let mut calc = RunningMean::default();
        calc.add(500.001);
        assert_eq!(calc.mean().unwrap(), 500.001);
    }
}
