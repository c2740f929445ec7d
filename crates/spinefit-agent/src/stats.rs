use serde::Serialize;

/// Summary of a series of per-episode measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
    pub std_dev: f32,
}

impl DescriptiveStats {
    /// Computes statistics over `values`, ignoring non-finite entries.
    ///
    /// Returns `None` when nothing finite remains.
    ///
    /// ```
    /// use spinefit_agent::DescriptiveStats;
    ///
    /// let stats = DescriptiveStats::new([5.0, 2.0, f32::NAN, 4.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(stats.count, 5);
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.median, 3.0);
    /// assert_eq!(stats.mean, 3.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut values = values
            .into_iter()
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        values.sort_by(f32::total_cmp);

        let min = *values.first()?;
        let max = *values.last()?;
        let count = values.len();
        #[expect(clippy::cast_precision_loss)]
        let n = count as f32;
        let mean = values.iter().sum::<f32>() / n;
        let median = values[count / 2];
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        Some(Self {
            count,
            min,
            max,
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }
}
