use super::Platform;

/// Descriptive statistics over the prices a run managed to extract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStats {
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Compute median, mean, min and max over the given prices.
/// Returns `None` for an empty slice. Even-count samples take the
/// average of the two middle values as the median.
pub fn price_stats(prices: &[f64]) -> Option<PriceStats> {
    if prices.is_empty() {
        return None;
    }

    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

    Some(PriceStats {
        median,
        mean,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    })
}

/// Deterministic confidence score in [0, 10]: each platform that yielded
/// a usable price contributes 8/N points on top of a 2.0 base, where N is
/// the number of supported platforms. Clipped at 10.
pub fn confidence_score(valid_count: usize) -> f64 {
    let platforms = Platform::ALL.len() as f64;
    (valid_count as f64 / platforms * 8.0 + 2.0).min(10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_the_three_platform_sample() {
        let stats = price_stats(&[1299.99, 1199.99, 1349.99]).unwrap();

        assert_eq!(stats.median, 1299.99);
        assert!((stats.mean - 1283.3233333333333).abs() < 1e-9);
        assert_eq!(stats.min, 1199.99);
        assert_eq!(stats.max, 1349.99);
    }

    #[test]
    fn even_count_median_averages_the_middle_pair() {
        let stats = price_stats(&[10.0, 30.0, 20.0, 40.0]).unwrap();

        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
    }

    #[test]
    fn single_price_is_its_own_summary() {
        let stats = price_stats(&[599.0]).unwrap();

        assert_eq!(stats.median, 599.0);
        assert_eq!(stats.mean, 599.0);
        assert_eq!(stats.min, 599.0);
        assert_eq!(stats.max, 599.0);
    }

    #[test]
    fn empty_prices_have_no_stats() {
        assert!(price_stats(&[]).is_none());
    }

    #[test]
    fn confidence_scales_with_platform_count() {
        assert!((confidence_score(1) - (8.0 / 3.0 + 2.0)).abs() < 1e-9);
        assert!((confidence_score(2) - (16.0 / 3.0 + 2.0)).abs() < 1e-9);
        assert_eq!(confidence_score(3), 10.0);
    }

    #[test]
    fn confidence_is_clipped_at_ten() {
        assert_eq!(confidence_score(4), 10.0);
        assert_eq!(confidence_score(100), 10.0);
    }
}
