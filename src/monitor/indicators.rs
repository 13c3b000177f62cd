use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// Rolling mean over `closes`; the first `period - 1` points have no value.
pub fn sma_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut sma = match SimpleMovingAverage::new(period) {
        Ok(sma) => sma,
        Err(_) => return vec![None; closes.len()],
    };

    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let value = sma.next(close);
            (i + 1 >= period).then_some(value)
        })
        .collect()
}
