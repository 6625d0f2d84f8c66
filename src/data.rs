//! # Price Data
//!
//! $$
//! \hat\mu_i = 252\cdot\bar r_i,\qquad \hat\Sigma = (1-\delta)S + \delta\,\mathrm{diag}(S)
//! $$
//!
//! Price history container, overlapping period windows and the per-period
//! return/covariance estimators consumed by the QUBO builder.

use anyhow::bail;
use anyhow::Result;
use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::s;
use tracing::debug;

use crate::config::OptimizerConfig;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Shrinkage intensity toward the diagonal used by [`PricePeriod::covariance`].
const SHRINKAGE_INTENSITY: f64 = 0.1;

/// Historical close prices, one row per date and one column per asset.
#[derive(Clone, Debug)]
pub struct PriceHistory {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  prices: Array2<f64>,
}

impl PriceHistory {
  /// Construct a history, checking that the price matrix matches the
  /// date/ticker axes.
  pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    if prices.nrows() != dates.len() {
      bail!(
        "price matrix has {} rows but {} dates",
        prices.nrows(),
        dates.len()
      );
    }
    if prices.ncols() != tickers.len() {
      bail!(
        "price matrix has {} columns but {} tickers",
        prices.ncols(),
        tickers.len()
      );
    }

    Ok(Self {
      dates,
      tickers,
      prices,
    })
  }

  /// Number of trading days covered.
  pub fn num_days(&self) -> usize {
    self.dates.len()
  }

  /// Number of assets.
  pub fn num_assets(&self) -> usize {
    self.tickers.len()
  }

  /// Asset labels in column order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Full price matrix (dates x assets).
  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }
}

/// One contiguous slice of a price history used to estimate a single
/// period's expected returns and covariance. Read-only after construction.
#[derive(Clone, Debug)]
pub struct PricePeriod {
  index: usize,
  prices: Array2<f64>,
}

impl PricePeriod {
  /// Zero-based period index within the optimization run.
  pub fn index(&self) -> usize {
    self.index
  }

  /// Number of assets covered by this window.
  pub fn num_assets(&self) -> usize {
    self.prices.ncols()
  }

  /// Number of trading days in this window.
  pub fn num_days(&self) -> usize {
    self.prices.nrows()
  }

  /// Daily simple returns for this window, one row per day transition.
  fn daily_returns(&self) -> Array2<f64> {
    let days = self.prices.nrows();
    let assets = self.prices.ncols();
    if days < 2 {
      return Array2::zeros((0, assets));
    }

    let mut returns = Array2::zeros((days - 1, assets));
    for t in 1..days {
      for a in 0..assets {
        let prev = self.prices[[t - 1, a]];
        let curr = self.prices[[t, a]];
        returns[[t - 1, a]] = if prev > 0.0 { curr / prev - 1.0 } else { 0.0 };
      }
    }
    returns
  }

  /// Annualized mean historical return per asset.
  pub fn expected_returns(&self) -> Array1<f64> {
    let returns = self.daily_returns();
    let assets = self.prices.ncols();
    let mut mu = Array1::zeros(assets);
    if returns.nrows() == 0 {
      return mu;
    }

    for a in 0..assets {
      let col = returns.column(a);
      let mean = col.sum() / col.len() as f64;
      mu[a] = mean * TRADING_DAYS_PER_YEAR;
    }
    mu
  }

  /// Annualized covariance matrix with diagonal shrinkage.
  ///
  /// Sample covariance of daily returns, scaled by 252 and shrunk toward its
  /// own diagonal with a fixed intensity. The shrinkage keeps near-singular
  /// windows usable; exact Ledoit-Wolf intensity estimation is out of scope.
  pub fn covariance(&self) -> Array2<f64> {
    let returns = self.daily_returns();
    let assets = self.prices.ncols();
    let days = returns.nrows();
    let mut cov = Array2::zeros((assets, assets));
    if days < 2 {
      return cov;
    }

    let means: Vec<f64> = (0..assets)
      .map(|a| returns.column(a).sum() / days as f64)
      .collect();

    for i in 0..assets {
      for j in i..assets {
        let mut acc = 0.0;
        for t in 0..days {
          acc += (returns[[t, i]] - means[i]) * (returns[[t, j]] - means[j]);
        }
        let c = acc / (days - 1) as f64 * TRADING_DAYS_PER_YEAR;
        cov[[i, j]] = c;
        cov[[j, i]] = c;
      }
    }

    let mut shrunk = &cov * (1.0 - SHRINKAGE_INTENSITY);
    for i in 0..assets {
      shrunk[[i, i]] += SHRINKAGE_INTENSITY * cov[[i, i]];
    }
    shrunk
  }
}

/// Split a price history into overlapping period windows.
///
/// Each window spans `2 * rebalance_frequency_days`, stepped by
/// `rebalance_frequency_days`. Windows shorter than one rebalance interval
/// are dropped.
pub fn partition_periods(history: &PriceHistory, config: &OptimizerConfig) -> Vec<PricePeriod> {
  let total_days = history.num_days();
  let step = config.rebalance_frequency_days;
  let mut periods = Vec::new();

  for t in 0..config.num_time_steps {
    let start = t * step;
    let end = (start + 2 * step).min(total_days);
    if end <= start || end - start < step {
      break;
    }

    periods.push(PricePeriod {
      index: periods.len(),
      prices: history.prices().slice(s![start..end, ..]).to_owned(),
    });
  }

  debug!(
    periods = periods.len(),
    requested = config.num_time_steps,
    "partitioned price history"
  );

  periods
}

/// Deterministic drifting price history for tests.
#[cfg(test)]
pub(crate) fn sample_history(days: usize, assets: usize) -> PriceHistory {
  let dates: Vec<NaiveDate> = (0..days)
    .map(|d| NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(d as i64))
    .collect();
  let tickers: Vec<String> = (0..assets).map(|a| format!("ASSET_{a}")).collect();

  let mut prices = Array2::zeros((days, assets));
  for a in 0..assets {
    let drift = 0.001 * (a as f64 + 1.0);
    let mut level = 100.0 + 10.0 * a as f64;
    for d in 0..days {
      let wiggle = 0.01 * ((d as f64 * 0.7 + a as f64).sin());
      level *= 1.0 + drift + wiggle;
      prices[[d, a]] = level;
    }
  }

  PriceHistory::new(dates, tickers, prices).unwrap()
}
