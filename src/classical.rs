//! # Classical Benchmark
//!
//! $$
//! \min_{\mathbf w \in \Delta^{n-1}} \ \mathbf w^\top\Sigma\,\mathbf w
//!   + \lambda\,(\mathbf w^\top\mu - r^\*)^2
//! $$
//!
//! Markowitz mean-variance baseline run alongside the quantum loop so every
//! optimization result ships with a classical reference point.

use anyhow::Result;
use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

const TARGET_RETURN: f64 = 0.1;
const RISK_FREE_RATE: f64 = 0.02;
const RETURN_PENALTY: f64 = 10.0;

/// Classical reference allocation and its risk/return summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassicalBenchmark {
  /// Long-only weights on the simplex.
  pub weights: Vec<f64>,
  /// Annualized expected portfolio return.
  pub expected_return: f64,
  /// Annualized portfolio volatility.
  pub volatility: f64,
  /// Sharpe ratio against the fixed risk-free rate.
  pub sharpe: f64,
}

impl ClassicalBenchmark {
  /// Deterministic stand-in used when the quantum loop is bypassed.
  pub fn mock() -> Self {
    Self {
      weights: Vec::new(),
      expected_return: 0.07,
      volatility: 0.15,
      sharpe: 0.47,
    }
  }
}

/// Softmax reparameterization keeps the search unconstrained while the
/// resulting weights stay on the simplex.
fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

struct MarkowitzCost {
  mu: Array1<f64>,
  cov: Array2<f64>,
}

impl CostFunction for MarkowitzCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let w = Array1::from_vec(softmax(x));
    let port_var = w.dot(&self.cov.dot(&w));
    let port_ret = w.dot(&self.mu);
    let ret_penalty = (port_ret - TARGET_RETURN).powi(2);

    Ok(port_var + RETURN_PENALTY * ret_penalty)
  }
}

/// Long-only Markowitz solve over annualized returns and covariance.
///
/// Solver failures degrade to the equal-weight portfolio with a warning
/// rather than failing the whole optimization run, the benchmark is
/// informative output, not a required input.
pub fn markowitz_benchmark(mu: &Array1<f64>, cov: &Array2<f64>) -> ClassicalBenchmark {
  let n = mu.len();
  if n == 0 {
    return ClassicalBenchmark {
      weights: Vec::new(),
      expected_return: 0.0,
      volatility: 0.0,
      sharpe: 0.0,
    };
  }

  let cost = MarkowitzCost {
    mu: mu.clone(),
    cov: cov.clone(),
  };

  let x0 = vec![0.0; n];
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] = 1.0;
    simplex.push(point);
  }

  let w = match solve(cost, simplex) {
    Ok(best_x) => softmax(&best_x),
    Err(err) => {
      warn!(error = %err, "Markowitz solve failed, falling back to equal weights");
      vec![1.0 / n as f64; n]
    }
  };

  summarize(Array1::from_vec(w), mu, cov)
}

fn solve(cost: MarkowitzCost, simplex: Vec<Vec<f64>>) -> Result<Vec<f64>> {
  let n = simplex[0].len();
  let solver = NelderMead::new(simplex).with_sd_tolerance(1e-8)?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(5000))
    .run()?;

  Ok(res.state.best_param.unwrap_or_else(|| vec![0.0; n]))
}

fn summarize(w: Array1<f64>, mu: &Array1<f64>, cov: &Array2<f64>) -> ClassicalBenchmark {
  let expected_return = w.dot(mu);
  let port_var = w.dot(&cov.dot(&w));
  let volatility = port_var.max(0.0).sqrt();
  let sharpe = if volatility > 1e-15 {
    (expected_return - RISK_FREE_RATE) / volatility
  } else {
    0.0
  };

  ClassicalBenchmark {
    weights: w.to_vec(),
    expected_return,
    volatility,
    sharpe,
  }
}
