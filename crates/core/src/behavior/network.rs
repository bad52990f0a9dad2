//! A tiny fully-connected network: one ReLU hidden layer, one sigmoid output.
//!
//! Small enough to train from scratch every retrain tick on a few thousand
//! samples. Weights use Glorot-uniform initialization with zero biases, and
//! training is mini-batch Adam on binary cross-entropy.

use rand::Rng;
use rand::seq::SliceRandom;

use super::sample::{INTENT_FEATURES, PRICING_FEATURES};

/// Hidden units in the conversion-intent network.
pub const INTENT_HIDDEN: usize = 8;

/// Hidden units in the willingness-to-pay network.
pub const PRICING_HIDDEN: usize = 4;

const DEFAULT_LEARNING_RATE: f64 = 0.001;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;
const LOSS_EPSILON: f64 = 1e-7;

/// Errors raised by [`DenseNetwork`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("expected {expected} features, got {found}")]
    FeatureWidth { expected: usize, found: usize },
    #[error("{samples} samples but {labels} labels")]
    LabelCount { samples: usize, labels: usize },
}

/// Training knobs for [`DenseNetwork::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub epochs: usize,
    /// Clamped to at least 1.
    pub batch_size: usize,
    pub shuffle: bool,
    pub learning_rate: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 8,
            shuffle: true,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

/// Outcome of a [`DenseNetwork::fit`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub epochs: usize,
    pub samples: usize,
    /// Mean binary cross-entropy over the last epoch.
    pub final_loss: f64,
}

/// `inputs → hidden (ReLU) → 1 (sigmoid)`.
///
/// Parameters live in one flat vector laid out as
/// `[w1 (hidden × inputs, row-major), b1 (hidden), w2 (hidden), b2]`
/// so the optimizer can walk them in a single pass.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    inputs: usize,
    hidden: usize,
    params: Vec<f64>,
    adam: AdamState,
}

#[derive(Debug, Clone)]
struct AdamState {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

struct Layers<'a> {
    w1: &'a [f64],
    b1: &'a [f64],
    w2: &'a [f64],
    b2: f64,
}

struct LayersMut<'a> {
    w1: &'a mut [f64],
    b1: &'a mut [f64],
    w2: &'a mut [f64],
    b2: &'a mut [f64],
}

impl DenseNetwork {
    /// Build a freshly initialized network.
    pub fn new<R: Rng + ?Sized>(inputs: usize, hidden: usize, rng: &mut R) -> Self {
        let len = param_count(inputs, hidden);
        let mut params = vec![0.0; len];

        let hidden_limit = glorot_limit(inputs, hidden);
        let output_limit = glorot_limit(hidden, 1);
        {
            let layers = split_mut(&mut params, inputs, hidden);
            for w in layers.w1.iter_mut() {
                *w = uniform(rng, hidden_limit);
            }
            for w in layers.w2.iter_mut() {
                *w = uniform(rng, output_limit);
            }
        }

        Self {
            inputs,
            hidden,
            params,
            adam: AdamState {
                m: vec![0.0; len],
                v: vec![0.0; len],
                t: 0,
            },
        }
    }

    /// The 4 → 8 → 1 conversion-intent network.
    pub fn intent<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(INTENT_FEATURES, INTENT_HIDDEN, rng)
    }

    /// The 3 → 4 → 1 willingness-to-pay network.
    pub fn pricing<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new(PRICING_FEATURES, PRICING_HIDDEN, rng)
    }

    #[must_use]
    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    #[must_use]
    pub const fn hidden(&self) -> usize {
        self.hidden
    }

    /// Score one feature vector. The result is always in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::FeatureWidth`] if `features` has the wrong length.
    pub fn predict(&self, features: &[f64]) -> Result<f64, NetworkError> {
        self.check_width(features)?;
        let layers = split(&self.params, self.inputs, self.hidden);
        let (output, _) = forward(&layers, self.inputs, features);
        Ok(output)
    }

    /// Train on `xs`/`ys` with mini-batch Adam.
    ///
    /// Labels are expected in `[0, 1]`. Optimizer state carries over between
    /// calls on the same network.
    ///
    /// # Errors
    ///
    /// Fails without touching the weights if the set is empty, a row has the
    /// wrong width, or the label count differs from the row count.
    pub fn fit<X, R>(
        &mut self,
        xs: &[X],
        ys: &[f64],
        options: FitOptions,
        rng: &mut R,
    ) -> Result<FitReport, NetworkError>
    where
        X: AsRef<[f64]>,
        R: Rng + ?Sized,
    {
        if xs.is_empty() {
            return Err(NetworkError::EmptyTrainingSet);
        }
        if xs.len() != ys.len() {
            return Err(NetworkError::LabelCount {
                samples: xs.len(),
                labels: ys.len(),
            });
        }
        for row in xs {
            self.check_width(row.as_ref())?;
        }

        let batch_size = options.batch_size.max(1);
        let mut order: Vec<usize> = (0..xs.len()).collect();
        let mut grads = vec![0.0; self.params.len()];
        let mut final_loss = 0.0;

        for _ in 0..options.epochs {
            if options.shuffle {
                order.shuffle(rng);
            }
            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                grads.iter_mut().for_each(|g| *g = 0.0);
                for &i in batch {
                    let (Some(x), Some(&y)) = (xs.get(i), ys.get(i)) else {
                        continue;
                    };
                    epoch_loss += self.accumulate(x.as_ref(), y, &mut grads);
                }
                #[allow(clippy::cast_precision_loss)]
                let scale = 1.0 / batch.len() as f64;
                grads.iter_mut().for_each(|g| *g *= scale);
                self.adam_step(&grads, options.learning_rate);
            }
            #[allow(clippy::cast_precision_loss)]
            {
                final_loss = epoch_loss / xs.len() as f64;
            }
        }

        Ok(FitReport {
            epochs: options.epochs,
            samples: xs.len(),
            final_loss,
        })
    }

    fn check_width(&self, features: &[f64]) -> Result<(), NetworkError> {
        if features.len() == self.inputs {
            Ok(())
        } else {
            Err(NetworkError::FeatureWidth {
                expected: self.inputs,
                found: features.len(),
            })
        }
    }

    /// Add one sample's gradient into `grads` and return its loss.
    fn accumulate(&self, x: &[f64], y: f64, grads: &mut [f64]) -> f64 {
        let layers = split(&self.params, self.inputs, self.hidden);
        let (p, pre) = forward(&layers, self.inputs, x);
        let loss = binary_cross_entropy(p, y);

        // d(BCE)/dz for a sigmoid output
        let dz = p - y;
        let g = split_mut(grads, self.inputs, self.hidden);
        g.b2.iter_mut().for_each(|b| *b += dz);

        let rows = g.w1.chunks_mut(self.inputs);
        for (((row, gb1), gw2), (&w2, &z)) in rows
            .zip(g.b1.iter_mut())
            .zip(g.w2.iter_mut())
            .zip(layers.w2.iter().zip(&pre))
        {
            let h = z.max(0.0);
            *gw2 += dz * h;
            if z <= 0.0 {
                continue;
            }
            let dh = dz * w2;
            *gb1 += dh;
            for (gw, &xk) in row.iter_mut().zip(x) {
                *gw += dh * xk;
            }
        }

        loss
    }

    fn adam_step(&mut self, grads: &[f64], learning_rate: f64) {
        let state = &mut self.adam;
        state.t = state.t.saturating_add(1);
        let bias1 = 1.0 - ADAM_BETA1.powi(state.t);
        let bias2 = 1.0 - ADAM_BETA2.powi(state.t);

        for (((param, &g), m), v) in self
            .params
            .iter_mut()
            .zip(grads)
            .zip(state.m.iter_mut())
            .zip(state.v.iter_mut())
        {
            *m = ADAM_BETA1.mul_add(*m, (1.0 - ADAM_BETA1) * g);
            *v = ADAM_BETA2.mul_add(*v, (1.0 - ADAM_BETA2) * g * g);
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *param -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        }
    }
}

const fn param_count(inputs: usize, hidden: usize) -> usize {
    hidden * inputs + hidden + hidden + 1
}

fn split(params: &[f64], inputs: usize, hidden: usize) -> Layers<'_> {
    let (w1, rest) = params.split_at(hidden * inputs);
    let (b1, rest) = rest.split_at(hidden);
    let (w2, rest) = rest.split_at(hidden);
    Layers {
        w1,
        b1,
        w2,
        b2: rest.first().copied().unwrap_or(0.0),
    }
}

fn split_mut(params: &mut [f64], inputs: usize, hidden: usize) -> LayersMut<'_> {
    let (w1, rest) = params.split_at_mut(hidden * inputs);
    let (b1, rest) = rest.split_at_mut(hidden);
    let (w2, b2) = rest.split_at_mut(hidden);
    LayersMut { w1, b1, w2, b2 }
}

/// Returns the sigmoid output and the hidden pre-activations.
fn forward(layers: &Layers<'_>, inputs: usize, x: &[f64]) -> (f64, Vec<f64>) {
    let pre: Vec<f64> = layers
        .w1
        .chunks(inputs)
        .zip(layers.b1)
        .map(|(row, &b)| row.iter().zip(x).map(|(w, xk)| w * xk).sum::<f64>() + b)
        .collect();
    let z = pre
        .iter()
        .zip(layers.w2)
        .map(|(&h, &w)| h.max(0.0) * w)
        .sum::<f64>()
        + layers.b2;
    (sigmoid(z), pre)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn binary_cross_entropy(p: f64, y: f64) -> f64 {
    let p = p.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

#[allow(clippy::cast_precision_loss)]
fn glorot_limit(fan_in: usize, fan_out: usize) -> f64 {
    let fans = (fan_in + fan_out).max(1) as f64;
    (6.0 / fans).sqrt()
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, limit: f64) -> f64 {
    if limit > 0.0 {
        rng.random_range(-limit..limit)
    } else {
        0.0
    }
}
