// FeedForwardNetwork - embedding → flatten → dense(relu) → dense(softmax)
//
// Built-in ClassifierBackend. Parameters live in plain row-major buffers:
//
//   embedding      [vocabulary, E]      no bias
//   dense_hidden   [L·E, H] + [H]
//   dense_output   [H, 5]   + [5]
//
// Training minimizes categorical cross-entropy with Adam. Each epoch visits
// every demonstration once, in an order drawn from an RNG seeded with the
// model seed, split into batches of `batch_size`. A fixed seed gives a fixed
// result.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{
    ClassifierBackend, ClassifierState, ForwardPass, LayerActivation, LayerParameters, ModelSpec,
    Tensor, EMBEDDING_LAYER, FLATTEN_LAYER, HIDDEN_LAYER, OUTPUT_LAYER,
};
use crate::demonstration::ACTION_COUNT;
use crate::encoding::FeatureVector;
use crate::error::ModelError;
use crate::model::optimizer::Adam;

/// Embedding initializer range (uniform ±)
const EMBEDDING_INIT_RANGE: f32 = 0.05;

/// Initial hidden bias; keeps every ReLU unit active on the first steps
const HIDDEN_BIAS_INIT: f32 = 0.1;

/// Probability floor inside the log of the cross-entropy
const LOG_EPSILON: f32 = 1e-7;

/// Fully connected layer, kernel stored `[fan_in, fan_out]`
struct DenseLayer {
    kernel: Tensor,
    bias: Tensor,
}

impl DenseLayer {
    /// Glorot-uniform kernel, zero bias
    fn glorot(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(rng, fan_in, fan_out, limit, 0.0)
    }

    /// He-uniform kernel and a small positive bias, for ReLU layers
    fn he(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Self {
        let limit = (6.0 / fan_in.max(1) as f32).sqrt();
        Self::uniform(rng, fan_in, fan_out, limit, HIDDEN_BIAS_INIT)
    }

    fn uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize, limit: f32, bias: f32) -> Self {
        let data = (0..fan_in * fan_out)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            kernel: Tensor::from_vec(&[fan_in, fan_out], data)
                .unwrap_or_else(|| Tensor::zeros(&[fan_in, fan_out])),
            bias: Tensor::from_vec(&[fan_out], vec![bias; fan_out])
                .unwrap_or_else(|| Tensor::zeros(&[fan_out])),
        }
    }

    fn fan_out(&self) -> usize {
        self.kernel.shape()[1]
    }

    fn apply(&self, input: &[f32]) -> Vec<f32> {
        let fan_out = self.fan_out();
        let weights = self.kernel.data();
        let mut out = self.bias.data().to_vec();
        for (i, &x) in input.iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            let row = &weights[i * fan_out..(i + 1) * fan_out];
            for (o, w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        out
    }

    fn parameters(&self, layer: &str) -> LayerParameters {
        LayerParameters {
            layer: layer.to_string(),
            weights: self.kernel.clone(),
            bias: Some(self.bias.clone()),
        }
    }
}

/// Intermediate values of one forward pass, kept for backprop
struct PassTrace {
    flat: Vec<f32>,
    hidden_pre: Vec<f32>,
    hidden: Vec<f32>,
    probabilities: Vec<f32>,
}

struct LiveNetwork {
    spec: ModelSpec,
    embedding: Tensor,
    hidden: DenseLayer,
    output: DenseLayer,
    optimizer: Adam,
    /// Continues the init stream; draws the per-epoch visiting order
    order_rng: StdRng,
}

impl LiveNetwork {
    fn new(spec: &ModelSpec) -> Self {
        let arch = spec.architecture;
        let mut rng = StdRng::seed_from_u64(spec.seed);

        let embedding_data = (0..arch.vocabulary * arch.embedding_dim)
            .map(|_| rng.gen_range(-EMBEDDING_INIT_RANGE..EMBEDDING_INIT_RANGE))
            .collect();
        let embedding = Tensor::from_vec(&[arch.vocabulary, arch.embedding_dim], embedding_data)
            .unwrap_or_else(|| Tensor::zeros(&[arch.vocabulary, arch.embedding_dim]));
        let hidden = DenseLayer::he(&mut rng, arch.flatten_len(), arch.hidden_units);
        let output = DenseLayer::glorot(&mut rng, arch.hidden_units, arch.outputs);

        Self {
            spec: *spec,
            embedding,
            hidden,
            output,
            optimizer: Adam::new(spec.learning_rate),
            order_rng: rng,
        }
    }

    /// Validate an encoded vector and turn it into embedding row ids.
    fn tokenize(&self, input: &[f32]) -> Result<Vec<usize>, ModelError> {
        let arch = &self.spec.architecture;
        if input.len() != arch.input_len() {
            return Err(ModelError::FeatureShapeMismatch {
                expected: arch.input_len(),
                actual: input.len(),
            });
        }
        input
            .iter()
            .enumerate()
            .map(|(position, &value)| {
                let valid = value.is_finite()
                    && value >= 0.0
                    && value.fract() == 0.0
                    && (value as usize) < arch.vocabulary;
                if valid {
                    Ok(value as usize)
                } else {
                    Err(ModelError::FeatureOutOfVocabulary {
                        position,
                        value,
                        vocabulary: arch.vocabulary,
                    })
                }
            })
            .collect()
    }

    fn run(&self, tokens: &[usize]) -> PassTrace {
        let dim = self.spec.architecture.embedding_dim;
        let table = self.embedding.data();

        let mut flat = Vec::with_capacity(tokens.len() * dim);
        for &token in tokens {
            flat.extend_from_slice(&table[token * dim..(token + 1) * dim]);
        }

        let hidden_pre = self.hidden.apply(&flat);
        let hidden: Vec<f32> = hidden_pre.iter().map(|&z| z.max(0.0)).collect();
        let logits = self.output.apply(&hidden);

        PassTrace {
            flat,
            hidden_pre,
            hidden,
            probabilities: softmax(&logits),
        }
    }

    /// Accumulate gradients over the samples named by `batch` and apply a
    /// single Adam step.
    ///
    /// Returns the summed (not averaged) loss of the batch.
    fn train_batch(
        &mut self,
        samples: &[Vec<usize>],
        targets: &[[f32; ACTION_COUNT]],
        batch: &[usize],
        epoch: usize,
    ) -> Result<f32, ModelError> {
        let arch = self.spec.architecture;
        let dim = arch.embedding_dim;
        let flat_len = arch.flatten_len();
        let hidden_units = arch.hidden_units;
        let outputs = arch.outputs;
        let n = batch.len() as f32;

        let mut grad_embedding = vec![0.0; self.embedding.len()];
        let mut grad_hidden_kernel = vec![0.0; flat_len * hidden_units];
        let mut grad_hidden_bias = vec![0.0; hidden_units];
        let mut grad_output_kernel = vec![0.0; hidden_units * outputs];
        let mut grad_output_bias = vec![0.0; outputs];
        let mut loss_sum = 0.0;

        {
            let w_hidden = self.hidden.kernel.data();
            let w_output = self.output.kernel.data();

            for &sample in batch {
                let tokens = &samples[sample];
                let target = &targets[sample];
                let trace = self.run(tokens);
                loss_sum += cross_entropy(&trace.probabilities, target);

                // softmax + cross-entropy: dL/dlogits = (p - y) / n
                let d_logits: Vec<f32> = trace
                    .probabilities
                    .iter()
                    .zip(target)
                    .map(|(p, y)| (p - y) / n)
                    .collect();

                for (g, d) in grad_output_bias.iter_mut().zip(&d_logits) {
                    *g += d;
                }
                for (j, &a) in trace.hidden.iter().enumerate() {
                    if a == 0.0 {
                        continue;
                    }
                    for (k, d) in d_logits.iter().enumerate() {
                        grad_output_kernel[j * outputs + k] += a * d;
                    }
                }

                let d_hidden: Vec<f32> = (0..hidden_units)
                    .map(|j| {
                        if trace.hidden_pre[j] > 0.0 {
                            d_logits
                                .iter()
                                .enumerate()
                                .map(|(k, d)| w_output[j * outputs + k] * d)
                                .sum::<f32>()
                        } else {
                            0.0
                        }
                    })
                    .collect();

                for (g, d) in grad_hidden_bias.iter_mut().zip(&d_hidden) {
                    *g += d;
                }
                for (i, &x) in trace.flat.iter().enumerate() {
                    if x == 0.0 {
                        continue;
                    }
                    for (j, d) in d_hidden.iter().enumerate() {
                        grad_hidden_kernel[i * hidden_units + j] += x * d;
                    }
                }

                // flatten is a reshape, so d_flat scatters back onto embedding rows
                for (position, &token) in tokens.iter().enumerate() {
                    for e in 0..dim {
                        let i = position * dim + e;
                        let d_flat: f32 = d_hidden
                            .iter()
                            .enumerate()
                            .map(|(j, d)| w_hidden[i * hidden_units + j] * d)
                            .sum();
                        grad_embedding[token * dim + e] += d_flat;
                    }
                }
            }
        }

        if !loss_sum.is_finite() {
            return Err(ModelError::NumericDivergence {
                epoch,
                loss: loss_sum / n,
            });
        }

        self.optimizer.step(
            &mut [
                self.embedding.data_mut(),
                self.hidden.kernel.data_mut(),
                self.hidden.bias.data_mut(),
                self.output.kernel.data_mut(),
                self.output.bias.data_mut(),
            ],
            &[
                &grad_embedding[..],
                &grad_hidden_kernel[..],
                &grad_hidden_bias[..],
                &grad_output_kernel[..],
                &grad_output_bias[..],
            ],
        );

        Ok(loss_sum)
    }

    fn parameters(&self) -> Vec<LayerParameters> {
        vec![
            LayerParameters {
                layer: EMBEDDING_LAYER.to_string(),
                weights: self.embedding.clone(),
                bias: None,
            },
            self.hidden.parameters(HIDDEN_LAYER),
            self.output.parameters(OUTPUT_LAYER),
        ]
    }
}

/// Numerically stable softmax (max-subtracted)
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_val = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max_val).exp()).collect();
    let sum_exp: f32 = exps.iter().sum();
    let inv_sum = 1.0 / sum_exp.max(1e-12);
    exps.iter().map(|e| e * inv_sum).collect()
}

fn cross_entropy(probabilities: &[f32], target: &[f32; ACTION_COUNT]) -> f32 {
    probabilities
        .iter()
        .zip(target)
        .map(|(p, y)| -y * p.clamp(LOG_EPSILON, 1.0).ln())
        .sum()
}

/// Pure-Rust implementation of the classifier architecture
pub struct FeedForwardNetwork {
    state: ClassifierState,
    live: Option<LiveNetwork>,
    epochs_completed: usize,
}

impl FeedForwardNetwork {
    pub fn new() -> Self {
        Self {
            state: ClassifierState::Uninitialized,
            live: None,
            epochs_completed: 0,
        }
    }

    /// Epochs fitted since the last `initialize`
    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    fn live(&self) -> Result<&LiveNetwork, ModelError> {
        self.live.as_ref().ok_or(ModelError::ModelNotInitialized)
    }
}

impl Default for FeedForwardNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBackend for FeedForwardNetwork {
    fn initialize(&mut self, spec: &ModelSpec) -> Result<(), ModelError> {
        if self.live.is_some() {
            self.dispose();
        }
        self.live = Some(LiveNetwork::new(spec));
        self.state = ClassifierState::Initialized(spec.architecture.mode);
        self.epochs_completed = 0;
        log::debug!(
            "[FeedForwardNetwork] Initialized {:?} (seed {})",
            spec.architecture,
            spec.seed
        );
        Ok(())
    }

    fn fit(
        &mut self,
        inputs: &[FeatureVector],
        targets: &[[f32; ACTION_COUNT]],
    ) -> Result<f32, ModelError> {
        let epoch = self.epochs_completed + 1;
        let live = self.live.as_mut().ok_or(ModelError::ModelNotInitialized)?;
        if inputs.is_empty() {
            return Err(ModelError::InsufficientData);
        }
        if inputs.len() != targets.len() {
            return Err(ModelError::FeatureShapeMismatch {
                expected: inputs.len(),
                actual: targets.len(),
            });
        }

        let tokens = inputs
            .iter()
            .map(|input| live.tokenize(input))
            .collect::<Result<Vec<_>, _>>()?;

        let mut order: Vec<usize> = (0..tokens.len()).collect();
        order.shuffle(&mut live.order_rng);

        let batch_size = live.spec.batch_size.max(1);
        let mut loss_sum = 0.0;
        for batch in order.chunks(batch_size) {
            loss_sum += live.train_batch(&tokens, targets, batch, epoch)?;
        }

        self.epochs_completed = epoch;
        self.state = ClassifierState::Trained(live.spec.architecture.mode);
        Ok(loss_sum / inputs.len() as f32)
    }

    fn forward(&self, input: &[f32]) -> Result<ForwardPass, ModelError> {
        let live = self.live()?;
        let arch = live.spec.architecture;
        let tokens = live.tokenize(input)?;
        let trace = live.run(&tokens);

        let activations = vec![
            LayerActivation {
                layer: EMBEDDING_LAYER.to_string(),
                shape: vec![arch.input_len(), arch.embedding_dim],
                values: trace.flat.clone(),
            },
            LayerActivation {
                layer: FLATTEN_LAYER.to_string(),
                shape: vec![arch.flatten_len()],
                values: trace.flat,
            },
            LayerActivation {
                layer: HIDDEN_LAYER.to_string(),
                shape: vec![arch.hidden_units],
                values: trace.hidden,
            },
            LayerActivation {
                layer: OUTPUT_LAYER.to_string(),
                shape: vec![arch.outputs],
                values: trace.probabilities.clone(),
            },
        ];

        Ok(ForwardPass {
            probabilities: trace.probabilities,
            activations,
        })
    }

    fn snapshot_parameters(&self) -> Result<Vec<LayerParameters>, ModelError> {
        Ok(self.live()?.parameters())
    }

    fn dispose(&mut self) {
        if let Some(live) = self.live.take() {
            log::debug!(
                "[FeedForwardNetwork] Disposed {:?} after {} epochs",
                live.spec.architecture.mode,
                self.epochs_completed
            );
        }
        self.state = ClassifierState::Disposed;
    }

    fn state(&self) -> ClassifierState {
        self.state
    }
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
