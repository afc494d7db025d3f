// Adam optimizer over flat parameter slices

/// Adam with bias-corrected moment estimates
///
/// One moment slot per parameter buffer, sized lazily on the first step.
pub struct Adam {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
    t: usize,
}

impl Adam {
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    fn ensure_slot(slot: &mut Vec<f32>, len: usize) {
        if slot.len() != len {
            slot.clear();
            slot.resize(len, 0.0);
        }
    }

    /// Number of updates applied so far
    pub fn steps(&self) -> usize {
        self.t
    }

    /// Apply one update. `params[i]` and `grads[i]` must have equal lengths.
    pub fn step(&mut self, params: &mut [&mut [f32]], grads: &[&[f32]]) {
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        if self.m.len() < params.len() {
            self.m.resize(params.len(), Vec::new());
            self.v.resize(params.len(), Vec::new());
        }

        for (idx, (param, grad)) in params.iter_mut().zip(grads.iter()).enumerate() {
            Self::ensure_slot(&mut self.m[idx], grad.len());
            Self::ensure_slot(&mut self.v[idx], grad.len());

            let m = &mut self.m[idx];
            let v = &mut self.v[idx];
            for i in 0..grad.len() {
                let g = grad[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

                let m_hat = m[i] / bias_correction1;
                let v_hat = v[i] / bias_correction2;

                param[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
    }
}
