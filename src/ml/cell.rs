// ============================================================
// Layer 5: Layer-Normalised LSTM Cell
// ============================================================
// A single LSTM step with layer normalisation applied to each
// gate pre-activation and to the new cell state:
//
//   [i, j, f, o] = W · [x, h_prev] + b
//   c = c_prev · σ(LN(f) + forget_bias) + σ(LN(i)) · tanh(LN(j))
//   h = tanh(LN(c)) · σ(LN(o))
//
// Dropout is applied to the step input only, and is inactive
// once the module is moved off the autodiff backend.
//
// Reference: Ba et al. (2016) Layer Normalization
//            Hochreiter & Schmidhuber (1997) LSTM

use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

const FORGET_BIAS: f64 = 1.0;

#[derive(Config, Debug)]
pub struct LayerNormLstmConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
    /// Probability of zeroing an input unit (1 - keep probability).
    #[config(default = 0.0)]
    pub dropout:  f64,
}

impl LayerNormLstmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LayerNormLstmCell<B> {
        let norm = || LayerNormConfig::new(self.d_hidden).init::<B>(device);
        LayerNormLstmCell {
            gates:          LinearConfig::new(self.d_input + self.d_hidden, 4 * self.d_hidden).init(device),
            norm_input:     norm(),
            norm_candidate: norm(),
            norm_forget:    norm(),
            norm_output:    norm(),
            norm_cell:      norm(),
            dropout:        DropoutConfig::new(self.dropout).init(),
            d_hidden:       self.d_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct LayerNormLstmCell<B: Backend> {
    pub gates:          Linear<B>,
    pub norm_input:     LayerNorm<B>,
    pub norm_candidate: LayerNorm<B>,
    pub norm_forget:    LayerNorm<B>,
    pub norm_output:    LayerNorm<B>,
    pub norm_cell:      LayerNorm<B>,
    pub dropout:        Dropout,
    pub d_hidden:       usize,
}

/// Cell and hidden state, both `[batch, d_hidden]`.
#[derive(Debug, Clone)]
pub struct LstmState<B: Backend> {
    pub cell:   Tensor<B, 2>,
    pub hidden: Tensor<B, 2>,
}

impl<B: Backend> LstmState<B> {
    pub fn zeros(batch: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            cell:   Tensor::zeros([batch, d_hidden], device),
            hidden: Tensor::zeros([batch, d_hidden], device),
        }
    }

    /// Take `next` where `mask` (`[batch, 1]`, 0 or 1) is set, keep `self` elsewhere.
    pub fn blend(self, next: Self, mask: Tensor<B, 2>) -> Self {
        let [batch, d_hidden] = self.hidden.dims();
        let mask = mask.expand([batch, d_hidden]);
        Self {
            cell:   self.cell.clone() + (next.cell - self.cell) * mask.clone(),
            hidden: self.hidden.clone() + (next.hidden - self.hidden) * mask,
        }
    }
}

impl<B: Backend> LayerNormLstmCell<B> {
    /// One time step. `input` is `[batch, d_input]`.
    pub fn step(&self, input: Tensor<B, 2>, state: LstmState<B>) -> LstmState<B> {
        let [batch, _] = input.dims();
        let h = self.d_hidden;

        let input = self.dropout.forward(input);
        let gates = self.gates.forward(Tensor::cat(vec![input, state.hidden], 1));

        let i = self.norm_input.forward(gates.clone().slice([0..batch, 0..h]));
        let j = self.norm_candidate.forward(gates.clone().slice([0..batch, h..2 * h]));
        let f = self.norm_forget.forward(gates.clone().slice([0..batch, 2 * h..3 * h]));
        let o = self.norm_output.forward(gates.slice([0..batch, 3 * h..4 * h]));

        let cell = state.cell * sigmoid(f.add_scalar(FORGET_BIAS)) + sigmoid(i) * j.tanh();
        let hidden = self.norm_cell.forward(cell.clone()).tanh() * sigmoid(o);

        LstmState { cell, hidden }
    }

    pub fn d_hidden(&self) -> usize {
        self.d_hidden
    }
}
