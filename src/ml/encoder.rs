// ============================================================
// Layer 5: Bidirectional LSTM Encoder
// ============================================================
// Stacked bidirectional layers. Each layer runs a forward and a
// backward layer-normalised LSTM over the sequence, and the
// concatenated outputs [B, T, 2H] become the next layer's input.
//
// Length masking:
//   - on a padded step the state is carried over unchanged
//   - outputs at padded steps are zero
//
// Because padded steps never touch the state, the backward cell
// effectively starts at each sentence's own last token, and the
// forward cell's final state is the one at that last token.
//
// Summary vector (input to the latent heads):
//   [h_fw(last layer, final) ; h_bw(last layer, final)]  → [B, 2H]

use burn::prelude::*;

use crate::ml::cell::{LayerNormLstmCell, LayerNormLstmConfig, LstmState};

#[derive(Config, Debug)]
pub struct BiLstmEncoderConfig {
    pub d_input:    usize,
    pub d_hidden:   usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = 0.0)]
    pub dropout:    f64,
}

impl BiLstmEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiLstmEncoder<B> {
        let layers = (0..self.num_layers.max(1))
            .map(|index| {
                let d_input = if index == 0 { self.d_input } else { 2 * self.d_hidden };
                let cell = || {
                    LayerNormLstmConfig::new(d_input, self.d_hidden)
                        .with_dropout(self.dropout)
                        .init::<B>(device)
                };
                BiLstmLayer { fw: cell(), bw: cell() }
            })
            .collect();
        BiLstmEncoder { layers, d_hidden: self.d_hidden }
    }
}

#[derive(Module, Debug)]
pub struct BiLstmLayer<B: Backend> {
    pub fw: LayerNormLstmCell<B>,
    pub bw: LayerNormLstmCell<B>,
}

/// Outputs of one bidirectional pass.
pub struct LayerOutput<B: Backend> {
    /// `[batch, steps, 2H]`, zero past each length
    pub sequence: Tensor<B, 3>,
    /// `[batch, H]`
    pub final_fw: Tensor<B, 2>,
    /// `[batch, H]`
    pub final_bw: Tensor<B, 2>,
}

impl<B: Backend> BiLstmLayer<B> {
    /// `inputs` is `[batch, steps, d]`, `mask` is `[batch, steps]` of 0/1.
    pub fn forward(&self, inputs: Tensor<B, 3>, mask: Tensor<B, 2>) -> LayerOutput<B> {
        let [batch, steps, d] = inputs.dims();
        let h = self.fw.d_hidden();
        let device = inputs.device();

        let step_input = |t: usize| inputs.clone().slice([0..batch, t..t + 1, 0..d]).reshape([batch, d]);
        let step_mask = |t: usize| mask.clone().slice([0..batch, t..t + 1]);

        // ── Forward direction ────────────────────────────────────────────────
        let mut state = LstmState::zeros(batch, h, &device);
        let mut fw_out = Vec::with_capacity(steps);
        for t in 0..steps {
            let m = step_mask(t);
            let next = self.fw.step(step_input(t), state.clone());
            state = state.blend(next, m.clone());
            fw_out.push(state.hidden.clone() * m.expand([batch, h]));
        }
        let final_fw = state.hidden;

        // ── Backward direction ───────────────────────────────────────────────
        let mut state = LstmState::zeros(batch, h, &device);
        let mut bw_out = Vec::with_capacity(steps);
        for t in (0..steps).rev() {
            let m = step_mask(t);
            let next = self.bw.step(step_input(t), state.clone());
            state = state.blend(next, m.clone());
            bw_out.push(state.hidden.clone() * m.expand([batch, h]));
        }
        bw_out.reverse();
        let final_bw = state.hidden;

        let sequence = Tensor::cat(
            vec![Tensor::stack::<3>(fw_out, 1), Tensor::stack::<3>(bw_out, 1)],
            2,
        );

        LayerOutput { sequence, final_fw, final_bw }
    }
}

#[derive(Module, Debug)]
pub struct BiLstmEncoder<B: Backend> {
    pub layers:   Vec<BiLstmLayer<B>>,
    pub d_hidden: usize,
}

impl<B: Backend> BiLstmEncoder<B> {
    /// Summary `[batch, 2H]` of embedded `inputs` `[batch, steps, d]`.
    pub fn forward(&self, inputs: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = inputs;
        let mut summary = None;
        for layer in &self.layers {
            let out = layer.forward(x, mask.clone());
            summary = Some(Tensor::cat(vec![out.final_fw, out.final_bw], 1));
            x = out.sequence;
        }
        let [batch, _, _] = x.dims();
        summary.unwrap_or_else(|| Tensor::zeros([batch, 2 * self.d_hidden], &x.device()))
    }
}
