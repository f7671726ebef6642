// ============================================================
// Layer 5 — U-Net Model
// ============================================================
// Fully convolutional encoder/decoder with skip connections.
// Shown for depth = 4, base_filters = 32 (input H × W):
//
//   input [3, H, W]
//     enc0: conv3x3 ×2 ──────────────────────────────► skip0 [32,  H,    W   ]
//       │ maxpool 2×2                                       │
//     enc1: conv3x3 ×2 ─────────────────────────► skip1 [64,  H/2,  W/2 ] │
//       │ maxpool                                       │   │
//     enc2: conv3x3 ×2 ────────────────► skip2 [128, H/4,  W/4 ]    │   │
//       │ maxpool                                   │       │   │
//     enc3: conv3x3 ×2 ───────► skip3 [256, H/8,  W/8 ]     │       │   │
//       │ maxpool                           │       │       │   │
//     bottleneck: conv3x3 ×2   [512, H/16, W/16]    │       │       │   │
//       │ upconv 2×2 ─ cat ◄────────────────┘       │       │   │
//     dec3: conv3x3 ×2   [256]                      │       │   │
//       │ upconv ─ cat ◄────────────────────────────┘       │   │
//     dec2 … dec0 likewise, ending at [32, H, W]
//       │
//     head: conv1x1 → out_channels, sigmoid or ReLU
//
// Concatenation needs encoder and decoder maps of identical
// size, so H and W must both be divisible by 2^depth.

use anyhow::{ensure, Result};
use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation,
};
use serde::{Deserialize, Serialize};

use crate::ml::loss;

// ─── Activations ──────────────────────────────────────────────────────────────
/// Nonlinearity after every 3×3 convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Activation {
    Relu,
    /// Exponential linear unit, alpha = 1
    Elu,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Relu => activation::relu(x),
            Self::Elu  => elu(x),
        }
    }
}

/// elu(x) = x for x > 0, e^x - 1 otherwise
fn elu<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let positive = x.clone().clamp_min(0.0);
    let negative = x.clamp_max(0.0).exp().sub_scalar(1.0);
    positive + negative
}

/// Bounding nonlinearity of the 1×1 output head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputActivation {
    /// Per-pixel probability, for single-channel masks
    Sigmoid,
    /// Unbounded above, for multi-channel masks
    Relu,
}

impl OutputActivation {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Sigmoid => activation::sigmoid(x),
            Self::Relu    => activation::relu(x),
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────
/// Deepest supported encoder; 2^16 already exceeds any input size
pub const MAX_DEPTH: usize = 16;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Input height in pixels, divisible by 2^depth
    pub height: usize,
    /// Input width in pixels, divisible by 2^depth
    pub width: usize,
    /// 1 for a probability mask, 3 for an RGB-like mask
    pub out_channels: usize,
    #[config(default = 3)]
    pub in_channels: usize,
    /// Number of downsampling stages
    #[config(default = 4)]
    pub depth: usize,
    /// Channels of the first stage; doubled at every stage below it
    #[config(default = 32)]
    pub base_filters: usize,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    #[config(default = "OutputActivation::Relu")]
    pub output_activation: OutputActivation,
    /// Dropout after every stage except the last decoder stage
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl UNetConfig {
    /// Reject shapes the skip connections cannot line up
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_DEPTH).contains(&self.depth),
            "U-Net depth {} must be between 1 and {MAX_DEPTH}",
            self.depth
        );
        ensure!(self.base_filters >= 1, "base_filters must be at least 1");
        ensure!(
            self.base_filters.checked_mul(self.downsample_factor()).is_some(),
            "base_filters {} doubled {} times overflows the channel count",
            self.base_filters,
            self.depth
        );
        ensure!(self.in_channels >= 1 && self.out_channels >= 1, "channel counts must be positive");
        ensure!(
            (0.0..1.0).contains(&self.dropout),
            "dropout {} must be in [0, 1)",
            self.dropout
        );

        let factor = self.downsample_factor();
        ensure!(
            self.height > 0 && self.width > 0 && self.height % factor == 0 && self.width % factor == 0,
            "input {}x{} (HxW) is not divisible by 2^{} = {}; encoder and decoder \
             feature maps would not line up",
            self.height,
            self.width,
            self.depth,
            factor
        );
        Ok(())
    }

    /// Total spatial reduction at the bottleneck: 2^depth.
    /// Saturates for depths past the word size; `validate` rejects those.
    pub fn downsample_factor(&self) -> usize {
        u32::try_from(self.depth)
            .ok()
            .and_then(|d| 1usize.checked_shl(d))
            .unwrap_or(usize::MAX)
    }

    /// Channels produced by encoder/decoder stage `stage` (0 = full resolution)
    pub fn stage_channels(&self, stage: usize) -> usize {
        u32::try_from(stage)
            .ok()
            .and_then(|s| 1usize.checked_shl(s))
            .and_then(|f| self.base_filters.checked_mul(f))
            .unwrap_or(usize::MAX)
    }

    pub fn bottleneck_channels(&self) -> usize {
        self.stage_channels(self.depth)
    }

    /// Build the network, failing on an invalid shape
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<UNet<B>> {
        self.validate()?;

        let encoders = (0..self.depth)
            .map(|stage| {
                let in_ch = if stage == 0 { self.in_channels } else { self.stage_channels(stage - 1) };
                EncoderStage {
                    convs:   self.conv_pair(in_ch, self.stage_channels(stage), device),
                    dropout: DropoutConfig::new(self.dropout).init(),
                    pool:    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
                }
            })
            .collect();

        let bottleneck = self.conv_pair(
            self.stage_channels(self.depth - 1),
            self.bottleneck_channels(),
            device,
        );

        // Deepest first, matching the order they run in
        let decoders = (0..self.depth)
            .rev()
            .map(|stage| {
                let below = self.stage_channels(stage + 1);
                let ch    = self.stage_channels(stage);
                let dropout = if stage == 0 { 0.0 } else { self.dropout };
                DecoderStage {
                    up: ConvTranspose2dConfig::new([below, ch], [2, 2])
                        .with_stride([2, 2])
                        .init(device),
                    // upsampled channels + skip channels
                    convs:   self.conv_pair(ch * 2, ch, device),
                    dropout: DropoutConfig::new(dropout).init(),
                }
            })
            .collect();

        let head = Conv2dConfig::new([self.stage_channels(0), self.out_channels], [1, 1]).init(device);

        Ok(UNet {
            encoders,
            bottleneck,
            bottleneck_dropout: DropoutConfig::new(self.dropout).init(),
            decoders,
            head,
            output_activation: Ignored(self.output_activation),
        })
    }

    fn conv_pair<B: Backend>(&self, in_ch: usize, out_ch: usize, device: &B::Device) -> ConvPair<B> {
        let conv = |cin: usize| {
            Conv2dConfig::new([cin, out_ch], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };
        ConvPair {
            conv1:      conv(in_ch),
            conv2:      conv(out_ch),
            activation: Ignored(self.activation),
        }
    }
}

// ─── Building blocks ──────────────────────────────────────────────────────────
/// Two same-padded 3×3 convolutions, each followed by the activation
#[derive(Module, Debug)]
pub struct ConvPair<B: Backend> {
    pub conv1:  Conv2d<B>,
    pub conv2:  Conv2d<B>,
    activation: Ignored<Activation>,
}

impl<B: Backend> ConvPair<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.activation.apply(self.conv1.forward(x));
        self.activation.apply(self.conv2.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct EncoderStage<B: Backend> {
    pub convs: ConvPair<B>,
    dropout:   Dropout,
    pool:      MaxPool2d,
}

impl<B: Backend> EncoderStage<B> {
    /// Returns (skip, downsampled). The skip is taken before dropout.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let features = self.convs.forward(x);
        let down     = self.pool.forward(self.dropout.forward(features.clone()));
        (features, down)
    }
}

#[derive(Module, Debug)]
pub struct DecoderStage<B: Backend> {
    pub up:    ConvTranspose2d<B>,
    pub convs: ConvPair<B>,
    dropout:   Dropout,
}

impl<B: Backend> DecoderStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let up = self.up.forward(x);
        let x  = Tensor::cat(vec![up, skip], 1);
        self.dropout.forward(self.convs.forward(x))
    }
}

// ─── UNet ─────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    pub encoders:       Vec<EncoderStage<B>>,
    pub bottleneck:     ConvPair<B>,
    bottleneck_dropout: Dropout,
    /// Deepest stage first
    pub decoders:       Vec<DecoderStage<B>>,
    pub head:           Conv2d<B>,
    output_activation:  Ignored<OutputActivation>,
}

/// Loss and predictions for one batch
pub struct SegmentationOutput<B: Backend> {
    /// Negated Dice coefficient, shape [1]
    pub loss:        Tensor<B, 1>,
    /// [batch, out_channels, height, width]
    pub predictions: Tensor<B, 4>,
}

impl<B: Backend> UNet<B> {
    /// images: [batch, in_channels, H, W] → masks: [batch, out_channels, H, W]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.encoders.len());
        let mut x     = images;

        for stage in &self.encoders {
            let (skip, down) = stage.forward(x);
            skips.push(skip);
            x = down;
        }

        x = self.bottleneck_dropout.forward(self.bottleneck.forward(x));

        for (stage, skip) in self.decoders.iter().zip(skips.into_iter().rev()) {
            x = stage.forward(x, skip);
        }

        self.output_activation.apply(self.head.forward(x))
    }

    /// Channels-last convenience: [batch, H, W, in_channels] → [batch, H, W, out_channels]
    pub fn forward_channels_last(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images.permute([0, 3, 1, 2])).permute([0, 2, 3, 1])
    }

    pub fn forward_loss(&self, images: Tensor<B, 4>, masks: Tensor<B, 4>) -> SegmentationOutput<B> {
        let predictions = self.forward(images);
        let loss        = loss::dice_loss(predictions.clone(), masks);
        SegmentationOutput { loss, predictions }
    }
}
