//! 葉の病害分類モデルの定義
//!
//! 学習済みの重みを読み込んで推論するためのCNN構造です。
//! 入力はモデル境界の形状 `[batch, S, S, 3]`（NHWC）のまま受け取り、内部でNCHWに並べ替えます。

#[cfg(feature = "ml")]
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// モデル設定
#[cfg(feature = "ml")]
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    #[config(default = 8)]
    pub num_classes: usize,
    /// 基本フィルタ数（ブロックごとに2倍）
    #[config(default = 16)]
    pub base_filters: usize,
}

#[cfg(feature = "ml")]
impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> LeafClassifier<B> {
        let base = self.base_filters;

        LeafClassifier {
            // 3 -> base -> base*2 -> base*4、各ブロックで解像度1/2
            block1: ConvBlock::new(3, base, device),
            block2: ConvBlock::new(base, base * 2, device),
            block3: ConvBlock::new(base * 2, base * 4, device),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(base * 4, self.num_classes).init(device),
            num_classes: self.num_classes,
        }
    }
}

/// 3x3 Conv (same padding) + ReLU + 2x2 MaxPool
#[cfg(feature = "ml")]
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    activation: Relu,
}

#[cfg(feature = "ml")]
impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            activation: Relu::new(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.activation.forward(x);
        self.pool.forward(x)
    }
}

/// 葉の病害分類CNN
///
/// # アーキテクチャ
/// - {Conv 3x3 + ReLU + MaxPool 2x2} x 3ブロック
/// - Global Average Pooling
/// - FC: base*4 -> num_classes
/// - Softmax
#[cfg(feature = "ml")]
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    global_pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    num_classes: usize,
}

#[cfg(feature = "ml")]
impl<B: Backend> LeafClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, size, size, 3]（NHWC）
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        // NHWC -> NCHW
        let x = images.permute([0, 3, 1, 2]);

        let x = self.block1.forward(x);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);

        // [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        self.fc.forward(x)
    }

    /// 順伝播 + Softmax（推論用）
    pub fn forward_softmax(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(images), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
