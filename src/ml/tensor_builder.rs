//! 正方形画像からモデル入力テンソルを生成
//!
//! 形状は `[1, S, S, 3]`。行優先で各画素の R, G, B を 0.0〜1.0 に正規化して並べます。

use image::{imageops::FilterType, RgbImage};

/// モデル入力テンソル `[1, side, side, 3]`
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    side: usize,
    data: Vec<f32>,
}

impl InputTensor {
    pub const CHANNELS: usize = 3;

    /// 平坦化済みデータから作成
    ///
    /// 長さが `side * side * 3` でない場合は `None`。
    pub fn from_vec(side: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != side * side * Self::CHANNELS {
            return None;
        }
        Some(Self { side, data })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.side, self.side, Self::CHANNELS]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// ネイティブバイトオーダーのf32列にシリアライズ
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }
}

/// パックされたARGB画素値から正規化済みのR, G, Bを取り出す
///
/// R = bit 16..23, G = bit 8..15, B = bit 0..7
pub fn unpack_argb(value: u32) -> [f32; 3] {
    [
        ((value >> 16) & 0xFF) as f32 / 255.0,
        ((value >> 8) & 0xFF) as f32 / 255.0,
        (value & 0xFF) as f32 / 255.0,
    ]
}

/// パック済みARGB画素列（行優先、`side * side` 個）からテンソルを生成
pub fn tensor_from_argb(pixels: &[u32], side: usize) -> Option<InputTensor> {
    if pixels.len() != side * side {
        return None;
    }
    let data = pixels.iter().flat_map(|&p| unpack_argb(p)).collect();
    InputTensor::from_vec(side, data)
}

/// 画像を `side x side` にリサイズしてテンソル化
///
/// リサイズには平滑化あり（バイリニア）のフィルタを使う。
/// 既に `side x side` の場合はリサイズしない。
pub fn build_input_tensor(bitmap: &RgbImage, side: usize) -> InputTensor {
    let target = side as u32;
    let resized;
    let img = if bitmap.dimensions() == (target, target) {
        bitmap
    } else {
        resized = image::imageops::resize(bitmap, target, target, FilterType::Triangle);
        &resized
    };

    let mut data = Vec::with_capacity(side * side * InputTensor::CHANNELS);
    for pixel in img.pixels() {
        data.extend(pixel.0.iter().map(|&c| c as f32 / 255.0));
    }

    InputTensor { side, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_tensor_length_and_range() {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 255]));
        let tensor = build_input_tensor(&img, 16);
        assert_eq!(tensor.len(), 16 * 16 * 3);
        assert_eq!(tensor.shape(), [1, 16, 16, 3]);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_solid_red() {
        let img = RgbImage::from_pixel(128, 128, Rgb([255, 0, 0]));
        let tensor = build_input_tensor(&img, 128);
        assert_eq!(tensor.len(), 128 * 128 * 3);
        for chunk in tensor.as_slice().chunks(3) {
            assert_eq!(chunk, &[1.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_row_major_rgb_order() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, Rgb([255, 0, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        let tensor = build_input_tensor(&img, 2);
        let data = tensor.as_slice();
        // (x=1, y=0) は2画素目
        assert_eq!(&data[3..6], &[1.0, 0.0, 0.0]);
        // (x=0, y=1) は3画素目
        assert_eq!(&data[6..9], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_resize_to_side() {
        let img = RgbImage::from_pixel(300, 200, Rgb([0, 255, 0]));
        let tensor = build_input_tensor(&img, 32);
        assert_eq!(tensor.side(), 32);
        assert_eq!(tensor.len(), 32 * 32 * 3);
        assert!(tensor.as_slice().chunks(3).all(|c| c == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_unpack_argb() {
        assert_eq!(unpack_argb(0xFFFF0000), [1.0, 0.0, 0.0]);
        assert_eq!(unpack_argb(0xFF0000FF), [0.0, 0.0, 1.0]);
        let [r, g, b] = unpack_argb(0x00336699);
        assert_eq!(r, 0x33 as f32 / 255.0);
        assert_eq!(g, 0x66 as f32 / 255.0);
        assert_eq!(b, 0x99 as f32 / 255.0);
    }

    #[test]
    fn test_argb_matches_rgb_path() {
        let img = RgbImage::from_fn(4, 4, |x, y| Rgb([x as u8 * 60, y as u8 * 60, 7]));
        let packed: Vec<u32> = img
            .pixels()
            .map(|p| 0xFF00_0000 | (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32)
            .collect();
        assert_eq!(tensor_from_argb(&packed, 4).unwrap(), build_input_tensor(&img, 4));
        assert!(tensor_from_argb(&packed, 3).is_none());
    }

    #[test]
    fn test_native_byte_order() {
        let tensor = InputTensor::from_vec(1, vec![1.0, 0.5, 0.0]).unwrap();
        let bytes = tensor.to_ne_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(f32::from_ne_bytes(bytes[4..8].try_into().unwrap()), 0.5);
    }
}
