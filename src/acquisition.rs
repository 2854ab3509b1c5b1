//! 画像取得と正方形化
//!
//! カメラ撮影・ギャラリー選択で得た画像データをデコードし、
//! 設定された [`SquarePolicy`] で正方形にそろえます。
//! どちらの取得元にも同じポリシーを適用します。

use image::{imageops, RgbImage};

use crate::error::{DrLeafError, Result};
use crate::model::SquarePolicy;
use crate::types::ImageSource;

/// 取得済みの画像
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub source: ImageSource,
    pub bitmap: RgbImage,
}

/// 画像バイト列をRGB画像にデコード
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes)?.to_rgb8();
    if img.width() == 0 || img.height() == 0 {
        return Err(DrLeafError::Acquisition(format!(
            "画像サイズが不正です: {}x{}",
            img.width(),
            img.height()
        )));
    }
    Ok(img)
}

/// 短辺を一辺とする中央の正方形を切り出す
pub fn center_square(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let side = width.min(height);
    if width == height {
        return img.clone();
    }
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    imageops::crop_imm(img, x, y, side, side).to_image()
}

/// ポリシーに従って正方形化
pub fn to_square(img: RgbImage, policy: SquarePolicy) -> RgbImage {
    match policy {
        SquarePolicy::CenterCrop => center_square(&img),
        SquarePolicy::Stretch => img,
    }
}

/// 取得結果を分類可能な画像に変換
///
/// `None` はユーザーによるキャンセルを表し、`Ok(None)` を返す。
pub fn acquire(
    source: ImageSource,
    bytes: Option<&[u8]>,
    policy: SquarePolicy,
) -> Result<Option<AcquiredImage>> {
    let Some(bytes) = bytes else {
        tracing::debug!(%source, "画像取得がキャンセルされました");
        return Ok(None);
    };

    let decoded = decode_image(bytes)?;
    tracing::debug!(%source, width = decoded.width(), height = decoded.height(), "画像をデコードしました");

    Ok(Some(AcquiredImage {
        source,
        bitmap: to_square(decoded, policy),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_center_square_landscape() {
        // 左右の帯を赤、中央を緑にした 6x4 画像
        let img = RgbImage::from_fn(6, 4, |x, _| {
            if x == 0 || x == 5 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 255, 0])
            }
        });
        let square = center_square(&img);
        assert_eq!(square.dimensions(), (4, 4));
        assert!(square.pixels().all(|p| *p == Rgb([0, 255, 0])));
    }

    #[test]
    fn test_center_square_portrait() {
        let img = RgbImage::from_fn(3, 7, |_, y| Rgb([y as u8, 0, 0]));
        let square = center_square(&img);
        assert_eq!(square.dimensions(), (3, 3));
        assert_eq!(square.get_pixel(0, 0)[0], 2);
        assert_eq!(square.get_pixel(0, 2)[0], 4);
    }

    #[test]
    fn test_stretch_keeps_aspect() {
        let img = RgbImage::new(10, 5);
        assert_eq!(to_square(img, SquarePolicy::Stretch).dimensions(), (10, 5));
    }

    #[test]
    fn test_cancelled_acquisition() {
        let acquired = acquire(ImageSource::Camera, None, SquarePolicy::CenterCrop).unwrap();
        assert!(acquired.is_none());
    }

    #[test]
    fn test_camera_and_gallery_share_policy() {
        let bytes = encode_png(&RgbImage::from_pixel(20, 10, Rgb([1, 2, 3])));
        let camera = acquire(ImageSource::Camera, Some(&bytes), SquarePolicy::CenterCrop)
            .unwrap()
            .unwrap();
        let gallery = acquire(ImageSource::Gallery, Some(&bytes), SquarePolicy::CenterCrop)
            .unwrap()
            .unwrap();
        assert_eq!(camera.bitmap.dimensions(), (10, 10));
        assert_eq!(camera.bitmap, gallery.bitmap);
        assert_eq!(gallery.source, ImageSource::Gallery);
    }

    #[test]
    fn test_decode_failure() {
        let err =
            acquire(ImageSource::Gallery, Some(b"garbage"), SquarePolicy::CenterCrop).unwrap_err();
        assert!(matches!(err, DrLeafError::Acquisition(_)));
    }
}
