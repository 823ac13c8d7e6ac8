// 该文件是 Tanbing （探病） 项目的一部分。
// src/input.rs - 图像输入与解码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbImage};
use ndarray::Array4;
use thiserror::Error;

/// 以 NCHW 排列的 RGB 帧
pub trait AsNchwFrame<const W: u32, const H: u32> {
  fn as_nchw(&self) -> &[u8];

  /// 转为 `[1, C, H, W]` 的浮点张量，取值范围 `[0, 1]`
  fn to_tensor(&self) -> Array4<f32> {
    let data = self.as_nchw();
    let (h, w) = (H as usize, W as usize);
    let channels = data.len() / (h * w).max(1);
    Array4::from_shape_fn((1, channels, h, w), |(_, c, y, x)| {
      f32::from(data[c * h * w + y * w + x]) / 255.0
    })
  }
}

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 请求中的图像缺失或不完整
#[derive(Error, Debug)]
pub enum InputError {
  #[error("请求中没有上传图像")]
  MissingImage,
  #[error("上传的图像内容为空")]
  Empty,
  #[error("上传表单格式错误: {0}")]
  MalformedUpload(String),
  #[error("上传的图像超过大小限制 {0} 字节")]
  TooLarge(usize),
}

/// 图像字节无法解码
#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("无法识别图像格式")]
  UnknownFormat,
  #[error("不支持的图像格式: {0:?}")]
  UnsupportedFormat(ImageFormat),
  #[error("图像解码错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 可接受的图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptFormats {
  /// 任何 `image` 能解码的格式
  Any,
  /// 仅 JPEG 与 PNG
  JpegPng,
}

impl AcceptFormats {
  fn allows(&self, format: ImageFormat) -> bool {
    match self {
      AcceptFormats::Any => true,
      AcceptFormats::JpegPng => matches!(format, ImageFormat::Jpeg | ImageFormat::Png),
    }
  }
}

/// 从内存中的字节解码为 RGB 图像，格式由内容推断
pub fn decode_image(bytes: &[u8], accept: AcceptFormats) -> Result<RgbImage, DecodeError> {
  let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
  let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
  if !accept.allows(format) {
    return Err(DecodeError::UnsupportedFormat(format));
  }
  Ok(reader.decode()?.to_rgb8())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
  }

  #[test]
  fn decodes_png_bytes() {
    let image = RgbImage::from_pixel(5, 3, Rgb([1, 2, 3]));
    let decoded = decode_image(&encode(&image, ImageFormat::Png), AcceptFormats::JpegPng).unwrap();
    assert_eq!(decoded.dimensions(), (5, 3));
    assert_eq!(decoded.get_pixel(0, 0), &Rgb([1, 2, 3]));
  }

  #[test]
  fn rejects_garbage() {
    let err = decode_image(b"definitely not an image", AcceptFormats::Any).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownFormat));
  }

  #[test]
  fn restricts_formats_when_asked() {
    let image = RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]));
    let bmp = encode(&image, ImageFormat::Bmp);
    assert!(decode_image(&bmp, AcceptFormats::Any).is_ok());
    let err = decode_image(&bmp, AcceptFormats::JpegPng).unwrap_err();
    assert!(matches!(err, DecodeError::UnsupportedFormat(ImageFormat::Bmp)));
  }
}
