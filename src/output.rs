// 该文件是 Tanbing （探病） 项目的一部分。
// src/output.rs - 输出定义
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

use image::{ImageFormat, RgbImage};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 将 RGB 图像编码为 PNG 字节
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  let mut buf = Vec::new();
  image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
  Ok(buf)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn png_keeps_channel_order() {
    let mut image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
    image.put_pixel(1, 2, Rgb([250, 20, 5]));
    let png = encode_png(&image).unwrap();
    assert_eq!(&png[1..4], b"PNG");

    let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
    assert_eq!(decoded.get_pixel(1, 2), &Rgb([250, 20, 5]));
  }
}
