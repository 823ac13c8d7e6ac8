// 该文件是 Tanbing （探病） 项目的一部分。
// src/frame.rs - 模型输入帧与 letterbox 变换
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

use image::{Rgb, RgbImage, imageops::FilterType};
use thiserror::Error;

use crate::input::AsNchwFrame;

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: u8 = 114;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("图像尺寸为零: {0}x{1}")]
  EmptyImage(u32, u32),
}

#[derive(Debug, Clone)]
pub struct RgbNchwFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNchwFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> AsNchwFrame<W, H> for RgbNchwFrame<W, H> {
  fn as_nchw(&self) -> &[u8] {
    &self.data
  }
}

/// 原图到模型输入之间的缩放与填充参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub source_width: u32,
  pub source_height: u32,
}

impl Letterbox {
  pub fn fit(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> Self {
    let scale = (target_width as f32 / source_width as f32)
      .min(target_height as f32 / source_height as f32);
    let resized_w = (source_width as f32 * scale).round();
    let resized_h = (source_height as f32 * scale).round();
    let pad_x = ((target_width as f32 - resized_w) / 2.0 - 0.1).round().max(0.0);
    let pad_y = ((target_height as f32 - resized_h) / 2.0 - 0.1).round().max(0.0);

    Self {
      scale,
      pad_x,
      pad_y,
      source_width,
      source_height,
    }
  }

  pub fn resized_size(&self) -> (u32, u32) {
    (
      ((self.source_width as f32 * self.scale).round() as u32).max(1),
      ((self.source_height as f32 * self.scale).round() as u32).max(1),
    )
  }

  /// 将模型输入像素坐标 `[x_min, y_min, x_max, y_max]` 映射回原图，并归一化
  pub fn restore(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.source_width as f32, self.source_height as f32);
    let x_min = ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_min = ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h);
    let x_max = ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_max = ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h);
    [x_min / w, y_min / h, x_max / w, y_max / h]
  }
}

/// 经过 letterbox 的模型输入帧
#[derive(Debug, Clone)]
pub struct LetterboxFrame<const W: u32, const H: u32> {
  pub frame: RgbNchwFrame<W, H>,
  pub letterbox: Letterbox,
}

impl<const W: u32, const H: u32> AsNchwFrame<W, H> for LetterboxFrame<W, H> {
  fn as_nchw(&self) -> &[u8] {
    self.frame.as_nchw()
  }
}

impl<const W: u32, const H: u32> LetterboxFrame<W, H> {
  pub fn from_rgb_image(image: &RgbImage) -> Result<Self, FrameError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
      return Err(FrameError::EmptyImage(src_w, src_h));
    }

    let letterbox = Letterbox::fit(src_w, src_h, W, H);
    let (resized_w, resized_h) = letterbox.resized_size();
    let resized = image::imageops::resize(image, resized_w, resized_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(W, H, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(
      &mut canvas,
      &resized,
      letterbox.pad_x as i64,
      letterbox.pad_y as i64,
    );

    let plane = (W * H) as usize;
    let mut data = vec![0u8; RGB_CHANNELS * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
      let idx = (y * W + x) as usize;
      data[idx] = pixel[0];
      data[plane + idx] = pixel[1];
      data[2 * plane + idx] = pixel[2];
    }

    Ok(Self {
      frame: RgbNchwFrame::try_from(data)?,
      letterbox,
    })
  }
}
