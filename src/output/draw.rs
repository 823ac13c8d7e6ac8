// 该文件是 Tanbing （探病） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/Library/Fonts/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(PathBuf),
}

pub struct Draw {
  font_size: f32,
  label_text_padding: i32,
  font: Option<FontVec>,
  label_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self::with_font(None)
  }
}

impl Draw {
  pub fn with_font(font: Option<FontVec>) -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_padding: LABEL_TEXT_PADDING,
      font,
      label_color: LABEL_COLOR,
    }
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|_| DrawError::InvalidFont(path.to_path_buf()))?;
    Ok(Self::with_font(Some(font)))
  }

  /// 优先使用指定字体，否则尝试常见系统字体；都不可用时只绘制边框
  pub fn discover(font_path: Option<&Path>) -> Result<Self, DrawError> {
    if let Some(path) = font_path {
      info!("加载标签字体: {}", path.display());
      return Self::from_font_file(path);
    }

    for candidate in SYSTEM_FONTS {
      if Path::new(candidate).exists()
        && let Ok(draw) = Self::from_font_file(candidate)
      {
        info!("使用系统字体: {}", candidate);
        return Ok(draw);
      }
    }

    warn!("未找到可用字体，标注图像中将不包含文字标签");
    Ok(Self::default())
  }

  /// 在原图副本上绘制所有检测结果
  pub fn annotate(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut annotated = image.clone();
    self.draw_detections_on_image(&mut annotated, result);
    annotated
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = ((item.bbox[0] * w as f32).floor() as i32).clamp(0, w - 1);
    let y_min = ((item.bbox[1] * h as f32).floor() as i32).clamp(0, h - 1);
    let x_max = ((item.bbox[2] * w as f32).ceil() as i32).clamp(0, w - 1);
    let y_max = ((item.bbox[3] * h as f32).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = Rgb(self.label_color);
    for t in 0..BOX_THICKNESS {
      let (bw, bh) = (x_max - x_min - 2 * t + 1, y_max - y_min - 2 * t + 1);
      if bw <= 0 || bh <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(bw as u32, bh as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    let label = format!("{} {:.2}", item.label, item.score);
    let scale = PxScale::from(self.font_size);
    let (text_w, text_h) = text_size(scale, font, &label);
    let label_h = text_h as i32 + 2 * self.label_text_padding;

    // 标签放在边框上方，空间不足时放在框内顶部
    let label_x = x_min;
    let label_y = if y_min - label_h >= 0 { y_min - label_h } else { y_min };
    let label_w = (text_w as i32 + 2 * self.label_text_padding).min(w - label_x);
    let label_h = label_h.min(h - label_y);

    if label_w > 0 && label_h > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_w as u32, label_h as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        label_x + self.label_text_padding,
        label_y + self.label_text_padding,
        scale,
        font,
        &label,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(bbox: [f32; 4]) -> DetectResult {
    DetectResult {
      items: vec![DetectItem {
        class_id: 0,
        label: "scab".into(),
        score: 0.8,
        bbox,
      }]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn annotation_keeps_source_dimensions() {
    let image = RgbImage::from_pixel(64, 48, Rgb([10, 200, 10]));
    let annotated = Draw::default().annotate(&image, &result([0.25, 0.25, 0.75, 0.75]));
    assert_eq!(annotated.dimensions(), image.dimensions());
  }

  #[test]
  fn boxes_are_drawn_in_rgb_order() {
    let image = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
    let draw = Draw::default();
    let annotated = draw.annotate(&image, &result([0.2, 0.2, 0.8, 0.8]));

    assert_eq!(annotated.get_pixel(20, 50), &Rgb(LABEL_COLOR));
    assert_eq!(annotated.get_pixel(21, 50), &Rgb(LABEL_COLOR));
    assert_eq!(annotated.get_pixel(50, 80), &Rgb(LABEL_COLOR));
    // 框内部保持不变
    assert_eq!(annotated.get_pixel(50, 50), &Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let image = RgbImage::from_pixel(10, 10, Rgb([1, 1, 1]));
    let annotated = Draw::default().annotate(&image, &result([0.5, 0.5, 0.5, 0.5]));
    assert_eq!(annotated, image);
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let err = Draw::discover(Some(Path::new("/nonexistent/font.ttf")));
    assert!(matches!(err, Err(DrawError::IoError(_))));
  }
}
