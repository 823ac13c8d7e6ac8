// 该文件是 Tanbing （探病） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{model::DetectResult, output::Render};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把每次请求的标注图像与检测记录按日期归档到目录中
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counter: AtomicU16,
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      frame_counter: AtomicU16::new(0),
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

/// 每行一个检测: `label, score, x_min, y_min, x_max, y_max`
pub fn format_records(result: &DetectResult) -> String {
  result
    .items
    .iter()
    .map(|item| {
      format!(
        "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        item.label, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

impl Render<RgbImage, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  /// `frame` 为已绘制好的标注图像
  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let path = self.frame_path(Utc::now())?;
    frame.save(&path)?;
    std::fs::write(path.with_extension("txt"), format_records(result))?;
    debug!("记录检测结果到: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;
  use image::Rgb;

  #[test]
  fn records_image_and_sidecar_under_dated_directory() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path());
    let result = DetectResult {
      items: vec![DetectItem {
        class_id: 2,
        label: "leaf rust".into(),
        score: 0.5,
        bbox: [0.1, 0.2, 0.3, 0.4],
      }]
      .into_boxed_slice(),
    };

    let frame = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
    output.render_result(&frame, &result).unwrap();
    output.render_result(&frame, &result).unwrap();

    let now = Utc::now();
    let day = dir
      .path()
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    let mut pngs: Vec<_> = std::fs::read_dir(&day)
      .unwrap()
      .map(|e| e.unwrap().path())
      .filter(|p| p.extension().is_some_and(|e| e == "png"))
      .collect();
    pngs.sort();
    assert_eq!(pngs.len(), 2);

    let sidecar = std::fs::read_to_string(pngs[0].with_extension("txt")).unwrap();
    assert_eq!(sidecar, "leaf rust, 0.5000, 0.1000, 0.2000, 0.3000, 0.4000");
  }

  #[test]
  fn frame_ids_increase() {
    let output = DirectoryRecordOutput::new("unused");
    assert_eq!(output.frame_id(), 1);
    assert_eq!(output.frame_id(), 2);
  }
}
