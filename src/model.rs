// 该文件是 Tanbing （探病） 项目的一部分。
// src/model.rs - 模型
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

use serde::{Deserialize, Serialize};

use crate::frame::LetterboxFrame;

/// 模型输入的正方形边长
pub const YOLO_INPUT_SIZE: u32 = 320;

pub type YoloFrame = LetterboxFrame<YOLO_INPUT_SIZE, YOLO_INPUT_SIZE>;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(
    &self,
    input: &Self::Input,
    params: &InferenceParams,
  ) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
  Cpu,
}

/// 单次推理的固定参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InferenceParams {
  pub confidence: f32,
  pub iou: f32,
  pub max_detections: usize,
  pub device: Device,
  pub batch: usize,
}

impl InferenceParams {
  /// `POST /predict` 使用的参数
  pub const API: Self = Self::new(0.25, 0.45);
  /// 检测列表页面使用的参数
  pub const DETECTION_LIST: Self = Self::new(0.25, 0.45);
  /// 最高置信度横幅页面使用的参数
  pub const TOP_BANNER: Self = Self::new(0.1, 0.7);

  pub const fn new(confidence: f32, iou: f32) -> Self {
    Self {
      confidence,
      iou,
      max_detections: 300,
      device: Device::Cpu,
      batch: 1,
    }
  }
}

impl Default for InferenceParams {
  fn default() -> Self {
    Self::API
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，相对原图归一化
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 置信度最高的检测；置信度相同时保留最先出现的一个
  pub fn top(&self) -> Option<&DetectItem> {
    let mut top = None;
    let mut top_score = 0.0f32;
    for item in self.items.iter() {
      if item.score > top_score {
        top = Some(item);
        top_score = item.score;
      }
    }
    top
  }
}

/// 对外返回的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub label: String,
  pub confidence: f32,
}

impl From<&DetectItem> for Detection {
  fn from(item: &DetectItem) -> Self {
    Detection {
      label: item.label.clone(),
      confidence: (item.score.clamp(0.0, 1.0) * 100.0).round() / 100.0,
    }
  }
}

mod labels;
pub use self::labels::{Labels, LabelsError};

mod yolo;
pub use self::yolo::{YoloOnnx, YoloOnnxBuilder, YoloOnnxError, decode_predictions};

#[cfg(test)]
mod tests {
  use super::*;

  fn item(label: &str, score: f32) -> DetectItem {
    DetectItem {
      class_id: 0,
      label: label.to_string(),
      score,
      bbox: [0.0, 0.0, 1.0, 1.0],
    }
  }

  #[test]
  fn top_picks_highest_confidence() {
    let result = DetectResult {
      items: vec![item("rust", 0.3), item("blight", 0.9)].into_boxed_slice(),
    };
    assert_eq!(result.top().map(|d| d.label.as_str()), Some("blight"));
  }

  #[test]
  fn top_keeps_first_seen_on_ties() {
    let result = DetectResult {
      items: vec![item("first", 0.7), item("second", 0.7)].into_boxed_slice(),
    };
    assert_eq!(result.top().map(|d| d.label.as_str()), Some("first"));
  }

  #[test]
  fn top_is_none_without_items() {
    assert!(DetectResult::default().top().is_none());
  }

  #[test]
  fn detection_confidence_is_rounded_and_bounded() {
    let d = Detection::from(&item("mildew", 0.876));
    assert_eq!(d.confidence, 0.88);
    let d = Detection::from(&item("mildew", 1.2));
    assert_eq!(d.confidence, 1.0);
  }

  #[test]
  fn presets_run_on_cpu_with_batch_one() {
    for params in [
      InferenceParams::API,
      InferenceParams::DETECTION_LIST,
      InferenceParams::TOP_BANNER,
    ] {
      assert_eq!(params.device, Device::Cpu);
      assert_eq!(params.batch, 1);
      assert!((0.1..=0.25).contains(&params.confidence));
      assert!((0.45..=0.7).contains(&params.iou));
    }
  }
}
