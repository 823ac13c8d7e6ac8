// 该文件是 Tanbing （探病） 项目的一部分。
// src/model/yolo.rs - 基于 ONNX Runtime 的 YOLO 检测模型
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

use std::sync::Mutex;

use ndarray::{ArrayView2, Axis, Ix2};
use ort::{
  execution_providers::CPUExecutionProvider,
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path,
  frame::Letterbox,
  input::AsNchwFrame,
  model::{DetectItem, DetectResult, InferenceParams, Labels, Model, YoloFrame},
};

const YOLO_NUM_INPUTS: usize = 1;
const YOLO_BOX_CHANNELS: usize = 4;
const YOLO_METADATA_NAMES: &str = "names";

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型输出形状错误: {0}")]
  OutputShape(#[from] ndarray::ShapeError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

impl From<std::io::Error> for YoloOnnxError {
  fn from(err: std::io::Error) -> Self {
    YoloOnnxError::ModelLoadError(err)
  }
}

/// YOLOv8 系列检测模型，启动时加载一次，之后只读共享
pub struct YoloOnnx {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  labels: Labels,
}

pub struct YoloOnnxBuilder {
  model_path: String,
  labels: Option<Labels>,
  intra_threads: usize,
}

impl FromUrlWithScheme for YoloOnnxBuilder {
  const SCHEME: &'static str = "yolo";
}

impl FromUrl for YoloOnnxBuilder {
  type Error = YoloOnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloOnnxError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(YoloOnnxBuilder {
      model_path: decoded_path(url)
        .map_err(|e| YoloOnnxError::ModelPathError(e.to_string()))?,
      labels: None,
      intra_threads: 1,
    })
  }
}

impl YoloOnnxBuilder {
  pub fn labels(mut self, labels: Option<Labels>) -> Self {
    self.labels = labels;
    self
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads.max(1);
    self
  }

  pub fn build(self) -> Result<YoloOnnx, YoloOnnxError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话 (CPU)");
    let session = Session::builder()?
      .with_execution_providers([CPUExecutionProvider::default().build()])?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.intra_threads)?
      .commit_from_memory(&model_data)?;

    if session.inputs.len() != YOLO_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO_NUM_INPUTS,
        session.inputs.len()
      );
      return Err(YoloOnnxError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        YOLO_NUM_INPUTS,
        session.inputs.len()
      )));
    }

    let output_name = match session.outputs.first() {
      Some(output) => output.name.clone(),
      None => {
        error!("模型没有输出");
        return Err(YoloOnnxError::ModelInvalid("模型没有输出".to_string()));
      }
    };
    let input_name = session.inputs[0].name.clone();
    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);

    let labels = match self.labels {
      Some(labels) => labels,
      None => metadata_labels(&session),
    };
    info!("类别数量: {}", labels.len());
    info!("模型加载完成");

    Ok(YoloOnnx {
      session: Mutex::new(session),
      input_name,
      output_name,
      labels,
    })
  }
}

fn metadata_labels(session: &Session) -> Labels {
  let raw = session
    .metadata()
    .and_then(|meta| meta.custom(YOLO_METADATA_NAMES));
  match raw {
    Ok(Some(raw)) => match Labels::from_ultralytics_metadata(&raw) {
      Ok(labels) => labels,
      Err(e) => {
        warn!("无法解析模型中的类别名称: {}", e);
        Labels::default()
      }
    },
    Ok(None) => {
      warn!("模型中没有类别名称元数据，将使用类别编号");
      Labels::default()
    }
    Err(e) => {
      warn!("读取模型元数据失败: {}", e);
      Labels::default()
    }
  }
}

impl Model for YoloOnnx {
  type Input = YoloFrame;
  type Output = DetectResult;
  type Error = YoloOnnxError;

  fn infer(
    &self,
    input: &Self::Input,
    params: &InferenceParams,
  ) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let tensor = Tensor::from_array(input.to_tensor())?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| YoloOnnxError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

    debug!("获取模型输出");
    let output = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
    debug!("模型输出形状: {:?}", output.shape());

    let head = output
      .index_axis(Axis(0), 0)
      .into_dimensionality::<Ix2>()?;

    Ok(decode_predictions(
      head,
      &input.letterbox,
      params,
      &self.labels,
    ))
  }
}

/// 解码 YOLOv8 检测头输出 `[4 + 类别数, 锚点数]`，执行阈值过滤与按类别的 NMS
pub fn decode_predictions(
  head: ArrayView2<f32>,
  letterbox: &Letterbox,
  params: &InferenceParams,
  labels: &Labels,
) -> DetectResult {
  // 部分导出格式为 [锚点数, 4 + 类别数]
  let head = if head.nrows() > head.ncols() {
    head.reversed_axes()
  } else {
    head
  };

  let channels = head.nrows();
  if channels <= YOLO_BOX_CHANNELS {
    error!("模型输出通道数 {} 不足以包含类别分数", channels);
    return DetectResult::default();
  }

  let mut candidates = Vec::new();
  for anchor in head.axis_iter(Axis(1)) {
    let (class_id, score) = anchor
      .iter()
      .skip(YOLO_BOX_CHANNELS)
      .enumerate()
      .fold((0usize, f32::MIN), |best, (c, &s)| if s > best.1 { (c, s) } else { best });

    if score <= params.confidence {
      continue;
    }

    let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
    candidates.push(Candidate {
      class_id: class_id as u32,
      score: score.clamp(0.0, 1.0),
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  debug!("阈值过滤后候选框数量: {}", candidates.len());

  let kept = non_max_suppression(candidates, params.iou, params.max_detections);

  let items: Vec<DetectItem> = kept
    .into_iter()
    .map(|c| DetectItem {
      class_id: c.class_id,
      label: labels.label(c.class_id),
      score: c.score,
      bbox: letterbox.restore(c.bbox),
    })
    .collect();

  debug!("检测到 {} 个物体", items.len());
  DetectResult {
    items: items.into_boxed_slice(),
  }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
  class_id: u32,
  score: f32,
  bbox: [f32; 4],
}

fn non_max_suppression(
  mut candidates: Vec<Candidate>,
  iou_threshold: f32,
  max_keep: usize,
) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if kept.len() >= max_keep {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x_min = a[0].max(b[0]);
  let y_min = a[1].max(b[1]);
  let x_max = a[2].min(b[2]);
  let y_max = a[3].min(b[3]);
  let inter = (x_max - x_min).max(0.0) * (y_max - y_min).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array2;

  const MIN_ANCHORS: usize = 8;

  // 每列一个锚点: cx, cy, w, h, 类别 0 分数, 类别 1 分数
  // 不足的锚点以零分补齐，保证锚点数多于通道数
  fn head(anchors: &[[f32; 6]]) -> Array2<f32> {
    let n = anchors.len().max(MIN_ANCHORS);
    Array2::from_shape_fn((6, n), |(c, a)| anchors.get(a).map(|v| v[c]).unwrap_or(0.0))
  }

  fn identity_letterbox() -> Letterbox {
    Letterbox::fit(320, 320, 320, 320)
  }

  fn labels() -> Labels {
    Labels::new(vec!["healthy".into(), "rust".into()])
  }

  #[test]
  fn keeps_boxes_above_threshold_and_picks_argmax_class() {
    let output = head(&[
      [160.0, 160.0, 64.0, 64.0, 0.05, 0.9],
      [40.0, 40.0, 20.0, 20.0, 0.3, 0.1],
      [200.0, 80.0, 10.0, 10.0, 0.2, 0.1],
    ]);
    let result = decode_predictions(
      output.view(),
      &identity_letterbox(),
      &InferenceParams::API,
      &labels(),
    );

    assert_eq!(result.len(), 2);
    assert_eq!(result.items[0].label, "rust");
    assert_eq!(result.items[0].class_id, 1);
    assert!((result.items[0].score - 0.9).abs() < 1e-6);
    assert_eq!(result.items[0].bbox, [0.4, 0.4, 0.6, 0.6]);
    assert_eq!(result.items[1].label, "healthy");
  }

  #[test]
  fn suppresses_overlapping_boxes_of_the_same_class() {
    let output = head(&[
      [100.0, 100.0, 50.0, 50.0, 0.8, 0.0],
      [102.0, 101.0, 50.0, 50.0, 0.6, 0.0],
      [102.0, 101.0, 50.0, 50.0, 0.0, 0.5],
    ]);
    let result = decode_predictions(
      output.view(),
      &identity_letterbox(),
      &InferenceParams::API,
      &labels(),
    );

    let scores: Vec<f32> = result.items.iter().map(|i| i.score).collect();
    assert_eq!(scores, vec![0.8, 0.5]);
  }

  #[test]
  fn accepts_transposed_output() {
    let output = head(&[[160.0, 160.0, 64.0, 64.0, 0.9, 0.0]]);
    let transposed = output.t().to_owned();
    let result = decode_predictions(
      transposed.view(),
      &identity_letterbox(),
      &InferenceParams::API,
      &labels(),
    );
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].label, "healthy");
  }

  #[test]
  fn nothing_above_threshold_gives_empty_result() {
    let output = head(&[[160.0, 160.0, 64.0, 64.0, 0.2, 0.25]]);
    let result = decode_predictions(
      output.view(),
      &identity_letterbox(),
      &InferenceParams::API,
      &labels(),
    );
    assert!(result.is_empty());
    assert!(result.top().is_none());
  }

  #[test]
  fn max_detections_caps_output() {
    let anchors: Vec<[f32; 6]> = (0..10)
      .map(|i| [i as f32 * 30.0 + 10.0, 10.0, 8.0, 8.0, 0.5 + i as f32 * 0.01, 0.0])
      .collect();
    let output = head(&anchors);
    let mut params = InferenceParams::API;
    params.max_detections = 3;
    let result = decode_predictions(output.view(), &identity_letterbox(), &params, &labels());
    assert_eq!(result.len(), 3);
    assert!(result.items[0].score > result.items[2].score);
  }

  #[test]
  fn iou_of_disjoint_and_identical_boxes() {
    assert_eq!(iou(&[0.0, 0.0, 1.0, 1.0], &[2.0, 2.0, 3.0, 3.0]), 0.0);
    assert_eq!(iou(&[0.0, 0.0, 2.0, 2.0], &[0.0, 0.0, 2.0, 2.0]), 1.0);
  }
}
