// 该文件是 Tanbing （探病） 项目的一部分。
// src/gateway.rs - 推理网关：校验、推理、提取结果、生成标注图像
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
#[cfg(feature = "directory_record")]
use tracing::warn;

#[cfg(feature = "directory_record")]
use crate::output::{DirectoryRecordOutput, Render};
use crate::{
  frame::FrameError,
  input::{AcceptFormats, DecodeError, InputError, decode_image},
  model::{DetectResult, Detection, InferenceParams, Model, YoloFrame},
  output::{draw::Draw, encode_png},
};

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("帧转换错误: {0}")]
  Frame(#[from] FrameError),
  #[error("模型推理错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("标注图像编码错误: {0}")]
  Encode(#[from] image::ImageError),
  #[error("推理线程错误: {0}")]
  Worker(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
  #[error(transparent)]
  Input(#[from] InputError),
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Inference(#[from] InferenceError),
}

impl GatewayError {
  /// 由调用方的输入引起的错误
  pub fn is_client_error(&self) -> bool {
    !matches!(self, GatewayError::Inference(_))
  }

  /// 返回给用户的消息，不包含内部细节
  pub fn public_message(&self) -> &'static str {
    match self {
      GatewayError::Input(InputError::MissingImage) => "No image uploaded",
      GatewayError::Input(InputError::Empty) => "Uploaded image is empty",
      GatewayError::Input(InputError::MalformedUpload(_)) => "Malformed upload",
      GatewayError::Input(InputError::TooLarge(_)) => "Uploaded image is too large",
      GatewayError::Decode(DecodeError::UnsupportedFormat(_)) => {
        "Only JPG and PNG images are supported"
      }
      GatewayError::Decode(_) => "Uploaded file is not a readable image",
      GatewayError::Inference(_) => "Inference failed",
    }
  }
}

/// 单次推理的完整结果
#[derive(Debug, Clone)]
pub struct Prediction {
  pub top: Option<Detection>,
  pub detections: Vec<Detection>,
  pub source: RgbImage,
  pub annotated: RgbImage,
  pub annotated_png: Vec<u8>,
}

pub struct InferenceGateway<M> {
  model: M,
  draw: Draw,
  #[cfg(feature = "directory_record")]
  record: Option<DirectoryRecordOutput>,
}

impl<M> InferenceGateway<M>
where
  M: Model<Input = YoloFrame, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, draw: Draw) -> Self {
    Self {
      model,
      draw,
      #[cfg(feature = "directory_record")]
      record: None,
    }
  }

  #[cfg(feature = "directory_record")]
  pub fn with_record(mut self, record: Option<DirectoryRecordOutput>) -> Self {
    self.record = record;
    self
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn predict(
    &self,
    image: Option<&[u8]>,
    params: &InferenceParams,
    accept: AcceptFormats,
  ) -> Result<Prediction, GatewayError> {
    let bytes = image.ok_or(InputError::MissingImage)?;
    if bytes.is_empty() {
      return Err(InputError::Empty.into());
    }

    let source = decode_image(bytes, accept)?;
    debug!("图像解码完成: {}x{}", source.width(), source.height());

    let frame = YoloFrame::from_rgb_image(&source).map_err(InferenceError::from)?;

    let now = std::time::Instant::now();
    let result = self
      .model
      .infer(&frame, params)
      .map_err(|e| InferenceError::Model(Box::new(e)))?;
    info!("推理完成，检测到 {} 个对象，耗时: {:.2?}", result.len(), now.elapsed());

    let annotated = self.draw.annotate(&source, &result);
    let annotated_png = encode_png(&annotated).map_err(InferenceError::from)?;

    #[cfg(feature = "directory_record")]
    if let Some(record) = &self.record
      && let Err(e) = record.render_result(&annotated, &result)
    {
      warn!("记录检测结果失败: {}", e);
    }

    Ok(Prediction {
      top: result.top().map(Detection::from),
      detections: result.items.iter().map(Detection::from).collect(),
      source,
      annotated,
      annotated_png,
    })
  }
}
