// 该文件是 Tanbing （探病） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像推理
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

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;
use url::Url;

use tanbing::{
  FromUrl,
  input::{AcceptFormats, ImageFileInput, decode_image},
  model::{Detection, InferenceParams, Labels, Model, YoloFrame, YoloOnnxBuilder},
  output::{Render, SaveImageFileOutput, draw::Draw},
};

/// 对单张图像执行推理并保存标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，形如 yolo:best.onnx
  #[arg(long, default_value = "yolo:best.onnx", value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，形如 image:leaf.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像，形如 image:result.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 类别名称文件
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
  /// 标签字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = InferenceParams::API.confidence, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = InferenceParams::API.iou, value_name = "THRESHOLD")]
  pub iou: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let labels = args
    .labels
    .as_ref()
    .map(Labels::from_file)
    .transpose()
    .context("无法读取类别名称文件")?;

  let input = ImageFileInput::from_url(&args.input)?;
  let model = YoloOnnxBuilder::from_url(&args.model)?.labels(labels).build()?;
  let output = SaveImageFileOutput::from_url(&args.output)?
    .with_draw(Draw::discover(args.font.as_deref())?);

  let image = decode_image(&input.read()?, AcceptFormats::Any)
    .with_context(|| format!("无法解码图像: {}", input.path().display()))?;
  let frame = YoloFrame::from_rgb_image(&image)?;
  let params = InferenceParams::new(args.confidence, args.iou);

  info!("开始推理...");
  let now = std::time::Instant::now();
  let result = model.infer(&frame, &params)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  output.render_result(&image, &result)?;

  let summary = json!({
    "params": params,
    "prediction": result.top().map(Detection::from),
    "detections": result.items.iter().map(Detection::from).collect::<Vec<_>>(),
    "image_path": output.path(),
  });
  println!("{}", serde_json::to_string_pretty(&summary)?);

  Ok(())
}
