// 该文件是 Tanbing （探病） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use url::Url;

use crate::{
  model::InferenceParams,
  store::{DEFAULT_CAPACITY, DEFAULT_MAX_BYTES, DEFAULT_TTL},
};

const MIB: usize = 1024 * 1024;

/// Tanbing 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，形如 yolo:best.onnx（相对当前工作目录）
  #[arg(long, default_value = "yolo:best.onnx", value_name = "MODEL")]
  pub model: Url,

  /// 类别名称文件，每行一个；不指定时读取模型元数据
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标签字体文件（TrueType）
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 监听地址
  #[arg(long, default_value = "0.0.0.0", value_name = "HOST")]
  pub host: String,

  /// 监听端口
  #[arg(long, env = "PORT", default_value_t = 5000, value_name = "PORT")]
  pub port: u16,

  /// 预测接口的置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = InferenceParams::API.confidence, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 预测接口的 NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = InferenceParams::API.iou, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 推理线程数
  #[arg(long, default_value_t = 1, value_name = "COUNT")]
  pub intra_threads: usize,

  /// 结果图像在内存中的存活时间（秒）
  #[arg(long, default_value_t = DEFAULT_TTL.as_secs(), value_name = "SECONDS")]
  pub artifact_ttl_secs: u64,

  /// 内存中最多保留的结果图像数量
  #[arg(long, default_value_t = DEFAULT_CAPACITY, value_name = "COUNT")]
  pub artifact_capacity: usize,

  /// 结果图像合计占用内存上限（MiB）
  #[arg(long, default_value_t = DEFAULT_MAX_BYTES / MIB, value_name = "MIB")]
  pub artifact_max_mib: usize,

  /// 将每次预测的标注图像与检测记录保存到该目录
  #[cfg(feature = "directory_record")]
  #[arg(long, value_name = "DIR")]
  pub record_dir: Option<PathBuf>,
}

impl Args {
  pub fn api_params(&self) -> InferenceParams {
    InferenceParams::new(self.confidence.clamp(0.0, 1.0), self.iou.clamp(0.0, 1.0))
  }

  pub fn artifact_ttl(&self) -> Duration {
    Duration::from_secs(self.artifact_ttl_secs)
  }

  pub fn artifact_max_bytes(&self) -> usize {
    self.artifact_max_mib.saturating_mul(MIB)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_api_preset() {
    let args = Args::try_parse_from(["tanbing"]).unwrap();
    assert_eq!(args.model.scheme(), "yolo");
    assert_eq!(args.model.path(), "best.onnx");
    assert_eq!(args.host, "0.0.0.0");
    assert_eq!(args.api_params(), InferenceParams::API);
    assert_eq!(args.artifact_ttl(), DEFAULT_TTL);
    assert_eq!(args.artifact_max_bytes(), DEFAULT_MAX_BYTES);
  }

  #[test]
  fn thresholds_are_clamped() {
    let args = Args::try_parse_from(["tanbing", "--confidence", "1.5", "--iou", "0.6"]).unwrap();
    let params = args.api_params();
    assert_eq!(params.confidence, 1.0);
    assert_eq!(params.iou, 0.6);
  }
}
