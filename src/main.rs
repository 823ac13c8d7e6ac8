// 该文件是 Tanbing （探病） 项目的一部分。
// src/main.rs - 项目主程序
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

use actix_web::web;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tanbing::{
  FromUrl,
  args::Args,
  gateway::InferenceGateway,
  model::{Labels, YoloOnnxBuilder},
  output::draw::Draw,
  server::{self, AppState},
  store::ArtifactStore,
};

#[actix_web::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("Tanbing 病害检测服务");
  info!("模型地址: {}", args.model);
  info!("监听地址: {}:{}", args.host, args.port);
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.iou);

  let labels = args
    .labels
    .as_ref()
    .map(Labels::from_file)
    .transpose()
    .context("无法读取类别名称文件")?;

  // 模型只在启动时加载一次，之后由所有请求共享
  let model = YoloOnnxBuilder::from_url(&args.model)?
    .labels(labels)
    .intra_threads(args.intra_threads)
    .build()
    .context("模型加载失败")?;

  let draw = Draw::discover(args.font.as_deref()).context("无法加载标签字体")?;
  let gateway = InferenceGateway::new(model, draw);

  #[cfg(feature = "directory_record")]
  let gateway = gateway.with_record(args.record_dir.as_ref().map(|dir| {
    info!("检测结果将记录到目录: {}", dir.display());
    tanbing::output::DirectoryRecordOutput::new(dir)
  }));

  let store = ArtifactStore::new(args.artifact_ttl(), args.artifact_capacity)
    .with_max_bytes(args.artifact_max_bytes());
  let state = web::Data::new(AppState::new(gateway, store).with_api_params(args.api_params()));

  server::run(state, &args.host, args.port).await?;

  info!("服务已退出");
  Ok(())
}
