// 该文件是 Tanbing （探病） 项目的一部分。
// src/server.rs - HTTP 服务
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

use actix_multipart::Multipart;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, http::header, web};
use futures_util::TryStreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
  gateway::{GatewayError, InferenceError, InferenceGateway, Prediction},
  input::{AcceptFormats, InputError},
  model::{DetectResult, InferenceParams, Model, YoloFrame},
  store::ArtifactStore,
};

pub mod api;
pub mod pages;
#[cfg(feature = "web_ui")]
pub mod ui;

/// 上传表单中图像字段的名称
pub const IMAGE_FIELD: &str = "image";
/// 单次上传的大小上限
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
/// 结果图像的访问路径前缀
pub const RESULTS_PREFIX: &str = "/static/results";

/// HTTP 处理函数共享的状态
pub struct AppState<M> {
  pub gateway: InferenceGateway<M>,
  pub store: ArtifactStore,
  pub api_params: InferenceParams,
}

impl<M> AppState<M> {
  pub fn new(gateway: InferenceGateway<M>, store: ArtifactStore) -> Self {
    Self {
      gateway,
      store,
      api_params: InferenceParams::API,
    }
  }

  pub fn with_api_params(mut self, params: InferenceParams) -> Self {
    self.api_params = params;
    self
  }
}

pub fn artifact_url(id: &Uuid) -> String {
  format!("{}/{}.png", RESULTS_PREFIX, id)
}

/// 注册所有路由
pub fn configure<M>(cfg: &mut web::ServiceConfig)
where
  M: Model<Input = YoloFrame, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  cfg
    .route("/", web::get().to(index_route))
    .route("/predict", web::post().to(api::predict_handler::<M>))
    .route(
      &format!("{}/{{name}}", RESULTS_PREFIX),
      web::get().to(artifact_handler::<M>),
    );

  #[cfg(feature = "web_ui")]
  cfg
    .route("/ui/{variant}", web::get().to(ui::form_handler))
    .route("/ui/{variant}", web::post().to(ui::submit_handler::<M>));
}

/// 启动服务并阻塞直到退出
pub async fn run<M>(state: web::Data<AppState<M>>, host: &str, port: u16) -> std::io::Result<()>
where
  M: Model<Input = YoloFrame, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  info!("HTTP 服务监听 {}:{}", host, port);
  HttpServer::new(move || {
    App::new()
      .app_data(state.clone())
      .configure(configure::<M>)
  })
  .bind((host, port))?
  .run()
  .await
}

/// 静态首页
async fn index_route() -> HttpResponse {
  HttpResponse::Ok()
    .content_type("text/html; charset=utf-8")
    .body(pages::INDEX_HTML)
}

/// 返回内存中的结果图像
async fn artifact_handler<M>(name: web::Path<String>, state: web::Data<AppState<M>>) -> HttpResponse
where
  M: Send + Sync + 'static,
{
  let id = name
    .strip_suffix(".png")
    .and_then(|stem| Uuid::parse_str(stem).ok());

  match id.and_then(|id| state.store.get(&id)) {
    Some(png) => HttpResponse::Ok()
      .content_type("image/png")
      .append_header((header::CACHE_CONTROL, "no-store"))
      .body(png.to_vec()),
    None => HttpResponse::NotFound().json(api::ErrorResponse {
      error: "Result not found".to_string(),
    }),
  }
}

/// 从 multipart 表单中读取 `image` 字段；非 multipart 请求视为没有上传图像
pub(crate) async fn read_image_field(
  req: &HttpRequest,
  mut payload: Multipart,
) -> Result<Option<Vec<u8>>, InputError> {
  let is_multipart = req
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
    .unwrap_or(false);
  if !is_multipart {
    return Ok(None);
  }

  let mut image = None;
  while let Some(mut field) = payload
    .try_next()
    .await
    .map_err(|e| InputError::MalformedUpload(e.to_string()))?
  {
    let wanted = image.is_none() && field.name() == Some(IMAGE_FIELD);
    // 浏览器在未选择文件时会提交一个文件名为空的字段
    let has_filename = field
      .content_disposition()
      .and_then(|cd| cd.get_filename())
      .map(|name| !name.is_empty())
      .unwrap_or(true);

    let mut buf = Vec::new();
    while let Some(chunk) = field
      .try_next()
      .await
      .map_err(|e| InputError::MalformedUpload(e.to_string()))?
    {
      if wanted {
        if buf.len() + chunk.len() > MAX_UPLOAD_BYTES {
          return Err(InputError::TooLarge(MAX_UPLOAD_BYTES));
        }
        buf.extend_from_slice(&chunk);
      }
    }

    if wanted && (has_filename || !buf.is_empty()) {
      image = Some(buf);
    }
  }

  Ok(image)
}

/// 在阻塞线程池中执行推理，并把标注图像放入结果存储
pub(crate) async fn run_prediction<M>(
  state: &web::Data<AppState<M>>,
  image: Option<Vec<u8>>,
  params: InferenceParams,
  accept: AcceptFormats,
) -> Result<(Prediction, Uuid), GatewayError>
where
  M: Model<Input = YoloFrame, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  // 没有图像时不进入推理线程
  let image = image.ok_or(InputError::MissingImage)?;

  let worker_state = state.clone();
  let prediction = web::block(move || {
    worker_state
      .gateway
      .predict(Some(image.as_slice()), &params, accept)
  })
  .await
  .map_err(|e| InferenceError::Worker(e.to_string()))??;

  let id = state.store.put(prediction.annotated_png.clone());
  Ok((prediction, id))
}

/// 记录错误：客户端错误记为警告，内部错误记为错误
pub(crate) fn log_failure(route: &str, err: &GatewayError) {
  if err.is_client_error() {
    warn!("{} 请求被拒绝: {}", route, err);
  } else {
    error!("{} 请求处理失败: {}", route, err);
  }
}
