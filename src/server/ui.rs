// 该文件是 Tanbing （探病） 项目的一部分。
// src/server/ui.rs - 交互式上传页面
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
use actix_web::{HttpRequest, HttpResponse, http::StatusCode, web};
use serde::Deserialize;
use tracing::info;

use crate::{
  gateway::{GatewayError, InferenceError},
  input::AcceptFormats,
  model::{DetectResult, InferenceParams, Model, YoloFrame},
  output::encode_png,
  server::{
    AppState, artifact_url, log_failure,
    pages::{self, Outcome},
    read_image_field, run_prediction,
  },
};

/// 两种页面变体，仅在阈值与结果呈现上不同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiVariant {
  /// 列出全部检测
  Detections,
  /// 只显示置信度最高的检测
  Top,
}

impl UiVariant {
  pub fn params(&self) -> InferenceParams {
    match self {
      UiVariant::Detections => InferenceParams::DETECTION_LIST,
      UiVariant::Top => InferenceParams::TOP_BANNER,
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      UiVariant::Detections => "Plant Disease Detection",
      UiVariant::Top => "Plant Disease Detector",
    }
  }

  pub fn action(&self) -> &'static str {
    match self {
      UiVariant::Detections => "/ui/detections",
      UiVariant::Top => "/ui/top",
    }
  }
}

fn html(status: StatusCode, body: String) -> HttpResponse {
  HttpResponse::build(status)
    .content_type("text/html; charset=utf-8")
    .body(body)
}

fn error_page(variant: UiVariant, err: &GatewayError) -> HttpResponse {
  let status = if err.is_client_error() {
    StatusCode::BAD_REQUEST
  } else {
    StatusCode::INTERNAL_SERVER_ERROR
  };
  html(
    status,
    pages::render_form(variant.title(), variant.action(), Some(err.public_message())),
  )
}

/// `GET /ui/{variant}`
pub async fn form_handler(variant: web::Path<UiVariant>) -> HttpResponse {
  let variant = variant.into_inner();
  html(
    StatusCode::OK,
    pages::render_form(variant.title(), variant.action(), None),
  )
}

/// `POST /ui/{variant}`
pub async fn submit_handler<M>(
  req: HttpRequest,
  variant: web::Path<UiVariant>,
  payload: Multipart,
  state: web::Data<AppState<M>>,
) -> HttpResponse
where
  M: Model<Input = YoloFrame, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let variant = variant.into_inner();
  let route = variant.action();

  let image = match read_image_field(&req, payload).await {
    Ok(image) => image,
    Err(e) => {
      let err = GatewayError::from(e);
      log_failure(route, &err);
      return error_page(variant, &err);
    }
  };

  let (prediction, annotated_id) =
    match run_prediction(&state, image, variant.params(), AcceptFormats::JpegPng).await {
      Ok(done) => done,
      Err(err) => {
        log_failure(route, &err);
        return error_page(variant, &err);
      }
    };

  let original_png = match encode_png(&prediction.source) {
    Ok(png) => png,
    Err(e) => {
      let err = GatewayError::from(InferenceError::from(e));
      log_failure(route, &err);
      return error_page(variant, &err);
    }
  };
  let original_id = state.store.put(original_png);

  info!("{} 完成，检测到 {} 个对象", route, prediction.detections.len());

  let outcome = match variant {
    UiVariant::Detections => Outcome::List(&prediction.detections),
    UiVariant::Top => Outcome::Banner(prediction.top.as_ref()),
  };
  html(
    StatusCode::OK,
    pages::render_result(
      variant.title(),
      variant.action(),
      &artifact_url(&original_id),
      &artifact_url(&annotated_id),
      outcome,
    ),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn variants_use_their_own_thresholds() {
    assert_eq!(UiVariant::Detections.params(), InferenceParams::DETECTION_LIST);
    assert_eq!(UiVariant::Top.params(), InferenceParams::TOP_BANNER);
    assert!(UiVariant::Top.params().confidence < UiVariant::Detections.params().confidence);
  }

  #[test]
  fn variant_paths_deserialize() {
    let v: UiVariant = serde_json::from_str("\"detections\"").unwrap();
    assert_eq!(v, UiVariant::Detections);
    let v: UiVariant = serde_json::from_str("\"top\"").unwrap();
    assert_eq!(v, UiVariant::Top);
    assert!(serde_json::from_str::<UiVariant>("\"other\"").is_err());
  }
}
