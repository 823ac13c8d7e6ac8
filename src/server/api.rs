// 该文件是 Tanbing （探病） 项目的一部分。
// src/server/api.rs - JSON 预测接口
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
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
  gateway::GatewayError,
  input::AcceptFormats,
  model::{DetectResult, Detection, Model, YoloFrame},
  server::{AppState, artifact_url, log_failure, read_image_field, run_prediction},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
  pub prediction: Option<Detection>,
  pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub error: String,
}

pub fn error_response(err: &GatewayError) -> HttpResponse {
  let body = ErrorResponse {
    error: err.public_message().to_string(),
  };
  if err.is_client_error() {
    HttpResponse::BadRequest().json(body)
  } else {
    HttpResponse::InternalServerError().json(body)
  }
}

/// `POST /predict`，表单字段 `image`
pub async fn predict_handler<M>(
  req: HttpRequest,
  payload: Multipart,
  state: web::Data<AppState<M>>,
) -> HttpResponse
where
  M: Model<Input = YoloFrame, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let image = match read_image_field(&req, payload).await {
    Ok(image) => image,
    Err(e) => {
      let err = GatewayError::from(e);
      log_failure("/predict", &err);
      return error_response(&err);
    }
  };

  let params = state.api_params;
  match run_prediction(&state, image, params, AcceptFormats::Any).await {
    Ok((prediction, id)) => {
      info!(
        "/predict 完成: {}",
        prediction
          .top
          .as_ref()
          .map(|d| format!("{} {:.2}", d.label, d.confidence))
          .unwrap_or_else(|| "无检测".to_string())
      );
      HttpResponse::Ok().json(PredictResponse {
        prediction: prediction.top,
        image_url: artifact_url(&id),
      })
    }
    Err(err) => {
      log_failure("/predict", &err);
      error_response(&err)
    }
  }
}
