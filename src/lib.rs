// 该文件是 Tanbing （探病） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod args;
pub mod frame;
pub mod gateway;
pub mod input;
pub mod model;
pub mod output;
pub mod server;
pub mod store;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 取出地址的路径部分并做百分号解码，`image:///data/my%20leaf.jpg` 得到 `/data/my leaf.jpg`
pub fn decoded_path(url: &url::Url) -> Result<String, std::string::FromUtf8Error> {
  urlencoding::decode(url.path()).map(|path| path.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn decodes_percent_escaped_paths() {
    let url = Url::parse("yolo:models/my%20model.onnx").unwrap();
    assert_eq!(decoded_path(&url).unwrap(), "models/my model.onnx");

    let url = Url::parse("image:///data/my leaf.jpg").unwrap();
    assert_eq!(decoded_path(&url).unwrap(), "/data/my leaf.jpg");
  }

  #[test]
  fn rejects_invalid_utf8_escapes() {
    let url = Url::parse("image:bad%FF.png").unwrap();
    assert!(decoded_path(&url).is_err());
  }
}
