// 该文件是 Tanbing （探病） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decoded_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("path is not valid UTF-8: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
}

/// 从本地文件读取的原始图像字节
pub struct ImageFileInput {
  path: PathBuf,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Ok(ImageFileInput {
      path: PathBuf::from(decoded_path(url)?),
    })
  }
}

impl ImageFileInput {
  pub fn path(&self) -> &std::path::Path {
    &self.path
  }

  pub fn read(&self) -> Result<Vec<u8>, ImageFileInputError> {
    let bytes = std::fs::read(&self.path)?;
    debug!("读取图像文件 {}: {} 字节", self.path.display(), bytes.len());
    Ok(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_relative_image_urls() {
    let url = Url::parse("image:photos/leaf.jpg").unwrap();
    let input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.path(), std::path::Path::new("photos/leaf.jpg"));
  }

  #[test]
  fn decodes_escaped_file_names() {
    let url = Url::parse("image:photos/my%20leaf.jpg").unwrap();
    let input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.path(), std::path::Path::new("photos/my leaf.jpg"));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("file:///tmp/leaf.jpg").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }
}
