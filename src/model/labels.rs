// 该文件是 Tanbing （探病） 项目的一部分。
// src/model/labels.rs - 类别名称表
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

use std::{collections::BTreeMap, path::Path};

use thiserror::Error;

/// 元数据中允许的最大类别编号（不含）
const MAX_METADATA_CLASSES: usize = 4096;

#[derive(Error, Debug)]
pub enum LabelsError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别元数据格式错误: {0}")]
  Malformed(String),
  #[error("类别编号 {0} 超出上限 {max}", max = MAX_METADATA_CLASSES)]
  ClassIdOutOfRange(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
  names: Vec<String>,
}

impl Labels {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  /// 每行一个类别名称，空行忽略
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelsError> {
    let content = std::fs::read_to_string(path)?;
    Ok(Self::from_lines(&content))
  }

  pub fn from_lines(content: &str) -> Self {
    let names = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    Self { names }
  }

  /// 解析 ultralytics 导出时写入的 `names` 元数据，如 `{0: 'healthy', 1: 'leaf rust'}`
  pub fn from_ultralytics_metadata(raw: &str) -> Result<Self, LabelsError> {
    let body = raw
      .trim()
      .strip_prefix('{')
      .and_then(|s| s.strip_suffix('}'))
      .ok_or_else(|| LabelsError::Malformed(raw.to_string()))?;

    let mut entries = BTreeMap::new();
    let mut rest = body.trim();
    while !rest.is_empty() {
      let (key, tail) = rest
        .split_once(':')
        .ok_or_else(|| LabelsError::Malformed(raw.to_string()))?;
      let id: usize = key
        .trim()
        .parse()
        .map_err(|_| LabelsError::Malformed(raw.to_string()))?;
      if id >= MAX_METADATA_CLASSES {
        return Err(LabelsError::ClassIdOutOfRange(id));
      }

      let tail = tail.trim_start();
      let quote = tail
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| LabelsError::Malformed(raw.to_string()))?;
      let value_and_rest = &tail[1..];
      let end = value_and_rest
        .find(quote)
        .ok_or_else(|| LabelsError::Malformed(raw.to_string()))?;
      entries.insert(id, value_and_rest[..end].to_string());

      rest = value_and_rest[end + 1..].trim_start();
      rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    let len = entries.keys().next_back().map(|k| k + 1).unwrap_or(0);
    let mut names: Vec<String> = (0..len).map(fallback_label).collect();
    for (id, name) in entries {
      names[id] = name;
    }
    Ok(Self { names })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn label(&self, class_id: u32) -> String {
    self
      .names
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| fallback_label(class_id as usize))
  }
}

fn fallback_label(id: usize) -> String {
  format!("class_{}", id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_ultralytics_names() {
    let labels =
      Labels::from_ultralytics_metadata("{0: 'healthy', 1: \"leaf rust\", 3: 'powdery, mildew'}")
        .unwrap();
    assert_eq!(labels.len(), 4);
    assert_eq!(labels.label(0), "healthy");
    assert_eq!(labels.label(1), "leaf rust");
    assert_eq!(labels.label(2), "class_2");
    assert_eq!(labels.label(3), "powdery, mildew");
    assert_eq!(labels.label(9), "class_9");
  }

  #[test]
  fn rejects_non_dict_metadata() {
    assert!(Labels::from_ultralytics_metadata("['a', 'b']").is_err());
    assert!(Labels::from_ultralytics_metadata("{zero: 'a'}").is_err());
  }

  #[test]
  fn rejects_huge_class_ids() {
    let err = Labels::from_ultralytics_metadata("{4294967295: 'x'}").unwrap_err();
    assert!(matches!(err, LabelsError::ClassIdOutOfRange(4294967295)));
    let labels = Labels::from_ultralytics_metadata("{4095: 'last'}").unwrap();
    assert_eq!(labels.len(), 4096);
  }

  #[test]
  fn empty_dict_yields_no_labels() {
    assert!(Labels::from_ultralytics_metadata("{}").unwrap().is_empty());
  }

  #[test]
  fn reads_one_label_per_line() {
    let labels = Labels::from_lines("healthy\n\n  scab \nblight\n");
    assert_eq!(labels, Labels::new(vec!["healthy".into(), "scab".into(), "blight".into()]));
  }
}
