// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/output/record.rs - 检测记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detection},
  output::Render,
  picture::PreparedUpload,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Serialize)]
struct RecordEntry<'a> {
  file: &'a str,
  timestamp: String,
  width: u32,
  height: u32,
  detections: &'a [Detection],
}

/// 以 JSON 形式落盘一次检测运行的归一化结果。
/// 形如 `record:///path/result.json`。
pub struct RecordOutput {
  path: String,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch(format!(
        "期望记录方式 '{}', 实际记录方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(RecordOutput {
      path: url.path().to_string(),
    })
  }
}

impl Render<PreparedUpload, DetectResult> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(
    &self,
    frame: &PreparedUpload,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    let entry = RecordEntry {
      file: &frame.name,
      timestamp: chrono::Utc::now().to_rfc3339(),
      width: frame.width,
      height: frame.height,
      detections: &result.items,
    };

    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&self.path, serde_json::to_string_pretty(&entry)?)?;
    info!("检测记录已写入: {}", self.path);
    Ok(())
  }
}
