// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, picture::UploadFile};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 从本地文件加载待检测图像。
/// MIME 类型由文件内容的魔数推断，推断失败时回退为 application/octet-stream，
/// 由预处理阶段统一做类型校验。
pub struct ImageFileInput {
  file: Option<UploadFile>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let path = url.path();
    let bytes = std::fs::read(path)?;

    let mime = image::guess_format(&bytes)
      .map(|format| format.to_mime_type())
      .unwrap_or("application/octet-stream");
    debug!("读取文件 {} ({} 字节, {})", path, bytes.len(), mime);

    let name = Path::new(path)
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.to_string());

    Ok(ImageFileInput {
      file: Some(UploadFile::new(name, mime, bytes)),
    })
  }
}

impl ImageFileInput {
  pub fn into_upload(mut self) -> Option<UploadFile> {
    self.file.take()
  }
}

impl Iterator for ImageFileInput {
  type Item = UploadFile;

  fn next(&mut self) -> Option<Self::Item> {
    self.file.take()
  }
}
