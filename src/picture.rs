// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/picture.rs - 上传图像定义
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

/// 用户选择的原始图像文件，字节缓冲随所有权一起转移。
#[derive(Debug, Clone)]
pub struct UploadFile {
  pub name: String,
  pub mime: String,
  pub bytes: Vec<u8>,
}

impl UploadFile {
  pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      name: name.into(),
      mime: mime.into(),
      bytes,
    }
  }

  /// 文件大小（字节）
  pub fn size(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_image(&self) -> bool {
    self.mime.starts_with("image/")
  }
}

/// 预处理完成、可直接发送的图像。
/// 宽高为图像的自然尺寸（像素），用于后续叠加框的比例换算。
#[derive(Debug, Clone)]
pub struct PreparedUpload {
  pub name: String,
  pub mime: String,
  pub bytes: Vec<u8>,
  pub width: u32,
  pub height: u32,
}

impl PreparedUpload {
  pub fn size(&self) -> usize {
    self.bytes.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mime_gate() {
    let file = UploadFile::new("a.jpg", "image/jpeg", vec![0u8; 4]);
    assert!(file.is_image());
    assert_eq!(file.size(), 4);

    let file = UploadFile::new("a.pdf", "application/pdf", vec![]);
    assert!(!file.is_image());
  }
}
