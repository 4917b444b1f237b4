// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/input/prepare.rs - 上传前图像预处理（类型校验、缩放与压缩）
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::Cursor;

use image::{ImageFormat, ImageReader, codecs::jpeg::JpegEncoder, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};

use crate::picture::{PreparedUpload, UploadFile};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const COMPRESS_THRESHOLD_BYTES: usize = 3 * 1024 * 1024;
const MAX_WIDTH: u32 = 2560;
const MAX_HEIGHT: u32 = 1440;
const QUALITY_START: u8 = 90;
const QUALITY_FLOOR: u8 = 30;
const QUALITY_STEP: u8 = 5;

#[derive(Error, Debug)]
pub enum PrepareError {
  #[error("文件类型无效: {0}")]
  InvalidFileType(String),
  #[error("文件过大: {size} 字节，上限 {limit} 字节")]
  FileTooLarge { size: usize, limit: usize },
  #[error("图像压缩失败: {0}")]
  CompressionFailed(#[from] image::ImageError),
}

/// 预处理阈值配置。默认值与现有前端行为保持一致，不可随意调整。
#[derive(Debug, Clone)]
pub struct PrepareLimits {
  /// 上传硬上限，超过直接拒绝
  pub max_upload_bytes: usize,
  /// 触发压缩的阈值，同时也是压缩目标大小
  pub compress_threshold_bytes: usize,
  /// 压缩时的最大宽度
  pub max_width: u32,
  /// 压缩时的最大高度
  pub max_height: u32,
  /// JPEG 起始质量（百分比）
  pub quality_start: u8,
  /// JPEG 质量下限
  pub quality_floor: u8,
  /// 每轮降低的质量步长
  pub quality_step: u8,
}

impl Default for PrepareLimits {
  fn default() -> Self {
    Self {
      max_upload_bytes: MAX_UPLOAD_BYTES,
      compress_threshold_bytes: COMPRESS_THRESHOLD_BYTES,
      max_width: MAX_WIDTH,
      max_height: MAX_HEIGHT,
      quality_start: QUALITY_START,
      quality_floor: QUALITY_FLOOR,
      quality_step: QUALITY_STEP,
    }
  }
}

/// 校验并按需压缩待上传图像。
///
/// 小于压缩阈值的文件原样通过；超过阈值的文件先等比缩放到最大尺寸以内，
/// 再按质量阶梯重新编码为 JPEG，直到体积达标或质量触底。
/// 文件名始终保留；原文件为 JPEG 时 MIME 亦保持不变。
pub fn prepare_for_upload(
  file: UploadFile,
  limits: &PrepareLimits,
) -> Result<PreparedUpload, PrepareError> {
  if !file.is_image() {
    return Err(PrepareError::InvalidFileType(file.mime));
  }

  if file.size() > limits.max_upload_bytes {
    return Err(PrepareError::FileTooLarge {
      size: file.size(),
      limit: limits.max_upload_bytes,
    });
  }

  let source_format = image::guess_format(&file.bytes)?;

  if file.size() <= limits.compress_threshold_bytes {
    let (width, height) = ImageReader::new(Cursor::new(&file.bytes))
      .with_guessed_format()
      .map_err(image::ImageError::IoError)?
      .into_dimensions()?;
    debug!(
      "文件大小正常，无需压缩: {:.2} KB ({}x{})",
      file.size() as f64 / 1024.0,
      width,
      height
    );
    return Ok(PreparedUpload {
      name: file.name,
      mime: file.mime,
      bytes: file.bytes,
      width,
      height,
    });
  }

  info!("文件过大，开始压缩: {:.2} KB", file.size() as f64 / 1024.0);

  let decoded = image::load_from_memory(&file.bytes)?;
  let decoded = if decoded.width() > limits.max_width || decoded.height() > limits.max_height {
    // 等比缩放到边界以内，不放大图片
    decoded.resize(limits.max_width, limits.max_height, FilterType::Lanczos3)
  } else {
    decoded
  };
  let (width, height) = (decoded.width(), decoded.height());

  let mut quality = limits.quality_start;
  let bytes = loop {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    decoded.write_with_encoder(encoder)?;

    debug!(
      "质量 {}%: {:.2} KB",
      quality,
      buffer.len() as f64 / 1024.0
    );

    if buffer.len() <= limits.compress_threshold_bytes || quality <= limits.quality_floor {
      break buffer;
    }
    quality = quality.saturating_sub(limits.quality_step);
  };

  info!(
    "压缩完成: 原始 {:.2} KB, 压缩后 {:.2} KB, 质量 {}%, 尺寸 {}x{}",
    file.size() as f64 / 1024.0,
    bytes.len() as f64 / 1024.0,
    quality,
    width,
    height
  );

  // 质量阶梯始终产出 JPEG；原文件即为 JPEG 时 MIME 保持不变
  let mime = if source_format == ImageFormat::Jpeg {
    file.mime
  } else {
    ImageFormat::Jpeg.to_mime_type().to_string()
  };

  Ok(PreparedUpload {
    name: file.name,
    mime,
    bytes,
    width,
    height,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{Rng, SeedableRng, rngs::StdRng};

  // 噪声图几乎不可压缩，用于逼出质量阶梯的完整路径
  fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(42);
    let image = image::RgbImage::from_fn(width, height, |_, _| {
      image::Rgb([rng.r#gen(), rng.r#gen(), rng.r#gen()])
    });
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, 95);
    image::DynamicImage::ImageRgb8(image)
      .write_with_encoder(encoder)
      .unwrap();
    buffer
  }

  fn tiny_limits() -> PrepareLimits {
    PrepareLimits {
      max_upload_bytes: 1024 * 1024,
      compress_threshold_bytes: 8 * 1024,
      max_width: 128,
      max_height: 72,
      ..PrepareLimits::default()
    }
  }

  #[test]
  fn rejects_non_image() {
    let file = UploadFile::new("a.pdf", "application/pdf", vec![1, 2, 3]);
    assert!(matches!(
      prepare_for_upload(file, &PrepareLimits::default()),
      Err(PrepareError::InvalidFileType(_))
    ));
  }

  #[test]
  fn rejects_over_hard_cap() {
    let limits = PrepareLimits {
      max_upload_bytes: 16,
      ..PrepareLimits::default()
    };
    let file = UploadFile::new("a.jpg", "image/jpeg", vec![0u8; 17]);
    assert!(matches!(
      prepare_for_upload(file, &limits),
      Err(PrepareError::FileTooLarge { size: 17, .. })
    ));
  }

  #[test]
  fn passes_through_small_file() {
    let bytes = noise_jpeg(32, 32);
    let file = UploadFile::new("small.jpg", "image/jpeg", bytes.clone());
    let limits = PrepareLimits {
      compress_threshold_bytes: bytes.len(),
      ..PrepareLimits::default()
    };

    let prepared = prepare_for_upload(file, &limits).unwrap();
    assert_eq!(prepared.bytes, bytes);
    assert_eq!(prepared.name, "small.jpg");
    assert_eq!(prepared.mime, "image/jpeg");
    assert_eq!((prepared.width, prepared.height), (32, 32));
  }

  #[test]
  fn compresses_oversized_jpeg_to_budget_or_floor() {
    let bytes = noise_jpeg(640, 360);
    let limits = tiny_limits();
    assert!(bytes.len() > limits.compress_threshold_bytes);

    let file = UploadFile::new("big.jpg", "image/jpeg", bytes);
    let prepared = prepare_for_upload(file, &limits).unwrap();

    // 要么达到体积预算，要么质量已触底；无论哪条路径产物都必须可解码
    let decoded = image::load_from_memory(&prepared.bytes).unwrap();
    assert_eq!(decoded.width(), prepared.width);
    assert_eq!(prepared.name, "big.jpg");
    assert_eq!(prepared.mime, "image/jpeg");
    assert!(prepared.width <= limits.max_width);
    assert!(prepared.height <= limits.max_height);
  }

  #[test]
  fn scales_down_preserving_aspect_ratio() {
    let bytes = noise_jpeg(640, 360);
    let limits = tiny_limits();
    let file = UploadFile::new("wide.jpg", "image/jpeg", bytes);

    let prepared = prepare_for_upload(file, &limits).unwrap();
    // 640x360 在 128x72 内等比缩放后恰为 128x72
    assert_eq!((prepared.width, prepared.height), (128, 72));
  }

  #[test]
  fn corrupt_image_is_compression_failure() {
    let mut bytes = noise_jpeg(64, 64);
    bytes.truncate(64); // 保留 JPEG 魔数，破坏其余数据
    let limits = PrepareLimits {
      compress_threshold_bytes: 8,
      ..PrepareLimits::default()
    };
    let file = UploadFile::new("broken.jpg", "image/jpeg", bytes);
    assert!(matches!(
      prepare_for_upload(file, &limits),
      Err(PrepareError::CompressionFailed(_))
    ));
  }
}
