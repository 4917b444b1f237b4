// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/output/save_image_file.rs - 保存叠加图像文件
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

use std::path::Path;

use image::imageops::FilterType;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::{Render, draw::Draw, scale::DisplayGeometry},
  picture::PreparedUpload,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("字体文件无效")]
  InvalidFont,
  #[error("预览宽度无效: {0}")]
  InvalidPreviewWidth(String),
}

/// 把检测结果叠加到图像上并保存。
///
/// 形如 `image:///path/out.jpg?preview=800&font=/path/font.ttf`：
/// `preview` 指定预览宽度（叠加框按显示几何换算），
/// `font` 提供标签字体，缺省时只画边框。
pub struct SaveImageFileOutput {
  path: String,
  preview_width: Option<u32>,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut preview_width = None;
    let mut draw = Draw::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "preview" => {
          preview_width = Some(
            value
              .parse()
              .map_err(|_| SaveImageFileError::InvalidPreviewWidth(value.into_owned()))?,
          );
        }
        "font" => {
          let font_data = std::fs::read(value.as_ref())?;
          draw =
            Draw::with_font_data(font_data).map_err(|_| SaveImageFileError::InvalidFont)?;
        }
        _ => {}
      }
    }

    Ok(SaveImageFileOutput {
      path: url.path().to_string(),
      preview_width,
      draw,
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;

    warn!("保存叠加图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<PreparedUpload, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    frame: &PreparedUpload,
    result: &DetectResult,
  ) -> Result<(), Self::Error> {
    let decoded = image::load_from_memory(&frame.bytes)?;

    // 预览宽度只缩小不放大；显示几何随目标画布重新计算
    let mut canvas = match self.preview_width {
      Some(preview) if preview < decoded.width() => {
        decoded.resize(preview, u32::MAX, FilterType::Lanczos3)
      }
      _ => decoded,
    }
    .into_rgb8();

    let geometry = DisplayGeometry {
      rendered_width: canvas.width() as f64,
      rendered_height: canvas.height() as f64,
      natural_width: frame.width as f64,
      natural_height: frame.height as f64,
    };

    self.draw.draw_detections(&mut canvas, result, &geometry);
    self.save_image(canvas)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Category, Detection, DetectionBox};

  #[test]
  fn scheme_and_query_parsing() {
    let url = Url::parse("image:///tmp/out.jpg?preview=800").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path, "/tmp/out.jpg");
    assert_eq!(output.preview_width, Some(800));

    let url = Url::parse("record:///tmp/out.json").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn renders_and_saves_annotated_image() {
    let dir = std::env::temp_dir().join("xunta-save-image-test");
    let path = dir.join("annotated.png");
    let _ = std::fs::remove_file(&path);

    let image = image::RgbImage::from_pixel(64, 64, image::Rgb([0, 0, 0]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
      .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
      .unwrap();
    let frame = PreparedUpload {
      name: "in.png".to_string(),
      mime: "image/png".to_string(),
      bytes,
      width: 64,
      height: 64,
    };

    let result = DetectResult {
      items: vec![Detection {
        label: "绝缘子-1".to_string(),
        confidence: Some(90),
        bbox: DetectionBox {
          x: Some(8),
          y: Some(8),
          width: Some(16),
          height: Some(16),
        },
        category: Category::Primary,
        raw_class: "insulator".to_string(),
      }]
      .into_boxed_slice(),
    };

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    output.render_result(&frame, &result).unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(*saved.get_pixel(8, 8), image::Rgb([0, 0, 255]));
  }
}
