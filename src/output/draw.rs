// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/output/draw.rs - 检测结果叠加绘制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use tracing::debug;

use crate::{
  model::{DetectResult, Detection},
  output::scale::{DisplayGeometry, scale_box},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BORDER_THICKNESS: i32 = 2;

/// 在图像上绘制检测叠加层。
/// 未提供字体时只画边框，提供字体时额外绘制编号与置信度标签。
pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font: None,
    }
  }
}

impl Draw {
  pub fn with_font_data(font_data: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
    let font = FontVec::try_from_vec(font_data)?;
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  /// 绘制全部检测框。几何参数描述目标画布相对自然尺寸的缩放，
  /// 框坐标在这里即时换算，不依赖任何预先存储的屏幕坐标。
  pub fn draw_detections(
    &self,
    image: &mut RgbImage,
    result: &DetectResult,
    geometry: &DisplayGeometry,
  ) {
    for detection in result.items.iter() {
      self.draw_one(image, detection, geometry);
    }
  }

  fn draw_one(&self, image: &mut RgbImage, detection: &Detection, geometry: &DisplayGeometry) {
    let screen = scale_box(&detection.bbox, geometry);
    let (Some(x), Some(y), Some(box_w), Some(box_h)) =
      (screen.x, screen.y, screen.width, screen.height)
    else {
      // 服务方未给全几何信息的检测无法绘制
      debug!("跳过无几何信息的检测: {}", detection.label);
      return;
    };

    let (w, h) = (image.width() as i32, image.height() as i32);
    let color = Rgb(detection.category.rgb());

    let mut x_min = x.floor() as i32;
    let mut y_min = y.floor() as i32;
    let mut x_max = (x + box_w).ceil() as i32;
    let mut y_max = (y + box_h).ceil() as i32;

    // Clamp to image bounds
    x_min = x_min.clamp(0, w - 1);
    y_min = y_min.clamp(0, h - 1);
    x_max = x_max.clamp(0, w - 1);
    y_max = y_max.clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for thickness in 0..BORDER_THICKNESS {
      let x_min_t = (x_min + thickness).min(w - 1);
      let y_min_t = (y_min + thickness).min(h - 1);
      let x_max_t = (x_max - thickness).max(0);
      let y_max_t = (y_max - thickness).max(0);

      // Top and bottom edges
      for x in x_min_t..=x_max_t {
        *image.get_pixel_mut(x as u32, y_min_t as u32) = color;
        *image.get_pixel_mut(x as u32, y_max_t as u32) = color;
      }

      // Left and right edges
      for y in y_min_t..=y_max_t {
        *image.get_pixel_mut(x_min_t as u32, y as u32) = color;
        *image.get_pixel_mut(x_max_t as u32, y as u32) = color;
      }
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    // 标签文本：编号与置信度，置信度缺失时只写编号
    let label = match detection.confidence {
      Some(confidence) => format!("{} {}%", detection.label, confidence),
      None => detection.label.clone(),
    };

    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]);

    // 估算文本大小（粗略估计）
    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签背景放在边框上方
    let label_x = x_min.max(0);
    let label_y = (y_min - text_height).max(0);

    let max_width = (w - label_x).max(0);
    let label_width = text_width.min(max_width) as u32;
    let label_height = text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect = imageproc::rect::Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);

      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        font,
        &label,
      );
    }
  }
}
