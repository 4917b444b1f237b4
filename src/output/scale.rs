// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/output/scale.rs - 显示坐标换算
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

use crate::model::DetectionBox;

/// 图像加载时捕获的显示几何：渲染尺寸与自然尺寸。
/// 每次图像重新加载（换图、布局变化）都应重新取值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
  pub rendered_width: f64,
  pub rendered_height: f64,
  pub natural_width: f64,
  pub natural_height: f64,
}

impl DisplayGeometry {
  /// 渲染尺寸与自然尺寸一致的恒等几何
  pub fn natural(width: u32, height: u32) -> Self {
    Self {
      rendered_width: width as f64,
      rendered_height: height as f64,
      natural_width: width as f64,
      natural_height: height as f64,
    }
  }

  pub fn with_rendered(mut self, width: f64, height: f64) -> Self {
    self.rendered_width = width;
    self.rendered_height = height;
    self
  }

  /// 横纵缩放比。自然尺寸未知（为 0）时回退为 1，避免除零。
  pub fn scale_factors(&self) -> (f64, f64) {
    if self.natural_width > 0.0 && self.natural_height > 0.0 {
      (
        self.rendered_width / self.natural_width,
        self.rendered_height / self.natural_height,
      )
    } else {
      (1.0, 1.0)
    }
  }
}

/// 屏幕坐标下的检测框。只在渲染时即时产生，从不落地存储。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenBox {
  pub x: Option<f64>,
  pub y: Option<f64>,
  pub width: Option<f64>,
  pub height: Option<f64>,
}

impl ScreenBox {
  pub fn is_complete(&self) -> bool {
    self.x.is_some() && self.y.is_some() && self.width.is_some() && self.height.is_some()
  }
}

/// 将自然像素坐标的检测框换算到屏幕坐标。
pub fn scale_box(bbox: &DetectionBox, geometry: &DisplayGeometry) -> ScreenBox {
  let (scale_x, scale_y) = geometry.scale_factors();
  ScreenBox {
    x: bbox.x.map(|x| x as f64 * scale_x),
    y: bbox.y.map(|y| y as f64 * scale_y),
    width: bbox.width.map(|w| w as f64 * scale_x),
    height: bbox.height.map(|h| h as f64 * scale_y),
  }
}
