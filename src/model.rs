// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::Serialize;
use thiserror::Error;

use crate::FromUrl;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 检测目标的两分类：主类别为巡检目标本体，次类别为异常或其他。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
  Primary,
  Secondary,
}

impl Category {
  /// 叠加框的固定配色：主类别蓝色，次类别红色
  pub fn color(&self) -> &'static str {
    match self {
      Category::Primary => "blue",
      Category::Secondary => "red",
    }
  }

  pub fn rgb(&self) -> [u8; 3] {
    match self {
      Category::Primary => [0, 0, 255],
      Category::Secondary => [255, 0, 0],
    }
  }
}

/// 检测框，自然像素坐标，左上角为原点。
/// 服务方未给出某个字段时对应字段为 None。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionBox {
  pub x: Option<i64>,
  pub y: Option<i64>,
  pub width: Option<i64>,
  pub height: Option<i64>,
}

impl DetectionBox {
  pub fn is_complete(&self) -> bool {
    self.x.is_some() && self.y.is_some() && self.width.is_some() && self.height.is_some()
  }
}

/// 单条归一化检测结果。屏幕坐标永远不在这里存储，
/// 叠加渲染时由 (bbox, DisplayGeometry) 即时换算。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// 展示编号，按类别 1 起计数，如 “绝缘子-1”、“缺陷-1”
  pub label: String,
  /// 置信度百分比；服务方未给出或为 0 时为 None
  pub confidence: Option<u32>,
  pub bbox: DetectionBox,
  pub category: Category,
  /// 服务方返回的原始类别字符串（已转小写）
  pub raw_class: String,
}

impl Detection {
  pub fn color(&self) -> &'static str {
    self.category.color()
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// 检测场景：决定远端模型与类别关键词。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionProfile {
  /// 绝缘子缺陷检测
  Insulator,
  /// 鸟巢检测
  BirdNest,
}

impl DetectionProfile {
  /// 主类别的精确匹配词
  pub fn primary_exact(&self) -> &'static [&'static str] {
    match self {
      DetectionProfile::Insulator => &["insulator", "insulators"],
      DetectionProfile::BirdNest => &["nest", "birdnest"],
    }
  }

  /// 主类别的包含匹配词
  pub fn primary_keyword(&self) -> &'static str {
    match self {
      DetectionProfile::Insulator => "insulator",
      DetectionProfile::BirdNest => "nest",
    }
  }

  pub fn primary_label(&self) -> &'static str {
    match self {
      DetectionProfile::Insulator => "绝缘子",
      DetectionProfile::BirdNest => "鸟巢",
    }
  }

  pub fn secondary_label(&self) -> &'static str {
    match self {
      DetectionProfile::Insulator => "缺陷",
      DetectionProfile::BirdNest => "其他",
    }
  }
}

impl std::str::FromStr for DetectionProfile {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "insulator" => Ok(DetectionProfile::Insulator),
      "nest" | "birdnest" => Ok(DetectionProfile::BirdNest),
      other => Err(format!("未知的检测场景: {}", other)),
    }
  }
}

pub mod normalize;
pub use self::normalize::{NormalizeError, ProviderResponse, RawPrediction, normalize};

pub mod auth;
pub use self::auth::{AuthError, AuthStrategy, AutoRegisterAuth, StubAuth};

#[cfg(feature = "model_roboflow")]
mod roboflow;
#[cfg(feature = "model_roboflow")]
pub use self::roboflow::{RoboflowBuilder, RoboflowError, RoboflowModel};

#[cfg(feature = "model_backend")]
mod backend;
#[cfg(feature = "model_backend")]
pub use self::backend::{BackendBuilder, BackendError, BackendModel};

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_roboflow")]
  #[error("Roboflow 检测错误: {0}")]
  RoboflowError(#[from] RoboflowError),
  #[cfg(feature = "model_backend")]
  #[error("后端检测错误: {0}")]
  BackendError(#[from] BackendError),
  #[error("结果归一化错误: {0}")]
  NormalizeError(#[from] NormalizeError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum ModelWrapper {
  #[cfg(feature = "model_roboflow")]
  Roboflow(RoboflowModel),
  #[cfg(feature = "model_backend")]
  Backend(BackendModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_roboflow")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == RoboflowBuilder::SCHEME {
        let model = RoboflowBuilder::from_url(url)?.build();
        return Ok(ModelWrapper::Roboflow(model));
      }
    }
    #[cfg(feature = "model_backend")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == BackendBuilder::SCHEME {
        let model = BackendBuilder::from_url(url)?.build();
        return Ok(ModelWrapper::Backend(model));
      }
    }

    Err(ModelError::SchemeMismatch)
  }
}

impl Model for ModelWrapper {
  type Input = crate::picture::PreparedUpload;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      #[cfg(feature = "model_roboflow")]
      ModelWrapper::Roboflow(model) => Ok(model.infer(input)?),
      #[cfg(feature = "model_backend")]
      ModelWrapper::Backend(model) => Ok(model.infer(input)?),
      #[allow(unreachable_patterns)]
      _ => Err(ModelError::SchemeMismatch),
    }
  }
}
