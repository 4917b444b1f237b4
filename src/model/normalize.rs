// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/model/normalize.rs - 检测服务响应归一化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{Category, DetectResult, Detection, DetectionBox, DetectionProfile};

#[derive(Error, Debug)]
pub enum NormalizeError {
  /// 响应中完全没有 predictions 字段，视为软失败，
  /// 与传输错误区分开，便于界面提示“换一张更清晰的照片”。
  #[error("未检测到缺陷")]
  NoDetections,
  #[error("响应数据格式转换失败: {0}")]
  MalformedPayload(#[from] serde_json::Error),
}

/// 服务方单条预测。x/y 为框中心点坐标，宽高与坐标均为自然像素。
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
  pub x: Option<f64>,
  pub y: Option<f64>,
  pub width: Option<f64>,
  pub height: Option<f64>,
  pub confidence: Option<f64>,
  #[serde(rename = "class")]
  pub class_name: Option<String>,
}

/// 服务方响应。predictions 缺失属于契约违例，归一化时必须容忍。
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderResponse {
  pub predictions: Option<Vec<RawPrediction>>,
}

/// 类别判定。主类别需要关键词的确凿匹配；
/// 无法确凿匹配、或带有显式红色标记时一律判为次类别。
pub fn classify(profile: DetectionProfile, raw_class: &str, color: Option<&str>) -> Category {
  let class_name = raw_class.to_lowercase();
  let is_primary = profile.primary_exact().contains(&class_name.as_str())
    || class_name.contains(profile.primary_keyword());

  if is_primary && color != Some("red") {
    Category::Primary
  } else {
    Category::Secondary
  }
}

/// 将服务方预测列表转换为归一化检测结果。
///
/// 几何：中心坐标转左上角坐标并取整；缺失字段保持 None。
/// 置信度：换算为整数百分比；缺失或为 0 时视为无置信度数据。
/// 编号：各类别内部 1 起顺序编号，每次调用重新计数。
pub fn normalize(
  response: &ProviderResponse,
  profile: DetectionProfile,
) -> Result<DetectResult, NormalizeError> {
  let predictions = response
    .predictions
    .as_ref()
    .ok_or(NormalizeError::NoDetections)?;

  let mut primary_count = 0usize;
  let mut secondary_count = 0usize;

  let items = predictions
    .iter()
    .map(|prediction| {
      let raw_class = prediction
        .class_name
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
      let category = classify(profile, &raw_class, None);

      let label = match category {
        Category::Primary => {
          primary_count += 1;
          format!("{}-{}", profile.primary_label(), primary_count)
        }
        Category::Secondary => {
          secondary_count += 1;
          format!("{}-{}", profile.secondary_label(), secondary_count)
        }
      };

      let bbox = DetectionBox {
        x: prediction
          .x
          .map(|x| (x - prediction.width.unwrap_or(0.0) / 2.0).round() as i64),
        y: prediction
          .y
          .map(|y| (y - prediction.height.unwrap_or(0.0) / 2.0).round() as i64),
        width: prediction.width.map(|w| w.round() as i64),
        height: prediction.height.map(|h| h.round() as i64),
      };

      // 置信度 0 视为“无数据”，与缺失同样处理
      let confidence = prediction
        .confidence
        .filter(|c| *c > 0.0)
        .map(|c| (c * 100.0).round() as u32);

      Detection {
        label,
        confidence,
        bbox,
        category,
        raw_class,
      }
    })
    .collect::<Vec<_>>();

  debug!("归一化完成，共 {} 条检测", items.len());

  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(payload: &str) -> ProviderResponse {
    serde_json::from_str(payload).unwrap()
  }

  #[test]
  fn crack_prediction_becomes_secondary_red() {
    let response = parse(
      r#"{"predictions": [{"x": 100, "y": 200, "width": 50, "height": 30,
          "confidence": 0.95, "class": "crack"}]}"#,
    );
    let result = normalize(&response, DetectionProfile::Insulator).unwrap();

    assert_eq!(result.len(), 1);
    let detection = &result.items[0];
    assert_eq!(
      detection.bbox,
      DetectionBox {
        x: Some(75),
        y: Some(185),
        width: Some(50),
        height: Some(30),
      }
    );
    assert_eq!(detection.confidence, Some(95));
    assert_eq!(detection.category, Category::Secondary);
    assert_eq!(detection.color(), "red");
    assert_eq!(detection.label, "缺陷-1");
    assert_eq!(detection.raw_class, "crack");
  }

  #[test]
  fn empty_predictions_is_success() {
    let response = parse(r#"{"predictions": []}"#);
    let result = normalize(&response, DetectionProfile::Insulator).unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn missing_predictions_is_soft_failure() {
    let response = parse("{}");
    assert!(matches!(
      normalize(&response, DetectionProfile::Insulator),
      Err(NormalizeError::NoDetections)
    ));
  }

  #[test]
  fn zero_confidence_is_suppressed() {
    let response = parse(
      r#"{"predictions": [{"x": 10, "y": 10, "width": 4, "height": 4,
          "confidence": 0, "class": "insulator"}]}"#,
    );
    let result = normalize(&response, DetectionProfile::Insulator).unwrap();
    assert_eq!(result.items[0].confidence, None);
    assert_eq!(result.items[0].category, Category::Primary);
  }

  #[test]
  fn absent_geometry_fields_stay_none() {
    let response = parse(r#"{"predictions": [{"confidence": 0.5, "class": "insulator"}]}"#);
    let result = normalize(&response, DetectionProfile::Insulator).unwrap();
    let bbox = &result.items[0].bbox;
    assert!(!bbox.is_complete());
    assert_eq!(bbox.x, None);
    assert_eq!(bbox.width, None);
  }

  #[test]
  fn per_category_numbering_restarts_each_call() {
    let response = parse(
      r#"{"predictions": [
        {"x": 1, "y": 1, "width": 2, "height": 2, "confidence": 0.9, "class": "insulator"},
        {"x": 2, "y": 2, "width": 2, "height": 2, "confidence": 0.8, "class": "crack"},
        {"x": 3, "y": 3, "width": 2, "height": 2, "confidence": 0.7, "class": "insulators"}
      ]}"#,
    );

    let first = normalize(&response, DetectionProfile::Insulator).unwrap();
    let labels: Vec<_> = first.items.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["绝缘子-1", "缺陷-1", "绝缘子-2"]);

    // 幂等：同一载荷再次归一化，计数从头开始，结果完全一致
    let second = normalize(&response, DetectionProfile::Insulator).unwrap();
    assert_eq!(first.items, second.items);
  }

  #[test]
  fn classify_tie_break() {
    assert_eq!(
      classify(DetectionProfile::BirdNest, "birdnest-object", None),
      Category::Primary
    );
    assert_eq!(
      classify(DetectionProfile::BirdNest, "unknown", None),
      Category::Secondary
    );
    // 显式红色标记压过关键词匹配
    assert_eq!(
      classify(DetectionProfile::Insulator, "insulator", Some("red")),
      Category::Secondary
    );
  }

  #[test]
  fn nest_profile_labels() {
    let response = parse(
      r#"{"predictions": [
        {"x": 5, "y": 5, "width": 2, "height": 2, "confidence": 0.9, "class": "Nest"},
        {"x": 9, "y": 9, "width": 2, "height": 2, "confidence": 0.4, "class": "debris"}
      ]}"#,
    );
    let result = normalize(&response, DetectionProfile::BirdNest).unwrap();
    assert_eq!(result.items[0].label, "鸟巢-1");
    assert_eq!(result.items[0].category, Category::Primary);
    assert_eq!(result.items[1].label, "其他-1");
    assert_eq!(result.items[1].color(), "red");
  }
}
