// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use url::Url;

/// Xunta 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像
  /// 支持格式:
  /// - 图片文件: image:///path/to/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 检测模型网关
  /// 支持方案:
  /// - Roboflow 托管模型: roboflow://serverless.roboflow.com/model/2?api_key=KEY&profile=insulator
  /// - 自有后端: backend://api.example.com?auth=auto&profile=nest
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 标注图像输出
  /// 例如: image:///tmp/annotated.jpg?preview=960&font=/path/to/font.ttf
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 检测结果 JSON 记录（可选）
  /// 例如: record:///tmp/detections.json
  #[arg(long, value_name = "RECORD")]
  pub record: Option<Url>,
}
