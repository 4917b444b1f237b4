// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use xunta::{
  FromUrl,
  error::DetectError,
  input::{ImageFileInput, PrepareLimits, prepare_for_upload},
  model::{Model, ModelWrapper},
  output::{OutputWrapper, Render},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("检测模型: {}", args.model);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let record = args
    .record
    .as_ref()
    .map(|url| OutputWrapper::from_url(url))
    .transpose()?;

  let limits = PrepareLimits::default();

  info!("开始检测...");
  let now = std::time::Instant::now();
  for file in input {
    let name = file.name.clone();
    // 渲染需要预处理后的帧，因此在检测门面之外单独预处理一次
    let prepared = match prepare_for_upload(file, &limits).map_err(DetectError::from) {
      Ok(prepared) => prepared,
      Err(err) => {
        error!("{}", err.user_message());
        return Err(err.into());
      }
    };
    let result = match model.infer(&prepared).map_err(DetectError::from) {
      Ok(result) => result,
      Err(err) => {
        error!("{}", err.user_message());
        return Err(err.into());
      }
    };
    let elapsed = now.elapsed();
    info!("检测完成，耗时: {:.2?}", elapsed);
    info!("{}: 检测到 {} 个目标", name, result.len());
    for detection in result.items.iter() {
      match detection.confidence {
        Some(confidence) => info!("  - {} ({}%)", detection.label, confidence),
        None => info!("  - {}", detection.label),
      }
    }

    output.render_result(&prepared, &result)?;
    if let Some(record) = &record {
      record.render_result(&prepared, &result)?;
    }
  }

  Ok(())
}
