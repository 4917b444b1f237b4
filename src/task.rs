// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/task.rs - 检测任务编排
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

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::{
  error::DetectError,
  input::{PrepareLimits, prepare_for_upload},
  model::{DetectResult, Model, ModelError},
  output::Render,
  picture::{PreparedUpload, UploadFile},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 单张图像的完整检测运行：预处理、远端推理、渲染输出。
#[derive(Default)]
pub struct OneShotTask {
  limits: PrepareLimits,
}

impl OneShotTask {
  pub fn with_limits(mut self, limits: PrepareLimits) -> Self {
    self.limits = limits;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = UploadFile>,
  M: Model<Input = PreparedUpload, Output = DetectResult, Error = ME>,
  O: Render<PreparedUpload, DetectResult, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let file = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始预处理...");
    let prepared = prepare_for_upload(file, &self.limits)?;

    info!("预处理完成，开始远端推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&prepared)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);

    for detection in result.items.iter() {
      match detection.confidence {
        Some(confidence) => info!("  - {} ({}%)", detection.label, confidence),
        None => info!("  - {}", detection.label),
      }
    }

    output.render_result(&prepared, &result)?;
    info!("渲染完成");

    Ok(())
  }
}

/// 界面层消费的单一异步面：一次检测要么得到结果列表，
/// 要么以错误分类中的恰好一类失败。
pub fn detect<ME, M>(
  file: UploadFile,
  limits: &PrepareLimits,
  model: &M,
) -> Result<DetectResult, DetectError>
where
  ME: Into<ModelError>,
  M: Model<Input = PreparedUpload, Output = DetectResult, Error = ME>,
{
  let prepared = prepare_for_upload(file, limits)?;
  model
    .infer(&prepared)
    .map_err(|err| DetectError::ModelError(err.into()))
}

/// 检测运行的代次计数。
///
/// 流水线不支持取消：连续上传时旧调用仍会完成，
/// 迟到的旧结果必须被丢弃而不是覆盖新结果。
/// 每次新运行从 `begin` 取令牌，提交时校验令牌是否仍是最新代次。
#[derive(Debug, Default)]
pub struct DetectSession {
  generation: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken {
  generation: u64,
}

impl DetectSession {
  pub fn new() -> Self {
    Self::default()
  }

  /// 开始新一轮检测，之前发出的令牌随即全部过期
  pub fn begin(&self) -> RunToken {
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    RunToken { generation }
  }

  pub fn is_current(&self, token: &RunToken) -> bool {
    token.generation == self.generation.load(Ordering::SeqCst)
  }

  /// 提交一轮检测的结果；令牌过期时丢弃并返回 None
  pub fn commit<T>(&self, token: &RunToken, value: T) -> Option<T> {
    if self.is_current(token) {
      Some(value)
    } else {
      info!("丢弃过期检测结果（代次 {}）", token.generation);
      None
    }
  }
}
