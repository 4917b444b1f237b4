// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/error.rs - 错误分类与用户可读文案
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

use thiserror::Error;

use crate::input::PrepareError;
use crate::model::{ModelError, NormalizeError};

/// 检测流水线的错误类别。
/// 一次检测要么得到结果列表，要么失败为其中恰好一类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// 选择了非图像文件，本地拒绝
  InvalidFileType,
  /// 超过上传硬上限，本地拒绝
  FileTooLarge,
  /// 解码或重编码失败
  CompressionFailed,
  /// 超时、网络故障、非 2xx 状态等传输层问题
  Transport,
  /// 响应缺少 predictions 字段的软失败
  NoDetections,
  /// 注册-登录引导序列失败
  BootstrapAuthFailed,
}

/// 跨越到界面层的唯一错误形态：类别加一段人类可读文案。
/// 任何内部错误类型都不会越过这条边界。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacing {
  pub kind: ErrorKind,
  pub message: String,
}

/// 一次检测运行的失败。对进程永远不是致命的：
/// 每次失败只影响当次尝试，应用随时可以再来一次。
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("图像预处理错误: {0}")]
  PrepareError(#[from] PrepareError),
  #[error("检测错误: {0}")]
  ModelError(#[from] ModelError),
}

impl DetectError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      DetectError::PrepareError(err) => match err {
        PrepareError::InvalidFileType(_) => ErrorKind::InvalidFileType,
        PrepareError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
        PrepareError::CompressionFailed(_) => ErrorKind::CompressionFailed,
      },
      DetectError::ModelError(err) => model_kind(err),
    }
  }

  pub fn user_facing(&self) -> UserFacing {
    UserFacing {
      kind: self.kind(),
      message: self.user_message(),
    }
  }

  pub fn user_message(&self) -> String {
    match self {
      DetectError::PrepareError(err) => match err {
        PrepareError::InvalidFileType(mime) => {
          format!("请选择图片文件（当前类型: {}）", mime)
        }
        PrepareError::FileTooLarge { size, limit } => format!(
          "图片过大: {:.1} MB，上限 {:.0} MB",
          *size as f64 / (1024.0 * 1024.0),
          *limit as f64 / (1024.0 * 1024.0)
        ),
        PrepareError::CompressionFailed(_) => "图片压缩失败，请换一张图片重试".to_string(),
      },
      DetectError::ModelError(err) => model_message(err),
    }
  }
}

fn model_kind(err: &ModelError) -> ErrorKind {
  match err {
    #[cfg(feature = "model_roboflow")]
    ModelError::RoboflowError(err) => match err {
      crate::model::RoboflowError::NormalizeError(inner) => normalize_kind(inner),
      _ => ErrorKind::Transport,
    },
    #[cfg(feature = "model_backend")]
    ModelError::BackendError(err) => match err {
      crate::model::BackendError::AuthFailed(_) => ErrorKind::BootstrapAuthFailed,
      crate::model::BackendError::NormalizeError(inner) => normalize_kind(inner),
      _ => ErrorKind::Transport,
    },
    ModelError::NormalizeError(inner) => normalize_kind(inner),
    ModelError::SchemeMismatch => ErrorKind::Transport,
  }
}

fn normalize_kind(err: &NormalizeError) -> ErrorKind {
  match err {
    NormalizeError::NoDetections => ErrorKind::NoDetections,
    // 载荷无法解析按契约违例处理，归入传输层问题
    NormalizeError::MalformedPayload(_) => ErrorKind::Transport,
  }
}

fn model_message(err: &ModelError) -> String {
  match err {
    #[cfg(feature = "model_roboflow")]
    ModelError::RoboflowError(err) => match err {
      crate::model::RoboflowError::Status(code) => status_message(*code),
      crate::model::RoboflowError::Transport(inner) => transport_message(inner),
      crate::model::RoboflowError::NormalizeError(inner) => normalize_message(inner),
      other => other.to_string(),
    },
    #[cfg(feature = "model_backend")]
    ModelError::BackendError(err) => match err {
      crate::model::BackendError::AuthFailed(inner) => format!("认证失败: {}", inner),
      crate::model::BackendError::Status(code) => status_message(*code),
      crate::model::BackendError::Transport(inner) => transport_message(inner),
      crate::model::BackendError::NormalizeError(inner) => normalize_message(inner),
      other => other.to_string(),
    },
    ModelError::NormalizeError(inner) => normalize_message(inner),
    ModelError::SchemeMismatch => "检测服务配置无效".to_string(),
  }
}

fn status_message(code: u16) -> String {
  match code {
    401 => "未认证，请先登录".to_string(),
    403 => "权限不足".to_string(),
    404 => "资源不存在".to_string(),
    500 => "服务器内部错误".to_string(),
    other => format!("检测服务返回状态 {}", other),
  }
}

fn transport_message(err: &ureq::Error) -> String {
  let text = err.to_string();
  if text.contains("timed out") || text.contains("timeout") {
    return "请求超时，请重试".to_string();
  }
  if text.contains("CORS") {
    return "跨域请求被阻止，请检查服务器配置".to_string();
  }
  match err.kind() {
    ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
      "网络连接失败，请检查网络连接".to_string()
    }
    _ => format!("网络传输错误: {}", text),
  }
}

fn normalize_message(err: &NormalizeError) -> String {
  match err {
    NormalizeError::NoDetections => "未检测到缺陷，请尝试使用更清晰的照片".to_string(),
    NormalizeError::MalformedPayload(_) => "响应数据格式转换失败".to_string(),
  }
}
