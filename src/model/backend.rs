// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/model/backend.rs - 自有后端检测网关
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    AuthError, AuthStrategy, AutoRegisterAuth, DetectResult, DetectionProfile, Model,
    NormalizeError, ProviderResponse, StubAuth, normalize,
  },
  picture::PreparedUpload,
};

const DETECT_TIMEOUT: Duration = Duration::from_secs(30);

const BACKEND_SCHEME: &str = "backend";

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("后端地址必须使用 backend 方案")]
  SchemeMismatch,
  #[error("后端地址无效: {0}")]
  InvalidEndpoint(String),
  #[error("认证失败: {0}")]
  AuthFailed(#[from] AuthError),
  #[error("检测服务返回状态 {0}")]
  Status(u16),
  #[error("网络传输错误: {0}")]
  Transport(Box<ureq::Error>),
  #[error("读取响应失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("归一化错误: {0}")]
  NormalizeError(#[from] NormalizeError),
}

impl From<ureq::Error> for BackendError {
  fn from(err: ureq::Error) -> Self {
    match err {
      ureq::Error::Status(code, _) => BackendError::Status(code),
      other => BackendError::Transport(Box::new(other)),
    }
  }
}

/// 从 URL 构造后端网关。
///
/// 形如 `backend://<host>?profile=insulator&auth=auto`；
/// `auth=stub&token=…` 选择调试桩，`auth=auto`（默认）走自动注册流程。
pub struct BackendBuilder {
  base: Url,
  profile: DetectionProfile,
  auth: Box<dyn AuthStrategy>,
}

impl FromUrlWithScheme for BackendBuilder {
  const SCHEME: &'static str = BACKEND_SCHEME;
}

impl FromUrl for BackendBuilder {
  type Error = BackendError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BackendError::SchemeMismatch);
    }

    let host = url
      .host_str()
      .ok_or_else(|| BackendError::InvalidEndpoint("缺少主机名".to_string()))?;
    let base = Url::parse(&format!("https://{}", host))
      .map_err(|e| BackendError::InvalidEndpoint(e.to_string()))?;

    let mut profile = DetectionProfile::Insulator;
    let mut auth_kind = "auto".to_string();
    let mut stub_token = "debug-token".to_string();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "profile" => {
          profile = value.parse().map_err(BackendError::InvalidEndpoint)?;
        }
        "auth" => auth_kind = value.into_owned(),
        "token" => stub_token = value.into_owned(),
        _ => {}
      }
    }

    // 认证策略在这里一次性选定，调试旁路不会与真实流程同时存在
    let auth: Box<dyn AuthStrategy> = match auth_kind.as_str() {
      "stub" => {
        warn!("使用调试认证桩，不适用于生产环境");
        Box::new(StubAuth::new(stub_token))
      }
      "auto" => Box::new(AutoRegisterAuth::new(base.clone())),
      other => {
        return Err(BackendError::InvalidEndpoint(format!(
          "未知认证策略: {}",
          other
        )));
      }
    };

    Ok(BackendBuilder {
      base,
      profile,
      auth,
    })
  }
}

impl BackendBuilder {
  pub fn auth(mut self, auth: Box<dyn AuthStrategy>) -> Self {
    self.auth = auth;
    self
  }

  pub fn build(self) -> BackendModel {
    let agent = ureq::AgentBuilder::new().timeout(DETECT_TIMEOUT).build();
    info!("后端检测端点: {} ({:?})", self.base, self.profile);
    BackendModel {
      base: self.base,
      profile: self.profile,
      auth: self.auth,
      agent,
    }
  }
}

/// 自有后端检测网关：凭证由认证策略按需建立，
/// 服务端返回 401 时丢弃凭证，下一次调用重新认证。
pub struct BackendModel {
  base: Url,
  profile: DetectionProfile,
  auth: Box<dyn AuthStrategy>,
  agent: ureq::Agent,
}

impl BackendModel {
  fn endpoint(&self) -> String {
    format!("{}api/v0/detect", self.base)
  }
}

impl Model for BackendModel {
  type Input = PreparedUpload;
  type Output = DetectResult;
  type Error = BackendError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let token = self.auth.token()?;
    let encoded = BASE64.encode(&input.bytes);
    debug!("上传 {} ({:.2} KB)", input.name, input.size() as f64 / 1024.0);

    let response = self
      .agent
      .post(&self.endpoint())
      .set("Authorization", &format!("Bearer {}", token))
      .send_json(ureq::json!({ "imageBase64": encoded }));

    let response = match response {
      Ok(response) => response,
      Err(ureq::Error::Status(401, _)) => {
        // 凭证失效：丢弃后上抛，下一次调用会重新走自动认证
        self.auth.invalidate();
        return Err(BackendError::Status(401));
      }
      Err(err) => return Err(err.into()),
    };

    let payload = response.into_string()?;
    let parsed: ProviderResponse =
      serde_json::from_str(&payload).map_err(NormalizeError::MalformedPayload)?;

    let result = normalize(&parsed, self.profile)?;
    info!("检测完成，共 {} 条结果", result.len());
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builds_with_stub_auth() {
    let url =
      Url::parse("backend://api.example.com?profile=nest&auth=stub&token=tt").unwrap();
    let builder = BackendBuilder::from_url(&url).unwrap();
    assert_eq!(builder.profile, DetectionProfile::BirdNest);
    assert_eq!(builder.base.as_str(), "https://api.example.com/");
    assert_eq!(builder.auth.token().unwrap(), "tt");
  }

  #[test]
  fn unknown_auth_kind_is_rejected() {
    let url = Url::parse("backend://api.example.com?auth=cookie").unwrap();
    assert!(matches!(
      BackendBuilder::from_url(&url),
      Err(BackendError::InvalidEndpoint(_))
    ));
  }

  #[test]
  fn detect_request_body_shape() {
    let body = ureq::json!({ "imageBase64": "QUJD" });
    assert_eq!(body["imageBase64"], "QUJD");
    assert_eq!(body.as_object().unwrap().len(), 1);
  }

  #[test]
  fn endpoint_joins_base() {
    let url = Url::parse("backend://api.example.com?auth=stub").unwrap();
    let model = BackendBuilder::from_url(&url).unwrap().build();
    assert_eq!(model.endpoint(), "https://api.example.com/api/v0/detect");
  }
}
