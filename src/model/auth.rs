// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/model/auth.rs - 后端认证策略
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum AuthError {
  #[error("注册临时账号失败: {0}")]
  RegisterFailed(String),
  #[error("登录失败: {0}")]
  LoginFailed(String),
  #[error("网络传输错误: {0}")]
  Transport(Box<ureq::Error>),
  #[error("读取响应失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("响应数据格式转换失败: {0}")]
  MalformedPayload(#[from] serde_json::Error),
}

impl From<ureq::Error> for AuthError {
  fn from(err: ureq::Error) -> Self {
    AuthError::Transport(Box::new(err))
  }
}

/// 认证策略。检测流水线只依赖这一接口，
/// 调试桩与真实自动注册流程作为两个显式实现，由调用方二选一。
pub trait AuthStrategy: Send + Sync {
  /// 返回可用的会话凭证，必要时现场建立
  fn token(&self) -> Result<String, AuthError>;
  /// 丢弃当前凭证（如服务端返回 401 后）
  fn invalidate(&self);
}

/// 调试用认证桩：固定凭证，不发起任何网络请求。
pub struct StubAuth {
  token: String,
}

impl StubAuth {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      token: token.into(),
    }
  }
}

impl AuthStrategy for StubAuth {
  fn token(&self) -> Result<String, AuthError> {
    Ok(self.token.clone())
  }

  fn invalidate(&self) {}
}

/// 一次性临时账号，用户名密码由时间戳加随机后缀构成。
#[derive(Debug, Clone)]
pub struct TempAccount {
  pub email: String,
  pub username: String,
  pub password: String,
}

impl TempAccount {
  pub fn generate() -> Self {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().r#gen();
    Self {
      email: format!("temp_{}_{:08x}@demo.com", timestamp, suffix),
      username: format!("temp_user_{}_{:08x}", timestamp, suffix),
      password: format!("TempPass_{}_{:08x}!", timestamp, suffix),
    }
  }
}

/// 注册/登录的传输层，独立成接口以便脱离服务端测试。
pub trait BootstrapTransport: Send + Sync {
  fn register(&self, account: &TempAccount) -> Result<(), AuthError>;
  fn login(&self, account: &TempAccount) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
  #[serde(rename = "isSuccess", default)]
  is_success: bool,
  token: Option<String>,
  messages: Option<Vec<ApiMessage>>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
  description: Option<String>,
  code: Option<String>,
}

impl AuthResponse {
  fn first_message(&self) -> String {
    self
      .messages
      .as_ref()
      .and_then(|messages| messages.first())
      .and_then(|message| {
        message
          .description
          .clone()
          .or_else(|| message.code.clone())
      })
      .unwrap_or_else(|| "未知错误".to_string())
  }
}

/// 通过 HTTP 调用后端注册与登录接口。
pub struct HttpBootstrap {
  base: Url,
  agent: ureq::Agent,
}

impl HttpBootstrap {
  pub fn new(base: Url) -> Self {
    let agent = ureq::AgentBuilder::new().timeout(BOOTSTRAP_TIMEOUT).build();
    Self { base, agent }
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
  }
}

impl BootstrapTransport for HttpBootstrap {
  fn register(&self, account: &TempAccount) -> Result<(), AuthError> {
    debug!("注册临时账号: {}", account.username);
    let response = self
      .agent
      .post(&self.endpoint("/api/v0/auth/register"))
      .send_json(ureq::json!({
        "email": account.email,
        "username": account.username,
        "password": account.password,
      }))?;

    let parsed: AuthResponse = serde_json::from_reader(response.into_reader())?;
    if !parsed.is_success {
      return Err(AuthError::RegisterFailed(parsed.first_message()));
    }
    Ok(())
  }

  fn login(&self, account: &TempAccount) -> Result<String, AuthError> {
    debug!("登录临时账号: {}", account.username);
    let response = self
      .agent
      .post(&self.endpoint("/api/v0/auth/login"))
      .send_json(ureq::json!({
        "email": account.email,
        "password": account.password,
      }))?;

    let parsed: AuthResponse = serde_json::from_reader(response.into_reader())?;
    match parsed.token {
      Some(token) if parsed.is_success => Ok(token),
      _ => Err(AuthError::LoginFailed(parsed.first_message())),
    }
  }
}

/// 自动注册认证：首次取凭证时注册并登录一个临时账号。
///
/// 凭证单元在整个注册-登录序列期间持锁，
/// 并发的首次调用会在锁上排队并复用同一份凭证，
/// 不会各自注册多余的临时账号。
pub struct AutoRegisterAuth<T: BootstrapTransport> {
  transport: T,
  credential: Mutex<Option<String>>,
}

impl AutoRegisterAuth<HttpBootstrap> {
  pub fn new(base: Url) -> Self {
    Self::with_transport(HttpBootstrap::new(base))
  }
}

impl<T: BootstrapTransport> AutoRegisterAuth<T> {
  pub fn with_transport(transport: T) -> Self {
    Self {
      transport,
      credential: Mutex::new(None),
    }
  }
}

impl<T: BootstrapTransport> AuthStrategy for AutoRegisterAuth<T> {
  fn token(&self) -> Result<String, AuthError> {
    let mut credential = self
      .credential
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(token) = credential.as_ref() {
      debug!("使用现有认证凭证");
      return Ok(token.clone());
    }

    info!("没有认证凭证，开始自动认证流程");
    let account = TempAccount::generate();

    // 注册成功之后才尝试登录，两步任一失败都不落地凭证
    self.transport.register(&account)?;
    let token = self.transport.login(&account)?;

    info!("自动认证成功，已获取凭证");
    *credential = Some(token.clone());
    Ok(token)
  }

  fn invalidate(&self) {
    let mut credential = self
      .credential
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    if credential.take().is_some() {
      warn!("已丢弃当前会话凭证");
    }
  }
}
