// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/model/roboflow.rs - Roboflow 远端检测网关
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, DetectionProfile, Model, NormalizeError, ProviderResponse, normalize},
  picture::PreparedUpload,
};

/// 单次检测调用的固定超时；本层不做任何重试
const DETECT_TIMEOUT: Duration = Duration::from_secs(30);

const ROBOFLOW_SCHEME: &str = "roboflow";

#[derive(Error, Debug)]
pub enum RoboflowError {
  #[error("模型地址必须使用 roboflow 方案")]
  SchemeMismatch,
  #[error("模型地址无效: {0}")]
  InvalidEndpoint(String),
  #[error("缺少 api_key 参数")]
  MissingApiKey,
  #[error("检测服务返回状态 {0}")]
  Status(u16),
  #[error("网络传输错误: {0}")]
  Transport(Box<ureq::Error>),
  #[error("读取响应失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("归一化错误: {0}")]
  NormalizeError(#[from] NormalizeError),
}

impl From<ureq::Error> for RoboflowError {
  fn from(err: ureq::Error) -> Self {
    match err {
      ureq::Error::Status(code, _) => RoboflowError::Status(code),
      other => RoboflowError::Transport(Box::new(other)),
    }
  }
}

/// 从 URL 构造 Roboflow 网关。
///
/// 形如 `roboflow://serverless.roboflow.com/insulator-defect-c1kcs/1?api_key=…&profile=insulator`，
/// 主机与路径即推理端点，查询参数携带密钥和检测场景。
pub struct RoboflowBuilder {
  endpoint: String,
  api_key: String,
  profile: DetectionProfile,
}

impl FromUrlWithScheme for RoboflowBuilder {
  const SCHEME: &'static str = ROBOFLOW_SCHEME;
}

impl FromUrl for RoboflowBuilder {
  type Error = RoboflowError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RoboflowError::SchemeMismatch);
    }

    let host = url
      .host_str()
      .ok_or_else(|| RoboflowError::InvalidEndpoint("缺少主机名".to_string()))?;
    let endpoint = format!("https://{}{}", host, url.path());

    let mut api_key = None;
    let mut profile = DetectionProfile::Insulator;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "api_key" => api_key = Some(value.into_owned()),
        "profile" => {
          profile = value
            .parse()
            .map_err(RoboflowError::InvalidEndpoint)?;
        }
        _ => {}
      }
    }

    Ok(RoboflowBuilder {
      endpoint,
      api_key: api_key.ok_or(RoboflowError::MissingApiKey)?,
      profile,
    })
  }
}

impl RoboflowBuilder {
  pub fn profile(mut self, profile: DetectionProfile) -> Self {
    self.profile = profile;
    self
  }

  pub fn build(self) -> RoboflowModel {
    let agent = ureq::AgentBuilder::new().timeout(DETECT_TIMEOUT).build();
    info!("检测端点: {} ({:?})", self.endpoint, self.profile);
    RoboflowModel {
      endpoint: self.endpoint,
      api_key: self.api_key,
      profile: self.profile,
      agent,
    }
  }
}

/// Roboflow serverless 推理网关。
/// 每次调用恰好发起一次 POST，失败立即上抛，由调用侧统一映射为用户可读文案。
pub struct RoboflowModel {
  endpoint: String,
  api_key: String,
  profile: DetectionProfile,
  agent: ureq::Agent,
}

impl Model for RoboflowModel {
  type Input = PreparedUpload;
  type Output = DetectResult;
  type Error = RoboflowError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    // 请求体即 base64 图像字符串本身，不做任何转义
    let encoded = BASE64.encode(&input.bytes);
    debug!(
      "上传 {} ({:.2} KB, base64 后 {:.2} KB)",
      input.name,
      input.size() as f64 / 1024.0,
      encoded.len() as f64 / 1024.0
    );

    let response = self
      .agent
      .post(&self.endpoint)
      .query("api_key", &self.api_key)
      .set("Content-Type", "application/x-www-form-urlencoded")
      .send_string(&encoded)?;

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
  fn builds_from_url() {
    let url = Url::parse(
      "roboflow://serverless.roboflow.com/birdnest-aqzoi-gelsg/1?api_key=secret&profile=nest",
    )
    .unwrap();
    let builder = RoboflowBuilder::from_url(&url).unwrap();
    assert_eq!(
      builder.endpoint,
      "https://serverless.roboflow.com/birdnest-aqzoi-gelsg/1"
    );
    assert_eq!(builder.api_key, "secret");
    assert_eq!(builder.profile, DetectionProfile::BirdNest);
  }

  #[test]
  fn missing_api_key_is_rejected() {
    let url = Url::parse("roboflow://serverless.roboflow.com/insulator-defect-c1kcs/1").unwrap();
    assert!(matches!(
      RoboflowBuilder::from_url(&url),
      Err(RoboflowError::MissingApiKey)
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("http://serverless.roboflow.com/x/1?api_key=k").unwrap();
    assert!(matches!(
      RoboflowBuilder::from_url(&url),
      Err(RoboflowError::SchemeMismatch)
    ));
  }

  #[test]
  fn posts_raw_base64_body() {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();

    let server = std::thread::spawn(move || {
      let (mut stream, _) = listener.accept().unwrap();
      let mut buffer = Vec::new();
      let mut chunk = [0u8; 1024];

      let (body_start, content_length) = loop {
        let n = stream.read(&mut chunk).unwrap();
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
          let headers = String::from_utf8_lossy(&buffer[..pos]).to_lowercase();
          let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap();
          break (pos + 4, content_length);
        }
      };
      while buffer.len() < body_start + content_length {
        let n = stream.read(&mut chunk).unwrap();
        buffer.extend_from_slice(&chunk[..n]);
      }
      tx.send(buffer[body_start..body_start + content_length].to_vec())
        .unwrap();

      let payload = br#"{"predictions": []}"#;
      let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
      );
      stream.write_all(head.as_bytes()).unwrap();
      stream.write_all(payload).unwrap();
    });

    let model = RoboflowModel {
      endpoint: format!("http://{}/insulator-defect-c1kcs/1", addr),
      api_key: "k".to_string(),
      profile: DetectionProfile::Insulator,
      agent: ureq::AgentBuilder::new().timeout(DETECT_TIMEOUT).build(),
    };
    // base64 编码后含 '/' 与 '='，必须原样到达服务方
    let input = crate::picture::PreparedUpload {
      name: "t.jpg".to_string(),
      mime: "image/jpeg".to_string(),
      bytes: vec![0xFF, 0xFE, 0xFD, 0xFC],
      width: 1,
      height: 1,
    };

    let result = model.infer(&input).unwrap();
    assert!(result.is_empty());

    let body = rx.recv().unwrap();
    assert_eq!(body, b"//79/A==");
    server.join().unwrap();
  }

  #[test]
  fn default_profile_is_insulator() {
    let url = Url::parse("roboflow://serverless.roboflow.com/insulator-defect-c1kcs/1?api_key=k")
      .unwrap();
    let builder = RoboflowBuilder::from_url(&url).unwrap();
    assert_eq!(builder.profile, DetectionProfile::Insulator);
  }
}
