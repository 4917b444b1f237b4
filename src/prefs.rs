// 该文件是 Xunta （巡塔远望） 项目的一部分。
// src/prefs.rs - 界面偏好持久化
//
// 本程序是自由软件：你可以根据自由软件基金会发布的 GNU Affero 通用公共许可证
// 第 3 版或（由你选择）任何更新版本的条款，重新分发和/或修改本程序。
// 分发本程序的目的是希望它有用，但不提供任何保证，甚至不包含对适销性或
// 特定用途适用性的默示保证。详情请参阅 GNU Affero 通用公共许可证。
// 你应当已经收到一份 GNU Affero 通用公共许可证的副本。
// 如果没有，请访问 <https://www.gnu.org/licenses/>。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PrefsError {
  #[error("读写偏好文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("偏好文件格式损坏: {0}")]
  MalformedFile(#[from] serde_json::Error),
}

/// 界面偏好的单一对象。
/// 三项设置始终作为整体读写，避免零散的单键读写散落在各处。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
  pub theme: String,
  pub language: String,
  pub avatar: Option<String>,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      theme: "light".to_string(),
      language: "zh".to_string(),
      avatar: None,
    }
  }
}

/// 偏好存储：内存副本加上一个 JSON 文件。
/// 每个 setter 都同步落盘，调用方不需要单独记得保存。
#[derive(Debug)]
pub struct PrefsStore {
  path: PathBuf,
  current: Preferences,
}

impl PrefsStore {
  /// 从文件装载；文件不存在时使用默认值（首次运行）
  pub fn load(path: impl AsRef<Path>) -> Result<Self, PrefsError> {
    let path = path.as_ref().to_path_buf();
    let current = match std::fs::read(&path) {
      Ok(bytes) => serde_json::from_slice(&bytes)?,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        debug!("偏好文件不存在，使用默认值: {}", path.display());
        Preferences::default()
      }
      Err(err) => return Err(err.into()),
    };
    Ok(Self { path, current })
  }

  pub fn current(&self) -> &Preferences {
    &self.current
  }

  pub fn set_theme(&mut self, theme: impl Into<String>) -> Result<(), PrefsError> {
    self.current.theme = theme.into();
    self.persist()
  }

  pub fn set_language(&mut self, language: impl Into<String>) -> Result<(), PrefsError> {
    self.current.language = language.into();
    self.persist()
  }

  pub fn set_avatar(&mut self, avatar: Option<String>) -> Result<(), PrefsError> {
    self.current.avatar = avatar;
    self.persist()
  }

  fn persist(&self) -> Result<(), PrefsError> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(&self.current)?;
    std::fs::write(&self.path, bytes)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("xunta-prefs-{}-{}", name, std::process::id()));
    dir.join("prefs.json")
  }

  #[test]
  fn first_run_uses_defaults() {
    let store = PrefsStore::load(temp_path("defaults")).unwrap();
    assert_eq!(store.current().theme, "light");
    assert_eq!(store.current().language, "zh");
    assert_eq!(store.current().avatar, None);
  }

  #[test]
  fn setters_persist_across_reload() {
    let path = temp_path("reload");
    let mut store = PrefsStore::load(&path).unwrap();
    store.set_theme("dark").unwrap();
    store.set_avatar(Some("tower.png".to_string())).unwrap();

    let reloaded = PrefsStore::load(&path).unwrap();
    assert_eq!(reloaded.current().theme, "dark");
    assert_eq!(reloaded.current().language, "zh");
    assert_eq!(reloaded.current().avatar.as_deref(), Some("tower.png"));

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
  }

  #[test]
  fn malformed_file_is_reported() {
    let path = temp_path("broken");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(
      PrefsStore::load(&path),
      Err(PrefsError::MalformedFile(_))
    ));

    std::fs::remove_dir_all(path.parent().unwrap()).ok();
  }
}
