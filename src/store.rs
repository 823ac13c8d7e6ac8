// 该文件是 Tanbing （探病） 项目的一部分。
// src/store.rs - 临时结果图像存储
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

//! 结果图像只保存在内存中，超过存活时间或容量上限后被淘汰。

use std::{
  collections::{HashMap, VecDeque},
  sync::{Arc, Mutex, PoisonError},
  time::{Duration, Instant},
};

use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CAPACITY: usize = 256;
pub const DEFAULT_MAX_BYTES: usize = 512 * 1024 * 1024;

struct Entry {
  png: Arc<[u8]>,
  created: Instant,
}

#[derive(Default)]
struct Inner {
  entries: HashMap<Uuid, Entry>,
  order: VecDeque<Uuid>,
  bytes: usize,
}

impl Inner {
  fn remove(&mut self, id: &Uuid) {
    if let Some(entry) = self.entries.remove(id) {
      self.bytes -= entry.png.len();
    }
  }
}

pub struct ArtifactStore {
  inner: Mutex<Inner>,
  ttl: Duration,
  capacity: usize,
  max_bytes: usize,
}

impl Default for ArtifactStore {
  fn default() -> Self {
    Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
  }
}

impl ArtifactStore {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    Self {
      inner: Mutex::new(Inner::default()),
      ttl,
      capacity: capacity.max(1),
      max_bytes: DEFAULT_MAX_BYTES,
    }
  }

  /// 所有结果图像合计占用的字节上限；单张超过上限的图像仍会保留，直到被下一张替换
  pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  pub fn put(&self, png: Vec<u8>) -> Uuid {
    self.put_at(png, Instant::now())
  }

  pub fn get(&self, id: &Uuid) -> Option<Arc<[u8]>> {
    self.get_at(id, Instant::now())
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 当前占用的字节数
  pub fn bytes(&self) -> usize {
    self.lock().bytes
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn put_at(&self, png: Vec<u8>, now: Instant) -> Uuid {
    let id = Uuid::new_v4();
    let mut inner = self.lock();
    self.evict_expired(&mut inner, now);
    while inner.order.len() >= self.capacity
      || (!inner.order.is_empty() && inner.bytes + png.len() > self.max_bytes)
    {
      if let Some(oldest) = inner.order.pop_front() {
        inner.remove(&oldest);
        debug!("结果图像超出容量被淘汰: {}", oldest);
      }
    }
    inner.bytes += png.len();
    inner.entries.insert(
      id,
      Entry {
        png: png.into(),
        created: now,
      },
    );
    inner.order.push_back(id);
    id
  }

  fn get_at(&self, id: &Uuid, now: Instant) -> Option<Arc<[u8]>> {
    let mut inner = self.lock();
    self.evict_expired(&mut inner, now);
    inner.entries.get(id).map(|entry| entry.png.clone())
  }

  fn evict_expired(&self, inner: &mut Inner, now: Instant) {
    while let Some(oldest) = inner.order.front().copied() {
      let expired = inner
        .entries
        .get(&oldest)
        .map(|entry| now.saturating_duration_since(entry.created) >= self.ttl)
        .unwrap_or(true);
      if !expired {
        break;
      }
      inner.order.pop_front();
      inner.remove(&oldest);
      debug!("结果图像过期被淘汰: {}", oldest);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stores_and_returns_bytes() {
    let store = ArtifactStore::default();
    let id = store.put(vec![1, 2, 3]);
    assert_eq!(store.get(&id).as_deref(), Some(&[1u8, 2, 3][..]));
    assert!(store.get(&Uuid::new_v4()).is_none());
  }

  #[test]
  fn expires_after_ttl() {
    let store = ArtifactStore::new(Duration::from_secs(10), 8);
    let start = Instant::now();
    let id = store.put_at(vec![7], start);
    assert!(store.get_at(&id, start + Duration::from_secs(9)).is_some());
    assert!(store.get_at(&id, start + Duration::from_secs(10)).is_none());
    assert!(store.is_empty());
  }

  #[test]
  fn evicts_oldest_when_full() {
    let store = ArtifactStore::new(DEFAULT_TTL, 2);
    let a = store.put(vec![1]);
    let b = store.put(vec![2]);
    let c = store.put(vec![3]);
    assert_eq!(store.len(), 2);
    assert!(store.get(&a).is_none());
    assert!(store.get(&b).is_some());
    assert!(store.get(&c).is_some());
  }

  #[test]
  fn evicts_oldest_when_over_byte_budget() {
    let store = ArtifactStore::new(DEFAULT_TTL, 16).with_max_bytes(10);
    let a = store.put(vec![0; 4]);
    let b = store.put(vec![0; 4]);
    assert_eq!(store.bytes(), 8);

    let c = store.put(vec![0; 4]);
    assert!(store.get(&a).is_none());
    assert!(store.get(&b).is_some());
    assert!(store.get(&c).is_some());
    assert_eq!(store.bytes(), 8);

    // 单张超出预算时清空其余条目
    let d = store.put(vec![0; 32]);
    assert_eq!(store.len(), 1);
    assert!(store.get(&d).is_some());
    assert_eq!(store.bytes(), 32);
  }

  #[test]
  fn expiry_releases_bytes() {
    let store = ArtifactStore::new(Duration::from_secs(1), 8);
    let start = Instant::now();
    store.put_at(vec![0; 5], start);
    assert_eq!(store.bytes(), 5);
    assert!(store.get_at(&Uuid::new_v4(), start + Duration::from_secs(2)).is_none());
    assert_eq!(store.bytes(), 0);
  }
}
