//! 媒体存储抽象
//!
//! 核心只关心"把内联图片数据换成一个可访问的 URL"这一件事，
//! 返回值是不透明字符串，具体托管在哪里由基础设施层决定。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("media upload failed: {0}")]
    Upload(String),
}

impl MediaStoreError {
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// 上传一张内联图片（base64 data URI），返回托管后的 URL。
    async fn upload_image(&self, data_uri: &str) -> Result<String, MediaStoreError>;
}

/// 内存实现的媒体存储（用于测试）
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    pub struct InMemoryMediaStore {
        counter: AtomicU64,
    }

    impl InMemoryMediaStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn upload_count(&self) -> u64 {
            self.counter.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaStore for InMemoryMediaStore {
        async fn upload_image(&self, data_uri: &str) -> Result<String, MediaStoreError> {
            if data_uri.trim().is_empty() {
                return Err(MediaStoreError::upload("empty payload"));
            }
            let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("mem://media/{seq}"))
        }
    }
}
