//! 媒体上传适配器
//!
//! 把内联的 base64 图片数据提交到 Cloudinary 兼容的无签名上传端点，
//! 换回托管 URL。核心层只拿到不透明字符串，端点可整体替换成 mock。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use application::{MediaStore, MediaStoreError};
use config::MediaConfig;

pub struct CloudinaryMediaStore {
    http: reqwest::Client,
    config: MediaConfig,
}

/// 上传端点的响应，只关心托管后的 URL
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryMediaStore {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn upload_image(&self, data_uri: &str) -> Result<String, MediaStoreError> {
        let response = self
            .http
            .post(&self.config.upload_url)
            .form(&[
                ("file", data_uri),
                ("upload_preset", self.config.upload_preset.as_str()),
            ])
            .send()
            .await
            .map_err(|err| MediaStoreError::upload(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaStoreError::upload(format!(
                "upload endpoint returned {status}"
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| MediaStoreError::upload(err.to_string()))?;

        debug!(url = %body.secure_url, "image uploaded");
        Ok(body.secure_url)
    }
}
