//! 截图存储
//!
//! FileImageStore 将每张截图写入配置目录，文件名 `<uuid>.<ext>`；先写 `.tmp` 再 rename，避免留下半截文件。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::device::{ImageStore, Screenshot};

/// 基于本地目录的截图存储
#[derive(Debug, Clone)]
pub struct FileImageStore {
    dir: PathBuf,
}

impl FileImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_atomic(&self, shot: &Screenshot) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let filename = format!("{}.{}", uuid::Uuid::new_v4(), shot.format.extension());
        let target = self.dir.join(&filename);
        let tmp = self.dir.join(format!("{}.tmp", filename));

        if let Err(e) = fs::write(&tmp, &shot.data[..]).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(target)
    }

    /// 目录下所有截图占用的字节数
    pub async fn total_size(&self) -> u64 {
        let mut total = 0;
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    total += meta.len();
                }
            }
        }
        total
    }

    /// 删除目录下所有截图，返回删除的文件数
    pub async fn clear(&self) -> usize {
        let mut removed = 0;
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to delete image {}: {}", entry.path().display(), e),
            }
        }
        removed
    }
}

#[async_trait]
impl ImageStore for FileImageStore {
    async fn save(&self, shot: &Screenshot) -> Option<PathBuf> {
        match self.write_atomic(shot).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Failed to save screenshot to {}: {}", self.dir.display(), e);
                None
            }
        }
    }
}

/// 不落盘
#[derive(Debug, Default)]
pub struct NoopImageStore;

#[async_trait]
impl ImageStore for NoopImageStore {
    async fn save(&self, _shot: &Screenshot) -> Option<PathBuf> {
        None
    }
}
