use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::time::SystemTime;
use tempfile::NamedTempFile;

use crate::error::Result;

/// 文件版本: 修改时间 + 长度 (+ inode), 用于判断是否需要重新加载
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobVersion {
    pub modified: SystemTime,
    pub len: u64,
    pub inode: u64,
}

impl BlobVersion {
    fn of(meta: &fs::Metadata) -> std::io::Result<Self> {
        #[cfg(unix)]
        let inode = std::os::unix::fs::MetadataExt::ino(meta);
        #[cfg(not(unix))]
        let inode = 0;
        Ok(Self {
            modified: meta.modified()?,
            len: meta.len(),
            inode,
        })
    }
}

/// 以数据目录为根的简单键值存储, 键为相对路径
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// 读取原始字节, 不存在时返回 None
    pub fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// 整体覆盖写入: 先写同目录临时文件, 再原子替换
    pub fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)?;

        tracing::debug!("Saved {}", path.display());
        Ok(path)
    }

    pub fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path)?;
        Ok(path)
    }

    /// 当前版本, 不存在时返回 None
    pub fn version(&self, key: &str) -> Result<Option<BlobVersion>> {
        match fs::metadata(self.path(key)) {
            Ok(meta) => Ok(Some(BlobVersion::of(&meta)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
