use std::{io, path::Path, sync::Arc};

use bytes::{Bytes, BytesMut};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::config::Staging;

/// File content held between decoding and forwarding.
///
/// Clones share the same staged file; it is deleted when the last clone is dropped.
#[derive(Debug, Clone)]
pub enum UploadContent {
    Memory(Bytes),
    Staged(Arc<StagedFile>),
}

impl UploadContent {
    pub fn len(&self) -> u64 {
        match self {
            UploadContent::Memory(bytes) => bytes.len() as u64,
            UploadContent::Staged(file) => file.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the staging file, if the content lives on disk.
    pub fn staged_path(&self) -> Option<&Path> {
        match self {
            UploadContent::Memory(_) => None,
            UploadContent::Staged(file) => Some(file.path()),
        }
    }

    pub(crate) async fn to_body(&self) -> io::Result<reqwest::Body> {
        match self {
            UploadContent::Memory(bytes) => Ok(reqwest::Body::from(bytes.clone())),
            UploadContent::Staged(file) => {
                let reader = tokio::fs::File::open(file.path()).await?;
                Ok(reqwest::Body::wrap_stream(ReaderStream::new(reader)))
            }
        }
    }

    pub async fn to_bytes(&self) -> io::Result<Bytes> {
        match self {
            UploadContent::Memory(bytes) => Ok(bytes.clone()),
            UploadContent::Staged(file) => tokio::fs::read(file.path()).await.map(Bytes::from),
        }
    }
}

#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    len: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Sink for the chunks of one file part.
pub(crate) enum StagingWriter {
    Memory(BytesMut),
    Disk {
        temp: NamedTempFile,
        file: tokio::fs::File,
        len: u64,
    },
}

impl StagingWriter {
    pub(crate) fn open(staging: &Staging) -> io::Result<Self> {
        match staging {
            Staging::Memory => Ok(StagingWriter::Memory(BytesMut::new())),
            Staging::Disk { dir } => {
                let temp = tempfile::Builder::new()
                    .prefix("upload-")
                    .tempfile_in(dir)?;
                let file = tokio::fs::File::from_std(temp.reopen()?);
                Ok(StagingWriter::Disk { temp, file, len: 0 })
            }
        }
    }

    pub(crate) async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            StagingWriter::Memory(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            StagingWriter::Disk { file, len, .. } => {
                file.write_all(chunk).await?;
                *len += chunk.len() as u64;
                Ok(())
            }
        }
    }

    pub(crate) async fn finish(self) -> io::Result<UploadContent> {
        match self {
            StagingWriter::Memory(buf) => Ok(UploadContent::Memory(buf.freeze())),
            StagingWriter::Disk {
                temp,
                mut file,
                len,
            } => {
                file.flush().await?;
                file.sync_all().await?;
                Ok(UploadContent::Staged(Arc::new(StagedFile { temp, len })))
            }
        }
    }
}
