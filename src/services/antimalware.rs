//! Anti-malware scanning through clamd.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::ServiceError;

const SERVICE: &str = "clamd";

const CHUNK_SIZE: usize = 64 * 1024;

#[async_trait]
pub trait MalwareScanner: Send + Sync {
  /// True when the content is infected
  async fn is_infected(&self, name: &str, bytes: &[u8]) -> Result<bool, ServiceError>;
}

pub struct ClamdScanner {
  address: String,
  timeout: Duration,
}

impl ClamdScanner {
  pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
    Self {
      address: format!("{}:{}", host, port),
      timeout,
    }
  }

  async fn instream(&self, bytes: &[u8]) -> Result<String, ServiceError> {
    let mut stream = TcpStream::connect(&self.address).await?;
    stream.write_all(b"zINSTREAM\0").await?;
    for chunk in bytes.chunks(CHUNK_SIZE) {
      stream.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
      stream.write_all(chunk).await?;
    }
    stream.write_all(&0u32.to_be_bytes()).await?;
    stream.flush().await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;
    Ok(String::from_utf8_lossy(&reply).into_owned())
  }
}

#[async_trait]
impl MalwareScanner for ClamdScanner {
  async fn is_infected(&self, name: &str, bytes: &[u8]) -> Result<bool, ServiceError> {
    let reply = tokio::time::timeout(self.timeout, self.instream(bytes))
      .await
      .map_err(|_| ServiceError::Protocol {
        service: SERVICE,
        detail: "scan timed out".into(),
      })??;
    let infected = parse_reply(&reply)?;
    if infected {
      tracing::warn!("Malware detected in upload {}: {}", name, reply.trim_end_matches('\0').trim());
    }
    Ok(infected)
  }
}

/// `stream: OK` is clean, `stream: <signature> FOUND` is infected
pub fn parse_reply(reply: &str) -> Result<bool, ServiceError> {
  let reply = reply.trim_end_matches('\0').trim();
  if reply.ends_with("OK") {
    Ok(false)
  } else if reply.ends_with("FOUND") {
    Ok(true)
  } else {
    Err(ServiceError::Protocol {
      service: SERVICE,
      detail: reply.to_string(),
    })
  }
}

/// Treats every file as clean
pub struct DisabledScanner;

#[async_trait]
impl MalwareScanner for DisabledScanner {
  async fn is_infected(&self, name: &str, _bytes: &[u8]) -> Result<bool, ServiceError> {
    tracing::debug!("Anti-malware disabled, not scanning {}", name);
    Ok(false)
  }
}
