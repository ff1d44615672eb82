use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use crate::domain::{ChunkMetadata, DocumentChunk};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// One line of a persisted index: a chunk and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(alias = "page_content")]
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

impl IndexRecord {
    pub fn into_parts(self) -> (DocumentChunk, Vec<f32>) {
        let chunk = DocumentChunk {
            content: self.content,
            metadata: self.metadata,
        };
        (chunk, self.vector)
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Reads a JSON Lines index file, gunzipping it when the name ends in `.gz`.
///
/// Blank lines are skipped. Any line that does not parse fails the whole load.
pub fn read_index_records(path: &Path) -> Result<Vec<IndexRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open index file {:?}", path))?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {:?}", line_no + 1, path))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: IndexRecord = serde_json::from_str(&line)
            .with_context(|| format!("Corrupt index record on line {} of {:?}", line_no + 1, path))?;
        records.push(record);
    }

    debug!("Read {} index records from {:?}", records.len(), path);
    Ok(records)
}

/// Downloads `url` to `dest` unless `dest` already exists. Blocking.
pub fn download_if_not_exists(url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        debug!("{:?} already present, skipping download", dest);
        return Ok(());
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }

    info!("Downloading index from {} to {:?}", url, dest);
    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to download {}", url))?;
    if !response.status().is_success() {
        return Err(anyhow!("Download of {} failed with HTTP {}", url, response.status()));
    }
    let bytes = response.bytes().context("Failed to read download body")?;

    // `dest` only ever holds a complete download
    let partial = dest.with_extension("partial");
    fs::write(&partial, &bytes).with_context(|| format!("Failed to write {:?}", partial))?;
    if let Err(e) = fs::rename(&partial, dest) {
        warn!("Failed to move {:?} into place: {}", partial, e);
        let _ = fs::remove_file(&partial);
        return Err(e).with_context(|| format!("Failed to move download to {:?}", dest));
    }
    info!("Downloaded {} bytes to {:?}", bytes.len(), dest);
    Ok(())
}
