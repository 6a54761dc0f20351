//! SGEO 原生文件格式（.sgeo）
//!
//! 16 字节文件头 + Zstd 压缩的 MessagePack 脚本。

use crate::error::FileError;
use crate::script::{check_version, ConstructionScript};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// 文件魔数 "SGEO"
const MAGIC: &[u8; 4] = b"SGEO";

/// 容器版本，与脚本版本一致
const FORMAT_VERSION: u32 = crate::script::SCRIPT_VERSION;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 压缩体上限
const MAX_COMPRESSED_SIZE: u32 = 64 * 1024 * 1024;

const HEADER_LEN: usize = 16;

/// 文件头（16 字节，小端）：魔数、版本、标志位、压缩体长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
    version: u32,
    compressed_size: u32,
}

impl FileHeader {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        // 8..12 为标志位，当前总是 0
        bytes[12..].copy_from_slice(&self.compressed_size.to_le_bytes());
        bytes
    }

    /// 读取并校验文件头
    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                FileError::InvalidFormat("File shorter than the SGEO header".to_string())
            }
            _ => FileError::Io(e),
        })?;
        if &bytes[..4] != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not an SGEO file".to_string(),
            ));
        }

        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let header = Self {
            version: word(4),
            compressed_size: word(12),
        };
        check_version(header.version)?;
        let flags = word(8);
        if flags != 0 {
            return Err(FileError::UnsupportedVersion(format!(
                "Unknown header flags {:#x}",
                flags
            )));
        }
        if header.compressed_size > MAX_COMPRESSED_SIZE {
            return Err(FileError::Corruption(format!(
                "Declared body size {} exceeds the {} byte limit",
                header.compressed_size, MAX_COMPRESSED_SIZE
            )));
        }
        Ok(header)
    }
}

/// 编码为原生格式字节
pub fn encode(script: &ConstructionScript) -> Result<Vec<u8>, FileError> {
    let msgpack_data = rmp_serde::to_vec(script)?;
    let compressed = zstd::encode_all(msgpack_data.as_slice(), COMPRESSION_LEVEL)?;
    let compressed_size = u32::try_from(compressed.len())
        .ok()
        .filter(|size| *size <= MAX_COMPRESSED_SIZE)
        .ok_or_else(|| FileError::InvalidFormat("Script too large".to_string()))?;

    let header = FileHeader {
        version: FORMAT_VERSION,
        compressed_size,
    };
    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// 从原生格式读取
pub fn decode(reader: &mut impl Read) -> Result<ConstructionScript, FileError> {
    let header = FileHeader::read(reader)?;

    let mut compressed = Vec::new();
    reader
        .by_ref()
        .take(u64::from(header.compressed_size))
        .read_to_end(&mut compressed)?;
    if compressed.len() < header.compressed_size as usize {
        return Err(FileError::Corruption(format!(
            "Body has {} of the {} bytes declared in the header",
            compressed.len(),
            header.compressed_size
        )));
    }

    let msgpack_data = zstd::decode_all(compressed.as_slice())
        .map_err(|e| FileError::Corruption(format!("Zstd decode failed: {e}")))?;
    let script: ConstructionScript = rmp_serde::from_slice(&msgpack_data)?;
    check_version(script.version)?;
    Ok(script)
}

/// 保存脚本到文件
pub fn save(script: &ConstructionScript, path: &Path) -> Result<(), FileError> {
    let bytes = encode(script)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    tracing::info!(
        "Saved {} commands to {} ({} bytes)",
        script.commands.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// 从文件加载脚本
pub fn load(path: &Path) -> Result<ConstructionScript, FileError> {
    let mut reader = BufReader::new(File::open(path)?);
    let script = decode(&mut reader)?;

    tracing::info!(
        "Loaded {} commands from {}",
        script.commands.len(),
        path.display()
    );
    Ok(script)
}
