//! Windows executable detection for candidate game files.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::logging::log_debug;

const PE_OFFSET_FIELD: u64 = 0x3C;
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExeCategory {
    Pe32Plus,
    Pe32,
    MsDos,
    Other,
    Unknown,
}

impl ExeCategory {
    pub fn description(&self) -> &'static str {
        match self {
            ExeCategory::Pe32Plus => "64-bit Windows Executable",
            ExeCategory::Pe32 => "32-bit Windows Executable",
            ExeCategory::MsDos => "MS-DOS Executable",
            ExeCategory::Other => "Not a Windows Executable",
            ExeCategory::Unknown => "Unknown",
        }
    }

    /// Map the one-line output of `file -b` to a category.
    pub fn from_description(description: &str) -> Self {
        if description.contains("PE32+") {
            ExeCategory::Pe32Plus
        } else if description.contains("PE32") {
            ExeCategory::Pe32
        } else if description.contains("MS-DOS") {
            ExeCategory::MsDos
        } else if description.trim().is_empty() {
            ExeCategory::Unknown
        } else {
            ExeCategory::Other
        }
    }
}

/// Primary file-type classifier. Anything but `Pe32Plus`/`Pe32` is treated
/// as inconclusive and re-checked against the PE header.
pub trait ExeProbe: Send + Sync {
    fn classify(&self, path: &Path) -> ExeCategory;
}

/// Classifier backed by the system `file` command
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCommandProbe;

impl ExeProbe for FileCommandProbe {
    fn classify(&self, path: &Path) -> ExeCategory {
        let output = Command::new("file")
            .arg("-b")
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                ExeCategory::from_description(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(_) => ExeCategory::Unknown,
            Err(e) => {
                log_debug(&format!("file probe unavailable: {}", e));
                ExeCategory::Unknown
            }
        }
    }
}

/// `MZ` at offset 0 and `PE\0\0` at the little-endian offset stored at 0x3C.
pub fn has_pe_header(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    if read_fully(&mut file, &mut magic)? < magic.len() || &magic != b"MZ" {
        return Ok(false);
    }

    file.seek(SeekFrom::Start(PE_OFFSET_FIELD))?;
    let mut offset = [0u8; 4];
    if read_fully(&mut file, &mut offset)? < offset.len() {
        return Ok(false);
    }

    file.seek(SeekFrom::Start(u64::from(u32::from_le_bytes(offset))))?;
    let mut signature = [0u8; 4];
    if read_fully(&mut file, &mut signature)? < signature.len() {
        return Ok(false);
    }

    Ok(&signature == PE_SIGNATURE)
}

fn read_fully(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// True if `path` is a regular file that is a Windows executable.
pub fn is_windows_executable(probe: &dyn ExeProbe, path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    match probe.classify(path) {
        ExeCategory::Pe32Plus | ExeCategory::Pe32 => true,
        category => {
            log_debug(&format!(
                "{} classified as '{}', checking PE header",
                path.display(),
                category.description()
            ));
            has_pe_header(path).unwrap_or(false)
        }
    }
}

/// Smallest byte sequence that passes `has_pe_header`
#[cfg(test)]
pub(crate) fn pe_stub() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x80];
    bytes[0..2].copy_from_slice(b"MZ");
    bytes[0x3C..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    bytes[0x40..0x44].copy_from_slice(PE_SIGNATURE);
    bytes
}
