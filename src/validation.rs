//! Upload checks run before any parsing

use crate::config::UploadPolicy;
use crate::error::ValidationError;

/// Substrings never allowed in an uploaded filename
pub const FORBIDDEN_NAME_SEQUENCES: [&str; 8] = ["..", "/", "\\", "<", ">", "|", "*", "?"];

/// An uploaded geometry file, alive for a single request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename declared by the client
    pub name: String,
    /// Raw file content
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Lowercased extension including the leading dot, if any
    pub fn extension(&self) -> Option<String> {
        let dot = self.name.rfind('.')?;
        let ext = &self.name[dot..];
        if ext.len() < 2 {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Checks an upload against the policy, stopping at the first failing rule
///
/// Rules in order: presence, size, extension allow-list, filename safety.
pub fn validate_upload(
    file: Option<&UploadedFile>,
    policy: &UploadPolicy,
) -> Result<(), ValidationError> {
    let file = file.ok_or(ValidationError::Missing)?;

    if file.size() > policy.max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            max: policy.max_bytes,
        });
    }

    let allowed = file.extension().is_some_and(|ext| {
        policy
            .allowed_extensions
            .iter()
            .any(|candidate| normalize_extension(candidate) == ext)
    });
    if !allowed {
        return Err(ValidationError::Extension {
            name: file.name.clone(),
            allowed: policy.allowed_extensions.join(", "),
        });
    }

    if let Some(sequence) = FORBIDDEN_NAME_SEQUENCES
        .iter()
        .find(|seq| file.name.contains(**seq))
    {
        return Err(ValidationError::UnsafeName {
            name: file.name.clone(),
            sequence: sequence.to_string(),
        });
    }

    Ok(())
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
