use std::path::{Path, PathBuf};

use super::VoiceCatalog;
use crate::error::AppError;

/// How an unknown voice name is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Unknown names are an error (multipart upload endpoint).
    Strict,
    /// Unknown names fall through to the legacy path (JSON endpoint).
    Lenient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVoiceReference {
    pub path: Option<PathBuf>,
    /// Set when `path` is a request-owned upload that must be deleted afterwards.
    pub is_temporary: bool,
}

impl ResolvedVoiceReference {
    fn catalog(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            is_temporary: false,
        }
    }

    pub fn describe(&self) -> &'static str {
        match (&self.path, self.is_temporary) {
            (None, _) => "default",
            (Some(_), true) => "upload",
            (Some(_), false) => "file",
        }
    }
}

/// Picks the single reference clip a request will clone from.
///
/// Priority: an uploaded file that exists on disk, then a catalog voice,
/// then the legacy path verbatim, then nothing (the model's default voice).
pub struct VoiceResolver<'a> {
    catalog: &'a VoiceCatalog,
    mode: ResolveMode,
}

impl<'a> VoiceResolver<'a> {
    pub fn new(catalog: &'a VoiceCatalog, mode: ResolveMode) -> Self {
        Self { catalog, mode }
    }

    pub fn resolve(
        &self,
        voice_name: Option<&str>,
        uploaded: Option<&Path>,
        legacy_path: Option<&str>,
    ) -> Result<ResolvedVoiceReference, AppError> {
        if let Some(uploaded) = uploaded.filter(|p| p.is_file()) {
            return Ok(ResolvedVoiceReference {
                path: Some(uploaded.to_path_buf()),
                is_temporary: true,
            });
        }

        if let Some(name) = voice_name.map(str::trim).filter(|n| !n.is_empty()) {
            match self.catalog.lookup(name) {
                Some(path) => {
                    tracing::debug!(voice = %name, "Resolved catalog voice {}", path.display());
                    return Ok(ResolvedVoiceReference::catalog(path));
                }
                None if self.mode == ResolveMode::Strict => {
                    return Err(AppError::VoiceNotFound(name.to_string()));
                }
                None => {
                    tracing::debug!(voice = %name, "Unknown voice, falling back to legacy path");
                }
            }
        }

        if let Some(legacy) = legacy_path.filter(|p| !p.is_empty()) {
            return Ok(ResolvedVoiceReference {
                path: Some(PathBuf::from(legacy)),
                is_temporary: false,
            });
        }

        Ok(ResolvedVoiceReference::default())
    }
}
