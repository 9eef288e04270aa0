// Filesystem persistence for raw stats pages. One `.html` artifact plus a
// `.meta.json` sidecar per entity, both replaced through a temp file in the
// same directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fightledger_common::{artifact_key, content_hash, sanitize_name, RawDocument};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};

const HTML_EXT: &str = "html";
const META_SUFFIX: &str = ".meta.json";

/// What `store` did with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Created,
    Updated,
    Unchanged,
}

impl StoreOutcome {
    pub fn wrote(&self) -> bool {
        !matches!(self, StoreOutcome::Unchanged)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentMeta {
    entity: String,
    fingerprint: String,
    retrieved_at: DateTime<Utc>,
    source_url: String,
}

pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(ArchiveError::io(&dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `entity` is stored when written now.
    pub fn path_for(&self, entity: &str) -> PathBuf {
        self.dir.join(format!("{}.{HTML_EXT}", artifact_key(entity)))
    }

    fn sidecar_of(&self, artifact: &Path) -> PathBuf {
        self.dir.join(format!("{}{META_SUFFIX}", stem_of(artifact)))
    }

    /// The artifact holding `entity`, if any. Pages named by the plain
    /// sanitized form predate keyed names and are still honored when they
    /// belong to `entity`.
    fn locate(&self, entity: &str) -> Result<Option<PathBuf>> {
        let keyed = self.path_for(entity);
        if keyed.is_file() {
            return Ok(self.owned_by(&keyed, entity)?.then_some(keyed));
        }
        let legacy = self.dir.join(format!("{}.{HTML_EXT}", sanitize_name(entity)));
        if legacy != keyed && legacy.is_file() && self.owned_by(&legacy, entity)? {
            return Ok(Some(legacy));
        }
        Ok(None)
    }

    fn owned_by(&self, artifact: &Path, entity: &str) -> Result<bool> {
        let name = entity.trim();
        Ok(match self.read_meta(&self.sidecar_of(artifact))? {
            Some(meta) => meta.entity == name,
            None => {
                let stem = stem_of(artifact);
                let base = stem.split('~').next().unwrap_or_default();
                base == name || legacy_entity(artifact) == name
            }
        })
    }

    pub fn exists(&self, entity: &str) -> bool {
        match self.locate(entity) {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(entity, error = %e, "Treating unreadable document as absent");
                false
            }
        }
    }

    /// Persist `content` for `entity` unless the stored copy already has the
    /// same fingerprint. Never replaces an artifact owned by another entity.
    pub fn store(&self, entity: &str, content: &str, source_url: &str) -> Result<StoreOutcome> {
        let fingerprint = content_hash(content);

        let (path, outcome) = match self.locate(entity)? {
            Some(path) => {
                if self.stored_fingerprint(&path)? == fingerprint {
                    debug!(entity, fingerprint = %fingerprint, "Document unchanged, skipping write");
                    return Ok(StoreOutcome::Unchanged);
                }
                (path, StoreOutcome::Updated)
            }
            None => {
                let path = self.path_for(entity);
                if path.is_file() {
                    return Err(ArchiveError::KeyCollision {
                        entity: entity.to_string(),
                        path,
                    });
                }
                (path, StoreOutcome::Created)
            }
        };

        self.write_atomic(&path, content.as_bytes())?;
        let meta = DocumentMeta {
            entity: entity.trim().to_string(),
            fingerprint: fingerprint.clone(),
            retrieved_at: Utc::now(),
            source_url: source_url.to_string(),
        };
        let meta_path = self.sidecar_of(&path);
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|source| ArchiveError::Meta {
            path: meta_path.clone(),
            source,
        })?;
        self.write_atomic(&meta_path, &meta_json)?;

        info!(entity, ?outcome, fingerprint = %fingerprint, bytes = content.len(), "Stored document");
        Ok(outcome)
    }

    pub fn load(&self, entity: &str) -> Result<RawDocument> {
        match self.locate(entity)? {
            Some(path) => self.load_path(&path),
            None => Err(ArchiveError::NotFound(entity.to_string())),
        }
    }

    /// Every stored document, sorted by entity name.
    pub fn list(&self) -> Result<Vec<RawDocument>> {
        let entries = std::fs::read_dir(&self.dir).map_err(ArchiveError::io(&self.dir))?;
        let mut docs = Vec::new();
        for entry in entries {
            let path = entry.map_err(ArchiveError::io(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HTML_EXT) {
                continue;
            }
            match self.load_path(&path) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }
        docs.sort_by(|a, b| a.entity.cmp(&b.entity));
        Ok(docs)
    }

    fn load_path(&self, path: &Path) -> Result<RawDocument> {
        let content = std::fs::read_to_string(path).map_err(ArchiveError::io(path))?;
        let meta = self.read_meta(&self.sidecar_of(path))?;

        let doc = match meta {
            Some(meta) => RawDocument {
                entity: meta.entity,
                fingerprint: meta.fingerprint,
                retrieved_at: meta.retrieved_at,
                source_url: meta.source_url,
                content,
            },
            // Pages saved before sidecars existed.
            None => {
                let retrieved_at = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                RawDocument {
                    entity: legacy_entity(path),
                    fingerprint: content_hash(&content),
                    retrieved_at,
                    source_url: String::new(),
                    content,
                }
            }
        };
        Ok(doc)
    }

    fn stored_fingerprint(&self, artifact: &Path) -> Result<String> {
        if let Some(meta) = self.read_meta(&self.sidecar_of(artifact))? {
            return Ok(meta.fingerprint);
        }
        let content = std::fs::read_to_string(artifact).map_err(ArchiveError::io(artifact))?;
        Ok(content_hash(&content))
    }

    fn read_meta(&self, path: &Path) -> Result<Option<DocumentMeta>> {
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(ArchiveError::io(path))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ArchiveError::Meta {
                path: path.to_path_buf(),
                source,
            })
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(ArchiveError::io(&self.dir))?;
        tmp.write_all(bytes).map_err(ArchiveError::io(tmp.path()))?;
        tmp.as_file().sync_all().map_err(ArchiveError::io(tmp.path()))?;
        tmp.persist(path)
            .map_err(|e| ArchiveError::Io {
                path: path.to_path_buf(),
                source: e.error,
            })?;
        Ok(())
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Entity name of a page with no sidecar, read back from its file stem.
fn legacy_entity(path: &Path) -> String {
    let stem = stem_of(path);
    let base = stem.split('~').next().unwrap_or_default();
    base.replace('_', " ")
}
