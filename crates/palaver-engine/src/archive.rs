//! Directory of saved session documents.
//!
//! Files are named `<yymmdd>_<title>.json`, the title coming from the first
//! prompt of the session. Names are plain file names; anything that could
//! resolve outside the archive directory is refused.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use palaver_config::schema::ArchiveConfig;
use tracing::{debug, info};

use crate::document;
use crate::session::Session;
use crate::EngineError;

const EXTENSION: &str = "json";
const MAX_TITLE_CHARS: usize = 40;

/// A saved session document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct SessionArchive {
    dir: PathBuf,
    auto_save: bool,
    min_exchanges: usize,
}

impl SessionArchive {
    /// Archive in `dir` with the default auto-save policy.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let defaults = ArchiveConfig::default();
        Self {
            dir: dir.into(),
            auto_save: defaults.auto_save,
            min_exchanges: defaults.min_exchanges as usize,
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Result<Self, EngineError> {
        let dir = config.resolved_directory().ok_or_else(|| {
            EngineError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no data directory for the session archive",
            ))
        })?;
        Ok(Self {
            dir,
            auto_save: config.auto_save,
            min_exchanges: config.min_exchanges as usize,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save under a fresh, unique name and return that name.
    pub fn save(&self, session: &Session) -> Result<String, EngineError> {
        std::fs::create_dir_all(&self.dir)?;
        let name = self.unique_name(&base_name(session));
        self.write(&name, session)?;
        Ok(name)
    }

    /// Save over a name assigned by an earlier `save`.
    pub fn save_as(&self, session: &Session, name: &str) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.dir)?;
        self.write(name, session)
    }

    /// Save once the session has enough completed exchanges.
    ///
    /// Reuses `assigned` when given, otherwise picks a new name. Returns the
    /// name written, or `None` when nothing was saved.
    pub fn auto_save(
        &self,
        session: &Session,
        assigned: Option<&str>,
    ) -> Result<Option<String>, EngineError> {
        if !self.auto_save || session.exchange_count() < self.min_exchanges {
            return Ok(None);
        }
        match assigned {
            Some(name) => {
                self.save_as(session, name)?;
                Ok(Some(name.to_string()))
            }
            None => self.save(session).map(Some),
        }
    }

    /// Saved documents, newest first. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<ArchiveEntry>, EngineError> {
        let reader = match std::fs::read_dir(&self.dir) {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(ArchiveEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                modified: metadata.modified()?,
            });
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(entries)
    }

    pub fn load(&self, name: &str) -> Result<Session, EngineError> {
        let path = self.path_for(name)?;
        let text = std::fs::read_to_string(&path)?;
        debug!(path = %path.display(), "loading session");
        document::import(&text)
    }

    /// Resolve a plain file name inside the archive.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, EngineError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && Path::new(name).extension().and_then(|e| e.to_str()) == Some(EXTENSION);
        if !plain {
            return Err(EngineError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{name}' is not an archive file name"),
            )));
        }
        Ok(self.dir.join(name))
    }

    fn write(&self, name: &str, session: &Session) -> Result<(), EngineError> {
        let path = self.path_for(name)?;
        std::fs::write(&path, document::export(session)?)?;
        info!(path = %path.display(), turns = session.history().len(), "session saved");
        Ok(())
    }

    fn unique_name(&self, base: &str) -> String {
        let mut name = format!("{base}.{EXTENSION}");
        let mut n = 1;
        while self.dir.join(&name).exists() {
            name = format!("{base}_{n}.{EXTENSION}");
            n += 1;
        }
        name
    }
}

fn base_name(session: &Session) -> String {
    let title = session
        .title()
        .map(|t| sanitize_title(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "session".to_string());
    format!("{}_{title}", Local::now().format("%y%m%d"))
}

/// Keep letters and digits, turn separators into single underscores.
fn sanitize_title(title: &str) -> String {
    let mut out = String::new();
    for c in title.chars().take(MAX_TITLE_CHARS) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
