//! Named schema storage: id → [`Schema`].
//!
//! A [`SchemaRepository`] is a side-table the host fills at startup and
//! tool/bridge code consults at validation time. Lookups of unknown ids
//! return `Ok(None)` rather than an error. Repositories are created by the
//! host, closed exactly once, and outlive every validation call that
//! references them; operations after `close` are [`Error::Lifecycle`].

use crate::schema::Schema;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Operation table every schema store provides.
pub trait SchemaRepository: Send + Sync {
    /// Look up a schema; unknown ids are `Ok(None)`.
    fn get(&self, id: &str) -> Result<Option<Schema>>;

    /// Insert or replace a schema.
    fn put(&self, id: &str, schema: Schema) -> Result<()>;

    /// All stored ids.
    fn list(&self) -> Result<Vec<String>>;

    /// Remove a schema; returns whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Close the repository; subsequent operations fail.
    fn close(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Memory repository
// ---------------------------------------------------------------------------

/// Mutex-guarded map of named schemas.
#[derive(Debug, Default)]
pub struct MemorySchemaRepository {
    schemas: RwLock<HashMap<String, Schema>>,
    closed: AtomicBool,
}

impl MemorySchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::lifecycle("schema repository is closed"));
        }
        Ok(())
    }
}

impl SchemaRepository for MemorySchemaRepository {
    fn get(&self, id: &str) -> Result<Option<Schema>> {
        self.ensure_open()?;
        Ok(self.schemas.read().unwrap().get(id).cloned())
    }

    fn put(&self, id: &str, schema: Schema) -> Result<()> {
        self.ensure_open()?;
        self.schemas.write().unwrap().insert(id.to_string(), schema);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut ids: Vec<String> = self.schemas.read().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.schemas.write().unwrap().remove(id).is_some())
    }

    fn close(&self) -> Result<()> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::SeqCst);
        self.schemas.write().unwrap().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File repository
// ---------------------------------------------------------------------------

/// On-disk serialization flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFileFormat {
    Json,
    Yaml,
}

impl SchemaFileFormat {
    fn extension(self) -> &'static str {
        match self {
            SchemaFileFormat::Json => "json",
            SchemaFileFormat::Yaml => "yaml",
        }
    }
}

/// One file per schema: `{base_path}/{id}.{json|yaml}`.
///
/// `put` is create-or-truncate, so a replaced schema never mixes old and
/// new bytes.
#[derive(Debug)]
pub struct FileSchemaRepository {
    base_path: PathBuf,
    format: SchemaFileFormat,
    closed: AtomicBool,
}

impl FileSchemaRepository {
    /// Create the repository, making `base_path` if needed.
    pub fn new(base_path: impl Into<PathBuf>, format: SchemaFileFormat) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            format,
            closed: AtomicBool::new(false),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::lifecycle("schema repository is closed"));
        }
        Ok(())
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(Error::invalid_input(format!("invalid schema id '{id}'")));
        }
        Ok(self
            .base_path
            .join(format!("{id}.{}", self.format.extension())))
    }
}

impl SchemaRepository for FileSchemaRepository {
    fn get(&self, id: &str) -> Result<Option<Schema>> {
        self.ensure_open()?;
        let path = self.path_for(id)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let schema = match self.format {
            SchemaFileFormat::Json => serde_json::from_str(&contents)?,
            SchemaFileFormat::Yaml => serde_yaml::from_str(&contents)?,
        };
        Ok(Some(schema))
    }

    fn put(&self, id: &str, schema: Schema) -> Result<()> {
        self.ensure_open()?;
        let path = self.path_for(id)?;
        let contents = match self.format {
            SchemaFileFormat::Json => serde_json::to_string_pretty(&schema)?,
            SchemaFileFormat::Yaml => serde_yaml::to_string(&schema)?,
        };
        std::fs::write(&path, contents)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let suffix = format!(".{}", self.format.extension());
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(&suffix) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.ensure_open()?;
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn close(&self) -> Result<()> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::object()
            .required_property("n", Schema::number())
            .property("note", Schema::string())
            .build()
    }

    #[test]
    fn test_memory_put_get_list_delete() {
        let repo = MemorySchemaRepository::new();
        assert_eq!(repo.get("tool.args").unwrap(), None);

        repo.put("tool.args", sample_schema()).unwrap();
        repo.put("tool.output", Schema::string()).unwrap();

        assert_eq!(repo.get("tool.args").unwrap(), Some(sample_schema()));
        assert_eq!(repo.list().unwrap(), ["tool.args", "tool.output"]);

        assert!(repo.delete("tool.args").unwrap());
        assert!(!repo.delete("tool.args").unwrap());
        assert_eq!(repo.list().unwrap(), ["tool.output"]);
    }

    #[test]
    fn test_memory_put_replaces() {
        let repo = MemorySchemaRepository::new();
        repo.put("s", Schema::string()).unwrap();
        repo.put("s", Schema::number()).unwrap();
        assert_eq!(repo.get("s").unwrap(), Some(Schema::number()));
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_close() {
        let repo = MemorySchemaRepository::new();
        repo.close().unwrap();
        assert!(matches!(repo.get("x"), Err(Error::Lifecycle(_))));
        assert!(matches!(repo.close(), Err(Error::Lifecycle(_))));
    }

    #[test]
    fn test_file_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSchemaRepository::new(dir.path(), SchemaFileFormat::Json).unwrap();

        repo.put("tool.args", sample_schema()).unwrap();
        assert!(dir.path().join("tool.args.json").exists());
        assert_eq!(repo.get("tool.args").unwrap(), Some(sample_schema()));
    }

    #[test]
    fn test_file_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSchemaRepository::new(dir.path(), SchemaFileFormat::Yaml).unwrap();

        repo.put("tool.args", sample_schema()).unwrap();
        assert!(dir.path().join("tool.args.yaml").exists());
        assert_eq!(repo.get("tool.args").unwrap(), Some(sample_schema()));
    }

    #[test]
    fn test_file_list_strips_extension_and_ignores_others() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSchemaRepository::new(dir.path(), SchemaFileFormat::Json).unwrap();
        repo.put("b", Schema::string()).unwrap();
        repo.put("a", Schema::number()).unwrap();
        // a stray file with the wrong extension is not a schema
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        assert_eq!(repo.list().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_file_missing_get_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSchemaRepository::new(dir.path(), SchemaFileFormat::Json).unwrap();
        assert_eq!(repo.get("ghost").unwrap(), None);
        assert!(!repo.delete("ghost").unwrap());
    }

    #[test]
    fn test_file_rejects_path_traversal_ids() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSchemaRepository::new(dir.path(), SchemaFileFormat::Json).unwrap();
        assert!(matches!(
            repo.put("../escape", Schema::string()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            repo.get("a/b"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_file_close() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileSchemaRepository::new(dir.path(), SchemaFileFormat::Json).unwrap();
        repo.close().unwrap();
        assert!(matches!(repo.list(), Err(Error::Lifecycle(_))));
    }
}
