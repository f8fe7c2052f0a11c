use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

const JSON_ENCODE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/json_encode.applescript"
));
const TASK_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/task_json.applescript"
));
const PROJECT_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/project_json.applescript"
));
const TAG_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/tag_json.applescript"
));
const FOLDER_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/folder_json.applescript"
));

/// Placeholder that fragments use where the target application name goes.
pub const APPLICATION_PLACEHOLDER: &str = "__APPLICATION__";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to read script fragment {name} from {path}: {source}")]
    Io {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fragment {
    /// List joining and JSON object/array/boolean assembly.
    JsonEncode,
    TaskJson,
    ProjectJson,
    TagJson,
    FolderJson,
}

impl Fragment {
    pub const ALL: [Fragment; 5] = [
        Fragment::JsonEncode,
        Fragment::TaskJson,
        Fragment::ProjectJson,
        Fragment::TagJson,
        Fragment::FolderJson,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Fragment::JsonEncode => "json_encode",
            Fragment::TaskJson => "task_json",
            Fragment::ProjectJson => "project_json",
            Fragment::TagJson => "tag_json",
            Fragment::FolderJson => "folder_json",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.applescript", self.name())
    }

    fn embedded(&self) -> &'static str {
        match self {
            Fragment::JsonEncode => JSON_ENCODE,
            Fragment::TaskJson => TASK_JSON,
            Fragment::ProjectJson => PROJECT_JSON,
            Fragment::TagJson => TAG_JSON,
            Fragment::FolderJson => FOLDER_JSON,
        }
    }
}

/// Keyed fragment cache. Each fragment is resolved at most once: from
/// `<override_dir>/<name>.applescript` when that file exists, otherwise from
/// the copy embedded at build time.
#[derive(Debug, Default)]
pub struct AssetCache {
    override_dir: Option<PathBuf>,
    entries: Mutex<HashMap<Fragment, Arc<str>>>,
}

impl AssetCache {
    pub fn embedded() -> Self {
        Self::default()
    }

    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    pub fn get(&self, fragment: Fragment) -> Result<Arc<str>, AssetError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(text) = entries.get(&fragment) {
            return Ok(Arc::clone(text));
        }
        let text: Arc<str> = Arc::from(self.load(fragment)?);
        tracing::debug!(fragment = fragment.name(), bytes = text.len(), "loaded script fragment");
        entries.insert(fragment, Arc::clone(&text));
        Ok(text)
    }

    /// Number of fragments resolved so far.
    pub fn cached_len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn load(&self, fragment: Fragment) -> Result<String, AssetError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(fragment.file_name());
            if path.is_file() {
                return fs::read_to_string(&path).map_err(|source| AssetError::Io {
                    name: fragment.name(),
                    path,
                    source,
                });
            }
        }
        Ok(fragment.embedded().to_string())
    }
}
