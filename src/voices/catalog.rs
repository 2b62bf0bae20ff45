use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Extensions accepted as voice references, compared case-insensitively.
pub const AUDIO_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "ogg", "m4a"];

/// Immutable snapshot of the voice directory taken at startup.
///
/// Every file is reachable under two aliases: its full file name and its
/// stem. Aliases live in a `BTreeMap`, so case-insensitive lookups walk them
/// in byte order and the first match wins. When two files differ only by
/// case (`Chris.wav` and `chris.wav`), an exact lookup finds each one but a
/// case-insensitive lookup always lands on the byte-wise smaller alias
/// (`Chris.wav`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCatalog {
    aliases: BTreeMap<String, PathBuf>,
}

impl VoiceCatalog {
    #[cfg(test)]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Scan `dir` (non-recursively) for audio files.
    ///
    /// A missing directory is created and yields an empty catalog. Nothing
    /// inside the directory is ever written, renamed or removed.
    pub fn scan(dir: &Path) -> std::io::Result<Self> {
        let mut aliases = BTreeMap::new();

        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            tracing::info!("Created empty voices directory {}", dir.display());
            return Ok(Self { aliases });
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_audio_extension(&path) {
                paths.push(path);
            }
        }
        // read_dir order is unspecified; sorting keeps stem collisions stable
        paths.sort();

        for path in paths {
            let (Some(file_name), Some(stem)) = (
                path.file_name().map(|n| n.to_string_lossy().to_string()),
                path.file_stem().map(|s| s.to_string_lossy().to_string()),
            ) else {
                continue;
            };

            let absolute_path = std::fs::canonicalize(&path).unwrap_or(path);
            aliases.insert(file_name, absolute_path.clone());
            aliases.entry(stem).or_insert(absolute_path);
        }

        let catalog = Self { aliases };
        tracing::info!(
            voices = catalog.file_count(),
            aliases = catalog.aliases.len(),
            "Scanned voices directory {}",
            dir.display()
        );
        Ok(catalog)
    }

    /// Resolve a user-supplied voice name.
    ///
    /// Tries, in order: the exact alias, the alias with `.wav` appended, then
    /// a case-insensitive match against either form.
    pub fn lookup(&self, name: &str) -> Option<&Path> {
        let with_wav = format!("{}.wav", name);

        if let Some(voice) = self
            .aliases
            .get(name)
            .or_else(|| self.aliases.get(&with_wav))
        {
            return Some(voice.as_path());
        }

        let lowered = name.to_lowercase();
        let lowered_wav = with_wav.to_lowercase();
        self.aliases
            .iter()
            .find(|(alias, _)| {
                let alias = alias.to_lowercase();
                alias == lowered || alias == lowered_wav
            })
            .map(|(_, voice)| voice.as_path())
    }

    /// All aliases in sorted order.
    pub fn aliases(&self) -> Vec<String> {
        self.aliases.keys().cloned().collect()
    }

    /// Number of distinct files behind the aliases.
    pub fn file_count(&self) -> usize {
        self.aliases
            .values()
            .map(PathBuf::as_path)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            AUDIO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
