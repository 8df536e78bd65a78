//! Music directory enumeration

use anyhow::{Context, Result};
use sensemood_core::audio::AudioFormat;
use std::path::{Path, PathBuf};

/// All supported audio files under `root`, recursively, sorted by file name
pub fn find_audio_files(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        anyhow::bail!("Music directory not found: {}", root.display());
    }

    let mut files = Vec::new();
    collect(root, &mut files)?;

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

    log::info!("Found {} audio files under {}", files.len(), root.display());
    Ok(files
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect())
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect(&path, files)?;
        } else if AudioFormat::from_path(&path) != AudioFormat::Unknown {
            files.push(path);
        } else {
            log::debug!("Ignoring {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_sorted_and_filtered() {
        let root = std::env::temp_dir().join(format!("sensemood-scan-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(root.join("album")).unwrap();

        for name in ["c.mp3", "notes.txt", "album/a.flac", "album/b.WAV", "cover.jpg"] {
            std::fs::write(root.join(name), b"").unwrap();
        }

        let files = find_audio_files(&root).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| Path::new(f).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.flac", "b.WAV", "c.mp3"]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_directory() {
        assert!(find_audio_files(Path::new("/definitely/not/a/music/dir")).is_err());
    }
}
