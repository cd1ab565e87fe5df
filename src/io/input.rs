use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use walkdir::WalkDir;

use crate::models::{Attachment, InputPayload, InputRecord, MediaKind};

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "aac", "ogg", "flac"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Media kind by extension; anything that is not known audio is text
pub fn detect_media_kind(path: &Path) -> MediaKind {
    if AUDIO_EXTENSIONS.contains(&extension(path).as_str()) {
        MediaKind::Audio
    } else {
        MediaKind::Text
    }
}

fn audio_mime_type(ext: &str) -> &'static str {
    match ext {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "audio/wav",
    }
}

/// Whether a batch should pick up this file
pub fn is_supported(path: &Path) -> bool {
    let ext = extension(path);
    ext == "txt" || AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Load one file as a pipeline input
pub fn load_input(path: &Path) -> Result<InputRecord> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file path: {:?}", path))?;

    let payload = match detect_media_kind(path) {
        MediaKind::Audio => {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read audio file: {:?}", path))?;
            InputPayload::Audio(Attachment {
                mime_type: audio_mime_type(&extension(path)).to_string(),
                data,
            })
        }
        MediaKind::Text => {
            if extension(path) != "txt" {
                bail!("Unsupported text-based file type: {:?}", path);
            }
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read text file: {:?}", path))?;
            InputPayload::Text(String::from_utf8_lossy(&bytes).trim().to_string())
        }
    };

    let mut record = InputRecord::new(file_name, payload);
    record.created_at = file_created_at(path);
    Ok(record)
}

/// Creation time where the platform records it, else modification time
fn file_created_at(path: &Path) -> Option<DateTime<Local>> {
    let metadata = std::fs::metadata(path).ok()?;
    let time = metadata.created().or_else(|_| metadata.modified()).ok()?;
    Some(DateTime::<Local>::from(time))
}

/// Collect supported files under `root`, text before audio, then by path
pub fn collect_inputs(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("Input path not found: {:?}", root);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk directory: {:?}", root))?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| {
        let rank = |p: &Path| match detect_media_kind(p) {
            MediaKind::Text => 0,
            MediaKind::Audio => 1,
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_media_kind() {
        assert_eq!(detect_media_kind(Path::new("call.WAV")), MediaKind::Audio);
        assert_eq!(detect_media_kind(Path::new("a/b/voice.m4a")), MediaKind::Audio);
        assert_eq!(detect_media_kind(Path::new("note.txt")), MediaKind::Text);
        assert_eq!(detect_media_kind(Path::new("README")), MediaKind::Text);
    }

    #[test]
    fn test_load_text_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complaint.txt");
        std::fs::write(&path, "  Client: still waiting for my refund\n").unwrap();

        let record = load_input(&path).unwrap();
        assert_eq!(record.file_name, "complaint.txt");
        assert_eq!(record.media_kind(), MediaKind::Text);
        assert_eq!(
            record.payload,
            InputPayload::Text("Client: still waiting for my refund".to_string())
        );
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_load_audio_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.mp3");
        std::fs::write(&path, [0x49, 0x44, 0x33]).unwrap();

        let record = load_input(&path).unwrap();
        let InputPayload::Audio(attachment) = record.payload else {
            panic!("expected audio");
        };
        assert_eq!(attachment.mime_type, "audio/mpeg");
        assert_eq!(attachment.data, vec![0x49, 0x44, 0x33]);
    }

    #[test]
    fn test_unsupported_text_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        assert!(load_input(&path).is_err());
    }

    #[test]
    fn test_collect_inputs_orders_text_first() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("week1");
        std::fs::create_dir(&nested).unwrap();
        for name in ["b.wav", "a.txt", "skip.pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.txt"), b"x").unwrap();

        let files = collect_inputs(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "week1/c.txt", "b.wav"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_inputs_ignores_symlink_cycles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("alias.txt")).unwrap();

        let files = collect_inputs(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.txt")]);
    }

    #[test]
    fn test_collect_missing_root() {
        assert!(collect_inputs(Path::new("/definitely/not/here")).is_err());
    }
}
