//! Lookup of faces installed on the host, used as the registry's fallback
//! when a style names a family that was never registered.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static SYSTEM_FONT_INDEX: OnceLock<HashMap<String, PathBuf>> = OnceLock::new();

/// A face file found on the host.
#[derive(Debug)]
pub(crate) struct SystemFace {
    pub(crate) path: PathBuf,
    pub(crate) data: Vec<u8>,
    pub(crate) bold: bool,
}

/// First installed face for `family` (or the common CJK and Latin sans faces
/// after it) whose weight matches `bold`.
pub(crate) fn find_face(family: Option<&str>, bold: bool) -> Option<SystemFace> {
    let candidates: Vec<String> = face_file_candidates(family.unwrap_or(""), bold)
        .into_iter()
        .filter(|(_, is_bold)| *is_bold == bold)
        .map(|(name, _)| name)
        .collect();
    let names: Vec<&str> = candidates.iter().map(String::as_str).collect();
    find_named(&names).map(|(path, data)| SystemFace { path, data, bold })
}

/// First readable, parseable face among `file_names`.
pub(crate) fn find_named(file_names: &[&str]) -> Option<(PathBuf, Vec<u8>)> {
    let index = SYSTEM_FONT_INDEX.get_or_init(build_index);
    for file_name in file_names {
        let Some(path) = index.get(&file_name.to_ascii_lowercase()) else {
            continue;
        };
        let Ok(data) = std::fs::read(path) else {
            continue;
        };
        if ttf_parser::Face::parse(&data, 0).is_ok() {
            return Some((path.clone(), data));
        }
    }
    None
}

fn build_index() -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in font_dirs() {
        index_dir(&dir, 0, &mut index);
    }
    tracing::debug!(faces = index.len(), "indexed system fonts");
    index
}

fn index_dir(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    if depth > 4 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            index_dir(&path, depth + 1, index);
            continue;
        }
        let Some(name) = path.file_name().and_then(|v| v.to_str()) else {
            continue;
        };
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".ttf") || lower.ends_with(".otf") || lower.ends_with(".ttc") {
            index.entry(lower).or_insert(path);
        }
    }
}

/// `TEXTCARD_FONT_DIR` entries first, then the platform's font folders.
fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(extra) = std::env::var("TEXTCARD_FONT_DIR") {
        dirs.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join(".fonts"));
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}

pub(crate) const LATIN_FACES: &[(&str, &str)] = &[
    ("DejaVuSans.ttf", "DejaVuSans-Bold.ttf"),
    ("LiberationSans-Regular.ttf", "LiberationSans-Bold.ttf"),
    ("NotoSans-Regular.ttf", "NotoSans-Bold.ttf"),
    ("arial.ttf", "arialbd.ttf"),
];

const CJK_FACES: &[(&str, &str)] = &[
    ("SourceHanSansCN-Regular.otf", "SourceHanSansCN-Bold.otf"),
    ("SourceHanSansSC-Regular.otf", "SourceHanSansSC-Bold.otf"),
    ("NotoSansCJK-Regular.ttc", "NotoSansCJK-Bold.ttc"),
    ("NotoSansCJKsc-Regular.otf", "NotoSansCJKsc-Bold.otf"),
    ("NotoSansSC-Regular.otf", "NotoSansSC-Bold.otf"),
    ("msyh.ttc", "msyhbd.ttc"),
];

/// File names to try, most specific first, each tagged with whether the face
/// is bold.
fn face_file_candidates(family: &str, bold: bool) -> Vec<(String, bool)> {
    let mut out: Vec<(String, bool)> = Vec::new();
    let mut push = |name: String, is_bold: bool| {
        if !out.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
            out.push((name, is_bold));
        }
    };

    let compact: String = family.chars().filter(|ch| !ch.is_whitespace()).collect();
    if !compact.is_empty() {
        for ext in ["ttf", "otf", "ttc"] {
            if bold {
                push(format!("{compact}-Bold.{ext}"), true);
                push(format!("{compact}Bold.{ext}"), true);
            }
            push(format!("{compact}-Regular.{ext}"), false);
            push(format!("{compact}.{ext}"), false);
        }
    }

    for (regular, bold_face) in CJK_FACES.iter().chain(LATIN_FACES.iter()) {
        if bold {
            push((*bold_face).to_string(), true);
        }
        push((*regular).to_string(), false);
    }
    out
}
