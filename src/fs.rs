use std::{
    io,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use tokio::io::AsyncWriteExt;

/// Reduces a client-supplied name to its last path component.
///
/// Both `/` and `\` count as separators. Names with nothing usable left
/// (empty, `.`, `..`, or containing NUL) yield `None`.
pub fn basename(name: &str) -> Option<&str> {
    let last = name.split(['/', '\\']).filter(|s| !s.is_empty()).last()?;
    match last {
        "." | ".." => None,
        s if s.contains('\0') => None,
        s => Some(s),
    }
}

/// Where `name` lives inside the served directory.
pub fn served_path(directory: &Path, name: &str) -> Option<PathBuf> {
    basename(name).map(|base| directory.join(base))
}

pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

pub async fn read_file(path: &Path) -> io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

/// Creates or truncates `path` and writes `data` to it.
pub async fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    log::info!("File {} saved successfully", path.display());
    Ok(())
}

/// `ls -l`-style listing: a `total` line, then kind, size, mtime and name per entry.
pub async fn list_directory(path: &Path) -> io::Result<String> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(path).await?;
    while let Some(entry) = dir.next_entry().await? {
        let meta = tokio::fs::symlink_metadata(entry.path()).await?;
        let kind = if meta.is_dir() {
            'd'
        } else if meta.file_type().is_symlink() {
            'l'
        } else {
            '-'
        };
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        entries.push((
            entry.file_name().to_string_lossy().into_owned(),
            kind,
            meta.len(),
            modified,
        ));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut listing = format!("total {}\n", entries.len());
    for (name, kind, size, modified) in entries {
        listing.push_str(&format!("{} {:>12} {:>12} {}\n", kind, size, modified, name));
    }
    Ok(listing)
}
