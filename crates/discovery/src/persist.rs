use std::path::Path;

use tracing::warn;

/// Write `data` to `path` via temp file + rename so readers never observe a
/// partially-written file. The file is created `0600` on unix.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|error| {
            warn!(path = %parent.display(), error = %error, "failed to create directory");
            error
        })?;
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("json.tmp.{nanos}"));
    tokio::fs::write(&temp_path, data).await.map_err(|error| {
        warn!(path = %temp_path.display(), error = %error, "failed to write temp file");
        error
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .await;
    }

    if let Err(error) = tokio::fs::rename(&temp_path, path).await {
        warn!(
            temp_path = %temp_path.display(),
            path = %path.display(),
            error = %error,
            "failed to atomically replace file"
        );
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(error);
    }
    Ok(())
}
