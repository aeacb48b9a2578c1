use std::path::Path;

/// Stage `src` at `dst` without paying for a copy when both live on the
/// same filesystem.
pub async fn link_or_copy(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::hard_link(src, dst).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::debug!(
                "Could not hard link {} ({err}), copying instead",
                src.display()
            );
            tokio::fs::copy(src, dst).await.map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::link_or_copy;

    #[tokio::test]
    async fn staged_file_carries_the_source_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.mkv");
        let dst = dir.path().join("input.mkv");
        tokio::fs::write(&src, b"matroska").await.unwrap();

        link_or_copy(&src, &dst).await.unwrap();
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"matroska");
    }
}
