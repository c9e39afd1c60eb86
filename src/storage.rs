use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::{
    errors::AppError,
    utils::{allowed_file, secure_filename},
};

/// Flat directory of receipt files keyed by sanitized file name.
#[derive(Debug, Clone)]
pub struct ReceiptStore {
    root: PathBuf,
}

impl ReceiptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            log::error!("Failed to create upload dir {:?}: {}", self.root, e);
            AppError::IoError(e)
        })
    }

    /// Writes `body` for `owner_id` and returns the stored name,
    /// `{owner_id}_{sanitized}` or `{owner_id}_{n}_{sanitized}` when that is
    /// taken. Existing files are never replaced, so every stored name belongs
    /// to exactly one upload. Disallowed or unusable names store nothing and
    /// return `None`.
    pub async fn save(
        &self,
        owner_id: i64,
        filename: &str,
        body: &[u8],
    ) -> Result<Option<String>, AppError> {
        if !allowed_file(filename) {
            log::info!("Ignoring receipt with disallowed name {:?}", filename);
            return Ok(None);
        }
        let sanitized = secure_filename(filename);
        if !allowed_file(&sanitized) {
            return Ok(None);
        }

        let mut attempt = 0u32;
        loop {
            let stored_name = match attempt {
                0 => format!("{}_{}", owner_id, sanitized),
                n => format!("{}_{}_{}", owner_id, n, sanitized),
            };
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&stored_name))
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    log::error!("Failed to create receipt {}: {}", stored_name, e);
                    return Err(AppError::IoError(e));
                }
            };
            file.write_all(body).await?;
            file.flush().await?;
            log::info!("Receipt stored as {}", stored_name);
            return Ok(Some(stored_name));
        }
    }

    /// Resolves a stored name to its path. Names that would not survive
    /// sanitization unchanged never leave the upload directory.
    pub fn resolve(&self, stored_name: &str) -> Option<PathBuf> {
        if stored_name.is_empty() || secure_filename(stored_name) != stored_name {
            return None;
        }
        Some(self.root.join(stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn save_sanitizes_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::new(dir.path());

        let stored = store.save(7, "../nota fiscal.PDF", b"%PDF-1.4").await.unwrap();
        assert_eq!(stored.as_deref(), Some("7_nota_fiscal.PDF"));
        let written = std::fs::read(dir.path().join("7_nota_fiscal.PDF")).unwrap();
        assert_eq!(written, b"%PDF-1.4");
    }

    #[actix_web::test]
    async fn same_name_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::new(dir.path());

        let ana = store.save(1, "nota.png", b"ana").await.unwrap().unwrap();
        let bia = store.save(2, "nota.png", b"bia").await.unwrap().unwrap();
        let ana_again = store.save(1, "nota.png", b"ana-2").await.unwrap().unwrap();

        assert_eq!(ana, "1_nota.png");
        assert_eq!(bia, "2_nota.png");
        assert_eq!(ana_again, "1_1_nota.png");
        for (name, body) in [
            (&ana, &b"ana"[..]),
            (&bia, &b"bia"[..]),
            (&ana_again, &b"ana-2"[..]),
        ] {
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), body);
            assert!(store.resolve(name).is_some());
        }
    }

    #[actix_web::test]
    async fn save_skips_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReceiptStore::new(dir.path());

        assert_eq!(store.save(1, "setup.exe", b"MZ").await.unwrap(), None);
        assert_eq!(store.save(1, ".pdf", b"x").await.unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = ReceiptStore::new("uploads");
        assert_eq!(
            store.resolve("recibo.png"),
            Some(PathBuf::from("uploads").join("recibo.png"))
        );
        assert_eq!(store.resolve("../database.db"), None);
        assert_eq!(store.resolve("sub/recibo.png"), None);
        assert_eq!(store.resolve(""), None);
    }
}
