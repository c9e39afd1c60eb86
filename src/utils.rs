use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use unicode_normalization::UnicodeNormalization;

use crate::errors::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pdf"];

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let pwd_hash = Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            AppError::PasswordError(e.to_string())
        })?
        .to_string();
    Ok(pwd_hash)
}

/// Checks `provided` against a PHC hash string. A stored value that is not a
/// valid hash is an error, a mismatch is `Ok(false)`.
pub fn verify_password(provided: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        log::error!("Failed to parse stored password hash: {}", e);
        AppError::PasswordError(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(provided.as_bytes(), &parsed)
        .is_ok())
}

pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Reduces a client supplied file name to a flat ASCII name that is safe to
/// join onto the upload directory. Accented letters keep their base letter
/// (NFKD, combining marks dropped). Returns an empty string when nothing
/// usable is left.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .nfkd()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("s3nha-forte!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3nha-forte!", &hash).unwrap());
        assert!(!verify_password("outra", &hash).unwrap());
    }

    #[test]
    fn verify_errors_on_plaintext_value() {
        assert!(verify_password("admin", "admin").is_err());
    }

    #[test]
    fn allowed_file_is_case_insensitive() {
        assert!(allowed_file("nota.PDF"));
        assert!(allowed_file("foto.final.JpEg"));
        assert!(allowed_file("recibo.png"));
        assert!(!allowed_file("virus.exe"));
        assert!(!allowed_file("semextensao"));
        assert!(!allowed_file("arquivo.pdf.zip"));
    }

    #[test]
    fn secure_filename_strips_paths_and_odd_chars() {
        assert_eq!(secure_filename("My cool receipt.pdf"), "My_cool_receipt.pdf");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(secure_filename("recibo$%.png"), "recibo.png");
        assert_eq!(secure_filename(".."), "");
    }

    #[test]
    fn secure_filename_transliterates_accents() {
        assert_eq!(secure_filename("Recibo Almoço.JPG"), "Recibo_Almoco.JPG");
        assert_eq!(secure_filename("pão de açúcar.pdf"), "pao_de_acucar.pdf");
        assert_eq!(secure_filename("ﬁscal.png"), "fiscal.png");
        assert_eq!(secure_filename("日本.pdf"), "pdf");
    }
}
