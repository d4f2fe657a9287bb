// utils/uploads.rs
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: [&str; 9] = ["png", "jpg", "jpeg", "pdf", "mp3", "wav", "ogg", "opus", "m4a"];

pub const DOCUMENTS_DIR: &str = "documents";
pub const CERT_DOCS_DIR: &str = "cert_docs";
pub const VOICE_SAMPLES_DIR: &str = "voice_samples";

/// Lower-cased extension if the filename carries an allowed one.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Keeps ASCII alphanumerics, dashes and underscores; spaces become underscores.
pub fn secure_filename(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            ' ' => Some('_'),
            _ => None,
        })
        .collect()
}

pub fn document_filename(document_type: &str, user_id: Uuid, timestamp: i64, ext: &str) -> String {
    format!("{}_{}_{}.{}", secure_filename(document_type), user_id, timestamp, ext)
}

pub fn certification_filename(cert_name: &str, user_id: Uuid, timestamp: i64, ext: &str) -> String {
    format!("cert_{}_{}_{}.{}", secure_filename(cert_name), user_id, timestamp, ext)
}

pub fn voice_sample_filename(timestamp: i64) -> String {
    format!("voice_reg_{}.ogg", timestamp)
}

/// Stores `bytes` under `root/category/user_id/filename` and returns the
/// stored path relative to the category folder (`{user_id}/{filename}`).
pub async fn save_user_file(
    root: &str,
    category: &str,
    user_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> Result<String, std::io::Error> {
    let dir = Path::new(root).join(category).join(user_id.to_string());
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(filename), bytes).await?;
    Ok(format!("{}/{}", user_id, filename))
}

pub async fn remove_user_file(root: &str, category: &str, relative: &str) {
    let path = Path::new(root).join(category).join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Validates a `{owner_uuid}/{filename}` path and returns the owner id.
pub fn parse_owned_path(relative: &str) -> Option<(Uuid, String)> {
    let relative = relative.trim_start_matches('/');
    let path = Path::new(relative);
    if path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }

    let (owner, filename) = relative.split_once('/')?;
    if filename.is_empty() || filename.contains('/') {
        return None;
    }
    let owner_id = Uuid::parse_str(owner).ok()?;
    Some((owner_id, filename.to_string()))
}

pub fn resolve_path(root: &str, category: &str, relative: &str) -> PathBuf {
    Path::new(root).join(category).join(relative)
}

pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("scan.PDF").as_deref(), Some("pdf"));
        assert_eq!(allowed_extension("photo.final.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("voice.opus").as_deref(), Some("opus"));
        assert_eq!(allowed_extension("script.exe"), None);
        assert_eq!(allowed_extension("noextension"), None);
    }

    #[test]
    fn test_filenames() {
        let user_id = Uuid::nil();
        assert_eq!(
            document_filename("aadhaar", user_id, 1700000000, "pdf"),
            format!("aadhaar_{}_1700000000.pdf", user_id)
        );
        assert_eq!(
            certification_filename("Electrical Safety L1", user_id, 1, "png"),
            format!("cert_Electrical_Safety_L1_{}_1.png", user_id)
        );
        assert_eq!(voice_sample_filename(42), "voice_reg_42.ogg");
        assert_eq!(secure_filename("../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn test_parse_owned_path_rejects_traversal() {
        let id = Uuid::new_v4();
        let (owner, file) = parse_owned_path(&format!("{}/aadhaar_1.pdf", id)).unwrap();
        assert_eq!(owner, id);
        assert_eq!(file, "aadhaar_1.pdf");

        assert!(parse_owned_path(&format!("{}/../secret.pdf", id)).is_none());
        assert!(parse_owned_path("../../etc/passwd").is_none());
        assert!(parse_owned_path("not-a-uuid/file.pdf").is_none());
        assert!(parse_owned_path(&format!("{}/a/b.pdf", id)).is_none());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a.m4a"), "audio/mp4");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_save_and_remove_user_file() {
        let root = std::env::temp_dir().join(format!("sb-uploads-{}", Uuid::new_v4()));
        let root = root.to_string_lossy().to_string();
        let user_id = Uuid::new_v4();

        let relative = save_user_file(&root, DOCUMENTS_DIR, user_id, "pan_1.pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(relative, format!("{}/pan_1.pdf", user_id));

        let path = resolve_path(&root, DOCUMENTS_DIR, &relative);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF");

        remove_user_file(&root, DOCUMENTS_DIR, &relative).await;
        assert!(!path.exists());
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
