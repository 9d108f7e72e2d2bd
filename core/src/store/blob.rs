// tidemark/src/store/blob.rs

use rand::distributions::Alphanumeric;
use rand::Rng;

/// `{unix_millis}-{random}.{ext}`, unique enough for user uploads landing in the same prefix.
pub fn blob_file_name(ext: &str) -> String {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(8)
    .map(|b| char::from(b).to_ascii_lowercase())
    .collect();
  let ext = ext.trim_start_matches('.').to_ascii_lowercase();
  format!("{}-{}.{}", chrono::Utc::now().timestamp_millis(), suffix, ext)
}

/// Joins a prefix such as `cards/front/` with a fresh file name.
pub fn blob_path(prefix: &str, ext: &str) -> String {
  format!("{}/{}", prefix.trim_end_matches('/'), blob_file_name(ext))
}

/// Extension of an uploaded file name, defaulting to `bin`.
pub fn extension_of(file_name: &str) -> &str {
  match file_name.rsplit_once('.') {
    Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
    _ => "bin",
  }
}
