//! Resource locations referenced from inside a glTF document
//!
//! Buffers and images are either embedded (`data:` URIs, GLB binary chunk)
//! or live next to the document and are fetched relative to its path.

use armenu_core::LoadError;
use base64::Engine;
use futures_util::future::LocalBoxFuture;

/// Fetches raw bytes for a resolved URL
pub trait ResourceFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>>;
}

/// Resolve `uri` relative to the document at `base`
pub fn resolve_uri(base: &str, uri: &str) -> String {
    if uri.starts_with('/') || has_scheme(uri) {
        return uri.to_string();
    }

    let dir = match base.rfind('/') {
        Some(i) => &base[..=i],
        None => "",
    };
    let (origin, path) = split_origin(dir);
    format!("{}{}", origin, normalize(&format!("{}{}", path, uri)))
}

/// Decode a `data:` URI; `None` when `uri` is not one
pub fn decode_data_uri(uri: &str) -> Option<Result<Vec<u8>, String>> {
    let rest = uri.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some(Err("data URI without payload".into()));
    };

    if header.ends_with(";base64") {
        Some(
            base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| format!("invalid base64 payload: {}", e)),
        )
    } else {
        Some(Ok(payload.as_bytes().to_vec()))
    }
}

/// `scheme:` prefix as in `https:`, `blob:` or `data:`
fn has_scheme(uri: &str) -> bool {
    match uri.find(':') {
        Some(i) if i > 0 => uri[..i]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Split `https://host/a/b/` into (`https://host`, `/a/b/`)
fn split_origin(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(i) => {
            let host_end = url[i + 3..].find('/').map_or(url.len(), |j| i + 3 + j);
            url.split_at(host_end)
        }
        None => ("", url),
    }
}

/// Collapse `.` and `..` segments
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_resolution() {
        assert_eq!(resolve_uri("/models/pzza/scene.gltf", "scene.bin"), "/models/pzza/scene.bin");
        assert_eq!(
            resolve_uri("/models/pzza/scene.gltf", "textures/base_color.jpeg"),
            "/models/pzza/textures/base_color.jpeg"
        );
        assert_eq!(resolve_uri("/models/pzza/scene.gltf", "../shared/a.png"), "/models/shared/a.png");
        assert_eq!(resolve_uri("/models/pzza/scene.gltf", "./scene.bin"), "/models/pzza/scene.bin");
        assert_eq!(resolve_uri("scene.gltf", "scene.bin"), "scene.bin");
        assert_eq!(resolve_uri("a/scene.gltf", "../../x.bin"), "../x.bin");
    }

    #[test]
    fn test_absolute_uris_pass_through() {
        assert_eq!(resolve_uri("/models/a.gltf", "/cdn/b.bin"), "/cdn/b.bin");
        assert_eq!(
            resolve_uri("/models/a.gltf", "https://cdn.example.com/b.bin"),
            "https://cdn.example.com/b.bin"
        );
        assert_eq!(resolve_uri("/models/a.gltf", "data:,abc"), "data:,abc");
    }

    #[test]
    fn test_resolution_under_origin() {
        assert_eq!(
            resolve_uri("https://cdn.example.com/menu/pzza/scene.gltf", "../tex/a.png"),
            "https://cdn.example.com/menu/tex/a.png"
        );
        assert_eq!(
            resolve_uri("https://cdn.example.com/scene.gltf", "scene.bin"),
            "https://cdn.example.com/scene.bin"
        );
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(decode_data_uri("scene.bin"), None);
        assert_eq!(
            decode_data_uri("data:application/octet-stream;base64,AAECAw=="),
            Some(Ok(vec![0, 1, 2, 3]))
        );
        assert_eq!(decode_data_uri("data:text/plain,hi"), Some(Ok(b"hi".to_vec())));
        assert!(matches!(decode_data_uri("data:;base64,***"), Some(Err(_))));
        assert!(matches!(decode_data_uri("data:nothing"), Some(Err(_))));
    }
}
