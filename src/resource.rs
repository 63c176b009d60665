use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

const VALID_INDEXES: [&str; 2] = ["index.html", "index.htm"];
const MAX_URI_LEN: usize = 255;
/// Owner read/write/execute bits (S_IRWXU) — the server only serves files
/// and directories it itself owns.
const S_IRWXU: u32 = 0o700;

/// A resolved, fully-loaded resource: either a file's bytes or a
/// generated directory listing. Stateless with respect to the request
/// that produced it — callers own the result outright.
pub struct Resource {
    pub name: String,
    pub mime_type: String,
    pub body: Vec<u8>,
    pub is_listing: bool,
}

/// Maps URIs to files under one disk root. One `ResourceHost` is shared
/// by every vhost alias that points at the same docroot; resolution has
/// no memory of prior requests.
pub struct ResourceHost {
    base_disk_path: PathBuf,
}

impl ResourceHost {
    pub fn new(base_disk_path: impl Into<PathBuf>) -> Self {
        Self {
            base_disk_path: base_disk_path.into(),
        }
    }

    pub fn base_disk_path(&self) -> &Path {
        &self.base_disk_path
    }

    /// Resolve `uri` (the request-line path, e.g. `/a/b.html`) against the
    /// docroot. Returns `None` for anything not found, outside the
    /// docroot, hidden, or not owned by the server process.
    pub fn get_resource(&self, uri: &str) -> Option<Resource> {
        if uri.is_empty() || uri.len() > MAX_URI_LEN {
            return None;
        }
        if uri.contains("../") || uri.contains("/..") {
            return None;
        }

        let path = join_uri(&self.base_disk_path, uri);
        let meta = fs::metadata(&path).ok()?;

        if meta.is_dir() {
            self.read_directory(&path, uri)
        } else if meta.is_file() {
            self.read_file(&path, &meta)
        } else {
            None
        }
    }

    fn read_file(&self, path: &Path, meta: &fs::Metadata) -> Option<Resource> {
        if meta.mode() & S_IRWXU == 0 {
            return None;
        }

        let name = path.file_name()?.to_str()?.to_string();
        if name.starts_with('.') {
            return None;
        }

        let body = fs::read(path).ok()?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let mime_type = lookup_mime_type(extension)
            .unwrap_or("application/octet-stream")
            .to_string();

        Some(Resource {
            name,
            mime_type,
            body,
            is_listing: false,
        })
    }

    fn read_directory(&self, path: &Path, uri: &str) -> Option<Resource> {
        for index in VALID_INDEXES {
            let candidate = path.join(index);
            if let Ok(meta) = fs::metadata(&candidate) {
                if meta.is_file() {
                    return self.read_file(&candidate, &meta);
                }
            }
        }

        let meta = fs::metadata(path).ok()?;
        if meta.mode() & S_IRWXU == 0 {
            return None;
        }

        let listing = self.generate_autoindex(path, uri)?;
        Some(Resource {
            name: uri.to_string(),
            mime_type: "text/html".to_string(),
            body: listing.into_bytes(),
            is_listing: true,
        })
    }

    /// Directory listing HTML, in the exact format clients depend on:
    /// a title/heading naming the URI, an `<hr/><br/>` separator, then one
    /// `<a href="...">name</a><br/>` per non-hidden entry.
    fn generate_autoindex(&self, path: &Path, uri: &str) -> Option<String> {
        let uri = if uri.ends_with('/') {
            uri.to_string()
        } else {
            format!("{uri}/")
        };

        let mut out = String::new();
        out.push_str("<html><head><title>");
        out.push_str(&uri);
        out.push_str("</title></head><body>");
        out.push_str("<h1>Index of ");
        out.push_str(&uri);
        out.push_str("</h1><hr /><br />");

        let mut entries: Vec<String> = fs::read_dir(path)
            .ok()?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        entries.sort();

        for name in entries {
            out.push_str(&format!("<a href=\"{uri}{name}\">{name}</a><br />"));
        }

        out.push_str("</body></html>");
        Some(out)
    }
}

fn join_uri(base: &Path, uri: &str) -> PathBuf {
    base.join(uri.trim_start_matches('/'))
}

/// Extension (without leading dot) -> MIME type.
fn lookup_mime_type(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("httpserver_resource_test_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn serves_a_plain_file() {
        let dir = scratch_dir("plain_file");
        fs::write(dir.join("a.txt"), b"hello").unwrap();
        let host = ResourceHost::new(&dir);
        let res = host.get_resource("/a.txt").unwrap();
        assert_eq!(res.body, b"hello");
        assert_eq!(res.mime_type, "text/plain");
        assert!(!res.is_listing);
    }

    #[test]
    fn rejects_traversal() {
        let dir = scratch_dir("traversal");
        let host = ResourceHost::new(&dir);
        assert!(host.get_resource("/../etc/passwd").is_none());
        assert!(host.get_resource("/a/../../b").is_none());
    }

    #[test]
    fn rejects_hidden_files() {
        let dir = scratch_dir("hidden");
        fs::write(dir.join(".secret"), b"nope").unwrap();
        let host = ResourceHost::new(&dir);
        assert!(host.get_resource("/.secret").is_none());
    }

    #[test]
    fn serves_index_html_for_directory() {
        let dir = scratch_dir("index");
        fs::write(dir.join("index.html"), b"<p>hi</p>").unwrap();
        let host = ResourceHost::new(&dir);
        let res = host.get_resource("/").unwrap();
        assert_eq!(res.body, b"<p>hi</p>");
        assert!(!res.is_listing);
    }

    #[test]
    fn generates_autoindex_when_no_index_file() {
        let dir = scratch_dir("autoindex");
        fs::write(dir.join("one.txt"), b"1").unwrap();
        fs::write(dir.join(".hidden"), b"2").unwrap();
        let host = ResourceHost::new(&dir);
        let res = host.get_resource("/").unwrap();
        assert!(res.is_listing);
        let html = String::from_utf8(res.body).unwrap();
        assert!(html.contains("<hr /><br />"));
        assert!(html.contains("<a href=\"/one.txt\">one.txt</a><br />"));
        assert!(!html.contains(".hidden"));
    }

    #[test]
    fn missing_resource_returns_none() {
        let dir = scratch_dir("missing");
        let host = ResourceHost::new(&dir);
        assert!(host.get_resource("/nope.txt").is_none());
    }
}
