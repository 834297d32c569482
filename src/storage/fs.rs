use crate::auth::ANONYMOUS_LABEL;
use crate::browser::{ConsoleRecord, EventPayload};
use crate::config::is_valid_label;
use crate::crawler::NavigationEdge;
use crate::storage::beautify::format_script;
use crate::storage::traits::{ArtifactStore, StorageError, StorageResult};
use crate::storage::{sha256_hex, ArtifactMeta, CrawlManifest, PageArtifact};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filesystem artifact store rooted at `<output>/<site_id>/`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
    beautify_scripts: bool,
}

impl FsArtifactStore {
    /// Opens (creating if needed) the store of one site
    pub fn new(output_root: &Path, site_id: u32, beautify_scripts: bool) -> StorageResult<Self> {
        let root = output_root.join(site_id.to_string());
        fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        Ok(Self {
            root,
            beautify_scripts,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of a URL's artifact directory
    pub fn dir_name(url: &str) -> String {
        sha256_hex(url.as_bytes())
    }

    fn populate_page(&self, dir: &Path, page: &PageArtifact) -> StorageResult<()> {
        write_file(&dir.join("url.txt"), page.url.as_bytes())?;
        write_file(&dir.join("html.html"), page.html.as_bytes())?;
        if let Some(initial) = &page.html_initial {
            write_file(&dir.join("html_initial.html"), initial.as_bytes())?;
        }

        let scripts_dir = dir.join("scripts");
        fs::create_dir_all(&scripts_dir).map_err(|e| StorageError::io(&scripts_dir, e))?;
        let mut mappings = BTreeMap::new();
        for (i, script) in page.scripts.iter().enumerate() {
            let body = format_script(&script.body, self.beautify_scripts);
            write_file(&scripts_dir.join(format!("{}.js", i)), body.as_bytes())?;
            mappings.insert(i, script.source.mapping().to_string());
        }
        write_json(&scripts_dir.join("mappings.json"), &mappings)?;

        write_json(&dir.join("events.json"), &page.events)?;
        write_file(&dir.join("console.log"), console_log(page).as_bytes())?;
        write_file(&dir.join("events.out"), fired_events(page).as_bytes())?;
        write_json(&dir.join("requests.json"), &page.requests)?;
        write_json(&dir.join("cookies.json"), &page.cookies)?;
        write_json(&dir.join("document_props.json"), &page.document_props)?;
        write_json(&dir.join("artifact.json"), &ArtifactMeta::from(page))?;

        Ok(())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write_page(&mut self, page: &PageArtifact) -> StorageResult<PathBuf> {
        let target = self.page_dir(&page.url);
        let staging = tmp_path(&target);

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| StorageError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| StorageError::io(&staging, e))?;

        if let Err(e) = self.populate_page(&staging, page) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if let Err(e) = replace_dir(&staging, &target) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        debug!(url = %page.url, dir = %target.display(), "Wrote page artifact");
        Ok(target)
    }

    fn page_dir(&self, url: &str) -> PathBuf {
        self.root.join(Self::dir_name(url))
    }

    fn write_urls(&mut self, urls: &[String]) -> StorageResult<()> {
        let mut body = String::new();
        for url in urls {
            body.push_str(url);
            body.push('\n');
        }
        write_file(&self.root.join("urls"), body.as_bytes())
    }

    fn write_navigation_graph(&mut self, edges: &[NavigationEdge]) -> StorageResult<()> {
        let mut body = String::new();
        for edge in edges {
            let _ = writeln!(body, "{}\t{}\t{}", edge.src, edge.dst, edge.depth);
        }
        write_file(&self.root.join("navigation_graph"), body.as_bytes())
    }

    fn write_manifest(&mut self, manifest: &CrawlManifest) -> StorageResult<()> {
        let label = if manifest.label.is_empty() {
            ANONYMOUS_LABEL
        } else {
            manifest.label.as_str()
        };
        if !is_valid_label(label) {
            return Err(StorageError::InvalidName(label.to_string()));
        }
        write_json(&self.root.join(format!("crawl_{}.json", label)), manifest)
    }
}

fn console_log(page: &PageArtifact) -> String {
    let mut body = String::new();
    for record in &page.console {
        let _ = writeln!(
            body,
            "{}\t{}\t{}\t{}",
            record.timestamp.to_rfc3339(),
            record.level,
            record.source,
            single_line(record)
        );
    }
    body
}

/// Extension-emitted console lines only, one message per line
fn fired_events(page: &PageArtifact) -> String {
    let mut body = String::new();
    for record in page.console.iter().filter(|r| r.from_extension) {
        body.push_str(&single_line(record));
        body.push('\n');
    }
    body
}

fn single_line(record: &ConsoleRecord) -> String {
    let message = match &record.message {
        EventPayload::Raw(text) => text.clone(),
        EventPayload::Structured(value) => value.to_string(),
    };
    message.replace('\n', "\\n")
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Moves the `staging` directory to `target`, replacing any previous one
///
/// A directory cannot be renamed over a non-empty one, so the previous
/// directory is first parked at `<target>.old`. If `staging` cannot be moved
/// into place the parked directory is restored; `target` is never left
/// missing when it existed before.
fn replace_dir(staging: &Path, target: &Path) -> StorageResult<()> {
    let parked = sibling_path(target, ".old");
    if parked.exists() {
        fs::remove_dir_all(&parked).map_err(|e| StorageError::io(&parked, e))?;
    }

    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &parked).map_err(|e| StorageError::io(target, e))?;
    }

    if let Err(e) = fs::rename(staging, target) {
        if had_previous {
            if let Err(restore) = fs::rename(&parked, target) {
                warn!(dir = %target.display(), "Failed to restore previous artifact: {}", restore);
            }
        }
        return Err(StorageError::io(target, e));
    }

    if had_previous {
        if let Err(e) = fs::remove_dir_all(&parked) {
            warn!(dir = %parked.display(), "Failed to remove replaced artifact: {}", e);
        }
    }
    Ok(())
}

/// Writes `<path>.tmp` and renames it to `path`
fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, data).map_err(|e| StorageError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let body = serde_json::to_vec_pretty(value)?;
    write_file(path, &body)
}
