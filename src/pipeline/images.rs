//! Stage 3: move extracted images into the shared images directory.
//!
//! MinerU leaves page images inside its scratch tree, which is deleted once
//! the document is done. Each image is copied to
//! `<images_dir>/<stem>_img<N><ext>` (numbered in discovery order, one pass
//! per extension) and the Markdown is re-linked to the copies.
//!
//! Re-linking is a best-effort text substitution over two reference forms:
//!
//! ```text
//! ![alt](images/abc123.jpg)          → ![alt](../images/report_img1.jpg)
//! <img src="images/abc123.jpg" …>    → <img src="../images/report_img1.jpg" …>
//! ```
//!
//! A failed rewrite is logged and leaves the Markdown untouched; it never
//! fails the document.

use super::ImageRelocator;
use crate::error::JobError;
use crate::paths::relative_image_dir;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions collected from the scratch tree, in pass order.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// Any Markdown or HTML image reference at all.
static ANY_IMAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)!\[[^\]]*\]\(|<img\b").unwrap());

/// Default [`ImageRelocator`]: scans the extractor's scratch directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScratchImageRelocator;

impl ImageRelocator for ScratchImageRelocator {
    fn relocate(
        &self,
        markdown_path: &Path,
        scratch_dir: &Path,
        images_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, JobError> {
        fs::create_dir_all(images_dir).map_err(|e| JobError::io(images_dir, e))?;

        let mut extracted = Vec::new();
        let mut mapping = ImageMapping::default();

        for ext in IMAGE_EXTENSIONS {
            for source in find_images(scratch_dir, ext) {
                let suffix = source
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| ext.to_string());
                let new_name = format!("{stem}_img{}.{suffix}", extracted.len() + 1);
                let target = images_dir.join(&new_name);

                if source != target {
                    fs::copy(&source, &target).map_err(|e| JobError::io(&target, e))?;
                }

                if let Ok(rel) = source.strip_prefix(scratch_dir) {
                    mapping.insert(link_path(rel), &new_name);
                }
                if let Some(file_name) = source.file_name() {
                    mapping.insert(file_name.to_string_lossy().into_owned(), &new_name);
                }
                extracted.push(target);
            }
        }
        debug!(
            "Relocated {} image(s) from {}",
            extracted.len(),
            scratch_dir.display()
        );

        if !extracted.is_empty() && markdown_path.exists() {
            if let Err(e) = relink_file(markdown_path, images_dir, &mapping) {
                warn!(
                    "Failed to update image references in {}: {e}",
                    markdown_path.display()
                );
            }
        }
        Ok(extracted)
    }
}

/// Files under `dir` with extension `ext` (any case), in sorted walk order.
fn find_images(dir: &Path, ext: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect()
}

/// Old reference → new file name, in insertion order. Re-inserting a key
/// updates its target but keeps its position.
#[derive(Debug, Default)]
pub struct ImageMapping {
    entries: Vec<(String, String)>,
}

impl ImageMapping {
    pub fn insert(&mut self, old_ref: String, new_name: &str) {
        match self.entries.iter_mut().find(|(k, _)| *k == old_ref) {
            Some((_, v)) => *v = new_name.to_string(),
            None => self.entries.push((old_ref, new_name.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn relink_file(
    markdown_path: &Path,
    images_dir: &Path,
    mapping: &ImageMapping,
) -> Result<(), RelinkError> {
    let content = fs::read_to_string(markdown_path)?;
    let rel_dir = link_path(&relative_image_dir(markdown_path, images_dir));
    if let Some(updated) = rewrite_image_refs(&content, &rel_dir, mapping)? {
        fs::write(markdown_path, updated)?;
    }
    Ok(())
}

/// Point every image reference mentioning an old name at `rel_dir/new`.
///
/// Returns `None` when nothing matched.
pub fn rewrite_image_refs(
    content: &str,
    rel_dir: &str,
    mapping: &ImageMapping,
) -> Result<Option<String>, regex::Error> {
    if mapping.is_empty() || !ANY_IMAGE_REF.is_match(content) {
        return Ok(None);
    }

    let mut content = content.to_string();
    let mut modified = false;
    for (old_ref, new_name) in mapping.iter() {
        let target = if rel_dir.is_empty() {
            new_name.to_string()
        } else {
            format!("{rel_dir}/{new_name}")
        };
        let old = regex::escape(old_ref);

        let markdown = Regex::new(&format!(r"(?i)!\[([^\]]*)\]\(([^)]*{old}[^)]*)\)"))?;
        if markdown.is_match(&content) {
            content = markdown
                .replace_all(&content, |c: &Captures| format!("![{}]({target})", &c[1]))
                .into_owned();
            modified = true;
        }

        let html = Regex::new(&format!(
            r#"(?i)<img([^>]*)src=["']([^"']*{old}[^"']*)["']([^>]*)>"#
        ))?;
        if html.is_match(&content) {
            content = html
                .replace_all(&content, |c: &Captures| {
                    format!("<img{}src=\"{target}\"{}>", &c[1], &c[3])
                })
                .into_owned();
            modified = true;
        }
    }
    Ok(modified.then_some(content))
}

/// Forward-slash form of a relative path, as used in Markdown links.
fn link_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, thiserror::Error)]
enum RelinkError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Regex(#[from] regex::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> ImageMapping {
        let mut m = ImageMapping::default();
        for (k, v) in pairs {
            m.insert(k.to_string(), v);
        }
        m
    }

    #[test]
    fn rewrites_markdown_and_html_refs() {
        let md = "# Title\n\n![Figure 1](images/ab12.jpg)\n\n<img alt=\"x\" src='images/ab12.jpg' width=\"40\">\n";
        let out = rewrite_image_refs(md, "../images", &mapping(&[("ab12.jpg", "doc_img1.jpg")]))
            .unwrap()
            .unwrap();
        assert!(out.contains("![Figure 1](../images/doc_img1.jpg)"), "{out}");
        assert!(
            out.contains("<img alt=\"x\" src=\"../images/doc_img1.jpg\" width=\"40\">"),
            "{out}"
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let md = "![](IMAGES/AB12.JPG)";
        let out = rewrite_image_refs(md, "images", &mapping(&[("images/ab12.jpg", "d_img1.jpg")]))
            .unwrap()
            .unwrap();
        assert_eq!(out, "![](images/d_img1.jpg)");
    }

    #[test]
    fn untouched_when_nothing_matches() {
        let md = "![chart](images/other.png)";
        assert_eq!(
            rewrite_image_refs(md, "images", &mapping(&[("ab12.jpg", "d_img1.jpg")])).unwrap(),
            None
        );
        assert_eq!(
            rewrite_image_refs("plain text", "images", &mapping(&[("a.png", "b.png")])).unwrap(),
            None
        );
    }

    #[test]
    fn replacement_text_is_literal() {
        let md = "![x](a.png)";
        let out = rewrite_image_refs(md, "$1/images", &mapping(&[("a.png", "d_img1.png")]))
            .unwrap()
            .unwrap();
        assert_eq!(out, "![x]($1/images/d_img1.png)");
    }

    #[test]
    fn mapping_keeps_first_position() {
        let m = mapping(&[("a.png", "one"), ("b.png", "two"), ("a.png", "three")]);
        let entries: Vec<_> = m.iter().collect();
        assert_eq!(entries, [("a.png", "three"), ("b.png", "two")]);
    }

    #[test]
    fn relocates_and_relinks() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("markdown/sub/.mineru_temp_doc");
        let images_out = tmp.path().join("markdown/images");
        let md = tmp.path().join("markdown/sub/doc.md");

        fs::create_dir_all(scratch.join("doc/auto/images")).unwrap();
        fs::write(scratch.join("doc/auto/images/b.png"), b"png-b").unwrap();
        fs::write(scratch.join("doc/auto/images/a.jpg"), b"jpg-a").unwrap();
        fs::write(scratch.join("doc/auto/images/c.png"), b"png-c").unwrap();
        fs::write(scratch.join("doc/auto/notes.txt"), b"ignored").unwrap();
        fs::write(
            &md,
            "![](images/b.png)\n![](images/c.png)\n<img src=\"images/a.jpg\">\n",
        )
        .unwrap();

        let moved = ScratchImageRelocator
            .relocate(&md, &scratch, &images_out, "doc")
            .unwrap();

        assert_eq!(
            moved,
            vec![
                images_out.join("doc_img1.png"),
                images_out.join("doc_img2.png"),
                images_out.join("doc_img3.jpg"),
            ]
        );
        assert_eq!(fs::read(images_out.join("doc_img1.png")).unwrap(), b"png-b");
        assert_eq!(fs::read(images_out.join("doc_img3.jpg")).unwrap(), b"jpg-a");

        let text = fs::read_to_string(&md).unwrap();
        assert_eq!(
            text,
            "![](../images/doc_img1.png)\n![](../images/doc_img2.png)\n<img src=\"../images/doc_img3.jpg\">\n"
        );
    }

    #[test]
    fn no_images_leaves_markdown_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let md = tmp.path().join("doc.md");
        fs::write(&md, "![](images/x.png)").unwrap();

        let moved = ScratchImageRelocator
            .relocate(&md, &scratch, &tmp.path().join("images"), "doc")
            .unwrap();
        assert!(moved.is_empty());
        assert_eq!(fs::read_to_string(&md).unwrap(), "![](images/x.png)");
    }
}
