//! Pixel-dimension extraction over a dedicated rayon pool

use crate::error::Result;
use crate::library::ImageRecord;
use crate::scanner::walk::WalkedFile;
use rayon::prelude::*;
use std::path::Path;

/// Read width and height from the image header
pub fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    Ok(image::image_dimensions(path)?)
}

pub struct MetadataExtractor {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl MetadataExtractor {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("gallery-scan-{idx}"))
            .build()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Build records for `files` in parallel. Files whose header cannot be
    /// read are logged and left out; the second value counts them.
    pub fn extract(&self, files: Vec<(String, WalkedFile)>) -> (Vec<ImageRecord>, usize) {
        if files.is_empty() {
            return (Vec::new(), 0);
        }

        let total = files.len();
        let records: Vec<ImageRecord> = self.pool.install(|| {
            files
                .into_par_iter()
                .filter_map(|(rel, file)| match image_dimensions(&file.absolute) {
                    Ok((width, height)) => Some(ImageRecord::new(rel, file.mtime, width, height)),
                    Err(e) => {
                        tracing::warn!(path = %file.absolute.display(), "metadata extraction failed: {e}");
                        None
                    }
                })
                .collect()
        });

        let failed = total - records.len();
        (records, failed)
    }
}

impl std::fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataExtractor")
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Orientation;
    use std::fs;
    use tempfile::TempDir;

    fn png(path: &Path, width: u32, height: u32) -> WalkedFile {
        image::RgbImage::new(width, height).save(path).unwrap();
        WalkedFile {
            absolute: path.to_path_buf(),
            mtime: 1.0,
        }
    }

    #[test]
    fn test_image_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wide.png");
        png(&path, 4, 2);
        assert_eq!(image_dimensions(&path).unwrap(), (4, 2));
    }

    #[test]
    fn test_extract_skips_unreadable_files() {
        let temp_dir = TempDir::new().unwrap();
        let wide = png(&temp_dir.path().join("wide.png"), 6, 3);
        let tall = png(&temp_dir.path().join("tall.png"), 3, 6);
        let broken_path = temp_dir.path().join("broken.jpg");
        fs::write(&broken_path, b"not an image").unwrap();
        let broken = WalkedFile {
            absolute: broken_path,
            mtime: 1.0,
        };

        let extractor = MetadataExtractor::new(2).unwrap();
        let (mut records, failed) = extractor.extract(vec![
            ("wide.png".to_string(), wide),
            ("tall.png".to_string(), tall),
            ("broken.jpg".to_string(), broken),
        ]);
        records.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(failed, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "tall.png");
        assert_eq!(records[0].orientation(), Orientation::Portrait);
        assert_eq!(records[1].orientation(), Orientation::Landscape);
    }
}
