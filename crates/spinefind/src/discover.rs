//! Input discovery and output naming for the batch driver.

use std::io;
use std::path::{Path, PathBuf};

/// File extensions the driver picks up, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Whether `path` names an image the driver should process.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// List the image files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not searched. PNG files named like an earlier run's
/// outputs (`*_hough.png` and friends) are skipped; inputs in other formats
/// are kept whatever their stem.
///
/// # Errors
///
/// Returns the I/O error if `dir` cannot be read.
pub fn list_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if !is_image(&path) {
            continue;
        }
        if is_output(&path) {
            log::debug!("skipping {}: looks like an earlier output", path.display());
            continue;
        }
        found.push(path);
    }
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

/// Suffixes appended to the input stem for each kind of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Detected lines drawn over the input.
    Hough,
    /// The Canny edge map.
    Edges,
    /// Edges painted white over the input.
    Overlay,
    /// Probabilistic segments drawn over the input.
    Segments,
}

impl Output {
    const ALL: [Self; 4] = [Self::Hough, Self::Edges, Self::Overlay, Self::Segments];

    const fn suffix(self) -> &'static str {
        match self {
            Self::Hough => "_hough",
            Self::Edges => "_edges",
            Self::Overlay => "_overlay",
            Self::Segments => "_segments",
        }
    }
}

/// Whether `path` has the name [`output_path`] would give an output.
fn is_output(path: &Path) -> bool {
    let png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    png && path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| Output::ALL.iter().any(|o| stem.ends_with(o.suffix())))
}

/// Path of the `kind` output for `input`: `<stem><suffix>.png` in
/// `output_dir`, or next to the input when no directory is given.
pub fn output_path(input: &Path, output_dir: Option<&Path>, kind: Output) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".into(), |s| s.to_string_lossy());
    let name = format!("{stem}{}.png", kind.suffix());
    let dir = output_dir.unwrap_or_else(|| input.parent().unwrap_or_else(|| Path::new("")));
    dir.join(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extensions_match_case_insensitively() {
        assert!(is_image(Path::new("shelf.JPG")));
        assert!(is_image(Path::new("shelf.png")));
        assert!(is_image(Path::new("dir/shelf.Bmp")));
        assert!(is_image(Path::new("shelf.jpeg")));
        assert!(!is_image(Path::new("shelf.gif")));
        assert!(!is_image(Path::new("shelf")));
    }

    #[test]
    fn output_names_follow_the_stem() {
        let input = Path::new("photos/shelf.jpg");
        assert_eq!(
            output_path(input, None, Output::Hough),
            PathBuf::from("photos/shelf_hough.png")
        );
        assert_eq!(
            output_path(input, Some(Path::new("out")), Output::Overlay),
            PathBuf::from("out/shelf_overlay.png")
        );
        assert_eq!(
            output_path(Path::new("shelf.bmp"), None, Output::Segments),
            PathBuf::from("shelf_segments.png")
        );
    }

    #[test]
    fn previous_outputs_are_recognised() {
        assert!(is_output(Path::new("shelf_hough.png")));
        assert!(is_output(Path::new("shelf_edges.png")));
        assert!(is_output(Path::new("shelf_segments.PNG")));
        assert!(!is_output(Path::new("shelf.png")));
    }

    #[test]
    fn only_png_files_count_as_outputs() {
        assert!(!is_output(Path::new("shelf_edges.jpg")));
        assert!(!is_output(Path::new("shelf_hough.bmp")));
        assert!(!is_output(Path::new("shelf_overlay.jpeg")));
    }

    #[test]
    fn listing_is_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("spinefind-list-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in [
            "b.png",
            "a.JPG",
            "notes.txt",
            "c.bmp",
            "a_hough.png",
            "d_edges.jpg",
        ] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        std::fs::create_dir_all(dir.join("nested.png")).unwrap();

        let names: Vec<String> = list_images(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(names, ["a.JPG", "b.png", "c.bmp", "d_edges.jpg"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(list_images(Path::new("/definitely/not/here")).is_err());
    }
}
