use std::path::Path;

use image::{ImageReader, RgbImage};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Serializes an object to a pretty-printed JSON file.
pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<()> {
    let path = output_path.as_ref();
    let j = serde_json::to_string_pretty(object)?;
    std::fs::write(path, j).map_err(|e| Error::io(path, e))
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let path = file_path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Decodes an image by its content rather than its extension.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| Error::io(path, e))?;
    Ok(reader.decode()?.to_rgb8())
}

/// Writes `frame` as `frame_{index:06}.png` under `dir`.
pub fn save_frame(dir: impl AsRef<Path>, index: usize, frame: &RgbImage) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    frame.save(dir.join(format!("frame_{:06}.png", index)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_json_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        object_to_json(&path, &vec![1, 2, 3]).unwrap();
        let v: Vec<i32> = object_from_json(&path).unwrap();
        assert_eq!(v, [1, 2, 3]);
        let missing: Result<Vec<i32>> = object_from_json(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::Io { .. })));
    }

    #[test]
    fn test_save_frame_naming() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        save_frame(&out, 7, &RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))).unwrap();
        let back = load_rgb(out.join("frame_000007.png")).unwrap();
        assert_eq!(*back.get_pixel(0, 0), Rgb([1, 2, 3]));
    }
}
