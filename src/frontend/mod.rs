//! Input sources and display output for the demo front end.
//!
//! Images arrive as a path, as uploaded bytes, or as one of the bundled
//! samples. Results go back as an original/colorized pair tagged with the
//! channel order of its arrays.

use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{imageops, ImageFormat, RgbImage};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::image::{load_image, to_rgb, BgrImage};

/// Channel order of the arrays in a [`Comparison`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue, green, red.
    Bgr,
}

impl ChannelOrder {
    /// Tag understood by display widgets.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bgr => "BGR",
        }
    }
}

/// The unprocessed input next to its colorized version.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub original: BgrImage,
    pub colorized: BgrImage,
    pub channel_order: ChannelOrder,
}

impl Comparison {
    /// Compose original (left) and colorized (right) into one RGB image.
    #[must_use]
    pub fn side_by_side(&self) -> RgbImage {
        let left = to_rgb(&self.original);
        let right = to_rgb(&self.colorized);

        let mut canvas = RgbImage::new(
            left.width() + right.width(),
            left.height().max(right.height()),
        );
        imageops::replace(&mut canvas, &left, 0, 0);
        imageops::replace(&mut canvas, &right, i64::from(left.width()), 0);
        canvas
    }
}

/// Sample images bundled with the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleImage {
    Portrait,
    Landscape,
    Street,
}

impl SampleImage {
    /// Every bundled sample.
    pub const ALL: [Self; 3] = [Self::Portrait, Self::Landscape, Self::Street];

    /// Short name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::Street => "street",
        }
    }

    /// File name inside the samples directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Portrait => "portrait.jpg",
            Self::Landscape => "landscape.jpg",
            Self::Street => "street.jpg",
        }
    }

    /// Full path of the sample inside `samples_dir`.
    #[must_use]
    pub fn path(self, samples_dir: &Path) -> PathBuf {
        samples_dir.join(self.file_name())
    }
}

impl fmt::Display for SampleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleImage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sample| sample.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidParameter {
                name: "sample".to_string(),
                reason: format!(
                    "unknown sample {s:?}, expected one of: {}",
                    Self::ALL.map(Self::name).join(", ")
                ),
            })
    }
}

/// Where an image comes from.
#[derive(Debug, Clone)]
pub enum Source {
    /// An image file on disk.
    Path(PathBuf),
    /// Raw uploaded bytes with the client-supplied file name.
    Upload { name: String, bytes: Vec<u8> },
    /// One of the bundled samples.
    Sample(SampleImage),
}

impl Source {
    /// Human readable name for logs.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Upload { name, .. } => format!("upload {name}"),
            Self::Sample(sample) => format!("sample {sample}"),
        }
    }

    /// File stem used to name outputs derived from this source.
    #[must_use]
    pub fn stem(&self) -> String {
        match self {
            Self::Path(path) => file_stem(path),
            Self::Upload { name, .. } => file_stem(Path::new(name)),
            Self::Sample(sample) => sample.name().to_string(),
        }
    }

    /// Decode the source into a BGR image.
    ///
    /// Uploads are staged in `upload_dir`, or the system temporary directory
    /// when it is `None`, and removed before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing, not an accepted upload
    /// format, or not decodable.
    pub fn load(&self, samples_dir: &Path, upload_dir: Option<&Path>) -> Result<BgrImage> {
        match self {
            Self::Path(path) => load_image(path),
            Self::Upload { name, bytes } => {
                let staged = StagedUpload::stage(name, bytes, upload_dir)?;
                tracing::info!("{}", staged.details());
                load_image(staged.path())
            }
            Self::Sample(sample) => load_image(sample.path(samples_dir)),
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Encoding used for written results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension, which also selects the encoder when saving.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(Error::InvalidParameter {
                name: "format".to_string(),
                reason: format!("unknown output format {other:?}, expected png or jpg"),
            }),
        }
    }
}

/// One output path per source, as `<stem>_colorized.<ext>` inside `dir`.
///
/// Sources sharing a stem get `_2`, `_3`, ... appended so no result
/// overwrites another.
#[must_use]
pub fn output_paths(dir: &Path, sources: &[Source], format: OutputFormat) -> Vec<PathBuf> {
    let mut taken = HashSet::new();

    sources
        .iter()
        .map(|source| {
            let stem = source.stem();
            let mut candidate = format!("{stem}_colorized");
            let mut n = 1;
            while !taken.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{stem}_colorized_{n}");
            }
            dir.join(format!("{candidate}.{}", format.extension()))
        })
        .collect()
}

/// Name, MIME type and size of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDetails {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
}

impl FileDetails {
    /// Inspect uploaded bytes. Only PNG and JPEG are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInput`] if the format is unrecognized and
    /// [`Error::UnsupportedFormat`] if it is neither PNG nor JPEG.
    pub fn inspect(name: &str, bytes: &[u8]) -> Result<Self> {
        let format = upload_format(name, bytes)?;
        Ok(Self::describe(name, format, bytes))
    }

    fn describe(name: &str, format: ImageFormat, bytes: &[u8]) -> Self {
        Self {
            file_name: name.to_string(),
            file_type: format.to_mime_type().to_string(),
            file_size: bytes.len() as u64,
        }
    }
}

impl fmt::Display for FileDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileName: {}, FileType: {}, FileSize: {}",
            self.file_name, self.file_type, self.file_size
        )
    }
}

fn upload_format(name: &str, bytes: &[u8]) -> Result<ImageFormat> {
    let format = image::guess_format(bytes).map_err(|source| Error::UnsupportedInput {
        name: name.to_string(),
        source,
    })?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg => Ok(format),
        other => Err(Error::UnsupportedFormat {
            name: name.to_string(),
            format: other.to_mime_type().to_string(),
        }),
    }
}

/// File name prefix of staged uploads.
pub const UPLOAD_PREFIX: &str = "colorize-upload-";

/// An upload written to a temporary file.
///
/// The file is deleted when this value is dropped, including on early
/// returns and unwinding.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    details: FileDetails,
}

impl StagedUpload {
    /// Validate the upload and write it to a fresh temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is not PNG or JPEG or the temporary
    /// file cannot be written.
    pub fn new(name: &str, bytes: &[u8]) -> Result<Self> {
        Self::stage(name, bytes, None)
    }

    /// Like [`StagedUpload::new`], but inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is not PNG or JPEG or the temporary
    /// file cannot be written.
    pub fn new_in(dir: &Path, name: &str, bytes: &[u8]) -> Result<Self> {
        Self::stage(name, bytes, Some(dir))
    }

    fn stage(name: &str, bytes: &[u8], dir: Option<&Path>) -> Result<Self> {
        let format = upload_format(name, bytes)?;
        let details = FileDetails::describe(name, format, bytes);
        let extension = format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("img");

        let suffix = format!(".{extension}");
        let mut builder = tempfile::Builder::new();
        builder.prefix(UPLOAD_PREFIX).suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;

        tracing::debug!("Staged {} at {}", details.file_name, file.path().display());
        Ok(Self { file, details })
    }

    /// Location of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Details of the staged upload.
    #[must_use]
    pub const fn details(&self) -> &FileDetails {
        &self.details
    }

    /// Delete the temporary file now, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn close(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}
