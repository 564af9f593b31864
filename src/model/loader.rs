//! Model file resolution, loading, and the load-once network handle.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4};
use ndarray_npy::{read_npy, ReadNpyError};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};

use super::head::{ChromaHead, NUM_BINS};
use super::Network;

/// Locations of the three files that make up the colorization model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// ONNX graph describing the network topology.
    pub topology: PathBuf,
    /// Learned weights, stored as the graph's external data file.
    pub weights: PathBuf,
    /// `(313, 2)` array of quantized ab cluster centers.
    pub cluster_centers: PathBuf,
}

impl ModelPaths {
    /// Default model directory, relative to the working directory.
    pub const DEFAULT_DIR: &'static str = "models";
    /// Topology file name.
    pub const TOPOLOGY_FILE: &'static str = "colorization.onnx";
    /// Weights file name. Must match the name recorded inside the topology.
    pub const WEIGHTS_FILE: &'static str = "colorization.onnx_data";
    /// Cluster-centers file name.
    pub const CLUSTER_CENTERS_FILE: &'static str = "pts_in_hull.npy";

    /// Standard file names inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            topology: dir.join(Self::TOPOLOGY_FILE),
            weights: dir.join(Self::WEIGHTS_FILE),
            cluster_centers: dir.join(Self::CLUSTER_CENTERS_FILE),
        }
    }

    /// Check that every file exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] naming the first missing file.
    pub fn ensure_exist(&self) -> Result<()> {
        for path in [&self.topology, &self.weights, &self.cluster_centers] {
            if !path.is_file() {
                return Err(Error::ModelNotFound { path: path.clone() });
            }
        }
        Ok(())
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::in_dir(Self::DEFAULT_DIR)
    }
}

/// Read the cluster-centers array as `f32`.
///
/// The published file stores `f64`; integer arrays are accepted as well.
///
/// # Errors
///
/// Returns [`Error::ClusterCenters`] if the file is not a readable 2D array.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn load_cluster_centers<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
    let path = path.as_ref();

    let centers = match read_npy::<_, Array2<f64>>(path) {
        Ok(centers) => centers.mapv(|v| v as f32),
        Err(ReadNpyError::WrongDescriptor(_)) => read_npy::<_, Array2<i64>>(path)
            .map_err(|source| Error::ClusterCenters {
                path: path.to_path_buf(),
                source,
            })?
            .mapv(|v| v as f32),
        Err(source) => {
            return Err(Error::ClusterCenters {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    Ok(centers)
}

/// The ONNX colorization backbone together with its patched tail layers.
pub struct ColorizationNet {
    session: Session,
    head: ChromaHead,
}

impl ColorizationNet {
    /// Load the network from disk.
    ///
    /// All files are checked before the inference engine is touched, so a
    /// missing file is reported as [`Error::ModelNotFound`] up front.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is missing, the cluster centers are
    /// malformed, or the ONNX session cannot be created.
    pub fn load(paths: &ModelPaths, intra_threads: Option<usize>) -> Result<Self> {
        paths.ensure_exist()?;

        let centers = load_cluster_centers(&paths.cluster_centers)?;
        let head = ChromaHead::new(&centers)?;

        let name = paths.topology.display().to_string();
        tracing::info!("Loading colorization network from {name}");

        let mut builder = Session::builder().map_err(|source| Error::ModelLoad {
            name: name.clone(),
            source,
        })?;

        if let Some(threads) = intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|source| Error::ModelLoad {
                    name: name.clone(),
                    source,
                })?;
        }

        let session = builder
            .commit_from_file(&paths.topology)
            .map_err(|source| Error::ModelLoad { name, source })?;

        Ok(Self { session, head })
    }

    /// The patched tail layers.
    #[must_use]
    pub const fn head(&self) -> &ChromaHead {
        &self.head
    }
}

impl Network for ColorizationNet {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let input_value =
            Tensor::from_array(input.clone()).map_err(|source| Error::Inference { source })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "conv8_313 output".to_string(),
                actual: "no output".to_string(),
            })?;

        let logits = extract_logits(&output)?;
        self.head.decode(&logits)
    }
}

/// Copy the `conv8_313` output of the session into an array.
fn extract_logits(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    logits_from_raw(&shape.iter().copied().collect::<Vec<i64>>(), data)
}

/// Build an `(N, 313, h, w)` array from a raw tensor shape and buffer.
///
/// Anything other than a 4D tensor with [`NUM_BINS`] channels means the graph
/// is not the expected backbone.
fn logits_from_raw(shape: &[i64], data: &[f32]) -> Result<Array4<f32>> {
    let mismatch = || Error::ShapeMismatch {
        expected: format!("(N, {NUM_BINS}, h, w) logits"),
        actual: format!("{shape:?}"),
    };

    let dims = shape
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| mismatch())?;

    match dims[..] {
        [n, bins, h, w] if bins == NUM_BINS => {
            Array4::from_shape_vec((n, bins, h, w), data.to_vec()).map_err(|_| mismatch())
        }
        _ => Err(mismatch()),
    }
}

/// Load-once owner of a [`ColorizationNet`].
///
/// The network is loaded on first use and then reused for every request
/// until [`NetworkHandle::unload`] is called.
pub struct NetworkHandle {
    paths: ModelPaths,
    intra_threads: Option<usize>,
    network: Option<ColorizationNet>,
}

impl NetworkHandle {
    /// Create an empty handle; nothing is read from disk yet.
    #[must_use]
    pub const fn new(paths: ModelPaths, intra_threads: Option<usize>) -> Self {
        Self {
            paths,
            intra_threads,
            network: None,
        }
    }

    /// Whether the network has been loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.network.is_some()
    }

    /// Borrow the network, loading it first if needed.
    ///
    /// # Errors
    ///
    /// Returns the load error if the network cannot be loaded. A failed load
    /// leaves the handle empty, so the next call tries again.
    pub fn get(&mut self) -> Result<&mut ColorizationNet> {
        let network = match self.network.take() {
            Some(network) => network,
            None => ColorizationNet::load(&self.paths, self.intra_threads)?,
        };

        Ok(self.network.insert(network))
    }

    /// Drop the loaded network, releasing the inference session.
    pub fn unload(&mut self) {
        if self.network.take().is_some() {
            tracing::debug!("Unloaded colorization network");
        }
    }
}

impl Network for NetworkHandle {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.get()?.forward(input)
    }
}

#[cfg(test)]
mod tests {
    use ndarray_npy::write_npy;

    use super::*;

    fn model_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ModelPaths::TOPOLOGY_FILE), b"graph").unwrap();
        std::fs::write(dir.path().join(ModelPaths::WEIGHTS_FILE), b"weights").unwrap();
        write_npy(
            dir.path().join(ModelPaths::CLUSTER_CENTERS_FILE),
            &Array2::<f64>::zeros((NUM_BINS, 2)),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_default_paths() {
        let paths = ModelPaths::default();
        assert_eq!(paths.topology, Path::new("models/colorization.onnx"));
        assert_eq!(paths.weights, Path::new("models/colorization.onnx_data"));
        assert_eq!(paths.cluster_centers, Path::new("models/pts_in_hull.npy"));
    }

    #[test]
    fn test_missing_weights_fails_before_inference() {
        let dir = model_dir();
        let mut paths = ModelPaths::in_dir(dir.path());
        paths.weights = dir.path().join("nonexistent.caffemodel");

        match ColorizationNet::load(&paths, None) {
            Err(Error::ModelNotFound { path }) => assert_eq!(path, paths.weights),
            Err(other) => panic!("expected ModelNotFound, got {other}"),
            Ok(_) => panic!("expected ModelNotFound, got a network"),
        }
    }

    #[test]
    fn test_handle_reports_missing_model_on_forward() {
        let mut handle = NetworkHandle::new(ModelPaths::in_dir("no/such/dir"), None);

        let err = handle.forward(&Array4::zeros((1, 1, 224, 224))).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound { .. }));
        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_all_present_passes_check() {
        let dir = model_dir();
        ModelPaths::in_dir(dir.path()).ensure_exist().unwrap();
    }

    #[test]
    fn test_logits_from_raw() {
        let data = vec![0.5; NUM_BINS * 6];
        let logits = logits_from_raw(&[1, NUM_BINS as i64, 2, 3], &data).unwrap();
        assert_eq!(logits.shape(), &[1, NUM_BINS, 2, 3]);
    }

    #[test]
    fn test_logits_reject_decoded_ab_output() {
        // A graph that already ends at class8_ab yields 2 channels, not 313
        let err = logits_from_raw(&[1, 2, 56, 56], &vec![0.0; 2 * 56 * 56]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_logits_reject_bad_rank_and_length() {
        assert!(logits_from_raw(&[NUM_BINS as i64, 4, 4], &[0.0; 10]).is_err());
        assert!(logits_from_raw(&[1, NUM_BINS as i64, 2, 2], &[0.0; 10]).is_err());
        assert!(logits_from_raw(&[1, NUM_BINS as i64, -1, 2], &[]).is_err());
    }

    #[test]
    fn test_cluster_centers_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centers.npy");
        write_npy(&path, &Array2::from_elem((NUM_BINS, 2), -90.0_f64)).unwrap();

        let centers = load_cluster_centers(&path).unwrap();
        assert_eq!(centers.dim(), (NUM_BINS, 2));
        assert!((centers[[0, 0]] + 90.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cluster_centers_i64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centers.npy");
        write_npy(&path, &Array2::from_elem((NUM_BINS, 2), 40_i64)).unwrap();

        let centers = load_cluster_centers(&path).unwrap();
        assert!((centers[[312, 1]] - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cluster_centers_wrong_shape() {
        let dir = model_dir();
        write_npy(
            dir.path().join(ModelPaths::CLUSTER_CENTERS_FILE),
            &Array2::<f64>::zeros((10, 2)),
        )
        .unwrap();

        let err = ColorizationNet::load(&ModelPaths::in_dir(dir.path()), None).err().unwrap();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_cluster_centers_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("centers.npy");
        std::fs::write(&path, b"not numpy").unwrap();

        let err = load_cluster_centers(&path).unwrap_err();
        assert!(matches!(err, Error::ClusterCenters { .. }));
    }
}
