#![allow(dead_code)]

use image::{ImageBuffer, Rgb};
use ndarray::{Array, Ix4};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use wdcap::{
    error::Result,
    file::{LABEL_FILENAME, MODEL_FILENAME},
    tagger::{Classifier, ClassifierLoader},
};

/// Vocabulary used by the fake models: 2 ratings, 3 general, 1 artist, 2 characters.
pub const VOCABULARY: &str = "tag_id,name,category,count
1,general,9,100
2,sensitive,9,100
3,1girl,0,90
4,smiling,0,80
5,simple_background,0,70
6,some_artist,1,5
7,alice_(wonderland),4,3
8,hatsune_miku,4,3
";

/// Writes `<root>/<repo_id>/{model.onnx,selected_tags.csv}`.
pub fn write_model(root: &Path, repo_id: &str, vocabulary: &str) {
    let dir = root.join(repo_id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(MODEL_FILENAME), repo_id).unwrap();
    fs::write(dir.join(LABEL_FILENAME), vocabulary).unwrap();
}

pub fn write_image(path: &Path, width: u32, height: u32) -> PathBuf {
    let img = ImageBuffer::from_pixel(width, height, Rgb([128u8, 128, 128]));
    img.save(path).unwrap();
    path.to_path_buf()
}

/// A classifier returning fixed scores and recording the input shapes it sees.
pub struct FakeClassifier {
    size: u32,
    scores: Vec<f32>,
    shapes: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl Classifier for FakeClassifier {
    fn input_size(&self) -> u32 {
        self.size
    }

    fn predict(&mut self, input: Array<f32, Ix4>) -> Result<Vec<f32>> {
        self.shapes.lock().unwrap().push(input.shape().to_vec());
        Ok(self.scores.clone())
    }
}

/// Loads `FakeClassifier`s and counts how many times it was asked to.
#[derive(Clone)]
pub struct FakeLoader {
    pub size: u32,
    pub scores: Vec<f32>,
    pub loads: Arc<AtomicUsize>,
    pub loaded_paths: Arc<Mutex<Vec<PathBuf>>>,
    pub shapes: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl FakeLoader {
    pub fn new(size: u32, scores: Vec<f32>) -> Self {
        Self {
            size,
            scores,
            loads: Arc::new(AtomicUsize::new(0)),
            loaded_paths: Arc::new(Mutex::new(Vec::new())),
            shapes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ClassifierLoader for FakeLoader {
    fn load(&self, weights: &Path) -> Result<Box<dyn Classifier>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.loaded_paths.lock().unwrap().push(weights.to_path_buf());
        Ok(Box::new(FakeClassifier {
            size: self.size,
            scores: self.scores.clone(),
            shapes: self.shapes.clone(),
        }))
    }
}
