use std::path::PathBuf;
use tempfile::{tempdir, TempDir};
use wdcap::{
    error::TaggerError,
    file::LocalStore,
    pipeline::{CaptionRequest, ModelTable, Tagger},
};

mod common;
use common::{write_image, write_model, FakeLoader, VOCABULARY};

const VIT: &str = "SmilingWolf/wd-vit-tagger-v3";
const SWIN: &str = "SmilingWolf/wd-swinv2-tagger-v3";

// general, sensitive | 1girl, smiling, simple_background | artist | alice, miku
const SCORES: [f32; 8] = [0.7, 0.2, 0.99, 0.6, 0.3, 0.95, 0.9, 0.1];

struct Fixture {
    models_dir: TempDir,
    images: TempDir,
    loader: FakeLoader,
    tagger: Tagger,
}

fn fixture() -> Fixture {
    let models = tempdir().unwrap();
    write_model(models.path(), VIT, VOCABULARY);
    write_model(models.path(), SWIN, VOCABULARY);

    let loader = FakeLoader::new(32, SCORES.to_vec());
    let tagger = Tagger::new(
        Box::new(LocalStore::new(models.path())),
        Box::new(loader.clone()),
    );
    Fixture {
        models_dir: models,
        images: tempdir().unwrap(),
        loader,
        tagger,
    }
}

impl Fixture {
    fn image(&self) -> PathBuf {
        write_image(&self.images.path().join("test_image.png"), 50, 30)
    }
}

#[test]
fn test_tag_image_all_sections() {
    let mut fx = fixture();
    let caption = fx.tagger.tag_image(&CaptionRequest::new(fx.image())).unwrap();
    assert_eq!(caption, "alice (wonderland), 1girl, smiling, general");
}

#[test]
fn test_character_parentheses_not_escaped_in_character_section() {
    let mut fx = fixture();
    let request = CaptionRequest {
        include_general: false,
        include_rating: false,
        ..CaptionRequest::new(fx.image())
    };
    // Only the general fragment is escaped; character names pass through.
    assert_eq!(fx.tagger.tag_image(&request).unwrap(), "alice (wonderland)");
}

#[test]
fn test_omitted_sections() {
    let mut fx = fixture();
    let request = CaptionRequest {
        include_character: false,
        ..CaptionRequest::new(fx.image())
    };
    assert_eq!(fx.tagger.tag_image(&request).unwrap(), "1girl, smiling, general");

    let request = CaptionRequest {
        include_general: false,
        include_rating: false,
        character_threshold: 0.99,
        ..CaptionRequest::new(fx.image())
    };
    assert_eq!(fx.tagger.tag_image(&request).unwrap(), "");
}

#[test]
fn test_mcut_request() {
    let mut fx = fixture();
    let request = CaptionRequest {
        general_mcut: true,
        general_threshold: 0.0,
        include_character: false,
        include_rating: false,
        ..CaptionRequest::new(fx.image())
    };
    // general scores 0.99, 0.6, 0.3 -> largest gap 0.99/0.6, cut 0.795
    assert_eq!(fx.tagger.tag_image(&request).unwrap(), "1girl");
}

#[test]
fn test_model_cached_between_requests() {
    let mut fx = fixture();
    let image = fx.image();
    fx.tagger.tag_image(&CaptionRequest::new(&image)).unwrap();
    fx.tagger.tag_image(&CaptionRequest::new(&image)).unwrap();
    assert_eq!(fx.loader.load_count(), 1);
    assert_eq!(fx.tagger.loaded().map(|m| m.repo_id.as_str()), Some(VIT));
}

#[test]
fn test_model_reloaded_on_switch() {
    let mut fx = fixture();
    let image = fx.image();
    let swin = CaptionRequest {
        model_name: "swinv3".to_string(),
        ..CaptionRequest::new(&image)
    };

    fx.tagger.tag_image(&CaptionRequest::new(&image)).unwrap();
    fx.tagger.tag_image(&swin).unwrap();
    fx.tagger.tag_image(&swin).unwrap();
    fx.tagger.tag_image(&CaptionRequest::new(&image)).unwrap();

    assert_eq!(fx.loader.load_count(), 3);
    let paths = fx.loader.loaded_paths.lock().unwrap();
    assert!(paths[0].starts_with(fx.models_dir.path().join(VIT)));
    assert!(paths[1].starts_with(fx.models_dir.path().join(SWIN)));
}

#[test]
fn test_failed_switch_empties_slot() {
    let fx = fixture();
    let mut models = ModelTable::default();
    models.insert("ghost", "nobody/ghost-tagger");
    let mut tagger = Tagger::new(
        Box::new(LocalStore::new(fx.models_dir.path())),
        Box::new(fx.loader.clone()),
    )
    .with_models(models);

    let image = fx.image();
    tagger.tag_image(&CaptionRequest::new(&image)).unwrap();
    assert_eq!(tagger.loaded().map(|m| m.repo_id.as_str()), Some(VIT));

    let ghost = CaptionRequest {
        model_name: "ghost".to_string(),
        ..CaptionRequest::new(&image)
    };
    let err = tagger.tag_image(&ghost).unwrap_err();
    assert!(matches!(err, TaggerError::ArtifactUnavailable { .. }));
    assert!(tagger.loaded().is_none());

    tagger.tag_image(&CaptionRequest::new(&image)).unwrap();
    assert_eq!(fx.loader.load_count(), 2);
    assert_eq!(tagger.loaded().map(|m| m.repo_id.as_str()), Some(VIT));
}

#[test]
fn test_unknown_model_falls_back_to_default() {
    let mut fx = fixture();
    let request = CaptionRequest {
        model_name: "does-not-exist".to_string(),
        ..CaptionRequest::new(fx.image())
    };
    fx.tagger.tag_image(&request).unwrap();
    assert_eq!(fx.tagger.loaded().map(|m| m.repo_id.as_str()), Some(VIT));
}

#[test]
fn test_input_size_from_classifier() {
    let mut fx = fixture();
    fx.tagger.tag_image(&CaptionRequest::new(fx.image())).unwrap();
    let shapes = fx.loader.shapes.lock().unwrap();
    assert_eq!(shapes.as_slice(), &[vec![1, 32, 32, 3]]);
    assert_eq!(fx.tagger.loaded().map(|m| m.input_size()), Some(32));
}

#[test]
fn test_missing_artifacts() {
    let fx = fixture();
    let mut models = ModelTable::default();
    models.insert("ghost", "nobody/ghost-tagger");
    let mut tagger = Tagger::new(
        Box::new(LocalStore::new(fx.models_dir.path())),
        Box::new(fx.loader.clone()),
    )
    .with_models(models);

    let request = CaptionRequest {
        model_name: "ghost".to_string(),
        ..CaptionRequest::new(fx.image())
    };
    let err = tagger.tag_image(&request).unwrap_err();
    assert!(matches!(err, TaggerError::ArtifactUnavailable { .. }));
    assert!(tagger.loaded().is_none());
    assert_eq!(fx.loader.load_count(), 0);
}

#[test]
fn test_bad_image() {
    let mut fx = fixture();
    let path = fx.images.path().join("broken.jpg");
    std::fs::write(&path, b"garbage").unwrap();
    let err = fx.tagger.tag_image(&CaptionRequest::new(&path)).unwrap_err();
    assert!(matches!(err, TaggerError::ImageDecode { .. }));
}

#[test]
fn test_score_count_mismatch() {
    let models = tempdir().unwrap();
    write_model(models.path(), VIT, VOCABULARY);
    let loader = FakeLoader::new(16, vec![0.5; 3]);
    let mut tagger = Tagger::new(Box::new(LocalStore::new(models.path())), Box::new(loader));

    let images = tempdir().unwrap();
    let image = write_image(&images.path().join("a.png"), 16, 16);
    let err = tagger.tag_image(&CaptionRequest::new(image)).unwrap_err();
    assert!(matches!(err, TaggerError::InferenceFailed(_)));
}

#[test]
fn test_malformed_vocabulary() {
    let models = tempdir().unwrap();
    write_model(models.path(), VIT, "tag_id,name\n1,smile\n");
    let mut tagger = Tagger::new(
        Box::new(LocalStore::new(models.path())),
        Box::new(FakeLoader::new(16, vec![0.5])),
    );

    let images = tempdir().unwrap();
    let image = write_image(&images.path().join("a.png"), 16, 16);
    let err = tagger.tag_image(&CaptionRequest::new(image)).unwrap_err();
    assert!(matches!(err, TaggerError::MalformedVocabulary { .. }));
}
