use crate::catalog::{label_uri, Catalog, Item};
use crate::constants::{
    BACKGROUND_CLASS_ID, CHIP_SIZE, PREDICT_CHIP_SIZE, TRAIN_IDS, VALID_IDS,
};
use crate::error::{BenchmarkError, Result};
use crate::storage::{join_uri, parent_uri, StorageIo};
use crate::tiling::tile_file_name;
use log::{debug, info};
use serde::Serialize;

/// A segmentation class handed to the training framework.
#[derive(Debug, Clone, Serialize)]
pub struct ClassDef {
    pub name: String,
    pub id: u8,
    pub color: String,
}

pub fn benchmark_classes() -> Vec<ClassDef> {
    vec![
        ClassDef {
            name: "building".to_string(),
            id: 1,
            color: "#e6194b".to_string(),
        },
        ClassDef {
            name: "background".to_string(),
            id: BACKGROUND_CLASS_ID,
            color: "#000000".to_string(),
        },
    ]
}

/// How training chips are sampled from a scene.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "window_method", rename_all = "snake_case")]
pub enum ChipOptions {
    Sliding { stride: usize },
    RandomSample { chips_per_scene: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chip_size: Option<usize>,
    pub predict_chip_size: usize,
    pub classes: Vec<ClassDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chip_options: Option<ChipOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendConfig {
    pub model_arch: String,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub lr: f64,
    pub one_cycle: bool,
    pub sync_interval: usize,
    pub debug: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model_arch: "resnet18".to_string(),
            batch_size: 8,
            num_epochs: 20,
            lr: 1e-4,
            one_cycle: true,
            sync_interval: 1,
            debug: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RasterSourceConfig {
    pub uri: String,
    pub channel_order: Vec<usize>,
}

impl RasterSourceConfig {
    pub fn rgb(uri: String) -> Self {
        Self {
            uri,
            channel_order: vec![0, 1, 2],
        }
    }
}

/// Vector labels, rasterized by the external framework with the reserved
/// background class id.
#[derive(Debug, Clone, Serialize)]
pub struct LabelSourceConfig {
    pub geojson_uri: String,
    pub background_class_id: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneConfig {
    pub id: String,
    pub raster_source: RasterSourceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_source: Option<LabelSourceConfig>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetConfig {
    pub train_scenes: Vec<SceneConfig>,
    pub validation_scenes: Vec<SceneConfig>,
    pub test_scenes: Vec<SceneConfig>,
}

/// Arguments for the postprocess hook the framework runs after predict.
#[derive(Debug, Clone, Serialize)]
pub struct PostprocessConfig {
    pub uris: Vec<String>,
    pub root_uri: String,
    pub experiment_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentConfig {
    pub id: String,
    pub task: TaskConfig,
    pub backend: BackendConfig,
    pub dataset: DatasetConfig,
    pub root_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predict_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postprocess: Option<PostprocessConfig>,
}

impl ExperimentConfig {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Locate all tiles for an item by probing consecutive indices until the
/// first missing one. The split pipeline numbers retained tiles without
/// interior gaps, so a missing index marks the end.
pub fn find_scene_tiles(
    img_dir: &str,
    area: &str,
    item_id: &str,
    storage: &dyn StorageIo,
) -> Result<Vec<String>> {
    let mut uris = Vec::new();
    loop {
        let uri = join_uri(
            img_dir,
            &format!(
                "{}/{}/{}",
                area,
                item_id,
                tile_file_name(area, item_id, uris.len())
            ),
        );
        if !storage.exists(&uri)? {
            break;
        }
        uris.push(uri);
    }
    debug!("Found {} tiles for {}/{}", uris.len(), area, item_id);
    Ok(uris)
}

/// One scene per split tile of the item, all sharing the item's labels.
fn scenes_for_item(
    item: &Item,
    img_dir: &str,
    label: Option<&str>,
    storage: &dyn StorageIo,
) -> Result<Vec<SceneConfig>> {
    let tiles = find_scene_tiles(img_dir, &item.area, &item.id, storage)?;
    Ok(tiles
        .into_iter()
        .map(|uri| SceneConfig {
            id: item.id.clone(),
            raster_source: RasterSourceConfig::rgb(uri),
            label_source: label.map(|geojson_uri| LabelSourceConfig {
                geojson_uri: geojson_uri.to_string(),
                background_class_id: BACKGROUND_CLASS_ID,
            }),
        })
        .collect())
}

fn scenes_for_ids(
    cat: &Catalog,
    ids: &[(&str, &str)],
    stac_uri: &str,
    img_dir: &str,
    storage: &dyn StorageIo,
) -> Result<Vec<SceneConfig>> {
    let mut scenes = Vec::new();
    for (area, item_id) in ids {
        let child = cat.child(area, storage)?;
        let item = child.item(item_id, storage)?;
        let label = label_uri(stac_uri, &item.area, &item.id);
        scenes.extend(scenes_for_item(&item, img_dir, Some(&label), storage)?);
    }
    Ok(scenes)
}

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub experiment_id: String,
    pub stac_uri: String,
    pub img_dir: String,
    pub root_uri: String,
    pub test: bool,
}

/// Assemble the training experiment over the train/validation rosters.
pub fn training_experiment(
    opts: &TrainOptions,
    storage: &dyn StorageIo,
) -> Result<ExperimentConfig> {
    let mut experiment_id = opts.experiment_id.clone();
    let mut chip_options = ChipOptions::Sliding { stride: CHIP_SIZE };
    let mut backend = BackendConfig::default();

    if opts.test {
        experiment_id.push_str("-TEST");
        chip_options = ChipOptions::RandomSample {
            chips_per_scene: 10,
        };
        backend.batch_size = 2;
        backend.num_epochs = 1;
    }

    let task = TaskConfig {
        chip_size: Some(CHIP_SIZE),
        predict_chip_size: CHIP_SIZE,
        classes: benchmark_classes(),
        chip_options: Some(chip_options),
    };

    let cat = Catalog::from_uri(&opts.stac_uri, storage)?;

    let mut train_ids = TRAIN_IDS.to_vec();
    let mut valid_ids = VALID_IDS.to_vec();
    if opts.test {
        train_ids.truncate(1);
        valid_ids.truncate(1);
    }

    let mut train_scenes =
        scenes_for_ids(&cat, &train_ids, &opts.stac_uri, &opts.img_dir, storage)?;
    let mut validation_scenes =
        scenes_for_ids(&cat, &valid_ids, &opts.stac_uri, &opts.img_dir, storage)?;

    if opts.test {
        train_scenes.truncate(1);
        validation_scenes.truncate(1);
    }

    if train_scenes.is_empty() {
        return Err(BenchmarkError::EmptyDataset(experiment_id));
    }

    info!(
        "Assembled {} train and {} validation scenes for {}",
        train_scenes.len(),
        validation_scenes.len(),
        experiment_id
    );

    Ok(ExperimentConfig {
        id: experiment_id,
        task,
        backend,
        dataset: DatasetConfig {
            train_scenes,
            validation_scenes,
            test_scenes: Vec::new(),
        },
        root_uri: opts.root_uri.clone(),
        predict_uri: None,
        postprocess: None,
    })
}

#[derive(Debug, Clone)]
pub struct PredictOptions {
    pub experiment_id: String,
    pub stac_uri: String,
    pub root_uri: String,
    pub predict_dir: String,
    pub test: bool,
}

/// Assemble the prediction experiment over every catalog item, with the
/// postprocess hook wired to the predicted tile paths.
pub fn prediction_experiment(
    opts: &PredictOptions,
    storage: &dyn StorageIo,
) -> Result<ExperimentConfig> {
    let mut experiment_id = opts.experiment_id.clone();
    if opts.test {
        experiment_id.push_str("-TEST");
    }

    let cat = Catalog::from_uri(&opts.stac_uri, storage)?;
    let mut items = cat.all_items(storage)?;
    if opts.test {
        items.truncate(5);
    }
    if items.is_empty() {
        return Err(BenchmarkError::EmptyDataset(experiment_id));
    }

    let task = TaskConfig {
        chip_size: None,
        predict_chip_size: PREDICT_CHIP_SIZE,
        classes: benchmark_classes(),
        chip_options: None,
    };

    let stac_dir = parent_uri(&opts.stac_uri);
    let test_scenes: Vec<SceneConfig> = items
        .iter()
        .map(|item| SceneConfig {
            id: item.id.clone(),
            raster_source: RasterSourceConfig::rgb(join_uri(
                &stac_dir,
                &format!("{}/{}.tif", item.id, item.id),
            )),
            label_source: None,
        })
        .collect();

    let predict_uri = join_uri(&opts.predict_dir, &experiment_id);
    let uris: Vec<String> = items
        .iter()
        .map(|item| join_uri(&predict_uri, &format!("{}.tif", item.id)))
        .collect();

    info!(
        "Assembled {} prediction scenes for {}",
        test_scenes.len(),
        experiment_id
    );

    Ok(ExperimentConfig {
        id: experiment_id.clone(),
        task,
        backend: BackendConfig::default(),
        dataset: DatasetConfig {
            test_scenes,
            ..DatasetConfig::default()
        },
        root_uri: opts.root_uri.clone(),
        predict_uri: Some(predict_uri),
        postprocess: Some(PostprocessConfig {
            uris,
            root_uri: opts.root_uri.clone(),
            experiment_id,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn catalog_fixture() -> Vec<(String, String)> {
        let mut entries = vec![(
            "s3://bench/train/catalog.json".to_string(),
            format!(
                r#"{{"id": "train_tier_1", "links": [{}]}}"#,
                ["acc", "mon", "ptn", "kam", "znz"]
                    .iter()
                    .map(|a| format!(r#"{{"rel": "child", "href": "./{}/catalog.json"}}"#, a))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )];

        for (area, item_id) in TRAIN_IDS.iter().chain(VALID_IDS.iter()) {
            let child_uri = format!("s3://bench/train/{}/catalog.json", area);
            let link = format!(
                r#"{{"rel": "item", "href": "./{}/{}.json"}}"#,
                item_id, item_id
            );
            match entries.iter_mut().find(|(uri, _)| uri == &child_uri) {
                Some((_, body)) => {
                    *body = body.replace("\"links\": [", &format!("\"links\": [{}, ", link));
                }
                None => entries.push((
                    child_uri,
                    format!(r#"{{"id": "{}", "links": [{}]}}"#, area, link),
                )),
            }
            entries.push((
                format!("s3://bench/train/{}/{}/{}.json", area, item_id, item_id),
                format!(r#"{{"id": "{}", "links": []}}"#, item_id),
            ));
        }
        entries
    }

    fn with_tiles(tile_counts: &[(&str, &str, usize)]) -> MemoryStorage {
        let mut entries = catalog_fixture();
        for (area, item_id, count) in tile_counts {
            for i in 0..*count {
                entries.push((
                    format!(
                        "s3://bench/splits/{}/{}/{}_{}_{}.tif",
                        area, item_id, area, item_id, i
                    ),
                    String::new(),
                ));
            }
        }
        MemoryStorage::with_entries(entries)
    }

    fn train_opts(test: bool) -> TrainOptions {
        TrainOptions {
            experiment_id: "benchmark".to_string(),
            stac_uri: "s3://bench/train/catalog.json".to_string(),
            img_dir: "s3://bench/splits".to_string(),
            root_uri: "s3://bench/benchmark".to_string(),
            test,
        }
    }

    #[test]
    fn test_find_scene_tiles_stops_at_first_gap() {
        let storage = with_tiles(&[("acc", "665946", 3)]);
        let tiles = find_scene_tiles("s3://bench/splits", "acc", "665946", &storage).unwrap();
        assert_eq!(
            tiles,
            vec![
                "s3://bench/splits/acc/665946/acc_665946_0.tif",
                "s3://bench/splits/acc/665946/acc_665946_1.tif",
                "s3://bench/splits/acc/665946/acc_665946_2.tif",
            ]
        );
    }

    #[test]
    fn test_find_scene_tiles_empty_when_no_tiles() {
        let storage = with_tiles(&[]);
        let tiles = find_scene_tiles("s3://bench/splits", "acc", "665946", &storage).unwrap();
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_training_experiment_one_scene_per_tile() {
        // every roster item gets one tile, plus one extra for the first
        let mut counts: Vec<(&str, &str, usize)> = TRAIN_IDS
            .iter()
            .chain(VALID_IDS.iter())
            .map(|(a, i)| (*a, *i, 1))
            .collect();
        counts[0].2 = 3;
        let storage = with_tiles(&counts);

        let config = training_experiment(&train_opts(false), &storage).unwrap();
        assert_eq!(config.id, "benchmark");
        assert_eq!(
            config.dataset.train_scenes.len(),
            TRAIN_IDS.len() + 2 // two extra tiles on the first item
        );
        assert_eq!(config.dataset.validation_scenes.len(), VALID_IDS.len());
        assert!(config.dataset.test_scenes.is_empty());

        let scene = &config.dataset.train_scenes[0];
        assert_eq!(scene.raster_source.channel_order, vec![0, 1, 2]);
        let label = scene.label_source.as_ref().unwrap();
        assert!(label.geojson_uri.ends_with("-labels/665946.geojson"));
        assert_eq!(label.background_class_id, 2);
    }

    #[test]
    fn test_training_experiment_test_mode_shrinks() {
        let counts: Vec<(&str, &str, usize)> = TRAIN_IDS
            .iter()
            .chain(VALID_IDS.iter())
            .map(|(a, i)| (*a, *i, 2))
            .collect();
        let storage = with_tiles(&counts);

        let config = training_experiment(&train_opts(true), &storage).unwrap();
        assert_eq!(config.id, "benchmark-TEST");
        assert_eq!(config.backend.batch_size, 2);
        assert_eq!(config.backend.num_epochs, 1);
        assert_eq!(config.dataset.train_scenes.len(), 1);
        assert_eq!(config.dataset.validation_scenes.len(), 1);
        assert!(matches!(
            config.task.chip_options,
            Some(ChipOptions::RandomSample {
                chips_per_scene: 10
            })
        ));
    }

    #[test]
    fn test_training_experiment_requires_tiles() {
        let storage = with_tiles(&[]);
        assert!(matches!(
            training_experiment(&train_opts(false), &storage),
            Err(BenchmarkError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_chip_options_json_tagging() {
        let sliding = serde_json::to_value(ChipOptions::Sliding { stride: 300 }).unwrap();
        assert_eq!(sliding["window_method"], "sliding");
        assert_eq!(sliding["stride"], 300);

        let random = serde_json::to_value(ChipOptions::RandomSample {
            chips_per_scene: 10,
        })
        .unwrap();
        assert_eq!(random["window_method"], "random_sample");
    }

    #[test]
    fn test_prediction_experiment_wires_postprocess() {
        let storage = MemoryStorage::with_entries([
            (
                "s3://bench/test/catalog.json",
                r#"{
                    "id": "test_tier",
                    "links": [
                        {"rel": "item", "href": "./aaa111/aaa111.json"},
                        {"rel": "item", "href": "./bbb222/bbb222.json"}
                    ]
                }"#,
            ),
            (
                "s3://bench/test/aaa111/aaa111.json",
                r#"{"id": "aaa111", "links": []}"#,
            ),
            (
                "s3://bench/test/bbb222/bbb222.json",
                r#"{"id": "bbb222", "links": []}"#,
            ),
        ]);

        let opts = PredictOptions {
            experiment_id: "pred-v1".to_string(),
            stac_uri: "s3://bench/test/catalog.json".to_string(),
            root_uri: "s3://bench/benchmark".to_string(),
            predict_dir: "/opt/data/predict".to_string(),
            test: false,
        };
        let config = prediction_experiment(&opts, &storage).unwrap();

        assert_eq!(config.dataset.test_scenes.len(), 2);
        assert!(config.dataset.train_scenes.is_empty());
        assert_eq!(
            config.dataset.test_scenes[0].raster_source.uri,
            "s3://bench/test/aaa111/aaa111.tif"
        );
        assert!(config.dataset.test_scenes[0].label_source.is_none());
        assert_eq!(config.task.chip_size, None);
        assert_eq!(config.task.predict_chip_size, 1024);

        assert_eq!(
            config.predict_uri.as_deref(),
            Some("/opt/data/predict/pred-v1")
        );
        let post = config.postprocess.unwrap();
        assert_eq!(
            post.uris,
            vec![
                "/opt/data/predict/pred-v1/aaa111.tif",
                "/opt/data/predict/pred-v1/bbb222.tif",
            ]
        );
        assert_eq!(post.experiment_id, "pred-v1");
    }

    #[test]
    fn test_experiment_json_skips_absent_fields() {
        let storage = with_tiles(
            &TRAIN_IDS
                .iter()
                .chain(VALID_IDS.iter())
                .map(|(a, i)| (*a, *i, 1))
                .collect::<Vec<_>>(),
        );
        let config = training_experiment(&train_opts(false), &storage).unwrap();
        let json = config.to_json().unwrap();
        assert!(!json.contains("predict_uri"));
        assert!(!json.contains("postprocess"));
        assert!(json.contains("\"chip_size\": 300"));
    }
}
