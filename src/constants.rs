/// Nominal tile size for splitting source scenes, in pixels.
pub const DEFAULT_TILE_SIZE: usize = 9000;

/// Chip size used for training and training-time prediction.
pub const CHIP_SIZE: usize = 300;

/// Chip size used for full-scene prediction runs.
pub const PREDICT_CHIP_SIZE: usize = 1024;

/// Class id the rasterizer assigns to pixels outside any label polygon.
/// Postprocessing remaps this value to 0 before upload.
pub const BACKGROUND_CLASS_ID: u8 = 2;

/// (area, item id) pairs making up the training split.
pub const TRAIN_IDS: &[(&str, &str)] = &[
    ("acc", "665946"),
    ("acc", "a42435"),
    ("acc", "ca041a"),
    ("mon", "401ab3"),
    ("mon", "f15272"),
    ("ptn", "abe1a3"),
    ("kam", "4e7c7f"),
    ("znz", "33cae6"),
    ("znz", "076995"),
    ("znz", "c7415c"),
];

/// (area, item id) pairs making up the validation split.
pub const VALID_IDS: &[(&str, &str)] = &[
    ("acc", "d41d81"),
    ("mon", "207cc7"),
    ("znz", "aee7fd"),
    ("znz", "3f8360"),
];
