use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::coco::ImageIdScheme;
use crate::crop::{RemapPolicy, RemapStrategy};
use crate::geometry::{Expansion, Validity};

/// Dataset preparation tools for LabelMe annotations.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert LabelMe JSON files to a YOLO dataset
    Yolo(Args),
    /// Convert LabelMe JSON files to a COCO dataset
    Coco(CocoArgs),
    /// Crop images around parent shapes and remap child labels into the crops
    Crop(CropArgs),
    /// Rename files in bulk
    Rename(RenameArgs),
    /// Count label occurrences across LabelMe JSON or Pascal VOC XML files
    Count(CountArgs),
}

/// Arguments shared by the YOLO and COCO converters.
#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
    /// Directory containing LabelMe JSON files
    #[arg(short = 'd', long = "json_dir")]
    pub json_dir: String,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f32,

    /// Proportion of the dataset to use for testing
    #[arg(long = "test_size", default_value_t = 0.0, value_parser = validate_size)]
    pub test_size: f32,

    /// Output format for YOLO annotations: 'bbox' or 'polygon'
    #[arg(
        long = "output_format",
        visible_alias = "format",
        value_enum,
        default_value = "bbox"
    )]
    pub output_format: Format,

    /// Where class ids come from: the label list or the shapes' group_id
    #[arg(long = "class_source", value_enum, default_value = "label")]
    pub class_source: ClassSource,

    /// Subtracted from group_id to obtain the class id
    #[arg(long = "group_id_offset", default_value_t = 1)]
    pub group_id_offset: i64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Prefix output file names with the name of the source folder
    #[arg(long = "prefix_folder")]
    pub prefix_folder: bool,

    /// Labels to leave out of the output
    #[arg(long = "skip_labels", value_delimiter = ',')]
    pub skip_labels: Vec<String>,

    /// List of labels in the dataset
    #[arg(use_value_delimiter = true)]
    pub label_list: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CocoArgs {
    #[command(flatten)]
    pub common: Args,

    /// How image ids are assigned
    #[arg(long = "image_ids", value_enum, default_value = "sequential")]
    pub image_ids: ImageIds,

    /// First image id for sequential numbering
    #[arg(long = "start_image_id", default_value_t = 1)]
    pub start_image_id: u64,

    /// Offset of the numeric group inside the image file name
    #[arg(long = "id_group_offset", default_value_t = 2)]
    pub id_group_offset: usize,

    /// Length of the numeric group inside the image file name
    #[arg(long = "id_group_len", default_value_t = 4)]
    pub id_group_len: usize,
}

impl CocoArgs {
    pub fn image_id_scheme(&self) -> ImageIdScheme {
        match self.image_ids {
            ImageIds::Sequential => ImageIdScheme::Sequential {
                start: self.start_image_id,
            },
            ImageIds::Grouped => ImageIdScheme::GroupedByName {
                offset: self.id_group_offset,
                len: self.id_group_len,
            },
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CropArgs {
    /// Directory containing the source images
    #[arg(long = "image_dir")]
    pub image_dir: PathBuf,

    /// Directory containing LabelMe JSON files
    #[arg(long = "json_dir")]
    pub json_dir: PathBuf,

    /// Directory receiving cropped images and their YOLO labels
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Label of the shapes that anchor a crop
    #[arg(long = "parent_label", default_value = "person")]
    pub parent_label: String,

    /// Labels remapped into the crops; class id is the position in this list
    #[arg(long = "child_labels", value_delimiter = ',', default_value = "aqm,fgmj")]
    pub child_labels: Vec<String>,

    /// Width multiplier applied to the parent box
    #[arg(long = "width_scale", default_value_t = 2.0, value_parser = validate_scale)]
    pub width_scale: f64,

    /// Height multiplier applied to the parent box
    #[arg(long = "height_scale", default_value_t = 1.5, value_parser = validate_scale)]
    pub height_scale: f64,

    /// How children are matched to parents
    #[arg(long = "strategy", value_enum, default_value = "translate")]
    pub strategy: Strategy,

    /// Which remapped boxes are kept
    #[arg(long = "validity", value_enum, default_value = "strict")]
    pub validity: ValidityArg,

    /// Parents narrower than this many pixels are ignored
    #[arg(long = "min_parent_width", default_value_t = 0.0)]
    pub min_parent_width: f64,
}

impl CropArgs {
    pub fn remap_policy(&self) -> crate::error::Result<RemapPolicy> {
        Ok(RemapPolicy {
            expansion: Expansion::new(self.width_scale, self.height_scale)?,
            strategy: match self.strategy {
                Strategy::Translate => RemapStrategy::Translate,
                Strategy::Containment => RemapStrategy::Containment,
            },
            validity: match self.validity {
                ValidityArg::Strict => Validity::Strict,
                ValidityArg::Lenient => Validity::Lenient,
            },
            min_parent_width: self.min_parent_width,
        })
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RenameArgs {
    /// Directory whose files are renamed
    #[arg(long = "dir")]
    pub dir: PathBuf,

    /// Only files with this extension are renamed
    #[arg(long = "extension", default_value = "jpg")]
    pub extension: String,

    /// Remove this many leading characters from each name
    #[arg(long = "strip_prefix", conflicts_with = "new_extension")]
    pub strip_prefix: Option<usize>,

    /// Replace the extension with this one
    #[arg(long = "new_extension", required_unless_present = "strip_prefix")]
    pub new_extension: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CountArgs {
    /// Directory containing the annotation files
    #[arg(short = 'd', long = "json_dir", visible_alias = "annotation_dir")]
    pub json_dir: PathBuf,

    /// Annotation format: LabelMe JSON (searched recursively) or Pascal VOC
    /// XML (top level only)
    #[arg(long = "format", value_enum, default_value = "labelme")]
    pub format: CountFormat,
}

// Annotation formats the label counter reads
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CountFormat {
    Labelme,
    Voc,
}

// Enumeration for the YOLO output format
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Format {
    Polygon,
    Bbox,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ClassSource {
    /// Position in the label list, or alphabetical order of all labels
    Label,
    /// The shape's group_id minus --group_id_offset
    GroupId,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ImageIds {
    Sequential,
    /// Numbered per digit group taken from the file name
    Grouped,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Strategy {
    /// Match children to parents by instance tag and translate
    Translate,
    /// Assign children to the parent box that contains them
    Containment,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ValidityArg {
    /// Drop boxes that leave the crop
    Strict,
    /// Drop only zero-sized boxes
    Lenient,
}

// Validate that the size is between 0.0 and 1.0
fn validate_size(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

fn validate_scale(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val.is_finite() && val > 0.0 => Ok(val),
        _ => Err("SCALE must be a positive number".to_string()),
    }
}
