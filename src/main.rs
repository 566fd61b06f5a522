use clap::Parser;
use log::{error, info};

use labelprep::config::{Cli, Command, RenameArgs};
use labelprep::rename::{rename_files, RenameRule};
use labelprep::{count_labels_in_dir, process_coco_dataset, process_crop_dataset, process_dataset};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Yolo(args) => {
            info!("Starting LabelMe to YOLO conversion process...");
            process_dataset(args).map(|_| ())
        }
        Command::Coco(args) => {
            info!("Starting LabelMe to COCO conversion process...");
            process_coco_dataset(args).map(|_| ())
        }
        Command::Crop(args) => {
            info!("Starting crop process...");
            process_crop_dataset(args).map(|_| ())
        }
        Command::Rename(args) => run_rename(args),
        Command::Count(args) => count_labels_in_dir(&args.json_dir, args.format).map(|_| ()),
    };

    match result {
        Ok(()) => info!("Done."),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run_rename(args: &RenameArgs) -> Result<(), Box<dyn std::error::Error>> {
    let rule = match (&args.strip_prefix, &args.new_extension) {
        (Some(chars), _) => RenameRule::StripPrefix { chars: *chars },
        (None, Some(to)) => RenameRule::ChangeExtension { to: to.clone() },
        (None, None) => return Err("either --strip_prefix or --new_extension is required".into()),
    };
    let renamed = rename_files(&args.dir, &args.extension, &rule)?;
    info!("Renamed {} files.", renamed.len());
    Ok(())
}
