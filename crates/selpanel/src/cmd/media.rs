use selpanel_bridge::{MediaLibrary, MediaStatus};
use serde::Serialize;

use crate::cmd::MediaArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct MediaEntry {
    id: String,
    #[serde(flatten)]
    status: MediaStatus,
}

#[derive(Serialize)]
struct MediaOutput {
    dir: String,
    complete: usize,
    total: usize,
    missing: Vec<String>,
    entries: Vec<MediaEntry>,
}

pub fn run(args: MediaArgs, format: OutputFormat) -> CliResult<i32> {
    let catalog = args.media.catalog()?;
    let library = MediaLibrary::new(&args.media.media_dir);
    let report = library.validate(catalog);

    let output = MediaOutput {
        dir: library.dir().display().to_string(),
        complete: report.complete,
        total: report.total,
        missing: report.missing.clone(),
        entries: catalog
            .ids()
            .map(|id| MediaEntry {
                id: id.to_string(),
                status: library.status(id),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Raw => {
            for entry in &report.missing {
                println!("{entry}");
            }
        }
        OutputFormat::Pretty => {
            println!("media: {}", output.dir);
            println!("complete: {}/{}", output.complete, output.total);
            for entry in report.missing_preview() {
                println!("missing: {entry}");
            }
            let hidden = report.missing.len() - report.missing_preview().len();
            if hidden > 0 {
                println!("... and {hidden} more");
            }
        }
        OutputFormat::Table => {
            let rows = output.entries.iter().map(|entry| {
                vec![
                    entry.id.clone(),
                    label(entry.status.image),
                    label(entry.status.audio),
                ]
            });
            println!("{}", table(&["ID", "IMAGE", "AUDIO"], rows));
            println!("{}/{} complete", output.complete, output.total);
        }
    }

    if report.is_complete() {
        Ok(SUCCESS)
    } else {
        Ok(HEALTH_CHECK_FAILED)
    }
}

fn label(state: selpanel_bridge::AssetState) -> String {
    serde_json::to_value(state)
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default()
}
