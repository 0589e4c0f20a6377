//! iarchive - archive utility

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use iarchive::commands::archive::{
    append_to_archive, compute_checksum, compute_checksum_then, create_archive, delete_from_archive, extract_archive,
    list_archive, list_formats,
};
use iarchive::{ArchiveProcessor, ArchiverConfig, CreationRequest, ExtractionRequest, FormatRegistry};
use std::path::{Path, PathBuf};

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = match &cli.config {
        Some(path) => ArchiverConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ArchiverConfig::default(),
    };
    if let Some(chunk_size) = cli.chunk_size {
        config = config.with_chunk_size(chunk_size);
    }
    let processor = ArchiveProcessor::with_config(config);

    match cli.command {
        Commands::Formats { json } => {
            let formats = list_formats();
            if json {
                println!("{}", serde_json::to_string_pretty(&formats)?);
            } else {
                println!("{:<8} {:<8} {:<7} {:<7} {:<7} {:<9}", "FORMAT", "EXT", "MULTI", "APPEND", "DELETE", "PASSWORD");
                for info in &formats {
                    let d = info.descriptor;
                    println!(
                        "{:<8} {:<8} {:<7} {:<7} {:<7} {:<9}",
                        d.id,
                        d.file_extension,
                        yes_no(d.supports_multiple_inputs),
                        yes_no(d.supports_append),
                        yes_no(d.supports_delete),
                        yes_no(d.supports_password)
                    );
                }
            }
        }

        Commands::Create { output, format, inputs, recursive, password, exclude } => {
            let format = format_or_guess(format, &output)?;
            let mut request = CreationRequest::new(format, &output).inputs(inputs).recursive(recursive);
            request.password = password;
            request.exclusion_suffix = exclude;

            let created = create_archive(&processor, &request).map_err(|e| anyhow!(e))?;
            println!("Archive created successfully: {}", created);
        }

        Commands::List { archive, format, json } => {
            let listing = list_archive(&processor, &path_str(&archive)?, format.as_deref())
                .map_err(|e| anyhow!(e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for row in &listing.members {
                    println!("{:<50} {:>18}  {}", row.name, row.size_label, row.kind_label);
                }
                println!("{} members ({})", listing.members.len(), listing.delete_label);
            }
        }

        Commands::Extract { archive, output, format, exclude } => {
            let format = format_or_guess(format, &archive)?;
            let mut request = ExtractionRequest::new(&archive, format, &output);
            request.exclusion_suffix = exclude;

            let extracted = extract_archive(&processor, &request).map_err(|e| anyhow!(e))?;
            println!("Extraction complete: {} members into {}", extracted.len(), output.display());
        }

        Commands::Append { archive, files, format } => {
            let files = files.iter().map(|f| path_str(f)).collect::<Result<Vec<_>>>()?;
            append_to_archive(&processor, &path_str(&archive)?, format.as_deref(), &files)
                .map_err(|e| anyhow!(e))?;
            println!("File appended.");
        }

        Commands::Delete { archive, member, format } => {
            delete_from_archive(&processor, &path_str(&archive)?, format.as_deref(), &member)
                .map_err(|e| anyhow!(e))?;
            println!("File deleted.");
        }

        Commands::Checksum { files } => {
            let chunk_size = processor.config().chunk_size;
            if let [file] = files.as_slice() {
                let digest = compute_checksum(&path_str(file)?, chunk_size)
                    .wait()
                    .ok_or_else(|| anyhow!("Checksum worker stopped unexpectedly"))?
                    .map_err(|e| anyhow!(e))?;
                println!("{}", digest);
            } else {
                checksum_all(&files, chunk_size)?;
            }
        }
    }

    Ok(())
}

/// Hash every file on the pool; results print in argument order
fn checksum_all(files: &[PathBuf], chunk_size: usize) -> Result<()> {
    let (tx, rx) = flume::unbounded();
    for (index, file) in files.iter().enumerate() {
        let tx = tx.clone();
        compute_checksum_then(&path_str(file)?, chunk_size, move |result| {
            let _ = tx.send((index, result));
        });
    }
    drop(tx);

    let mut results: Vec<_> = rx.iter().collect();
    if results.len() != files.len() {
        return Err(anyhow!("Checksum worker stopped unexpectedly"));
    }
    results.sort_by_key(|(index, _)| *index);

    let mut failed = 0;
    for (index, result) in results {
        match result {
            Ok(digest) => println!("{}  {}", digest, files[index].display()),
            Err(e) => {
                eprintln!("{}: {}", files[index].display(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(anyhow!("{} of {} checksums failed", failed, files.len()));
    }
    Ok(())
}

fn format_or_guess(format: Option<String>, path: &Path) -> Result<String> {
    match format {
        Some(format) => Ok(format),
        None => FormatRegistry::from_extension(path)
            .map(|d| d.id.to_string())
            .ok_or_else(|| anyhow!("Cannot guess the format of {}; pass --format", path.display())),
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} is not valid UTF-8", path.display()))
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
