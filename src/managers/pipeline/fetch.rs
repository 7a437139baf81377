use super::locate::RemoteFileRef;
use super::matcher::MatchResult;
use crate::errors::PipelineError;
use crate::managers::ssh::RemoteHost;
use crate::utils::compression::Compression;
use crate::utils::fs_atomic::{remove_quietly, temp_sibling_path};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Downloads `file` into `output_dir` and returns the path of the plain-text copy.
pub fn fetch(
    host: &dyn RemoteHost,
    file: &RemoteFileRef,
    output_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(output_dir).map_err(|err| {
        PipelineError::internal(format!(
            "Failed to create output directory {}: {}",
            output_dir.display(),
            err
        ))
    })?;
    let downloaded = output_dir.join(&file.name);
    host.transfer(&file.remote_path, &downloaded)?;
    decompress_file(&downloaded, file.compression)
}

/// Consumes a positive verdict and hands it back with `local_path` set.
pub fn download(
    host: &dyn RemoteHost,
    matched: MatchResult,
    output_dir: &Path,
) -> Result<MatchResult, PipelineError> {
    if !matched.found {
        return Err(PipelineError::internal(format!(
            "{} did not match; refusing to download it",
            matched.file.name
        )));
    }
    let local_path = fetch(host, &matched.file, output_dir)?;
    Ok(MatchResult {
        local_path: Some(local_path),
        ..matched
    })
}

/// Replaces a compressed file with its decompressed sibling (codec extension stripped).
/// On a bad stream the partial output is removed and the compressed file is kept.
pub fn decompress_file(path: &Path, compression: Compression) -> Result<PathBuf, PipelineError> {
    if compression == Compression::None {
        return Ok(path.to_path_buf());
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PipelineError::internal(format!("Invalid file name: {}", path.display())))?;
    let target = path.with_file_name(compression.strip_extension(name));
    if target == path {
        return Err(PipelineError::decode(format!(
            "{} does not carry a {} extension",
            name,
            compression.label()
        )));
    }

    let tmp = temp_sibling_path(&target);
    let decoded = (|| {
        let input = fs::File::open(path)
            .map_err(|err| PipelineError::transfer(format!("Failed to open {}: {}", name, err)))?;
        let output = fs::File::create(&tmp).map_err(|err| {
            PipelineError::internal(format!("Failed to create {}: {}", tmp.display(), err))
        })?;
        let mut writer = BufWriter::new(output);
        compression
            .decompress_to(BufReader::new(input), &mut writer)
            .map_err(|err| {
                PipelineError::decode(format!(
                    "Cannot decompress {} as {}: {}",
                    name,
                    compression.label(),
                    err
                ))
            })?;
        writer
            .flush()
            .map_err(|err| PipelineError::internal(err.to_string()))?;
        Ok::<_, PipelineError>(())
    })();
    if let Err(err) = decoded {
        remove_quietly(&tmp);
        return Err(err);
    }

    fs::rename(&tmp, &target).map_err(|err| {
        remove_quietly(&tmp);
        PipelineError::internal(format!("Failed to finalize {}: {}", target.display(), err))
    })?;
    remove_quietly(path);
    Ok(target)
}
