use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Duration,
};

use bytes::Bytes;
use common::{
    error::{ConversionError, ConversionResult},
    models::{DocumentFormat, SourceKind, TargetFormat},
    persistence::tempfiles::TempJobFileProvider,
    util::random::generate_alphanumeric,
};
use tokio::fs;
use tracing::{info, warn};
use wait_timeout::ChildExt;

use crate::converter::{ConverterInput, IConverter};

pub const LIBRE: &str = "soffice";
pub const DEFAULT_LIBRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether `binary` can be started: an existing path, or a name found on `PATH`.
pub fn check_libre(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

/// Office document conversions through a headless LibreOffice process.
///
/// Each call gets its own scratch directory holding the input, the output
/// directory and a private LibreOffice profile, so concurrent conversions do
/// not see each other's files. The child is killed once `timeout` passes.
pub struct LibreConverter {
    pub binary: PathBuf,
    pub timeout: Duration,
    pub work_dir: PathBuf,
}

impl LibreConverter {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        LibreConverter {
            binary: binary.into(),
            timeout,
            work_dir: env::temp_dir().join("convert-jobs"),
        }
    }

    async fn convert_in(&self, job_files: &TempJobFileProvider, input: &ConverterInput, source: DocumentFormat, target: DocumentFormat) -> ConversionResult<Bytes> {
        let input_dir = job_files.create_dir().await?;
        let output_dir = job_files.create_dir().await?;
        let profile_dir = job_files.create_dir().await?;
        let input_path = input_dir.join(format!("{}.{}", &input.base_name, source.extension()));
        fs::write(&input_path, &input.content).await?;

        let args = arguments(&input_path, &output_dir, &profile_dir, source, target);
        let binary = self.binary.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || run_libre(&binary, &args, timeout))
            .await
            .map_err(|_| ConversionError::capability("Libre invocation was aborted"))??;

        let output = locate_output(&output_dir, &input.base_name, target).await?;
        info!("Converted {} from libre", output.display());
        Ok(Bytes::from(fs::read(&output).await?))
    }
}

#[async_trait::async_trait]
impl IConverter for LibreConverter {
    #[tracing::instrument(skip(self, input), fields(source = %input.source, target = %input.target))]
    async fn convert(&self, input: ConverterInput) -> ConversionResult<Bytes> {
        let (source, target) = match (input.source, input.target) {
            (SourceKind::Document(source), TargetFormat::Document(target)) => (source, target),
            (source, target) => {
                return Err(ConversionError::capability(format!("Libre can't convert {} to {}", source, target)));
            }
        };
        let job_files = TempJobFileProvider::build(&self.work_dir, &generate_alphanumeric(30)).await?;
        let result = self.convert_in(&job_files, &input, source, target).await;
        job_files.clean_up();
        result
    }
}

fn arguments(input: &Path, output_dir: &Path, profile_dir: &Path, source: DocumentFormat, target: DocumentFormat) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        format!("-env:UserInstallation=file://{}", profile_dir.display()).into(),
        "--headless".into(),
        "--convert-to".into(),
        target.extension().into(),
    ];
    // without the import filter a PDF opens in Draw, which can't export text formats
    if source == DocumentFormat::Pdf {
        args.push("--infilter=writer_pdf_import".into());
    }
    args.push("--outdir".into());
    args.push(output_dir.as_os_str().to_owned());
    args.push(input.as_os_str().to_owned());
    args
}

fn run_libre(binary: &Path, args: &[OsString], timeout: Duration) -> ConversionResult<()> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| ConversionError::capability(format!("Could not start libre: {}", err)))?;

    let status = match child.wait_timeout(timeout).map_err(|_| ConversionError::capability("Could not wait on libre"))? {
        Some(status) => status,
        None => {
            child.kill().map_err(|_| ConversionError::capability("Could not kill libre"))?;
            _ = child.wait();
            warn!("Libre did not finish within {:?}, killed", timeout);
            return Err(ConversionError::Timeout(timeout.as_secs()));
        }
    };
    match status.code() {
        Some(0) => Ok(()),
        code => {
            info!("Libre failed with '{:?}'", code);
            Err(ConversionError::capability(format!("Libre exited with {:?}", code)))
        }
    }
}

/// The single file in `output_dir` named like the input and carrying the
/// target extension. None or several is an error, never a guess.
async fn locate_output(output_dir: &Path, base_name: &str, target: DocumentFormat) -> ConversionResult<PathBuf> {
    let suffix = format!(".{}", target.extension());
    let mut entries = fs::read_dir(output_dir).await?;
    let mut matches = vec![];
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(base_name) && name.to_ascii_lowercase().ends_with(&suffix) {
                matches.push(entry.path());
            }
        }
    }
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(ConversionError::ArtifactNotFound(format!("no {} output for '{}'", target.extension(), base_name))),
        count => Err(ConversionError::ArtifactNotFound(format!("{} candidate outputs for '{}'", count, base_name))),
    }
}
