use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::cli::ExtractArgs;
use crate::inference::{LabelInference, OpenAiClient, OpenAiConfig, RetryPolicy, TocInference};
use crate::model::{
    DocumentOutcome, ExtractCounts, ExtractRunManifest, ResolvedSection, SECTION_COLUMNS,
    SectionRow,
};
use crate::pdf::{ensure_tools_available, extract_document};
use crate::pipeline::{PipelineOptions, process_pages};
use crate::resolver::ResolveOptions;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .context("an API key is required; pass --api-key or set OPENAI_API_KEY")?;
    ensure_tools_available()?;

    let client = OpenAiClient::new(OpenAiConfig {
        api_base: args.api_base.clone(),
        api_key,
        model: args.model.clone(),
        timeout: Duration::from_secs(args.request_timeout_secs),
        max_input_chars: args.max_input_chars,
    })
    .context("failed to configure inference client")?;

    let pdf_paths = discover_pdfs(&args.input_dir)?;
    if pdf_paths.is_empty() {
        bail!("no PDFs found in {}", args.input_dir.display());
    }
    ensure_directory(&args.output_dir)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.output_dir.join("manifests").join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    let options = pipeline_options(&args);
    let labels: Option<&dyn LabelInference> = if args.skip_labels {
        None
    } else {
        Some(&client)
    };

    info!(
        input_dir = %args.input_dir.display(),
        pdf_count = pdf_paths.len(),
        run_id = %run_id,
        model = %client.model(),
        "starting extract"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs.unwrap_or(0))
        .build()
        .context("failed to build worker pool")?;

    let documents = pool.install(|| {
        pdf_paths
            .par_iter()
            .map(|path| process_pdf(path, &args.output_dir, &client, labels, &options))
            .collect::<Vec<DocumentOutcome>>()
    });

    let counts = summarize(&documents);
    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        input_dir: args.input_dir.display().to_string(),
        output_dir: args.output_dir.display().to_string(),
        model: Some(client.model().to_string()),
        counts,
        documents,
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote extract run manifest");
    info!(
        completed = manifest.counts.completed_count,
        failed = manifest.counts.failed_count,
        sections = manifest.counts.sections_total,
        low_confidence = manifest.counts.low_confidence_total,
        "extract completed"
    );

    if manifest.counts.completed_count == 0 {
        bail!("every document failed; see {}", manifest_path.display());
    }

    Ok(())
}

/// Regular files with a `.pdf` extension (any case) directly inside `input_dir`, sorted by path.
fn discover_pdfs(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            pdfs.push(path);
        }
    }

    pdfs.sort();
    Ok(pdfs)
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}

fn pipeline_options(args: &ExtractArgs) -> PipelineOptions {
    PipelineOptions {
        links_per_page_threshold: args.links_per_page_threshold,
        label_threshold: args.label_threshold,
        resolve: ResolveOptions {
            top_level_starts_new_page: !args.no_new_page_rule,
        },
        retry: RetryPolicy {
            max_attempts: args.max_attempts.max(1),
            base_delay: Duration::from_millis(args.base_delay_ms),
            max_delay: Duration::from_millis(args.max_delay_ms),
            jitter: args.retry_jitter.max(0.0),
        },
    }
}

/// Runs one PDF end to end; any error or panic becomes a failed outcome for this PDF only.
fn process_pdf(
    pdf_path: &Path,
    output_dir: &Path,
    toc: &dyn TocInference,
    labels: Option<&dyn LabelInference>,
    options: &PipelineOptions,
) -> DocumentOutcome {
    let document_name = file_name_of(pdf_path).unwrap_or_else(|_| pdf_path.display().to_string());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        extract_one(pdf_path, &document_name, output_dir, toc, labels, options)
    }));

    match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            let reason = format!("{err:#}");
            error!(document = %document_name, error = %reason, "document failed");
            failed_outcome(document_name, reason)
        }
        Err(_) => {
            error!(document = %document_name, "document processing panicked");
            failed_outcome(document_name, "document processing panicked".to_string())
        }
    }
}

fn extract_one(
    pdf_path: &Path,
    document_name: &str,
    output_dir: &Path,
    toc: &dyn TocInference,
    labels: Option<&dyn LabelInference>,
    options: &PipelineOptions,
) -> Result<DocumentOutcome> {
    info!(document = %document_name, "processing document");

    let extracted = extract_document(pdf_path)?;
    for warning in &extracted.warnings {
        warn!(document = %document_name, warning = %warning, "pdf decoding warning");
    }

    let report = process_pages(&extracted.pages, toc, labels, options)
        .with_context(|| format!("failed to extract sections from {}", pdf_path.display()))?;

    let output_path = csv_output_path(output_dir, pdf_path);
    write_sections_csv(&output_path, document_name, &report.sections)?;

    let low_confidence_count = report.low_confidence_count();
    info!(
        document = %document_name,
        pages = extracted.pages.len(),
        sections = report.sections.len(),
        low_confidence = low_confidence_count,
        path = %output_path.display(),
        "wrote section table"
    );

    Ok(DocumentOutcome {
        document_name: document_name.to_string(),
        status: STATUS_COMPLETED.to_string(),
        output_path: Some(output_path.display().to_string()),
        page_count: extracted.pages.len(),
        toc_entry_count: report.toc_entry_count,
        section_count: report.sections.len(),
        low_confidence_count,
        failure_reason: None,
        warnings: report.warnings,
    })
}

fn failed_outcome(document_name: String, reason: String) -> DocumentOutcome {
    DocumentOutcome {
        document_name,
        status: STATUS_FAILED.to_string(),
        output_path: None,
        page_count: 0,
        toc_entry_count: 0,
        section_count: 0,
        low_confidence_count: 0,
        failure_reason: Some(reason),
        warnings: Vec::new(),
    }
}

fn csv_output_path(output_dir: &Path, pdf_path: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_dir.join(format!("{stem}.csv"))
}

pub fn write_sections_csv(
    path: &Path,
    document_name: &str,
    sections: &[ResolvedSection],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;

    if sections.is_empty() {
        writer
            .write_record(SECTION_COLUMNS)
            .with_context(|| format!("failed to write csv header: {}", path.display()))?;
    }

    for section in sections {
        writer
            .serialize(SectionRow::new(document_name, section))
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to finalize csv file: {}", path.display()))?;

    Ok(())
}

fn summarize(documents: &[DocumentOutcome]) -> ExtractCounts {
    let completed = documents
        .iter()
        .filter(|document| document.status == STATUS_COMPLETED);

    ExtractCounts {
        pdf_count: documents.len(),
        completed_count: completed.clone().count(),
        failed_count: documents
            .iter()
            .filter(|document| document.status == STATUS_FAILED)
            .count(),
        sections_total: completed.clone().map(|document| document.section_count).sum(),
        low_confidence_total: completed
            .map(|document| document.low_confidence_count)
            .sum(),
    }
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "merger-sections".to_string(),
        "extract".to_string(),
        "--input-dir".to_string(),
        args.input_dir.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
        "--model".to_string(),
        args.model.clone(),
        "--api-base".to_string(),
        args.api_base.clone(),
        "--links-per-page-threshold".to_string(),
        args.links_per_page_threshold.to_string(),
        "--label-threshold".to_string(),
        args.label_threshold.to_string(),
        "--max-attempts".to_string(),
        args.max_attempts.to_string(),
    ];

    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(jobs) = args.jobs {
        command.push("--jobs".to_string());
        command.push(jobs.to_string());
    }
    if args.no_new_page_rule {
        command.push("--no-new-page-rule".to_string());
    }
    if args.skip_labels {
        command.push("--skip-labels".to_string());
    }

    command.join(" ")
}
