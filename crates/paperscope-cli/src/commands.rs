use std::path::{Path, PathBuf};

use anyhow::Context;
use futures_util::future::join_all;

use paperscope_core::{
    AnalysisKind, ApiClient, CacheState, EXTRACTION_TYPES, ExportFormat, ExportTarget, ExtractionKind,
    LayoutEstimateFrame, Paper, PaperBackend, PaperId, PdfUpload, RenderMode, SandboxedDocument,
    Session, View,
};

use crate::output::{Painter, spinner};

pub async fn health(session: &Session<ApiClient>, p: Painter) -> anyhow::Result<()> {
    let health = session
        .health()
        .await
        .with_context(|| format!("backend at {} is unreachable", session.backend().base_url()))?;
    let status = if health.status == "healthy" {
        p.ok(&health.status)
    } else {
        p.warn(&health.status)
    };
    println!("{} {}", p.bold("backend"), status);
    if !health.llm.is_empty() {
        let provider = health.provider.as_deref().unwrap_or("unknown provider");
        println!("{} {} {}", p.bold("llm"), health.llm, p.dim(format!("({provider})")));
    }
    Ok(())
}

pub async fn list(session: &mut Session<ApiClient>, p: Painter) -> anyhow::Result<()> {
    let bar = spinner("Listing papers")?;
    let result = session.sync_papers().await;
    bar.finish_and_clear();
    result?;

    let papers = session.registry().papers();
    if papers.is_empty() {
        println!("{}", p.dim("No papers uploaded yet"));
        return Ok(());
    }
    for paper in papers {
        println!("{}  {}", p.accent(&paper.paper_id), paper.title);
    }
    println!("{}", p.dim(format!("{} papers", papers.len())));
    Ok(())
}

pub async fn info(session: &Session<ApiClient>, paper_id: &PaperId, p: Painter) -> anyhow::Result<()> {
    let paper = session.backend().get_paper(paper_id).await?;
    print_paper(&paper, p);
    Ok(())
}

fn print_paper(paper: &Paper, p: Painter) {
    println!("{}", p.bold(&paper.title));
    println!("  {} {}", p.dim("id     "), paper.paper_id);
    if !paper.authors.is_empty() {
        println!("  {} {}", p.dim("authors"), paper.author_line(6));
    }
    if paper.num_pages > 0 {
        println!("  {} {}", p.dim("pages  "), paper.num_pages);
    }
    if !paper.status.is_empty() {
        println!("  {} {}", p.dim("status "), paper.status);
    }
    if !paper.abstract_text.is_empty() {
        println!();
        println!("{}", paper.abstract_text);
    }
}

pub fn kinds(p: Painter) {
    for ty in EXTRACTION_TYPES.iter() {
        let viewer = match ty.render_mode {
            RenderMode::ContributionGrid => "grid",
            RenderMode::ExperimentTable => "table",
            RenderMode::Generic => "list",
        };
        println!("{:<16} {:<18} {}", p.accent(ty.id), ty.label, p.dim(viewer));
    }
}

/// Upload every file concurrently; a bad file does not stop the others.
pub async fn upload(session: &mut Session<ApiClient>, pdfs: &[PathBuf], p: Painter) -> anyhow::Result<()> {
    let uploader = session.uploader();
    let bar = spinner(format!("Uploading {} files", pdfs.len()))?;
    let outcomes = join_all(pdfs.iter().map(|path| {
        let uploader = uploader.clone();
        async move {
            let file = PdfUpload::from_path(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            uploader.upload(&file).await.map_err(anyhow::Error::from)
        }
    }))
    .await;
    bar.finish_and_clear();

    let mut failed = 0;
    for (path, outcome) in pdfs.iter().zip(outcomes) {
        match outcome {
            Ok(paper) => {
                println!("{} {}  {}", p.ok("✓"), p.accent(&paper.paper_id), paper.title);
                session.register(paper);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(path = %path.display(), error = %e, "upload failed");
                println!("{} {}  {}", p.err("✗"), path.display(), p.err(format!("{e:#}")));
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} uploads failed", pdfs.len());
    }
    Ok(())
}

/// Run one extraction through the activation controller, the same path the TUI takes.
pub async fn extract(
    session: &mut Session<ApiClient>,
    paper_id: PaperId,
    kind: ExtractionKind,
    json: bool,
    p: Painter,
) -> anyhow::Result<()> {
    let paper = session.backend().get_paper(&paper_id).await?;
    session.register(paper);
    session.select_paper(Some(paper_id.clone()));

    let bar = spinner(format!("Extracting {} from {paper_id}", kind.label().to_lowercase()))?;
    if let Some(ticket) = session.activate(View::Extraction(kind)) {
        ticket.settled().await;
    }
    bar.finish_and_clear();

    let payload = match session.extraction_state(kind) {
        CacheState::Ready(payload) => payload,
        CacheState::Error(error) => anyhow::bail!("{} extraction failed: {error}", kind.label()),
        other => anyhow::bail!("{} extraction did not finish ({})", kind.label(), other.label()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&payload.items)?);
        return Ok(());
    }

    let cached = if payload.cached { " (cached)" } else { "" };
    println!("{}", p.bold(format!("{}: {} items{cached}", kind.label(), payload.len())));
    match kind.render_mode() {
        RenderMode::ContributionGrid => {
            for c in payload.contributions() {
                println!("- {} {}", p.accent(format!("[{}]", c.contribution_type)), c.specific_innovation);
                if !c.problem_addressed.is_empty() {
                    println!("  {}", p.dim(&c.problem_addressed));
                }
            }
        }
        RenderMode::ExperimentTable => {
            for e in payload.experiments() {
                let name = if e.name.is_empty() { &e.experiment_id } else { &e.name };
                println!("- {} {}", p.accent(name), p.dim(&e.task));
                let datasets = e.dataset_names();
                if !datasets.is_empty() {
                    println!("  datasets: {}", datasets.join(", "));
                }
            }
        }
        RenderMode::Generic => {
            for item in &payload.items {
                println!("- {}", serde_json::to_string(item)?);
            }
        }
    }
    Ok(())
}

pub async fn ask(
    session: &Session<ApiClient>,
    paper_id: PaperId,
    question: &str,
    p: Painter,
) -> anyhow::Result<()> {
    let bar = spinner(format!("Asking about {paper_id}"))?;
    let outcome = session.ask(paper_id, question).await;
    bar.finish_and_clear();
    let answer = outcome?;
    println!("{}", p.dim(format!("Q: {}", answer.query)));
    println!("{}", answer.result);
    Ok(())
}

pub async fn analyze(
    session: &Session<ApiClient>,
    kind: AnalysisKind,
    paper_ids: &[PaperId],
    json: bool,
    p: Painter,
) -> anyhow::Result<()> {
    let bar = spinner(format!("Analyzing {kind} across {} papers", paper_ids.len()))?;
    let outcome = session.analyze(kind, paper_ids).await;
    bar.finish_and_clear();
    let report = outcome?;

    let rows = report.rows();
    if json {
        let rows: Vec<_> = rows
            .iter()
            .map(|(label, detail)| serde_json::json!({ "label": label, "detail": detail }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{}", p.bold(format!("{}: {}", kind.label(), report.headline())));
    for (label, detail) in rows {
        println!("- {} {}", p.accent(label), detail);
    }
    Ok(())
}

pub async fn visualize(
    session: &mut Session<ApiClient>,
    query: &str,
    paper_ids: &[PaperId],
    out: &Path,
    verify: bool,
    p: Painter,
) -> anyhow::Result<()> {
    // Titles for the verification sample; unknown ids fall back to the raw id.
    for paper_id in paper_ids {
        match session.backend().get_paper(paper_id).await {
            Ok(paper) => {
                session.register(paper);
            }
            Err(e) => tracing::warn!(%paper_id, error = %e, "could not fetch paper metadata"),
        }
    }

    let bar = spinner("Generating visualization")?;
    let outcome = session.generate(query, paper_ids).await;
    bar.finish_and_clear();
    let generation = outcome?;

    let mut frame = LayoutEstimateFrame::new();
    let size = session.renderer().render(&mut frame, &generation.result);
    let page = SandboxedDocument::new(generation.result.markup.clone())
        .host_page(&generation.result.query, size.height);
    std::fs::write(out, page).with_context(|| format!("cannot write {}", out.display()))?;
    println!(
        "{} {} {}",
        p.ok("saved"),
        out.display(),
        p.dim(format!("(frame {}px, {:?})", size.height, size.source)),
    );

    if verify {
        let bar = spinner("Sampling source data")?;
        let sample = generation.verification().await;
        bar.finish_and_clear();
        match sample {
            Some(sample) if !sample.is_empty() => println!("{}", sample.to_pretty_json()),
            _ => println!("{}", p.dim("No contributions could be sampled")),
        }
    }
    Ok(())
}

pub async fn export(
    session: &Session<ApiClient>,
    paper_id: PaperId,
    target: ExportTarget,
    format: ExportFormat,
    out_dir: &Path,
    p: Painter,
) -> anyhow::Result<()> {
    let bar = spinner(format!("Exporting {target} as {format}"))?;
    let outcome = session.export(paper_id, target, format).await;
    bar.finish_and_clear();
    let file = outcome?;

    let path = out_dir.join(&file.filename);
    std::fs::write(&path, &file.bytes).with_context(|| format!("cannot write {}", path.display()))?;
    println!("{} {} {}", p.ok("saved"), path.display(), p.dim(format!("({} bytes)", file.bytes.len())));
    Ok(())
}
