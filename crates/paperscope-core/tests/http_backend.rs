//! `ApiClient` against an in-process mock of the analysis service.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use paperscope_core::{
    AnalysisKind, AnalysisReport, AnalysisRequest, ApiClient, ApiError, CacheState, Config, CoreError, ExportFormat, ExportRequest, ExportTarget,
    ExtractionKind, PaperBackend, PaperId, PaperQuestion, PdfUpload, Session, View,
};

#[derive(Default)]
struct MockState {
    uploads: AtomicUsize,
    extract_calls: AtomicUsize,
    extracted: Mutex<HashMap<(String, String), usize>>,
    visualize_calls: AtomicUsize,
    query_calls: AtomicUsize,
    analysis_ids: Mutex<Vec<String>>,
}

type Shared = Arc<MockState>;
type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn detail(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": message })))
}

async fn upload(State(state): State<Shared>, mut multipart: Multipart) -> ApiResult {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        if !filename.ends_with(".pdf") {
            return Err(detail(StatusCode::BAD_REQUEST, "Only PDF files are supported"));
        }
        let n = state.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        return Ok(Json(json!({
            "paper_id": format!("p-{n}"),
            "title": filename.trim_end_matches(".pdf"),
            "abstract": format!("{} bytes", bytes.len()),
            "authors": ["Ada Lovelace", "Alan Turing"],
            "num_pages": 9,
            "status": "processed",
        })));
    }
    Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "file field missing"))
}

async fn list_papers() -> Json<Value> {
    Json(json!({
        "papers": [
            { "paper_id": "p-1", "title": "Attention", "authors": ["A"], "num_pages": 15 },
            { "paper_id": "p-2", "title": "BERT", "authors": [], "num_pages": 16 },
        ],
        "total": 2,
    }))
}

async fn get_paper(Path(paper_id): Path<String>) -> ApiResult {
    if paper_id == "p-1" {
        Ok(Json(json!({ "paper_id": "p-1", "title": "Attention", "num_pages": 15 })))
    } else {
        Err(detail(StatusCode::NOT_FOUND, "Paper not found"))
    }
}

async fn extract(
    State(state): State<Shared>,
    Path((paper_id, endpoint)): Path<(String, String)>,
) -> ApiResult {
    state.extract_calls.fetch_add(1, Ordering::SeqCst);
    if paper_id == "broken" {
        return Err(detail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Extraction failed: model timeout",
        ));
    }
    let key = match endpoint.as_str() {
        "architecture" => "architectures",
        "contributions" => "contributions",
        _ => return Err(detail(StatusCode::NOT_FOUND, "Not Found")),
    };
    let seen = {
        let mut extracted = state.extracted.lock().unwrap();
        let count = extracted.entry((paper_id.clone(), endpoint)).or_insert(0);
        *count += 1;
        *count
    };
    let items: Vec<Value> = (0..3)
        .map(|i| json!({ "specific_innovation": format!("item {i} of {paper_id}") }))
        .collect();
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), Value::Array(items));
    body.insert("cached".to_string(), Value::Bool(seen > 1));
    Ok(Json(Value::Object(body)))
}

async fn visualize(State(state): State<Shared>, Json(body): Json<Value>) -> ApiResult {
    state.visualize_calls.fetch_add(1, Ordering::SeqCst);
    let ids = body["paper_ids"].as_array().cloned().unwrap_or_default();
    let query = body["query"].as_str().unwrap_or_default();
    if ids.is_empty() {
        return Err(detail(StatusCode::BAD_REQUEST, "No papers selected"));
    }
    Ok(Json(json!({
        "html": format!("<html><body><h1>{query}</h1><p>{} papers</p></body></html>", ids.len()),
        "paper_count": ids.len(),
        "query": query,
    })))
}

async fn export(
    Path((paper_id, target)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let format = params.get("format").cloned().unwrap_or_default();
    if target == "all" && format == "markdown" {
        (
            [
                (header::CONTENT_TYPE, "text/markdown".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{paper_id}_report.md\""),
                ),
            ],
            "# Report\n",
        )
            .into_response()
    } else {
        ([(header::CONTENT_TYPE, "application/json")], "[]").into_response()
    }
}

async fn query_paper(
    State(state): State<Shared>,
    Path(paper_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    state.query_calls.fetch_add(1, Ordering::SeqCst);
    if paper_id != "p-1" {
        return Err(detail(StatusCode::NOT_FOUND, "Paper not found"));
    }
    let query = body["query"].as_str().unwrap_or_default();
    Ok(Json(json!({
        "paper_id": paper_id,
        "query": query,
        "result": "It is evaluated on WMT 2014.",
    })))
}

async fn analysis(
    State(state): State<Shared>,
    Path(kind): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let ids = params.get("paper_ids").cloned().unwrap_or_default();
    state.analysis_ids.lock().unwrap().push(ids.clone());
    let papers = ids.split(',').count();
    match kind.as_str() {
        "contributions" => Ok(Json(json!({
            "total_papers": papers,
            "total_contributions": 4,
            "by_type": { "Novel Architecture": 3, "Training Procedure": 1 },
            "most_common": [
                { "type": "Novel Architecture", "count": 3 },
                { "type": "Training Procedure", "count": 1 },
            ],
            "contributions": [],
        }))),
        "gaps" => Ok(Json(json!({
            "total_gaps": 1,
            "gaps": [{
                "type": "unexplored_contribution",
                "title": "Unexplored Contribution Types",
                "description": "Types not seen: Evaluation Metric",
                "opportunity": "high",
            }],
        }))),
        _ => Err(detail(StatusCode::NOT_FOUND, "Not Found")),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "llm": "configured", "provider": "anthropic" }))
}

async fn spawn_backend() -> (String, Shared) {
    let state = Shared::default();
    let app = Router::new()
        .route("/api/papers", post(upload).get(list_papers))
        .route("/api/papers/{paper_id}", get(get_paper))
        .route("/api/papers/{paper_id}/extract/{endpoint}", post(extract))
        .route("/api/papers/{paper_id}/export/{target}", get(export))
        .route("/api/papers/{paper_id}/query", post(query_paper))
        .route("/api/analysis/{kind}", get(analysis))
        .route("/api/visualize", post(visualize))
        .route("/health", get(health))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn pdf(name: &str) -> PdfUpload {
    PdfUpload::new(name, b"%PDF-1.4\n1 0 obj\n".to_vec())
}

#[tokio::test]
async fn upload_parses_paper() {
    let (url, state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let paper = client.upload(&pdf("attention.pdf")).await.unwrap();
    assert_eq!(paper.paper_id, PaperId::from("p-1"));
    assert_eq!(paper.title, "attention");
    assert_eq!(paper.num_pages, 9);
    assert_eq!(paper.author_line(1), "Ada Lovelace +1 more");
    assert_eq!(state.uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backend_detail_becomes_error_message() {
    let (url, _state) = spawn_backend().await;
    let client = ApiClient::new(url);
    // Bypasses local validation to see the backend's own rejection.
    let err = client
        .upload(&PdfUpload::new("notes.txt", b"%PDF-".to_vec()))
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Only PDF files are supported");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn list_and_get_papers() {
    let (url, _state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let listing = client.list_papers().await.unwrap();
    assert_eq!(listing.total, 2);
    assert_eq!(listing.papers[1].title, "BERT");
    assert!(listing.papers[0].abstract_text.is_empty());

    let paper = client.get_paper(&PaperId::from("p-1")).await.unwrap();
    assert_eq!(paper.num_pages, 15);
    let missing = client.get_paper(&PaperId::from("nope")).await.unwrap_err();
    assert_eq!(missing.to_string(), "Paper not found");
}

#[tokio::test]
async fn extraction_reports_backend_cache_flag() {
    let (url, state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let id = PaperId::from("p-1");
    let first = client.extract(ExtractionKind::Contributions, &id).await.unwrap();
    let second = client.extract(ExtractionKind::Contributions, &id).await.unwrap();
    assert_eq!(first.len(), 3);
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(state.extract_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn architecture_uses_singular_endpoint() {
    let (url, _state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let payload = client
        .extract(ExtractionKind::Architectures, &PaperId::from("p-1"))
        .await
        .unwrap();
    assert_eq!(payload.len(), 3);
}

#[tokio::test]
async fn visualization_returns_markup() {
    let (url, _state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let ids = [PaperId::from("p-1"), PaperId::from("p-2")];
    let html = client
        .generate_visualization(&ids, "Compare baselines")
        .await
        .unwrap();
    assert!(html.contains("<h1>Compare baselines</h1>"));
    assert!(html.contains("2 papers"));
}

#[tokio::test]
async fn export_filename_from_header_or_fallback() {
    let (url, _state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let id = PaperId::from("p-1");

    let report = ExportRequest::new(id.clone(), ExportTarget::All, ExportFormat::Markdown).unwrap();
    let file = client.export(&report).await.unwrap();
    assert_eq!(file.filename, "p-1_report.md");
    assert_eq!(file.bytes, b"# Report\n");
    assert_eq!(file.content_type.as_deref(), Some("text/markdown"));

    let json = ExportRequest::new(id, ExportTarget::Contributions, ExportFormat::Json).unwrap();
    let file = client.export(&json).await.unwrap();
    assert_eq!(file.filename, "p-1_contributions.json");
}

#[tokio::test]
async fn question_round_trip_and_missing_paper() {
    let (url, state) = spawn_backend().await;
    let client = ApiClient::new(url);

    let question = PaperQuestion::new(PaperId::from("p-1"), "Which benchmark?").unwrap();
    let answer = client.query_paper(&question).await.unwrap();
    assert_eq!(answer.query, "Which benchmark?");
    assert_eq!(answer.result, "It is evaluated on WMT 2014.");

    let missing = PaperQuestion::new(PaperId::from("nope"), "Anything?").unwrap();
    match client.query_paper(&missing).await {
        Err(ApiError::Status { status, detail }) => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Paper not found");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(state.query_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn analysis_sends_comma_joined_ids() {
    let (url, state) = spawn_backend().await;
    let client = ApiClient::new(url);
    let ids = [PaperId::from("p-1"), PaperId::from("p-2")];

    let request = AnalysisRequest::new(AnalysisKind::Contributions, &ids).unwrap();
    match client.analyze(&request).await.unwrap() {
        AnalysisReport::Contributions(summary) => {
            assert_eq!(summary.total_papers, 2);
            assert_eq!(summary.most_common[0].name, "Novel Architecture");
        }
        other => panic!("unexpected report: {other:?}"),
    }

    let request = AnalysisRequest::new(AnalysisKind::Gaps, &ids).unwrap();
    let report = client.analyze(&request).await.unwrap();
    assert_eq!(report.headline(), "1 research gaps found");
    assert_eq!(report.rows()[0].1, "Types not seen: Evaluation Metric (high)");

    assert_eq!(*state.analysis_ids.lock().unwrap(), vec!["p-1,p-2", "p-1,p-2"]);
}

#[tokio::test]
async fn session_rejects_blank_question_and_empty_analysis_locally() {
    let (url, state) = spawn_backend().await;
    let session = Session::new(ApiClient::new(url), &Config::default());

    let err = session.ask(PaperId::from("p-1"), "").await.unwrap_err();
    assert!(err.is_local());
    let err = session.analyze(AnalysisKind::Patterns, &[]).await.unwrap_err();
    assert!(err.is_local());

    assert_eq!(state.query_calls.load(Ordering::SeqCst), 0);
    assert!(state.analysis_ids.lock().unwrap().is_empty());
}

#[tokio::test]
async fn health_check_reports_server_up() {
    let (url, _state) = spawn_backend().await;
    let health = ApiClient::new(url).health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.provider.as_deref(), Some("anthropic"));
}

#[tokio::test]
async fn session_over_http() {
    let (url, state) = spawn_backend().await;
    let config = Config {
        api_url: url.clone(),
        ..Config::default()
    };
    let mut session = Session::new(ApiClient::new(url), &config);

    let paper = session.upload(&pdf("attention.pdf")).await.unwrap();
    session.select_paper(Some(paper.paper_id.clone()));
    session
        .activate(View::Extraction(ExtractionKind::Contributions))
        .unwrap()
        .settled()
        .await;
    let state_now = session.extraction_state(ExtractionKind::Contributions);
    assert_eq!(state_now.payload().unwrap().len(), 3);

    // Non-PDF never reaches the server.
    let err = session
        .upload(&PdfUpload::new("notes.txt", b"hello".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(state.uploads.load(Ordering::SeqCst), 1);

    // Empty query never reaches the server either.
    let ids = session.registry().ids();
    assert!(session.generate("  ", &ids).await.is_err());
    assert_eq!(state.visualize_calls.load(Ordering::SeqCst), 0);

    let generation = session.generate("Compare baselines", &ids).await.unwrap();
    assert!(generation.result.markup.contains("Compare baselines"));
    let sample = generation.verification().await.unwrap();
    assert_eq!(sample.entries.len(), 1);
    assert!(sample.entries[0].from_cache);
}

#[tokio::test]
async fn failed_extraction_is_sticky_per_key() {
    let (url, state) = spawn_backend().await;
    let mut session = Session::new(ApiClient::new(url), &Config::default());
    session.select_paper(Some(PaperId::from("broken")));
    session
        .activate(View::Extraction(ExtractionKind::Contributions))
        .unwrap()
        .settled()
        .await;
    assert_eq!(
        session.extraction_state(ExtractionKind::Contributions),
        CacheState::Error("Extraction failed: model timeout".into())
    );

    session.activate(View::PaperInfo);
    assert!(
        session
            .activate(View::Extraction(ExtractionKind::Contributions))
            .is_none()
    );
    assert_eq!(state.extract_calls.load(Ordering::SeqCst), 1);
}
