//! Integration tests for the PDF auto-fill server

use async_trait::async_trait;
use image::DynamicImage;
use pdf_autofill_server::config::LlmConfig;
use pdf_autofill_server::llm::{
    answer_question, fill_missing_fields, ChatBackend, Completion, HttpChatClient,
    SamplingParams, API_ERROR_MARKER, REQUEST_FAILED_MARKER,
};
use pdf_autofill_server::ocr::{OcrEngine, TextExtractor};
use pdf_autofill_server::pdf::{
    extract_drawn_lines, render_filled_pdf, PageRasterizer, TITLE, WRAP_WIDTH,
};
use pdf_autofill_server::session::{Pipeline, SessionState};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ============================================================================
// Canned chat-completion endpoint
// ============================================================================

/// Serve one HTTP request with a fixed response and hand back the raw request
async fn canned_endpoint(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!(
        "http://{}/openai/v1/chat/completions",
        listener.local_addr().unwrap()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });

    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn request_json(raw: &str) -> serde_json::Value {
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

fn client_for(url: String) -> HttpChatClient {
    HttpChatClient::new(&LlmConfig {
        endpoint: url,
        api_key: "gsk_test".to_string(),
        model: "llama3-8b-8192".to_string(),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_fill_request_shape_and_success() {
    let (url, server) = canned_endpoint("200 OK", completion_body("Name: Jane Doe")).await;
    let client = client_for(url);

    let completion = fill_missing_fields(&client, "Name: N/A").await;
    assert_eq!(completion, Completion::Text("Name: Jane Doe".to_string()));

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /openai/v1/chat/completions"));
    assert!(raw
        .lines()
        .any(|l| l.eq_ignore_ascii_case("authorization: Bearer gsk_test")));

    let body = request_json(&raw);
    assert_eq!(body["model"], "llama3-8b-8192");
    assert_eq!(body["max_tokens"], 1500);
    assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    assert_eq!(body["messages"][0]["role"], "user");
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("--- FORM START ---\nName: N/A\n--- FORM END ---"));
}

#[tokio::test]
async fn test_answer_request_uses_answer_sampling() {
    let (url, server) = canned_endpoint("200 OK", completion_body("Jane Doe")).await;
    let client = client_for(url);

    let completion = answer_question(&client, "Name: Jane Doe", "Who?").await;
    assert_eq!(completion.into_text(), "Jane Doe");

    let body = request_json(&server.await.unwrap());
    assert_eq!(body["max_tokens"], 600);
    assert!((body["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
}

#[tokio::test]
async fn test_non_success_status_returns_marker_and_body() {
    let (url, server) = canned_endpoint(
        "500 Internal Server Error",
        r#"{"error":"boom"}"#.to_string(),
    )
    .await;
    let client = client_for(url);

    let completion = fill_missing_fields(&client, "Name: N/A").await;
    assert!(completion.is_error());
    assert_eq!(
        completion.into_text(),
        format!("{} {}", API_ERROR_MARKER, r#"{"error":"boom"}"#)
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_answer_server_error_returns_marker_and_body() {
    let (url, server) = canned_endpoint(
        "500 Internal Server Error",
        r#"{"error":"model overloaded"}"#.to_string(),
    )
    .await;
    let client = client_for(url);

    let completion = answer_question(&client, "Name: Jane", "Who?").await;
    assert_eq!(
        completion,
        Completion::ApiError {
            status: 500,
            body: r#"{"error":"model overloaded"}"#.to_string(),
        }
    );
    assert_eq!(
        completion.into_text(),
        format!("{} {}", API_ERROR_MARKER, r#"{"error":"model overloaded"}"#)
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_answer_is_an_error_string() {
    let (url, server) =
        canned_endpoint("401 Unauthorized", "invalid api key".to_string()).await;
    let client = client_for(url);

    let text = answer_question(&client, "Name: Jane", "Who?")
        .await
        .into_text();
    assert_eq!(text, format!("{} invalid api key", API_ERROR_MARKER));
    server.await.unwrap();
}

#[tokio::test]
async fn test_malformed_success_body_is_request_failure() {
    let (url, server) = canned_endpoint("200 OK", "not json".to_string()).await;
    let client = client_for(url);

    let text = fill_missing_fields(&client, "Name: N/A").await.into_text();
    assert!(text.starts_with(REQUEST_FAILED_MARKER));
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_refused_is_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{}/v1/chat/completions", addr));

    let fill = fill_missing_fields(&client, "Name: N/A").await;
    assert!(matches!(fill, Completion::RequestFailed(_)));
    assert!(fill.into_text().starts_with(REQUEST_FAILED_MARKER));

    let answer = answer_question(&client, "Name: Jane", "Who?").await;
    assert!(answer.into_text().starts_with(REQUEST_FAILED_MARKER));
}

#[tokio::test]
async fn test_unresponsive_endpoint_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    let hold = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let client = HttpChatClient::new(&LlmConfig {
        endpoint: url,
        request_timeout: Duration::from_millis(200),
        ..LlmConfig::default()
    })
    .unwrap();

    let completion = fill_missing_fields(&client, "Name: N/A").await;
    assert!(matches!(completion, Completion::RequestFailed(_)));
    hold.abort();
}

// ============================================================================
// End-to-end session flow with stub OCR and LLM
// ============================================================================

struct OnePage;

impl PageRasterizer for OnePage {
    fn rasterize(&self, _data: &[u8]) -> pdf_autofill_server::Result<Vec<DynamicImage>> {
        Ok(vec![DynamicImage::new_rgb8(1, 1)])
    }
}

struct ScannedForm;

#[async_trait]
impl OcrEngine for ScannedForm {
    async fn recognize(&self, _image: &DynamicImage) -> pdf_autofill_server::Result<String> {
        Ok("Name: N/A\nDate: ---".to_string())
    }
}

/// Echoes the form body back with placeholders replaced
struct EchoFiller;

#[async_trait]
impl ChatBackend for EchoFiller {
    async fn complete(&self, prompt: &str, _params: SamplingParams) -> Completion {
        match (prompt.find("--- FORM START ---\n"), prompt.find("\n--- FORM END ---")) {
            (Some(start), Some(end)) => {
                let body = &prompt[start + "--- FORM START ---\n".len()..end];
                Completion::Text(
                    body.trim_end()
                        .replace("N/A", "Jane Doe")
                        .replace("---", "2024-01-01"),
                )
            }
            _ => Completion::Text(format!("answered {} chars", prompt.len())),
        }
    }
}

/// Returns the form body from the fill prompt exactly as it was sent
struct VerbatimEcho;

#[async_trait]
impl ChatBackend for VerbatimEcho {
    async fn complete(&self, prompt: &str, _params: SamplingParams) -> Completion {
        let body = prompt
            .split_once("--- FORM START ---\n")
            .and_then(|(_, rest)| rest.rsplit_once("\n--- FORM END ---"))
            .map(|(body, _)| body.to_string());
        Completion::Text(body.unwrap_or_else(|| prompt.to_string()))
    }
}

fn pipeline_with(llm: Arc<dyn ChatBackend>) -> Pipeline {
    let extractor = TextExtractor::new(Arc::new(OnePage), Arc::new(ScannedForm));
    Pipeline::new(extractor, llm)
}

fn pipeline() -> Pipeline {
    pipeline_with(Arc::new(EchoFiller))
}

#[tokio::test]
async fn test_unchanged_echo_renders_the_scanned_text() {
    let pipeline = pipeline_with(Arc::new(VerbatimEcho));
    let mut state = SessionState::new("echo");

    pipeline
        .handle_upload(&mut state, b"%PDF-1.4".to_vec())
        .await;
    let document_text = state.document_text().to_string();
    assert_eq!(document_text, "Name: N/A\nDate: ---\n");

    let filled = pipeline.handle_fill(&mut state).await.unwrap().to_string();
    assert_eq!(filled, document_text);

    let pdf = pipeline.handle_download(&state).await.unwrap();
    assert_eq!(pdf, render_filled_pdf(&document_text).unwrap());
    assert_eq!(
        extract_drawn_lines(&pdf).unwrap()[0][1..].to_vec(),
        vec!["Name: N/A".to_string(), "Date: ---".to_string()]
    );
}

#[tokio::test]
async fn test_scanned_form_scenario() {
    let pipeline = pipeline();
    let mut state = SessionState::new("scenario");

    let outcome = pipeline
        .handle_upload(&mut state, b"%PDF-1.4".to_vec())
        .await;
    assert!(outcome.ocr_performed);
    assert_eq!(outcome.error, None);
    assert_eq!(state.document_text(), "Name: N/A\nDate: ---\n");

    let filled = pipeline.handle_fill(&mut state).await.unwrap().to_string();
    assert_eq!(filled, "Name: Jane Doe\nDate: 2024-01-01");

    let pdf = pipeline.handle_download(&state).await.unwrap();
    assert_eq!(pdf, render_filled_pdf(&filled).unwrap());

    let pages = extract_drawn_lines(&pdf).unwrap();
    assert_eq!(
        pages,
        vec![vec![
            TITLE.to_string(),
            "Name: Jane Doe".to_string(),
            "Date: 2024-01-01".to_string(),
        ]]
    );
}

#[tokio::test]
async fn test_second_upload_keeps_first_document() {
    let pipeline = pipeline();
    let mut state = SessionState::new("guard");

    pipeline
        .handle_upload(&mut state, b"%PDF-1.4".to_vec())
        .await;
    let before = state.document_text().to_string();

    let outcome = pipeline
        .handle_upload(&mut state, b"%PDF-1.7 another".to_vec())
        .await;
    assert!(!outcome.ocr_performed);
    assert_eq!(state.document_text(), before);
}

#[tokio::test]
async fn test_history_is_shown_newest_first() {
    let pipeline = pipeline();
    let mut state = SessionState::new("history");
    pipeline
        .handle_upload(&mut state, b"%PDF-1.4".to_vec())
        .await;
    pipeline.handle_fill(&mut state).await.unwrap();

    for question in ["What is the name?", "What is the date?", "Is it signed?"] {
        pipeline.handle_ask(&mut state, question).await.unwrap();
    }

    let shown: Vec<&str> = state
        .history_newest_first()
        .map(|e| e.question.as_str())
        .collect();
    assert_eq!(
        shown,
        vec!["Is it signed?", "What is the date?", "What is the name?"]
    );
}

// ============================================================================
// Renderer properties
// ============================================================================

#[rstest]
#[case("Name: Jane Doe\nDate: 2024-01-01")]
#[case("single line")]
#[case("Field A: 1\r\nField B: 2\r\nField C: 3")]
fn test_short_lines_round_trip(#[case] text: &str) {
    let pdf = render_filled_pdf(text).unwrap();
    let pages = extract_drawn_lines(&pdf).unwrap();

    let expected: Vec<String> = text
        .lines()
        .map(|l| l.to_string())
        .collect();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0][0], TITLE);
    assert_eq!(pages[0][1..].to_vec(), expected);
}

#[rstest]
#[case(50)]
#[case(110)]
#[case(111)]
#[case(330)]
#[case(555)]
fn test_long_line_wraps_into_ceil_segments(#[case] len: usize) {
    let line: String = (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let pdf = render_filled_pdf(&line).unwrap();
    let pages = extract_drawn_lines(&pdf).unwrap();

    let body = &pages[0][1..];
    assert_eq!(body.len(), len.div_ceil(WRAP_WIDTH));
    assert!(body.iter().all(|s| s.chars().count() <= WRAP_WIDTH));
    assert_eq!(body.concat(), line);
}

#[test]
fn test_long_document_spills_onto_more_pages() {
    let text: String = (1..=150)
        .map(|i| format!("Line {}", i))
        .collect::<Vec<_>>()
        .join("\n");
    let pages = extract_drawn_lines(&render_filled_pdf(&text).unwrap()).unwrap();

    assert!(pages.len() >= 3);
    let drawn: Vec<&String> = pages.iter().flatten().skip(1).collect();
    assert_eq!(drawn.len(), 150);
    assert_eq!(drawn[149], "Line 150");
}
