use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metric_harness::api::{CredentialCache, MonitorService};
use metric_harness::artifact::{ConfigEntry, VisualizationConfig};
use metric_harness::config::ApiSettings;
use metric_harness::llm::{ChatGateway, ChatRequest, ChatResponse, ProviderError, Role};
use metric_harness::tool::{ReportRenderer, ReportTool, Tool, VisualizationOutcome, Visualizer};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ScriptedChat {
    reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatGateway for ScriptedChat {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(req);
        Ok(ChatResponse {
            content: self.reply.clone(),
            input_tokens: 1,
            output_tokens: 1,
            latency: Duration::from_millis(1),
        })
    }
}

#[derive(Default)]
struct RecordingVisualizer {
    calls: Mutex<Vec<(String, String, String, String)>>,
}

#[async_trait]
impl Visualizer for RecordingVisualizer {
    async fn visualize(
        &self,
        config_path: &str,
        output_type: &str,
        tool_type: &str,
        language: &str,
    ) -> VisualizationOutcome {
        self.calls.lock().unwrap().push((
            config_path.to_string(),
            output_type.to_string(),
            tool_type.to_string(),
            language.to_string(),
        ));
        VisualizationOutcome::ok(json!("rendered"))
    }
}

async fn mount_business(server: &MockServer, info: Value) {
    Mock::given(method("POST"))
        .and(path("/bkcmdb/api/v3/biz/search/tencent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "data": {"count": info.as_array().map(|a| a.len()).unwrap_or(0), "info": info}
        })))
        .mount(server)
        .await;
}

/// Writes the csv (and optionally the visualization outputs) for `target`
/// under `ws` and returns its config entry.
fn write_series(
    ws: &Path,
    target: &str,
    with_insight_text: bool,
    with_insights_json: bool,
) -> ConfigEntry {
    let vis = ws.join("visualization");
    std::fs::create_dir_all(&vis).unwrap();

    let csv = ws.join(format!("{target}.csv"));
    std::fs::write(&csv, "\"value\",\"timestamp\"\n10,\"2023-11-14 22:13:20\"\n").unwrap();
    if with_insight_text {
        std::fs::write(vis.join(format!("{target}.md")), "steady around 10%").unwrap();
    }
    if with_insights_json {
        std::fs::write(
            vis.join(format!("{target}.json")),
            json!({"insights": [{"type": "max", "value": 10}, {"type": "avg", "value": 9.5}]})
                .to_string(),
        )
        .unwrap();
    }

    ConfigEntry {
        csv_file_path: csv.display().to_string(),
        chart_title: format!("system.cpu {target}'s Line"),
        chart_type: "line".into(),
        dimensions: vec!["ip".into()],
        insights_file_path: vis.join(format!("{target}.md")).display().to_string(),
        chart_file_path: vis.join(format!("{target}.png")).display().to_string(),
        insights: vis.join(format!("{target}.json")).display().to_string(),
        name: "CPU usage".into(),
    }
}

fn save_config(path: &Path, entries: Vec<ConfigEntry>) -> String {
    VisualizationConfig {
        bk_biz_id: 2,
        config: entries,
    }
    .save(path)
    .unwrap();
    path.display().to_string()
}

/// One series (`host-1`) in `ws`, config saved as `ws/1700000000.json`.
fn write_artifact(ws: &Path, with_insight_text: bool, with_insights_json: bool) -> String {
    let entry = write_series(ws, "host-1", with_insight_text, with_insights_json);
    save_config(&ws.join("1700000000.json"), vec![entry])
}

fn report_tool(
    server: &MockServer,
    workspace: &Path,
    chat: Arc<ScriptedChat>,
    visualizer: Arc<RecordingVisualizer>,
) -> ReportTool {
    let settings = ApiSettings::new(format!("{}/{{product}}", server.uri()), "app", "secret");
    let service = MonitorService::new(&settings, Arc::new(CredentialCache::new())).unwrap();
    let chat: Arc<dyn ChatGateway> = chat;
    ReportTool::new(
        workspace,
        Some(chat),
        "test-model",
        Some(service.cmdb),
        visualizer,
        ReportRenderer::default(),
    )
}

#[tokio::test]
async fn report_renders_narrative_stats_and_business() {
    let server = MockServer::start().await;
    mount_business(
        &server,
        json!([{"bk_biz_id": 2, "bk_biz_name": "Blueking", "bk_app_abbr": "BK"}]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_artifact(dir.path(), true, true);
    let chat = ScriptedChat::new("markdown```# CPU report\nAll good.```");
    let visualizer = Arc::new(RecordingVisualizer::default());
    let tool = report_tool(&server, dir.path(), chat.clone(), visualizer.clone());

    let result = tool
        .execute(json!({"json_config_path": config_path}))
        .await;
    assert!(result.success, "{result:?}");
    assert_eq!(
        result.output.as_deref(),
        Some("markdown```# CPU report\nAll good.```")
    );
    assert!(visualizer.calls.lock().unwrap().is_empty());

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.model, "test-model");
    assert_eq!(req.messages[0].role, Role::System);
    assert_eq!(req.messages[0].content, tool.description());
    let user = &req.messages[1].content;
    assert!(user.starts_with(
        "Please produce a data analysis report covering the following metrics:\nCPU usage - raw data: "
    ));
    assert!(user.contains("10,\"2023-11-14 22:13:20\""));
    assert!(user.contains("- summary: steady around 10%"));

    let html = std::fs::read_to_string(dir.path().join("1700000000.html")).unwrap();
    assert!(html.contains("# CPU report\nAll good."));
    assert!(!html.contains("```"));
    assert!(html.contains("CPU usage max"));
    assert!(html.contains("CPU usage avg"));
    assert!(html.contains("9.5"));
    assert!(html.contains(r#"<div class="banner">BK</div>"#));
    assert!(html.contains("<h1>Blueking</h1>"));
    let chart = dir.path().join("visualization").join("host-1.png");
    assert!(html.contains(&format!(r#"<img src="{}""#, chart.display())));
    assert_eq!(
        result.data.unwrap()["report_path"],
        dir.path().join("1700000000.html").display().to_string()
    );
}

#[tokio::test]
async fn missing_insight_triggers_a_visualization_retry() {
    let server = MockServer::start().await;
    mount_business(&server, json!([{"bk_biz_name": "Blueking", "bk_app_abbr": "BK"}])).await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_artifact(dir.path(), false, false);
    let chat = ScriptedChat::new("report");
    let visualizer = Arc::new(RecordingVisualizer::default());
    let tool = report_tool(&server, dir.path(), chat.clone(), visualizer.clone());

    let result = tool
        .execute(json!({"json_config_path": config_path.clone(), "language": "zh"}))
        .await;
    assert!(result.success, "{result:?}");

    let calls = visualizer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        (config_path, "png".into(), "visualization".into(), "zh".into())
    );

    let requests = chat.requests.lock().unwrap();
    assert!(requests[0].messages[1]
        .content
        .ends_with("- summary: \nWrite the report in Chinese."));
    assert!(dir.path().join("1700000000.html").exists());
}

#[tokio::test]
async fn missing_csv_is_a_report_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_artifact(dir.path(), true, true);
    std::fs::remove_file(dir.path().join("host-1.csv")).unwrap();

    let chat = ScriptedChat::new("never");
    let tool = report_tool(
        &server,
        dir.path(),
        chat.clone(),
        Arc::new(RecordingVisualizer::default()),
    );
    let result = tool
        .execute(json!({"json_config_path": config_path}))
        .await;

    assert!(!result.success);
    assert!(result
        .error
        .unwrap()
        .starts_with("Report error: can not find data file"));
    assert!(chat.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_business_renders_with_placeholders() {
    let server = MockServer::start().await;
    mount_business(&server, json!([])).await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_artifact(dir.path(), true, true);
    let tool = report_tool(
        &server,
        dir.path(),
        ScriptedChat::new("text"),
        Arc::new(RecordingVisualizer::default()),
    );

    let result = tool
        .execute(json!({"json_config_path": config_path}))
        .await;
    assert!(result.success, "{result:?}");

    let html = std::fs::read_to_string(dir.path().join("1700000000.html")).unwrap();
    assert!(html.contains("<h1>unknown</h1>"));
    assert!(html.contains(r#"<div class="banner"></div>"#));
}

#[tokio::test]
async fn business_lookup_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bkcmdb/api/v3/biz/search/tencent"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_artifact(dir.path(), true, true);
    let tool = report_tool(
        &server,
        dir.path(),
        ScriptedChat::new("text"),
        Arc::new(RecordingVisualizer::default()),
    );

    let result = tool
        .execute(json!({"json_config_path": config_path}))
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("business lookup failed"));
    assert!(!dir.path().join("1700000000.html").exists());
}

#[tokio::test]
async fn each_missing_insight_gets_its_own_visualization_retry() {
    let server = MockServer::start().await;
    mount_business(&server, json!([{"bk_biz_name": "Blueking", "bk_app_abbr": "BK"}])).await;

    let dir = tempfile::tempdir().unwrap();
    let entries = vec![
        write_series(dir.path(), "host-1", false, true),
        write_series(dir.path(), "host-2", true, true),
        write_series(dir.path(), "host-3", false, true),
    ];
    let config_path = save_config(&dir.path().join("1700000000.json"), entries);
    let visualizer = Arc::new(RecordingVisualizer::default());
    let tool = report_tool(&server, dir.path(), ScriptedChat::new("r"), visualizer.clone());

    let result = tool
        .execute(json!({"json_config_path": config_path}))
        .await;
    assert!(result.success, "{result:?}");

    let calls = visualizer.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.0 == config_path && c.3 == "en"));
}

#[tokio::test]
async fn report_lands_in_workspace_named_after_artifact_stem() {
    let server = MockServer::start().await;
    mount_business(&server, json!([{"bk_biz_name": "Blueking", "bk_app_abbr": "BK"}])).await;

    let data_dir = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();
    let config_path = write_artifact(data_dir.path(), true, true);
    let tool = report_tool(
        &server,
        workspace.path(),
        ScriptedChat::new("r"),
        Arc::new(RecordingVisualizer::default()),
    );

    let result = tool
        .execute(json!({"json_config_path": config_path}))
        .await;
    assert!(result.success, "{result:?}");

    let expected = workspace.path().join("1700000000.html");
    assert!(expected.exists());
    assert!(!data_dir.path().join("1700000000.html").exists());
    assert_eq!(
        result.data.unwrap()["report_path"],
        expected.display().to_string()
    );
}
