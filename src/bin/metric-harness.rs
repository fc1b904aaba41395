#![forbid(unsafe_code)]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use metric_harness::api::{CredentialCache, MonitorService};
use metric_harness::config::Settings;
use metric_harness::llm::{ChatCompletions, ChatGateway};
use metric_harness::tool::{
    Drawer, GatherData, Persister, ReportRenderer, ReportTool, SubprocessVisualizer, Tool,
    ToolResult,
};

#[derive(Parser)]
#[command(name = "metric-harness", version, about = "Monitoring metrics to analysis reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List metrics available to a business
    List {
        #[arg(long)]
        bk_biz_id: i64,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1000)]
        page_size: u32,
    },
    /// Query one metric and save its series to the workspace
    Query {
        #[arg(long)]
        bk_biz_id: i64,
        #[arg(long)]
        metric_field: String,
        #[arg(long)]
        result_table_id: String,
        /// Unix seconds; both bounds default to the last hour
        #[arg(long)]
        start_time: Option<i64>,
        #[arg(long)]
        end_time: Option<i64>,
        #[arg(long, default_value = "AVG")]
        method: String,
        #[arg(long, value_delimiter = ',')]
        group_by: Vec<String>,
    },
    /// Render charts and insights for a saved visualization config
    Visualize {
        #[arg(long)]
        json_path: String,
        #[arg(long, default_value = "png")]
        output_type: String,
        #[arg(long, default_value = "zh")]
        language: String,
    },
    /// Write an analysis report for a saved visualization config
    Report {
        #[arg(long)]
        json_config_path: String,
        #[arg(long, default_value = "en")]
        language: String,
        /// Template name under METRIC_TEMPLATES_DIR
        #[arg(long, default_value = "dark")]
        template: String,
    },
}

fn print_result(result: &ToolResult) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if result.success {
        Ok(())
    } else {
        Err(result.error.clone().unwrap_or_default().into())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let credentials = Arc::new(CredentialCache::new());
    let service = match &settings.api {
        Some(api) => Some(MonitorService::new(api, credentials)?),
        None => None,
    };
    let visualizer = Arc::new(SubprocessVisualizer::new(
        settings.visualizer_cmd.clone().unwrap_or_default(),
    ));

    let result = match cli.command {
        Commands::List {
            bk_biz_id,
            search,
            page,
            page_size,
        } => {
            let tool = GatherData::new(service, Persister::new(&settings.workspace));
            tool.execute(json!({
                "command": "list",
                "bk_biz_id": bk_biz_id,
                "search": search,
                "page": page,
                "page_size": page_size,
            }))
            .await
        }
        Commands::Query {
            bk_biz_id,
            metric_field,
            result_table_id,
            start_time,
            end_time,
            method,
            group_by,
        } => {
            let tool = GatherData::new(service, Persister::new(&settings.workspace));
            tool.execute(json!({
                "command": "query",
                "bk_biz_id": bk_biz_id,
                "metric_field": metric_field,
                "result_table_id": result_table_id,
                "start_time": start_time,
                "end_time": end_time,
                "method": method,
                "group_by": group_by,
            }))
            .await
        }
        Commands::Visualize {
            json_path,
            output_type,
            language,
        } => {
            let tool = Drawer::new(visualizer);
            tool.execute(json!({
                "json_path": json_path,
                "output_type": output_type,
                "language": language,
            }))
            .await
        }
        Commands::Report {
            json_config_path,
            language,
            template,
        } => {
            let (chat, model): (Option<Arc<dyn ChatGateway>>, String) = match &settings.llm {
                Some(llm) => {
                    let gateway: Arc<dyn ChatGateway> =
                        Arc::new(ChatCompletions::from_settings(llm)?);
                    (Some(gateway), llm.model.clone())
                }
                None => (None, String::new()),
            };
            let tool = ReportTool::new(
                settings.workspace.clone(),
                chat,
                model,
                service.map(|s| s.cmdb),
                visualizer,
                ReportRenderer::new(settings.templates_dir.clone()),
            )
            .with_template(template);
            tool.execute(json!({
                "json_config_path": json_config_path,
                "language": language,
            }))
            .await
        }
    };

    print_result(&result)
}
