use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stock_aggregator::{api, AppConfig, BlobStore, LookupService, StockPipeline};
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

#[derive(Parser)]
#[command(name = "stock-aggregator", about = "Normalize supplier stock feeds and serve lookups by EAN")]
struct Cli {
    /// 配置文件 (TOML), 缺省时尝试 ./stock.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 把本地文件导入为某个数据源的原始数据
    Import {
        /// 数据源名称 (如 apilo, action, molos)
        source: String,
        file: PathBuf,
    },
    /// 解析所有数据源并写出聚合结果
    Run,
    /// 启动查询接口
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志 - 本地时间格式, RUST_LOG 可覆盖级别
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stock_aggregator=info")),
        )
        .init();

    let cli = Cli::parse();

    // 加载配置
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    info!("Loaded config: {:?}", config);

    match cli.command {
        Command::Import { source, file } => import(config, &source, &file),
        Command::Run => run_pipeline(config).await,
        Command::Serve => serve(config).await,
    }
}

fn import(config: AppConfig, source: &str, file: &Path) -> anyhow::Result<()> {
    let pipeline = StockPipeline::from_config(&config).context("invalid source configuration")?;
    let raw = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let path = pipeline.import(source, &raw)?;
    println!("{} -> {}", file.display(), path.display());
    Ok(())
}

async fn run_pipeline(config: AppConfig) -> anyhow::Result<()> {
    let pipeline = StockPipeline::from_config(&config).context("invalid source configuration")?;
    let run = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .context("pipeline task panicked")??;

    for source in &run.report.sources {
        match &source.failure {
            Some(reason) => println!("{:<10} unavailable: {}", source.source, reason),
            None => println!(
                "{:<10} {:>7} records, {} dropped",
                source.source,
                source.records,
                source.report.dropped()
            ),
        }
    }
    println!(
        "total      {:>7} records, {} products",
        run.report.total_records, run.report.products
    );
    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let store = BlobStore::new(&config.storage.data_dir);
    let service = Arc::new(LookupService::new(store));
    match service.index() {
        Ok(index) => info!("Serving {} aggregated products", index.len()),
        Err(e) => tracing::warn!("No stock data yet ({}); run the pipeline first", e),
    }

    let app = api::router(service).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = config.server_addr();
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /productByEan?ean=<ean>");
    info!("  POST /productsByEan  {{\"eans\": [...]}}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
