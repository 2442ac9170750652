use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flowsentry_core::config::FlowsentryConfig;
use flowsentry_daemon::cli::DaemonCli;
use flowsentry_daemon::driver::{TailDriver, TraceDriver};
use flowsentry_daemon::{logging, metrics_server, sink};
use flowsentry_policy::{ActionHandler, EngineConfig, Mode, PolicyCompiler, PolicyEngine, TagAction};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 + CLI 오버라이드
    let mut config = FlowsentryConfig::load(&cli.config)
        .await
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(mode) = &cli.mode {
        config.engine.mode = mode.clone();
    }
    if let Some(policies) = &cli.policies {
        config.engine.policies = policies.display().to_string();
    }
    config.validate().context("config validation failed")?;

    logging::init_tracing(&config.general)?;
    tracing::info!("flowsentry-daemon starting");

    let engine_config =
        EngineConfig::from_core(&config.engine).context("invalid engine configuration")?;

    // --validate: 정책 컴파일까지만 확인하고 종료
    if cli.validate {
        if engine_config.mode == Mode::Alert || !engine_config.policies.as_os_str().is_empty() {
            let compiled = PolicyCompiler::compile_dir(&engine_config.policies)
                .await
                .context("policy compilation failed")?;
            tracing::info!(
                rules = compiled.rules.len(),
                filters = compiled.filters.len(),
                "configuration and policies are valid"
            );
        } else {
            tracing::info!("configuration is valid (no policies configured)");
        }
        return Ok(());
    }

    if config.metrics.enabled {
        metrics_server::serve_metrics(&config.metrics)?;
    }

    // 엔진 구성
    let mut actions = ActionHandler::new();
    actions.register(Box::new(TagAction::new("flowsentry")));

    let (mut engine, out_rx) = PolicyEngine::new(engine_config, actions);
    engine.init().await.context("failed to start policy engine")?;
    tracing::info!(rules = engine.rule_count(), "policy engine initialized");

    // 레코드 채널과 드라이버
    let (record_tx, record_rx) = mpsc::channel(1024);
    let ctx = CancellationToken::new();

    let driver_task = if let Some(input) = &cli.input {
        let driver = TraceDriver::new(input);
        tokio::spawn(async move { driver.run(record_tx).await })
    } else {
        let paths = config
            .tailer
            .watch_paths
            .iter()
            .map(std::path::PathBuf::from)
            .collect::<Vec<_>>();
        if paths.is_empty() {
            anyhow::bail!("no input: pass --input or configure [tailer] watch_paths");
        }
        let driver = TailDriver::new(
            paths,
            std::time::Duration::from_millis(config.tailer.poll_interval_ms),
        );
        let driver_ctx = ctx.clone();
        tokio::spawn(async move { driver.run(driver_ctx, record_tx).await })
    };

    // 싱크 (stdout)
    let sink_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        sink::write_json_lines(out_rx, &mut stdout).await
    });

    // 엔진 메인 루프 + 종료 시그널
    let engine_task = tokio::spawn(async move { engine.run(record_rx).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            ctx.cancel();
        }
        result = driver_task => {
            result.context("driver task panicked")??;
            tracing::info!("driver finished");
        }
    }

    // 드라이버가 레코드 채널을 닫으면 엔진이 드레인 후 종료합니다
    engine_task.await.context("engine task panicked")??;
    let written = sink_task.await.context("sink task panicked")??;
    tracing::info!(records = written, "flowsentry-daemon shut down");

    Ok(())
}
