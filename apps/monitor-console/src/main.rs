mod cli;
mod render;
mod telemetry;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use monitor_proto::{
    GoroutineHistoryQuery, GoroutineQuery, MonitorQuery, RequestHistoryQuery, RequestQuery,
    RequestSearch,
};
use monitor_sdk::{ChannelManager, ClientConfig, QueryClient};
use tracing::{debug, info};

use crate::cli::{
    Cli, Command, GoroutineArgs, MonitorArgs, RequestArgs, SearchArgs, WatchArgs,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard =
        telemetry::init(&cli.logging.to_config()).context("failed to initialise logging")?;

    let config = cli.connection.apply(ClientConfig::from_env());
    debug!(
        target: "monitor.console",
        dashboard_url = %config.dashboard_url,
        mode = ?config.build_mode,
        "resolved configuration"
    );

    match cli.command {
        Command::Watch(args) => watch(&config, args).await,
        Command::Goroutines(args) => goroutines(&query_client(&config)?, args).await,
        Command::Requests(args) => requests(&query_client(&config)?, args).await,
        Command::Search(args) => search(&query_client(&config)?, args).await,
        Command::Heap => render::print_json(&query_client(&config)?.heap_profile().await?),
        Command::System => render::print_json(&query_client(&config)?.system_info().await?),
        Command::Stats => render::print_json(&query_client(&config)?.monitor_stats().await?),
        Command::Connections => render::print_json(&query_client(&config)?.connections().await?),
        Command::Monitor(args) => monitor(&query_client(&config)?, args).await,
    }
}

fn query_client(config: &ClientConfig) -> Result<QueryClient> {
    let client = QueryClient::from_config(config).context("failed to build query client")?;
    debug!(target: "monitor.console", base = client.base_url(), "query client ready");
    Ok(client)
}

async fn watch(config: &ClientConfig, args: WatchArgs) -> Result<()> {
    let manager = ChannelManager::from_config(config).context("invalid dashboard url")?;
    let reader = manager.reader();
    let mut changes = reader.subscribe();
    info!(target: "monitor.console", url = manager.url(), "opening live channel");
    manager.connect();

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = reader.snapshot();
                if args.json {
                    render::print_json(&render::snapshot_json(&snapshot))?;
                } else {
                    print!("{}", render::summary(&snapshot));
                }
            }
        }
    }

    manager.disconnect();
    Ok(())
}

async fn goroutines(client: &QueryClient, args: GoroutineArgs) -> Result<()> {
    if let Some(id) = args.id {
        return render::print_json(&client.goroutine(&id).await?);
    }
    let list = if args.history {
        client
            .goroutine_history(&GoroutineHistoryQuery {
                limit: args.limit,
                status: args.status,
            })
            .await?
    } else {
        client
            .goroutines(&GoroutineQuery {
                limit: args.limit,
                offset: args.offset,
                status: args.status,
                scope: args.scope.map(Into::into),
            })
            .await?
    };
    render::print_json(&list)
}

async fn requests(client: &QueryClient, args: RequestArgs) -> Result<()> {
    if let Some(id) = args.id {
        return render::print_json(&client.request(&id).await?);
    }
    let list = if args.history {
        client
            .request_history(&RequestHistoryQuery {
                limit: args.limit,
                method: args.method,
                status_code: args.status_code,
                user_id: args.user_id,
            })
            .await?
    } else if args.active && args.limit.is_none() {
        client.active_requests().await?
    } else {
        client
            .requests(&RequestQuery {
                active: args.active.then_some(true),
                history: None,
                limit: args.limit,
            })
            .await?
    };
    render::print_json(&list)
}

async fn search(client: &QueryClient, args: SearchArgs) -> Result<()> {
    let page = client
        .search_requests(&RequestSearch {
            page: args.page,
            page_size: args.page_size,
            method: args.method,
            url: args.url,
            status_code: args.status_code,
            ip: args.ip,
            user_id: args.user_id,
            start_time: args.since,
            end_time: args.until,
        })
        .await?;
    render::print_json(&page)
}

async fn monitor(client: &QueryClient, args: MonitorArgs) -> Result<()> {
    let view = client
        .unified_monitor(&MonitorQuery {
            include_goroutines: args.goroutines.then_some(true),
            include_requests: args.requests.then_some(true),
            include_stats: args.stats.then_some(true),
            limit: args.limit,
        })
        .await?;
    render::print_json(&view)
}
