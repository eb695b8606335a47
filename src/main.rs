use std::process;

use cachepilot::{
    application::{
        cache_policy::CachePolicy,
        error::AppError,
        purge::{CdnPurger, build_purge_request},
    },
    config::{self, FastlySettings},
    infra::{
        fastly::{self, FastlyClient},
        http::{self, HookState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    for fallback in &settings.fallbacks {
        warn!(
            target = "cachepilot::config",
            key = fallback.key,
            reason = %fallback.reason,
            "configuration value ignored, using default"
        );
    }

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Purge(_) => run_purge(&settings.fastly).await,
        config::Command::Resolve(args) => {
            run_resolve(&settings.fastly, args.max_age_override);
            Ok(())
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let purge = fastly::purge_on_publish(&settings.fastly)?;
    let state = HookState::new(purge, settings.server.hook_token.clone());
    if state.hook_token.is_none() {
        warn!(
            target = "cachepilot::http",
            "publish hook accepts unauthenticated requests; set server.hook_token"
        );
    }

    let router = http::build_router(state);
    http::serve(settings.server.addr, router).await?;
    Ok(())
}

async fn run_purge(fastly: &FastlySettings) -> Result<(), AppError> {
    let service_id = fastly
        .service_id
        .as_deref()
        .ok_or_else(|| AppError::validation("fastly.service_id is required to purge"))?;
    let client = FastlyClient::from_settings(fastly)?
        .ok_or_else(|| AppError::validation("fastly.api_key is required to purge"))?;

    let receipt = client.purge_all(&build_purge_request(service_id)).await?;
    info!(
        target = "cachepilot::purge",
        service_id = service_id,
        status = receipt.status,
        "purge_all accepted"
    );
    Ok(())
}

fn run_resolve(fastly: &FastlySettings, max_age_override: Option<i32>) {
    let policy = CachePolicy::from(fastly);
    match policy.resolve(max_age_override) {
        Some(directive) => {
            println!("Cache-Control: {}", directive.cache_control_value());
            println!("Expires: {}", directive.expires_value());
            if fastly.disable_affinity_cookie {
                println!("{}: True", http::ARR_DISABLE_AFFINITY_HEADER.as_str());
            }
        }
        None => println!("no cache headers: effective max-age is not positive"),
    }
}
