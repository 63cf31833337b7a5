use std::env;
use std::time::Duration;

use analytics::{DataFetcher, FetcherConfig, HttpFetcher, ViewConfiguration, DEFAULT_MIN_SUPPORT};
use clap::{Args, Parser, Subcommand};
use foundation::{GeometryCache, LngLat};
use layers::{severity_legend, GeometryMode, HeadlessSurface, ViewMode};
use tracing::info;
use tracing_subscriber::EnvFilter;
use view::{create_engine, resolve, FinishOutcome, NavigationRequest, NavigationZooms, ViewOptions};

#[derive(Parser)]
#[command(name = "dashboard", about = "County and hex anomaly map views")]
struct Cli {
    /// Backend root. Falls back to DASHBOARD_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Request timeout in seconds. Falls back to DASHBOARD_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the backend column catalogue.
    Columns,
    /// Install the county view and print layers and colors.
    Counties(ViewArgs),
    /// Install the hex view and print per-resolution opacity.
    Hexes {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value_t = 8.0)]
        zoom: f64,
    },
    /// Resolve a navigation request and print the camera target.
    FlyTo(FlyToArgs),
    /// Print the severity legend.
    Legend,
}

#[derive(Args)]
struct ViewArgs {
    /// Context columns, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    context: Vec<String>,
    #[arg(long)]
    target: String,
    #[arg(long, default_value_t = DEFAULT_MIN_SUPPORT)]
    min_support: u32,
}

#[derive(Args)]
struct FlyToArgs {
    #[arg(long, conflicts_with_all = ["lng", "hex"])]
    region: Option<String>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, conflicts_with = "lng")]
    hex: Option<String>,
    #[arg(long)]
    zoom: Option<f64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<(), String> {
    let fetcher_config = fetcher_config(&cli)?;
    match cli.command {
        Command::Legend => {
            for entry in severity_legend() {
                println!("{:<12} {}", entry.label(), entry.color);
            }
            Ok(())
        }
        Command::FlyTo(args) => cmd_fly_to(args),
        Command::Columns => block_on(cmd_columns(fetcher_config)),
        Command::Counties(args) => block_on(cmd_view(fetcher_config, args, ViewMode::Counties, None)),
        Command::Hexes { view, zoom } => {
            block_on(cmd_view(fetcher_config, view, ViewMode::Hexes, Some(zoom)))
        }
    }
}

fn fetcher_config(cli: &Cli) -> Result<FetcherConfig, String> {
    let mut cfg = FetcherConfig::default();
    if let Some(url) = cli.api_url.clone().or_else(|| env::var("DASHBOARD_API_URL").ok()) {
        cfg.base_url = url;
    }
    let timeout = match cli.timeout_secs {
        Some(secs) => Some(secs),
        None => match env::var("DASHBOARD_TIMEOUT_SECS") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| format!("DASHBOARD_TIMEOUT_SECS={raw:?}: {e}"))?,
            ),
            Err(_) => None,
        },
    };
    if let Some(secs) = timeout {
        cfg.timeout = Duration::from_secs(secs);
    }
    Ok(cfg)
}

fn block_on<T>(fut: impl std::future::Future<Output = Result<T, String>>) -> Result<T, String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("tokio runtime: {e}"))?;
    rt.block_on(fut)
}

async fn cmd_columns(cfg: FetcherConfig) -> Result<(), String> {
    let fetcher = HttpFetcher::new(cfg).map_err(|e| e.to_string())?;
    let catalog = fetcher.fetch_columns().await.map_err(|e| e.to_string())?;
    for column in &catalog.columns {
        let roles = match catalog.meta.get(column) {
            Some(m) => match (m.as_target, m.as_context) {
                (true, true) => "target, context",
                (true, false) => "target",
                (false, true) => "context",
                (false, false) => "-",
            },
            None => "target, context",
        };
        println!("{column:<24} {:<28} {roles}", catalog.label(column));
    }
    Ok(())
}

async fn cmd_view(
    cfg: FetcherConfig,
    args: ViewArgs,
    mode: ViewMode,
    zoom: Option<f64>,
) -> Result<(), String> {
    let fetcher = HttpFetcher::new(cfg).map_err(|e| e.to_string())?;
    let config =
        ViewConfiguration::new(args.context, args.target).with_min_support(args.min_support);
    let catalog = fetcher.fetch_columns().await.map_err(|e| e.to_string())?;
    config.validate(&catalog).map_err(|e| e.to_string())?;

    let options = ViewOptions {
        auto_load: false,
        ..ViewOptions::default()
    };
    let surface = HeadlessSurface::new(options.initial_camera());
    let mut engine = create_engine(surface, fetcher, config, options);
    match engine.controller.switch_to(mode).await {
        FinishOutcome::Applied => {}
        FinishOutcome::Stale => return Err("response superseded".to_string()),
        FinishOutcome::Failed(f) => return Err(f.to_string()),
        FinishOutcome::SurfaceFailed(e) => return Err(e.to_string()),
    }

    let state = engine.controller.state();
    info!(features = state.feature_count, "installed {mode} view");
    println!("mode:      {mode}");
    println!("features:  {}", state.feature_count);
    if let Some(alpha) = state.alpha {
        println!("alpha:     {alpha}");
    }
    if let Some(total) = state.total_hexes {
        println!("hexes:     {total}");
    }

    let surface = engine.controller.surface();
    if let Some(z) = zoom {
        surface.borrow_mut().set_zoom(z);
        println!("visible @ z{z}: {:?}", engine.controller.on_zoom(z));
    }

    let surface = surface.borrow();
    println!("sources:   {}", surface.source_ids().join(", "));
    for layer in surface.layer_ids() {
        match surface.rendered_opacity(layer) {
            Some(op) => println!("  {layer:<20} opacity {op:.3}"),
            None => println!("  {layer}"),
        }
    }

    if let Some(GeometryMode::Counties(regions)) = engine.controller.current_data() {
        let colors = surface.fill_colors("counties-fill");
        for (feature, color) in regions.features.iter().zip(colors) {
            let stat = feature
                .statistic(&engine.controller.options().severity_field)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<6} {:<18} {stat:>8} {color}",
                feature.id.as_deref().unwrap_or("?"),
                feature.name
            );
        }
    }
    Ok(())
}

fn cmd_fly_to(args: FlyToArgs) -> Result<(), String> {
    let request = match (args.region, args.lng, args.lat, args.hex) {
        (Some(id), _, _, _) => NavigationRequest::Region(id),
        (None, Some(lng), Some(lat), _) => NavigationRequest::Coordinate {
            center: LngLat::new(lng, lat),
            zoom: args.zoom,
        },
        (None, _, _, Some(index)) => NavigationRequest::Hex {
            index,
            zoom: args.zoom,
        },
        _ => return Err("fly-to needs --region, --lng/--lat or --hex".to_string()),
    };
    let zooms = NavigationZooms::from(&ViewOptions::default());
    let target = resolve(&request, &GeometryCache::california(), zooms).map_err(|e| e.to_string())?;
    let out = serde_json::json!({
        "center": [target.center.lng, target.center.lat],
        "zoom": target.zoom,
    });
    println!("{out}");
    Ok(())
}
