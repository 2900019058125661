// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use log::{info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use reconcile_lib::config::PipelineConfig;
use reconcile_lib::dispatch::batch::{BatchDispatcher, DispatchReport};
use reconcile_lib::enrichment::courier::COURIER_STATUS_FIELD;
use reconcile_lib::enrichment::history::{filter_embedded_histories, retain_kept, FILTER_STATUS_FIELD};
use reconcile_lib::enrichment::{
    prepare_mobile_items, status_counts, CourierStage, DeliveredWindowStage, HttpLookupService, MobileStage,
};
use reconcile_lib::matching::{
    apply_clean_action, merge_records, CleanAction, KeepPolicy, RandomSource, SeededRandom, ThreadRandom,
};
use reconcile_lib::models::record::Record;
use reconcile_lib::timeline::{DeliveryWindow, TimelineExtractor};
use reconcile_lib::utils::env::load_env;
use reconcile_lib::utils::json_io::{read_records, write_output};
use reconcile_lib::utils::progress_bars::logging::{PipelineStage, StageLogger};
use reconcile_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(author, version, about = "Shipment record reconciliation and enrichment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write the JSON result here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Join two exports on the normalized phone number
    Merge {
        #[arg(long)]
        main: PathBuf,
        #[arg(long)]
        secondary: PathBuf,
        /// Phone column of the main file (auto-detected when omitted)
        #[arg(long)]
        main_key: Option<String>,
        /// Phone column of the secondary file (auto-detected when omitted)
        #[arg(long)]
        secondary_key: Option<String>,
    },

    /// Trim and collapse whitespace, drop fully empty rows
    Clean {
        #[arg(long)]
        input: PathBuf,
    },

    /// Keep one row per distinct value of a column
    Dedup {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        group_key: String,
        /// first, last or random
        #[arg(long, default_value = "last")]
        keep: String,
        /// Seed for a reproducible random keep policy
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Keep rows whose delivery and submission dates are close together
    Filter {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        delivery_col: String,
        #[arg(long)]
        submitted_col: String,
        #[arg(long, default_value_t = 1)]
        margin_days: i64,
    },

    /// Tag shipments delivered inside a time window, using their tracking history
    Delivered {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Use each record's `event_history` field instead of calling the tracking API
        #[arg(long)]
        embedded: bool,
        /// Write only rows tagged `kept`, ready to feed into `merge`
        #[arg(long)]
        kept_only: bool,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Add rider details and local-time milestones from the courier platform
    Courier {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Look up shipments for every mobile number in the input
    Mobile {
        #[arg(long)]
        input: PathBuf,
        /// Mobile column (auto-detected when omitted)
        #[arg(long)]
        mobile_col: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    load_env();

    let cli = Cli::parse();
    let run_id = Uuid::new_v4().to_string();
    let start_time = Instant::now();
    let mut phase_times: HashMap<&'static str, f64> = HashMap::new();

    let config = PipelineConfig::from_env();
    config.validate()?;
    let progress_config = ProgressConfig::from_env();
    let multi_progress = progress_config.create_multi_progress();
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Merge {
            main,
            secondary,
            main_key,
            secondary_key,
        } => {
            let logger = StageLogger::new(PipelineStage::Merge);
            logger.log_start(&run_id);
            let main_rows = read_records(&main)?;
            let secondary_rows = read_records(&secondary)?;
            logger.log_data_loaded(main_rows.len(), "main");
            logger.log_data_loaded(secondary_rows.len(), "secondary");

            let outcome = merge_records(
                &main_rows,
                &secondary_rows,
                main_key.as_deref(),
                secondary_key.as_deref(),
            )?;
            logger.log_success(main_rows.len(), outcome.merged.len());
            phase_times.insert("merge", logger.elapsed_secs() as f64);
            write_output(&outcome, output)?;
        }

        Commands::Clean { input } => {
            run_clean_action(&run_id, &input, CleanAction::Clean, None, output, &mut phase_times)?;
        }

        Commands::Dedup {
            input,
            group_key,
            keep,
            seed,
        } => {
            let keep: KeepPolicy = keep.parse().unwrap_or_default();
            let action = CleanAction::Dedup {
                group_key_col: Some(group_key),
                keep,
            };
            run_clean_action(&run_id, &input, action, seed, output, &mut phase_times)?;
        }

        Commands::Filter {
            input,
            delivery_col,
            submitted_col,
            margin_days,
        } => {
            let action = CleanAction::Filter {
                delivery_col,
                submitted_col,
                margin_days,
            };
            run_clean_action(&run_id, &input, action, None, output, &mut phase_times)?;
        }

        Commands::Delivered {
            input,
            from,
            to,
            embedded,
            kept_only,
            batch_size,
            concurrency,
        } => {
            let logger = StageLogger::new(PipelineStage::Delivered);
            logger.log_start(&run_id);
            let window = DeliveryWindow::parse(from.as_deref(), to.as_deref())?;
            if !window.is_bounded() {
                info!("No complete time window given; any delivered event qualifies");
            }
            let extractor = TimelineExtractor::new(config.local_time_converter());
            let records = read_records(&input)?;
            logger.log_data_loaded(records.len(), "shipment");
            let input_rows = records.len();

            if embedded {
                logger.log_phase("Filtering embedded histories", None);
                let mut results = filter_embedded_histories(records, &window, &extractor);
                logger.log_status_counts(&status_counts(&results, FILTER_STATUS_FIELD));
                if kept_only {
                    results = retain_kept(results);
                }
                logger.log_success(input_rows, results.len());
                write_output(&json!({ "runId": run_id, "results": results }), output)?;
            } else {
                config.log_config();
                let dispatcher = stage_dispatcher(
                    batch_size.unwrap_or(config.history_batch_size),
                    concurrency.unwrap_or(config.concurrency),
                    &progress_config,
                    multi_progress.as_ref(),
                    "delivered",
                    input_rows,
                )?;
                let service = HttpLookupService::tracking_history(&config)?;
                let stage = DeliveredWindowStage::new(Arc::new(service), window, extractor);
                logger.log_phase("Looking up tracking histories", None);
                let report = stage.run(records, &dispatcher).await;
                finish_enrichment(&logger, &run_id, input_rows, report, FILTER_STATUS_FIELD, kept_only, output)?;
            }
            phase_times.insert("delivered", logger.elapsed_secs() as f64);
        }

        Commands::Courier {
            input,
            batch_size,
            concurrency,
        } => {
            let logger = StageLogger::new(PipelineStage::Courier);
            logger.log_start(&run_id);
            config.log_config();
            let records = read_records(&input)?;
            logger.log_data_loaded(records.len(), "shipment");
            let input_rows = records.len();

            let dispatcher = stage_dispatcher(
                batch_size.unwrap_or(config.courier_batch_size),
                concurrency.unwrap_or(config.concurrency),
                &progress_config,
                multi_progress.as_ref(),
                "courier",
                input_rows,
            )?;
            let service = HttpLookupService::courier_track(&config)?;
            let stage = CourierStage::new(Arc::new(service), TimelineExtractor::new(config.local_time_converter()));
            logger.log_phase("Looking up courier tracking", None);
            let report = stage.run(records, &dispatcher).await;
            finish_enrichment(&logger, &run_id, input_rows, report, COURIER_STATUS_FIELD, false, output)?;
            phase_times.insert("courier", logger.elapsed_secs() as f64);
        }

        Commands::Mobile {
            input,
            mobile_col,
            batch_size,
            concurrency,
        } => {
            let logger = StageLogger::new(PipelineStage::Mobile);
            logger.log_start(&run_id);
            config.log_config();
            let records = read_records(&input)?;
            logger.log_data_loaded(records.len(), "uploaded");

            let (column, items) = prepare_mobile_items(&records, mobile_col.as_deref())?;
            logger.log_skipped(records.len() - items.len(), "blank mobile number");
            logger.log_phase("Looking up shipments", Some(&format!("column '{}'", column)));

            let dispatcher = stage_dispatcher(
                batch_size.unwrap_or(config.mobile_batch_size),
                concurrency.unwrap_or(config.concurrency),
                &progress_config,
                multi_progress.as_ref(),
                "mobile",
                items.len(),
            )?;
            let service = HttpLookupService::shipment_search(&config)?;
            let stage = MobileStage::new(Arc::new(service));
            let input_rows = items.len();
            let report = stage.run(items, &dispatcher).await;
            finish_enrichment(&logger, &run_id, input_rows, report, "found", false, output)?;
            phase_times.insert("mobile", logger.elapsed_secs() as f64);
        }
    }

    info!("=== Run Summary ===");
    info!("Run ID: {}", run_id);
    for (phase, secs) in &phase_times {
        info!("  {}: {:.2}s", phase, secs);
    }
    info!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}

fn run_clean_action(
    run_id: &str,
    input: &Path,
    action: CleanAction,
    seed: Option<u64>,
    output: Option<&Path>,
    phase_times: &mut HashMap<&'static str, f64>,
) -> Result<()> {
    let logger = StageLogger::new(PipelineStage::Clean);
    logger.log_start(run_id);
    let records = read_records(input)?;
    logger.log_data_loaded(records.len(), "input");

    let mut rng: Box<dyn RandomSource> = match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    };
    let outcome = apply_clean_action(&records, &action, rng.as_mut())?;
    logger.log_success(outcome.stats.initial_rows, outcome.stats.final_rows);
    phase_times.insert("clean", logger.elapsed_secs() as f64);
    write_output(&outcome, output)
}

fn stage_dispatcher(
    batch_size: usize,
    concurrency: usize,
    progress_config: &ProgressConfig,
    multi_progress: Option<&MultiProgress>,
    label: &'static str,
    total: usize,
) -> Result<BatchDispatcher> {
    let dispatcher = BatchDispatcher::new(batch_size, concurrency)
        .with_context(|| format!("Invalid dispatch settings for {} stage", label))?;
    Ok(dispatcher.with_progress(progress_config.stage_callback(label, total, multi_progress)))
}

fn finish_enrichment(
    logger: &StageLogger,
    run_id: &str,
    input_rows: usize,
    mut report: DispatchReport<Record>,
    status_field: &str,
    kept_only: bool,
    output: Option<&Path>,
) -> Result<()> {
    logger.log_dispatch_summary(&report.stats);
    logger.log_status_counts(&status_counts(&report.results, status_field));
    for failure in &report.failures {
        warn!(
            "Batch starting at row {} ({} items) failed: {}",
            failure.offset + 1,
            failure.len,
            failure.error
        );
    }
    if kept_only {
        report.results = retain_kept(report.results);
    }
    logger.log_success(input_rows, report.results.len());
    write_output(
        &json!({
            "runId": run_id,
            "results": report.results,
            "failures": report.failures,
            "stats": report.stats,
        }),
        output,
    )
}
