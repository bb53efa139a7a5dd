use std::io::Write;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{error, info, LevelFilter};

use hsp_runner::cli::parse;
use hsp_runner::{HspRunner, RunConfig, RunOutcome};


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n HSP Runner\n-------------\n");

    let config = match RunConfig::from_env().and_then(|base| args.apply_overrides(base)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Data root {:?}, logs in {:?}", config.data_root, config.output_dir);

    let report = match HspRunner::new(config, &args.form()).await {
        Ok(mut runner) => runner.run().await,
        Err(e) => Err(e),
    };

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            error!("Run failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
            std::process::exit(1);
        }
    };

    println!("Final log: {}", report.final_log.display());
    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());

    match report.outcome {
        RunOutcome::CompletedOk => Ok(()),
        outcome => {
            error!("hspipeline did not complete cleanly: {:?}", outcome);
            std::process::exit(2);
        }
    }
}
