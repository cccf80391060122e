//! Combined term + file logging, in the teacher's style (`robopoker::init`).

use std::fs;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Initialize a combined terminal + file logger. `verbose` raises the
/// terminal level from `Info` to `Debug`; the file logger always runs at
/// `Debug` so a post-mortem has the full trace regardless of the terminal
/// setting.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    fs::create_dir_all("logs")?;
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        fs::File::create(format!("logs/{}.log", time))?,
    );
    let term_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let term = simplelog::TermLogger::new(
        term_level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file])
        .map_err(|e| anyhow::anyhow!("failed to initialize logger: {e}"))
}
