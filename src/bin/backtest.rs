use std::env;

use clio::config::BacktestConfig;
use clio::options::Options;
use clio::replay::{ReplayDriver, STRATEGY};
use clio::strategy::SarFollower;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = BacktestConfig::from_args(env::args().skip(1))?;
    let tape = config.source.load(&config.symbol)?;

    let strategy = SarFollower::new(config.symbol.clone(), config.period);
    let mut driver = ReplayDriver::with_window(tape, strategy, config.start, config.end);
    let consumed = driver.run()?;

    let candles = driver
        .get(&config.symbol, "OHLCV", config.period, &Options::new())?
        .len();
    let orders = driver
        .get(&config.symbol, STRATEGY, config.period, &Options::new())?
        .len();
    println!(
        "trades={} candles={} orders={} position={}",
        consumed,
        candles,
        orders,
        driver.strategy().position()
    );
    Ok(())
}
