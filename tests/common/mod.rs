use clio::input::tape::TradeTape;
use clio::options::Options;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn random_tape(seed: u64, length: usize) -> TradeTape {
    let mut rng = StdRng::seed_from_u64(seed);
    TradeTape::random_with_rng(&mut rng, length, &["ABC", "BCD"])
}

/// One request per indicator, with the option sets a client would typically send.
pub fn requests() -> Vec<(&'static str, Options)> {
    vec![
        ("OHLCV", Options::new()),
        ("SMA", Options::new().with("period", 5)),
        ("EMA", Options::new().with("period", 8)),
        ("RSI", Options::new().with("period", 14)),
        (
            "MACD",
            Options::new()
                .with("fastPeriod", 12)
                .with("slowPeriod", 26)
                .with("signalPeriod", 9),
        ),
        (
            "BBANDS",
            Options::new().with("period", 20).with("maType", "EMA"),
        ),
        ("SAR", Options::new()),
        ("LINEARREG", Options::new().with("period", 10)),
        (
            "BBANDS",
            Options::new().with("period", 10).with("maType", "KAMA"),
        ),
        ("HT_DCPERIOD", Options::new()),
        ("HT_DCPHASE", Options::new()),
        ("HT_TRENDLINE", Options::new()),
        ("HT_TRENDMODE", Options::new()),
    ]
}
