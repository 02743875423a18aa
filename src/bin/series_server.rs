use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use actix_web::{web, App, HttpServer};
use clio::config::ServerConfig;
use clio::http::series::series_server::{
    backtest_max_timestamp, backtest_series, ingest, init, live_max_timestamp, live_series, step,
    AppState,
};
use log::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ServerConfig::from_args(env::args().skip(1))?;

    let mut datasets = HashMap::new();
    for dataset in &config.datasets {
        datasets.insert(dataset.name.clone(), dataset.load()?);
    }
    info!(
        "SERVER: Serving {} datasets on {}:{}",
        datasets.len(),
        config.address,
        config.port
    );

    let app_state = Mutex::new(AppState::create(&mut datasets, config.capacity));
    let series_state = web::Data::new(app_state);

    HttpServer::new(move || {
        App::new()
            .app_data(series_state.clone())
            .service(live_series)
            .service(live_max_timestamp)
            .service(ingest)
            .service(init)
            .service(step)
            .service(backtest_series)
            .service(backtest_max_timestamp)
    })
    .bind((config.address, config.port))?
    .run()
    .await?;
    Ok(())
}
