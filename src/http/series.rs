pub mod series_server {
    use serde::{Deserialize, Serialize};
    use std::sync::MutexGuard;
    use std::{collections::HashMap, sync::Mutex};

    use crate::cache::{BoundedCache, SeriesCache};
    use crate::error::CacheError;
    use crate::input::tape::{Trade, TradeTape};
    use crate::options::Options;
    use crate::replay::ReplayDriver;
    use crate::series::{FieldSeries, SeriesPayload};
    use crate::strategy::NoopStrategy;
    use actix_web::http::StatusCode;
    use actix_web::{get, post, web, ResponseError};
    use derive_more::{Display, Error};
    use log::info;

    pub type BacktestId = u64;
    pub type SeriesState = Mutex<AppState>;

    /// Live caches and replays share the loaded tapes. Trades ingested into a live cache are not
    /// seen by replays started afterwards.
    pub struct AppState {
        pub datasets: HashMap<String, TradeTape>,
        pub live: HashMap<String, BoundedCache>,
        pub backtests: HashMap<BacktestId, ReplayDriver<NoopStrategy>>,
        pub last: BacktestId,
    }

    impl AppState {
        pub fn create(datasets: &mut HashMap<String, TradeTape>, capacity: Option<usize>) -> Self {
            let datasets = std::mem::take(datasets);
            let live = datasets
                .iter()
                .map(|(name, tape)| {
                    let cache = SeriesCache::live(tape.clone());
                    (
                        name.clone(),
                        BoundedCache::new(cache, capacity.unwrap_or(usize::MAX)),
                    )
                })
                .collect();
            Self {
                datasets,
                live,
                backtests: HashMap::new(),
                last: 0,
            }
        }

        pub fn new_backtest(&mut self, dataset_name: &str) -> Option<(BacktestId, &TradeTape)> {
            let tape = self.datasets.get(dataset_name)?;
            let new_id = self.last + 1;
            self.backtests
                .insert(new_id, ReplayDriver::new(tape.clone(), NoopStrategy));
            self.last = new_id;
            info!("SERVER: Backtest {} started on {}", new_id, dataset_name);
            Some((new_id, tape))
        }
    }

    #[derive(Debug, Display, Error)]
    pub enum ServerError {
        UnknownBacktest,
        UnknownDataset,
        Poisoned,
        #[display("{error}")]
        Rejected { error: CacheError },
        #[display("{error} after {consumed} trades")]
        StepFailed { consumed: usize, error: CacheError },
    }

    impl From<CacheError> for ServerError {
        fn from(error: CacheError) -> Self {
            ServerError::Rejected { error }
        }
    }

    impl ResponseError for ServerError {
        fn status_code(&self) -> StatusCode {
            match self {
                ServerError::UnknownBacktest => StatusCode::BAD_REQUEST,
                ServerError::UnknownDataset => StatusCode::BAD_REQUEST,
                ServerError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
                ServerError::Rejected { error } | ServerError::StepFailed { error, .. } => {
                    match error {
                        CacheError::Consistency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                        _ => StatusCode::BAD_REQUEST,
                    }
                }
            }
        }
    }

    fn lock(app: &web::Data<SeriesState>) -> Result<MutexGuard<'_, AppState>, ServerError> {
        app.lock().map_err(|_| ServerError::Poisoned)
    }

    #[derive(Debug, Deserialize, Serialize)]
    pub struct SeriesRequest {
        pub symbol: String,
        pub indicator: String,
        pub period: i64,
        pub start_time: Option<i64>,
        pub end_time: Option<i64>,
        #[serde(default)]
        pub options: Options,
    }

    impl SeriesRequest {
        fn payload(&self, series: &FieldSeries) -> SeriesPayload {
            series.payload(
                self.start_time.unwrap_or(i64::MIN),
                self.end_time.unwrap_or(i64::MAX),
            )
        }
    }

    #[derive(Debug, Deserialize, Serialize)]
    pub struct MaxTimestampResponse {
        pub max_timestamp: Option<i64>,
    }

    #[post("/live/{dataset_name}/series")]
    pub async fn live_series(
        app: web::Data<SeriesState>,
        path: web::Path<(String,)>,
        request: web::Json<SeriesRequest>,
    ) -> Result<web::Json<SeriesPayload>, ServerError> {
        let mut state = lock(&app)?;
        let (dataset_name,) = path.into_inner();

        if let Some(cache) = state.live.get_mut(&dataset_name) {
            let series = cache.get(
                &request.symbol,
                &request.indicator,
                request.period,
                &request.options,
            )?;
            Ok(web::Json(request.payload(series)))
        } else {
            Err(ServerError::UnknownDataset)
        }
    }

    #[get("/live/{dataset_name}/max_timestamp/{symbol}")]
    pub async fn live_max_timestamp(
        app: web::Data<SeriesState>,
        path: web::Path<(String, String)>,
    ) -> Result<web::Json<MaxTimestampResponse>, ServerError> {
        let state = lock(&app)?;
        let (dataset_name, symbol) = path.into_inner();

        if let Some(cache) = state.live.get(&dataset_name) {
            Ok(web::Json(MaxTimestampResponse {
                max_timestamp: cache.max_timestamp(&symbol),
            }))
        } else {
            Err(ServerError::UnknownDataset)
        }
    }

    #[derive(Debug, Deserialize, Serialize)]
    pub struct IngestRequest {
        pub trade: Trade,
    }

    #[post("/live/{dataset_name}/ingest")]
    pub async fn ingest(
        app: web::Data<SeriesState>,
        path: web::Path<(String,)>,
        request: web::Json<IngestRequest>,
    ) -> Result<web::Json<MaxTimestampResponse>, ServerError> {
        let mut state = lock(&app)?;
        let (dataset_name,) = path.into_inner();
        let IngestRequest { trade } = request.into_inner();
        let symbol = trade.symbol.clone();

        if let Some(cache) = state.live.get_mut(&dataset_name) {
            cache.ingest(trade)?;
            Ok(web::Json(MaxTimestampResponse {
                max_timestamp: cache.max_timestamp(&symbol),
            }))
        } else {
            Err(ServerError::UnknownDataset)
        }
    }

    #[derive(Debug, Deserialize, Serialize)]
    pub struct InitResponse {
        pub backtest_id: BacktestId,
        pub trades: usize,
        pub start: Option<i64>,
    }

    #[get("/init/{dataset_name}")]
    pub async fn init(
        app: web::Data<SeriesState>,
        path: web::Path<(String,)>,
    ) -> Result<web::Json<InitResponse>, ServerError> {
        let mut state = lock(&app)?;
        let (dataset_name,) = path.into_inner();

        if let Some((backtest_id, tape)) = state.new_backtest(&dataset_name) {
            Ok(web::Json(InitResponse {
                backtest_id,
                trades: tape.len(),
                start: tape.get(0).map(|trade| trade.timestamp),
            }))
        } else {
            Err(ServerError::UnknownDataset)
        }
    }

    #[derive(Debug, Deserialize, Serialize)]
    pub struct StepRequest {
        pub steps: usize,
    }

    #[derive(Debug, Deserialize, Serialize)]
    pub struct StepResponse {
        pub consumed: usize,
        pub has_next: bool,
        pub max_timestamp: Option<i64>,
    }

    #[post("/backtest/{backtest_id}/step")]
    pub async fn step(
        app: web::Data<SeriesState>,
        path: web::Path<(BacktestId,)>,
        request: web::Json<StepRequest>,
    ) -> Result<web::Json<StepResponse>, ServerError> {
        let mut state = lock(&app)?;
        let (backtest_id,) = path.into_inner();

        if let Some(driver) = state.backtests.get_mut(&backtest_id) {
            let before = driver.cursor();
            if let Err(error) = driver.step(request.steps) {
                return Err(ServerError::StepFailed {
                    consumed: driver.cursor() - before,
                    error,
                });
            }
            Ok(web::Json(StepResponse {
                consumed: driver.cursor() - before,
                has_next: !driver.is_exhausted(),
                max_timestamp: driver.latest_timestamp(),
            }))
        } else {
            Err(ServerError::UnknownBacktest)
        }
    }

    #[post("/backtest/{backtest_id}/series")]
    pub async fn backtest_series(
        app: web::Data<SeriesState>,
        path: web::Path<(BacktestId,)>,
        request: web::Json<SeriesRequest>,
    ) -> Result<web::Json<SeriesPayload>, ServerError> {
        let mut state = lock(&app)?;
        let (backtest_id,) = path.into_inner();

        if let Some(driver) = state.backtests.get_mut(&backtest_id) {
            let series = driver.get(
                &request.symbol,
                &request.indicator,
                request.period,
                &request.options,
            )?;
            Ok(web::Json(request.payload(series)))
        } else {
            Err(ServerError::UnknownBacktest)
        }
    }

    #[get("/backtest/{backtest_id}/max_timestamp/{symbol}")]
    pub async fn backtest_max_timestamp(
        app: web::Data<SeriesState>,
        path: web::Path<(BacktestId, String)>,
    ) -> Result<web::Json<MaxTimestampResponse>, ServerError> {
        let state = lock(&app)?;
        let (backtest_id, symbol) = path.into_inner();

        if let Some(driver) = state.backtests.get(&backtest_id) {
            Ok(web::Json(MaxTimestampResponse {
                max_timestamp: driver.max_timestamp(&symbol),
            }))
        } else {
            Err(ServerError::UnknownBacktest)
        }
    }
}
