/// HTTP server with WebSocket support for live grid viewports
use actix_web::{middleware, web, App, Error, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use log::{info, warn};
use std::time::Duration;

use crate::column::{Aggregate, Column, ColumnType, ColumnValue};
use crate::config::ServerConfig;
use crate::service::ServiceContext;
use crate::websocket::{AppState, GridWebSocket};

/// Name of the table served by `demo_context`.
pub const DEMO_TABLE: &str = "instruments";
const DEMO_TICK: Duration = Duration::from_millis(500);

/// WebSocket endpoint handler
async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let resp = ws::start(GridWebSocket::new(state), &req, stream)?;
    Ok(resp)
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let context = state.lock();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "tables": context.table_names(),
        "viewports": context.subscription_count(),
    }))
}

/// A context holding a small instruments table.
pub fn demo_context() -> crate::error::Result<ServiceContext> {
    let columns = vec![
        Column::new("ric").typed(ColumnType::String),
        Column::new("exchange").typed(ColumnType::String),
        Column::new("currency").typed(ColumnType::String),
        Column::new("sector").typed(ColumnType::String),
        Column::new("price").typed(ColumnType::Float64).aggregate(Aggregate::Avg),
        Column::new("volume").typed(ColumnType::Int64).aggregate(Aggregate::Sum),
    ];
    let mut table = crate::table::Table::new(DEMO_TABLE, columns, "ric")?;
    let exchanges = [("XLON", "GBP"), ("XNYS", "USD"), ("XPAR", "EUR"), ("XETR", "EUR")];
    let sectors = ["Energy", "Financials", "Health", "Industrials", "Technology"];
    for i in 0..200usize {
        let (exchange, currency) = exchanges[i % exchanges.len()];
        table.insert(vec![
            format!("INS{:03}.{}", i, &exchange[1..]).into(),
            exchange.into(),
            currency.into(),
            sectors[(i / 3) % sectors.len()].into(),
            (50.0 + (i % 37) as f64 * 2.5).into(),
            ((1000 + i * 37) as i64).into(),
        ])?;
    }
    table.drain_changes();

    let mut context = ServiceContext::new();
    context.add_table(table);
    Ok(context)
}

/// Move demo prices so subscribers see a stream of updates.
fn spawn_demo_ticker(state: web::Data<AppState>) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(DEMO_TICK);
        let mut tick: usize = 0;
        loop {
            interval.tick().await;
            tick += 1;
            let mut context = state.lock();
            let Ok(table) = context.table(DEMO_TABLE) else {
                return;
            };
            let len = table.len();
            if len == 0 {
                continue;
            }
            let index = (tick * 7) % len;
            let key = table.row_key(index);
            let price = table
                .get_value(index, "price")
                .ok()
                .and_then(ColumnValue::as_f64)
                .unwrap_or(0.0);
            let step = if tick % 2 == 0 { 0.25 } else { -0.25 };
            let changes = [("price", ColumnValue::Float64(price + step))];
            if let Err(e) = context.update_row(DEMO_TABLE, &key, &changes) {
                warn!("demo ticker: {}", e);
            }
        }
    });
}

/// Start the HTTP server with WebSocket support
pub async fn run_server(config: ServerConfig, context: ServiceContext) -> std::io::Result<()> {
    let host = config.host.clone();
    let port = config.port;
    let demo = context.table(DEMO_TABLE).is_ok();
    let state = web::Data::new(AppState::new(context, config));
    if demo {
        spawn_demo_ticker(state.clone());
    }

    info!("LiveGrid WebSocket server on ws://{}:{}/ws", host, port);
    info!("Health check on http://{}:{}/health", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(
                actix_cors::Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .route("/ws", web::get().to(ws_index))
            .route("/health", web::get().to(health_check))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_demo_context() {
        let context = demo_context().unwrap();
        let table = context.table(DEMO_TABLE).unwrap();
        assert_eq!(table.len(), 200);
        assert!(table.changeset().is_empty());
        assert_eq!(table.row_key(1), ColumnValue::from("INS001.NYS"));
    }

    #[actix_web::test]
    async fn test_health_check() {
        let state = web::Data::new(AppState::new(demo_context().unwrap(), ServerConfig::default()));
        let app = actix_web::test::init_service(
            App::new()
                .app_data(state)
                .route("/health", web::get().to(health_check)),
        )
        .await;
        let req = actix_web::test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tables"], serde_json::json!([DEMO_TABLE]));
        assert_eq!(body["viewports"], 0);
    }

    #[test]
    fn test_named_insert_on_demo_table() {
        let mut context = demo_context().unwrap();
        let mut row = HashMap::new();
        row.insert("ric".to_string(), ColumnValue::from("NEW.LON"));
        row.insert("price".to_string(), ColumnValue::from(1.5));
        assert_eq!(context.insert_row(DEMO_TABLE, row).unwrap(), 200);
    }
}
